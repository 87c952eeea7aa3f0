use serde::{Deserialize, Serialize};

use crate::item::UserId;

/// Role carried by an authenticated principal. Closed set: every
/// authorization decision matches on it exhaustively, so adding a role
/// is a compile-time-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
}

/// The authenticated identity making a request. Produced per request by
/// the auth layer; the engine trusts it unconditionally and never
/// creates or stores principals itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn user(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
        }
    }

    pub fn admin(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            role: Role::Admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_serde_round_trip() {
        let p = Principal::user("u1");
        let json = serde_json::to_string(&p).unwrap();
        let back: Principal = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
        assert_eq!(back.role, Role::User);
    }

    #[test]
    fn constructors_set_role() {
        assert_eq!(Principal::user("a").role, Role::User);
        assert_eq!(Principal::admin("a").role, Role::Admin);
    }
}
