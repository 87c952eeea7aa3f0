use crate::item::{ItemDraft, ItemPatch};

pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 500;

/// A single field constraint violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "field '{}': {}", self.field, self.message)
    }
}

/// All violations found in one draft or patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for err in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Check the field constraints of a create payload: title 1-100
/// characters, description 1-500.
pub fn validate_draft(draft: &ItemDraft) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    check_text(&mut errors, "title", &draft.title, TITLE_MAX);
    check_text(&mut errors, "description", &draft.description, DESCRIPTION_MAX);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

/// Check the same constraints on a patch, but only for fields it
/// actually sets.
pub fn validate_patch(patch: &ItemPatch) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    if let Some(ref title) = patch.title {
        check_text(&mut errors, "title", title, TITLE_MAX);
    }
    if let Some(ref description) = patch.description {
        check_text(&mut errors, "description", description, DESCRIPTION_MAX);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

fn check_text(errors: &mut Vec<ValidationError>, field: &'static str, value: &str, max: usize) {
    let len = value.chars().count();
    if len == 0 {
        errors.push(ValidationError {
            field,
            message: "must not be empty".into(),
        });
    } else if len > max {
        errors.push(ValidationError {
            field,
            message: format!("must be at most {} characters, got {}", max, len),
        });
    }
}
