use serde::{Deserialize, Serialize};

/// Counts for the three fixed statuses. A status with no items
/// contributes 0, so every summary carries all three fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub active: usize,
    pub completed: usize,
    pub pending: usize,
}

/// Count of items sharing one distinct field value. Only values with at
/// least one item appear in a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub key: String,
    pub count: usize,
}

/// Aggregated counts over all items visible to the requesting
/// principal. Group sequences are sorted by key so repeated calls with
/// no intervening mutation return identical results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total: usize,
    pub by_status: StatusCounts,
    pub by_category: Vec<GroupCount>,
    pub by_priority: Vec<GroupCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_serde_round_trip() {
        let summary = StatsSummary {
            total: 3,
            by_status: StatusCounts {
                active: 1,
                completed: 1,
                pending: 1,
            },
            by_category: vec![GroupCount {
                key: "Shopping".into(),
                count: 3,
            }],
            by_priority: vec![
                GroupCount {
                    key: "High".into(),
                    count: 1,
                },
                GroupCount {
                    key: "Medium".into(),
                    count: 2,
                },
            ],
        };
        let json = serde_json::to_string(&summary).unwrap();
        let back: StatsSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(summary, back);
    }
}
