//! Synthesized label tables: priority and estimate.
//!
//! Shortcut's numeric priority and estimate fields have no GitHub
//! counterpart; both are represented as labels on the GitHub side. The
//! priority table is fixed and total over 0..=4.

/// One entry of the fixed priority table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityLabel {
    pub name: &'static str,
    pub color: &'static str,
    pub value: u8,
}

pub const PRIORITY_LABELS: [PriorityLabel; 5] = [
    PriorityLabel {
        name: "No priority",
        color: "6b7280",
        value: 0,
    },
    PriorityLabel {
        name: "Urgent",
        color: "dc2626",
        value: 1,
    },
    PriorityLabel {
        name: "High priority",
        color: "f97316",
        value: 2,
    },
    PriorityLabel {
        name: "Medium priority",
        color: "eab308",
        value: 3,
    },
    PriorityLabel {
        name: "Low priority",
        color: "16a34a",
        value: 4,
    },
];

pub const ESTIMATE_LABEL_COLOR: &str = "666666";

pub fn priority_label_for(value: u8) -> Option<&'static PriorityLabel> {
    PRIORITY_LABELS.iter().find(|label| label.value == value)
}

pub fn priority_value_for(name: &str) -> Option<u8> {
    PRIORITY_LABELS
        .iter()
        .find(|label| label.name.eq_ignore_ascii_case(name.trim()))
        .map(|label| label.value)
}

pub fn is_priority_label(name: &str) -> bool {
    priority_value_for(name).is_some()
}

/// Label name representing a story estimate, e.g. `"3 points"`.
pub fn estimate_label_name(points: i64) -> String {
    format!("{points} points")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_mapping_is_total_over_the_enumeration() {
        for value in 0..=4 {
            let label = priority_label_for(value).expect("priority label");
            assert_eq!(label.value, value);
            assert_eq!(priority_value_for(label.name), Some(value));
        }
        assert!(priority_label_for(5).is_none());
    }

    #[test]
    fn priority_lookup_ignores_case_and_padding() {
        assert_eq!(priority_value_for(" urgent "), Some(1));
        assert_eq!(priority_value_for("low PRIORITY"), Some(4));
        assert_eq!(priority_value_for("bug"), None);
        assert!(is_priority_label("No priority"));
        assert!(!is_priority_label("enhancement"));
    }

    #[test]
    fn estimate_labels_spell_out_points() {
        assert_eq!(estimate_label_name(3), "3 points");
        assert_eq!(estimate_label_name(1), "1 points");
    }
}
