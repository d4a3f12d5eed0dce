//! Terminal outcome of one processed webhook event.

/// What a handler did with an event. Both variants map to a 200 response;
/// the message is echoed back to the webhook sender and logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A mutation was applied to the destination platform.
    Applied(String),
    /// The event was deliberately not processed (echo, unlinked item,
    /// pull request, unmapped label, ...).
    Skipped(String),
}

impl SyncOutcome {
    pub fn applied(message: impl Into<String>) -> Self {
        Self::Applied(message.into())
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self::Skipped(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Applied(message) | Self::Skipped(message) => message,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Standard skip message for an event touching an item that is either not
/// linked yet or whose change was caused by the engine's own write.
pub fn skip_reason(event: &str, item: impl std::fmt::Display, caused_by_sync: bool) -> String {
    let cause = if caused_by_sync {
        "caused by sync"
    } else {
        "not synced"
    };
    format!("Skipping over {event} for {item} as it is {cause}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_names_the_cause() {
        assert_eq!(
            skip_reason("comment", "#42", false),
            "Skipping over comment for #42 as it is not synced."
        );
        assert_eq!(
            skip_reason("edit", "TEAM-7", true),
            "Skipping over edit for TEAM-7 as it is caused by sync."
        );
    }

    #[test]
    fn outcome_exposes_message_and_kind() {
        let applied = SyncOutcome::applied("Created story.");
        let skipped = SyncOutcome::skipped("Pull request event.");
        assert_eq!(applied.message(), "Created story.");
        assert!(!applied.is_skip());
        assert!(skipped.is_skip());
    }
}
