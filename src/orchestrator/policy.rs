use crate::{ErrorKind, FetchError};

/// Decides whether a failed server-side fetch should be handed to the client
pub trait FallbackPolicy: Send + Sync {
    fn should_delegate(&self, error: &FetchError) -> bool;
}

/// Case-insensitive substring match on the error text
#[derive(Debug, Clone)]
pub struct MessageHeuristic {
    needles: Vec<String>,
}

impl MessageHeuristic {
    pub fn new<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            needles: needles
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn matches(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.needles.iter().any(|n| message.contains(n.as_str()))
    }
}

impl Default for MessageHeuristic {
    fn default() -> Self {
        Self::new(["blocked", "ip"])
    }
}

impl FallbackPolicy for MessageHeuristic {
    fn should_delegate(&self, error: &FetchError) -> bool {
        self.matches(&error.message)
    }
}

/// Trusts the kind assigned where the error originated.
///
/// `Blocked` always delegates. The message heuristic, when present, is only
/// consulted for `Unknown` errors so that classified failures such as
/// `Disabled` are never delegated because of their wording.
#[derive(Debug, Clone)]
pub struct ClassifiedPolicy {
    heuristic: Option<MessageHeuristic>,
}

impl ClassifiedPolicy {
    pub fn new(heuristic: Option<MessageHeuristic>) -> Self {
        Self { heuristic }
    }

    /// Delegate on `Blocked` only
    pub fn strict() -> Self {
        Self::new(None)
    }
}

impl Default for ClassifiedPolicy {
    fn default() -> Self {
        Self::new(Some(MessageHeuristic::default()))
    }
}

impl FallbackPolicy for ClassifiedPolicy {
    fn should_delegate(&self, error: &FetchError) -> bool {
        match error.kind {
            ErrorKind::Blocked => true,
            ErrorKind::Unknown => self
                .heuristic
                .as_ref()
                .is_some_and(|h| h.matches(&error.message)),
            ErrorKind::InvalidUrl
            | ErrorKind::Disabled
            | ErrorKind::NotFound
            | ErrorKind::Timeout => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_is_case_insensitive() {
        let heuristic = MessageHeuristic::default();
        assert!(heuristic.matches("Request BLOCKED by upstream"));
        assert!(heuristic.matches("Your IP has been flagged"));
        assert!(!heuristic.matches("connection reset"));
    }

    #[test]
    fn test_classified_policy_delegates_blocked() {
        let policy = ClassifiedPolicy::default();
        assert!(policy.should_delegate(&FetchError::blocked("captcha")));
    }

    #[test]
    fn test_classified_policy_applies_heuristic_to_unknown_only() {
        let policy = ClassifiedPolicy::default();

        assert!(policy.should_delegate(&FetchError::unknown("request was blocked")));
        assert!(!policy.should_delegate(&FetchError::unknown("connection reset")));

        // "transcripts" contains "ip", the kind wins
        assert!(!policy.should_delegate(&FetchError::disabled("Transcripts are disabled for this video")));
        assert!(!policy.should_delegate(&FetchError::not_found("No transcript found, ip blocked?")));
        assert!(!policy.should_delegate(&FetchError::new(ErrorKind::Timeout, "blocked")));
    }

    #[test]
    fn test_strict_policy_ignores_messages() {
        let policy = ClassifiedPolicy::strict();
        assert!(!policy.should_delegate(&FetchError::unknown("request was blocked")));
        assert!(policy.should_delegate(&FetchError::blocked("")));
    }
}
