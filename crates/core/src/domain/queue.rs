// Queue Domain Model

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};

/// Queue identifier (exact string equality)
pub type QueueName = String;

/// Subscription marker meaning "service every queue"
pub const WILDCARD: &str = "*";

/// Maximum queue name length accepted by `validate_queue_name`
const MAX_QUEUE_NAME_LEN: usize = 128;

/// Which queues a worker pulls from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subscription {
    /// Every queue known to the store; exempt from depth limiting
    Wildcard,
    /// Explicit queues, probed in the listed order before rotation
    Queues(Vec<QueueName>),
}

impl Subscription {
    /// Parse a comma separated list. Any `*` entry makes the worker a wildcard worker.
    pub fn parse(raw: &str) -> Self {
        let queues: Vec<QueueName> = raw
            .split(',')
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .collect();

        if queues.is_empty() || queues.iter().any(|q| q == WILDCARD) {
            Subscription::Wildcard
        } else {
            Subscription::Queues(queues)
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Subscription::Wildcard)
    }
}

impl std::fmt::Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscription::Wildcard => write!(f, "{}", WILDCARD),
            Subscription::Queues(queues) => write!(f, "{}", queues.join(",")),
        }
    }
}

/// Reject names the store cannot hold (empty, oversized, or the wildcard itself)
pub fn validate_queue_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DomainError::InvalidQueueName("queue name is empty".to_string()));
    }
    if name.len() > MAX_QUEUE_NAME_LEN {
        return Err(DomainError::InvalidQueueName(format!(
            "queue name too long ({} > {})",
            name.len(),
            MAX_QUEUE_NAME_LEN
        )));
    }
    if name == WILDCARD || name.contains(',') || name.chars().any(char::is_whitespace) {
        return Err(DomainError::InvalidQueueName(format!(
            "'{}' contains reserved characters",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_explicit_list_keeps_order() {
        let sub = Subscription::parse("mail_outbound, video ,reports");
        assert_eq!(
            sub,
            Subscription::Queues(vec![
                "mail_outbound".to_string(),
                "video".to_string(),
                "reports".to_string()
            ])
        );
        assert!(!sub.is_wildcard());
    }

    #[test]
    fn test_parse_wildcard() {
        assert!(Subscription::parse("*").is_wildcard());
        assert!(Subscription::parse("mail,*").is_wildcard());
        assert!(Subscription::parse("").is_wildcard());
    }

    #[test]
    fn test_validate_queue_name() {
        assert!(validate_queue_name("mail_outbound").is_ok());
        assert!(validate_queue_name("").is_err());
        assert!(validate_queue_name("*").is_err());
        assert!(validate_queue_name("a,b").is_err());
        assert!(validate_queue_name(&"q".repeat(129)).is_err());
    }
}
