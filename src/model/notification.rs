// Notification rules and the append-only notification log

use crate::model::Environment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_subject() -> String {
    "SSL/TLS certificate expiring soon".to_string()
}

fn default_active() -> bool {
    true
}

/// Expiration alert rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRule {
    pub id: u64,
    pub name: String,
    /// Certificates expiring in this many days or fewer match the rule
    pub days_before_expiration: i64,
    /// Rule-specific recipients; falls back to the global default list when empty
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Exact-match environment restriction
    #[serde(default)]
    pub environment_filter: Option<Environment>,
    /// Substring restriction on the issuer
    #[serde(default)]
    pub issuer_filter: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl NotificationRule {
    pub fn new(id: u64, name: &str, days_before_expiration: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            days_before_expiration,
            recipients: Vec::new(),
            subject: default_subject(),
            environment_filter: None,
            issuer_filter: None,
            active: true,
        }
    }
}

/// Outcome of a send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Sent,
    Failed,
}

/// Immutable audit record of one send attempt for one certificate.
/// Appended by the notification matcher, read back only for dedup checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationLogEntry {
    pub certificate_id: u64,
    pub rule_id: Option<u64>,
    pub status: SendStatus,
    pub recipients: Vec<String>,
    pub subject: String,
    pub message: String,
    pub error_message: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl NotificationLogEntry {
    pub fn sent(
        certificate_id: u64,
        rule_id: u64,
        recipients: Vec<String>,
        subject: String,
        message: String,
    ) -> Self {
        Self {
            certificate_id,
            rule_id: Some(rule_id),
            status: SendStatus::Sent,
            recipients,
            subject,
            message,
            error_message: None,
            sent_at: Utc::now(),
        }
    }

    pub fn failed(
        certificate_id: u64,
        rule_id: u64,
        recipients: Vec<String>,
        subject: String,
        error: String,
    ) -> Self {
        Self {
            certificate_id,
            rule_id: Some(rule_id),
            status: SendStatus::Failed,
            recipients,
            subject,
            message: String::new(),
            error_message: Some(error),
            sent_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_defaults_from_toml() {
        let rule: NotificationRule = toml::from_str(
            r#"
            id = 1
            name = "30 day warning"
            days_before_expiration = 30
            "#,
        )
        .unwrap();

        assert!(rule.active);
        assert!(rule.recipients.is_empty());
        assert_eq!(rule.subject, "SSL/TLS certificate expiring soon");
        assert_eq!(rule.environment_filter, None);
    }

    #[test]
    fn test_log_entry_sent() {
        let entry = NotificationLogEntry::sent(
            42,
            1,
            vec!["ops@example.com".to_string()],
            "subject".to_string(),
            "body".to_string(),
        );
        assert_eq!(entry.status, SendStatus::Sent);
        assert_eq!(entry.rule_id, Some(1));
        assert!(entry.error_message.is_none());
    }

    #[test]
    fn test_log_entry_failed() {
        let entry = NotificationLogEntry::failed(
            42,
            1,
            vec![],
            "subject".to_string(),
            "SMTP unreachable".to_string(),
        );
        assert_eq!(entry.status, SendStatus::Failed);
        assert_eq!(entry.error_message.as_deref(), Some("SMTP unreachable"));
    }
}
