// Notification matcher flow: candidate selection, grouped send,
// per-certificate logging, same-day dedup, force bypass, rule isolation

use async_trait::async_trait;
use certitrack::config::EmailConfig;
use certitrack::error::NotifyError;
use certitrack::model::{
    CertificateRecord, ImportMethod, NotificationRule, SendStatus,
};
use certitrack::notify::{run_rules, MailTransport, MatcherOptions, OutboundMessage, RuleDisposition};
use certitrack::store::{CertificateStore, MemoryStore, NotificationLogStore};
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Records messages instead of sending them; can be switched to fail
struct MockTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    fail: AtomicBool,
}

impl MockTransport {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("SMTP unreachable".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn transport_name(&self) -> &str {
        "mock"
    }
}

async fn seed(store: &MemoryStore, name: &str, days: i64) -> CertificateRecord {
    store
        .insert(
            CertificateRecord::new(
                name.to_string(),
                "Internal-CA-01".to_string(),
                ImportMethod::Csv,
            )
            .with_valid_until(Utc::now() + Duration::days(days)),
        )
        .await
        .unwrap()
}

fn email_defaults() -> EmailConfig {
    EmailConfig {
        default_recipients: vec!["ops@example.com".to_string()],
        ..EmailConfig::default()
    }
}

#[tokio::test]
async fn first_run_sends_and_logs_second_run_dedups() {
    let store = MemoryStore::new();
    let a = seed(&store, "a.internal.example", 5).await;
    let b = seed(&store, "b.internal.example", 20).await;
    seed(&store, "far.internal.example", 200).await;

    let rules = vec![NotificationRule::new(1, "30 day warning", 30)];
    let transport = MockTransport::new();
    let email = email_defaults();

    // First run: one grouped message, one Sent entry per candidate
    let summary = run_rules(
        &store,
        &store,
        &rules,
        &email,
        &transport,
        MatcherOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(
        summary.outcomes[0].disposition,
        RuleDisposition::Sent { certificates: 2 }
    );
    assert_eq!(transport.sent_count(), 1);

    {
        let messages = transport.sent.lock().unwrap();
        assert!(messages[0].body.contains("a.internal.example"));
        assert!(messages[0].body.contains("b.internal.example"));
        assert!(!messages[0].body.contains("far.internal.example"));
        assert_eq!(messages[0].recipients, vec!["ops@example.com"]);
    }

    let today = Utc::now().date_naive();
    let entries = store.entries_between(1, today, today).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.status == SendStatus::Sent));
    let mut logged_ids: Vec<u64> = entries.iter().map(|e| e.certificate_id).collect();
    logged_ids.sort_unstable();
    assert_eq!(logged_ids, vec![a.id, b.id]);

    // Second run, same day, no force: nothing sent, nothing logged
    let summary = run_rules(
        &store,
        &store,
        &rules,
        &email,
        &transport,
        MatcherOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(
        summary.outcomes[0].disposition,
        RuleDisposition::AlreadySentToday
    );
    assert_eq!(transport.sent_count(), 1);
    assert_eq!(store.entries_between(1, today, today).await.unwrap().len(), 2);

    // Force is the sanctioned bypass
    let summary = run_rules(
        &store,
        &store,
        &rules,
        &email,
        &transport,
        MatcherOptions {
            force: true,
            dry_run: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(
        summary.outcomes[0].disposition,
        RuleDisposition::Sent { certificates: 2 }
    );
    assert_eq!(transport.sent_count(), 2);
}

#[tokio::test]
async fn failing_rule_logs_failures_and_does_not_block_next_rule() {
    let store = MemoryStore::new();
    let cert = seed(&store, "a.internal.example", 5).await;

    // Both rules match the same certificate; the transport is down
    let mut rule_fail = NotificationRule::new(1, "first", 30);
    rule_fail.recipients = vec!["first@example.com".to_string()];
    let mut rule_after = NotificationRule::new(2, "second", 30);
    rule_after.recipients = vec!["second@example.com".to_string()];

    let transport = MockTransport::new();
    transport.fail.store(true, Ordering::SeqCst);

    let summary = run_rules(
        &store,
        &store,
        &[rule_fail.clone(), rule_after.clone()],
        &email_defaults(),
        &transport,
        MatcherOptions::default(),
    )
    .await
    .unwrap();

    // Both rules were processed despite the first one failing
    assert_eq!(summary.outcomes.len(), 2);
    assert!(matches!(
        summary.outcomes[0].disposition,
        RuleDisposition::Failed { certificates: 1, .. }
    ));
    assert!(matches!(
        summary.outcomes[1].disposition,
        RuleDisposition::Failed { certificates: 1, .. }
    ));

    // Failed attempts are logged per certificate with the error detail
    let today = Utc::now().date_naive();
    let entries = store.entries_between(1, today, today).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].certificate_id, cert.id);
    assert_eq!(entries[0].status, SendStatus::Failed);
    assert!(entries[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("SMTP unreachable"));

    // Failed entries do not count as sent: the next run still alerts
    transport.fail.store(false, Ordering::SeqCst);
    let summary = run_rules(
        &store,
        &store,
        &[rule_fail, rule_after],
        &email_defaults(),
        &transport,
        MatcherOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(
        summary.outcomes[0].disposition,
        RuleDisposition::Sent { certificates: 1 }
    );
    assert_eq!(transport.sent_count(), 2);
}

#[tokio::test]
async fn inactive_rules_are_not_evaluated() {
    let store = MemoryStore::new();
    seed(&store, "a.internal.example", 5).await;

    let mut rule = NotificationRule::new(1, "disabled", 30);
    rule.active = false;

    let transport = MockTransport::new();
    let summary = run_rules(
        &store,
        &store,
        &[rule],
        &email_defaults(),
        &transport,
        MatcherOptions::default(),
    )
    .await
    .unwrap();

    assert!(summary.outcomes.is_empty());
    assert_eq!(transport.sent_count(), 0);
}

#[tokio::test]
async fn expired_certificates_are_never_candidates() {
    let store = MemoryStore::new();
    seed(&store, "expired.internal.example", -3).await;

    let transport = MockTransport::new();
    let summary = run_rules(
        &store,
        &store,
        &[NotificationRule::new(1, "30 day warning", 30)],
        &email_defaults(),
        &transport,
        MatcherOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(
        summary.outcomes[0].disposition,
        RuleDisposition::NoCandidates
    );
}
