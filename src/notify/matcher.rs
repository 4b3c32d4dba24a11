// Notification rule matcher
//
// For each active rule: select candidates from the inventory by status and
// days remaining, dedup against the append-only log at calendar-day (UTC)
// granularity, resolve recipients, send one grouped message, append one log
// entry per certificate. A failing rule never stops the rules after it.

use crate::config::EmailConfig;
use crate::error::NotifyError;
use crate::model::{CertificateRecord, NotificationLogEntry, NotificationRule};
use crate::notify::email::{MailTransport, OutboundMessage};
use crate::store::{CertificateStore, NotificationLogStore};
use chrono::Utc;

/// Run flags
#[derive(Debug, Clone, Copy, Default)]
pub struct MatcherOptions {
    /// Bypass the sent-today dedup check. Deliberate use only - this is the
    /// sanctioned way to re-alert within the same day, never a routine path.
    pub force: bool,
    /// Report what would be sent without sending or logging anything
    pub dry_run: bool,
}

/// What happened to one rule during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleDisposition {
    /// No certificate matched; nothing sent, nothing logged
    NoCandidates,
    /// A sent entry for this rule already covers a candidate today
    AlreadySentToday,
    /// Neither the rule nor the global config names a recipient
    NoRecipients,
    /// Dry-run: the message that would have gone out
    WouldSend {
        certificates: usize,
        recipients: Vec<String>,
    },
    Sent {
        certificates: usize,
    },
    /// Send failed; logged per certificate, run continued
    Failed {
        certificates: usize,
        error: String,
    },
}

#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub rule_id: u64,
    pub rule_name: String,
    pub disposition: RuleDisposition,
}

/// Aggregate result of one matcher run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<RuleOutcome>,
}

impl RunSummary {
    pub fn sent(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.disposition, RuleDisposition::Sent { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.disposition, RuleDisposition::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.sent() - self.failed()
    }
}

/// Evaluate every active rule in order.
///
/// The dedup check is read-then-decide against the append-only log, not a
/// lock: concurrent runs are tolerated best-effort and may double-send
/// under a true race.
pub async fn run_rules(
    store: &dyn CertificateStore,
    log: &dyn NotificationLogStore,
    rules: &[NotificationRule],
    email: &EmailConfig,
    transport: &dyn MailTransport,
    options: MatcherOptions,
) -> crate::Result<RunSummary> {
    let mut summary = RunSummary::default();

    for rule in rules.iter().filter(|r| r.active) {
        let disposition = process_rule(store, log, rule, email, transport, options).await?;

        tracing::info!(
            "rule '{}' ({} days): {:?}",
            rule.name,
            rule.days_before_expiration,
            disposition
        );

        summary.outcomes.push(RuleOutcome {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            disposition,
        });
    }

    Ok(summary)
}

async fn process_rule(
    store: &dyn CertificateStore,
    log: &dyn NotificationLogStore,
    rule: &NotificationRule,
    email: &EmailConfig,
    transport: &dyn MailTransport,
    options: MatcherOptions,
) -> crate::Result<RuleDisposition> {
    // Candidates: active or expiring-soon, not yet expired, inside the
    // rule's window
    let mut candidates = store
        .expiring_within(0, rule.days_before_expiration)
        .await?;

    if let Some(env) = rule.environment_filter {
        candidates.retain(|c| c.environment == Some(env));
    }
    if let Some(issuer) = &rule.issuer_filter {
        let needle = issuer.to_lowercase();
        candidates.retain(|c| c.issuer.to_lowercase().contains(&needle));
    }

    if candidates.is_empty() {
        return Ok(RuleDisposition::NoCandidates);
    }

    let candidate_ids: Vec<u64> = candidates.iter().map(|c| c.id).collect();

    if !options.force {
        let today = Utc::now().date_naive();
        if log.rule_sent_on_day(rule.id, today, &candidate_ids).await? {
            return Ok(RuleDisposition::AlreadySentToday);
        }
    }

    let recipients = if !rule.recipients.is_empty() {
        rule.recipients.clone()
    } else {
        email.default_recipients.clone()
    };

    if recipients.is_empty() {
        tracing::error!(
            "no recipients configured for rule '{}' and no global default",
            rule.name
        );
        return Ok(RuleDisposition::NoRecipients);
    }

    let subject = compose_subject(rule, candidates.len());
    let body = compose_body(&candidates, rule.days_before_expiration);

    if options.dry_run {
        return Ok(RuleDisposition::WouldSend {
            certificates: candidates.len(),
            recipients,
        });
    }

    let message = OutboundMessage {
        subject: subject.clone(),
        body: body.clone(),
        recipients: recipients.clone(),
    };

    match transport.send(&message).await {
        Ok(()) => {
            let note = format!("grouped alert covering {} certificate(s)", candidates.len());
            for cert in &candidates {
                append_entry(
                    log,
                    NotificationLogEntry::sent(
                        cert.id,
                        rule.id,
                        recipients.clone(),
                        subject.clone(),
                        note.clone(),
                    ),
                )
                .await;
            }
            Ok(RuleDisposition::Sent {
                certificates: candidates.len(),
            })
        }
        Err(e) => {
            let detail = e.to_string();
            tracing::error!("send failed for rule '{}': {}", rule.name, detail);
            for cert in &candidates {
                append_entry(
                    log,
                    NotificationLogEntry::failed(
                        cert.id,
                        rule.id,
                        recipients.clone(),
                        subject.clone(),
                        detail.clone(),
                    ),
                )
                .await;
            }
            Ok(RuleDisposition::Failed {
                certificates: candidates.len(),
                error: detail,
            })
        }
    }
}

/// A failure to write the audit log must not abort the remaining rules
async fn append_entry(log: &dyn NotificationLogStore, entry: NotificationLogEntry) {
    if let Err(e) = log.append(entry).await {
        tracing::error!("failed to append notification log entry: {}", e);
    }
}

fn compose_subject(rule: &NotificationRule, certificates: usize) -> String {
    if certificates == 1 {
        rule.subject.clone()
    } else {
        format!("{} - {} certificates", rule.subject, certificates)
    }
}

fn compose_body(candidates: &[CertificateRecord], days: i64) -> String {
    let mut listing = String::new();
    for cert in candidates {
        listing.push_str(&format!("- {}\n", cert.summary()));
    }

    format!(
        "Hello,\n\n\
         The following certificates expire within the next {} days:\n\n\
         {}\n\
         Action required: renew these certificates to avoid service interruption.\n\n\
         This is an automated message - please do not reply.\n\n\
         CertiTrack",
        days, listing
    )
}

/// Send a test message to verify the SMTP configuration
pub async fn send_test_message(
    email: &EmailConfig,
    transport: &dyn MailTransport,
    recipient: &str,
) -> Result<(), NotifyError> {
    let message = OutboundMessage {
        subject: "CertiTrack - email configuration test".to_string(),
        body: format!(
            "Hello,\n\n\
             This is a test message from CertiTrack. If you are reading it,\n\
             the email configuration is working.\n\n\
             Sent at {} UTC.\n\n\
             CertiTrack",
            Utc::now().format("%d/%m/%Y %H:%M")
        ),
        recipients: vec![recipient.to_string()],
    };

    transport.send(&message).await?;
    tracing::info!("test message sent to {} via {}", recipient, email.smtp_server);
    Ok(())
}
