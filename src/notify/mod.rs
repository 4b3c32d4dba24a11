// Notification pipeline - rule matching, dedup, message composition, send

pub mod email;
pub mod matcher;

pub use email::{MailTransport, OutboundMessage, SmtpMailer};
pub use matcher::{run_rules, MatcherOptions, RuleDisposition, RuleOutcome, RunSummary};
