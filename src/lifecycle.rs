// Lifecycle status calculator
//
// Pure derivation of {status, days_remaining} from a certificate's
// expiration date. Invoked by the persistence layer on every write, and
// re-runnable in bulk over the whole inventory.

use crate::model::{CertificateRecord, CertificateStatus};
use crate::store::CertificateStore;
use chrono::{DateTime, Utc};

/// Certificates expiring in this many days or fewer are `ExpiringSoon`
pub const EXPIRY_WARNING_DAYS: i64 = 30;

const SECONDS_PER_DAY: i64 = 86_400;

/// Derived lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleState {
    pub status: CertificateStatus,
    pub days_remaining: Option<i64>,
}

/// Floor of the number of whole days between `now` and `until`.
///
/// Euclidean division so that an expiry a few hours in the past is day -1,
/// not day 0 - truncation would hold a freshly expired certificate in
/// `ExpiringSoon` for up to a day.
pub fn days_until(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (until - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Derive the lifecycle state for an expiration date at a given instant.
///
/// `current_status` is consulted only for the sticky `Revoked` flag: a
/// manual revocation is never cleared by the calculator. Idempotent -
/// identical inputs always yield identical output.
pub fn evaluate(
    valid_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    current_status: CertificateStatus,
) -> LifecycleState {
    let until = match valid_until {
        Some(until) => until,
        None => {
            return LifecycleState {
                status: CertificateStatus::Unknown,
                days_remaining: None,
            };
        }
    };

    let days_remaining = days_until(until, now);

    let status = if current_status == CertificateStatus::Revoked {
        CertificateStatus::Revoked
    } else if days_remaining < 0 {
        CertificateStatus::Expired
    } else if days_remaining <= EXPIRY_WARNING_DAYS {
        CertificateStatus::ExpiringSoon
    } else {
        CertificateStatus::Active
    };

    LifecycleState {
        status,
        days_remaining: Some(days_remaining),
    }
}

/// Write the derived state into a record. Touches only the two cached
/// fields; everything else is left alone.
pub fn apply(record: &mut CertificateRecord, now: DateTime<Utc>) {
    let state = evaluate(record.valid_until, now, record.status);
    record.status = state.status;
    record.days_remaining = state.days_remaining;
}

/// Result of a bulk recompute sweep
#[derive(Debug, Default, Clone, Copy)]
pub struct RecomputeSummary {
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Re-derive status/days_remaining for every record in the inventory.
///
/// Records are processed independently: a failure to persist one record is
/// counted and the sweep continues.
pub async fn recompute_all(store: &dyn CertificateStore) -> crate::Result<RecomputeSummary> {
    let mut summary = RecomputeSummary::default();

    for record in store.all().await? {
        let before = (record.status, record.days_remaining);
        let state = evaluate(record.valid_until, Utc::now(), record.status);

        if before == (state.status, state.days_remaining) {
            summary.unchanged += 1;
            continue;
        }

        match store.update(record.clone()).await {
            Ok(_) => summary.updated += 1,
            Err(e) => {
                tracing::warn!(
                    "status recompute failed for {} (id {}): {}",
                    record.common_name,
                    record.id,
                    e
                );
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
