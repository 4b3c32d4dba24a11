// Repository interfaces
//
// The persistent storage engine is an external collaborator; the core only
// depends on these traits. Implementations must make `apply_batch` atomic:
// either the whole plan commits or none of it does.

use crate::error::StoreError;
use crate::model::{CertificateRecord, CertificateStatus, NotificationLogEntry};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Changes accepted from one import batch, committed atomically
#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    /// Records to create (from NEW and UPDATE classifications)
    pub creates: Vec<CertificateRecord>,
    /// Superseded records to archive (from UPDATE classifications)
    pub archive_ids: Vec<u64>,
}

impl BatchPlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.archive_ids.is_empty()
    }
}

/// What an applied batch did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub created: usize,
    pub archived: usize,
}

/// Certificate inventory repository
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Every record, archived included (bulk recompute sweeps)
    async fn all(&self) -> Result<Vec<CertificateRecord>, StoreError>;

    /// All non-archived records
    async fn all_active(&self) -> Result<Vec<CertificateRecord>, StoreError>;

    async fn get(&self, id: u64) -> Result<Option<CertificateRecord>, StoreError>;

    /// Non-archived records with the given status
    async fn by_status(
        &self,
        status: CertificateStatus,
    ) -> Result<Vec<CertificateRecord>, StoreError>;

    /// Non-archived records with status Active or ExpiringSoon and
    /// `days_remaining` within `[min_days, max_days]`, ordered by
    /// days_remaining ascending. This is the notification candidate query.
    async fn expiring_within(
        &self,
        min_days: i64,
        max_days: i64,
    ) -> Result<Vec<CertificateRecord>, StoreError>;

    /// Insert a record. Assigns the id, enforces serial-number uniqueness
    /// and runs the lifecycle calculator before storing. Returns the record
    /// as stored.
    async fn insert(
        &self,
        record: CertificateRecord,
    ) -> Result<CertificateRecord, StoreError>;

    /// Update an existing record; runs the lifecycle calculator.
    async fn update(
        &self,
        record: CertificateRecord,
    ) -> Result<CertificateRecord, StoreError>;

    /// Mark a record as superseded
    async fn archive(&self, id: u64) -> Result<(), StoreError>;

    /// Apply an import batch atomically: every create and every archival
    /// commits, or none do.
    async fn apply_batch(&self, plan: BatchPlan) -> Result<BatchOutcome, StoreError>;
}

/// Append-only notification audit log
#[async_trait]
pub trait NotificationLogStore: Send + Sync {
    async fn append(&self, entry: NotificationLogEntry) -> Result<(), StoreError>;

    /// Entries for a rule whose `sent_at` UTC date falls within
    /// `[from, to]` inclusive
    async fn entries_between(
        &self,
        rule_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NotificationLogEntry>, StoreError>;

    /// Dedup check: does a `Sent` entry exist for this rule, dated `day`
    /// (UTC), covering any of the given certificates?
    async fn rule_sent_on_day(
        &self,
        rule_id: u64,
        day: NaiveDate,
        certificate_ids: &[u64],
    ) -> Result<bool, StoreError>;
}
