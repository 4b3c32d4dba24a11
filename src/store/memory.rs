// In-memory certificate store with JSON file persistence
//
// Stands in for the external database: keeps the whole inventory and the
// notification log in memory, optionally loaded from / saved to a JSON
// file. All trait methods take the single lock for their whole duration,
// which is what makes `apply_batch` atomic.

use crate::error::StoreError;
use crate::lifecycle;
use crate::model::{CertificateRecord, CertificateStatus, NotificationLogEntry};
use crate::store::traits::{BatchOutcome, BatchPlan, CertificateStore, NotificationLogStore};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

/// Serialized shape of the store file
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    next_id: u64,
    certificates: Vec<CertificateRecord>,
    notification_log: Vec<NotificationLogEntry>,
}

/// In-memory, JSON-file-backed store
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                next_id: 1,
                ..StoreState::default()
            }),
        }
    }

    /// Load a store from a JSON file. A missing file yields an empty store.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if !path.as_ref().exists() {
            return Ok(Self::new());
        }

        let contents = fs::read_to_string(path.as_ref())?;
        let state: StoreState = serde_json::from_str(&contents)?;

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Save the store to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let state = self.state.read().expect("store lock poisoned");
        let json = serde_json::to_string_pretty(&*state)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Number of records, archived included
    pub fn len(&self) -> usize {
        self.state.read().expect("store lock poisoned").certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serial uniqueness check against every record except `exclude_id`
    fn serial_conflict(
        state: &StoreState,
        record: &CertificateRecord,
        exclude_id: Option<u64>,
    ) -> Option<String> {
        let serial = record.serial_number.as_deref()?;
        let clash = state.certificates.iter().any(|c| {
            Some(c.id) != exclude_id && c.serial_number.as_deref() == Some(serial)
        });
        clash.then(|| serial.to_string())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CertificateStore for MemoryStore {
    async fn all(&self) -> Result<Vec<CertificateRecord>, StoreError> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.certificates.clone())
    }

    async fn all_active(&self) -> Result<Vec<CertificateRecord>, StoreError> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state
            .certificates
            .iter()
            .filter(|c| !c.archived)
            .cloned()
            .collect())
    }

    async fn get(&self, id: u64) -> Result<Option<CertificateRecord>, StoreError> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.certificates.iter().find(|c| c.id == id).cloned())
    }

    async fn by_status(
        &self,
        status: CertificateStatus,
    ) -> Result<Vec<CertificateRecord>, StoreError> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state
            .certificates
            .iter()
            .filter(|c| !c.archived && c.status == status)
            .cloned()
            .collect())
    }

    async fn expiring_within(
        &self,
        min_days: i64,
        max_days: i64,
    ) -> Result<Vec<CertificateRecord>, StoreError> {
        let state = self.state.read().expect("store lock poisoned");
        let mut matching: Vec<CertificateRecord> = state
            .certificates
            .iter()
            .filter(|c| {
                !c.archived
                    && matches!(
                        c.status,
                        CertificateStatus::Active | CertificateStatus::ExpiringSoon
                    )
                    && c.days_remaining
                        .map(|d| d >= min_days && d <= max_days)
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        matching.sort_by_key(|c| c.days_remaining);
        Ok(matching)
    }

    async fn insert(
        &self,
        mut record: CertificateRecord,
    ) -> Result<CertificateRecord, StoreError> {
        let mut state = self.state.write().expect("store lock poisoned");

        if let Some(serial) = Self::serial_conflict(&state, &record, None) {
            return Err(StoreError::SerialConflict { serial });
        }

        record.id = state.next_id;
        state.next_id += 1;
        let now = Utc::now();
        record.created_at = now;
        record.updated_at = now;
        lifecycle::apply(&mut record, now);

        state.certificates.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        mut record: CertificateRecord,
    ) -> Result<CertificateRecord, StoreError> {
        let mut state = self.state.write().expect("store lock poisoned");

        if let Some(serial) = Self::serial_conflict(&state, &record, Some(record.id)) {
            return Err(StoreError::SerialConflict { serial });
        }

        let now = Utc::now();
        record.updated_at = now;
        lifecycle::apply(&mut record, now);

        let slot = state
            .certificates
            .iter_mut()
            .find(|c| c.id == record.id)
            .ok_or(StoreError::NotFound { id: record.id })?;
        *slot = record.clone();
        Ok(record)
    }

    async fn archive(&self, id: u64) -> Result<(), StoreError> {
        let mut state = self.state.write().expect("store lock poisoned");
        let slot = state
            .certificates
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound { id })?;
        slot.archived = true;
        slot.updated_at = Utc::now();
        Ok(())
    }

    async fn apply_batch(&self, plan: BatchPlan) -> Result<BatchOutcome, StoreError> {
        let mut state = self.state.write().expect("store lock poisoned");

        // Validate everything before touching the inventory so a failure
        // leaves the store exactly as it was.
        let mut seen: HashSet<&str> = HashSet::new();
        for record in &plan.creates {
            if let Some(serial) = record.serial_number.as_deref() {
                if !seen.insert(serial) {
                    return Err(StoreError::SerialConflict {
                        serial: serial.to_string(),
                    });
                }
                if Self::serial_conflict(&state, record, None).is_some() {
                    return Err(StoreError::SerialConflict {
                        serial: serial.to_string(),
                    });
                }
            }
        }
        for id in &plan.archive_ids {
            if !state.certificates.iter().any(|c| c.id == *id) {
                return Err(StoreError::NotFound { id: *id });
            }
        }

        let now = Utc::now();

        for id in &plan.archive_ids {
            if let Some(slot) = state.certificates.iter_mut().find(|c| c.id == *id) {
                slot.archived = true;
                slot.updated_at = now;
            }
        }

        let mut created = 0;
        for mut record in plan.creates {
            record.id = state.next_id;
            state.next_id += 1;
            record.created_at = now;
            record.updated_at = now;
            lifecycle::apply(&mut record, now);
            state.certificates.push(record);
            created += 1;
        }

        Ok(BatchOutcome {
            created,
            archived: plan.archive_ids.len(),
        })
    }
}

#[async_trait]
impl NotificationLogStore for MemoryStore {
    async fn append(&self, entry: NotificationLogEntry) -> Result<(), StoreError> {
        let mut state = self.state.write().expect("store lock poisoned");
        state.notification_log.push(entry);
        Ok(())
    }

    async fn entries_between(
        &self,
        rule_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NotificationLogEntry>, StoreError> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state
            .notification_log
            .iter()
            .filter(|e| {
                e.rule_id == Some(rule_id) && {
                    let day = e.sent_at.date_naive();
                    day >= from && day <= to
                }
            })
            .cloned()
            .collect())
    }

    async fn rule_sent_on_day(
        &self,
        rule_id: u64,
        day: NaiveDate,
        certificate_ids: &[u64],
    ) -> Result<bool, StoreError> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.notification_log.iter().any(|e| {
            e.rule_id == Some(rule_id)
                && e.status == crate::model::SendStatus::Sent
                && e.sent_at.date_naive() == day
                && certificate_ids.contains(&e.certificate_id)
        }))
    }
}
