// Batch commit - turn a classified batch into an atomic store plan
//
// Only NEW and UPDATE items change the inventory. DUPLICATE is ignored,
// CONFLICT waits for a human, errors were never classified. The plan is
// applied in one atomic operation: a store failure leaves the inventory
// untouched and is reported as a single batch failure.

use crate::error::StoreError;
use crate::import::analyzer::{BatchAnalysis, ItemAction};
use crate::model::ImportMethod;
use crate::store::{BatchOutcome, BatchPlan, CertificateStore};

/// Extra knobs for materializing records from accepted observations
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitOptions {
    /// Flag created records for a follow-up enrichment scan
    pub auto_enrich: bool,
}

/// Build the store plan for the accepted part of a classified batch
pub fn build_plan(analysis: &BatchAnalysis, options: CommitOptions) -> BatchPlan {
    let mut plan = BatchPlan::default();

    for item in &analysis.results {
        match item.action {
            ItemAction::New => {
                let mut record = item
                    .observation
                    .clone()
                    .into_record(ImportMethod::Csv);
                record.needs_enrichment = options.auto_enrich;
                plan.creates.push(record);
            }
            ItemAction::Update => {
                if let Some(matched) = &item.matched {
                    plan.archive_ids.push(matched.id);
                }
                let mut record = item
                    .observation
                    .clone()
                    .into_record(ImportMethod::Csv);
                record.needs_enrichment = options.auto_enrich;
                plan.creates.push(record);
            }
            ItemAction::Duplicate | ItemAction::Conflict | ItemAction::Error => {}
        }
    }

    plan
}

/// Build and apply the plan in one atomic store operation
pub async fn commit_batch(
    store: &dyn CertificateStore,
    analysis: &BatchAnalysis,
    options: CommitOptions,
) -> Result<BatchOutcome, StoreError> {
    let plan = build_plan(analysis, options);
    if plan.is_empty() {
        return Ok(BatchOutcome::default());
    }
    store.apply_batch(plan).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::analyzer::ReconciliationAnalyzer;
    use crate::model::{CertificateRecord, Observation};
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    fn observation(name: &str, days_from_now: i64) -> Observation {
        let mut obs = Observation::from_csv(name.to_string(), "CA".to_string(), 1);
        obs.valid_until = Some(Utc::now() + Duration::days(days_from_now));
        obs
    }

    #[tokio::test]
    async fn test_plan_covers_new_and_update_only() {
        let store = MemoryStore::new();
        let existing = store
            .insert(
                CertificateRecord::new(
                    "upd.example".to_string(),
                    "CA".to_string(),
                    crate::model::ImportMethod::Csv,
                )
                .with_valid_until(Utc::now() + Duration::days(30)),
            )
            .await
            .unwrap();

        let analyzer = ReconciliationAnalyzer::from_store(&store).await.unwrap();
        let observations = vec![
            observation("new.example", 100),
            observation("upd.example", 400),
        ];
        let batch = analyzer.classify_batch(&observations);

        let plan = build_plan(&batch, CommitOptions::default());
        assert_eq!(plan.creates.len(), 2);
        assert_eq!(plan.archive_ids, vec![existing.id]);

        let outcome = commit_batch(&store, &batch, CommitOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.archived, 1);

        // The superseded version is archived; the name's current version is
        // the newly created one
        assert!(store.get(existing.id).await.unwrap().unwrap().archived);
        let active = store.all_active().await.unwrap();
        assert_eq!(active.len(), 2);
    }

    #[tokio::test]
    async fn test_conflict_and_duplicate_leave_store_untouched() {
        let store = MemoryStore::new();
        store
            .insert(
                CertificateRecord::new(
                    "x.example".to_string(),
                    "CA".to_string(),
                    crate::model::ImportMethod::Csv,
                )
                .with_valid_until(Utc::now() + Duration::days(300)),
            )
            .await
            .unwrap();

        let analyzer = ReconciliationAnalyzer::from_store(&store).await.unwrap();
        let observations = vec![
            observation("x.example", 300), // duplicate
            observation("x.example", 10),  // conflict (older)
        ];
        let batch = analyzer.classify_batch(&observations);

        let outcome = commit_batch(&store, &batch, CommitOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, BatchOutcome::default());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_auto_enrich_flags_created_records() {
        let store = MemoryStore::new();
        let analyzer = ReconciliationAnalyzer::from_store(&store).await.unwrap();
        let batch = analyzer.classify_batch(&[observation("e.example", 60)]);

        commit_batch(&store, &batch, CommitOptions { auto_enrich: true })
            .await
            .unwrap();

        let active = store.all_active().await.unwrap();
        assert!(active[0].needs_enrichment);
    }
}
