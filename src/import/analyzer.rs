// Reconciliation analyzer - classify observations against the inventory
//
// Construction performs exactly one store read; the index is never
// refreshed mid-batch. Comparison identity is common name plus
// date-normalized expiration - issuer and serial are deliberately ignored.

use crate::model::{CertificateRecord, Observation};
use crate::store::CertificateStore;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

/// What to do with one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    /// Common name not in the inventory: create
    New,
    /// Newer expiration than every known version: archive the most recent,
    /// create from the observation
    Update,
    /// Exact date match with a known version: ignore
    Duplicate,
    /// Older than the most recent known version (or not comparable):
    /// requires a manual decision, never auto-resolved
    Conflict,
    /// Row failed to parse; excluded from classification
    Error,
}

impl std::fmt::Display for ItemAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemAction::New => write!(f, "new"),
            ItemAction::Update => write!(f, "update"),
            ItemAction::Duplicate => write!(f, "duplicate"),
            ItemAction::Conflict => write!(f, "conflict"),
            ItemAction::Error => write!(f, "error"),
        }
    }
}

/// Trimmed view of an inventory record held in the index
#[derive(Debug, Clone)]
pub struct IndexedVersion {
    pub id: u64,
    pub common_name: String,
    pub issuer: String,
    pub valid_until: Option<DateTime<Utc>>,
    /// `valid_until` normalized to date granularity for comparisons
    pub valid_until_date: Option<NaiveDate>,
}

impl IndexedVersion {
    fn from_record(record: &CertificateRecord) -> Self {
        Self {
            id: record.id,
            common_name: record.common_name.clone(),
            issuer: record.issuer.clone(),
            valid_until: record.valid_until,
            valid_until_date: record.valid_until.map(|dt| dt.date_naive()),
        }
    }
}

/// Classification of one observation
#[derive(Debug, Clone)]
pub struct ItemAnalysis {
    pub observation: Observation,
    pub action: ItemAction,
    /// The matched inventory version, when one is relevant
    pub matched: Option<IndexedVersion>,
    pub reason: String,
    pub recommendation: String,
}

/// Counts per action over one batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub new: usize,
    pub update: usize,
    pub duplicate: usize,
    pub conflict: usize,
    pub error: usize,
    pub total: usize,
}

/// Classified batch
#[derive(Debug)]
pub struct BatchAnalysis {
    pub results: Vec<ItemAnalysis>,
    pub summary: BatchSummary,
}

/// Classifies observations against a snapshot of the non-archived inventory
pub struct ReconciliationAnalyzer {
    index: HashMap<String, Vec<IndexedVersion>>,
}

impl ReconciliationAnalyzer {
    /// Build the index with one read of all non-archived records
    pub async fn from_store(store: &dyn CertificateStore) -> crate::Result<Self> {
        Ok(Self::from_records(&store.all_active().await?))
    }

    /// Build the index from an explicit record set
    pub fn from_records(records: &[CertificateRecord]) -> Self {
        let mut index: HashMap<String, Vec<IndexedVersion>> = HashMap::new();
        for record in records {
            index
                .entry(record.common_name.clone())
                .or_default()
                .push(IndexedVersion::from_record(record));
        }
        Self { index }
    }

    /// Number of distinct common names in the index
    pub fn indexed_names(&self) -> usize {
        self.index.len()
    }

    /// Classify a single observation
    pub fn classify(&self, observation: &Observation) -> ItemAnalysis {
        let obs_date = observation.valid_until.map(|dt| dt.date_naive());

        let versions = match self.index.get(&observation.common_name) {
            None => {
                return ItemAnalysis {
                    observation: observation.clone(),
                    action: ItemAction::New,
                    matched: None,
                    reason: "common name not present in the inventory".to_string(),
                    recommendation: "will be created".to_string(),
                };
            }
            Some(versions) => versions,
        };

        // Exact duplicate: same date-normalized expiration as any version
        if let Some(date) = obs_date {
            if let Some(exact) = versions
                .iter()
                .find(|v| v.valid_until_date == Some(date))
            {
                return ItemAnalysis {
                    observation: observation.clone(),
                    action: ItemAction::Duplicate,
                    matched: Some(exact.clone()),
                    reason: "identical certificate already present (same expiration date)"
                        .to_string(),
                    recommendation: "will be ignored".to_string(),
                };
            }
        }

        // The version with the greatest expiration is the current one
        let most_recent = versions
            .iter()
            .max_by_key(|v| v.valid_until_date)
            .expect("index entries are never empty")
            .clone();

        let (obs_date, recent_date) = match (obs_date, most_recent.valid_until_date) {
            (Some(o), Some(r)) => (o, r),
            // No date to compare on one side or the other: a human decides
            _ => {
                return ItemAnalysis {
                    observation: observation.clone(),
                    action: ItemAction::Conflict,
                    matched: Some(most_recent),
                    reason: "no expiration date to compare against the inventory".to_string(),
                    recommendation: "requires manual decision".to_string(),
                };
            }
        };

        if obs_date > recent_date {
            ItemAnalysis {
                observation: observation.clone(),
                action: ItemAction::Update,
                matched: Some(most_recent),
                reason: format!(
                    "newer expiration ({} > {})",
                    obs_date.format("%d/%m/%Y"),
                    recent_date.format("%d/%m/%Y")
                ),
                recommendation: "existing record will be archived, new record created"
                    .to_string(),
            }
        } else {
            ItemAnalysis {
                observation: observation.clone(),
                action: ItemAction::Conflict,
                matched: Some(most_recent),
                reason: format!(
                    "older expiration ({} < {})",
                    obs_date.format("%d/%m/%Y"),
                    recent_date.format("%d/%m/%Y")
                ),
                recommendation: "requires manual decision".to_string(),
            }
        }
    }

    /// Classify a whole batch. Observations flagged with a parse error go
    /// straight to the error bucket and are excluded from classification.
    pub fn classify_batch(&self, observations: &[Observation]) -> BatchAnalysis {
        let mut results = Vec::with_capacity(observations.len());
        let mut summary = BatchSummary {
            total: observations.len(),
            ..BatchSummary::default()
        };

        for observation in observations {
            if let Some(error) = &observation.parse_error {
                summary.error += 1;
                results.push(ItemAnalysis {
                    observation: observation.clone(),
                    action: ItemAction::Error,
                    matched: None,
                    reason: error.clone(),
                    recommendation: "will be ignored".to_string(),
                });
                continue;
            }

            let analysis = self.classify(observation);
            match analysis.action {
                ItemAction::New => summary.new += 1,
                ItemAction::Update => summary.update += 1,
                ItemAction::Duplicate => summary.duplicate += 1,
                ItemAction::Conflict => summary.conflict += 1,
                ItemAction::Error => summary.error += 1,
            }
            results.push(analysis);
        }

        BatchAnalysis { results, summary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImportMethod;
    use chrono::TimeZone;

    fn record(id: u64, name: &str, expires: &str) -> CertificateRecord {
        let mut rec = CertificateRecord::new(
            name.to_string(),
            "Internal-CA-01".to_string(),
            ImportMethod::Csv,
        );
        rec.id = id;
        rec.valid_until = Some(
            Utc.from_utc_datetime(
                &NaiveDate::parse_from_str(expires, "%Y-%m-%d")
                    .unwrap()
                    .and_hms_opt(8, 30, 0)
                    .unwrap(),
            ),
        );
        rec
    }

    fn observation(name: &str, expires: Option<&str>) -> Observation {
        let mut obs = Observation::from_csv(name.to_string(), "Internal-CA-01".to_string(), 2);
        obs.valid_until = expires.map(|e| {
            Utc.from_utc_datetime(
                &NaiveDate::parse_from_str(e, "%Y-%m-%d")
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            )
        });
        obs
    }

    #[test]
    fn test_unknown_name_is_new() {
        let analyzer = ReconciliationAnalyzer::from_records(&[record(1, "x", "2025-01-01")]);
        let analysis = analyzer.classify(&observation("y", Some("2025-06-01")));
        assert_eq!(analysis.action, ItemAction::New);
        assert!(analysis.matched.is_none());
    }

    #[test]
    fn test_same_date_is_duplicate_despite_time_of_day() {
        // Record expires at 08:30, observation at midnight: date granularity
        // makes them the same certificate
        let analyzer = ReconciliationAnalyzer::from_records(&[record(1, "x", "2025-01-01")]);
        let analysis = analyzer.classify(&observation("x", Some("2025-01-01")));
        assert_eq!(analysis.action, ItemAction::Duplicate);
        assert_eq!(analysis.matched.unwrap().id, 1);
    }

    #[test]
    fn test_newer_date_is_update_matched_to_most_recent() {
        let analyzer = ReconciliationAnalyzer::from_records(&[record(1, "x", "2025-01-01")]);
        let analysis = analyzer.classify(&observation("x", Some("2025-06-01")));
        assert_eq!(analysis.action, ItemAction::Update);
        assert_eq!(analysis.matched.unwrap().id, 1);
    }

    #[test]
    fn test_older_date_is_conflict_matched_to_most_recent() {
        let analyzer = ReconciliationAnalyzer::from_records(&[record(1, "x", "2025-06-01")]);
        let analysis = analyzer.classify(&observation("x", Some("2025-01-01")));
        assert_eq!(analysis.action, ItemAction::Conflict);
        assert_eq!(analysis.matched.unwrap().id, 1);
    }

    #[test]
    fn test_update_compares_against_greatest_version() {
        // Three historical versions; only a date beyond 2025-06-01 is an update
        let analyzer = ReconciliationAnalyzer::from_records(&[
            record(1, "x", "2024-01-01"),
            record(2, "x", "2025-06-01"),
            record(3, "x", "2024-08-15"),
        ]);

        let analysis = analyzer.classify(&observation("x", Some("2025-03-01")));
        assert_eq!(analysis.action, ItemAction::Conflict);
        assert_eq!(analysis.matched.as_ref().unwrap().id, 2);

        let analysis = analyzer.classify(&observation("x", Some("2026-01-01")));
        assert_eq!(analysis.action, ItemAction::Update);
        assert_eq!(analysis.matched.unwrap().id, 2);
    }

    #[test]
    fn test_dateless_observation() {
        let analyzer = ReconciliationAnalyzer::from_records(&[record(1, "x", "2025-06-01")]);

        // Known name but nothing to compare: conflict, human decides
        let analysis = analyzer.classify(&observation("x", None));
        assert_eq!(analysis.action, ItemAction::Conflict);

        // Unknown name: plain creation
        let analysis = analyzer.classify(&observation("z", None));
        assert_eq!(analysis.action, ItemAction::New);
    }

    #[test]
    fn test_classify_batch_counts_and_error_routing() {
        let analyzer = ReconciliationAnalyzer::from_records(&[
            record(1, "dup", "2025-01-01"),
            record(2, "upd", "2025-01-01"),
            record(3, "conf", "2025-06-01"),
        ]);

        let observations = vec![
            observation("fresh", Some("2025-01-01")),
            observation("dup", Some("2025-01-01")),
            observation("upd", Some("2025-06-01")),
            observation("conf", Some("2025-01-01")),
            Observation::parse_failure(6, "empty common name".to_string()),
        ];

        let batch = analyzer.classify_batch(&observations);

        assert_eq!(
            batch.summary,
            BatchSummary {
                new: 1,
                update: 1,
                duplicate: 1,
                conflict: 1,
                error: 1,
                total: 5,
            }
        );
        assert_eq!(batch.results.len(), 5);
        assert_eq!(batch.results[4].action, ItemAction::Error);
        assert_eq!(batch.results[4].reason, "empty common name");
    }

    #[tokio::test]
    async fn test_index_excludes_archived_records() {
        use crate::store::{CertificateStore, MemoryStore};

        let store = MemoryStore::new();
        let stored = store.insert(record(0, "x", "2025-01-01")).await.unwrap();
        store.archive(stored.id).await.unwrap();

        let analyzer = ReconciliationAnalyzer::from_store(&store).await.unwrap();
        assert_eq!(analyzer.indexed_names(), 0);

        // With the only version archived, the same name is NEW again
        let analysis = analyzer.classify(&observation("x", Some("2025-01-01")));
        assert_eq!(analysis.action, ItemAction::New);
    }
}
