// Record enrichment - fold a fresh scan into an existing inventory record
//
// CSV imports only carry name/issuer/date; a follow-up scan of the host
// fills in the structured metadata. Scan failures are recorded on the
// record, never raised.

use crate::model::CertificateRecord;
use crate::scanner::CertScanner;
use crate::store::CertificateStore;
use chrono::Utc;

/// Result of an enrichment sweep
#[derive(Debug, Default, Clone, Copy)]
pub struct EnrichSummary {
    pub enriched: usize,
    pub failed: usize,
}

/// Scan `record.common_name:record.scan_port` and fold the metadata into the
/// record. On failure the error is stored in `scan_error` and the record is
/// left otherwise untouched; `needs_enrichment` stays set so a later sweep
/// retries.
pub async fn enrich_record(
    scanner: &CertScanner,
    record: &mut CertificateRecord,
) -> bool {
    let hostname = record.common_name.clone();
    record.last_scanned = Some(Utc::now());

    match scanner.scan(&hostname, record.scan_port).await {
        Ok(info) => {
            record.valid_from = info.valid_from;
            record.san_list = info.san_list;
            record.serial_number = Some(info.serial_number);
            record.fingerprint_sha256 = Some(info.fingerprint_sha256);
            record.signature_algorithm = Some(info.signature_algorithm);
            record.public_key_size = info.public_key_size;
            record.pem_data = Some(info.pem_data);
            record.is_self_signed = info.is_self_signed;
            record.is_ca_certificate = info.is_ca_certificate;
            if record.key_usage.is_none() {
                record.key_usage = info.key_usage;
            }
            record.needs_enrichment = false;
            record.scan_error = None;
            true
        }
        Err(e) => {
            record.scan_error = Some(e.to_string());
            false
        }
    }
}

/// Enrich up to `limit` records flagged `needs_enrichment`. Per-record
/// isolation: scan and persistence failures are counted and the sweep
/// continues.
pub async fn enrich_pending(
    scanner: &CertScanner,
    store: &dyn CertificateStore,
    limit: usize,
) -> crate::Result<EnrichSummary> {
    let pending: Vec<CertificateRecord> = store
        .all_active()
        .await?
        .into_iter()
        .filter(|c| c.needs_enrichment)
        .take(limit)
        .collect();

    let mut summary = EnrichSummary::default();

    for mut record in pending {
        let ok = enrich_record(scanner, &mut record).await;

        match store.update(record.clone()).await {
            Ok(_) if ok => summary.enriched += 1,
            Ok(_) => summary.failed += 1,
            Err(e) => {
                tracing::warn!(
                    "failed to persist enrichment for {} (id {}): {}",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImportMethod;
    use crate::store::MemoryStore;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    #[tokio::test]
    async fn test_enrich_failure_recorded_on_record() {
        let store = MemoryStore::new();
        let mut record = CertificateRecord::new(
            "127.0.0.1".to_string(),
            "Internal-CA-01".to_string(),
            ImportMethod::Csv,
        )
        .with_valid_until(Utc::now() + ChronoDuration::days(60));
        record.needs_enrichment = true;
        record.scan_port = 1; // closed port
        store.insert(record).await.unwrap();

        let scanner = CertScanner::new(Duration::from_secs(2), false);
        let summary = enrich_pending(&scanner, &store, 10).await.unwrap();

        assert_eq!(summary.enriched, 0);
        assert_eq!(summary.failed, 1);

        let record = store.get(1).await.unwrap().unwrap();
        assert!(record.scan_error.is_some());
        assert!(record.needs_enrichment, "failed enrichment must be retryable");
        assert!(record.last_scanned.is_some());
    }

    #[tokio::test]
    async fn test_enrich_pending_respects_limit() {
        let store = MemoryStore::new();
        for i in 0..3 {
            let mut record = CertificateRecord::new(
                format!("127.0.0.{}", i + 1),
                "Internal-CA-01".to_string(),
                ImportMethod::Csv,
            );
            record.needs_enrichment = true;
            record.scan_port = 1;
            store.insert(record).await.unwrap();
        }

        let scanner = CertScanner::new(Duration::from_secs(2), false);
        let summary = enrich_pending(&scanner, &store, 2).await.unwrap();
        assert_eq!(summary.enriched + summary.failed, 2);
    }
}
