// Batch scanning - bounded worker pool over many targets
//
// Each host is fully isolated: one host failing, timing out or presenting
// garbage never affects another host's result. Results come back in input
// order.

use crate::error::ScanError;
use crate::scanner::{CertInfo, CertScanner};
use crate::utils::network;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Per-host outcome of a batch scan
#[derive(Debug)]
pub struct HostScanResult {
    /// Target as given in the input (host or host:port)
    pub target: String,
    pub result: Result<CertInfo, ScanError>,
}

/// Scan many `host[:port]` targets with at most `max_concurrent` scans in
/// flight. Scanning is latency-bound on network I/O, so the pool keeps the
/// total wall-clock time from degenerating to hosts x timeout.
pub async fn scan_many(
    scanner: &CertScanner,
    targets: &[String],
    default_port: u16,
    max_concurrent: usize,
) -> Vec<HostScanResult> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = Vec::with_capacity(targets.len());

    for target in targets {
        let target = target.clone();
        let semaphore = Arc::clone(&semaphore);
        let scanner = scanner.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");

            let result = match network::split_host_port(&target, default_port) {
                Ok((hostname, port)) => scanner.scan(&hostname, port).await,
                Err(e) => Err(ScanError::Unexpected {
                    target: target.clone(),
                    detail: e.to_string(),
                }),
            };

            HostScanResult { target, result }
        }));
    }

    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok(result) => results.push(result),
            // A panicked task still must not take the batch down; surface it
            // as that host's failure.
            Err(join_err) => results.push(HostScanResult {
                target: String::new(),
                result: Err(ScanError::Unexpected {
                    target: String::new(),
                    detail: format!("scan task failed: {}", join_err),
                }),
            }),
        }
    }

    results
}

/// Read targets from a text file: one `host[:port]` per line, blank lines
/// and `#` comments skipped.
pub fn targets_from_file(path: &std::path::Path) -> crate::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let targets: Vec<String> = content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_string())
        .collect();

    if targets.is_empty() {
        anyhow::bail!("no targets found in file: {}", path.display());
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_batch_isolation_and_order() {
        // All loopback ports are closed; every host must come back with its
        // own error, in input order, without aborting the batch.
        let scanner = CertScanner::new(Duration::from_secs(2), false);
        let targets: Vec<String> = (1..=5).map(|p| format!("127.0.0.1:{}", p)).collect();

        let results = scan_many(&scanner, &targets, 443, 3).await;

        assert_eq!(results.len(), 5);
        for (i, host_result) in results.iter().enumerate() {
            assert_eq!(host_result.target, format!("127.0.0.1:{}", i + 1));
            assert!(host_result.result.is_err());
        }
    }

    #[tokio::test]
    async fn test_unparseable_target_is_per_host_error() {
        let scanner = CertScanner::new(Duration::from_secs(2), false);
        let targets = vec!["127.0.0.1:notaport".to_string()];

        let results = scan_many(&scanner, &targets, 443, 2).await;
        assert!(matches!(
            results[0].result,
            Err(ScanError::Unexpected { .. })
        ));
    }

    #[test]
    fn test_targets_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# inventory\nweb01.example\nweb02.example:8443\n\n").unwrap();

        let targets = targets_from_file(file.path()).unwrap();
        assert_eq!(targets, vec!["web01.example", "web02.example:8443"]);
    }

    #[test]
    fn test_empty_targets_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# only comments").unwrap();
        assert!(targets_from_file(file.path()).is_err());
    }
}
