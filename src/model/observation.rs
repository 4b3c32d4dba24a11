// Observation - a transient, not-yet-persisted description of a certificate
// produced by the CSV reader or by a scan. Never stored directly.

use crate::model::{CertificateRecord, Environment, ImportMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an observation came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObservationSource {
    /// Row of a CSV import (1-based line number in the input file)
    CsvRow { line: usize },
    /// Live handshake scan
    Scan { hostname: String, port: u16 },
}

impl std::fmt::Display for ObservationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationSource::CsvRow { line } => write!(f, "csv line {}", line),
            ObservationSource::Scan { hostname, port } => write!(f, "scan {}:{}", hostname, port),
        }
    }
}

/// Parsed description of a certificate awaiting reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub common_name: String,
    pub issuer: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub serial_number: Option<String>,
    pub fingerprint_sha256: Option<String>,
    pub signature_algorithm: Option<String>,
    pub public_key_size: Option<u32>,
    pub san_list: Vec<String>,
    pub is_self_signed: bool,
    pub is_ca_certificate: bool,
    pub key_usage: Option<String>,
    pub friendly_name: Option<String>,
    pub template_name: Option<String>,
    pub pem_data: Option<String>,
    pub environment: Option<Environment>,
    pub source: ObservationSource,
    /// Set when the row could not be parsed; such observations are routed to
    /// the error bucket and excluded from classification.
    pub parse_error: Option<String>,
}

impl Observation {
    /// Minimal observation from a CSV row
    pub fn from_csv(common_name: String, issuer: String, line: usize) -> Self {
        Self {
            common_name,
            issuer,
            valid_from: None,
            valid_until: None,
            serial_number: None,
            fingerprint_sha256: None,
            signature_algorithm: None,
            public_key_size: None,
            san_list: Vec::new(),
            is_self_signed: false,
            is_ca_certificate: false,
            key_usage: None,
            friendly_name: None,
            template_name: None,
            pem_data: None,
            environment: None,
            source: ObservationSource::CsvRow { line },
            parse_error: None,
        }
    }

    /// Placeholder for a row that failed to parse
    pub fn parse_failure(line: usize, message: String) -> Self {
        let mut obs = Self::from_csv(String::new(), String::new(), line);
        obs.parse_error = Some(message);
        obs
    }

    /// Materialize a record from this observation. Status and days_remaining
    /// are left for the lifecycle calculator at persistence time.
    pub fn into_record(self, import_method: ImportMethod) -> CertificateRecord {
        let scan_port = match &self.source {
            ObservationSource::Scan { port, .. } => Some(*port),
            ObservationSource::CsvRow { .. } => None,
        };
        let mut record =
            CertificateRecord::new(self.common_name, self.issuer, import_method);
        record.valid_from = self.valid_from;
        record.valid_until = self.valid_until;
        record.serial_number = self.serial_number;
        record.fingerprint_sha256 = self.fingerprint_sha256;
        record.signature_algorithm = self.signature_algorithm;
        record.public_key_size = self.public_key_size;
        record.san_list = self.san_list;
        record.is_self_signed = self.is_self_signed;
        record.is_ca_certificate = self.is_ca_certificate;
        record.key_usage = self.key_usage;
        record.friendly_name = self.friendly_name;
        record.template_name = self.template_name;
        record.pem_data = self.pem_data;
        record.environment = self.environment;
        if let Some(port) = scan_port {
            record.scan_port = port;
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failure_is_flagged() {
        let obs = Observation::parse_failure(7, "empty common name".to_string());
        assert!(obs.parse_error.is_some());
        assert_eq!(obs.source, ObservationSource::CsvRow { line: 7 });
    }

    #[test]
    fn test_into_record_carries_fields() {
        let mut obs = Observation::from_csv(
            "gitlab.internal.example".to_string(),
            "Internal-CA-01".to_string(),
            3,
        );
        obs.template_name = Some("WebServer".to_string());
        obs.environment = Some(Environment::Prod);

        let record = obs.into_record(ImportMethod::Csv);
        assert_eq!(record.common_name, "gitlab.internal.example");
        assert_eq!(record.template_name.as_deref(), Some("WebServer"));
        assert_eq!(record.environment, Some(Environment::Prod));
        assert_eq!(record.import_method, ImportMethod::Csv);
    }

    #[test]
    fn test_scan_observation_port() {
        let mut obs = Observation::from_csv("x".into(), "y".into(), 0);
        obs.source = ObservationSource::Scan {
            hostname: "x".to_string(),
            port: 8443,
        };
        let record = obs.into_record(ImportMethod::Scan);
        assert_eq!(record.scan_port, 8443);
    }
}
