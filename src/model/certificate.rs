// Certificate record model
// One row of the inventory. Several records may share a common name
// (historical versions); superseded versions are archived, never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a certificate record.
///
/// Always re-derivable from `valid_until`, the current time and the sticky
/// `Revoked` flag - the stored value is a cache, never the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Unknown,
    Active,
    ExpiringSoon,
    Expired,
    Revoked,
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertificateStatus::Unknown => write!(f, "unknown"),
            CertificateStatus::Active => write!(f, "active"),
            CertificateStatus::ExpiringSoon => write!(f, "expiring_soon"),
            CertificateStatus::Expired => write!(f, "expired"),
            CertificateStatus::Revoked => write!(f, "revoked"),
        }
    }
}

impl std::str::FromStr for CertificateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(CertificateStatus::Unknown),
            "active" => Ok(CertificateStatus::Active),
            "expiring_soon" | "expiring-soon" => Ok(CertificateStatus::ExpiringSoon),
            "expired" => Ok(CertificateStatus::Expired),
            "revoked" => Ok(CertificateStatus::Revoked),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// How a record entered the inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMethod {
    Manual,
    Csv,
    Scan,
}

impl std::fmt::Display for ImportMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportMethod::Manual => write!(f, "manual"),
            ImportMethod::Csv => write!(f, "csv"),
            ImportMethod::Scan => write!(f, "scan"),
        }
    }
}

/// Deployment environment of the certificate holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Prod,
    Uat,
    Test,
    Dev,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Prod => write!(f, "prod"),
            Environment::Uat => write!(f, "uat"),
            Environment::Test => write!(f, "test"),
            Environment::Dev => write!(f, "dev"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(Environment::Prod),
            "uat" => Ok(Environment::Uat),
            "test" => Ok(Environment::Test),
            "dev" | "development" => Ok(Environment::Dev),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

/// Durable certificate record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub id: u64,
    pub common_name: String,
    pub issuer: String,
    pub valid_from: Option<DateTime<Utc>>,
    /// Expiration. `None` only for manual/CSV rows whose date was
    /// unparseable; such records stay in `Unknown` status.
    pub valid_until: Option<DateTime<Utc>>,
    /// Uppercase hex, globally unique across non-`None` values
    pub serial_number: Option<String>,
    /// Uppercase hex SHA-256 of the DER certificate
    pub fingerprint_sha256: Option<String>,
    pub signature_algorithm: Option<String>,
    pub public_key_size: Option<u32>,
    pub san_list: Vec<String>,
    pub is_self_signed: bool,
    pub is_ca_certificate: bool,
    /// Human-readable key usage roles, e.g. "Digital Signature, Server Authentication"
    pub key_usage: Option<String>,
    pub friendly_name: Option<String>,
    pub template_name: Option<String>,
    pub pem_data: Option<String>,
    pub import_method: ImportMethod,
    pub environment: Option<Environment>,
    pub status: CertificateStatus,
    /// Cached derived value, floor days until expiration (may be negative)
    pub days_remaining: Option<i64>,
    /// True once superseded by a newer version of the same common name
    pub archived: bool,
    pub scan_port: u16,
    /// Set on CSV rows that should be enriched by a follow-up scan
    pub needs_enrichment: bool,
    pub last_scanned: Option<DateTime<Utc>>,
    pub scan_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CertificateRecord {
    /// Create a bare record. Status and days_remaining are filled in by the
    /// lifecycle calculator when the record is persisted.
    pub fn new(common_name: String, issuer: String, import_method: ImportMethod) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
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
            import_method,
            environment: None,
            status: CertificateStatus::Unknown,
            days_remaining: None,
            archived: false,
            scan_port: 443,
            needs_enrichment: false,
            last_scanned: None,
            scan_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the expiration date
    pub fn with_valid_until(mut self, valid_until: DateTime<Utc>) -> Self {
        self.valid_until = Some(valid_until);
        self
    }

    /// Set the deployment environment
    pub fn with_environment(mut self, environment: Option<Environment>) -> Self {
        self.environment = environment;
        self
    }

    /// Set the serial number (uppercase hex)
    pub fn with_serial(mut self, serial: String) -> Self {
        self.serial_number = Some(serial);
        self
    }

    /// Has the record been manually revoked?
    pub fn is_revoked(&self) -> bool {
        self.status == CertificateStatus::Revoked
    }

    /// `name (expires DD/MM/YYYY)` summary used in listings and messages
    pub fn summary(&self) -> String {
        match self.valid_until {
            Some(until) => format!("{} (expires {})", self.common_name, until.format("%d/%m/%Y")),
            None => format!("{} (no expiration date)", self.common_name),
        }
    }
}
