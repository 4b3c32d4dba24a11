// CertiTrack - TLS/SSL certificate lifecycle tracker
// Copyright (C) 2025 CertiTrack contributors
// Licensed under GPL-3.0

//! CertiTrack keeps an inventory of TLS/SSL certificates collected from
//! manual entry, bulk CSV import and live handshake scans, reconciles new
//! observations against the existing inventory, derives each record's
//! lifecycle status from its expiration date, and sends deduplicated
//! expiration alerts driven by notification rules.

pub mod cli;
pub mod config;
pub mod error;
pub mod import;
pub mod lifecycle;
pub mod model;
pub mod notify;
pub mod scanner;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use crate::cli::Cli;
pub use crate::config::TrackerConfig;
pub use crate::model::{CertificateRecord, CertificateStatus};
pub use crate::scanner::CertScanner;

/// Result type for CertiTrack operations
pub type Result<T> = anyhow::Result<T>;
