// CLI - command line interface and argument parsing

use crate::import::Delimiter;
use crate::model::{CertificateStatus, Environment};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CertiTrack - TLS/SSL certificate lifecycle tracker
#[derive(Parser, Debug)]
#[command(name = "certitrack")]
#[command(author, version)]
#[command(about = "Track TLS/SSL certificate lifecycles and expiration alerts", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE", default_value = "certitrack.toml")]
    pub config: PathBuf,

    /// Inventory store file (JSON)
    #[arg(long, global = true, value_name = "FILE", default_value = "certitrack.json")]
    pub store: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan one host and print the presented certificate
    Scan {
        /// Hostname (host, host:port or URL)
        host: String,

        /// Port to scan
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        port: Option<u16>,

        /// Connection timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Validate the presented chain against the system trust roots
        #[arg(long)]
        verify: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Save the result into the inventory
        #[arg(long)]
        save: bool,

        /// Environment recorded on the saved record
        #[arg(long, value_name = "ENV")]
        environment: Option<Environment>,
    },

    /// Scan every host listed in a file (one host[:port] per line)
    ScanFile {
        file: PathBuf,

        /// Save successful results into the inventory
        #[arg(long)]
        save: bool,
    },

    /// Import certificates from a CSV export, reconciling against the inventory
    Import {
        file: PathBuf,

        /// Column delimiter: tab, semicolon or comma
        #[arg(long, default_value = "tab")]
        delimiter: Delimiter,

        /// Treat the first line as data, not a header
        #[arg(long)]
        no_skip_header: bool,

        /// Environment assigned to every imported row
        #[arg(long, value_name = "ENV")]
        environment: Option<Environment>,

        /// Classify only; do not change the inventory
        #[arg(long)]
        analyze_only: bool,

        /// Flag created records for a follow-up enrichment scan
        #[arg(long)]
        auto_enrich: bool,
    },

    /// Add one certificate manually
    Add {
        /// Common name (server name)
        common_name: String,

        /// Issuing authority
        #[arg(long)]
        issuer: String,

        /// Expiration date (DD/MM/YYYY or YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        valid_until: String,

        #[arg(long, value_name = "ENV")]
        environment: Option<Environment>,
    },

    /// List inventory records
    List {
        /// Restrict to one status
        #[arg(long)]
        status: Option<CertificateStatus>,

        /// Include archived versions
        #[arg(long)]
        all: bool,
    },

    /// Re-derive status and days remaining for every record
    Recompute,

    /// Evaluate notification rules and send expiration alerts
    CheckExpirations {
        /// Show what would be sent without sending
        #[arg(long)]
        dry_run: bool,

        /// Send even if this rule already alerted today
        #[arg(long)]
        force: bool,
    },

    /// Scan records flagged for enrichment and fold in the results
    Enrich {
        /// Maximum records to process
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Send a test message to verify the SMTP configuration
    SendTest {
        /// Recipient address
        recipient: String,
    },
}
