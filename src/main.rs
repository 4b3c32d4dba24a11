// CertiTrack - TLS/SSL certificate lifecycle tracker
// Copyright (C) 2025 CertiTrack contributors
// Licensed under GPL-3.0

use anyhow::Result;
use certitrack::cli::{Cli, Command};
use certitrack::config::TrackerConfig;
use certitrack::import::{self, commit::CommitOptions, CsvOptions, ItemAction};
use certitrack::lifecycle;
use certitrack::model::{CertificateRecord, CertificateStatus, ImportMethod};
use certitrack::notify::{matcher, MatcherOptions, RuleDisposition, SmtpMailer};
use certitrack::scanner::{batch, enrich, CertInfo, CertScanner};
use certitrack::store::{CertificateStore, MemoryStore};
use certitrack::utils::network;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    // Initialize logging - respect RUST_LOG
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        TrackerConfig::from_file(&cli.config)?
    } else {
        TrackerConfig::default()
    };

    let store = MemoryStore::load_from_file(&cli.store)?;

    let changed = run_command(&cli, &config, &store).await?;

    if changed {
        store.save_to_file(&cli.store)?;
    }

    Ok(())
}

/// Dispatch one subcommand. Returns true when the store was modified.
async fn run_command(cli: &Cli, config: &TrackerConfig, store: &MemoryStore) -> Result<bool> {
    match &cli.command {
        Command::Scan {
            host,
            port,
            timeout,
            verify,
            json,
            save,
            environment,
        } => {
            let (hostname, parsed_port) =
                network::split_host_port(host, config.scan.default_port)?;
            let port = (*port).unwrap_or(parsed_port);
            let timeout = (*timeout)
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.scan.timeout());

            let scanner = CertScanner::new(timeout, *verify || config.scan.verify_chain);
            let info = match scanner.scan(&hostname, port).await {
                Ok(info) => info,
                Err(e) => {
                    eprintln!("{} {}", "scan failed:".red().bold(), e);
                    std::process::exit(1);
                }
            };

            if *json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_cert_info(&info);
            }

            if *save {
                let mut record = info.to_observation().into_record(ImportMethod::Scan);
                record.environment = *environment;
                record.last_scanned = Some(chrono::Utc::now());
                let stored = store.insert(record).await?;
                println!(
                    "\n{} saved as record {} ({})",
                    "ok:".green().bold(),
                    stored.id,
                    stored.status
                );
                return Ok(true);
            }
            Ok(false)
        }

        Command::ScanFile { file, save } => {
            let targets = batch::targets_from_file(file)?;
            let scanner = CertScanner::new(config.scan.timeout(), config.scan.verify_chain);

            println!(
                "{} {} targets (max {} concurrent)...\n",
                "Scanning".cyan().bold(),
                targets.len(),
                config.scan.max_concurrent
            );

            let progress = ProgressBar::new_spinner();
            progress.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .expect("invalid template"),
            );
            progress.set_message(format!("scanning {} targets", targets.len()));
            progress.enable_steady_tick(Duration::from_millis(120));

            let results = batch::scan_many(
                &scanner,
                &targets,
                config.scan.default_port,
                config.scan.max_concurrent,
            )
            .await;
            progress.finish_and_clear();

            let mut saved = 0;
            let mut failed = 0;
            for host_result in &results {
                match &host_result.result {
                    Ok(info) => {
                        println!(
                            "{} {:<40} {} (expires {})",
                            "[+]".green(),
                            host_result.target,
                            info.common_name,
                            info.valid_until
                                .map(|d| d.format("%d/%m/%Y").to_string())
                                .unwrap_or_else(|| "?".to_string())
                        );
                        if *save {
                            let mut record =
                                info.to_observation().into_record(ImportMethod::Scan);
                            record.last_scanned = Some(chrono::Utc::now());
                            match store.insert(record).await {
                                Ok(_) => saved += 1,
                                Err(e) => {
                                    eprintln!(
                                        "    {} could not save {}: {}",
                                        "[-]".yellow(),
                                        host_result.target,
                                        e
                                    );
                                }
                            }
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        println!("{} {:<40} {}", "[x]".red(), host_result.target, e);
                    }
                }
            }

            println!(
                "\n{}: {} scanned, {} failed{}",
                "Summary".bold(),
                results.len() - failed,
                failed,
                if *save {
                    format!(", {} saved", saved)
                } else {
                    String::new()
                }
            );

            Ok(*save && saved > 0)
        }

        Command::Import {
            file,
            delimiter,
            no_skip_header,
            environment,
            analyze_only,
            auto_enrich,
        } => {
            let options = CsvOptions {
                delimiter: *delimiter,
                skip_header: !no_skip_header,
                default_environment: *environment,
            };

            let observations = import::read_observations(File::open(file)?, &options)?;
            let analyzer = import::ReconciliationAnalyzer::from_store(store).await?;
            let analysis = analyzer.classify_batch(&observations);

            print_batch_analysis(&analysis);

            if *analyze_only {
                println!("\n{} inventory not modified", "analyze-only:".yellow().bold());
                return Ok(false);
            }

            match import::commit::commit_batch(
                store,
                &analysis,
                CommitOptions {
                    auto_enrich: *auto_enrich,
                },
            )
            .await
            {
                Ok(outcome) => {
                    println!(
                        "\n{} {} created, {} archived",
                        "committed:".green().bold(),
                        outcome.created,
                        outcome.archived
                    );
                    Ok(outcome.created > 0 || outcome.archived > 0)
                }
                Err(e) => {
                    // Atomic batch: nothing was applied
                    eprintln!(
                        "{} {} - no changes were applied",
                        "import failed:".red().bold(),
                        e
                    );
                    std::process::exit(1);
                }
            }
        }

        Command::Add {
            common_name,
            issuer,
            valid_until,
            environment,
        } => {
            let parsed = import::csv::parse_csv_date(valid_until)
                .ok_or_else(|| anyhow::anyhow!("unparseable date: {}", valid_until))?;

            let record = CertificateRecord::new(
                common_name.clone(),
                issuer.clone(),
                ImportMethod::Manual,
            )
            .with_valid_until(parsed)
            .with_environment(*environment);

            let stored = store.insert(record).await?;
            println!(
                "{} {} ({}, {} days remaining)",
                "created:".green().bold(),
                stored.summary(),
                stored.status,
                stored.days_remaining.unwrap_or(0)
            );
            Ok(true)
        }

        Command::List { status, all } => {
            let records = if let Some(status) = status {
                store.by_status(*status).await?
            } else if *all {
                store.all().await?
            } else {
                store.all_active().await?
            };

            if records.is_empty() {
                println!("no matching records");
                return Ok(false);
            }

            println!(
                "{:<5} {:<40} {:<25} {:<13} {:>6}  {}",
                "ID".bold(),
                "COMMON NAME".bold(),
                "ISSUER".bold(),
                "STATUS".bold(),
                "DAYS".bold(),
                "EXPIRES".bold()
            );
            for record in &records {
                let status = match record.status {
                    CertificateStatus::Active => "active".green(),
                    CertificateStatus::ExpiringSoon => "expiring_soon".yellow(),
                    CertificateStatus::Expired => "expired".red(),
                    CertificateStatus::Revoked => "revoked".red().bold(),
                    CertificateStatus::Unknown => "unknown".dimmed(),
                };
                println!(
                    "{:<5} {:<40} {:<25} {:<13} {:>6}  {}{}",
                    record.id,
                    record.common_name,
                    record.issuer,
                    status,
                    record
                        .days_remaining
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    record
                        .valid_until
                        .map(|d| d.format("%d/%m/%Y").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    if record.archived {
                        " (archived)".dimmed().to_string()
                    } else {
                        String::new()
                    }
                );
            }
            Ok(false)
        }

        Command::Recompute => {
            let summary = lifecycle::recompute_all(store).await?;
            println!(
                "{} {} updated, {} unchanged, {} failed",
                "recompute:".green().bold(),
                summary.updated,
                summary.unchanged,
                summary.failed
            );
            Ok(summary.updated > 0)
        }

        Command::CheckExpirations { dry_run, force } => {
            if !config.notifications.enabled && !dry_run {
                println!(
                    "{} notifications are disabled in the configuration",
                    "warning:".yellow().bold()
                );
                return Ok(false);
            }

            let rules = config.rules.clone();
            if rules.iter().filter(|r| r.active).count() == 0 {
                println!("{} no active notification rules", "warning:".yellow().bold());
                return Ok(false);
            }

            let mailer = SmtpMailer::new(config.email.clone());
            let summary = matcher::run_rules(
                store,
                store,
                &rules,
                &config.email,
                &mailer,
                MatcherOptions {
                    dry_run: *dry_run,
                    force: *force,
                },
            )
            .await?;

            for outcome in &summary.outcomes {
                let line = match &outcome.disposition {
                    RuleDisposition::NoCandidates => "no matching certificates".dimmed().to_string(),
                    RuleDisposition::AlreadySentToday => {
                        "already alerted today, skipped".yellow().to_string()
                    }
                    RuleDisposition::NoRecipients => {
                        "no recipients configured".red().to_string()
                    }
                    RuleDisposition::WouldSend {
                        certificates,
                        recipients,
                    } => format!(
                        "[dry-run] would alert {} certificate(s) to {}",
                        certificates,
                        recipients.join(", ")
                    )
                    .cyan()
                    .to_string(),
                    RuleDisposition::Sent { certificates } => {
                        format!("alerted {} certificate(s)", certificates)
                            .green()
                            .to_string()
                    }
                    RuleDisposition::Failed {
                        certificates,
                        error,
                    } => format!("send failed for {} certificate(s): {}", certificates, error)
                        .red()
                        .to_string(),
                };
                println!("{:<30} {}", outcome.rule_name.bold(), line);
            }

            println!(
                "\n{}: {} sent, {} failed, {} skipped",
                "Summary".bold(),
                summary.sent(),
                summary.failed(),
                summary.skipped()
            );

            // Log entries were appended on both success and failure
            Ok(!*dry_run && (summary.sent() > 0 || summary.failed() > 0))
        }

        Command::Enrich { limit } => {
            let scanner = CertScanner::new(config.scan.timeout(), config.scan.verify_chain);
            let summary = enrich::enrich_pending(&scanner, store, *limit).await?;
            println!(
                "{} {} enriched, {} failed",
                "enrich:".green().bold(),
                summary.enriched,
                summary.failed
            );
            Ok(summary.enriched > 0 || summary.failed > 0)
        }

        Command::SendTest { recipient } => {
            let mailer = SmtpMailer::new(config.email.clone());
            match matcher::send_test_message(&config.email, &mailer, recipient).await {
                Ok(()) => println!("{} test message sent to {}", "ok:".green().bold(), recipient),
                Err(e) => {
                    eprintln!("{} {}", "send failed:".red().bold(), e);
                    std::process::exit(1);
                }
            }
            Ok(false)
        }
    }
}

fn print_cert_info(info: &CertInfo) {
    let fmt_date = |d: Option<chrono::DateTime<chrono::Utc>>| {
        d.map(|d| d.format("%d/%m/%Y %H:%M UTC").to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    println!("{}", "Certificate".cyan().bold());
    println!("  Common name:     {}", info.common_name);
    println!("  Issuer:          {}", info.issuer);
    println!("  Valid from:      {}", fmt_date(info.valid_from));
    println!("  Valid until:     {}", fmt_date(info.valid_until));
    println!("  Serial:          {}", info.serial_number);
    println!("  Fingerprint:     {}", info.fingerprint_sha256);
    println!("  Signature:       {}", info.signature_algorithm);
    println!(
        "  Public key:      {}",
        info.public_key_size
            .map(|b| format!("{} bits", b))
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "  Key usage:       {}",
        info.key_usage.as_deref().unwrap_or("-")
    );
    println!(
        "  SAN:             {}",
        if info.san_list.is_empty() {
            "-".to_string()
        } else {
            info.san_list.join(", ")
        }
    );
    println!("  Self-signed:     {}", info.is_self_signed);
    println!("  CA certificate:  {}", info.is_ca_certificate);
}

fn print_batch_analysis(analysis: &import::BatchAnalysis) {
    println!(
        "{:<10} {:<40} {:<10} {}",
        "ACTION".bold(),
        "COMMON NAME".bold(),
        "MATCHED".bold(),
        "REASON".bold()
    );
    for item in &analysis.results {
        let action = match item.action {
            ItemAction::New => "new".green(),
            ItemAction::Update => "update".blue(),
            ItemAction::Duplicate => "duplicate".dimmed(),
            ItemAction::Conflict => "conflict".yellow().bold(),
            ItemAction::Error => "error".red(),
        };
        let name = if item.observation.common_name.is_empty() {
            format!("<{}>", item.observation.source)
        } else {
            item.observation.common_name.clone()
        };
        println!(
            "{:<10} {:<40} {:<10} {}",
            action,
            name,
            item.matched
                .as_ref()
                .map(|m| format!("#{}", m.id))
                .unwrap_or_else(|| "-".to_string()),
            item.reason
        );
    }

    let s = &analysis.summary;
    println!(
        "\n{}: {} new, {} update, {} duplicate, {} conflict, {} error ({} rows)",
        "Analysis".bold(),
        s.new.to_string().green(),
        s.update.to_string().blue(),
        s.duplicate,
        s.conflict.to_string().yellow(),
        s.error.to_string().red(),
        s.total
    );

    if s.conflict > 0 {
        println!(
            "{} conflicts require a manual decision and were not applied",
            "note:".yellow().bold()
        );
    }
}
