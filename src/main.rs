//! CLI entry point for `rigscan`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use rigscan::classify::Classifier;
use rigscan::config::{self, Config};
use rigscan::model::decision::RunSummary;
use rigscan::scan::{self, ScanOptions};
use rigscan::source::eml::{self, EmlDirSource};
use rigscan::storage::AttachmentVault;
use rigscan::tracker::ProcessedLog;

#[derive(Parser)]
#[command(
    name = "rigscan",
    version,
    about = "Scan exported mail for mechanic invoices belonging to one truck"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (overrides $RIGSCAN_CONFIG and the standard location)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan pass over a directory of .eml files
    Scan {
        maildir: PathBuf,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
        /// Classify only; save nothing, mark nothing as seen
        #[arg(long)]
        dry_run: bool,
        /// Re-classify messages already in the processed log
        #[arg(long)]
        force: bool,
    },
    /// Classify a single .eml file and print the score breakdown
    Classify {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show the processed-message log
    History {
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match cli.config {
        Some(ref path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    // Configure logging: stderr + log file in the data directory
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Scan {
            maildir,
            json,
            dry_run,
            force,
        } => cmd_scan(&config, &maildir, json, ScanOptions { dry_run, force }),
        Commands::Classify { path, json } => cmd_classify(&config, &path, json),
        Commands::History { json } => cmd_history(&config, json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::data_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "rigscan.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Run one scan pass and print its summary.
fn cmd_scan(config: &Config, maildir: &Path, json: bool, options: ScanOptions) -> anyhow::Result<()> {
    let classifier = Classifier::from_config(config)?;
    let mut source = EmlDirSource::new(maildir, config.scan.lookback_days)?;
    let mut log = ProcessedLog::open(config::tracker_path(config))?;
    let vault = AttachmentVault::new(config::download_dir(config))?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Scanning [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let summary = scan::run_scan(
        &mut source,
        &classifier,
        &mut log,
        &vault,
        options,
        Some(&|current, total| {
            pb.set_length(total as u64);
            pb.set_position(current as u64);
        }),
    )?;

    pb.finish_and_clear();

    if !options.dry_run {
        let path = scan::write_summary(&summary, &config::data_dir(config))?;
        tracing::info!(path = %path.display(), "Run summary written");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary_table(&summary, &config::download_dir(config), options.dry_run);
    }

    Ok(())
}

/// Classify a single message and print the audit breakdown.
fn cmd_classify(config: &Config, path: &Path, json: bool) -> anyhow::Result<()> {
    let classifier = Classifier::from_config(config)?;
    let record = eml::parse_eml(path)?;
    let result = classifier.classify(&record);

    if json {
        let output = serde_json::json!({
            "id": result.id,
            "subject": record.subject,
            "sender": record.sender,
            "received": record.received.to_rfc3339(),
            "attachments": record.attachments.len(),
            "is_invoice": result.is_invoice,
            "confidence": result.confidence,
            "threshold": result.threshold,
            "triggered": result.triggered,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  {:<14} {}", "Message", result.id);
    println!("  {:<14} {}", "Subject", record.subject);
    println!("  {:<14} {}", "From", record.sender);
    println!(
        "  {:<14} {}",
        "Received",
        record.received.format("%Y-%m-%d %H:%M")
    );
    println!("  {:<14} {}", "Attachments", record.attachments.len());
    println!();
    println!(
        "  {:<14} {}",
        "Decision",
        if result.is_invoice {
            "MECHANIC INVOICE"
        } else {
            "not an invoice"
        }
    );
    println!(
        "  {:<14} {} (threshold {})",
        "Confidence", result.confidence, result.threshold
    );
    if result.triggered.is_empty() {
        println!("  {:<14} none", "Signals");
    } else {
        println!("  {:<14}", "Signals");
        for name in &result.triggered {
            println!("    - {name}");
        }
    }
    println!();
    Ok(())
}

/// Print the processed-message log.
fn cmd_history(config: &Config, json: bool) -> anyhow::Result<()> {
    let log = ProcessedLog::open(config::tracker_path(config))?;

    if json {
        let entries: Vec<&rigscan::tracker::ProcessedEntry> = log.entries().values().collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!();
    println!("  {} processed message(s)", log.len());
    println!();
    if log.is_empty() {
        return Ok(());
    }

    println!(
        "  {:<17} {:<10} {:>5} {:>6} {:<40}",
        "Scanned", "Outcome", "Conf", "Files", "Message id"
    );
    println!("  {}", "-".repeat(84));
    for entry in log.entries().values() {
        let id_trunc: String = entry.id.chars().take(39).collect();
        println!(
            "  {:<17} {:<10} {:>5} {:>6} {:<40}",
            entry.scanned_at.format("%Y-%m-%d %H:%M"),
            format!("{:?}", entry.outcome).to_lowercase(),
            entry.confidence,
            entry.saved_paths.len(),
            id_trunc
        );
    }
    println!();
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "rigscan", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print the run summary as a human-readable table.
fn print_summary_table(summary: &RunSummary, download_dir: &Path, dry_run: bool) {
    use humansize::{format_size, BINARY};

    println!();
    if dry_run {
        println!("  Dry run: nothing was saved or recorded.");
        println!();
    }
    println!("  {:<28} {}", "Messages scanned", summary.scanned);
    println!("  {:<28} {}", "Invoices found", summary.accepted);
    println!("  {:<28} {}", "Rejected (low confidence)", summary.rejected);
    println!("  {:<28} {}", "Excluded (hard rules)", summary.excluded);
    println!("  {:<28} {}", "Errors", summary.errors);
    println!("  {:<28} {}", "Skipped (already seen)", summary.skipped_seen);
    println!(
        "  {:<28} {} ({})",
        "Attachments saved",
        summary.attachments_saved,
        format_size(summary.bytes_saved, BINARY)
    );
    if summary.attachments_saved > 0 {
        println!("  {:<28} {}", "Download directory", download_dir.display());
    }
    println!();
}
