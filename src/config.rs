//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$RIGSCAN_CONFIG` (environment variable)
//! 2. `~/.config/rigscan/config.toml` (Linux/macOS)
//!    `%APPDATA%\rigscan\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! The vehicle identifiers have no usable default; validation of the loaded
//! config into a [`crate::classify::Classifier`] fails at startup until
//! `vehicle.vin` and `vehicle.unit_number` are set.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classify::weights::SignalWeights;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// The vehicle whose invoices are being collected.
    pub vehicle: VehicleConfig,
    /// Signal name → point value table. Must cover exactly the known
    /// signal names; validated by [`SignalWeights::from_table`].
    pub weights: BTreeMap<String, i64>,
    /// Keyword and exclusion term sets.
    pub keywords: KeywordConfig,
    /// Scan pass settings.
    pub scan: ScanConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            vehicle: VehicleConfig::default(),
            weights: SignalWeights::default_table(),
            keywords: KeywordConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the data directory for the processed log, run summaries
    /// and the log file.
    pub data_dir: Option<PathBuf>,
}

/// The target vehicle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Full 17-character VIN. Required.
    pub vin: String,
    /// Fleet unit number, e.g. "574". Required.
    pub unit_number: String,
    /// Extra unit phrases matched in addition to the built-in variants
    /// ("Unit 574", "Truck 574", ...), e.g. a nickname painted on the door.
    pub unit_phrases: Vec<String>,
}

/// Keyword and exclusion term sets. Matching is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Mechanic-related keywords matched against the message body.
    pub mechanic: Vec<String>,
    /// Terms in subject or body that force rejection.
    pub exclude: Vec<String>,
    /// Sender substrings that force rejection.
    pub exclude_senders: Vec<String>,
    /// Invoice-indicating subject terms.
    pub subject_terms: Vec<String>,
}

/// Scan pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Minimum confidence for acceptance. A score equal to the threshold
    /// is accepted.
    pub threshold: u32,
    /// Ignore messages received more than this many days ago.
    pub lookback_days: u32,
    /// Where accepted attachments are filed. Defaults to
    /// `<data_dir>/invoices`.
    pub download_dir: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            data_dir: None,
        }
    }
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            mechanic: to_strings(&[
                // Repair & maintenance
                "invoice",
                "repair",
                "mechanic",
                "service",
                "maintenance",
                "preventive maintenance",
                "pm service",
                // Towing
                "tow",
                "towing",
                "roadside",
                "breakdown",
                "recovery",
                // Oil & fluids
                "oil change",
                "lube",
                "lubricant",
                "fluid",
                "coolant",
                "antifreeze",
                "diesel exhaust fluid",
                // Parts & components
                "parts",
                "brake",
                "tire",
                "battery",
                "filter",
                "belt",
                "hose",
                "alternator",
                "starter",
                "transmission",
                "engine",
                "exhaust",
                "dpf",
                "egr",
                "turbo",
                "suspension",
                "steering",
                "axle",
                "wheel",
                "bearing",
                // Labor
                "labor",
                "labour",
                "diagnostic",
                "inspection",
                "dot inspection",
                "annual inspection",
                // Shop names
                "truck shop",
                "truck repair",
                "diesel repair",
                "freightliner",
                "peterbilt",
                "kenworth",
                "volvo",
                "international",
                "mack",
                "ta petro",
                "loves",
                "speedco",
                "rush truck",
            ]),
            exclude: to_strings(&[
                // Rate confirmations & load documents
                "rate confirmation",
                "rate con",
                "ratecon",
                "rate sheet",
                "load confirmation",
                "load tender",
                "dispatch",
                "broker",
                "freight",
                "shipment",
                "bill of lading",
                "proof of delivery",
                "lumper",
                "detention",
                "accessorial",
                // Insurance & registration
                "insurance policy",
                "certificate of insurance",
                "ifta",
                "registration renewal",
                // Fuel reports & receipts (not mechanic invoices)
                "fuel discount report",
                "fuel receipt",
                "comdata",
                "tcheck",
                "pilot flying j",
                // Settlement & pay
                "settlement",
                "pay stub",
                "payroll",
                "direct deposit",
                // Payment notifications (not actual invoices)
                "zelle",
                "payment has been sent",
            ]),
            exclude_senders: to_strings(&[
                "no-reply@dat.com",
                "no-reply@truckstop.com",
                "notifications@keeptruckin.com",
                "notifications@motive.com",
                "noreply@uber.com",
            ]),
            subject_terms: to_strings(&["invoice", "receipt", "bill"]),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threshold: 30,
            lookback_days: 365,
            download_dir: None,
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// A missing file yields the defaults; a file that exists but cannot be
/// read or parsed is a hard error — a mistyped table must not degrade
/// silently into default behavior.
pub fn load_config() -> anyhow::Result<Config> {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Ok(Config::default()),
    }
}

/// Load configuration from a specific file.
pub fn load_config_from(path: &std::path::Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config '{}': {e}", path.display()))?;
    let cfg: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config '{}': {e}", path.display()))?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(cfg)
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("RIGSCAN_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("rigscan").join("config.toml"))
}

/// Return the data directory for the processed log, summaries and logs.
pub fn data_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.data_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rigscan")
}

/// Where accepted attachments are filed.
pub fn download_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.scan.download_dir {
        return dir.clone();
    }
    data_dir(config).join("invoices")
}

/// Path of the durable processed-message log.
pub fn tracker_path(config: &Config) -> PathBuf {
    data_dir(config).join("processed.jsonl")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    data_dir(config).join("rigscan.log")
}
