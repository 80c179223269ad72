//! Signal weight table.
//!
//! Weights are percentage-like point values on a 0–100+ scale. The sum of
//! triggered weights may exceed 100; callers clamp for display only, never
//! for the threshold comparison.

use std::collections::BTreeMap;

use crate::error::{Result, ScanError};

/// Every signal name the engine recognizes. A configured weight table must
/// cover exactly this set — anything else is a configuration error.
pub const SIGNAL_NAMES: [&str; 9] = [
    "full_vin",
    "vin_last8",
    "vin_last6",
    "vin_last4",
    "unit_mention",
    "keyword_hit",
    "keyword_cap",
    "has_pdf_attachment",
    "invoice_in_subject",
];

/// Point values for each named signal.
///
/// `keyword_cap` is not a signal weight itself — it is the ceiling applied
/// to the summed `keyword_hit` contribution, so keyword-stuffed spam can
/// never outweigh specific-evidence signals.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SignalWeights {
    pub full_vin: u32,
    pub vin_last8: u32,
    pub vin_last6: u32,
    pub vin_last4: u32,
    pub unit_mention: u32,
    pub keyword_hit: u32,
    pub keyword_cap: u32,
    pub has_pdf_attachment: u32,
    pub invoice_in_subject: u32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            full_vin: 40,
            vin_last8: 35,
            vin_last6: 25,
            vin_last4: 15,
            unit_mention: 20,
            keyword_hit: 10,
            keyword_cap: 40,
            has_pdf_attachment: 10,
            invoice_in_subject: 15,
        }
    }
}

impl SignalWeights {
    /// Build a weight table from configured name → value entries.
    ///
    /// Rejects unrecognized names, missing names and non-positive values;
    /// a typo in the config must fail loudly, never be silently ignored.
    pub fn from_table(table: &BTreeMap<String, i64>) -> Result<Self> {
        for name in table.keys() {
            if !SIGNAL_NAMES.contains(&name.as_str()) {
                return Err(ScanError::Config(format!(
                    "unrecognized signal weight '{name}'"
                )));
            }
        }

        let get = |name: &str| -> Result<u32> {
            let value = *table
                .get(name)
                .ok_or_else(|| ScanError::Config(format!("missing signal weight '{name}'")))?;
            if value <= 0 {
                return Err(ScanError::Config(format!(
                    "signal weight '{name}' must be a positive integer, got {value}"
                )));
            }
            u32::try_from(value)
                .map_err(|_| ScanError::Config(format!("signal weight '{name}' out of range")))
        };

        Ok(Self {
            full_vin: get("full_vin")?,
            vin_last8: get("vin_last8")?,
            vin_last6: get("vin_last6")?,
            vin_last4: get("vin_last4")?,
            unit_mention: get("unit_mention")?,
            keyword_hit: get("keyword_hit")?,
            keyword_cap: get("keyword_cap")?,
            has_pdf_attachment: get("has_pdf_attachment")?,
            invoice_in_subject: get("invoice_in_subject")?,
        })
    }

    /// The default table in name → value form (used as the config default).
    pub fn default_table() -> BTreeMap<String, i64> {
        let w = Self::default();
        BTreeMap::from([
            ("full_vin".to_string(), i64::from(w.full_vin)),
            ("vin_last8".to_string(), i64::from(w.vin_last8)),
            ("vin_last6".to_string(), i64::from(w.vin_last6)),
            ("vin_last4".to_string(), i64::from(w.vin_last4)),
            ("unit_mention".to_string(), i64::from(w.unit_mention)),
            ("keyword_hit".to_string(), i64::from(w.keyword_hit)),
            ("keyword_cap".to_string(), i64::from(w.keyword_cap)),
            (
                "has_pdf_attachment".to_string(),
                i64::from(w.has_pdf_attachment),
            ),
            (
                "invoice_in_subject".to_string(),
                i64::from(w.invoice_in_subject),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_round_trips() {
        let table = SignalWeights::default_table();
        let weights = SignalWeights::from_table(&table).expect("default table is valid");
        assert_eq!(weights, SignalWeights::default());
    }

    #[test]
    fn test_unrecognized_name_is_config_error() {
        let mut table = SignalWeights::default_table();
        table.insert("vin_last5".to_string(), 10);
        let err = SignalWeights::from_table(&table).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
        assert!(err.to_string().contains("vin_last5"));
    }

    #[test]
    fn test_missing_name_is_config_error() {
        let mut table = SignalWeights::default_table();
        table.remove("unit_mention");
        let err = SignalWeights::from_table(&table).unwrap_err();
        assert!(err.to_string().contains("unit_mention"));
    }

    #[test]
    fn test_non_positive_value_is_config_error() {
        let mut table = SignalWeights::default_table();
        table.insert("keyword_hit".to_string(), 0);
        assert!(SignalWeights::from_table(&table).is_err());

        table.insert("keyword_hit".to_string(), -5);
        assert!(SignalWeights::from_table(&table).is_err());
    }
}
