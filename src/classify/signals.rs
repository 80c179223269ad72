//! Signal extractors.
//!
//! Each extractor is a pure function over a message's text and a matching
//! target: no I/O, no shared state, independently testable. The engine does
//! not depend on extractor execution order for correctness, though the audit
//! list preserves evaluation order for readability.
//!
//! All matching is case-insensitive; callers pass pre-lowercased haystacks.

use crate::error::{Result, ScanError};
use crate::model::message::AttachmentRef;

use super::weights::SignalWeights;

/// One fired signal: its audit name and the weight it contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalHit {
    pub name: String,
    pub weight: u32,
}

impl SignalHit {
    fn new(name: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// The vehicle being matched: full VIN, its suffix variants, and the unit
/// number phrases derived from it.
#[derive(Debug, Clone)]
pub struct VehicleTarget {
    vin: String,
    vin_last8: String,
    vin_last6: String,
    vin_last4: String,
    unit_phrases: Vec<String>,
}

impl VehicleTarget {
    /// Derive suffixes and unit phrases from the configured identifiers.
    ///
    /// Fails when the VIN or unit number is absent — without a target
    /// identifier every VIN/unit signal would be dead and the scan
    /// meaningless.
    pub fn new(vin: &str, unit_number: &str) -> Result<Self> {
        let vin = vin.trim().to_lowercase();
        let unit = unit_number.trim().to_lowercase();
        if vin.is_empty() {
            return Err(ScanError::Config("vehicle.vin must be set".to_string()));
        }
        // ASCII is required before suffix slicing below; VINs are ASCII
        // letters and digits by definition anyway.
        if !vin.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ScanError::Config(format!(
                "vehicle.vin '{vin}' must contain only ASCII letters and digits"
            )));
        }
        if vin.len() < 8 {
            return Err(ScanError::Config(format!(
                "vehicle.vin '{vin}' is too short for suffix matching (need at least 8 characters)"
            )));
        }
        if unit.is_empty() {
            return Err(ScanError::Config(
                "vehicle.unit_number must be set".to_string(),
            ));
        }

        let suffix = |n: usize| vin[vin.len() - n..].to_string();
        let unit_phrases = vec![
            unit.clone(),
            format!("unit {unit}"),
            format!("unit#{unit}"),
            format!("unit-{unit}"),
            format!("unit: {unit}"),
            format!("truck {unit}"),
            format!("truck#{unit}"),
        ];

        Ok(Self {
            vin_last8: suffix(8),
            vin_last6: suffix(6),
            vin_last4: suffix(4),
            vin,
            unit_phrases,
        })
    }

    /// Append user-configured unit phrases to the derived variants.
    pub fn with_extra_phrases(mut self, phrases: &[String]) -> Self {
        self.unit_phrases.extend(
            phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty()),
        );
        self
    }

    /// VIN match candidates in specificity order: full > last8 > last6 > last4.
    fn vin_candidates(&self) -> [(&str, &str); 4] {
        [
            ("full_vin", self.vin.as_str()),
            ("vin_last8", self.vin_last8.as_str()),
            ("vin_last6", self.vin_last6.as_str()),
            ("vin_last4", self.vin_last4.as_str()),
        ]
    }
}

/// VIN extractor. Only the single most-specific match fires — a full-VIN hit
/// must not also count as three weaker suffix hits.
pub fn vin_signal(text: &str, target: &VehicleTarget, weights: &SignalWeights) -> Option<SignalHit> {
    for (name, needle) in target.vin_candidates() {
        if text.contains(needle) {
            let weight = match name {
                "full_vin" => weights.full_vin,
                "vin_last8" => weights.vin_last8,
                "vin_last6" => weights.vin_last6,
                _ => weights.vin_last4,
            };
            return Some(SignalHit::new(name, weight));
        }
    }
    None
}

/// Unit-number extractor. Fires once if any configured phrase appears as a
/// whole-word substring ("574", "Unit 574", "Truck 574", ...).
pub fn unit_signal(
    text: &str,
    target: &VehicleTarget,
    weights: &SignalWeights,
) -> Option<SignalHit> {
    target
        .unit_phrases
        .iter()
        .any(|phrase| contains_word(text, phrase))
        .then(|| SignalHit::new("unit_mention", weights.unit_mention))
}

/// Keyword extractor over the message body. Each distinct matched keyword
/// contributes one `keyword_hit`; the engine clamps the summed contribution
/// afterwards. The subject is deliberately not scanned here — subject
/// evidence has its own dedicated signal.
pub fn keyword_signals(body: &str, keywords: &[String], weights: &SignalWeights) -> Vec<SignalHit> {
    keywords
        .iter()
        .filter(|kw| !kw.is_empty() && body.contains(kw.as_str()))
        .map(|kw| SignalHit::new(format!("keyword: {kw}"), weights.keyword_hit))
        .collect()
}

/// Attachment extractor. Fires if at least one attachment looks like a PDF.
pub fn attachment_signal(
    attachments: &[AttachmentRef],
    weights: &SignalWeights,
) -> Option<SignalHit> {
    attachments
        .iter()
        .any(AttachmentRef::is_pdf)
        .then(|| SignalHit::new("has_pdf_attachment", weights.has_pdf_attachment))
}

/// Subject extractor. Fires if the subject contains an invoice-indicating
/// term ("invoice", "receipt", "bill").
pub fn subject_signal(
    subject: &str,
    terms: &[String],
    weights: &SignalWeights,
) -> Option<SignalHit> {
    terms
        .iter()
        .any(|term| !term.is_empty() && subject.contains(term.as_str()))
        .then(|| SignalHit::new("invoice_in_subject", weights.invoice_in_subject))
}

/// Exclusion extractor. Returns the first matched term when the subject or
/// body contains an exclusion keyword, or the sender matches an excluded
/// sender. The engine short-circuits on this result; no positive signal can
/// override it.
///
/// Terms are matched as whole-word phrases: "freight" must not fire inside
/// "Freightliner", or every invoice from a Freightliner dealer would be
/// force-rejected.
pub fn exclusion_match(
    subject: &str,
    body: &str,
    sender: &str,
    exclusion_terms: &[String],
    excluded_senders: &[String],
) -> Option<String> {
    for s in excluded_senders {
        if !s.is_empty() && sender.contains(s.as_str()) {
            return Some(format!("sender {s}"));
        }
    }
    exclusion_terms
        .iter()
        .find(|term| contains_word(subject, term) || contains_word(body, term))
        .cloned()
}

/// Whole-word substring match: the occurrence must not be flanked by
/// alphanumeric characters, so unit "574" does not fire on "5741".
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        from = end;
    }
    false
}
