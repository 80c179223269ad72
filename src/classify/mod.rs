//! The scoring engine: combines extractor outputs into a confidence value.
//!
//! Deterministic and auditable: the same message with the same configuration
//! always yields the same confidence, the same triggered list and the same
//! decision. Exclusion rules run first and are never overridable by positive
//! signal weight.

pub mod signals;
pub mod weights;

use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::model::decision::ClassificationResult;
use crate::model::message::MessageRecord;

use self::signals::VehicleTarget;
use self::weights::SignalWeights;

/// Keyword and exclusion term sets, lowercased once at construction.
#[derive(Debug, Clone, Default)]
pub struct MatchRules {
    /// Mechanic-related keywords matched against the body.
    pub keywords: Vec<String>,
    /// Terms that force rejection when found in subject or body.
    pub exclusion_terms: Vec<String>,
    /// Sender substrings that force rejection.
    pub excluded_senders: Vec<String>,
    /// Invoice-indicating subject terms.
    pub subject_terms: Vec<String>,
}

impl MatchRules {
    fn lowercased(self) -> Self {
        let lower = |v: Vec<String>| -> Vec<String> {
            v.into_iter().map(|s| s.trim().to_lowercase()).collect()
        };
        Self {
            keywords: lower(self.keywords),
            exclusion_terms: lower(self.exclusion_terms),
            excluded_senders: lower(self.excluded_senders),
            subject_terms: lower(self.subject_terms),
        }
    }
}

/// The classification engine. Construct once per run from validated
/// configuration; `classify` is then pure per message.
#[derive(Debug, Clone)]
pub struct Classifier {
    target: VehicleTarget,
    weights: SignalWeights,
    rules: MatchRules,
    threshold: u32,
}

impl Classifier {
    /// Build an engine from already-validated parts.
    pub fn new(
        target: VehicleTarget,
        weights: SignalWeights,
        rules: MatchRules,
        threshold: u32,
    ) -> Self {
        Self {
            target,
            weights,
            rules: rules.lowercased(),
            threshold,
        }
    }

    /// Build and validate an engine from loaded configuration.
    ///
    /// Configuration errors (empty VIN, bad weight table) are fatal here,
    /// before any message is touched.
    pub fn from_config(config: &Config) -> Result<Self> {
        let target = VehicleTarget::new(&config.vehicle.vin, &config.vehicle.unit_number)?
            .with_extra_phrases(&config.vehicle.unit_phrases);
        let weights = SignalWeights::from_table(&config.weights)?;
        let rules = MatchRules {
            keywords: config.keywords.mechanic.clone(),
            exclusion_terms: config.keywords.exclude.clone(),
            excluded_senders: config.keywords.exclude_senders.clone(),
            subject_terms: config.keywords.subject_terms.clone(),
        };
        Ok(Self::new(target, weights, rules, config.scan.threshold))
    }

    /// The acceptance threshold this engine decides against.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Classify one message.
    ///
    /// 1. Exclusion check — if it fires, decision is false with confidence 0
    ///    and no further scoring is performed.
    /// 2. Run the remaining extractors, most-specific VIN match first.
    /// 3. Clamp the summed keyword contribution at `keyword_cap`, then sum.
    /// 4. Accept iff the sum reaches the threshold (`>=`, ties accepted).
    pub fn classify(&self, record: &MessageRecord) -> ClassificationResult {
        let subject = record.subject.to_lowercase();
        let body = record.body.to_lowercase();
        let sender = record.sender.to_lowercase();
        let text = format!("{subject} {body}");

        if let Some(term) = signals::exclusion_match(
            &subject,
            &body,
            &sender,
            &self.rules.exclusion_terms,
            &self.rules.excluded_senders,
        ) {
            debug!(id = %record.id, term = %term, "Exclusion rule fired");
            return ClassificationResult {
                id: record.id.clone(),
                is_invoice: false,
                confidence: 0,
                triggered: vec![format!("excluded: {term}")],
                threshold: self.threshold,
            };
        }

        let mut triggered: Vec<String> = Vec::new();
        let mut confidence: u32 = 0;

        if let Some(hit) = signals::vin_signal(&text, &self.target, &self.weights) {
            confidence += hit.weight;
            triggered.push(hit.name);
        }
        if let Some(hit) = signals::unit_signal(&text, &self.target, &self.weights) {
            confidence += hit.weight;
            triggered.push(hit.name);
        }

        // Keyword contribution is clamped before it joins the total, so
        // many weak hits can never outweigh specific evidence.
        let keyword_hits = signals::keyword_signals(&body, &self.rules.keywords, &self.weights);
        let keyword_sum: u32 = keyword_hits.iter().map(|h| h.weight).sum();
        confidence += keyword_sum.min(self.weights.keyword_cap);
        triggered.extend(keyword_hits.into_iter().map(|h| h.name));

        if let Some(hit) = signals::attachment_signal(&record.attachments, &self.weights) {
            confidence += hit.weight;
            triggered.push(hit.name);
        }
        if let Some(hit) = signals::subject_signal(&subject, &self.rules.subject_terms, &self.weights)
        {
            confidence += hit.weight;
            triggered.push(hit.name);
        }

        let is_invoice = confidence >= self.threshold;
        debug!(
            id = %record.id,
            confidence,
            is_invoice,
            signals = triggered.len(),
            "Classified message"
        );

        ClassificationResult {
            id: record.id.clone(),
            is_invoice,
            confidence,
            triggered,
            threshold: self.threshold,
        }
    }
}
