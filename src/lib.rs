//! `rigscan` — finds mechanic invoices for one truck in exported mail.
//!
//! The core is a deterministic, auditable scoring engine: independent
//! weighted signals (VIN specificity, unit-number mentions, keyword hits,
//! attachment and subject heuristics) are summed into a confidence value,
//! hard-exclusion rules override everything, and a durable processed log
//! keeps repeated runs idempotent.

pub mod classify;
pub mod config;
pub mod error;
pub mod model;
pub mod scan;
pub mod source;
pub mod storage;
pub mod tracker;
