//! Data types shared between the mail source, classifier and coordinator.

pub mod decision;
pub mod message;
