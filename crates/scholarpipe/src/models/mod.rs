//! Data models and domain types for the scholarpipe pipeline.
//!
//! This module contains the core data structures used throughout the
//! pipeline: candidate and validated records, source declarations, job
//! outcomes, and the API-facing error type. These models provide type safety,
//! serialization support, and validation logic for the pipeline's operation.
//!
//! # Module Organization
//!
//! - [`error`] - API-facing error taxonomy with HTTP response mapping
//! - [`record`] - candidate records, persisted records, and schema enums
//! - [`source`] - source declarations and scheduling metadata
//! - [`job`] - scrape job records, outcomes, and counters

pub mod error;
pub mod job;
pub mod record;
pub mod source;
