#![forbid(unsafe_code)]

//! Core domain model and resolution logic for the liftgraph workout graph.
//!
//! This crate provides:
//! - Domain types (exercises, templates, workout records, collections)
//! - Record validation and memoized parsing
//! - Schema-driven parameter interpretation
//! - Batched reference resolution over cache/network strategies
//! - A JSONL-backed record provider and CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod tags;
pub mod reference;
pub mod validator;
pub mod memo;
pub mod parser;
pub mod params;
pub mod provider;
pub mod store;
pub mod strategy;
pub mod resolver;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use reference::{validate_reference, Reference, ReferenceDiagnostic, ReferenceError};
pub use validator::{validate, ValidationResult};
pub use parser::{parse_record, RecordParser};
pub use params::{interpret, Interpretation, LegacyView, ParameterValue};
pub use provider::{CacheUsage, Filter, RecordProvider};
pub use store::{JsonlRecordStore, LocalProvider};
pub use strategy::{Availability, CacheStrategy, FetchOptions, StrategySelector};
pub use resolver::{
    CollectionContent, ReferenceResolver, Resolved, SingleTemplate, TemplateResolution,
};
pub use export::workout_sets_to_csv;
