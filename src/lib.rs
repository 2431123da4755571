//! A Rust library for declaring an epidemiological cohort study: codelist
//! registries, a shared library of derived variables, per-cohort population
//! predicates, and case-control matching configuration.
//!
//! The crate builds and validates specification objects; bulk data
//! extraction, expectation-based simulation and statistical matching are
//! performed by external engines that consume the serialized
//! specifications.

pub mod codelist;
pub mod codelists;
pub mod error;
pub mod expr;
pub mod matching;
pub mod patient;
pub mod study;
pub mod testing;
pub mod variable;

// Re-export the most common types for easier use
// Core types
pub use codelist::{Codelist, CodelistSource, CodingSystem};
pub use codelists::StudyCodelists;
pub use error::{Result, StudyDefError};

// Predicates and values
pub use expr::{Expr, Literal, Value, VariableContext};

// Variable definitions
pub use variable::{CodedEventQuery, Derivation, Expectations, Variable};

// Study specifications
pub use study::atrial_fibrillation::atrial_fibrillation_cohort;
pub use study::flow_chart::{af_population_flow_chart, general_population_flow_chart};
pub use study::general_population::general_population_cohort;
pub use study::{common_variables, Population, StudyAnchors, StudyDefinition};

// Matching configuration
pub use matching::{af_general_population_matching, MatchRule, MatchingRequest};
