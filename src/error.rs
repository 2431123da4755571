//! Error handling for study definition construction.
//!
//! Every failure here is a load-time or build-time failure: a specification
//! that does not validate is unusable and must be corrected at the source.
//! There is no recovery path and no partial registry.

use std::path::PathBuf;

/// Specialized error type for study definition construction
#[derive(Debug, thiserror::Error)]
pub enum StudyDefError {
    /// Error opening or reading a reference file
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path of the file being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Error parsing a reference CSV file
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path of the file being parsed
        path: PathBuf,
        /// Underlying CSV error
        #[source]
        source: csv::Error,
    },

    /// A named column was absent from a reference file header
    #[error("column '{column}' not found in {path}")]
    MissingColumn {
        /// The column that was requested
        column: String,
        /// Path of the file missing the column
        path: PathBuf,
    },

    /// A codelist ended up with no codes
    #[error("codelist '{name}' contains no codes")]
    EmptyCodelist {
        /// Name of the offending codelist
        name: String,
    },

    /// The same code appeared twice within one codelist
    #[error("duplicate code '{code}' in codelist '{name}'")]
    DuplicateCode {
        /// Name of the offending codelist
        name: String,
        /// The duplicated code
        code: String,
    },

    /// Codelists under different coding systems cannot be combined
    #[error("cannot combine codelists from different coding systems: {left} vs {right}")]
    MixedCodingSystems {
        /// Coding system of the first list
        left: String,
        /// Coding system of the conflicting list
        right: String,
    },

    /// The same variable name was declared twice in one study definition
    #[error("duplicate variable '{name}' in study definition '{study}'")]
    DuplicateVariable {
        /// The duplicated variable name
        name: String,
        /// Name of the study definition
        study: String,
    },

    /// A predicate or categorization rule referenced a name that is not defined
    #[error("'{referenced_by}' references undefined variable '{name}'")]
    UndefinedVariable {
        /// The unresolved name
        name: String,
        /// Where the reference occurred
        referenced_by: String,
    },

    /// An ordered comparison was applied to a non-numeric value
    #[error("variable '{name}' does not hold a numeric value")]
    NonNumericComparison {
        /// The variable whose value could not be compared
        name: String,
    },

    /// A simulated-data expectation descriptor is inconsistent
    #[error("invalid expectations for '{name}': {reason}")]
    InvalidExpectations {
        /// Variable (or study) carrying the descriptor
        name: String,
        /// Why the descriptor is invalid
        reason: String,
    },

    /// A matching request is internally inconsistent
    #[error("invalid matching request '{name}': {reason}")]
    InvalidMatching {
        /// Output label of the request
        name: String,
        /// Why the request is invalid
        reason: String,
    },

    /// Error serializing a specification for an external engine
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for study definition operations
pub type Result<T> = std::result::Result<T, StudyDefError>;
