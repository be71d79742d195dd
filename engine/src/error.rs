//! Error types for the metamodel engine.
//!
//! This module defines a hierarchy of error types, one per concern:
//!
//! - [`MetaModelError`] - strict field lookups
//! - [`DependencyError`] - dependency configuration and evaluation
//! - [`TransformError`] - transformer configuration and row shape
//! - [`TypeError`] - type handler configuration
//! - [`StorageError`] - storage collaborator failures
//! - [`LoaderError`] - model definitions and registries
//! - [`ModelError`] - top-level load/save orchestration
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Soft misses (unknown setting, alias not found, no switch branch for a
//! row) are never errors; they surface as `Option` or empty results.

use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// MetaModel Errors
// =============================================================================

/// Errors from strict metadata lookups.
#[derive(Debug, Error)]
pub enum MetaModelError {
    /// Field does not exist in the model.
    #[error("Unknown field '{field}' in model '{model}'")]
    UnknownField { field: String, model: String },

    /// A setting expected to hold a list or map holds something else.
    #[error("Setting '{setting}' of field '{field}' cannot be extended: {message}")]
    SettingShape {
        field: String,
        setting: String,
        message: String,
    },
}

// =============================================================================
// Dependency Errors
// =============================================================================

/// Errors from dependency configuration and evaluation.
#[derive(Debug, Error)]
pub enum DependencyError {
    /// Switch table nesting does not match the depends-on fields.
    #[error("Malformed switch table at depth {depth}: {message}")]
    MalformedSwitch { depth: usize, message: String },

    /// A dependency returned a change it never declared as effected.
    #[error("Dependency changed undeclared setting '{setting}' of field '{field}'")]
    UndeclaredChange { field: String, setting: String },

    /// A dependency was built without a required collaborator or field.
    #[error("Dependency is missing {0}")]
    MissingConfiguration(String),

    /// The options lookup failed.
    #[error("Options lookup failed: {0}")]
    Options(#[from] StorageError),
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors from transformer configuration and row shape.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A sub model link was declared without join fields.
    #[error("Transformer '{0}' has no join fields")]
    NoJoinFields(String),

    /// Nested rows under a field are not a list of rows.
    #[error("Field '{field}' must hold a list of rows, found {found}")]
    NotRowList { field: String, found: String },

    /// Crosstab without pivot configuration.
    #[error("Crosstab transformer needs an id field and a value field")]
    MissingCrosstabFields,
}

// =============================================================================
// Type Handler Errors
// =============================================================================

/// Errors from type handler configuration.
#[derive(Debug, Error)]
pub enum TypeError {
    /// A date format uses a directive that has no equivalent.
    #[error("Unsupported date format character '{character}' in '{format}'")]
    UnsupportedFormat { format: String, character: char },

    /// Unknown base type constant.
    #[error("Unknown base type constant: {0}")]
    UnknownBaseType(i64),
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors from the storage collaborators.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to read or write a file.
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// CSV writing failed.
    #[error("CSV write error: {0}")]
    CsvWrite(#[from] csv::Error),

    /// The backend cannot evaluate raw filter expressions.
    #[error("Raw filter expression not supported by {backend}: {expression}")]
    RawExpression { backend: String, expression: String },

    /// The backend does not accept writes.
    #[error("Storage '{0}' is read-only")]
    ReadOnly(String),
}

// =============================================================================
// Loader Errors
// =============================================================================

/// Errors from model definitions and class registries.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// No dependency registered under this name.
    #[error("Unknown dependency class: {0}")]
    UnknownDependency(String),

    /// No type registered under this name.
    #[error("Unknown type class: {0}")]
    UnknownType(String),

    /// No transformer registered under this name.
    #[error("Unknown transformer class: {0}")]
    UnknownTransformer(String),

    /// Definition is structurally valid JSON but semantically wrong.
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    /// Definition could not be read.
    #[error("Definition IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Definition JSON error.
    #[error("Definition JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Dependency failed while being attached.
    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    /// Type handler failed while being built.
    #[error("Type error: {0}")]
    Type(#[from] TypeError),

    /// Transformer failed while being built.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Storage failed while being opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

// =============================================================================
// Model Errors (top-level)
// =============================================================================

/// Top-level errors returned by model load/save/delete.
///
/// It wraps all lower-level errors so the pipeline can use `?` freely.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Metadata lookup error.
    #[error("MetaModel error: {0}")]
    Meta(#[from] MetaModelError),

    /// Dependency error.
    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    /// Transformer error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Type handler error.
    #[error("Type error: {0}")]
    Type(#[from] TypeError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Loader error.
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for strict metadata lookups.
pub type MetaResult<T> = Result<T, MetaModelError>;

/// Result type for dependency operations.
pub type DependencyResult<T> = Result<T, DependencyError>;

/// Result type for transformer configuration.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for type handler operations.
pub type TypeResult<T> = Result<T, TypeError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // StorageError -> DependencyError -> ModelError
        let storage_err = StorageError::ReadOnly("lookup".into());
        let dep_err: DependencyError = storage_err.into();
        let model_err: ModelError = dep_err.into();
        assert!(model_err.to_string().contains("read-only"));

        // TransformError -> ModelError
        let transform_err = TransformError::NoJoinFields("children".into());
        let model_err: ModelError = transform_err.into();
        assert!(model_err.to_string().contains("children"));
    }

    #[test]
    fn test_unknown_field_names_field_and_model() {
        let err = MetaModelError::UnknownField {
            field: "title".into(),
            model: "works".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("title"));
        assert!(msg.contains("works"));
    }
}
