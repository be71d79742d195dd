//! # Metamodel - metadata-driven data access
//!
//! Describes data entities (fields, types, relations, display rules) apart
//! from their storage, and applies the same dependencies and row
//! transformations whatever the storage is.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │   Storage   │────▶│  Type       │────▶│ Dependencies │────▶│ Transformers│──▶ rows
//! │ (array/csv) │◀────│  converters │     │  (settings)  │     │ (sub models)│
//! └─────────────┘     └─────────────┘     └──────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use metamodel::{example_definition, ModelDefinition, ModelLoader};
//!
//! let definition: ModelDefinition = serde_json::from_value(example_definition())?;
//! let mut model = ModelLoader::default().build(&definition)?;
//! for row in model.load_all()? {
//!     println!("{}", row["title"]);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`value`] - Row values
//! - [`meta`] - Field metadata store and load/save pipeline
//! - [`filter`] - Storage-neutral filters and sorts
//! - [`dependency`] - Settings derived from row values
//! - [`transform`] - Row transformers and sub models
//! - [`types`] - Field type handlers
//! - [`storage`] - Array and CSV storages
//! - [`parser`] - CSV parsing with auto-detection
//! - [`model`] - Model: metadata plus storage
//! - [`bridge`] - Display formatting
//! - [`loader`] - JSON model definitions
//! - [`config`] - Engine configuration
//! - [`logs`] - Console logger

// Core modules
pub mod error;
pub mod value;
pub mod meta;
pub mod filter;

// Engine
pub mod dependency;
pub mod transform;
pub mod types;

// Storage
pub mod parser;
pub mod storage;
pub mod model;

// Presentation and setup
pub mod bridge;
pub mod loader;
pub mod config;
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    DependencyError, LoaderError, MetaModelError, ModelError, StorageError, TransformError, TypeError,
    DependencyResult, LoaderResult, MetaResult, ModelResult, StorageResult, TransformResult, TypeResult,
};

// =============================================================================
// Re-exports - Values and metadata
// =============================================================================

pub use value::{row_from_json, rows_from_json, rows_to_json, Map, Row, Value};

pub use meta::{BaseType, FieldContext, FieldFn, MetaModel, Setting, Settings};

pub use filter::{Condition, FieldTest, Filter, Sort, SortOrder};

// =============================================================================
// Re-exports - Dependencies
// =============================================================================

pub use dependency::{
    CanEditDependency, Changes, Dependency, Effecteds, LookupOptions, OptionsLookup, ReadonlyDependency,
    SqlOptionsDependency, ValueSwitchDependency,
};

// =============================================================================
// Re-exports - Transformers
// =============================================================================

pub use transform::{
    CrossTabTransformer, JoinTransformer, ModelTransformer, NestedTransformer, OneToManyTransformer,
    RequiredRowsTransformer, SubModelLink, ToManyTransformer,
};

// =============================================================================
// Re-exports - Types
// =============================================================================

pub use types::{ConcatenatedType, DateFormats, DateType, FieldType, JsonType, TypeRegistry, YesNoType};

// =============================================================================
// Re-exports - Storage and model
// =============================================================================

pub use storage::{ArrayStorage, CsvStorage, SaveOutcome, Storage};

pub use parser::{detect_delimiter, detect_encoding, parse_file_auto, CsvError, ParsedCsv};

pub use model::Model;

// =============================================================================
// Re-exports - Bridge, loader, config
// =============================================================================

pub use bridge::{DisplayBridge, FormatMode, Formatted, LazyFormat, RowCursor};

pub use loader::{example_definition, ModelDefinition, ModelLoader};

pub use config::EngineConfig;
