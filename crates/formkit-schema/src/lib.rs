//! formkit schema
//!
//! Declarative form field descriptors compiled into record validators.
//!
//! # Overview
//!
//! - **FieldDescriptor**: one typed input (text, text area, image set, select)
//!   with its constraints
//! - **FormConfiguration**: an ordered, validated list of descriptors plus
//!   persistence and blob storage locations
//! - **SchemaBuilder / FormSchema**: the compiled whole-record validator
//! - **ValidationErrors**: per-field violations, in configuration order
//!
//! # Example
//!
//! ```rust
//! use formkit_schema::{FieldDescriptor, FormConfiguration, FormInput};
//!
//! let config = FormConfiguration::builder()
//!     .field(FieldDescriptor::text("title", "Title").required().min_length(3).max_length(20))
//!     .build()
//!     .unwrap();
//!
//! let schema = config.schema();
//! let errors = schema.validate(&FormInput::new().with("title", "Hi")).unwrap_err();
//! assert_eq!(errors.message("title"), Some("Title must be at least 3 characters"));
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod field;
pub mod schema;
pub mod value;
pub mod violation;

// Re-exports
pub use config::{FormConfiguration, FormConfigurationBuilder, PersistencePath, DEFAULT_TIMESTAMP_FIELD};
pub use error::ConfigurationError;
pub use field::{
    CustomRule, FieldDescriptor, FieldKind, ImageSetConstraints, SelectConstraints, SelectOption,
    TextConstraints,
};
pub use schema::{FieldRules, FormSchema, SchemaBuilder};
pub use value::{FieldValue, FileHandle, FormInput, ValidatedRecord};
pub use violation::{ValidationErrors, Violation, ViolationKind};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for declaring and validating forms
    pub use crate::{
        ConfigurationError, FieldDescriptor, FieldValue, FileHandle, FormConfiguration, FormInput,
        FormSchema, SelectOption, ValidationErrors, ViolationKind,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
