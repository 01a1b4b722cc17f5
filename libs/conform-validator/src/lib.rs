//! Multi-layer validation engine for healthcare-interchange resources
//! against StructureDefinition schemas.
//!
//! Schemas are loaded into a [`Registry`], a [`Validator`] is built against
//! it with a [`ValidatorOptions`] record, and [`Validator::validate`] (or
//! [`Validator::validate_parsed`]) runs the fixed pass order described in
//! the crate's design notes, accumulating [`Issue`]s into a
//! [`ValidationResult`].

mod cancel;
pub mod checks;
mod element_index;
mod error;
mod options;
mod primitive;
mod registry;
mod result;
mod validator;

pub use cancel::CancelToken;
pub use checks::terminology::{Lookup, TerminologyService};
pub use error::{ConfigError, Error, Result};
pub use options::ValidatorOptions;
pub use registry::Registry;
pub use result::{Issue, IssueCode, IssueSeverity, ValidationResult};
pub use validator::{new_validator, ReferenceResolver, Validator};
