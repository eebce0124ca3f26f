//! Front end for HPL, a specification language for temporal properties over
//! message-passing systems.
//!
//! Text is parsed into drafts by [`HplParser`], and a [`Validator`] turns
//! drafts into immutable [`Property`] values: every predicate type checked,
//! every reference tied to the event it denotes. Failures come back as
//! [`Diagnostics`] listing every problem found.
//!
//! ```
//! let property = hpl::parse_property(
//!     "globally: /cmd as T causes /fb {x = @T.x} within 5 s",
//! ).unwrap();
//! assert!(property.is_liveness());
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod expr;
pub mod functions;
pub mod logging;
pub mod parser;
pub mod property;
pub mod resolver;
pub mod rewrite;
pub mod typechecker;
pub mod types;
pub mod validate;

#[cfg(test)]
mod proptest_generators;

pub use config::ValidatorConfig;
pub use error::{Diagnostics, ErrorCategory, ErrorKind, HplError};
pub use event::{Disjunction, Event, EventRole, EventTarget, SimpleEvent};
pub use expr::{Expression, Name};
pub use parser::HplParser;
pub use property::{
    Metadata, Pattern, Property, PropertyDraft, PropertyPatch, Scope, Specification, TimeBound,
    TimeUnit,
};
pub use types::{DataType, FieldType, MessageType, MessageTypes};
pub use validate::Validator;

/// Parse and validate a single property with the default configuration
pub fn parse_property(input: &str) -> Result<Property, Diagnostics> {
    Validator::default().parse_property(input)
}

/// Parse and validate one or more properties with the default configuration
pub fn parse_specification(input: &str) -> Result<Specification, Diagnostics> {
    Validator::default().parse_specification(input)
}

/// Parse and type check a standalone predicate
pub fn parse_predicate(input: &str) -> Result<Expression, Diagnostics> {
    Validator::default().parse_predicate(input)
}
