//! Event model, payload shapes, and the validator that produces them.

pub mod events;
pub mod payloads;
pub(crate) mod reader;
pub mod subject;
pub mod validate;

#[cfg(test)]
pub(crate) mod fixtures;

pub use events::{Actor, Event, EventKind, Org, RepoRef, filter_events};
pub use subject::{Subject, SubjectError};
pub use validate::{
    ValidatedBatch, ValidationError, Validator, VariantPolicy, validate, validate_each,
    validate_list,
};
