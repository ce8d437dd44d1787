//! Domain layer for kokoro-announce
//!
//! Contains the validated value objects every synthesis request is built from,
//! the path safety rules for files the tool reads and writes, and domain errors.
//! Nothing in here talks to the speech engine.

pub mod errors;
pub mod path_safety;
pub mod value_objects;

pub use errors::DomainError;
pub use path_safety::{MAX_TEXT_FILE_SIZE, SafeBases, SafePath, bundle_dir};
pub use value_objects::*;
