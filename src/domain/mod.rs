//! Domain layer for the taskdesk service.
//!
//! Contains the entity models, the repository and client ports, and the
//! error taxonomy. Nothing in this module touches a database, a socket,
//! or a clock other than through values passed in.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, FieldError};
