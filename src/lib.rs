//! Taskdesk - multi-tenant task management service core.
//!
//! A stateful engine that:
//! - ingests task events from the API and from OAuth-linked mailboxes,
//! - materializes recurring templates into concrete occurrences via an
//!   in-database scheduled procedure,
//! - mediates every read and write through a role- and
//!   department-scoped authorization layer over Postgres.

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
