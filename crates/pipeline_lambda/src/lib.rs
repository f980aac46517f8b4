//! AWS-oriented adapters and handlers for the dataset pipeline steps.
//!
//! This crate owns runtime integration details (Lambda handlers, object
//! storage, secrets, HTTP and warehouse adapters) and exposes a single
//! runtime module boundary for contract and storage key primitives.

pub mod adapters;
pub mod config;
pub mod error;
pub mod handlers;
pub mod runtime;

pub use error::HandlerError;
