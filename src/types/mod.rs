//! Core types for the joblet engine.
//!
//! - [`id`]: identifier types (`JobId`)

pub mod id;

pub use id::JobId;
