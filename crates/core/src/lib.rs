//! Core business logic for aniseg.
//!
//! [`lifecycle`] holds the pure rules of a report's life: the stage
//! registry, the transition table and the access policy. [`services`]
//! wraps them around the report store and the user repository.

pub mod lifecycle;
pub mod services;

pub use services::*;
