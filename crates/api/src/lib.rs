//! HTTP API layer for aniseg.
//!
//! RPC-style endpoints (all `POST` with JSON bodies) over the report
//! lifecycle and user management, plus the bearer-token middleware and
//! extractors they rely on.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
