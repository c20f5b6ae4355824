//! Mock implementations of the external services for testing.
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! modelgate-core = { version = "...", features = ["test-utils"] }
//! ```
//!
//! Both providers count every call they receive, so tests can assert which
//! collaborators a pipeline run touched.

mod endpoint;
mod training;

pub use endpoint::{MockEndpointBuilder, MockEndpointProvider, Responder};
pub use training::{MockStep, MockTrainingProvider};
