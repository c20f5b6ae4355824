#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod client;
mod config;
mod endpoint;
mod error;
mod training;

#[cfg(test)]
mod testing;

pub use crate::client::{ControlPlaneClient, TRACING_TARGET};
pub use crate::config::{ControlPlaneConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
pub use crate::error::{Error, Result};
