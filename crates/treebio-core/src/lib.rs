//! Core utilities and types shared across all Treebio crates

pub mod error;
pub mod error_builder;
pub mod problemdetails;
pub mod types;

pub use error::*;
pub use error_builder::*;
pub use problemdetails::ProblemDetails;
pub use types::*;

// Re-export external dependencies
pub use anyhow;
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tokio;
pub use tracing;
