//! # phbench Common Library
//!
//! Shared code for the phbench crates including:
//! - Error type and result alias
//! - Source registry (reference method and force-field models)
//! - Configuration loading and storage root resolution

pub mod config;
pub mod error;
pub mod sources;

pub use error::{Error, Result};
pub use sources::{Capabilities, Source};
