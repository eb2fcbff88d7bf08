//! # cadence-core
//!
//! Core types, clip selectors, and error handling for the Cadence audio cue engine.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
