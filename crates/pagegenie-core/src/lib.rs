//! # pagegenie-core
//!
//! Core types, traits, and settings for pagegenie.
//!
//! This crate provides the data model, error taxonomy and channel traits
//! that the client and CLI crates build on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod settings;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use settings::{Settings, SettingsChange, SettingsStore};
pub use traits::*;
