//! Configuration module for OptiVault
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Engine settings persistence
//! - User routing preferences

pub mod paths;
pub mod preferences;
pub mod settings;

pub use paths::VaultPaths;
pub use preferences::Preferences;
pub use settings::{RatePolicy, Settings};
