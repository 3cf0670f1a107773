//! Configuration loading for the bronte gateway
//!
//! This crate provides configuration management for bronte, supporting:
//! - YAML and JSON configuration files
//! - Environment variable fallbacks for every upstream setting
//! - Sensible defaults for all settings
//! - Type-safe configuration structures

pub mod loader;
pub mod schema;

pub use loader::{find_config_file, load_config, load_config_from_file};
pub use schema::{BronteConfig, ModelSettings, ReasoningEffort, UpstreamSettings};
