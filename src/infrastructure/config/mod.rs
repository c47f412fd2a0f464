//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - Defaults from `Config::default()`
//! - YAML file loading
//! - Environment variable overrides
//! - Configuration validation

pub mod loader;

pub use loader::ConfigLoader;
