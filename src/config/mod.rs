//! Configuration loading and management.
//!
//! - [`types`]: config struct definitions and `Config::load`
//! - [`validation`]: startup checks run before connecting

mod types;
mod validation;

pub use types::{
    AccessConfig, Config, ConfigError, IdentityConfig, MlockConfig, QueryConfig, ServerConfig,
};
pub use validation::{validate, ValidationError};
