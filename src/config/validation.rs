//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use crate::session::MAX_WAIT_TIMEOUT;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.host is required")]
    MissingHost,
    #[error("server.port must be non-zero")]
    InvalidPort,
    #[error("identity.nickname is required")]
    MissingNickname,
    #[error("identity.nickname must not contain spaces, got '{0}'")]
    InvalidNickname(String),
    #[error("query.service is required")]
    MissingService,
    #[error("{0} must be positive")]
    ZeroTimeout(&'static str),
    #[error("{0} must be at most {1} seconds")]
    TimeoutTooLarge(&'static str, u64),
    #[error("{0} must not be empty")]
    EmptySentinel(&'static str),
    #[error("{0} must not contain tabs or line breaks")]
    InvalidSentinel(&'static str),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::MissingHost);
    }
    if config.server.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }

    let nickname = &config.identity.nickname;
    if nickname.is_empty() {
        errors.push(ValidationError::MissingNickname);
    } else if nickname.contains(char::is_whitespace) {
        errors.push(ValidationError::InvalidNickname(nickname.clone()));
    }

    if config.query.service.trim().is_empty() {
        errors.push(ValidationError::MissingService);
    }
    let max_secs = MAX_WAIT_TIMEOUT.as_secs();
    let timeouts = [
        ("query.wait_timeout_secs", config.query.wait_timeout_secs),
        (
            "query.registration_timeout_secs",
            config.query.registration_timeout_secs,
        ),
    ];
    for (field, secs) in timeouts {
        if secs == 0 {
            errors.push(ValidationError::ZeroTimeout(field));
        } else if secs > max_secs {
            errors.push(ValidationError::TimeoutTooLarge(field, max_secs));
        }
    }

    // Sentinels end up as TSV values.
    let sentinels = [
        ("query.timeout_value", &config.query.timeout_value),
        ("access.default_value", &config.access.default_value),
        ("mlock.default_value", &config.mlock.default_value),
    ];
    for (field, value) in sentinels {
        if value.is_empty() {
            errors.push(ValidationError::EmptySentinel(field));
        } else if value.contains(['\t', '\r', '\n']) {
            errors.push(ValidationError::InvalidSentinel(field));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
