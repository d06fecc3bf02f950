//! Application error types
//!
//! Top-level error for the gateway process. Library layers keep their own
//! `thiserror` enums; this type is what `run()` surfaces to `main`.

use crate::config::ConfigError;
use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Telemetry errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    // Gateway session errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Process exit code for this error (sysexits-style)
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            // EX_CONFIG
            Self::Config(_) => 78,
            // EX_UNAVAILABLE
            Self::Gateway(_) => 69,
            // EX_SOFTWARE
            Self::Telemetry(_) | Self::Internal(_) => 70,
        }
    }

    /// Stable error code for structured logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Telemetry(_) => "TELEMETRY_ERROR",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Create a gateway error
    #[must_use]
    pub fn gateway(msg: impl fmt::Display) -> Self {
        Self::Gateway(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::Config(ConfigError::MissingVar("DISCORD_TOKEN")).exit_code(), 78);
        assert_eq!(AppError::gateway("session failed").exit_code(), 69);
        assert_eq!(AppError::Telemetry("x".to_string()).exit_code(), 70);
        assert_eq!(AppError::internal(anyhow::anyhow!("boom")).exit_code(), 70);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::gateway("x").error_code(), "GATEWAY_ERROR");
        assert_eq!(
            AppError::Config(ConfigError::MissingVar("DISCORD_TOKEN")).error_code(),
            "CONFIG_ERROR"
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err: AppError = ConfigError::InvalidValue("GATEWAY_INTENTS", "x".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid value for GATEWAY_INTENTS: x"
        );
    }

    #[test]
    fn test_helper_methods() {
        let err = AppError::gateway("Max reconnect attempts reached");
        assert_eq!(err.to_string(), "Gateway error: Max reconnect attempts reached");
    }
}
