use std::error::Error;

/// Base trait for all stagehand errors
pub trait StageError: Error + Send + Sync + 'static {
    /// Error code for programmatic handling
    fn error_code(&self) -> &'static str;

    /// Whether this error should be logged as an error or warning
    fn is_user_error(&self) -> bool {
        false
    }
}

/// Common result type for the application
pub type StageResult<T> = Result<T, Box<dyn StageError>>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found at '{path}'")]
    ConfigNotFound { path: String },

    #[error("Failed to parse config file: {message}")]
    ConfigParseError { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("IO error reading config: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl StageError for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            ConfigError::ConfigParseError { .. } => "CONFIG_PARSE_ERROR",
            ConfigError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            ConfigError::IoError { .. } => "CONFIG_IO_ERROR",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            ConfigError::ConfigParseError { .. } | ConfigError::InvalidConfiguration { .. }
        )
    }
}

/// Failures that abort startup. Nothing after these is meaningful.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unable to install child reaper: {message}")]
    Reaper { message: String },

    #[error("Unable to start IPC server: {message}")]
    Ipc { message: String },
}

impl StageError for StartupError {
    fn error_code(&self) -> &'static str {
        match self {
            StartupError::Config(_) => "STARTUP_CONFIG",
            StartupError::Reaper { .. } => "STARTUP_REAPER",
            StartupError::Ipc { .. } => "STARTUP_IPC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_result() {
        let _result: StageResult<i32> = Ok(42);
    }

    #[test]
    fn test_config_parse_error() {
        let error = ConfigError::ConfigParseError {
            message: "invalid TOML syntax".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse config file: invalid TOML syntax"
        );
        assert_eq!(error.error_code(), "CONFIG_PARSE_ERROR");
        assert!(error.is_user_error());
    }

    #[test]
    fn test_startup_error_wraps_config() {
        let error: StartupError = ConfigError::InvalidConfiguration {
            message: "mem_low must be below mem_critical".to_string(),
        }
        .into();
        assert_eq!(error.error_code(), "STARTUP_CONFIG");
        assert!(!error.is_user_error());
        assert!(error.to_string().contains("mem_low"));
    }
}
