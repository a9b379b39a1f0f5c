//! Configuration validation logic.

use crate::config::types::StageConfig;
use crate::errors::ConfigError;
use crate::geometry::Rect;

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidConfiguration {
        message: message.into(),
    }
}

fn check_rect(name: &str, rect: &Rect) -> Result<(), ConfigError> {
    if rect.is_empty() {
        return Err(invalid(format!(
            "layout.{} must have a positive size, got {}x{}",
            name, rect.width, rect.height
        )));
    }
    Ok(())
}

/// Validate the configuration.
///
/// Checks memory thresholds are ordered fractions and that every layout
/// rectangle has a positive size. Durations are unsigned so they need no check.
pub fn validate_config(config: &StageConfig) -> Result<(), ConfigError> {
    let settings = config.settings();

    if !(settings.mem_low > 0.0 && settings.mem_low < settings.mem_critical) {
        return Err(invalid(format!(
            "memory.mem_low ({}) must be above 0 and below memory.mem_critical ({})",
            settings.mem_low, settings.mem_critical
        )));
    }
    if settings.mem_critical > 1.0 {
        return Err(invalid(format!(
            "memory.mem_critical ({}) must not exceed 1.0",
            settings.mem_critical
        )));
    }
    if settings.pg_low > settings.pg_critical {
        return Err(invalid(format!(
            "memory.pg_low ({}) must not exceed memory.pg_critical ({})",
            settings.pg_low, settings.pg_critical
        )));
    }

    let layout = &config.layout;
    check_rect("screen", &layout.screen)?;
    check_rect("app", &layout.app)?;
    check_rect("statusbar", &layout.statusbar)?;
    check_rect("switcher", &layout.switcher)?;
    check_rect("osk", &layout.osk)?;

    Ok(())
}
