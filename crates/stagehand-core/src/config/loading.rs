//! Configuration loading and merging logic.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in the following order (later sources override earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.stagehand/config.toml`
//! 3. **Project config** - `./.stagehand/config.toml`
//! 4. **CLI arguments** - Command-line flags (highest priority)

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::types::{
    CompositorSection, LayoutConfig, MemorySection, PathsConfig, StageConfig,
};
use crate::config::validation::validate_config;
use crate::errors::ConfigError;
use crate::geometry::Rect;

/// Load configuration from the hierarchy of config files.
///
/// Loads and merges configuration from:
/// 1. Default values
/// 2. User config (`~/.stagehand/config.toml`)
/// 3. Project config (`./.stagehand/config.toml`)
///
/// # Errors
///
/// Returns an error if a file exists but cannot be parsed, or if validation
/// fails. Missing config files are not errors.
pub fn load_hierarchy() -> Result<StageConfig, ConfigError> {
    let mut config = StageConfig::default();

    if let Some(home) = dirs::home_dir() {
        let user_path = home.join(".stagehand").join("config.toml");
        if let Some(user_config) = load_optional(&user_path)? {
            config = merge_configs(config, user_config);
        }
    }

    let project_path = std::env::current_dir()?
        .join(".stagehand")
        .join("config.toml");
    if let Some(project_config) = load_optional(&project_path)? {
        config = merge_configs(config, project_config);
    }

    validate_config(&config)?;

    Ok(config)
}

/// Load a config file, treating a missing file as `None`.
fn load_optional(path: &Path) -> Result<Option<StageConfig>, ConfigError> {
    match load_config_file(path) {
        Ok(config) => {
            debug!(event = "core.config.file_loaded", path = %path.display());
            Ok(Some(config))
        }
        Err(ConfigError::ConfigNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Load a configuration file from the given path.
pub fn load_config_file(path: &Path) -> Result<StageConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    toml::from_str(&content).map_err(|e| ConfigError::ConfigParseError {
        message: format!("'{}': {}", path.display(), e),
    })
}

/// Merge two configurations, with override_config taking precedence.
///
/// Optional fields replace base values only if present. Layout rectangles
/// always come from the override since serde fills them with defaults.
pub fn merge_configs(base: StageConfig, override_config: StageConfig) -> StageConfig {
    let b = base.compositor;
    let o = override_config.compositor;
    let bm = base.memory;
    let om = override_config.memory;
    StageConfig {
        compositor: CompositorSection {
            click_to_focus: o.click_to_focus.or(b.click_to_focus),
            animations: o.animations.or(b.animations),
            show_props: o.show_props.or(b.show_props),
            hide_props: o.hide_props.or(b.hide_props),
            duration_show: o.duration_show.or(b.duration_show),
            duration_hide: o.duration_hide.or(b.duration_hide),
            duration_slide: o.duration_slide.or(b.duration_slide),
            notification_timeout: o.notification_timeout.or(b.notification_timeout),
        },
        memory: MemorySection {
            enabled: om.enabled.or(bm.enabled),
            mem_low: om.mem_low.or(bm.mem_low),
            mem_critical: om.mem_critical.or(bm.mem_critical),
            pg_low: om.pg_low.or(bm.pg_low),
            pg_critical: om.pg_critical.or(bm.pg_critical),
        },
        layout: merge_layout(base.layout, override_config.layout),
        paths: PathsConfig {
            apps_dir: override_config.paths.apps_dir.or(base.paths.apps_dir),
            socket_path: override_config.paths.socket_path.or(base.paths.socket_path),
        },
    }
}

/// A rectangle left at its default in the override keeps the base value.
fn merge_layout(base: LayoutConfig, over: LayoutConfig) -> LayoutConfig {
    let d = LayoutConfig::default();
    let pick = |b: Rect, o: Rect, default: Rect| if o == default { b } else { o };
    LayoutConfig {
        screen: pick(base.screen, over.screen, d.screen),
        app: pick(base.app, over.app, d.app),
        statusbar: pick(base.statusbar, over.statusbar, d.statusbar),
        switcher: pick(base.switcher, over.switcher, d.switcher),
        osk: pick(base.osk, over.osk, d.osk),
    }
}
