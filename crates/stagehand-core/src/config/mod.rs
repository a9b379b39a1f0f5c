//! # Configuration System
//!
//! Hierarchical TOML configuration for the stagehand compositor.
//!
//! ## Configuration Hierarchy
//!
//! Configuration is loaded in the following order (later sources override earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.stagehand/config.toml` (device-wide preferences)
//! 3. **Project config** - `./.stagehand/config.toml` (image-specific overrides)
//! 4. **CLI arguments** - Command-line flags (highest priority)
//!
//! ## Usage Example
//!
//! ```toml
//! [compositor]
//! animations = true
//! show_props = ["opacity", "zoom"]
//! duration_show = 300
//!
//! [memory]
//! mem_low = 0.75
//! mem_critical = 0.9
//!
//! [layout.app]
//! x = 0
//! y = 48
//! width = 800
//! height = 432
//! ```

pub mod defaults;
pub mod loading;
pub mod types;
pub mod validation;

pub use types::{
    CompositorSection, Config, LayoutConfig, MemorySection, PathsConfig, StageConfig,
};
pub use validation::validate_config;

impl StageConfig {
    /// Load configuration from the hierarchy of config files.
    ///
    /// See [`loading::load_hierarchy`] for details.
    pub fn load_hierarchy() -> Result<Self, crate::errors::ConfigError> {
        loading::load_hierarchy()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), crate::errors::ConfigError> {
        validation::validate_config(self)
    }
}
