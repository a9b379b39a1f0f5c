//! Configuration type definitions.
//!
//! File sections carry `Option` fields so that a later file in the hierarchy
//! only overrides what it actually sets. [`StageConfig::settings`] resolves the
//! merged sections into the runtime [`CompositorSettings`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compositor::settings::CompositorSettings;
use crate::geometry::Rect;
use crate::view::types::AnimatedProperty;

/// Runtime configuration derived from the environment, not from config files.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for stagehand state (default: ~/.stagehand)
    pub stage_dir: PathBuf,
    /// Log level for the application
    pub log_level: String,
}

/// Main configuration loaded from TOML config files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StageConfig {
    #[serde(default)]
    pub compositor: CompositorSection,

    #[serde(default)]
    pub memory: MemorySection,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

/// `[compositor]` section. Unset fields fall back to [`CompositorSettings::default`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CompositorSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_to_focus: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animations: Option<bool>,

    /// Properties animated when an application is shown: "opacity", "zoom", "position".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_props: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_props: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_show: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hide: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_slide: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_timeout: Option<u32>,
}

/// `[memory]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MemorySection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Fraction of memory in buffers+cache that counts as low memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_low: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_critical: Option<f64>,

    /// Page-fault delta per tick that counts as low memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_low: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_critical: Option<u64>,
}

/// Screen layout: the full screen plus the four compositor rectangles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    #[serde(default = "super::defaults::default_screen")]
    pub screen: Rect,
    #[serde(default = "super::defaults::default_app_rect")]
    pub app: Rect,
    #[serde(default = "super::defaults::default_statusbar_rect")]
    pub statusbar: Rect,
    #[serde(default = "super::defaults::default_switcher_rect")]
    pub switcher: Rect,
    #[serde(default = "super::defaults::default_osk_rect")]
    pub osk: Rect,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PathsConfig {
    /// Folder scanned for `.appdef` files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apps_dir: Option<PathBuf>,

    /// Unix socket the compositor listens on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
}

impl StageConfig {
    /// Resolve the file sections into runtime compositor settings.
    pub fn settings(&self) -> CompositorSettings {
        let d = CompositorSettings::default();
        let c = &self.compositor;
        let m = &self.memory;
        CompositorSettings {
            click_focus: c.click_to_focus.unwrap_or(d.click_focus),
            animations: c.animations.unwrap_or(d.animations),
            show_anim_props: c
                .show_props
                .as_deref()
                .map(AnimatedProperty::from_names)
                .unwrap_or(d.show_anim_props),
            hide_anim_props: c
                .hide_props
                .as_deref()
                .map(AnimatedProperty::from_names)
                .unwrap_or(d.hide_anim_props),
            duration_show: c.duration_show.unwrap_or(d.duration_show),
            duration_hide: c.duration_hide.unwrap_or(d.duration_hide),
            duration_slide: c.duration_slide.unwrap_or(d.duration_slide),
            notification_timeout: c.notification_timeout.unwrap_or(d.notification_timeout),
            mem_monitor: m.enabled.unwrap_or(d.mem_monitor),
            mem_low: m.mem_low.unwrap_or(d.mem_low),
            mem_critical: m.mem_critical.unwrap_or(d.mem_critical),
            pg_low: m.pg_low.unwrap_or(d.pg_low),
            pg_critical: m.pg_critical.unwrap_or(d.pg_critical),
        }
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.paths
            .apps_dir
            .clone()
            .unwrap_or_else(super::defaults::default_apps_dir)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.paths
            .socket_path
            .clone()
            .unwrap_or_else(super::defaults::default_socket_path)
    }
}
