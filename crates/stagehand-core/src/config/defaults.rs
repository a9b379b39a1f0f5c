//! Default implementations for configuration types.
//!
//! This module contains all `Default` implementations and helper functions
//! for providing default values in serde deserialization.

use std::path::PathBuf;

use crate::config::types::{Config, LayoutConfig};
use crate::geometry::Rect;

const SCREEN_WIDTH: i32 = 800;
const SCREEN_HEIGHT: i32 = 480;
const STATUSBAR_HEIGHT: i32 = 55;
const SWITCHER_HEIGHT: i32 = 156;
const OSK_HEIGHT: i32 = 240;

/// Returns the default screen rectangle (800x480).
///
/// Used by serde `#[serde(default = "...")]` attribute.
pub fn default_screen() -> Rect {
    Rect::new(0, 0, SCREEN_WIDTH, SCREEN_HEIGHT)
}

/// Application area: everything below the statusbar.
pub fn default_app_rect() -> Rect {
    Rect::new(
        0,
        STATUSBAR_HEIGHT,
        SCREEN_WIDTH,
        SCREEN_HEIGHT - STATUSBAR_HEIGHT,
    )
}

pub fn default_statusbar_rect() -> Rect {
    Rect::new(0, 0, SCREEN_WIDTH, STATUSBAR_HEIGHT)
}

/// Switcher strip anchored to the bottom edge of the screen.
pub fn default_switcher_rect() -> Rect {
    Rect::new(
        0,
        SCREEN_HEIGHT - SWITCHER_HEIGHT,
        SCREEN_WIDTH,
        SWITCHER_HEIGHT,
    )
}

/// The keyboard rests just below the visible screen and slides up when shown.
pub fn default_osk_rect() -> Rect {
    Rect::new(0, SCREEN_HEIGHT, SCREEN_WIDTH, OSK_HEIGHT)
}

fn stage_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".stagehand"),
        None => {
            eprintln!(
                "Warning: Could not find home directory. Set HOME environment variable. \
                Using fallback directory."
            );
            std::env::temp_dir().join(".stagehand")
        }
    }
}

/// Returns the default appdef folder (`~/.stagehand/apps`).
pub fn default_apps_dir() -> PathBuf {
    Config::new().apps_dir()
}

/// Returns the default IPC socket path (`~/.stagehand/compositor.sock`).
pub fn default_socket_path() -> PathBuf {
    Config::new().socket_path()
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            screen: default_screen(),
            app: default_app_rect(),
            statusbar: default_statusbar_rect(),
            switcher: default_switcher_rect(),
            osk: default_osk_rect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stage_dir: stage_dir(),
            log_level: std::env::var("STAGEHAND_LOG_LEVEL").unwrap_or("info".to_string()),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.stage_dir.join("apps")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.stage_dir.join("compositor.sock")
    }
}
