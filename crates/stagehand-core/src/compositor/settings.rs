//! Runtime compositor settings and the SetOptions document.

use std::time::Duration;

use serde::Deserialize;

use crate::errors::StageError;
use crate::memory::MemoryThresholds;
use crate::view::AnimatedProperty;

/// Read and written on the main loop only.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorSettings {
    pub click_focus: bool,
    pub animations: bool,
    pub show_anim_props: AnimatedProperty,
    pub hide_anim_props: AnimatedProperty,
    /// Milliseconds.
    pub duration_show: u32,
    pub duration_hide: u32,
    pub duration_slide: u32,
    pub notification_timeout: u32,
    pub mem_monitor: bool,
    pub mem_low: f64,
    pub mem_critical: f64,
    pub pg_low: u64,
    pub pg_critical: u64,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        let thresholds = MemoryThresholds::default();
        Self {
            click_focus: true,
            animations: true,
            show_anim_props: AnimatedProperty::OPACITY,
            hide_anim_props: AnimatedProperty::OPACITY,
            duration_show: 300,
            duration_hide: 500,
            duration_slide: 300,
            notification_timeout: 5000,
            mem_monitor: true,
            mem_low: thresholds.mem_low,
            mem_critical: thresholds.mem_critical,
            pg_low: thresholds.pg_low,
            pg_critical: thresholds.pg_critical,
        }
    }
}

impl CompositorSettings {
    /// Properties to animate on show; empty when animations are off.
    pub fn show_props(&self) -> AnimatedProperty {
        if self.animations {
            self.show_anim_props
        } else {
            AnimatedProperty::empty()
        }
    }

    pub fn hide_props(&self) -> AnimatedProperty {
        if self.animations {
            self.hide_anim_props
        } else {
            AnimatedProperty::empty()
        }
    }

    pub fn show_duration(&self) -> Duration {
        Duration::from_millis(self.duration_show as u64)
    }

    pub fn hide_duration(&self) -> Duration {
        Duration::from_millis(self.duration_hide as u64)
    }

    pub fn slide_duration(&self) -> Duration {
        Duration::from_millis(self.duration_slide as u64)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notification_timeout as u64)
    }

    pub fn thresholds(&self) -> MemoryThresholds {
        MemoryThresholds {
            mem_low: self.mem_low,
            mem_critical: self.mem_critical,
            pg_low: self.pg_low,
            pg_critical: self.pg_critical,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("Malformed options payload: {message}")]
    Malformed { message: String },

    #[error("Option '{field}' out of range: {message}")]
    OutOfRange { field: &'static str, message: String },
}

impl StageError for OptionsError {
    fn error_code(&self) -> &'static str {
        match self {
            OptionsError::Malformed { .. } => "OPTIONS_MALFORMED",
            OptionsError::OutOfRange { .. } => "OPTIONS_OUT_OF_RANGE",
        }
    }

    fn is_user_error(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsPayload {
    pub click_to_focus: Option<Toggle>,
    pub animations: Option<AnimationOptions>,
    pub brightness: Option<Brightness>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Toggle {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnimationOptions {
    pub enabled: Option<bool>,
    pub showing: Option<TransitionOptions>,
    pub hiding: Option<TransitionOptions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionOptions {
    pub duration: Option<u32>,
    pub zoom: Option<bool>,
    pub opacity: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Brightness {
    pub value: u32,
}

/// Side effects of an applied payload that live outside the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppliedOptions {
    /// Layer opacity 0-255 derived from brightness.
    pub layer_opacity: Option<u8>,
}

/// Longest transition a client may configure.
const MAX_DURATION_MS: u32 = 10_000;

pub fn parse_options(payload: &str) -> Result<OptionsPayload, OptionsError> {
    let options: OptionsPayload =
        serde_json::from_str(payload).map_err(|e| OptionsError::Malformed {
            message: e.to_string(),
        })?;

    if let Some(b) = &options.brightness
        && b.value > 100
    {
        return Err(OptionsError::OutOfRange {
            field: "brightness",
            message: format!("{} is not within 0..=100", b.value),
        });
    }
    if let Some(anim) = &options.animations {
        let transitions = [
            ("animations.showing", &anim.showing),
            ("animations.hiding", &anim.hiding),
        ];
        for (field, t) in transitions {
            if let Some(duration) = t.as_ref().and_then(|t| t.duration)
                && duration > MAX_DURATION_MS
            {
                return Err(OptionsError::OutOfRange {
                    field,
                    message: format!("duration {}ms exceeds {}ms", duration, MAX_DURATION_MS),
                });
            }
        }
    }
    Ok(options)
}

fn apply_transition(
    props: &mut AnimatedProperty,
    duration: &mut u32,
    options: &TransitionOptions,
) {
    if let Some(d) = options.duration {
        *duration = d;
    }
    if let Some(zoom) = options.zoom {
        props.set(AnimatedProperty::ZOOM, zoom);
    }
    if let Some(opacity) = options.opacity {
        props.set(AnimatedProperty::OPACITY, opacity);
    }
}

/// Validate the whole payload, then apply every field present. On error
/// `settings` is untouched.
pub fn apply_options(
    settings: &mut CompositorSettings,
    payload: &str,
) -> Result<AppliedOptions, OptionsError> {
    let options = parse_options(payload)?;

    if let Some(toggle) = options.click_to_focus {
        settings.click_focus = toggle.enabled;
    }
    if let Some(anim) = options.animations {
        if let Some(enabled) = anim.enabled {
            settings.animations = enabled;
        }
        if let Some(showing) = &anim.showing {
            apply_transition(
                &mut settings.show_anim_props,
                &mut settings.duration_show,
                showing,
            );
        }
        if let Some(hiding) = &anim.hiding {
            apply_transition(
                &mut settings.hide_anim_props,
                &mut settings.duration_hide,
                hiding,
            );
        }
    }

    Ok(AppliedOptions {
        layer_opacity: options
            .brightness
            .map(|b| (b.value * 255 / 100) as u8),
    })
}
