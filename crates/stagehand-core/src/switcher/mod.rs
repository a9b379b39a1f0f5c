//! Overlay for choosing among running instances.
//!
//! The switcher only tracks thumbnails, the selection cursor and its own
//! slide animation. Selecting or closing a thumbnail produces a
//! [`SwitcherEvent`] that the orchestrator acts on.

use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::animation::{Easing, Tween, TweenAnimation, TweenId};
use crate::apps::{AppFlags, InstanceId};
use crate::geometry::Rect;

pub const THUMB_WIDTH: i32 = 196;
/// Horizontal space reserved for the scroll buttons.
const SCROLL_MARGIN: i32 = 200;
pub const SLIDE_DURATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitcherKind {
    /// Pages through thumbnails a screenful at a time.
    #[default]
    Horizontal,
    /// Rotates one thumbnail per step.
    Carousel,
}

impl FromStr for SwitcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "horizontal" => Ok(SwitcherKind::Horizontal),
            "carousel" => Ok(SwitcherKind::Carousel),
            other => Err(format!("unknown switcher kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thumb {
    pub instance: InstanceId,
    pub name: String,
    pub flags: AppFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitcherEvent {
    SwitchRequest(InstanceId),
    KillRequest(InstanceId),
    /// Visibility feedback for apps that asked for it.
    Feedback { instance: InstanceId, visible: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Idle,
    Showing,
    Hiding,
}

pub struct Switcher {
    kind: SwitcherKind,
    rect: Rect,
    thumbs: Vec<Thumb>,
    cursor: usize,
    animation: TweenAnimation,
    slide: TweenId,
    transition: Transition,
    visible: bool,
}

impl Switcher {
    pub fn new(kind: SwitcherKind, rect: Rect) -> Self {
        let mut animation = TweenAnimation::new(SLIDE_DURATION);
        let slide = animation.add_tween(Tween::new(Easing::QuadOut, 0.0, 0.0));
        Self {
            kind,
            rect,
            thumbs: Vec::new(),
            cursor: 0,
            animation,
            slide,
            transition: Transition::Idle,
            visible: false,
        }
    }

    pub fn kind(&self) -> SwitcherKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.thumbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thumbs.is_empty()
    }

    pub fn thumbs(&self) -> &[Thumb] {
        &self.thumbs
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_running()
    }

    /// Thumbnails stepped over by one scroll.
    pub fn page_size(&self) -> usize {
        match self.kind {
            SwitcherKind::Horizontal => {
                ((self.rect.width - SCROLL_MARGIN) / THUMB_WIDTH).max(1) as usize
            }
            SwitcherKind::Carousel => 1,
        }
    }

    /// Where the switcher is drawn right now; off the bottom edge when hidden.
    pub fn current_rect(&self) -> Rect {
        let offset = self.animation.tween(self.slide).value().round() as i32;
        Rect::new(
            self.rect.x,
            self.rect.bottom() - offset,
            self.rect.width,
            self.rect.height,
        )
    }

    pub fn add_thumb(&mut self, instance: InstanceId, name: &str, flags: AppFlags) {
        if self.thumbs.iter().any(|t| t.instance == instance) {
            return;
        }
        self.thumbs.push(Thumb {
            instance,
            name: name.to_string(),
            flags,
        });
    }

    /// Drop the thumbnail for `instance`. Returns true when the switcher
    /// is visible and now has nothing left to show.
    pub fn remove_thumb(&mut self, instance: InstanceId) -> bool {
        let Some(index) = self.thumbs.iter().position(|t| t.instance == instance) else {
            return false;
        };
        self.thumbs.remove(index);
        if index <= self.cursor {
            self.cursor = self.cursor.saturating_sub(1);
        }
        self.cursor = self.cursor.min(self.thumbs.len().saturating_sub(1));
        self.thumbs.is_empty() && self.visible
    }

    pub fn scroll_next(&mut self) {
        let count = self.thumbs.len();
        if count == 0 {
            return;
        }
        let page = self.page_size();
        self.cursor = match self.kind {
            SwitcherKind::Horizontal if self.cursor + page >= count => 0,
            SwitcherKind::Horizontal => self.cursor + page,
            SwitcherKind::Carousel => (self.cursor + 1) % count,
        };
        debug!(event = "core.switcher.scrolled", cursor = self.cursor);
    }

    pub fn scroll_previous(&mut self) {
        let count = self.thumbs.len();
        if count == 0 {
            return;
        }
        let page = self.page_size();
        self.cursor = match self.kind {
            // Wrap to the start of the last page.
            SwitcherKind::Horizontal if self.cursor < page => ((count - 1) / page) * page,
            SwitcherKind::Horizontal => self.cursor - page,
            SwitcherKind::Carousel => (self.cursor + count - 1) % count,
        };
        debug!(event = "core.switcher.scrolled", cursor = self.cursor);
    }

    pub fn select(&self, index: usize) -> Option<SwitcherEvent> {
        self.thumbs
            .get(index)
            .map(|t| SwitcherEvent::SwitchRequest(t.instance))
    }

    pub fn select_current(&self) -> Option<SwitcherEvent> {
        self.select(self.cursor)
    }

    pub fn close(&self, index: usize) -> Option<SwitcherEvent> {
        self.thumbs
            .get(index)
            .map(|t| SwitcherEvent::KillRequest(t.instance))
    }

    fn feedback(&self, visible: bool) -> Vec<SwitcherEvent> {
        self.thumbs
            .iter()
            .filter(|t| t.flags.contains(AppFlags::VIS_NOTIFY))
            .map(|t| SwitcherEvent::Feedback {
                instance: t.instance,
                visible,
            })
            .collect()
    }

    /// Slide in. Returns false when already shown or showing.
    pub fn show(&mut self, now: Instant) -> bool {
        if self.transition == Transition::Showing
            || (self.visible && self.transition == Transition::Idle)
        {
            return false;
        }
        let from = self.animation.tween(self.slide).value();
        self.animation.stop();
        self.animation
            .tween_mut(self.slide)
            .set_range(from, self.rect.height as f32);
        self.animation.start(now);
        self.transition = Transition::Showing;
        self.visible = true;
        true
    }

    /// Slide out. Thumbnails that want feedback are told immediately.
    pub fn hide(&mut self, now: Instant) -> Option<Vec<SwitcherEvent>> {
        if !self.visible || self.transition == Transition::Hiding {
            return None;
        }
        let from = self.animation.tween(self.slide).value();
        self.animation.stop();
        self.animation.tween_mut(self.slide).set_range(from, 0.0);
        self.animation.start(now);
        self.transition = Transition::Hiding;
        Some(self.feedback(false))
    }

    /// Advance the slide. Feedback is produced when a show completes.
    pub fn tick(&mut self, now: Instant) -> Vec<SwitcherEvent> {
        let Some(step) = self.animation.step(now) else {
            return Vec::new();
        };
        if !step.finished {
            return Vec::new();
        }
        match std::mem::replace(&mut self.transition, Transition::Idle) {
            Transition::Showing => self.feedback(true),
            Transition::Hiding => {
                self.visible = false;
                Vec::new()
            }
            Transition::Idle => Vec::new(),
        }
    }
}
