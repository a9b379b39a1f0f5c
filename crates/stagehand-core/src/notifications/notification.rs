//! A single toast and its slide animations.

use std::time::{Duration, Instant};

use crate::animation::{Easing, Tween, TweenAnimation, TweenId};
use crate::geometry::Rect;
use crate::notifications::types::{NotificationContent, NotificationMethod, NotificationState};

pub const SLIDE_DURATION: Duration = Duration::from_millis(400);
pub const ARRANGE_DURATION: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slide {
    None,
    In,
    Out,
}

#[derive(Debug, Clone)]
pub struct Notification {
    content: NotificationContent,
    state: NotificationState,
    geometry: Rect,
    /// x coordinate the toast slides in from and out to.
    offscreen_x: i32,
    slide: TweenAnimation,
    x: TweenId,
    slide_kind: Slide,
    arrange: TweenAnimation,
    y: TweenId,
    shown_at: Option<Instant>,
}

impl Notification {
    pub fn new(content: NotificationContent, offscreen_x: i32) -> Self {
        let mut slide = TweenAnimation::new(SLIDE_DURATION);
        let x = slide.add_tween(Tween::new(
            Easing::SineOut,
            offscreen_x as f32,
            offscreen_x as f32,
        ));
        let mut arrange = TweenAnimation::new(ARRANGE_DURATION);
        let y = arrange.add_tween(Tween::new(Easing::SineOut, 0.0, 0.0));
        Self {
            content,
            state: NotificationState::Init,
            geometry: Rect::default(),
            offscreen_x,
            slide,
            x,
            slide_kind: Slide::None,
            arrange,
            y,
            shown_at: None,
        }
    }

    pub fn content(&self) -> &NotificationContent {
        &self.content
    }

    pub fn uuid(&self) -> &str {
        &self.content.uuid
    }

    pub fn tag(&self) -> &str {
        &self.content.tag
    }

    /// Whether this notification replaces `other`.
    pub fn supersedes(&self, other: &Notification) -> bool {
        !self.content.tag.is_empty() && self.content.tag == other.content.tag
    }

    pub fn state(&self) -> NotificationState {
        self.state
    }

    pub fn geometry(&self) -> Rect {
        self.geometry
    }

    pub fn shown_at(&self) -> Option<Instant> {
        self.shown_at
    }

    pub fn is_animating(&self) -> bool {
        self.slide.is_running() || self.arrange.is_running()
    }

    /// Slide in to `slot`.
    pub fn show(&mut self, slot: Rect, now: Instant) {
        self.geometry = Rect::new(self.offscreen_x, slot.y, slot.width, slot.height);
        self.state = NotificationState::Visible;
        self.slide
            .tween_mut(self.x)
            .set_range(self.offscreen_x as f32, slot.x as f32);
        self.slide.start(now);
        self.slide_kind = Slide::In;
    }

    /// Appear at `slot` with no animation.
    pub fn show_in_place(&mut self, slot: Rect, now: Instant) {
        self.geometry = slot;
        self.state = NotificationState::Visible;
        self.shown_at = Some(now);
    }

    /// Slide out. Returns false if already hidden or on the way out.
    pub fn hide(&mut self, now: Instant) -> bool {
        if self.state == NotificationState::Hidden || self.slide_kind == Slide::Out {
            return false;
        }
        self.slide
            .tween_mut(self.x)
            .set_range(self.geometry.x as f32, self.offscreen_x as f32);
        self.slide.start(now);
        self.slide_kind = Slide::Out;
        true
    }

    /// Drop to Hidden at once, as when superseded.
    pub fn close(&mut self) {
        self.slide.stop();
        self.arrange.stop();
        self.slide_kind = Slide::None;
        self.state = NotificationState::Hidden;
    }

    /// Animate vertically to `y`.
    pub fn move_to(&mut self, y: i32, now: Instant) {
        if y == self.geometry.y {
            return;
        }
        self.arrange
            .tween_mut(self.y)
            .set_range(self.geometry.y as f32, y as f32);
        self.arrange.start(now);
    }

    pub fn is_expired(&self, timeout: Duration, now: Instant) -> bool {
        self.state == NotificationState::Visible
            && self.slide_kind == Slide::None
            && self
                .shown_at
                .is_some_and(|at| now.saturating_duration_since(at) >= timeout)
    }

    /// Advance animations. Returns `Show` when the slide-in lands and
    /// `Close` when the slide-out leaves the screen.
    pub fn tick(&mut self, now: Instant) -> Option<NotificationMethod> {
        if self.arrange.step(now).is_some() {
            self.geometry.y = self.arrange.tween(self.y).value().round() as i32;
        }

        let step = self.slide.step(now)?;
        self.geometry.x = self.slide.tween(self.x).value().round() as i32;
        if !step.finished {
            return None;
        }
        match std::mem::replace(&mut self.slide_kind, Slide::None) {
            Slide::In => {
                self.shown_at = Some(now);
                Some(NotificationMethod::Show)
            }
            Slide::Out => {
                self.state = NotificationState::Hidden;
                Some(NotificationMethod::Close)
            }
            Slide::None => None,
        }
    }
}
