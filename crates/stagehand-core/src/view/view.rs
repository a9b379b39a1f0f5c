//! Animated on-screen representation of one running instance.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::animation::{Easing, Tween, TweenAnimation, TweenId};
use crate::apps::{AppFlags, InstanceId};
use crate::compositor::window_server::{WindowId, WindowInfo, WindowReconfig, WindowServer};
use crate::geometry::{Point, Rect};
use crate::view::compositor::AppCompositor;
use crate::view::types::{AnimatedProperty, ComposeState, ViewEvent};

const OPAQUE: f32 = 255.0;
const SHOW_ZOOM_FROM: f32 = 0.8;
const HIDE_ZOOM_TO: f32 = 2.0;

pub struct AppView {
    instance: InstanceId,
    compositor: AppCompositor,
    animation: TweenAnimation,
    opacity: TweenId,
    zoom: TweenId,
    x: TweenId,
    y: TweenId,
    /// Requested properties plus the SHOWING/HIDING markers.
    flags: AnimatedProperty,
    position: Point,
    visible: bool,
}

impl AppView {
    pub fn new(instance: InstanceId, flags: AppFlags, rect: Rect) -> Self {
        let mut animation = TweenAnimation::new(Duration::ZERO);
        let opacity = animation.add_tween(Tween::new(Easing::SineIn, OPAQUE, OPAQUE));
        let zoom = animation.add_tween(Tween::new(Easing::QuadIn, 1.0, 1.0));
        let x = animation.add_tween(Tween::new(Easing::CubicOut, rect.x as f32, rect.x as f32));
        let y = animation.add_tween(Tween::new(Easing::CubicOut, rect.y as f32, rect.y as f32));
        Self {
            instance,
            compositor: AppCompositor::new(flags, rect.size()),
            animation,
            opacity,
            zoom,
            x,
            y,
            flags: AnimatedProperty::empty(),
            position: rect.origin(),
            visible: false,
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn state(&self) -> ComposeState {
        self.compositor.state()
    }

    pub fn flags(&self) -> AnimatedProperty {
        self.flags
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_showing(&self) -> bool {
        self.flags.contains(AnimatedProperty::SHOWING)
    }

    pub fn is_hiding(&self) -> bool {
        self.flags.contains(AnimatedProperty::HIDING)
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_running()
    }

    /// Current top-left, including any in-flight slide.
    pub fn position(&self) -> Point {
        self.position
    }

    pub fn opacity(&self) -> u8 {
        self.animation.tween(self.opacity).value().round().clamp(0.0, OPAQUE) as u8
    }

    pub fn zoom(&self) -> f32 {
        self.animation.tween(self.zoom).value()
    }

    // --- window bookkeeping -------------------------------------------

    pub fn add_window(&mut self, window: WindowInfo) {
        self.compositor.add_window(window);
    }

    pub fn main_window(&self) -> Option<WindowId> {
        self.compositor.main_window()
    }

    pub fn remove_window(&mut self, window: WindowId) -> bool {
        self.compositor.remove_window(window)
    }

    pub fn reconfigure(&mut self, reconfig: &WindowReconfig) -> bool {
        self.compositor.reconfigure(reconfig)
    }

    /// Returns true when this makes the view Ready.
    pub fn content_ready(&mut self, window: WindowId) -> bool {
        self.compositor.set_content_ready(window)
    }

    // --- transitions ----------------------------------------------------

    fn arm(&mut self, tween: TweenId, requested: bool, from: f32, to: f32) -> bool {
        let t = self.animation.tween_mut(tween);
        t.set_range(from, to);
        let enabled = requested && from != to;
        t.set_enabled(enabled);
        if !enabled {
            t.update(1.0);
        }
        enabled
    }

    fn arm_position(&mut self, requested: bool, target: Point) -> bool {
        let (cx, cy) = (self.position.x as f32, self.position.y as f32);
        let moved_x = self.arm(self.x, requested, cx, target.x as f32);
        let moved_y = self.arm(self.y, requested, cy, target.y as f32);
        moved_x | moved_y
    }

    fn sync_position(&mut self) {
        self.position = Point::new(
            self.animation.tween(self.x).value().round() as i32,
            self.animation.tween(self.y).value().round() as i32,
        );
    }

    /// Animate the view in. A no-op before Ready or while already showing.
    ///
    /// Returns `Shown` when nothing needed animating and the view is visible
    /// immediately.
    pub fn show(
        &mut self,
        props: AnimatedProperty,
        target: Point,
        duration: Duration,
        now: Instant,
    ) -> Option<ViewEvent> {
        if self.state() != ComposeState::Ready || self.is_showing() {
            return None;
        }
        self.animation.stop();
        self.flags.remove(AnimatedProperty::HIDING | AnimatedProperty::HIDE_WHEN_DONE);
        self.visible = true;

        let props = props & AnimatedProperty::VISUAL;
        let mut animating = self.arm(
            self.opacity,
            props.contains(AnimatedProperty::OPACITY),
            0.0,
            OPAQUE,
        );
        animating |= self.arm(
            self.zoom,
            props.contains(AnimatedProperty::ZOOM),
            SHOW_ZOOM_FROM,
            1.0,
        );
        animating |= self.arm_position(props.contains(AnimatedProperty::POSITION), target);

        if !animating || duration.is_zero() {
            self.finish_immediately();
            debug!(event = "core.view.shown", instance = %self.instance, animated = false);
            return Some(ViewEvent::Shown);
        }

        self.flags = props | AnimatedProperty::SHOWING;
        self.animation.set_duration(duration);
        self.animation.start(now);
        self.sync_position();
        None
    }

    /// Animate the view out. A no-op while already hiding.
    ///
    /// Returns `Hidden` when nothing needed animating.
    pub fn hide(
        &mut self,
        props: AnimatedProperty,
        target: Point,
        duration: Duration,
        now: Instant,
    ) -> Option<ViewEvent> {
        if self.is_hiding() || !self.visible {
            return None;
        }
        self.animation.stop();
        self.flags.remove(AnimatedProperty::SHOWING);

        // Properties not requested stay where they are.
        let props = props & AnimatedProperty::VISUAL;
        let fade = props.contains(AnimatedProperty::OPACITY);
        let zoom_out = props.contains(AnimatedProperty::ZOOM);
        let current_opacity = self.animation.tween(self.opacity).value();
        let current_zoom = self.zoom();
        let mut animating = self.arm(
            self.opacity,
            fade,
            current_opacity,
            if fade { 0.0 } else { current_opacity },
        );
        animating |= self.arm(
            self.zoom,
            zoom_out,
            current_zoom,
            if zoom_out { HIDE_ZOOM_TO } else { current_zoom },
        );
        let target = if props.contains(AnimatedProperty::POSITION) {
            target
        } else {
            self.position
        };
        animating |= self.arm_position(true, target);

        if !animating || duration.is_zero() {
            self.finish_immediately();
            self.visible = false;
            debug!(event = "core.view.hidden", instance = %self.instance, animated = false);
            return Some(ViewEvent::Hidden);
        }

        self.flags = props | AnimatedProperty::HIDING | AnimatedProperty::HIDE_WHEN_DONE;
        self.animation.set_duration(duration);
        self.animation.start(now);
        self.sync_position();
        None
    }

    /// Move without changing visibility. Ignored during show or hide.
    pub fn slide_to(&mut self, target: Point, duration: Duration, now: Instant) {
        if self.is_showing() || self.is_hiding() {
            return;
        }
        self.animation.stop();
        let opacity = self.animation.tween(self.opacity).value();
        let zoom = self.zoom();
        self.arm(self.opacity, false, opacity, opacity);
        self.arm(self.zoom, false, zoom, zoom);
        if !self.arm_position(true, target) {
            return;
        }
        if duration.is_zero() {
            self.finish_immediately();
            return;
        }
        self.flags = AnimatedProperty::POSITION;
        self.animation.set_duration(duration);
        self.animation.start(now);
    }

    /// Jump to `target` with no animation.
    pub fn move_to(&mut self, target: Point) {
        self.animation.stop();
        self.arm(self.x, false, target.x as f32, target.x as f32);
        self.arm(self.y, false, target.y as f32, target.y as f32);
        self.sync_position();
        self.flags.remove(AnimatedProperty::VISUAL);
    }

    fn finish_immediately(&mut self) {
        self.animation.stop();
        for id in [self.opacity, self.zoom, self.x, self.y] {
            self.animation.tween_mut(id).update(1.0);
        }
        self.sync_position();
        self.flags = AnimatedProperty::empty();
    }

    /// Advance the running transition. Reports completion of a show or hide.
    pub fn tick(&mut self, now: Instant) -> Option<ViewEvent> {
        let step = self.animation.step(now)?;
        self.sync_position();
        if !step.finished {
            return None;
        }

        let flags = std::mem::take(&mut self.flags);
        if flags.contains(AnimatedProperty::SHOWING) {
            debug!(event = "core.view.shown", instance = %self.instance, animated = true);
            Some(ViewEvent::Shown)
        } else if flags.contains(AnimatedProperty::HIDING) {
            if flags.contains(AnimatedProperty::HIDE_WHEN_DONE) {
                self.visible = false;
            }
            debug!(event = "core.view.hidden", instance = %self.instance, animated = true);
            Some(ViewEvent::Hidden)
        } else {
            None
        }
    }

    /// Push the current placement of every window to the display.
    pub fn present(&self, server: &dyn WindowServer) {
        for (window, placement) in
            self.compositor
                .layout(self.position, self.zoom(), self.opacity(), self.visible)
        {
            server.present(window, placement);
        }
    }
}
