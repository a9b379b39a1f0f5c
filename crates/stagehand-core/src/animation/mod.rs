//! Time-driven animation primitives.
//!
//! Nothing here owns a clock. Callers pass `now` to [`TweenAnimation::start`]
//! and [`TweenAnimation::step`], which keeps every transition deterministic
//! under test.

pub mod tween;

use std::time::{Duration, Instant};

pub use tween::{Easing, Tween};

/// Handle to a tween registered with a [`TweenAnimation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TweenId(usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationStep {
    pub progress: f32,
    pub finished: bool,
}

/// A set of tweens advanced together over one duration.
#[derive(Debug, Clone)]
pub struct TweenAnimation {
    tweens: Vec<Tween>,
    duration: Duration,
    started: Option<Instant>,
}

impl TweenAnimation {
    pub fn new(duration: Duration) -> Self {
        Self {
            tweens: Vec::new(),
            duration,
            started: None,
        }
    }

    pub fn add_tween(&mut self, tween: Tween) -> TweenId {
        self.tweens.push(tween);
        TweenId(self.tweens.len() - 1)
    }

    pub fn tween(&self, id: TweenId) -> &Tween {
        &self.tweens[id.0]
    }

    pub fn tween_mut(&mut self, id: TweenId) -> &mut Tween {
        &mut self.tweens[id.0]
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Start from the beginning. A running animation restarts.
    pub fn start(&mut self, now: Instant) {
        for tween in self.tweens.iter_mut().filter(|t| t.enabled()) {
            tween.update(0.0);
        }
        self.started = Some(now);
    }

    /// Stop without touching tween values.
    pub fn stop(&mut self) {
        self.started = None;
    }

    /// Advance enabled tweens to `now`. Returns `None` when not running.
    pub fn step(&mut self, now: Instant) -> Option<AnimationStep> {
        let started = self.started?;
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (now.saturating_duration_since(started).as_secs_f32() / self.duration.as_secs_f32())
                .min(1.0)
        };

        for tween in self.tweens.iter_mut().filter(|t| t.enabled()) {
            tween.update(progress);
        }

        let finished = progress >= 1.0;
        if finished {
            self.started = None;
        }
        Some(AnimationStep { progress, finished })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_runs_to_completion() {
        let now = Instant::now();
        let mut anim = TweenAnimation::new(Duration::from_millis(100));
        let id = anim.add_tween(Tween::new(Easing::Linear, 0.0, 10.0));
        anim.start(now);

        let step = anim.step(now + Duration::from_millis(50)).unwrap();
        assert!(!step.finished);
        assert!((anim.tween(id).value() - 5.0).abs() < 1e-4);

        let step = anim.step(now + Duration::from_millis(150)).unwrap();
        assert!(step.finished);
        assert_eq!(anim.tween(id).value(), 10.0);
        assert!(!anim.is_running());
        assert!(anim.step(now + Duration::from_millis(200)).is_none());
    }

    #[test]
    fn test_stop_keeps_last_value() {
        let now = Instant::now();
        let mut anim = TweenAnimation::new(Duration::from_millis(100));
        let id = anim.add_tween(Tween::new(Easing::Linear, 0.0, 100.0));
        anim.start(now);
        anim.step(now + Duration::from_millis(25));
        anim.stop();
        assert!((anim.tween(id).value() - 25.0).abs() < 1e-3);
        assert!(anim.step(now + Duration::from_millis(90)).is_none());
    }

    #[test]
    fn test_disabled_tween_untouched() {
        let now = Instant::now();
        let mut anim = TweenAnimation::new(Duration::from_millis(10));
        let id = anim.add_tween(Tween::new(Easing::Linear, 3.0, 9.0));
        anim.tween_mut(id).set_enabled(false);
        anim.start(now);
        anim.step(now + Duration::from_millis(20));
        assert_eq!(anim.tween(id).value(), 3.0);
    }

    #[test]
    fn test_zero_duration_finishes_immediately() {
        let now = Instant::now();
        let mut anim = TweenAnimation::new(Duration::ZERO);
        anim.add_tween(Tween::new(Easing::QuadOut, 0.0, 1.0));
        anim.start(now);
        assert!(anim.step(now).unwrap().finished);
    }
}
