//! Frames-per-second sampling from composed frames.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Clone)]
pub struct FpsCounter {
    frames: VecDeque<Instant>,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, now: Instant) {
        self.frames.push_back(now);
        self.expire(now);
    }

    fn expire(&mut self, now: Instant) {
        while let Some(first) = self.frames.front() {
            if now.saturating_duration_since(*first) >= WINDOW {
                self.frames.pop_front();
            } else {
                break;
            }
        }
    }

    /// Frames composed during the last second.
    pub fn fps(&mut self, now: Instant) -> f32 {
        self.expire(now);
        self.frames.len() as f32 / WINDOW.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_frames_in_window() {
        let start = Instant::now();
        let mut fps = FpsCounter::new();
        for i in 0..60 {
            fps.record_frame(start + Duration::from_millis(i * 16));
        }
        assert_eq!(fps.fps(start + Duration::from_millis(950)), 60.0);
        // Idle compositor decays to zero.
        assert_eq!(fps.fps(start + Duration::from_secs(3)), 0.0);
    }
}
