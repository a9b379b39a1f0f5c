pub mod event_loop;
pub mod timers;

pub use event_loop::{EventLoop, LoopEvent, LoopHandler, Turn};
pub use timers::{MAX_WAIT, MIN_WAIT, Repeat, TimerList};
