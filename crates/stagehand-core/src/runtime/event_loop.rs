//! Single-threaded main loop.
//!
//! Window-server callbacks, IPC connections and the signal path all feed the
//! loop through one channel; the handler runs every event and timer on this
//! thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Instant;

use tracing::{debug, info};

use crate::apps::ManagerEvent;
use crate::ipc::server::IpcCall;
use crate::runtime::timers::TimerList;

#[derive(Debug)]
pub enum LoopEvent {
    Manager(ManagerEvent),
    Request(IpcCall),
    Shutdown,
}

/// Receiver side of the loop.
pub trait LoopHandler {
    type Timer: Copy + PartialEq;

    fn on_event(&mut self, event: LoopEvent, timers: &mut TimerList<Self::Timer>, now: Instant);

    fn on_timer(&mut self, timer: Self::Timer, timers: &mut TimerList<Self::Timer>, now: Instant);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Continue,
    Exit,
}

pub struct EventLoop<K> {
    sender: Sender<LoopEvent>,
    receiver: Receiver<LoopEvent>,
    timers: TimerList<K>,
}

impl<K: Copy + PartialEq> EventLoop<K> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            timers: TimerList::new(),
        }
    }

    /// A handle other threads use to post into the loop.
    pub fn sender(&self) -> Sender<LoopEvent> {
        self.sender.clone()
    }

    pub fn timers(&self) -> &TimerList<K> {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut TimerList<K> {
        &mut self.timers
    }

    /// Wait for the next event or deadline, handle everything that is ready,
    /// then fire expired timers.
    pub fn turn<H: LoopHandler<Timer = K>>(&mut self, handler: &mut H) -> Turn {
        let timeout = self.timers.next_timeout(Instant::now());
        let first = match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            // The loop owns a sender, so this only happens on teardown.
            Err(RecvTimeoutError::Disconnected) => return Turn::Exit,
        };

        let pending = first.into_iter().chain(self.receiver.try_iter().collect::<Vec<_>>());
        for event in pending {
            if matches!(event, LoopEvent::Shutdown) {
                info!(event = "core.loop.shutdown_requested");
                return Turn::Exit;
            }
            handler.on_event(event, &mut self.timers, Instant::now());
        }

        let now = Instant::now();
        for timer in self.timers.expire(now) {
            handler.on_timer(timer, &mut self.timers, now);
        }
        Turn::Continue
    }

    pub fn run<H: LoopHandler<Timer = K>>(&mut self, handler: &mut H) {
        debug!(event = "core.loop.run_started", timers = self.timers.len());
        while self.turn(handler) == Turn::Continue {}
        debug!(event = "core.loop.run_completed");
    }
}

impl<K: Copy + PartialEq> Default for EventLoop<K> {
    fn default() -> Self {
        Self::new()
    }
}
