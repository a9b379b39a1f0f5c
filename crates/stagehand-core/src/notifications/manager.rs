//! Bounded toast queue shared between the IPC thread and the main loop.
//!
//! `active` holds at most `capacity` on-screen notifications behind a
//! re-entrant lock, so an [`AckSink`] may call back into the manager while
//! acknowledgements are being delivered. `pending` is a plain FIFO. When both
//! locks are needed, `pending` is taken first: adding a toast holds it across
//! the same-tag lookups and the append, and promotion holds it until the
//! promoted toasts are in `active`, so a tag is never in flight between the
//! two lists.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, info, warn};

use crate::geometry::Rect;
use crate::notifications::notification::Notification;
use crate::notifications::types::{
    AckSink, NotificationAck, NotificationContent, NotificationError, NotificationMethod,
    NotificationState,
};
use crate::process::Pid;

pub const ACTIVE_CAPACITY: usize = 3;
pub const QUEUE_INTERVAL: Duration = Duration::from_millis(1500);

const WIDTH: i32 = 300;
const HEIGHT: i32 = 80;
const MARGIN: i32 = 10;

/// What a new toast displaced, if anything.
enum Replaced {
    Pending(Notification),
    Active(Notification, NotificationContent),
    Nothing,
}

pub struct NotificationManager {
    active: ReentrantMutex<RefCell<Vec<Notification>>>,
    pending: Mutex<VecDeque<Notification>>,
    capacity: usize,
    timeout_ms: AtomicU32,
    /// Screen area toasts are stacked in, top-right first.
    area: Rect,
    sink: Arc<dyn AckSink>,
}

impl NotificationManager {
    pub fn new(area: Rect, timeout: Duration, sink: Arc<dyn AckSink>) -> Self {
        Self::with_capacity(area, timeout, sink, ACTIVE_CAPACITY)
    }

    pub fn with_capacity(
        area: Rect,
        timeout: Duration,
        sink: Arc<dyn AckSink>,
        capacity: usize,
    ) -> Self {
        Self {
            active: ReentrantMutex::new(RefCell::new(Vec::new())),
            pending: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            timeout_ms: AtomicU32::new(duration_ms(timeout)),
            area,
            sink,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed) as u64)
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_ms.store(duration_ms(timeout), Ordering::Relaxed);
    }

    pub fn active_len(&self) -> usize {
        self.active.lock().borrow().len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn active_uuids(&self) -> Vec<String> {
        let guard = self.active.lock();
        let list = guard.borrow();
        list.iter().map(|n| n.uuid().to_string()).collect()
    }

    pub fn pending_uuids(&self) -> Vec<String> {
        self.pending
            .lock()
            .iter()
            .map(|n| n.uuid().to_string())
            .collect()
    }

    pub fn state_of(&self, uuid: &str) -> Option<NotificationState> {
        let guard = self.active.lock();
        let list = guard.borrow();
        list.iter().find(|n| n.uuid() == uuid).map(Notification::state)
    }

    pub fn geometry_of(&self, uuid: &str) -> Option<Rect> {
        let guard = self.active.lock();
        let list = guard.borrow();
        list.iter().find(|n| n.uuid() == uuid).map(Notification::geometry)
    }

    pub fn is_animating(&self) -> bool {
        let guard = self.active.lock();
        let list = guard.borrow();
        list.iter().any(Notification::is_animating)
    }

    fn slot(&self, index: usize) -> Rect {
        Rect::new(
            self.area.right() - WIDTH - MARGIN,
            self.area.y + MARGIN + index as i32 * (HEIGHT + MARGIN),
            WIDTH,
            HEIGHT,
        )
    }

    fn ack(&self, method: NotificationMethod, content: &NotificationContent) {
        self.sink.send_ack(NotificationAck {
            method,
            uuid: content.uuid.clone(),
            client: content.client,
        });
    }

    /// Same-process origin only. `None` is the compositor itself.
    fn check_permission(
        &self,
        content: &NotificationContent,
        caller: Option<Pid>,
    ) -> Result<(), NotificationError> {
        match caller {
            Some(caller) if caller != content.client => Err(NotificationError::Denied {
                caller: caller.as_u32(),
                client: content.client.as_u32(),
            }),
            _ => Ok(()),
        }
    }

    /// Queue a notification, replacing any pending or active one with the
    /// same tag. Returns its uuid.
    pub fn add_notification(
        &self,
        mut content: NotificationContent,
        caller: Option<Pid>,
        now: Instant,
    ) -> Result<String, NotificationError> {
        self.check_permission(&content, caller)
            .inspect_err(|e| warn!(event = "core.notify.add_denied", error = %e))?;

        if content.uuid.is_empty() {
            content.uuid = uuid::Uuid::new_v4().to_string();
        }
        if content.title.is_empty() && content.body.is_empty() {
            self.ack(NotificationMethod::Error, &content);
            return Err(NotificationError::Empty);
        }

        let uuid = content.uuid.clone();
        let notification = Notification::new(content, self.area.right());

        // Acks go out after the locks are released.
        let replaced = {
            let mut pending = self.pending.lock();
            match pending.iter().position(|p| notification.supersedes(p)) {
                Some(index) => {
                    Replaced::Pending(std::mem::replace(&mut pending[index], notification))
                }
                None => match self.replace_active(notification, now) {
                    Ok((old, new)) => Replaced::Active(old, new),
                    Err(notification) => {
                        info!(event = "core.notify.queued", uuid = %uuid, tag = notification.tag());
                        pending.push_back(notification);
                        Replaced::Nothing
                    }
                },
            }
        };

        match replaced {
            Replaced::Pending(old) => {
                debug!(event = "core.notify.replaced_pending", tag = old.tag());
                self.ack(NotificationMethod::Close, old.content());
            }
            Replaced::Active(old, new) => {
                debug!(event = "core.notify.replaced_active", tag = old.tag());
                self.ack(NotificationMethod::Close, old.content());
                self.ack(NotificationMethod::Show, &new);
            }
            Replaced::Nothing => {}
        }
        Ok(uuid)
    }

    /// Swap `notification` in for a visible one with the same tag. The
    /// replacement takes over its geometry.
    fn replace_active(
        &self,
        mut notification: Notification,
        now: Instant,
    ) -> Result<(Notification, NotificationContent), Notification> {
        let guard = self.active.lock();
        let mut list = guard.borrow_mut();
        let Some(slot) = list
            .iter_mut()
            .find(|n| n.state() != NotificationState::Hidden && notification.supersedes(n))
        else {
            return Err(notification);
        };
        notification.show_in_place(slot.geometry(), now);
        let content = notification.content().clone();
        let mut old = std::mem::replace(slot, notification);
        old.close();
        Ok((old, content))
    }

    /// Queue timer: reap hidden toasts, then promote pending ones into the
    /// free slots. Returns how many were promoted.
    pub fn process_queue(&self, now: Instant) -> usize {
        let free = {
            let guard = self.active.lock();
            let mut list = guard.borrow_mut();
            list.retain(|n| n.state() != NotificationState::Hidden);
            self.capacity.saturating_sub(list.len())
        };
        if free == 0 {
            return 0;
        }

        let mut pending = self.pending.lock();
        let take = free.min(pending.len());
        if take == 0 {
            return 0;
        }
        let promoted: Vec<Notification> = pending.drain(..take).collect();

        let count = promoted.len();
        let guard = self.active.lock();
        drop(pending);
        let mut list = guard.borrow_mut();
        let existing = std::mem::take(&mut *list);
        let rearrange = !existing.is_empty();
        for (index, mut n) in promoted.into_iter().enumerate() {
            n.show(self.slot(index), now);
            list.push(n);
        }
        for (offset, mut n) in existing.into_iter().enumerate() {
            if rearrange {
                n.move_to(self.slot(count + offset).y, now);
            }
            list.push(n);
        }
        info!(event = "core.notify.promoted", count = count, active = list.len());
        count
    }

    /// Hide toasts that have been up longer than the timeout. Returns the
    /// time until the next one expires.
    pub fn dismiss_expired(&self, now: Instant) -> Option<Duration> {
        let timeout = self.timeout();
        let guard = self.active.lock();
        let mut list = guard.borrow_mut();
        let mut next: Option<Duration> = None;
        for n in list.iter_mut() {
            if n.is_expired(timeout, now) {
                n.hide(now);
            } else if let Some(at) = n.shown_at()
                && n.state() == NotificationState::Visible
            {
                let left = timeout.saturating_sub(now.saturating_duration_since(at));
                next = Some(next.map_or(left, |d| d.min(left)));
            }
        }
        next
    }

    /// The user tapped a toast.
    pub fn click(&self, uuid: &str, now: Instant) -> bool {
        let guard = self.active.lock();
        let content = {
            let mut list = guard.borrow_mut();
            let Some(n) = list
                .iter_mut()
                .find(|n| n.uuid() == uuid && n.state() == NotificationState::Visible)
            else {
                return false;
            };
            n.hide(now);
            n.content().clone()
        };
        self.ack(NotificationMethod::Click, &content);
        true
    }

    /// Advance every animation and deliver Show/Close acknowledgements.
    /// Returns true while anything is still moving.
    pub fn tick(&self, now: Instant) -> bool {
        let guard = self.active.lock();
        let (acks, animating) = {
            let mut list = guard.borrow_mut();
            let acks: Vec<(NotificationMethod, NotificationContent)> = list
                .iter_mut()
                .filter_map(|n| n.tick(now).map(|m| (m, n.content().clone())))
                .collect();
            (acks, list.iter().any(Notification::is_animating))
        };
        // Still under the re-entrant lock; the sink may call back in.
        for (method, content) in &acks {
            self.ack(*method, content);
        }
        animating
    }
}

fn duration_ms(d: Duration) -> u32 {
    d.as_millis().min(u32::MAX as u128) as u32
}
