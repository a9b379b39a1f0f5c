//! Interface to the display server that owns client windows.
//!
//! The window server reports window and process lifecycle to the
//! [`ApplicationManager`](crate::apps::ApplicationManager) and receives the
//! composited placement of each window back from the views.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::Rect;
use crate::process::Pid;

pub type WindowId = u32;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WindowConfigFlags: u32 {
        const POSITION = 0x1;
        const SIZE = 0x2;
        const OPACITY = 0x4;
        const STACKING = 0x8;
    }
}

/// A window as the server reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub pid: Pid,
    /// Server-side position and preferred size.
    pub bounds: Rect,
    pub opacity: u8,
    /// The client asked to keep its own size.
    pub keep_size: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackRequest {
    RaiseToTop,
    LowerToBottom,
    Above(WindowId),
}

/// A configuration change requested by a client for one of its windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowReconfig {
    pub window: WindowId,
    pub flags: WindowConfigFlags,
    pub bounds: Rect,
    pub opacity: u8,
    pub stacking: Option<StackRequest>,
}

impl WindowReconfig {
    pub fn restack(window: WindowId, request: StackRequest) -> Self {
        Self {
            window,
            flags: WindowConfigFlags::STACKING,
            bounds: Rect::default(),
            opacity: 0,
            stacking: Some(request),
        }
    }
}

/// Where a composited window is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlacement {
    pub rect: Rect,
    pub opacity: u8,
    pub visible: bool,
    /// Stacking position within the owning view, bottom first.
    pub z: u32,
}

/// Keys the compositor forwards to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(pub u32);

impl Key {
    pub const ENTER: Key = Key(0x0d);
    pub const BACK: Key = Key(0xf00a);
}

/// Operations the compositor performs on the display side.
///
/// `configure_window` may be called from the thread delivering window-server
/// callbacks; everything else is called from the main loop.
pub trait WindowServer: Send + Sync {
    /// Adjust a window the server is about to map.
    fn configure_window(&self, window: WindowId, flags: WindowConfigFlags, bounds: Rect);

    /// Draw a window at its composited placement.
    fn present(&self, window: WindowId, placement: WindowPlacement);

    fn send_key(&self, window: WindowId, key: Key);

    fn set_layer_opacity(&self, opacity: u8);

    fn set_background_clear(&self, clear: bool);
}

/// Headless server used when no display backend is attached. Logs and drops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWindowServer;

impl WindowServer for NullWindowServer {
    fn configure_window(&self, window: WindowId, flags: WindowConfigFlags, bounds: Rect) {
        debug!(
            event = "core.display.configure_window",
            window = window,
            flags = flags.bits(),
            x = bounds.x,
            y = bounds.y,
            width = bounds.width,
            height = bounds.height
        );
    }

    fn present(&self, _window: WindowId, _placement: WindowPlacement) {}

    fn send_key(&self, window: WindowId, key: Key) {
        debug!(event = "core.display.send_key", window = window, key = key.0);
    }

    fn set_layer_opacity(&self, opacity: u8) {
        debug!(event = "core.display.layer_opacity", opacity = opacity);
    }

    fn set_background_clear(&self, clear: bool) {
        debug!(event = "core.display.background_clear", clear = clear);
    }
}
