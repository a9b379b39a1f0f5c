//! Compositor root: the window-server seam, runtime settings and the
//! orchestrator that decides what is on screen.

pub mod fps;
pub mod orchestrator;
pub mod settings;
pub mod window_server;

pub use fps::FpsCounter;
pub use orchestrator::{Compositor, CompositorParts, CompositorTimer};
pub use settings::{AppliedOptions, CompositorSettings, OptionsError, apply_options};
pub use window_server::{
    Key, NullWindowServer, StackRequest, WindowConfigFlags, WindowId, WindowInfo,
    WindowPlacement, WindowReconfig, WindowServer,
};
