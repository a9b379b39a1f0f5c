//! Per-instance compositing and transitions.

pub mod compositor;
pub mod types;
#[allow(clippy::module_inception)]
pub mod view;

pub use compositor::AppCompositor;
pub use types::{AnimatedProperty, ComposeState, ViewEvent};
pub use view::AppView;
