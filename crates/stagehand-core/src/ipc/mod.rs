//! Control socket: JSONL requests from client processes and pushed events.

pub mod client;
pub mod codec;
pub mod errors;
pub mod protocol;
pub mod server;

pub use client::IpcClient;
pub use errors::IpcError;
pub use protocol::{
    AppData, AppStatus, CompositorEvent, FixedStr, Method, NotificationAckData, NotificationData,
    Request, ServerMessage, VisibilityData,
};
pub use server::{EventBus, IpcCall, IpcServer, Reply, ServerContext};
