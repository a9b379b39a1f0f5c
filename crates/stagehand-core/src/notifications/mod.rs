//! Toast notifications posted by client processes.

pub mod manager;
pub mod notification;
pub mod types;

pub use manager::{ACTIVE_CAPACITY, NotificationManager, QUEUE_INTERVAL};
pub use notification::Notification;
pub use types::{
    AckSink, NotificationAck, NotificationContent, NotificationError, NotificationMethod,
    NotificationState, NullAckSink,
};
