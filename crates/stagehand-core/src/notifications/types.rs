use serde::{Deserialize, Serialize};

use crate::errors::StageError;
use crate::process::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationState {
    #[default]
    Init,
    Visible,
    Hidden,
}

/// What happened to a notification, reported back to its sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMethod {
    Click,
    Close,
    Error,
    Show,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAck {
    pub method: NotificationMethod,
    pub uuid: String,
    pub client: Pid,
}

/// Delivers acknowledgements to the process that posted a notification.
pub trait AckSink: Send + Sync {
    fn send_ack(&self, ack: NotificationAck);
}

/// Drops every acknowledgement.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAckSink;

impl AckSink for NullAckSink {
    fn send_ack(&self, _ack: NotificationAck) {}
}

/// The user-visible part of a notification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub icon: String,
    /// Name of the posting application.
    #[serde(default)]
    pub origin: String,
    /// Notifications sharing a non-empty tag replace each other.
    #[serde(default)]
    pub tag: String,
    /// Sender-chosen id; one is generated when empty.
    #[serde(default)]
    pub uuid: String,
    pub client: Pid,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification has neither title nor body")]
    Empty,

    #[error("Process {caller} may not post notifications for pid {client}")]
    Denied { caller: u32, client: u32 },
}

impl StageError for NotificationError {
    fn error_code(&self) -> &'static str {
        match self {
            NotificationError::Empty => "NOTIFICATION_EMPTY",
            NotificationError::Denied { .. } => "NOTIFICATION_DENIED",
        }
    }

    fn is_user_error(&self) -> bool {
        true
    }
}
