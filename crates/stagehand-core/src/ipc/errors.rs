use crate::errors::StageError;

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("Compositor is not running (socket not found at {path})")]
    NotRunning { path: String },

    #[error("Failed to bind IPC socket '{path}': {message}")]
    BindFailed { path: String, message: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("IPC protocol error: {message}")]
    ProtocolError { message: String },

    #[error("Compositor returned error: [{code}] {message}")]
    ServerError { code: String, message: String },

    #[error("Connection belongs to pid {peer}, not {claimed}")]
    PeerMismatch { claimed: u32, peer: u32 },

    #[error("Main loop is no longer accepting requests")]
    MainLoopGone,

    #[error("Buffer too short: need {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageError for IpcError {
    fn error_code(&self) -> &'static str {
        match self {
            IpcError::NotRunning { .. } => "IPC_NOT_RUNNING",
            IpcError::BindFailed { .. } => "IPC_BIND_FAILED",
            IpcError::ConnectionFailed { .. } => "IPC_CONNECTION_FAILED",
            IpcError::ProtocolError { .. } => "IPC_PROTOCOL_ERROR",
            IpcError::ServerError { .. } => "IPC_SERVER_ERROR",
            IpcError::PeerMismatch { .. } => "IPC_PEER_MISMATCH",
            IpcError::MainLoopGone => "IPC_MAIN_LOOP_GONE",
            IpcError::BufferTooShort { .. } => "IPC_BUFFER_TOO_SHORT",
            IpcError::Io(_) => "IPC_IO_ERROR",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(self, IpcError::NotRunning { .. })
    }
}
