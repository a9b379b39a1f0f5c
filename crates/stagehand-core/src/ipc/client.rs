//! Synchronous client for the control socket.
//!
//! Used by the CLI. Each call writes one request line and reads lines until
//! the reply with the matching id arrives; events received in between are
//! kept for [`IpcClient::next_event`].

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::geometry::Rect;
use crate::ipc::errors::IpcError;
use crate::ipc::protocol::{
    AppData, AppName, CompositorEvent, Method, NotificationData, Request, ServerMessage,
    decode_app_list, decode_base64,
};
use crate::process::Pid;

pub struct IpcClient {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
    next_id: u64,
    events: VecDeque<CompositorEvent>,
}

impl IpcClient {
    pub fn connect(socket_path: &Path) -> Result<Self, IpcError> {
        if !socket_path.exists() {
            return Err(IpcError::NotRunning {
                path: socket_path.display().to_string(),
            });
        }
        let stream = UnixStream::connect(socket_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                IpcError::NotRunning {
                    path: socket_path.display().to_string(),
                }
            } else {
                IpcError::ConnectionFailed {
                    message: e.to_string(),
                }
            }
        })?;
        stream.set_read_timeout(Some(Duration::from_secs(10)))?;
        stream.set_write_timeout(Some(Duration::from_secs(5)))?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
            next_id: 1,
            events: VecDeque::new(),
        })
    }

    fn read_line(&mut self) -> Result<ServerMessage, IpcError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(IpcError::ProtocolError {
                message: "connection closed by compositor".to_string(),
            });
        }
        serde_json::from_str(line.trim_end()).map_err(|e| IpcError::ProtocolError {
            message: format!("invalid JSON response: {}", e),
        })
    }

    /// Send `method` and wait for its reply. Error replies become
    /// [`IpcError::ServerError`].
    pub fn call(&mut self, method: Method) -> Result<ServerMessage, IpcError> {
        let id = self.next_id.to_string();
        self.next_id += 1;
        let request = Request {
            id: id.clone(),
            method,
        };
        let line = serde_json::to_string(&request).map_err(|e| IpcError::ProtocolError {
            message: e.to_string(),
        })?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        debug!(event = "core.ipc.client_request_sent", id = %id);

        loop {
            match self.read_line()? {
                ServerMessage::Event(event) => self.events.push_back(event),
                ServerMessage::Error { id: rid, code, message } if rid == id || rid.is_empty() => {
                    return Err(IpcError::ServerError { code, message });
                }
                reply => {
                    if reply_id(&reply) == Some(id.as_str()) {
                        return Ok(reply);
                    }
                }
            }
        }
    }

    fn expect_ack(&mut self, method: Method) -> Result<(), IpcError> {
        match self.call(method)? {
            ServerMessage::Ack { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    pub fn subscribe(&mut self, pid: Pid) -> Result<(), IpcError> {
        self.expect_ack(Method::Subscribe { pid })
    }

    pub fn start_app(&mut self, name: &str) -> Result<(), IpcError> {
        self.expect_ack(Method::StartApp {
            name: AppName::new(name),
        })
    }

    pub fn show_home(&mut self, show: bool) -> Result<(), IpcError> {
        self.expect_ack(if show { Method::ShowHome } else { Method::HideHome })
    }

    pub fn show_switcher(&mut self, show: bool) -> Result<(), IpcError> {
        self.expect_ack(if show {
            Method::ShowSwitcher
        } else {
            Method::HideSwitcher
        })
    }

    pub fn send_back_key(&mut self) -> Result<(), IpcError> {
        self.expect_ack(Method::SendBackKey)
    }

    pub fn show_osk(&mut self, rect: Rect) -> Result<(), IpcError> {
        self.expect_ack(Method::ShowOsk { rect })
    }

    pub fn hide_osk(&mut self) -> Result<(), IpcError> {
        self.expect_ack(Method::HideOsk)
    }

    pub fn consume_key(&mut self, key: u32) -> Result<(), IpcError> {
        self.expect_ack(Method::ConsumeKey { key })
    }

    pub fn set_options(&mut self, payload: &str) -> Result<(), IpcError> {
        self.expect_ack(Method::SetOptions {
            payload: payload.to_string(),
        })
    }

    pub fn add_notification(&mut self, data: NotificationData) -> Result<(), IpcError> {
        self.expect_ack(Method::AddNotification { data })
    }

    pub fn shutdown(&mut self) -> Result<(), IpcError> {
        self.expect_ack(Method::Shutdown)
    }

    pub fn get_fps(&mut self) -> Result<f32, IpcError> {
        match self.call(Method::GetFps)? {
            ServerMessage::Fps { fps, .. } => Ok(fps),
            other => Err(unexpected(&other)),
        }
    }

    pub fn get_app_list(&mut self) -> Result<Vec<AppData>, IpcError> {
        match self.call(Method::GetAppList)? {
            ServerMessage::AppList { data, .. } => decode_app_list(&decode_base64(&data)?),
            other => Err(unexpected(&other)),
        }
    }

    /// Next pushed event, waiting up to the read timeout.
    pub fn next_event(&mut self) -> Result<CompositorEvent, IpcError> {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        loop {
            if let ServerMessage::Event(event) = self.read_line()? {
                return Ok(event);
            }
        }
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), IpcError> {
        self.writer.set_read_timeout(Some(timeout))?;
        Ok(())
    }
}

fn reply_id(message: &ServerMessage) -> Option<&str> {
    match message {
        ServerMessage::Ack { id }
        | ServerMessage::Error { id, .. }
        | ServerMessage::AppList { id, .. }
        | ServerMessage::Fps { id, .. } => Some(id),
        ServerMessage::Event(_) => None,
    }
}

fn unexpected(message: &ServerMessage) -> IpcError {
    IpcError::ProtocolError {
        message: format!("unexpected reply: {:?}", message),
    }
}
