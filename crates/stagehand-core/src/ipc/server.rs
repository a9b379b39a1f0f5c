//! Control socket server.
//!
//! Runs a tokio runtime on its own thread. `AddNotification` is handled
//! right here under the notification locks; every other method is posted to
//! the main loop as an [`IpcCall`] and answered from there.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use std::time::Instant;

use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::StageError;
use crate::ipc::codec::{read_message, write_message};
use crate::ipc::errors::IpcError;
use crate::ipc::protocol::{
    CompositorEvent, Method, NOT_IMPLEMENTED, Request, ServerMessage,
};
use crate::notifications::{AckSink, NotificationAck, NotificationManager};
use crate::process::Pid;
use crate::runtime::LoopEvent;

const EVENT_CAPACITY: usize = 256;

/// Answer produced by the main loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ack,
    Error { code: String, message: String },
    AppList { count: i32, data: String },
    Fps(f32),
}

impl Reply {
    pub fn error(err: &dyn StageError) -> Self {
        Reply::Error {
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }

    fn into_message(self, id: String) -> ServerMessage {
        match self {
            Reply::Ack => ServerMessage::Ack { id },
            Reply::Error { code, message } => ServerMessage::Error { id, code, message },
            Reply::AppList { count, data } => ServerMessage::AppList { id, count, data },
            Reply::Fps(fps) => ServerMessage::Fps { id, fps },
        }
    }
}

/// A client request marshalled onto the main loop.
#[derive(Debug)]
pub struct IpcCall {
    pub method: Method,
    /// Pid of the connected process, from its socket credentials or else
    /// the pid it subscribed with.
    pub caller: Option<Pid>,
    reply: oneshot::Sender<Reply>,
}

impl IpcCall {
    pub fn new(method: Method, caller: Option<Pid>) -> (Self, oneshot::Receiver<Reply>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                method,
                caller,
                reply,
            },
            rx,
        )
    }

    pub fn respond(self, reply: Reply) {
        if self.reply.send(reply).is_err() {
            debug!(event = "core.ipc.reply_dropped", method = self.method.name());
        }
    }
}

/// Fan-out of compositor events to subscribed connections.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CompositorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: CompositorEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompositorEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AckSink for EventBus {
    fn send_ack(&self, ack: NotificationAck) {
        self.publish(CompositorEvent::NotificationAck(ack.into()));
    }
}

/// Acks go only to the process they are addressed to.
fn deliverable(event: &CompositorEvent, subscriber: Pid) -> bool {
    match event {
        CompositorEvent::NotificationAck(ack) => ack.client == subscriber,
        _ => true,
    }
}

/// Shared state each connection needs.
pub struct ServerContext {
    pub loop_tx: Sender<LoopEvent>,
    pub notifications: Arc<NotificationManager>,
    pub bus: EventBus,
}

pub struct IpcServer {
    socket_path: PathBuf,
    shutdown: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl IpcServer {
    /// Bind `socket_path` and start serving on a background thread. With
    /// `handle_signals`, SIGINT and SIGTERM post a shutdown to the loop.
    pub fn start(
        socket_path: &Path,
        context: ServerContext,
        handle_signals: bool,
    ) -> Result<Self, IpcError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("stagehand-ipc")
            .enable_all()
            .build()?;

        let listener = {
            let _guard = runtime.enter();
            bind(socket_path)?
        };
        info!(event = "core.ipc.listening", path = %socket_path.display());

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let context = Arc::new(context);
        let thread = std::thread::Builder::new()
            .name("stagehand-ipc".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    if handle_signals {
                        tokio::spawn(forward_signals(context.loop_tx.clone(), token.clone()));
                    }
                    accept_loop(listener, context, token).await;
                });
            })?;

        Ok(Self {
            socket_path: socket_path.to_path_buf(),
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Stop accepting, close connections and remove the socket file.
    pub fn stop(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!(event = "core.ipc.thread_panicked");
        }
        if let Err(e) = std::fs::remove_file(&self.socket_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(event = "core.ipc.socket_cleanup_failed", error = %e);
        }
        debug!(event = "core.ipc.stopped");
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown_inner();
        }
    }
}

fn bind(socket_path: &Path) -> Result<UnixListener, IpcError> {
    let bind_failed = |message: String| IpcError::BindFailed {
        path: socket_path.display().to_string(),
        message,
    };

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| bind_failed(e.to_string()))?;
    }
    if socket_path.exists() {
        if std::os::unix::net::UnixStream::connect(socket_path).is_ok() {
            return Err(bind_failed("another compositor is listening".to_string()));
        }
        debug!(event = "core.ipc.stale_socket_removed", path = %socket_path.display());
        std::fs::remove_file(socket_path).map_err(|e| bind_failed(e.to_string()))?;
    }
    UnixListener::bind(socket_path).map_err(|e| bind_failed(e.to_string()))
}

async fn forward_signals(loop_tx: Sender<LoopEvent>, shutdown: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(event = "core.ipc.signal_install_failed", error = %e);
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
        _ = shutdown.cancelled() => return,
    }
    info!(event = "core.ipc.signal_received");
    let _ = loop_tx.send(LoopEvent::Shutdown);
}

async fn accept_loop(
    listener: UnixListener,
    context: Arc<ServerContext>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(handle_connection(stream, context.clone(), shutdown.clone()));
                }
                Err(e) => {
                    warn!(event = "core.ipc.accept_failed", error = %e);
                }
            },
            _ = shutdown.cancelled() => break,
        }
    }
}

type Writer = Arc<Mutex<tokio::net::unix::OwnedWriteHalf>>;

/// Per-connection state.
struct Connection {
    /// Kernel-reported pid of the peer.
    peer: Option<Pid>,
    subscribed: Option<Pid>,
    streaming: bool,
}

impl Connection {
    fn caller(&self) -> Option<Pid> {
        self.peer.or(self.subscribed)
    }
}

fn peer_pid(stream: &UnixStream) -> Option<Pid> {
    match stream.peer_cred() {
        Ok(cred) => cred
            .pid()
            .and_then(|pid| u32::try_from(pid).ok())
            .and_then(|pid| Pid::new(pid).ok()),
        Err(e) => {
            warn!(event = "core.ipc.peer_cred_failed", error = %e);
            None
        }
    }
}

/// A connection may only speak for the process on the other end.
fn verify_pid(claimed: Pid, peer: Option<Pid>) -> Result<(), IpcError> {
    match peer {
        Some(peer) if peer != claimed => Err(IpcError::PeerMismatch {
            claimed: claimed.as_u32(),
            peer: peer.as_u32(),
        }),
        _ => Ok(()),
    }
}

fn error_message(id: String, err: &dyn StageError) -> ServerMessage {
    ServerMessage::Error {
        id,
        code: err.error_code().to_string(),
        message: err.to_string(),
    }
}

async fn handle_connection(
    stream: UnixStream,
    context: Arc<ServerContext>,
    shutdown: CancellationToken,
) {
    let peer = peer_pid(&stream);
    debug!(
        event = "core.ipc.connection_accepted",
        peer = peer.map(|p| p.as_u32())
    );
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let writer: Writer = Arc::new(Mutex::new(writer));
    let mut conn = Connection {
        peer,
        subscribed: None,
        streaming: false,
    };

    loop {
        let request = tokio::select! {
            result = read_message::<_, Request>(&mut reader) => result,
            _ = shutdown.cancelled() => break,
        };
        let response = match request {
            Ok(Some(request)) => dispatch(request, &mut conn, &context, &writer, &shutdown).await,
            Ok(None) => {
                debug!(event = "core.ipc.connection_closed");
                break;
            }
            Err(IpcError::ProtocolError { message }) => {
                warn!(event = "core.ipc.bad_request", message = %message);
                ServerMessage::Error {
                    id: String::new(),
                    code: "IPC_PROTOCOL_ERROR".to_string(),
                    message,
                }
            }
            Err(e) => {
                warn!(event = "core.ipc.read_failed", error = %e);
                break;
            }
        };

        let mut w = writer.lock().await;
        if let Err(e) = write_message(&mut *w, &response).await {
            debug!(event = "core.ipc.write_failed", error = %e);
            break;
        }
    }
}

async fn dispatch(
    request: Request,
    conn: &mut Connection,
    context: &ServerContext,
    writer: &Writer,
    shutdown: &CancellationToken,
) -> ServerMessage {
    let Request { id, method } = request;
    debug!(event = "core.ipc.request_received", id = %id, method = method.name());

    match method {
        Method::Subscribe { pid } => {
            if let Err(e) = verify_pid(pid, conn.peer) {
                warn!(event = "core.ipc.subscribe_rejected", error = %e);
                return error_message(id, &e);
            }
            conn.subscribed = Some(pid);
            if !conn.streaming {
                conn.streaming = true;
                let rx = context.bus.subscribe();
                tokio::spawn(stream_events(rx, pid, writer.clone(), shutdown.clone()));
            }
            ServerMessage::Ack { id }
        }

        Method::AddNotification { data } => {
            if let Err(e) = verify_pid(data.client, conn.peer) {
                warn!(event = "core.ipc.notification_rejected", error = %e);
                return error_message(id, &e);
            }
            match context
                .notifications
                .add_notification(data.into_content(), conn.caller(), Instant::now())
            {
                Ok(_) => ServerMessage::Ack { id },
                Err(e) => error_message(id, &e),
            }
        }

        Method::Shutdown => {
            info!(event = "core.ipc.shutdown_requested");
            match context.loop_tx.send(LoopEvent::Shutdown) {
                Ok(()) => ServerMessage::Ack { id },
                Err(_) => loop_gone(id),
            }
        }

        Method::Unknown => ServerMessage::Error {
            id,
            code: NOT_IMPLEMENTED.to_string(),
            message: "method not implemented".to_string(),
        },

        method => {
            let (call, rx) = IpcCall::new(method, conn.caller());
            if context.loop_tx.send(LoopEvent::Request(call)).is_err() {
                return loop_gone(id);
            }
            match rx.await {
                Ok(reply) => reply.into_message(id),
                Err(_) => loop_gone(id),
            }
        }
    }
}

fn loop_gone(id: String) -> ServerMessage {
    error_message(id, &IpcError::MainLoopGone)
}

async fn stream_events(
    mut rx: broadcast::Receiver<CompositorEvent>,
    subscriber: Pid,
    writer: Writer,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(event) => {
                    if !deliverable(&event, subscriber) {
                        continue;
                    }
                    let mut w = writer.lock().await;
                    if let Err(e) = write_message(&mut *w, &ServerMessage::Event(event)).await {
                        debug!(event = "core.ipc.stream_write_failed", pid = subscriber.as_u32(), error = %e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(event = "core.ipc.subscriber_lagged", pid = subscriber.as_u32(), dropped = n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::protocol::{NotificationAckData, Uuid};
    use crate::notifications::NotificationMethod;

    #[test]
    fn test_acks_only_reach_their_client() {
        let ack = CompositorEvent::NotificationAck(NotificationAckData {
            method: NotificationMethod::Show,
            uuid: Uuid::new("u"),
            client: Pid::from_raw(10),
        });
        assert!(deliverable(&ack, Pid::from_raw(10)));
        assert!(!deliverable(&ack, Pid::from_raw(11)));
        assert!(deliverable(&CompositorEvent::SwitcherVisible, Pid::from_raw(11)));
    }

    #[test]
    fn test_verify_pid_against_peer() {
        let peer = Some(Pid::from_raw(400));
        assert!(verify_pid(Pid::from_raw(400), peer).is_ok());
        match verify_pid(Pid::from_raw(1), peer) {
            Err(IpcError::PeerMismatch { claimed, peer }) => {
                assert_eq!((claimed, peer), (1, 400));
            }
            other => panic!("expected PeerMismatch, got {:?}", other),
        }
        // Without credentials the claim stands.
        assert!(verify_pid(Pid::from_raw(1), None).is_ok());
    }

    #[tokio::test]
    async fn test_peer_pid_is_this_process() {
        let (a, _b) = UnixStream::pair().unwrap();
        assert_eq!(peer_pid(&a), Some(Pid::current()));
    }

    #[test]
    fn test_connection_caller_prefers_peer() {
        let conn = Connection {
            peer: Some(Pid::from_raw(7)),
            subscribed: Some(Pid::from_raw(8)),
            streaming: false,
        };
        assert_eq!(conn.caller(), Some(Pid::from_raw(7)));
        let conn = Connection {
            peer: None,
            subscribed: Some(Pid::from_raw(8)),
            streaming: false,
        };
        assert_eq!(conn.caller(), Some(Pid::from_raw(8)));
    }

    #[test]
    fn test_reply_into_message_keeps_id() {
        assert_eq!(
            Reply::Fps(59.5).into_message("4".to_string()),
            ServerMessage::Fps {
                id: "4".to_string(),
                fps: 59.5
            }
        );
    }

    #[test]
    fn test_call_respond_after_receiver_dropped() {
        let (call, rx) = IpcCall::new(Method::ShowHome, None);
        drop(rx);
        call.respond(Reply::Ack);
    }

    #[tokio::test]
    async fn test_event_bus_ack_sink() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.send_ack(NotificationAck {
            method: NotificationMethod::Click,
            uuid: "abc".to_string(),
            client: Pid::from_raw(5),
        });
        match rx.recv().await.unwrap() {
            CompositorEvent::NotificationAck(data) => {
                assert_eq!(data.method, NotificationMethod::Click);
                assert_eq!(data.uuid.as_str(), "abc");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
