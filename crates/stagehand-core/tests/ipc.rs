//! Integration tests for the control socket.
//!
//! These start a real server on a temp socket with the compositor main loop
//! on its own thread, connect via `IpcClient`, and exercise the protocol.

mod support;

use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use stagehand_core::apps::{AppFlags, ApplicationManager};
use stagehand_core::compositor::{Compositor, CompositorParts, CompositorSettings};
use stagehand_core::config::LayoutConfig;
use stagehand_core::geometry::Rect;
use stagehand_core::ipc::protocol::{FixedStr, Uuid};
use stagehand_core::ipc::{
    CompositorEvent, EventBus, IpcClient, IpcError, IpcServer, Method, NotificationData,
    ServerContext,
};
use stagehand_core::notifications::{NotificationManager, NotificationMethod};
use stagehand_core::process::Pid;
use stagehand_core::runtime::EventLoop;
use stagehand_core::switcher::SwitcherKind;

use support::{FakeSpawner, RecordingServer, app};

struct Daemon {
    server: IpcServer,
    main_loop: JoinHandle<()>,
}

/// Wire a compositor to a server on `socket` and run its loop on a thread.
fn start_daemon(socket: &Path) -> Daemon {
    let mut event_loop = EventLoop::new();
    let layout = LayoutConfig::default();
    let server_side = Arc::new(RecordingServer::default());
    let manager = Arc::new(ApplicationManager::new(
        layout.clone(),
        socket.parent().unwrap().to_path_buf(),
        Arc::new(FakeSpawner::default()),
        server_side.clone(),
        event_loop.sender(),
    ));
    manager.register(app("Browser", AppFlags::empty())).unwrap();
    manager.register(app("Settings", AppFlags::empty())).unwrap();
    manager
        .register(app("Home", AppFlags::HOME | AppFlags::SYSTEM))
        .unwrap();
    manager
        .register(app("Keyboard", AppFlags::OSK | AppFlags::SYSTEM))
        .unwrap();

    let bus = EventBus::new();
    let settings = CompositorSettings::default();
    let notifications = Arc::new(NotificationManager::new(
        layout.app,
        settings.notification_timeout(),
        Arc::new(bus.clone()),
    ));
    let server = IpcServer::start(
        socket,
        ServerContext {
            loop_tx: event_loop.sender(),
            notifications: notifications.clone(),
            bus: bus.clone(),
        },
        false,
    )
    .unwrap();

    let mut compositor = Compositor::new(CompositorParts {
        manager,
        window_server: server_side,
        notifications,
        bus,
        settings,
        layout,
        switcher: SwitcherKind::Carousel,
        memory: None,
    });
    compositor.install_timers(event_loop.timers_mut(), Instant::now());
    let main_loop = std::thread::spawn(move || event_loop.run(&mut compositor));

    Daemon { server, main_loop }
}

fn connect(socket: &Path) -> IpcClient {
    let mut client = IpcClient::connect(socket).unwrap();
    client.set_read_timeout(Duration::from_secs(5)).unwrap();
    client
}

fn stop(daemon: Daemon, client: &mut IpcClient) {
    client.shutdown().unwrap();
    daemon.main_loop.join().unwrap();
    daemon.server.stop();
}

#[test]
fn test_app_list_and_start() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("compositor.sock");
    let daemon = start_daemon(&socket);
    let mut client = connect(&socket);

    let apps = client.get_app_list().unwrap();
    let names: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Browser", "Settings"]);

    client.start_app("Browser").unwrap();
    match client.start_app("Missing") {
        Err(IpcError::ServerError { code, .. }) => assert_eq!(code, "APP_NOT_FOUND"),
        other => panic!("expected APP_NOT_FOUND, got {:?}", other),
    }

    let fps = client.get_fps().unwrap();
    assert!(fps >= 0.0);

    stop(daemon, &mut client);
    assert!(!socket.exists());
}

#[test]
fn test_unknown_method_and_bad_options() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("compositor.sock");
    let daemon = start_daemon(&socket);
    let mut client = connect(&socket);

    match client.call(Method::Unknown) {
        Err(IpcError::ServerError { code, .. }) => assert_eq!(code, "NOT_IMPLEMENTED"),
        other => panic!("expected NOT_IMPLEMENTED, got {:?}", other),
    }

    client
        .set_options(r#"{"brightness":{"value":80}}"#)
        .unwrap();
    match client.set_options("not json") {
        Err(IpcError::ServerError { code, .. }) => assert_eq!(code, "OPTIONS_MALFORMED"),
        other => panic!("expected OPTIONS_MALFORMED, got {:?}", other),
    }

    stop(daemon, &mut client);
}

#[test]
fn test_keyboard_methods_are_routed() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("compositor.sock");
    let daemon = start_daemon(&socket);
    let mut client = connect(&socket);

    client.show_osk(Rect::new(0, 380, 320, 40)).unwrap();
    client.consume_key(0x61).unwrap();
    client.consume_key(0x0d).unwrap();
    client.hide_osk().unwrap();
    // The keyboard is a system app and stays out of the list.
    let apps = client.get_app_list().unwrap();
    assert!(apps.iter().all(|a| a.name.as_str() != "Keyboard"));

    stop(daemon, &mut client);
}

#[test]
fn test_notification_ack_reaches_its_client() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("compositor.sock");
    let daemon = start_daemon(&socket);

    let me = Pid::current();
    let mut client = connect(&socket);
    client.subscribe(me).unwrap();

    client
        .add_notification(NotificationData {
            body: FixedStr::new("Download finished"),
            icon: FixedStr::default(),
            origin: FixedStr::new("tests"),
            tag: FixedStr::new("download"),
            title: FixedStr::new("Browser"),
            uuid: Uuid::new("6f1c1a8e-5c1e-4f43-9d0b-2b0c4a1d7e11"),
            client: me,
        })
        .unwrap();

    // Queue timer promotes it, the slide-in lands and a Show ack follows.
    let ack = loop {
        match client.next_event().unwrap() {
            CompositorEvent::NotificationAck(ack) => break ack,
            _ => continue,
        }
    };
    assert_eq!(ack.method, NotificationMethod::Show);
    assert_eq!(ack.uuid.as_str(), "6f1c1a8e-5c1e-4f43-9d0b-2b0c4a1d7e11");
    assert_eq!(ack.client, me);

    stop(daemon, &mut client);
}

#[test]
fn test_subscribe_as_another_pid_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("compositor.sock");
    let daemon = start_daemon(&socket);
    let mut client = connect(&socket);

    match client.subscribe(Pid::from_raw(1)) {
        Err(IpcError::ServerError { code, .. }) => assert_eq!(code, "IPC_PEER_MISMATCH"),
        other => panic!("expected IPC_PEER_MISMATCH, got {:?}", other),
    }
    // The connection stays usable under its real pid.
    client.subscribe(Pid::current()).unwrap();

    stop(daemon, &mut client);
}

fn spoofed(client: Pid) -> NotificationData {
    NotificationData {
        body: FixedStr::new("spoofed"),
        icon: FixedStr::default(),
        origin: FixedStr::default(),
        tag: FixedStr::default(),
        title: FixedStr::new("Hi"),
        uuid: Uuid::default(),
        client,
    }
}

#[test]
fn test_notification_for_another_pid_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("compositor.sock");
    let daemon = start_daemon(&socket);
    let mut client = connect(&socket);
    client.subscribe(Pid::current()).unwrap();

    match client.add_notification(spoofed(Pid::from_raw(1))) {
        Err(IpcError::ServerError { code, .. }) => assert_eq!(code, "IPC_PEER_MISMATCH"),
        other => panic!("expected IPC_PEER_MISMATCH, got {:?}", other),
    }

    stop(daemon, &mut client);
}

#[test]
fn test_unsubscribed_connection_cannot_notify_for_others() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("compositor.sock");
    let daemon = start_daemon(&socket);
    let mut client = connect(&socket);

    let result = client.add_notification(spoofed(Pid::from_raw(1)));
    assert!(matches!(result, Err(IpcError::ServerError { .. })));
    client.add_notification(spoofed(Pid::current())).unwrap();

    stop(daemon, &mut client);
}
