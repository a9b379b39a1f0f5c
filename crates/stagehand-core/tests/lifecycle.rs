//! End-to-end application lifecycle through the real main loop.
//!
//! Processes are faked; everything between the window-server callbacks and
//! the compositor runs as it does in the daemon.

mod support;

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use stagehand_core::apps::{AppFlags, ApplicationManager, StartOutcome};
use stagehand_core::compositor::{
    Compositor, CompositorParts, CompositorSettings, CompositorTimer, WindowConfigFlags,
};
use stagehand_core::config::LayoutConfig;
use stagehand_core::geometry::Rect;
use stagehand_core::ipc::EventBus;
use stagehand_core::notifications::{NotificationManager, NullAckSink};
use stagehand_core::process::{ExitRecord, Pid};
use stagehand_core::runtime::{EventLoop, Turn};
use stagehand_core::switcher::SwitcherKind;
use stagehand_core::view::ComposeState;

use support::{FakeSpawner, RecordingServer, app, window};

struct Shell {
    event_loop: EventLoop<CompositorTimer>,
    compositor: Compositor,
    manager: Arc<ApplicationManager>,
    spawner: Arc<FakeSpawner>,
    server: Arc<RecordingServer>,
    notifications: Arc<NotificationManager>,
}

fn shell(apps_dir: &std::path::Path) -> Shell {
    let event_loop = EventLoop::new();
    let spawner = Arc::new(FakeSpawner::default());
    let server = Arc::new(RecordingServer::default());
    let layout = LayoutConfig::default();
    let manager = Arc::new(ApplicationManager::new(
        layout.clone(),
        apps_dir.to_path_buf(),
        spawner.clone(),
        server.clone(),
        event_loop.sender(),
    ));
    let settings = CompositorSettings {
        animations: false,
        ..Default::default()
    };
    let notifications = Arc::new(NotificationManager::new(
        layout.app,
        settings.notification_timeout(),
        Arc::new(NullAckSink),
    ));
    let compositor = Compositor::new(CompositorParts {
        manager: manager.clone(),
        window_server: server.clone(),
        notifications: notifications.clone(),
        bus: EventBus::new(),
        settings,
        layout,
        switcher: SwitcherKind::Horizontal,
        memory: None,
    });
    Shell {
        event_loop,
        compositor,
        manager,
        spawner,
        server,
        notifications,
    }
}

impl Shell {
    /// Handle everything the manager has posted so far.
    fn settle(&mut self) {
        assert_eq!(self.event_loop.turn(&mut self.compositor), Turn::Continue);
    }

    fn pid_of(&self, name: &str) -> Pid {
        self.manager
            .instances()
            .into_iter()
            .find(|i| i.info.name == name)
            .map(|i| i.pid)
            .unwrap()
    }
}

#[test]
fn test_first_window_shows_only_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = shell(dir.path());
    shell
        .manager
        .register(app("Browser", AppFlags::empty()))
        .unwrap();

    let StartOutcome::Spawned { instance, pid } =
        shell.manager.start_application("Browser", false).unwrap()
    else {
        panic!("expected a new instance");
    };
    shell.settle();
    assert_eq!(
        shell.compositor.view(instance).unwrap().state(),
        ComposeState::None
    );

    shell
        .manager
        .window_added(window(7, pid, Rect::new(0, 0, 640, 480)))
        .unwrap();
    shell.manager.window_content_ready(pid, 7).unwrap();
    shell.settle();

    let view = shell.compositor.view(instance).unwrap();
    assert_eq!(view.state(), ComposeState::Ready);
    assert!(!view.is_visible());
    assert_eq!(shell.compositor.current(), None);

    // First window is sized to the app area.
    let layout = LayoutConfig::default();
    let configured = shell.server.configured.lock().unwrap().clone();
    assert_eq!(configured.len(), 1);
    assert_eq!(configured[0].1, WindowConfigFlags::SIZE);
    assert_eq!(configured[0].2.width, layout.app.width);
    assert_eq!(configured[0].2.height, layout.app.height);
}

#[test]
fn test_requested_start_shows_on_ready() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = shell(dir.path());
    shell
        .manager
        .register(app("Browser", AppFlags::empty()))
        .unwrap();

    shell.manager.start_application("Browser", true).unwrap();
    shell.settle();
    let pid = shell.pid_of("Browser");
    shell
        .manager
        .window_added(window(7, pid, Rect::new(0, 0, 800, 425)))
        .unwrap();
    shell.manager.window_content_ready(pid, 7).unwrap();
    shell.settle();

    let current = shell.compositor.current().unwrap();
    assert!(shell.compositor.view(current).unwrap().is_visible());
    let placement = shell.server.last_placement(7).unwrap();
    assert!(placement.visible);
    assert_eq!(placement.opacity, 255);
    assert_eq!(placement.rect.y, LayoutConfig::default().app.y);
}

#[test]
fn test_single_instance_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = shell(dir.path());
    shell
        .manager
        .register(app("Browser", AppFlags::empty()))
        .unwrap();
    shell
        .manager
        .register(app("Terminal", AppFlags::ALLOW_MULTIPLE))
        .unwrap();

    for _ in 0..3 {
        shell.manager.start_application("Browser", true).unwrap();
        shell.manager.start_application("Terminal", true).unwrap();
    }
    shell.settle();

    let browsers = shell
        .manager
        .instances()
        .iter()
        .filter(|i| i.info.name == "Browser")
        .count();
    let terminals = shell
        .manager
        .instances()
        .iter()
        .filter(|i| i.info.name == "Terminal")
        .count();
    assert_eq!(browsers, 1);
    assert_eq!(terminals, 3);
    assert_eq!(shell.spawner.spawned.lock().unwrap().len(), 4);
}

#[test]
fn test_init_startup_from_apps_folder() {
    let dir = tempfile::tempdir().unwrap();
    for (file, body) in [
        ("statusbar", "name = \"StatusBar\"\nexec = \"/bin/sh\"\nflags = \"APP_STATUSBAR, APP_SYSTEM\"\n"),
        ("home", "name = \"Home\"\nexec = \"/bin/sh\"\nflags = \"APP_HOME, APP_SYSTEM\"\n"),
        ("clock", "name = \"Clock\"\nexec = \"/bin/sh\"\nflags = \"APP_AUTO_START\"\n"),
        ("browser", "name = \"Browser\"\nexec = \"/bin/sh\"\n"),
        ("broken", "name = \n"),
    ] {
        fs::write(dir.path().join(format!("{}.appdef", file)), body).unwrap();
    }
    let mut shell = shell(dir.path());

    shell.manager.init_startup();
    shell.settle();

    assert_eq!(shell.manager.application_list().len(), 4);
    assert_eq!(shell.manager.instance_count(), 3);
    assert!(shell.compositor.statusbar().is_some());
    assert!(shell.compositor.home().is_some());
    assert_eq!(shell.compositor.view_count(), 3);
    // Only the auto-start app gets a thumbnail.
    assert_eq!(shell.compositor.switcher().len(), 1);

    // Home renders and comes to front; the auto-start clock does not.
    let home_pid = shell.pid_of("Home");
    let clock_pid = shell.pid_of("Clock");
    shell
        .manager
        .window_added(window(1, home_pid, Rect::new(0, 0, 800, 425)))
        .unwrap();
    shell
        .manager
        .window_added(window(2, clock_pid, Rect::new(0, 0, 800, 425)))
        .unwrap();
    shell.manager.window_content_ready(home_pid, 1).unwrap();
    shell.manager.window_content_ready(clock_pid, 2).unwrap();
    shell.settle();

    assert_eq!(shell.compositor.current(), shell.compositor.home());
}

#[test]
fn test_crash_queues_notice_and_drops_view() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = shell(dir.path());
    shell
        .manager
        .register(app("Home", AppFlags::HOME | AppFlags::SYSTEM))
        .unwrap();
    shell
        .manager
        .register(app("Browser", AppFlags::empty()))
        .unwrap();

    for (name, window_id) in [("Home", 1), ("Browser", 2)] {
        shell.manager.start_application(name, true).unwrap();
        shell.settle();
        let pid = shell.pid_of(name);
        shell
            .manager
            .window_added(window(window_id, pid, Rect::new(0, 0, 800, 425)))
            .unwrap();
        shell.manager.window_content_ready(pid, window_id).unwrap();
        shell.settle();
    }
    let browser_pid = shell.pid_of("Browser");

    shell.compositor.reap(
        ExitRecord {
            pid: browser_pid,
            abnormal: true,
        },
        Instant::now(),
    );

    assert_eq!(shell.manager.instance_count(), 1);
    assert_eq!(shell.compositor.view_count(), 1);
    assert_eq!(shell.compositor.current(), shell.compositor.home());
    assert_eq!(shell.notifications.pending_len(), 1);
    assert!(shell.spawner.terminated.lock().unwrap().is_empty());
}

#[test]
fn test_process_removed_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = shell(dir.path());
    shell
        .manager
        .register(app("Browser", AppFlags::empty()))
        .unwrap();
    shell.manager.start_application("Browser", false).unwrap();
    shell.settle();
    let pid = shell.pid_of("Browser");

    shell.manager.process_removed(pid);
    shell.settle();

    assert_eq!(shell.manager.instance_count(), 0);
    assert_eq!(shell.compositor.view_count(), 0);
    assert!(shell.compositor.switcher().is_empty());
    assert_eq!(shell.notifications.pending_len(), 0);
}
