//! Application manager: installed apps, running instances, and the window
//! server callbacks that keep them in step with the OS.
//!
//! Window-server callbacks may arrive on any thread. Each one holds the
//! instance lock only while it reads or mutates the instance list, then posts
//! a [`ManagerEvent`] so the orchestrator does geometry work on the main loop.
//! Lock order is registry before instances.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::apps::errors::AppError;
use crate::apps::registry::AppRegistry;
use crate::apps::types::{
    AppFlags, AppInfo, AppInstance, InstanceId, InstanceSnapshot, ManagerEvent, StartOutcome,
};
use crate::compositor::window_server::{
    StackRequest, WindowConfigFlags, WindowId, WindowInfo, WindowReconfig, WindowServer,
};
use crate::config::LayoutConfig;
use crate::geometry::Rect;
use crate::process::{ExitRecord, Pid, ProcessError, Spawner};
use crate::runtime::LoopEvent;

/// Apps never chosen as a memory-pressure victim.
const PROTECTED: AppFlags = AppFlags::SYSTEM
    .union(AppFlags::STATUSBAR)
    .union(AppFlags::OSK)
    .union(AppFlags::HOME);

pub struct ApplicationManager {
    registry: RwLock<AppRegistry>,
    instances: Mutex<Vec<AppInstance>>,
    next_instance: AtomicU32,
    spawner: Arc<dyn Spawner>,
    window_server: Arc<dyn WindowServer>,
    layout: LayoutConfig,
    apps_dir: PathBuf,
    self_pid: Pid,
    events: Sender<LoopEvent>,
}

impl ApplicationManager {
    pub fn new(
        layout: LayoutConfig,
        apps_dir: PathBuf,
        spawner: Arc<dyn Spawner>,
        window_server: Arc<dyn WindowServer>,
        events: Sender<LoopEvent>,
    ) -> Self {
        Self {
            registry: RwLock::new(AppRegistry::new()),
            instances: Mutex::new(Vec::new()),
            next_instance: AtomicU32::new(1),
            spawner,
            window_server,
            layout,
            apps_dir,
            self_pid: Pid::current(),
            events,
        }
    }

    fn registry(&self) -> RwLockReadGuard<'_, AppRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_instances(&self) -> MutexGuard<'_, Vec<AppInstance>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn post(&self, event: ManagerEvent) {
        if self.events.send(LoopEvent::Manager(event)).is_err() {
            debug!(event = "core.apps.post_dropped", reason = "main loop gone");
        }
    }

    fn new_instance(&self, info: Arc<AppInfo>, pid: Pid, show: bool) -> AppInstance {
        AppInstance {
            id: InstanceId::from_raw(self.next_instance.fetch_add(1, Ordering::Relaxed)),
            info,
            pid,
            windows: Vec::new(),
            started: Instant::now(),
            last_visible: None,
            show_on_ready: show,
            stop_requested: false,
        }
    }

    // --- registry -------------------------------------------------------

    pub fn parse_folder(&self, dir: &Path) -> Result<usize, AppError> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .parse_folder(dir)
    }

    pub fn register(&self, info: AppInfo) -> Result<(), AppError> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(info)
    }

    pub fn info_by_name(&self, name: &str) -> Option<Arc<AppInfo>> {
        self.registry().by_name(name).cloned()
    }

    pub fn info_by_pid(&self, pid: Pid) -> Option<Arc<AppInfo>> {
        self.lock_instances()
            .iter()
            .find(|i| i.pid == pid)
            .map(|i| i.info.clone())
    }

    pub fn application_list(&self) -> Vec<Arc<AppInfo>> {
        self.registry().list().to_vec()
    }

    // --- instances ------------------------------------------------------

    pub fn instance_by_pid(&self, pid: Pid) -> Option<InstanceSnapshot> {
        self.lock_instances()
            .iter()
            .find(|i| i.pid == pid)
            .map(AppInstance::snapshot)
    }

    pub fn instance_by_id(&self, id: InstanceId) -> Option<InstanceSnapshot> {
        self.lock_instances()
            .iter()
            .find(|i| i.id == id)
            .map(AppInstance::snapshot)
    }

    pub fn instance_count(&self) -> usize {
        self.lock_instances().len()
    }

    pub fn instances(&self) -> Vec<InstanceSnapshot> {
        self.lock_instances().iter().map(AppInstance::snapshot).collect()
    }

    pub fn instance_pids(&self) -> Vec<Pid> {
        self.lock_instances().iter().map(|i| i.pid).collect()
    }

    /// Record that an instance just became the foreground app.
    pub fn mark_visible(&self, id: InstanceId, now: Instant) {
        if let Some(instance) = self.lock_instances().iter_mut().find(|i| i.id == id) {
            instance.last_visible = Some(now);
        }
    }

    /// Whether a newly ready instance was started with a request to show it.
    pub fn wants_show_on_ready(&self, id: InstanceId) -> bool {
        self.lock_instances()
            .iter()
            .find(|i| i.id == id)
            .is_some_and(|i| i.show_on_ready)
    }

    /// Least-recently-visible instance that may be killed to free memory.
    pub fn select_victim(&self, exclude: &[InstanceId]) -> Option<InstanceSnapshot> {
        self.lock_instances()
            .iter()
            .filter(|i| !i.info.flags.intersects(PROTECTED))
            .filter(|i| !i.stop_requested && !exclude.contains(&i.id))
            .min_by_key(|i| (i.last_visible, i.started))
            .map(AppInstance::snapshot)
    }

    // --- lifecycle ------------------------------------------------------

    /// Parse the apps folder, then start the statusbar, home and every
    /// auto-start application. Auto-start apps are not brought to front.
    pub fn init_startup(&self) {
        if let Err(e) = self.parse_folder(&self.apps_dir) {
            error!(event = "core.apps.init_startup_failed", error = %e);
            return;
        }

        let (shell, auto): (Vec<String>, Vec<String>) = {
            let registry = self.registry();
            let shell = registry
                .with_flag(AppFlags::STATUSBAR)
                .take(1)
                .chain(registry.with_flag(AppFlags::HOME).take(1))
                .map(|info| info.name.clone())
                .collect();
            let auto = registry
                .with_flag(AppFlags::AUTO_START)
                .map(|info| info.name.clone())
                .collect();
            (shell, auto)
        };

        for name in shell {
            if let Err(e) = self.start_application(&name, true) {
                error!(event = "core.apps.start_failed", name = %name, error = %e);
            }
        }
        for name in auto {
            if let Err(e) = self.start_application(&name, false) {
                error!(event = "core.apps.start_failed", name = %name, error = %e);
            }
        }
    }

    /// Start `name`, or bring its running instance to front when it does
    /// not allow multiple instances.
    pub fn start_application(&self, name: &str, show: bool) -> Result<StartOutcome, AppError> {
        info!(event = "core.apps.start_started", name = name, show = show);

        let info = self
            .info_by_name(name)
            .ok_or_else(|| AppError::NotFound {
                name: name.to_string(),
            })?;

        let mut instances = self.lock_instances();

        if !info.flags.contains(AppFlags::ALLOW_MULTIPLE)
            && let Some(index) = instances.iter().position(|i| i.info.id == info.id)
        {
            let existing = &instances[index];
            if !self.spawner.is_alive(existing.pid) {
                // Exited without being reaped; replace it with a fresh process.
                let stale = instances.remove(index);
                warn!(
                    event = "core.apps.stale_instance_dropped",
                    name = name,
                    pid = stale.pid.as_u32()
                );
                self.post(ManagerEvent::InstanceExited {
                    instance: stale.snapshot(),
                    crashed: !stale.stop_requested,
                });
            } else if existing.stop_requested {
                return Err(AppError::Stopping {
                    name: name.to_string(),
                });
            } else {
                let id = existing.id;
                drop(instances);
                debug!(event = "core.apps.already_running", name = name, instance = %id);
                if show {
                    self.post(ManagerEvent::BringToFront { instance: id });
                }
                return Ok(StartOutcome::AlreadyRunning { instance: id });
            }
        }

        let pid = self.spawner.spawn(&info.path, &info.args).inspect_err(|e| {
            error!(event = "core.apps.start_failed", name = name, error = %e);
        })?;
        let instance = self.new_instance(info, pid, show);
        let snapshot = instance.snapshot();
        instances.push(instance);
        drop(instances);

        info!(
            event = "core.apps.start_completed",
            name = name,
            pid = pid.as_u32(),
            instance = %snapshot.id
        );
        let id = snapshot.id;
        self.post(ManagerEvent::InstanceStarted {
            instance: snapshot,
            show,
        });
        Ok(StartOutcome::Spawned { instance: id, pid })
    }

    /// Ask `pid` to terminate. The record is removed when the exit is reaped.
    pub fn stop_application(&self, pid: Pid) -> Result<(), AppError> {
        {
            let mut instances = self.lock_instances();
            let instance = instances
                .iter_mut()
                .find(|i| i.pid == pid)
                .ok_or(AppError::InstanceNotFound { pid: pid.as_u32() })?;
            instance.stop_requested = true;
        }

        match self.spawner.terminate(pid) {
            Ok(()) => {
                info!(event = "core.apps.stop_requested", pid = pid.as_u32());
                Ok(())
            }
            // Already gone; the reaper will report it.
            Err(ProcessError::NotFound { .. }) => Ok(()),
            Err(e) => {
                error!(event = "core.apps.stop_failed", pid = pid.as_u32(), error = %e);
                Err(e.into())
            }
        }
    }

    pub fn stop_all(&self) {
        for pid in self.instance_pids() {
            if let Err(e) = self.stop_application(pid) {
                warn!(event = "core.apps.stop_all_partial", pid = pid.as_u32(), error = %e);
            }
        }
    }

    fn remove_instance(&self, pid: Pid) -> Option<AppInstance> {
        let mut instances = self.lock_instances();
        let index = instances.iter().position(|i| i.pid == pid)?;
        Some(instances.remove(index))
    }

    /// Main-loop handling of a child reaped by the SIGCHLD handler.
    ///
    /// Killed by a signal nobody asked for counts as a crash.
    pub fn reap(&self, record: ExitRecord) -> Option<ManagerEvent> {
        let instance = self.remove_instance(record.pid)?;
        let crashed = record.abnormal && !instance.stop_requested;
        if crashed {
            warn!(
                event = "core.apps.instance_crashed",
                name = %instance.info.name,
                pid = record.pid.as_u32()
            );
        } else {
            info!(
                event = "core.apps.instance_exited",
                name = %instance.info.name,
                pid = record.pid.as_u32()
            );
        }
        Some(ManagerEvent::InstanceExited {
            instance: instance.snapshot(),
            crashed,
        })
    }

    // --- window server callbacks ---------------------------------------

    /// A process connected to the window server.
    ///
    /// Unknown pids whose executable matches a registered app get an
    /// instance. Returns the instance, if any.
    pub fn process_added(&self, pid: Pid, exe: Option<&Path>) -> Option<InstanceId> {
        if pid.as_u32() == 1 || pid == self.self_pid {
            return None;
        }
        if let Some(existing) = self.instance_by_pid(pid) {
            return Some(existing.id);
        }

        let info = exe.and_then(|path| self.registry().by_path(path).cloned());
        let Some(info) = info else {
            warn!(event = "core.apps.process_unrecognized", pid = pid.as_u32());
            return None;
        };

        let mut instances = self.lock_instances();
        if !info.flags.contains(AppFlags::ALLOW_MULTIPLE)
            && instances.iter().any(|i| i.info.id == info.id)
        {
            warn!(
                event = "core.apps.process_duplicate",
                pid = pid.as_u32(),
                name = %info.name
            );
            return None;
        }
        let instance = self.new_instance(info, pid, false);
        let snapshot = instance.snapshot();
        instances.push(instance);
        drop(instances);

        let id = snapshot.id;
        self.post(ManagerEvent::InstanceStarted {
            instance: snapshot,
            show: false,
        });
        Some(id)
    }

    /// The window server saw a process disconnect.
    pub fn process_removed(&self, pid: Pid) {
        if let Some(instance) = self.remove_instance(pid) {
            info!(
                event = "core.apps.process_removed",
                name = %instance.info.name,
                pid = pid.as_u32()
            );
            self.post(ManagerEvent::InstanceExited {
                instance: instance.snapshot(),
                crashed: false,
            });
        }
    }

    /// Rewrite the geometry of a window that is about to be created so it
    /// starts where [`window_added`](Self::window_added) would put it.
    /// Returns whether the bounds changed. Windows of unknown processes are
    /// left alone.
    pub fn window_preconfig(&self, window: &mut WindowInfo) -> bool {
        let config = {
            let instances = self.lock_instances();
            let Some(instance) = instances.iter().find(|i| i.pid == window.pid) else {
                return false;
            };
            self.placement_for(&instance.info, instance.windows.len(), window)
        };
        let Some((flags, bounds)) = config else {
            return false;
        };
        let before = window.bounds;
        apply_placement(window, flags, bounds);
        debug!(
            event = "core.apps.window_preconfigured",
            pid = window.pid.as_u32(),
            window = window.id
        );
        before != window.bounds
    }

    pub fn window_added(&self, mut window: WindowInfo) -> Result<(), AppError> {
        let (snapshot, config) = {
            let mut instances = self.lock_instances();
            let instance = instances
                .iter_mut()
                .find(|i| i.pid == window.pid)
                .ok_or(AppError::InstanceNotFound {
                    pid: window.pid.as_u32(),
                })?;
            let config = self.placement_for(&instance.info, instance.windows.len(), &window);
            instance.windows.push(window.id);
            (instance.snapshot(), config)
        };

        if let Some((flags, bounds)) = config {
            apply_placement(&mut window, flags, bounds);
            self.window_server.configure_window(window.id, flags, window.bounds);
        }

        debug!(
            event = "core.apps.window_added",
            name = %snapshot.info.name,
            window = window.id
        );
        self.post(ManagerEvent::WindowAdded {
            instance: snapshot,
            window,
        });
        Ok(())
    }

    /// Size and position forced on a newly added window, if any.
    fn placement_for(
        &self,
        info: &AppInfo,
        window_count: usize,
        window: &WindowInfo,
    ) -> Option<(WindowConfigFlags, Rect)> {
        if window.keep_size || info.flags.contains(AppFlags::ALLOW_WINDOW_CONFIG) {
            None
        } else if info.flags.contains(AppFlags::OSK) {
            Some((WindowConfigFlags::SIZE, self.layout.osk))
        } else if info.flags.contains(AppFlags::STATUSBAR) {
            Some((
                WindowConfigFlags::POSITION | WindowConfigFlags::SIZE,
                self.layout.statusbar,
            ))
        } else if window_count == 0 {
            Some((WindowConfigFlags::SIZE, self.layout.app))
        } else {
            None
        }
    }

    pub fn window_removed(&self, pid: Pid, window: WindowId) -> Result<(), AppError> {
        let id = {
            let mut instances = self.lock_instances();
            let instance = instances
                .iter_mut()
                .find(|i| i.pid == pid)
                .ok_or(AppError::InstanceNotFound { pid: pid.as_u32() })?;
            instance.windows.retain(|w| *w != window);
            instance.id
        };
        self.post(ManagerEvent::WindowRemoved {
            instance: id,
            window,
        });
        Ok(())
    }

    /// Position changes are dropped unless the app allows window config.
    pub fn window_reconfig(&self, pid: Pid, mut reconfig: WindowReconfig) -> Result<(), AppError> {
        let (id, allowed) = self.owner_of(pid)?;
        if !allowed && reconfig.flags.contains(WindowConfigFlags::POSITION) {
            warn!(
                event = "core.apps.reconfig_position_stripped",
                pid = pid.as_u32(),
                window = reconfig.window
            );
            reconfig.flags.remove(WindowConfigFlags::POSITION);
        }
        self.post(ManagerEvent::WindowConfig {
            instance: id,
            reconfig,
        });
        Ok(())
    }

    pub fn window_restack(
        &self,
        pid: Pid,
        window: WindowId,
        request: StackRequest,
    ) -> Result<(), AppError> {
        let (id, _) = self.owner_of(pid)?;
        self.post(ManagerEvent::WindowConfig {
            instance: id,
            reconfig: WindowReconfig::restack(window, request),
        });
        Ok(())
    }

    /// A window rendered its first frame.
    pub fn window_content_ready(&self, pid: Pid, window: WindowId) -> Result<(), AppError> {
        let (id, _) = self.owner_of(pid)?;
        self.post(ManagerEvent::WindowReady {
            instance: id,
            window,
        });
        Ok(())
    }

    fn owner_of(&self, pid: Pid) -> Result<(InstanceId, bool), AppError> {
        self.lock_instances()
            .iter()
            .find(|i| i.pid == pid)
            .map(|i| {
                (
                    i.id,
                    i.info.flags.contains(AppFlags::ALLOW_WINDOW_CONFIG),
                )
            })
            .ok_or(AppError::InstanceNotFound { pid: pid.as_u32() })
    }
}

fn apply_placement(window: &mut WindowInfo, flags: WindowConfigFlags, bounds: Rect) {
    if flags.contains(WindowConfigFlags::POSITION) {
        window.bounds.x = bounds.x;
        window.bounds.y = bounds.y;
    }
    window.bounds.width = bounds.width;
    window.bounds.height = bounds.height;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::types::{AppId, DependencyFlags};
    use crate::compositor::window_server::{Key, WindowPlacement};
    use std::sync::mpsc::{Receiver, channel};

    #[derive(Default)]
    struct FakeSpawner {
        next: Mutex<u32>,
        spawned: Mutex<Vec<PathBuf>>,
        terminated: Mutex<Vec<Pid>>,
        dead: Mutex<Vec<Pid>>,
        fail: bool,
    }

    impl Spawner for FakeSpawner {
        fn spawn(&self, exec: &Path, _args: &str) -> Result<Pid, ProcessError> {
            if self.fail {
                return Err(ProcessError::SpawnFailed {
                    path: exec.display().to_string(),
                    message: "boom".to_string(),
                });
            }
            let mut next = self.next.lock().unwrap();
            *next += 1;
            self.spawned.lock().unwrap().push(exec.to_path_buf());
            Ok(Pid::from_raw(10_000 + *next))
        }

        fn terminate(&self, pid: Pid) -> Result<(), ProcessError> {
            self.terminated.lock().unwrap().push(pid);
            Ok(())
        }

        fn is_alive(&self, pid: Pid) -> bool {
            !self.dead.lock().unwrap().contains(&pid)
        }
    }

    #[derive(Default)]
    struct FakeServer {
        configured: Mutex<Vec<(WindowId, WindowConfigFlags, Rect)>>,
    }

    impl WindowServer for FakeServer {
        fn configure_window(&self, window: WindowId, flags: WindowConfigFlags, bounds: Rect) {
            self.configured.lock().unwrap().push((window, flags, bounds));
        }
        fn present(&self, _: WindowId, _: WindowPlacement) {}
        fn send_key(&self, _: WindowId, _: Key) {}
        fn set_layer_opacity(&self, _: u8) {}
        fn set_background_clear(&self, _: bool) {}
    }

    fn info(name: &str, flags: AppFlags) -> AppInfo {
        AppInfo {
            id: AppId::next(),
            name: name.to_string(),
            author: String::new(),
            licence: String::new(),
            category: "default".to_string(),
            version: 1,
            icon: String::new(),
            path: PathBuf::from(format!("/opt/apps/{}", name.to_lowercase())),
            args: String::new(),
            flags,
            deps: DependencyFlags::empty(),
        }
    }

    fn setup(
        spawner: FakeSpawner,
    ) -> (
        ApplicationManager,
        Arc<FakeSpawner>,
        Arc<FakeServer>,
        Receiver<LoopEvent>,
    ) {
        let (tx, rx) = channel();
        let spawner = Arc::new(spawner);
        let server = Arc::new(FakeServer::default());
        let manager = ApplicationManager::new(
            LayoutConfig::default(),
            PathBuf::from("/nonexistent"),
            spawner.clone(),
            server.clone(),
            tx,
        );
        manager.register(info("Browser", AppFlags::empty())).unwrap();
        manager
            .register(info("Terminal", AppFlags::ALLOW_MULTIPLE))
            .unwrap();
        manager
            .register(info("Keyboard", AppFlags::OSK))
            .unwrap();
        manager
            .register(info("Home", AppFlags::HOME | AppFlags::SYSTEM))
            .unwrap();
        (manager, spawner, server, rx)
    }

    fn drain(rx: &Receiver<LoopEvent>) -> Vec<ManagerEvent> {
        rx.try_iter()
            .filter_map(|e| match e {
                LoopEvent::Manager(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_dead_single_instance_is_respawned() {
        let (manager, spawner, _, rx) = setup(FakeSpawner::default());
        let StartOutcome::Spawned { instance: old, pid } =
            manager.start_application("Browser", true).unwrap()
        else {
            panic!("expected spawn");
        };
        spawner.dead.lock().unwrap().push(pid);
        drain(&rx);

        let StartOutcome::Spawned {
            instance: new,
            pid: new_pid,
        } = manager.start_application("Browser", true).unwrap()
        else {
            panic!("expected a fresh spawn");
        };
        assert_ne!(new, old);
        assert_ne!(new_pid, pid);
        assert_eq!(manager.instance_count(), 1);
        assert!(manager.instance_by_pid(pid).is_none());
        assert_eq!(spawner.spawned.lock().unwrap().len(), 2);

        let events = drain(&rx);
        assert!(matches!(
            &events[0],
            ManagerEvent::InstanceExited { instance, crashed: true } if instance.id == old
        ));
        assert!(matches!(events[1], ManagerEvent::InstanceStarted { show: true, .. }));

        // The late SIGCHLD for the old pid finds nothing to remove.
        assert!(
            manager
                .reap(ExitRecord {
                    pid,
                    abnormal: false
                })
                .is_none()
        );
    }

    #[test]
    fn test_single_instance_brings_to_front() {
        let (manager, spawner, _, rx) = setup(FakeSpawner::default());
        let first = manager.start_application("Browser", true).unwrap();
        let second = manager.start_application("Browser", true).unwrap();

        let StartOutcome::Spawned { instance, .. } = first else {
            panic!("expected spawn");
        };
        assert_eq!(second, StartOutcome::AlreadyRunning { instance });
        assert_eq!(manager.instance_count(), 1);
        assert_eq!(spawner.spawned.lock().unwrap().len(), 1);

        let events = drain(&rx);
        assert!(matches!(events[0], ManagerEvent::InstanceStarted { show: true, .. }));
        assert!(matches!(events[1], ManagerEvent::BringToFront { .. }));
    }

    #[test]
    fn test_already_running_without_show_posts_nothing() {
        let (manager, _, _, rx) = setup(FakeSpawner::default());
        manager.start_application("Browser", false).unwrap();
        drain(&rx);
        manager.start_application("Browser", false).unwrap();
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_allow_multiple_spawns_each_time() {
        let (manager, _, _, _rx) = setup(FakeSpawner::default());
        manager.start_application("Terminal", true).unwrap();
        manager.start_application("Terminal", true).unwrap();
        assert_eq!(manager.instance_count(), 2);
    }

    #[test]
    fn test_unknown_app_not_found() {
        let (manager, _, _, _rx) = setup(FakeSpawner::default());
        let err = manager.start_application("Nope", true).unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn test_spawn_failure_creates_no_instance() {
        let (manager, _, _, rx) = setup(FakeSpawner {
            fail: true,
            ..Default::default()
        });
        let err = manager.start_application("Browser", true).unwrap_err();
        assert!(matches!(err, AppError::Process(ProcessError::SpawnFailed { .. })));
        assert_eq!(manager.instance_count(), 0);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_stop_keeps_record_until_reaped() {
        let (manager, spawner, _, _rx) = setup(FakeSpawner::default());
        let StartOutcome::Spawned { pid, .. } = manager.start_application("Browser", true).unwrap()
        else {
            panic!("expected spawn");
        };
        manager.stop_application(pid).unwrap();
        assert_eq!(manager.instance_count(), 1);
        assert_eq!(spawner.terminated.lock().unwrap().as_slice(), &[pid]);

        let err = manager.start_application("Browser", true).unwrap_err();
        assert!(matches!(err, AppError::Stopping { .. }));

        // SIGTERM we sent is not a crash.
        let event = manager.reap(ExitRecord { pid, abnormal: true }).unwrap();
        assert!(matches!(event, ManagerEvent::InstanceExited { crashed: false, .. }));
        assert_eq!(manager.instance_count(), 0);
        assert!(manager.reap(ExitRecord { pid, abnormal: true }).is_none());
    }

    #[test]
    fn test_unrequested_signal_is_crash() {
        let (manager, _, _, _rx) = setup(FakeSpawner::default());
        let StartOutcome::Spawned { pid, .. } = manager.start_application("Browser", true).unwrap()
        else {
            panic!("expected spawn");
        };
        let event = manager.reap(ExitRecord { pid, abnormal: true }).unwrap();
        assert!(matches!(event, ManagerEvent::InstanceExited { crashed: true, .. }));
    }

    #[test]
    fn test_window_placement_rules() {
        let (manager, _, server, rx) = setup(FakeSpawner::default());
        let StartOutcome::Spawned { pid, .. } = manager.start_application("Browser", true).unwrap()
        else {
            panic!("expected spawn");
        };
        let window = |id| WindowInfo {
            id,
            pid,
            bounds: Rect::new(5, 5, 100, 100),
            opacity: 255,
            keep_size: false,
        };
        manager.window_added(window(1)).unwrap();
        manager.window_added(window(2)).unwrap();

        let configured = server.configured.lock().unwrap().clone();
        let layout = LayoutConfig::default();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].1, WindowConfigFlags::SIZE);
        assert_eq!(configured[0].2, Rect::new(5, 5, layout.app.width, layout.app.height));

        let added: Vec<_> = drain(&rx)
            .into_iter()
            .filter_map(|e| match e {
                ManagerEvent::WindowAdded { window, .. } => Some(window),
                _ => None,
            })
            .collect();
        assert_eq!(added[0].bounds.width, layout.app.width);
        assert_eq!(added[1].bounds, Rect::new(5, 5, 100, 100));
    }

    #[test]
    fn test_osk_window_gets_osk_size() {
        let (manager, _, server, _rx) = setup(FakeSpawner::default());
        let StartOutcome::Spawned { pid, .. } =
            manager.start_application("Keyboard", true).unwrap()
        else {
            panic!("expected spawn");
        };
        manager
            .window_added(WindowInfo {
                id: 7,
                pid,
                bounds: Rect::new(0, 0, 10, 10),
                opacity: 255,
                keep_size: false,
            })
            .unwrap();
        let configured = server.configured.lock().unwrap();
        assert_eq!(configured[0].2.size(), LayoutConfig::default().osk.size());
    }

    #[test]
    fn test_preconfig_matches_added_placement() {
        let (manager, _, server, _rx) = setup(FakeSpawner::default());
        let StartOutcome::Spawned { pid, .. } = manager.start_application("Browser", true).unwrap()
        else {
            panic!("expected spawn");
        };
        let layout = LayoutConfig::default();
        let mut first = WindowInfo {
            id: 1,
            pid,
            bounds: Rect::new(5, 5, 100, 100),
            opacity: 255,
            keep_size: false,
        };
        assert!(manager.window_preconfig(&mut first));
        assert_eq!(first.bounds, Rect::new(5, 5, layout.app.width, layout.app.height));
        // Preconfig only rewrites; the server hears nothing until the add.
        assert!(server.configured.lock().unwrap().is_empty());

        manager.window_added(first).unwrap();
        let configured = server.configured.lock().unwrap().clone();
        assert_eq!(configured[0].2, first.bounds);

        // Later windows keep what they asked for.
        let mut second = WindowInfo { id: 2, ..first };
        second.bounds = Rect::new(1, 2, 3, 4);
        assert!(!manager.window_preconfig(&mut second));
        assert_eq!(second.bounds, Rect::new(1, 2, 3, 4));
    }

    #[test]
    fn test_preconfig_ignores_unknown_pid() {
        let (manager, _, _, _rx) = setup(FakeSpawner::default());
        let mut window = WindowInfo {
            id: 1,
            pid: Pid::from_raw(4242),
            bounds: Rect::new(0, 0, 10, 10),
            opacity: 255,
            keep_size: false,
        };
        assert!(!manager.window_preconfig(&mut window));
        assert_eq!(window.bounds, Rect::new(0, 0, 10, 10));
    }

    #[test]
    fn test_window_for_unknown_pid_rejected() {
        let (manager, _, _, _rx) = setup(FakeSpawner::default());
        let result = manager.window_added(WindowInfo {
            id: 1,
            pid: Pid::from_raw(4242),
            bounds: Rect::default(),
            opacity: 255,
            keep_size: false,
        });
        assert!(matches!(result, Err(AppError::InstanceNotFound { pid: 4242 })));
    }

    #[test]
    fn test_reconfig_strips_position() {
        let (manager, _, _, rx) = setup(FakeSpawner::default());
        let StartOutcome::Spawned { pid, .. } = manager.start_application("Browser", true).unwrap()
        else {
            panic!("expected spawn");
        };
        drain(&rx);
        manager
            .window_reconfig(
                pid,
                WindowReconfig {
                    window: 1,
                    flags: WindowConfigFlags::POSITION | WindowConfigFlags::OPACITY,
                    bounds: Rect::new(10, 10, 0, 0),
                    opacity: 128,
                    stacking: None,
                },
            )
            .unwrap();
        match &drain(&rx)[0] {
            ManagerEvent::WindowConfig { reconfig, .. } => {
                assert_eq!(reconfig.flags, WindowConfigFlags::OPACITY);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_process_added_matches_executable() {
        let (manager, _, _, _rx) = setup(FakeSpawner::default());
        let pid = Pid::from_raw(777);
        let id = manager.process_added(pid, Some(Path::new("/opt/apps/browser")));
        assert!(id.is_some());
        assert_eq!(manager.info_by_pid(pid).unwrap().name, "Browser");
        assert!(!manager.wants_show_on_ready(id.unwrap()));

        // Second process for a single-instance app is refused.
        assert!(
            manager
                .process_added(Pid::from_raw(778), Some(Path::new("/opt/apps/browser")))
                .is_none()
        );
        assert!(manager.process_added(Pid::from_raw(1), None).is_none());
        assert!(
            manager
                .process_added(Pid::from_raw(779), Some(Path::new("/usr/bin/other")))
                .is_none()
        );
    }

    #[test]
    fn test_select_victim_least_recently_visible() {
        let (manager, _, _, _rx) = setup(FakeSpawner::default());
        manager.start_application("Home", true).unwrap();
        let StartOutcome::Spawned { instance: a, .. } =
            manager.start_application("Terminal", true).unwrap()
        else {
            panic!("expected spawn");
        };
        let StartOutcome::Spawned { instance: b, .. } =
            manager.start_application("Browser", true).unwrap()
        else {
            panic!("expected spawn");
        };

        let now = Instant::now();
        manager.mark_visible(a, now);
        manager.mark_visible(b, now + std::time::Duration::from_secs(1));

        assert_eq!(manager.select_victim(&[]).unwrap().id, a);
        assert_eq!(manager.select_victim(&[a]).unwrap().id, b);
        assert!(manager.select_victim(&[a, b]).is_none());
    }
}
