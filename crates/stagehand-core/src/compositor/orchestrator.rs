//! Root compositor object.
//!
//! Owns one [`AppView`] per running instance, the switcher and the special
//! instance slots (home, statusbar, keyboard, current and previous). It is
//! the only consumer of [`ManagerEvent`]s and of IPC calls marshalled onto the
//! main loop, and the only place that decides what is on screen.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::apps::{AppFlags, ApplicationManager, InstanceId, InstanceSnapshot, ManagerEvent};
use crate::compositor::fps::FpsCounter;
use crate::compositor::settings::{CompositorSettings, apply_options};
use crate::compositor::window_server::{Key, WindowServer};
use crate::config::LayoutConfig;
use crate::geometry::{Point, Rect};
use crate::ipc::protocol::{
    AppData, AppName, AppStatus, CompositorEvent, IconPath, Method, NOT_IMPLEMENTED,
    VisibilityData, encode_app_list, encode_base64,
};
use crate::ipc::server::{EventBus, IpcCall, Reply};
use crate::memory::{MemoryMonitor, MemoryState};
use crate::notifications::notification::SLIDE_DURATION as TOAST_SLIDE;
use crate::notifications::{NotificationContent, NotificationManager, QUEUE_INTERVAL};
use crate::process::{ExitRecord, Pid, drain_exits};
use crate::runtime::{LoopEvent, LoopHandler, MIN_WAIT, Repeat, TimerList};
use crate::switcher::{Switcher, SwitcherEvent, SwitcherKind};
use crate::view::{AnimatedProperty, AppView, ViewEvent};

pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);
pub const REAP_INTERVAL: Duration = Duration::from_millis(200);

/// Apps that never get a switcher thumbnail.
const SHELL: AppFlags = AppFlags::SYSTEM
    .union(AppFlags::STATUSBAR)
    .union(AppFlags::OSK)
    .union(AppFlags::HOME);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorTimer {
    /// Animation frames; armed only while something moves.
    Frame,
    Reap,
    Memory,
    NotificationQueue,
    NotificationDismiss,
}

struct Entry {
    snapshot: InstanceSnapshot,
    view: AppView,
}

/// Collaborators the compositor is wired to at startup.
pub struct CompositorParts {
    pub manager: Arc<ApplicationManager>,
    pub window_server: Arc<dyn WindowServer>,
    pub notifications: Arc<NotificationManager>,
    pub bus: EventBus,
    pub settings: CompositorSettings,
    pub layout: LayoutConfig,
    pub switcher: SwitcherKind,
    pub memory: Option<MemoryMonitor>,
}

pub struct Compositor {
    manager: Arc<ApplicationManager>,
    window_server: Arc<dyn WindowServer>,
    notifications: Arc<NotificationManager>,
    bus: EventBus,
    settings: CompositorSettings,
    layout: LayoutConfig,
    entries: HashMap<InstanceId, Entry>,
    switcher: Switcher,
    memory: Option<MemoryMonitor>,
    fps: FpsCounter,
    home: Option<InstanceId>,
    statusbar: Option<InstanceId>,
    osk: Option<InstanceId>,
    current: Option<InstanceId>,
    previous: Option<InstanceId>,
    /// Rectangle the keyboard must not cover while it is up.
    osk_target: Option<Rect>,
    /// Process that asked for the keyboard; receives its keys.
    osk_client: Option<Pid>,
    osk_visible: bool,
    next_dismiss: Option<Duration>,
}

impl Compositor {
    pub fn new(parts: CompositorParts) -> Self {
        parts
            .notifications
            .set_timeout(parts.settings.notification_timeout());
        Self {
            switcher: Switcher::new(parts.switcher, parts.layout.switcher),
            manager: parts.manager,
            window_server: parts.window_server,
            notifications: parts.notifications,
            bus: parts.bus,
            settings: parts.settings,
            layout: parts.layout,
            entries: HashMap::new(),
            memory: parts.memory,
            fps: FpsCounter::new(),
            home: None,
            statusbar: None,
            osk: None,
            current: None,
            previous: None,
            osk_target: None,
            osk_client: None,
            osk_visible: false,
            next_dismiss: None,
        }
    }

    /// Arm the periodic timers. Call once before entering the loop.
    pub fn install_timers(&self, timers: &mut TimerList<CompositorTimer>, now: Instant) {
        timers.add(CompositorTimer::Reap, REAP_INTERVAL, Repeat::Forever, now);
        timers.add(
            CompositorTimer::NotificationQueue,
            QUEUE_INTERVAL,
            Repeat::Forever,
            now,
        );
        if let Some(monitor) = &self.memory {
            timers.add(
                CompositorTimer::Memory,
                monitor.interval(),
                Repeat::Forever,
                now,
            );
        }
    }

    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    pub fn current(&self) -> Option<InstanceId> {
        self.current
    }

    pub fn previous(&self) -> Option<InstanceId> {
        self.previous
    }

    pub fn home(&self) -> Option<InstanceId> {
        self.home
    }

    pub fn statusbar(&self) -> Option<InstanceId> {
        self.statusbar
    }

    pub fn osk(&self) -> Option<InstanceId> {
        self.osk
    }

    pub fn is_osk_visible(&self) -> bool {
        self.osk_visible
    }

    pub fn view(&self, id: InstanceId) -> Option<&AppView> {
        self.entries.get(&id).map(|e| &e.view)
    }

    pub fn view_count(&self) -> usize {
        self.entries.len()
    }

    pub fn switcher(&self) -> &Switcher {
        &self.switcher
    }

    pub fn is_animating(&self) -> bool {
        self.entries.values().any(|e| e.view.is_animating())
            || self.switcher.is_animating()
            || self.notifications.is_animating()
    }

    // --- notifications to clients --------------------------------------

    fn publish_status(&self, snapshot: &InstanceSnapshot, mut status: AppStatus) {
        if snapshot.info.flags.contains(AppFlags::ALLOW_MULTIPLE) {
            status |= AppStatus::MULTI;
        }
        self.bus.publish(CompositorEvent::AppStatus(VisibilityData::new(
            status,
            &snapshot.info.name,
            snapshot.pid,
        )));
    }

    /// Visible/Hidden go only to apps registered for them.
    fn notify_visibility(&self, id: InstanceId, visible: bool) {
        let Some(entry) = self.entries.get(&id) else {
            return;
        };
        if !entry.snapshot.info.flags.contains(AppFlags::VIS_NOTIFY) {
            return;
        }
        let status = if visible {
            AppStatus::VISIBLE
        } else {
            AppStatus::HIDDEN
        };
        self.publish_status(&entry.snapshot, status);
    }

    fn handle_view_event(&mut self, id: InstanceId, event: ViewEvent, now: Instant) {
        match event {
            ViewEvent::Shown => {
                if self.current == Some(id) {
                    self.manager.mark_visible(id, now);
                }
                self.notify_visibility(id, true);
            }
            ViewEvent::Hidden => self.notify_visibility(id, false),
        }
    }

    fn present(&self, id: InstanceId) {
        if let Some(entry) = self.entries.get(&id) {
            entry.view.present(self.window_server.as_ref());
        }
    }

    // --- manager events -------------------------------------------------

    fn handle_manager_event(&mut self, event: ManagerEvent, now: Instant) {
        match event {
            ManagerEvent::InstanceStarted { instance, show } => {
                self.instance_started(instance, show)
            }
            ManagerEvent::BringToFront { instance } => self.show_instance(instance, now),
            ManagerEvent::WindowAdded { instance, window } => {
                let id = instance.id;
                if !self.entries.contains_key(&id) {
                    // Adopted by process_added before we saw it start.
                    self.instance_started(instance, false);
                }
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.view.add_window(window);
                }
                self.present(id);
            }
            ManagerEvent::WindowRemoved { instance, window } => {
                match self.entries.get_mut(&instance) {
                    Some(entry) => {
                        entry.view.remove_window(window);
                    }
                    None => warn!(
                        event = "core.compositor.event_dropped",
                        kind = "window_removed",
                        instance = %instance
                    ),
                }
            }
            ManagerEvent::WindowConfig { instance, reconfig } => {
                match self.entries.get_mut(&instance) {
                    Some(entry) => {
                        if entry.view.reconfigure(&reconfig) {
                            self.present(instance);
                        }
                    }
                    None => warn!(
                        event = "core.compositor.event_dropped",
                        kind = "window_config",
                        instance = %instance
                    ),
                }
            }
            ManagerEvent::WindowReady { instance, window } => {
                let ready = match self.entries.get_mut(&instance) {
                    Some(entry) => entry.view.content_ready(window),
                    None => {
                        warn!(
                            event = "core.compositor.event_dropped",
                            kind = "window_ready",
                            instance = %instance
                        );
                        false
                    }
                };
                if ready {
                    self.view_ready(instance, now);
                }
            }
            ManagerEvent::InstanceExited { instance, crashed } => {
                self.instance_exited(instance, crashed, now)
            }
        }
    }

    fn instance_started(&mut self, snapshot: InstanceSnapshot, show: bool) {
        let id = snapshot.id;
        let flags = snapshot.info.flags;
        let rect = if flags.contains(AppFlags::STATUSBAR) {
            self.statusbar.get_or_insert(id);
            self.layout.statusbar
        } else if flags.contains(AppFlags::OSK) {
            self.osk.get_or_insert(id);
            self.layout.osk
        } else {
            if flags.contains(AppFlags::HOME) {
                self.home.get_or_insert(id);
            }
            self.layout.app
        };

        if !flags.intersects(SHELL) {
            self.switcher.add_thumb(id, &snapshot.info.name, flags);
        }
        self.publish_status(&snapshot, AppStatus::STARTING);
        info!(
            event = "core.compositor.view_created",
            name = %snapshot.info.name,
            instance = %id,
            show = show
        );
        self.entries.insert(
            id,
            Entry {
                view: AppView::new(id, flags, rect),
                snapshot,
            },
        );
    }

    /// First content from an instance.
    fn view_ready(&mut self, id: InstanceId, now: Instant) {
        let Some(flags) = self.entries.get(&id).map(|e| e.snapshot.info.flags) else {
            return;
        };
        debug!(event = "core.compositor.view_ready", instance = %id);

        if Some(id) == self.statusbar {
            let origin = self.layout.statusbar.origin();
            if let Some(entry) = self.entries.get_mut(&id)
                && let Some(event) =
                    entry
                        .view
                        .show(AnimatedProperty::empty(), origin, Duration::ZERO, now)
            {
                self.handle_view_event(id, event, now);
            }
            self.present(id);
        } else if Some(id) == self.osk {
            if self.osk_target.is_some() {
                self.toggle_osk(true, now);
            }
        } else if self.current == Some(id) {
            self.reveal(id, now);
        } else if self.manager.wants_show_on_ready(id) {
            self.show_instance(id, now);
        } else if flags.contains(AppFlags::VIS_NOTIFY) {
            self.notify_visibility(id, false);
        }
    }

    fn instance_exited(&mut self, snapshot: InstanceSnapshot, crashed: bool, now: Instant) {
        let id = snapshot.id;
        self.entries.remove(&id);
        if self.switcher.remove_thumb(id) {
            self.toggle_switcher(false, now);
        }
        if self.osk == Some(id) {
            self.osk = None;
            if self.osk_visible {
                self.osk_visible = false;
                let origin = self.layout.app.origin();
                let duration = self.settings.slide_duration();
                if let Some(entry) = self.current.and_then(|c| self.entries.get_mut(&c)) {
                    entry.view.slide_to(origin, duration, now);
                }
            }
        }
        for slot in [&mut self.home, &mut self.statusbar, &mut self.previous] {
            if *slot == Some(id) {
                *slot = None;
            }
        }
        let was_current = self.current == Some(id);
        if was_current {
            self.current = None;
        }

        self.publish_status(&snapshot, AppStatus::QUIT);
        if crashed {
            self.publish_status(&snapshot, AppStatus::HIDDEN);
            let content = NotificationContent {
                title: "Application crashed!".to_string(),
                body: format!("{} terminated abnormally.", snapshot.info.name),
                icon: String::new(),
                origin: "compositor".to_string(),
                tag: String::new(),
                uuid: String::new(),
                client: Pid::current(),
            };
            if let Err(e) = self.notifications.add_notification(content, None, now) {
                warn!(event = "core.compositor.crash_notice_failed", error = %e);
            }
        }

        if was_current && let Some(home) = self.home {
            self.show_instance(home, now);
        }
    }

    // --- foreground -----------------------------------------------------

    /// Bring `id` to the foreground, hiding whatever was there.
    pub fn show_instance(&mut self, id: InstanceId, now: Instant) {
        self.toggle_switcher(false, now);
        if !self.entries.contains_key(&id) {
            warn!(event = "core.compositor.show_unknown", instance = %id);
            return;
        }
        if self.current == Some(id) {
            return;
        }
        if self.osk_visible {
            self.toggle_osk(false, now);
        }

        if let Some(previous) = self.current.replace(id) {
            self.previous = Some(previous);
            let props = self.settings.hide_props();
            let duration = self.settings.hide_duration();
            let offscreen = Point::new(
                self.layout.app.x - self.layout.app.width,
                self.layout.app.y,
            );
            let hidden = self
                .entries
                .get_mut(&previous)
                .and_then(|entry| entry.view.hide(props, offscreen, duration, now));
            if let Some(event) = hidden {
                self.handle_view_event(previous, event, now);
            }
            self.present(previous);
        }

        info!(
            event = "core.compositor.show_instance",
            instance = %id,
            previous = ?self.previous
        );
        self.reveal(id, now);
    }

    /// Start the show transition of the current instance.
    fn reveal(&mut self, id: InstanceId, now: Instant) {
        let props = self.settings.show_props();
        let duration = self.settings.show_duration();
        let app = self.layout.app;
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };

        let flags = entry.snapshot.info.flags;
        self.window_server
            .set_background_clear(flags.contains(AppFlags::NEEDS_CLEAR));
        self.bus.publish(if flags.contains(AppFlags::USE_BACK) {
            CompositorEvent::BackKeyVisible
        } else {
            CompositorEvent::BackKeyHidden
        });

        if props.contains(AnimatedProperty::POSITION) && !entry.view.is_visible() {
            entry.view.move_to(Point::new(app.right(), app.y));
        }
        if let Some(event) = entry.view.show(props, app.origin(), duration, now) {
            self.handle_view_event(id, event, now);
        }
        self.present(id);
    }

    /// Show or hide the home screen.
    ///
    /// Hiding returns to the previous app; with none it is a no-op.
    pub fn toggle_launcher(&mut self, show: bool, now: Instant) {
        let Some(home) = self.home else {
            warn!(event = "core.compositor.no_home", show = show);
            return;
        };
        if show {
            if self.current != Some(home) {
                self.show_instance(home, now);
            } else if self.entries.get(&home).is_some_and(|e| e.view.is_hiding()) {
                self.reveal(home, now);
            }
            return;
        }

        if self.current != Some(home) {
            return;
        }
        match self
            .previous
            .filter(|p| *p != home && self.entries.contains_key(p))
        {
            Some(previous) => self.show_instance(previous, now),
            None => debug!(
                event = "core.compositor.hide_home_ignored",
                reason = "no previous app"
            ),
        }
    }

    pub fn toggle_switcher(&mut self, show: bool, now: Instant) {
        if show {
            if self.switcher.is_empty() {
                debug!(event = "core.compositor.switcher_empty");
                return;
            }
            if self.osk_visible {
                self.toggle_osk(false, now);
            }
            if self.switcher.show(now) {
                info!(
                    event = "core.compositor.switcher_shown",
                    thumbs = self.switcher.len()
                );
                self.bus.publish(CompositorEvent::SwitcherVisible);
            }
        } else if let Some(events) = self.switcher.hide(now) {
            info!(event = "core.compositor.switcher_hidden");
            self.bus.publish(CompositorEvent::SwitcherHidden);
            self.handle_switcher_events(events, now);
        }
    }

    fn handle_switcher_events(&mut self, events: Vec<SwitcherEvent>, now: Instant) {
        for event in events {
            match event {
                SwitcherEvent::SwitchRequest(id) => self.show_instance(id, now),
                SwitcherEvent::KillRequest(id) => self.kill_app(id, now),
                SwitcherEvent::Feedback { instance, visible } => {
                    self.notify_visibility(instance, visible)
                }
            }
        }
    }

    /// The user picked a thumbnail.
    pub fn switcher_select(&mut self, index: usize, now: Instant) {
        if let Some(event) = self.switcher.select(index) {
            self.handle_switcher_events(vec![event], now);
        }
    }

    /// The user pressed a thumbnail's close button.
    pub fn switcher_close(&mut self, index: usize, now: Instant) {
        if let Some(event) = self.switcher.close(index) {
            self.handle_switcher_events(vec![event], now);
        }
    }

    pub fn switcher_scroll(&mut self, forward: bool) {
        if forward {
            self.switcher.scroll_next();
        } else {
            self.switcher.scroll_previous();
        }
    }

    /// Ask the instance to terminate. It stays on record until reaped.
    pub fn kill_app(&mut self, id: InstanceId, now: Instant) {
        let pid = self
            .entries
            .get(&id)
            .map(|e| e.snapshot.pid)
            .or_else(|| self.manager.instance_by_id(id).map(|s| s.pid));
        let Some(pid) = pid else {
            warn!(event = "core.compositor.kill_unknown", instance = %id);
            return;
        };
        if self.current == Some(id) {
            match self.home.filter(|h| *h != id) {
                Some(home) => self.show_instance(home, now),
                None => self.current = None,
            }
        }
        if self.previous == Some(id) {
            self.previous = None;
        }
        info!(event = "core.compositor.kill_app", instance = %id, pid = pid.as_u32());
        if let Err(e) = self.manager.stop_application(pid) {
            error!(event = "core.compositor.kill_failed", instance = %id, error = %e);
        }
    }

    // --- on-screen keyboard ---------------------------------------------

    /// Bring up the keyboard so `target` stays visible, starting the
    /// keyboard app if needed.
    pub fn show_osk(&mut self, target: Rect, client: Option<Pid>, now: Instant) {
        self.osk_target = Some(target);
        self.osk_client = client;
        if self.osk.is_some() {
            self.toggle_osk(true, now);
            return;
        }

        let Some(name) = self
            .manager
            .application_list()
            .into_iter()
            .find(|info| info.flags.contains(AppFlags::OSK))
            .map(|info| info.name.clone())
        else {
            warn!(event = "core.compositor.osk_missing");
            return;
        };
        if let Err(e) = self.manager.start_application(&name, false) {
            error!(event = "core.compositor.osk_start_failed", name = %name, error = %e);
        }
    }

    pub fn hide_osk(&mut self, now: Instant) {
        self.toggle_osk(false, now);
        self.osk_target = None;
        self.osk_client = None;
    }

    pub fn toggle_osk(&mut self, show: bool, now: Instant) {
        let Some(osk) = self.osk else {
            return;
        };
        if show == self.osk_visible {
            return;
        }

        let keyboard = self.layout.osk;
        let top = self.layout.screen.bottom() - keyboard.height;
        let duration = self.settings.slide_duration();
        let app = self.layout.app.origin();

        let (keyboard_to, app_to) = if show {
            let lift = self
                .osk_target
                .map_or(0, |t| (t.bottom() - top).max(0));
            (Point::new(keyboard.x, top), Point::new(app.x, app.y - lift))
        } else {
            (Point::new(keyboard.x, self.layout.screen.bottom()), app)
        };

        let Some(entry) = self.entries.get_mut(&osk) else {
            return;
        };
        let event = if show {
            entry
                .view
                .show(AnimatedProperty::POSITION, keyboard_to, duration, now)
        } else {
            entry
                .view
                .hide(AnimatedProperty::POSITION, keyboard_to, duration, now)
        };
        self.osk_visible = show;
        if let Some(event) = event {
            self.handle_view_event(osk, event, now);
        }
        if let Some(entry) = self.current.and_then(|c| self.entries.get_mut(&c)) {
            entry.view.slide_to(app_to, duration, now);
        }
        debug!(event = "core.compositor.osk_toggled", visible = show);
    }

    /// Forward a keyboard key. Enter also dismisses the keyboard.
    pub fn send_osk_input(&mut self, key: Key, now: Instant) {
        let client = self
            .osk_client
            .and_then(|pid| self.entries.values().find(|e| e.snapshot.pid == pid))
            .or_else(|| self.current.and_then(|c| self.entries.get(&c)));
        match client.and_then(|e| e.view.main_window()) {
            Some(window) => self.window_server.send_key(window, key),
            None => debug!(event = "core.compositor.osk_input_dropped", key = key.0),
        }
        if key == Key::ENTER {
            self.hide_osk(now);
        }
    }

    pub fn send_back_key(&self) {
        let window = self
            .current
            .and_then(|c| self.entries.get(&c))
            .and_then(|e| e.view.main_window());
        match window {
            Some(window) => self.window_server.send_key(window, Key::BACK),
            None => debug!(event = "core.compositor.back_key_dropped"),
        }
    }

    // --- IPC ------------------------------------------------------------

    fn app_list(&self) -> (i32, String) {
        let apps: Vec<AppData> = self
            .manager
            .application_list()
            .iter()
            .filter(|info| !info.flags.contains(AppFlags::SYSTEM))
            .map(|info| AppData {
                name: AppName::new(&info.name),
                icon: IconPath::new(&info.icon),
            })
            .collect();
        (apps.len() as i32, encode_base64(&encode_app_list(&apps)))
    }

    fn set_options(&mut self, payload: &str) -> Reply {
        match apply_options(&mut self.settings, payload) {
            Ok(applied) => {
                if let Some(opacity) = applied.layer_opacity {
                    self.window_server.set_layer_opacity(opacity);
                }
                self.notifications
                    .set_timeout(self.settings.notification_timeout());
                let thresholds = self.settings.thresholds();
                if let Some(monitor) = self.memory.as_mut() {
                    monitor.set_thresholds(thresholds);
                }
                info!(event = "core.compositor.options_applied");
                Reply::Ack
            }
            Err(e) => {
                warn!(event = "core.compositor.options_rejected", error = %e);
                Reply::error(&e)
            }
        }
    }

    /// Answer one marshalled client request.
    pub fn handle_request(&mut self, call: IpcCall, now: Instant) {
        debug!(event = "core.compositor.request", method = call.method.name());
        let reply = match &call.method {
            Method::StartApp { name } => {
                match self.manager.start_application(name.as_str(), true) {
                    Ok(_) => Reply::Ack,
                    Err(e) => Reply::error(&e),
                }
            }
            Method::ShowHome => {
                self.toggle_launcher(true, now);
                Reply::Ack
            }
            Method::HideHome => {
                self.toggle_launcher(false, now);
                Reply::Ack
            }
            Method::ShowSwitcher => {
                self.toggle_switcher(true, now);
                Reply::Ack
            }
            Method::HideSwitcher => {
                self.toggle_switcher(false, now);
                Reply::Ack
            }
            Method::GetAppList => {
                let (count, data) = self.app_list();
                self.bus.publish(CompositorEvent::SendingAppList {
                    count,
                    data: data.clone(),
                });
                Reply::AppList { count, data }
            }
            Method::GetFps => Reply::Fps(self.fps.fps(now)),
            Method::SendBackKey => {
                self.send_back_key();
                Reply::Ack
            }
            Method::ShowOsk { rect } => {
                self.show_osk(*rect, call.caller, now);
                Reply::Ack
            }
            Method::HideOsk => {
                self.hide_osk(now);
                Reply::Ack
            }
            Method::ConsumeKey { key } => {
                self.send_osk_input(Key(*key), now);
                Reply::Ack
            }
            Method::SetOptions { payload } => self.set_options(payload),
            Method::AddNotification { data } => match self.notifications.add_notification(
                data.clone().into_content(),
                call.caller,
                now,
            ) {
                Ok(_) => Reply::Ack,
                Err(e) => Reply::error(&e),
            },
            Method::Subscribe { .. } | Method::Shutdown | Method::Unknown => Reply::Error {
                code: NOT_IMPLEMENTED.to_string(),
                message: format!(
                    "method '{}' is not handled by the main loop",
                    call.method.name()
                ),
            },
        };
        call.respond(reply);
    }

    // --- timers ---------------------------------------------------------

    /// Advance every running animation one frame and push placements.
    pub fn compose(&mut self, now: Instant) {
        let mut finished = Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            if !entry.view.is_animating() {
                continue;
            }
            if let Some(event) = entry.view.tick(now) {
                finished.push((*id, event));
            }
            entry.view.present(self.window_server.as_ref());
        }
        for (id, event) in finished {
            self.handle_view_event(id, event, now);
        }

        if self.switcher.is_animating() {
            let events = self.switcher.tick(now);
            self.handle_switcher_events(events, now);
        }
        self.notifications.tick(now);
        self.fps.record_frame(now);
    }

    /// Handle one child exit drained from the reaper ring.
    pub fn reap(&mut self, record: ExitRecord, now: Instant) {
        if let Some(event) = self.manager.reap(record) {
            self.handle_manager_event(event, now);
        }
    }

    fn check_memory(&mut self, timers: &mut TimerList<CompositorTimer>, now: Instant) {
        let pids = self.manager.instance_pids();
        let Some(monitor) = self.memory.as_mut() else {
            timers.remove(&CompositorTimer::Memory);
            return;
        };
        let state = monitor.tick(&pids);
        let interval = monitor.interval();
        timers.set_interval(&CompositorTimer::Memory, interval, now);

        match state {
            Some(MemoryState::Critical) => {
                let exclude: Vec<InstanceId> = self.current.into_iter().collect();
                match self.manager.select_victim(&exclude) {
                    Some(victim) => {
                        warn!(
                            event = "core.compositor.memory_evict",
                            name = %victim.info.name,
                            pid = victim.pid.as_u32()
                        );
                        self.kill_app(victim.id, now);
                    }
                    None => warn!(event = "core.compositor.memory_no_victim"),
                }
            }
            Some(MemoryState::Low) => warn!(event = "core.compositor.memory_low"),
            _ => {}
        }
    }

    /// Arm the frame and dismiss timers when there is work for them.
    fn schedule(&mut self, timers: &mut TimerList<CompositorTimer>, now: Instant) {
        if self.is_animating() && !timers.contains(&CompositorTimer::Frame) {
            timers.add(CompositorTimer::Frame, FRAME_INTERVAL, Repeat::Forever, now);
        }
        if self.notifications.active_len() > 0
            && !timers.contains(&CompositorTimer::NotificationDismiss)
        {
            let wait = self
                .next_dismiss
                .take()
                .unwrap_or_else(|| self.notifications.timeout() + TOAST_SLIDE);
            timers.add(
                CompositorTimer::NotificationDismiss,
                wait.max(MIN_WAIT),
                Repeat::ONCE,
                now,
            );
        }
    }
}

impl LoopHandler for Compositor {
    type Timer = CompositorTimer;

    fn on_event(
        &mut self,
        event: LoopEvent,
        timers: &mut TimerList<CompositorTimer>,
        now: Instant,
    ) {
        match event {
            LoopEvent::Manager(event) => self.handle_manager_event(event, now),
            LoopEvent::Request(call) => self.handle_request(call, now),
            LoopEvent::Shutdown => {}
        }
        self.schedule(timers, now);
    }

    fn on_timer(
        &mut self,
        timer: CompositorTimer,
        timers: &mut TimerList<CompositorTimer>,
        now: Instant,
    ) {
        match timer {
            CompositorTimer::Frame => {
                self.compose(now);
                if !self.is_animating() {
                    timers.remove(&CompositorTimer::Frame);
                }
            }
            CompositorTimer::Reap => {
                for record in drain_exits() {
                    self.reap(record, now);
                }
            }
            CompositorTimer::Memory => self.check_memory(timers, now),
            CompositorTimer::NotificationQueue => {
                self.notifications.process_queue(now);
            }
            CompositorTimer::NotificationDismiss => {
                self.next_dismiss = self.notifications.dismiss_expired(now);
            }
        }
        self.schedule(timers, now);
    }
}
