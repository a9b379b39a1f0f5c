use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::ArgMatches;
use tracing::{error, info, warn};

use stagehand_core::apps::ApplicationManager;
use stagehand_core::compositor::NullWindowServer;
use stagehand_core::config::StageConfig;
use stagehand_core::errors::StartupError;
use stagehand_core::events;
use stagehand_core::ipc::protocol::{FixedStr, Uuid};
use stagehand_core::ipc::{CompositorEvent, IpcClient, NotificationData, ServerContext};
use stagehand_core::memory::ProcSampler;
use stagehand_core::notifications::{NotificationManager, NotificationMethod};
use stagehand_core::process::{self, SystemSpawner};
use stagehand_core::{
    Compositor, CompositorParts, EventLoop, IpcServer, MemoryMonitor, Pid, SwitcherKind,
};

/// Load configuration with warning on errors.
///
/// Falls back to defaults if config loading fails, but notifies the user via:
/// - stderr message for immediate visibility
/// - structured log event `cli.config.load_failed` for debugging
fn load_config_with_warning() -> StageConfig {
    match StageConfig::load_hierarchy() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Could not load config: {}. Using defaults.\n\
                 Tip: Check ~/.stagehand/config.toml and ./.stagehand/config.toml for syntax errors.",
                e
            );
            warn!(
                event = "cli.config.load_failed",
                error = %e,
                "Config load failed, using defaults"
            );
            StageConfig::default()
        }
    }
}

/// `--socket` wins over the configured path.
fn socket_path(matches: &ArgMatches, config: &StageConfig) -> PathBuf {
    matches
        .get_one::<String>("socket")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.socket_path())
}

fn connect(matches: &ArgMatches) -> Result<IpcClient, Box<dyn std::error::Error>> {
    let config = load_config_with_warning();
    let path = socket_path(matches, &config);
    match IpcClient::connect(&path) {
        Ok(client) => Ok(client),
        Err(e) => {
            eprintln!("Failed to reach the compositor at {}: {}", path.display(), e);
            error!(event = "cli.connect_failed", path = %path.display(), error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}

pub fn run_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    events::log_app_startup();

    match matches.subcommand() {
        Some(("run", sub_matches)) => handle_run_command(sub_matches),
        Some(("start", sub_matches)) => handle_start_command(sub_matches),
        Some(("home", sub_matches)) => handle_home_command(sub_matches),
        Some(("switcher", sub_matches)) => handle_switcher_command(sub_matches),
        Some(("apps", sub_matches)) => handle_apps_command(sub_matches),
        Some(("fps", sub_matches)) => handle_fps_command(sub_matches),
        Some(("back", sub_matches)) => handle_back_command(sub_matches),
        Some(("notify", sub_matches)) => handle_notify_command(sub_matches),
        Some(("options", sub_matches)) => handle_options_command(sub_matches),
        Some(("shutdown", sub_matches)) => handle_shutdown_command(sub_matches),
        _ => {
            error!(event = "cli.command_unknown");
            Err("Unknown command".into())
        }
    }
}

fn handle_run_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    info!(event = "cli.run_started");

    match run_daemon(matches) {
        Ok(()) => {
            info!(event = "cli.run_completed");
            Ok(())
        }
        Err(e) => {
            eprintln!("Compositor failed to start: {}", e);
            error!(event = "cli.run_failed", error = %e);
            events::log_stage_error(&e);
            Err(e.into())
        }
    }
}

fn run_daemon(matches: &ArgMatches) -> Result<(), StartupError> {
    // A daemon with a broken config should not come up on defaults.
    let config = StageConfig::load_hierarchy()?;

    let apps_dir = matches
        .get_one::<String>("apps")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.apps_dir());
    let socket = socket_path(matches, &config);
    let switcher = matches
        .get_one::<String>("switcher")
        .map(|s| s.parse::<SwitcherKind>())
        .transpose()
        .map_err(|message| StartupError::Config(invalid_config(message)))?
        .unwrap_or_default();

    process::install_child_reaper().map_err(|e| StartupError::Reaper {
        message: e.to_string(),
    })?;

    let settings = config.settings();
    let layout = config.layout.clone();
    let mut event_loop = EventLoop::new();

    let window_server = Arc::new(NullWindowServer);
    let manager = Arc::new(ApplicationManager::new(
        layout.clone(),
        apps_dir.clone(),
        Arc::new(SystemSpawner),
        window_server.clone(),
        event_loop.sender(),
    ));

    let bus = stagehand_core::ipc::EventBus::new();
    let notifications = Arc::new(NotificationManager::new(
        layout.app,
        settings.notification_timeout(),
        Arc::new(bus.clone()),
    ));
    let memory = settings
        .mem_monitor
        .then(|| MemoryMonitor::new(Box::new(ProcSampler::new()), settings.thresholds()));

    let server = IpcServer::start(
        &socket,
        ServerContext {
            loop_tx: event_loop.sender(),
            notifications: notifications.clone(),
            bus: bus.clone(),
        },
        true,
    )
    .map_err(|e| StartupError::Ipc {
        message: e.to_string(),
    })?;

    let mut compositor = Compositor::new(CompositorParts {
        manager: manager.clone(),
        window_server,
        notifications,
        bus,
        settings,
        layout,
        switcher,
        memory,
    });
    manager.init_startup();
    compositor.install_timers(event_loop.timers_mut(), Instant::now());

    events::log_daemon_ready(&socket, &apps_dir, manager.application_list().len());
    println!("Compositor listening on {}", socket.display());

    event_loop.run(&mut compositor);

    events::log_daemon_shutdown(manager.instance_count());
    manager.stop_all();
    server.stop();

    Ok(())
}

fn text_arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .unwrap_or_default()
}

fn invalid_config(message: String) -> stagehand_core::errors::ConfigError {
    stagehand_core::errors::ConfigError::InvalidConfiguration { message }
}

fn handle_start_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let name = matches
        .get_one::<String>("name")
        .ok_or("Application name is required")?;

    info!(event = "cli.start_started", name = name.as_str());

    let mut client = connect(matches)?;
    match client.start_app(name) {
        Ok(()) => {
            println!("Started '{}'", name);
            info!(event = "cli.start_completed", name = name.as_str());
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to start '{}': {}", name, e);
            error!(event = "cli.start_failed", name = name.as_str(), error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}

fn handle_home_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let show = matches.get_one::<String>("action").map(String::as_str) == Some("show");

    info!(event = "cli.home_started", show = show);

    let mut client = connect(matches)?;
    match client.show_home(show) {
        Ok(()) => {
            info!(event = "cli.home_completed", show = show);
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to toggle the home screen: {}", e);
            error!(event = "cli.home_failed", show = show, error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}

fn handle_switcher_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let show = matches.get_one::<String>("action").map(String::as_str) == Some("show");

    info!(event = "cli.switcher_started", show = show);

    let mut client = connect(matches)?;
    match client.show_switcher(show) {
        Ok(()) => {
            info!(event = "cli.switcher_completed", show = show);
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to toggle the switcher: {}", e);
            error!(event = "cli.switcher_failed", show = show, error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}

fn handle_apps_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let json_output = matches.get_flag("json");

    info!(event = "cli.apps_started", json_output = json_output);

    let mut client = connect(matches)?;
    match client.get_app_list() {
        Ok(apps) => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(&apps)?);
            } else if apps.is_empty() {
                println!("No launchable applications.");
            } else {
                for app in &apps {
                    if app.icon.is_empty() {
                        println!("{}", app.name);
                    } else {
                        println!("{:<32} {}", app.name.as_str(), app.icon);
                    }
                }
            }

            info!(event = "cli.apps_completed", count = apps.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to list applications: {}", e);
            error!(event = "cli.apps_failed", error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}

fn handle_fps_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    info!(event = "cli.fps_started");

    let mut client = connect(matches)?;
    match client.get_fps() {
        Ok(fps) => {
            println!("{:.1}", fps);
            info!(event = "cli.fps_completed", fps = fps);
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to read frame rate: {}", e);
            error!(event = "cli.fps_failed", error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}

fn handle_back_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    info!(event = "cli.back_started");

    let mut client = connect(matches)?;
    match client.send_back_key() {
        Ok(()) => {
            info!(event = "cli.back_completed");
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to send back key: {}", e);
            error!(event = "cli.back_failed", error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}

fn handle_notify_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let wait = matches.get_flag("wait");
    let me = Pid::current();

    info!(event = "cli.notify_started", title = text_arg(matches, "title"), wait = wait);

    let mut client = connect(matches)?;
    // Acks are routed by subscriber pid, so subscribe before posting.
    client.subscribe(me)?;

    let data = NotificationData {
        body: FixedStr::new(text_arg(matches, "body")),
        icon: FixedStr::new(text_arg(matches, "icon")),
        origin: FixedStr::new("stagehand"),
        tag: FixedStr::new(text_arg(matches, "tag")),
        title: FixedStr::new(text_arg(matches, "title")),
        uuid: Uuid::default(),
        client: me,
    };
    if let Err(e) = client.add_notification(data) {
        eprintln!("Failed to post notification: {}", e);
        error!(event = "cli.notify_failed", error = %e);
        events::log_app_error(&e);
        return Err(e.into());
    }

    if !wait {
        info!(event = "cli.notify_completed");
        return Ok(());
    }

    loop {
        let ack = match client.next_event() {
            Ok(CompositorEvent::NotificationAck(ack)) => ack,
            Ok(_) => continue,
            Err(e) => {
                eprintln!("Lost the compositor while waiting: {}", e);
                error!(event = "cli.notify_wait_failed", error = %e);
                events::log_app_error(&e);
                return Err(e.into());
            }
        };
        info!(
            event = "cli.notify_ack_received",
            method = ?ack.method,
            uuid = ack.uuid.as_str()
        );
        match ack.method {
            NotificationMethod::Show => println!("shown {}", ack.uuid),
            NotificationMethod::Click => {
                println!("clicked {}", ack.uuid);
                return Ok(());
            }
            NotificationMethod::Close => {
                println!("closed {}", ack.uuid);
                return Ok(());
            }
            NotificationMethod::Error => {
                eprintln!("Compositor rejected the notification");
                return Err("notification rejected".into());
            }
        }
    }
}

fn handle_options_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let file = matches
        .get_one::<String>("file")
        .ok_or("Options file is required")?;

    info!(event = "cli.options_started", file = file.as_str());

    let payload = if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file).inspect_err(|e| {
            eprintln!("Failed to read '{}': {}", file, e);
            error!(event = "cli.options_read_failed", file = file.as_str(), error = %e);
        })?
    };

    let mut client = connect(matches)?;
    match client.set_options(&payload) {
        Ok(()) => {
            info!(event = "cli.options_completed");
            Ok(())
        }
        Err(e) => {
            eprintln!("Options rejected: {}", e);
            error!(event = "cli.options_failed", error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}

fn handle_shutdown_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    info!(event = "cli.shutdown_started");

    let mut client = connect(matches)?;
    match client.shutdown() {
        Ok(()) => {
            println!("Compositor stopping");
            info!(event = "cli.shutdown_completed");
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to stop the compositor: {}", e);
            error!(event = "cli.shutdown_failed", error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}
