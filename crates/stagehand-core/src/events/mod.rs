//! Process-level lifecycle events shared by the daemon and the CLI.

use std::path::Path;

use tracing::{error, info};

use crate::errors::StageError;

pub fn log_app_startup() {
    info!(
        event = "core.app.startup_completed",
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id()
    );
}

/// The daemon is bound and about to enter its main loop.
pub fn log_daemon_ready(socket: &Path, apps_dir: &Path, registered: usize) {
    info!(
        event = "core.app.daemon_ready",
        socket = %socket.display(),
        apps_dir = %apps_dir.display(),
        registered = registered
    );
}

/// The main loop has returned. `running` instances are about to be stopped.
pub fn log_daemon_shutdown(running: usize) {
    info!(event = "core.app.shutdown_started", running = running);
}

pub fn log_app_error(error: &dyn std::error::Error) {
    error!(
        event = "core.app.error_occurred",
        error = %error,
        error_type = std::any::type_name_of_val(error)
    );
}

/// Like [`log_app_error`], with the stable code of a domain error attached.
pub fn log_stage_error(error: &dyn StageError) {
    error!(
        event = "core.app.error_occurred",
        error = %error,
        code = error.error_code(),
        user_error = error.is_user_error()
    );
}
