use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::apps::definition::{APPDEF_EXTENSION, parse_appdef};
use crate::apps::errors::AppError;
use crate::apps::types::{AppFlags, AppId, AppInfo};

/// The set of installed applications, sorted case-insensitively by name.
#[derive(Debug, Default, Clone)]
pub struct AppRegistry {
    infos: Vec<Arc<AppInfo>>,
}

/// Case-insensitive ordering; a shorter name sorts before its extensions.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.chars().map(|c| c.to_ascii_lowercase()))
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.appdef` in `dir`.
    ///
    /// A file that fails to parse or resolve is logged and skipped. Names
    /// already registered are skipped. Returns the number of apps added.
    pub fn parse_folder(&mut self, dir: &Path) -> Result<usize, AppError> {
        let entries = fs::read_dir(dir).map_err(|e| AppError::FolderRead {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;

        let mut files: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == APPDEF_EXTENSION))
            .collect();
        files.sort();

        let mut added = 0;
        for file in files {
            let result = parse_appdef(&file).and_then(|def| def.into_info(&file, dir));
            match result {
                Ok(info) => match self.add(info) {
                    Ok(()) => added += 1,
                    Err(e) => warn!(
                        event = "core.apps.appdef_skipped",
                        path = %file.display(),
                        error = %e
                    ),
                },
                Err(e) => warn!(
                    event = "core.apps.appdef_skipped",
                    path = %file.display(),
                    error = %e
                ),
            }
        }

        self.infos.sort_by(|a, b| compare_names(&a.name, &b.name));

        info!(
            event = "core.apps.parse_folder_completed",
            path = %dir.display(),
            added = added,
            total = self.infos.len()
        );
        Ok(added)
    }

    /// Register an application. Names are unique.
    pub fn add(&mut self, info: AppInfo) -> Result<(), AppError> {
        if self.by_name(&info.name).is_some() {
            return Err(AppError::Duplicate { name: info.name });
        }
        self.infos.push(Arc::new(info));
        Ok(())
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<AppInfo>> {
        self.infos.iter().find(|info| info.name == name)
    }

    pub fn by_id(&self, id: AppId) -> Option<&Arc<AppInfo>> {
        self.infos.iter().find(|info| info.id == id)
    }

    pub fn by_path(&self, path: &Path) -> Option<&Arc<AppInfo>> {
        self.infos.iter().find(|info| info.path == path)
    }

    pub fn with_flag(&self, flag: AppFlags) -> impl Iterator<Item = &Arc<AppInfo>> {
        self.infos.iter().filter(move |info| info.flags.contains(flag))
    }

    pub fn list(&self) -> &[Arc<AppInfo>] {
        &self.infos
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}
