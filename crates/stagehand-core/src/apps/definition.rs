//! `.appdef` application definition files.
//!
//! One TOML document per application:
//!
//! ```toml
//! name = "Browser"
//! author = "Stagehand"
//! licence = "MIT"
//! category = "internet"
//! version = 2
//! icon = "@DATADIR:browser.png"
//! exec = "$STAGEHAND_APPS$browser"
//! args = "--kiosk --no-sandbox"
//! flags = "APP_ALLOW_MULTIPLE, APP_USE_BACK"
//! deps = "DEP_NETWORK"
//! ```

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::apps::errors::AppError;
use crate::apps::types::{AppFlags, AppId, AppInfo, DependencyFlags};

pub const APPDEF_EXTENSION: &str = "appdef";

/// Icon paths starting with this prefix resolve under `<apps folder>/icons/`.
const DATADIR_PREFIX: &str = "@DATADIR:";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppDefinition {
    pub name: Option<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub licence: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub icon: String,
    pub exec: Option<String>,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub flags: String,
    #[serde(default)]
    pub deps: String,
}

fn default_category() -> String {
    "default".to_string()
}

/// Read and parse one definition file.
pub fn parse_appdef(path: &Path) -> Result<AppDefinition, AppError> {
    let content = fs::read_to_string(path).map_err(|e| AppError::DefinitionRead {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    toml::from_str(&content).map_err(|e| AppError::DefinitionParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

impl AppDefinition {
    /// Validate required fields, resolve the executable and build an [`AppInfo`].
    pub fn into_info(self, source: &Path, folder: &Path) -> Result<AppInfo, AppError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| AppError::MissingField {
                path: source.display().to_string(),
                field: "name",
            })?;
        let exec = self
            .exec
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::MissingField {
                path: source.display().to_string(),
                field: "exec",
            })?;

        let path = search_exec(&exec).ok_or_else(|| AppError::ExecutableNotFound {
            name: name.clone(),
            exec: exec.clone(),
        })?;

        Ok(AppInfo {
            id: AppId::next(),
            name,
            author: self.author,
            licence: self.licence,
            category: self.category,
            version: self.version,
            icon: resolve_icon(&self.icon, folder),
            path,
            args: self.args.trim().to_string(),
            flags: AppFlags::parse_tokens(&self.flags),
            deps: DependencyFlags::parse_tokens(&self.deps),
        })
    }
}

fn resolve_icon(icon: &str, folder: &Path) -> String {
    match icon.strip_prefix(DATADIR_PREFIX) {
        Some(file) => folder.join("icons").join(file).display().to_string(),
        None => icon.to_string(),
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Resolve an `exec` entry to an executable path.
///
/// - absolute paths must exist and be executable
/// - `$VAR$file` resolves `file` inside the directory named by `$VAR`
/// - anything else is looked up on `$PATH`
pub fn search_exec(exec: &str) -> Option<PathBuf> {
    debug!(event = "core.apps.search_exec", exec = exec);

    if exec.starts_with('/') {
        let path = PathBuf::from(exec);
        return is_executable(&path).then_some(path);
    }

    if let Some(rest) = exec.strip_prefix('$') {
        let (var, file) = rest.split_once('$')?;
        let dir = std::env::var_os(var)?;
        let path = Path::new(&dir).join(file);
        return is_executable(&path).then_some(path);
    }

    which::which(exec).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_exec(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_parse_and_resolve_absolute() {
        let dir = TempDir::new().unwrap();
        let exec = write_exec(dir.path(), "browser");
        let def_path = dir.path().join("browser.appdef");
        fs::write(
            &def_path,
            format!(
                "name = \"Browser\"\nexec = \"{}\"\nargs = \" --kiosk \"\nicon = \"@DATADIR:browser.png\"\nflags = \"APP_USE_BACK\"\n",
                exec.display()
            ),
        )
        .unwrap();

        let info = parse_appdef(&def_path)
            .unwrap()
            .into_info(&def_path, dir.path())
            .unwrap();
        assert_eq!(info.name, "Browser");
        assert_eq!(info.path, exec);
        assert_eq!(info.args, "--kiosk");
        assert_eq!(info.category, "default");
        assert_eq!(info.flags, AppFlags::USE_BACK);
        assert!(info.icon.ends_with("icons/browser.png"));
    }

    #[test]
    fn test_missing_name_rejected() {
        let dir = TempDir::new().unwrap();
        let def_path = dir.path().join("x.appdef");
        fs::write(&def_path, "exec = \"/bin/sh\"\n").unwrap();
        let err = parse_appdef(&def_path)
            .unwrap()
            .into_info(&def_path, dir.path())
            .unwrap_err();
        assert!(matches!(err, AppError::MissingField { field: "name", .. }));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let dir = TempDir::new().unwrap();
        let def_path = dir.path().join("bad.appdef");
        fs::write(&def_path, "name = \n").unwrap();
        assert!(matches!(
            parse_appdef(&def_path),
            Err(AppError::DefinitionParse { .. })
        ));
    }

    #[test]
    fn test_search_exec_non_executable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain");
        fs::write(&path, "data").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(search_exec(&path.display().to_string()).is_none());
    }

    #[test]
    fn test_search_exec_env_var_form() {
        let dir = TempDir::new().unwrap();
        let exec = write_exec(dir.path(), "launcher");
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("STAGEHAND_TEST_APPS_DIR", dir.path()) };
        assert_eq!(search_exec("$STAGEHAND_TEST_APPS_DIR$launcher"), Some(exec));
        assert!(search_exec("$STAGEHAND_TEST_UNSET_VAR$launcher").is_none());
    }

    #[test]
    fn test_search_exec_uses_path() {
        assert!(search_exec("sh").is_some());
        assert!(search_exec("stagehand-definitely-missing-binary").is_none());
    }
}
