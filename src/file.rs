//! Locating and loading the active config file.
//!
//! # Discovery
//!
//! [`locate_config_file`] checks, in order:
//!
//! 1. The override environment variable (`{APP}_CONFIG`). A directory means
//!    `{dir}/{app}.cfg`.
//! 2. `{cwd}/{app}.cfg`, unless the working directory is world-writable.
//! 3. `~/.{app}.cfg`
//! 4. `/etc/{app}/{app}.cfg`
//!
//! The first candidate that exists and can be opened wins. A file skipped
//! because its directory is world-writable produces a warning unless the
//! environment override was the one selected.
//!
//! # Loading
//!
//! [`ConfigFileCache`] parses each path at most once, even when several
//! threads ask for the same file at the same time. A failed parse is not
//! cached, so a later request retries.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::coerce::resolve_path;
use crate::error::ResolveError;
use crate::ini::{ConfigFile, IniFile};
use crate::types::FileFormat;

/// Result of config file discovery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Located {
    pub path: Option<PathBuf>,
    pub warnings: Vec<String>,
}

/// Name of the override variable for `app_name`, e.g. `MYAPP_CONFIG`.
pub fn override_var(app_name: &str) -> String {
    format!("{}_CONFIG", app_name.to_uppercase().replace('-', "_"))
}

/// Find the active config file using the process environment, the working
/// directory and the user's home directory.
pub fn locate_config_file(app_name: &str) -> Located {
    let from_env = std::env::var_os(override_var(app_name));
    let cwd = std::env::current_dir().ok();
    let home = directories::UserDirs::new().map(|u| u.home_dir().to_path_buf());
    locate_config_file_from(
        app_name,
        from_env,
        cwd.as_deref(),
        home.as_deref(),
        Path::new("/etc"),
    )
}

/// Like [`locate_config_file`] but with every input explicit. Used in tests.
pub fn locate_config_file_from(
    app_name: &str,
    from_env: Option<OsString>,
    cwd: Option<&Path>,
    home: Option<&Path>,
    system_root: &Path,
) -> Located {
    let file_name = format!("{app_name}.cfg");
    let mut candidates = Vec::new();
    let mut warnings = Vec::new();

    let env_path = from_env.map(|raw| {
        let path = resolve_path(&raw.to_string_lossy(), cwd);
        if path.is_dir() { path.join(&file_name) } else { path }
    });
    candidates.extend(env_path.clone());

    let mut skipped_cwd = None;
    if let Some(cwd) = cwd {
        let cwd_file = cwd.join(&file_name);
        if is_world_writable(cwd) {
            if cwd_file.exists() {
                skipped_cwd = Some(cwd.to_path_buf());
            }
        } else {
            candidates.push(cwd_file);
        }
    }

    if let Some(home) = home {
        candidates.push(home.join(format!(".{file_name}")));
    }
    candidates.push(system_root.join(app_name).join(&file_name));

    let path = candidates.into_iter().find(|p| is_readable_file(p));

    if let Some(dir) = skipped_cwd
        && env_path != path
    {
        tracing::warn!(dir = %dir.display(), "ignoring config file in world-writable directory");
        warnings.push(format!(
            "{app_name} is being run in a world writable directory ({}), ignoring it as an {file_name} source.",
            dir.display()
        ));
    }

    Located { path, warnings }
}

fn is_readable_file(path: &Path) -> bool {
    path.exists() && std::fs::File::open(path).is_ok()
}

#[cfg(unix)]
fn is_world_writable(dir: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(dir)
        .map(|m| m.permissions().mode() & 0o002 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_world_writable(_dir: &Path) -> bool {
    false
}

/// Read and parse a config file, choosing the parser by extension.
pub fn load_config_file(path: &Path) -> Result<Arc<dyn ConfigFile>, ResolveError> {
    match FileFormat::from_path(path)? {
        FileFormat::Ini => {
            let content =
                std::fs::read_to_string(path).map_err(|source| ResolveError::ConfigFileRead {
                    path: path.to_path_buf(),
                    source,
                })?;
            let parsed = IniFile::parse(&content, path)?;
            tracing::debug!(path = %path.display(), "parsed config file");
            Ok(Arc::new(parsed))
        }
        FileFormat::Yaml => Err(ResolveError::UnsupportedConfigType {
            path: path.to_path_buf(),
            kind: FileFormat::Yaml.as_str().to_string(),
        }),
    }
}

type Slot = Arc<OnceCell<Arc<dyn ConfigFile>>>;

/// Parse-once cache of config files keyed by path.
#[derive(Debug, Default)]
pub struct ConfigFileCache {
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl ConfigFileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parsed file at `path`, parsing it on first use.
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<dyn ConfigFile>, ResolveError> {
        let slot = Arc::clone(self.slots.lock().entry(path.to_path_buf()).or_default());
        slot.get_or_try_init(|| load_config_file(path)).cloned()
    }

    /// Seed the cache with an already-parsed file.
    pub fn insert(&self, path: impl Into<PathBuf>, file: Arc<dyn ConfigFile>) {
        let slot: Slot = Arc::new(OnceCell::with_value(file));
        self.slots.lock().insert(path.into(), slot);
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        self.slots
            .lock()
            .get(path)
            .is_some_and(|slot| slot.get().is_some())
    }
}
