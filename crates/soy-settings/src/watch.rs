use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, trace, warn};

use crate::{
    error::{SettingsError, SettingsResult},
    store::{LoadStage, Shared},
};

/// Keeps a file watcher alive; dropping it stops the watch.
pub(crate) struct SettingsWatcher {
    _inner: RecommendedWatcher,
}

/// Watch the directory of every settings file and reload on changes.
///
/// Directories are watched instead of files so atomic replaces (rename over
/// the old file, or a ConfigMap `..data` symlink swap) are seen.
pub(crate) fn attach(shared: &Arc<Shared>, paths: &[PathBuf]) -> SettingsResult<Vec<SettingsWatcher>> {
    let mut watchers = Vec::with_capacity(paths.len());

    for path in paths {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| SettingsError::Watch(format!("{} has no file name", path.display())))?;

        let shared = Arc::downgrade(shared);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "settings watch error");
                    return;
                }
            };
            if !is_relevant(&event, &file_name) {
                trace!(paths = ?event.paths, "ignoring unrelated file event");
                return;
            }
            let Some(shared) = shared.upgrade() else {
                return;
            };
            if shared.reload(LoadStage::Reload).is_ok() {
                info!("settings reloaded after file change");
            }
        })
        .map_err(|e| SettingsError::Watch(e.to_string()))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| SettingsError::Watch(format!("{}: {e}", dir.display())))?;
        watchers.push(SettingsWatcher { _inner: watcher });
    }

    Ok(watchers)
}

fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    let kind = &event.kind;
    if !(kind.is_create() || kind.is_modify() || kind.is_remove()) {
        return false;
    }
    event.paths.iter().any(|p| match p.file_name() {
        Some(name) => name == file_name.as_os_str() || name.to_string_lossy().starts_with(".."),
        None => false,
    })
}
