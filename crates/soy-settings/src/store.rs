use std::{
    fmt,
    path::PathBuf,
    sync::{Arc, Mutex, RwLock},
};

use tracing::{debug, info, warn};

use crate::{
    error::{SettingsError, SettingsResult},
    load::load,
    model::{ExecutionSettings, Settings},
    watch::{self, SettingsWatcher},
};

/// Settings file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Step of the settings lifecycle that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Init,
    Watch,
    Reload,
}

impl LoadStage {
    /// Label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            LoadStage::Init => "init",
            LoadStage::Watch => "watch",
            LoadStage::Reload => "reload",
        }
    }
}

/// Notified on every failed load; used for failure counters.
pub trait ReloadListener: Send + Sync + 'static {
    fn reload_failed(&self, stage: LoadStage, err: &SettingsError);
}

pub type ReloadListenerHandle = Arc<dyn ReloadListener>;

/// Read-side contract the controllers depend on.
pub trait ExecutionDefaults: Send + Sync {
    /// Current execution defaults, or [`SettingsError::NotLoaded`] before the first load.
    fn execution_defaults(&self) -> SettingsResult<ExecutionSettings>;
}

/// State reachable from watcher callbacks.
pub(crate) struct Shared {
    paths: Vec<PathBuf>,
    snapshot: RwLock<Option<Settings>>,
    listener: RwLock<Option<ReloadListenerHandle>>,
}

impl Shared {
    /// Load from disk and swap the snapshot in. On failure the previous
    /// snapshot stays in place.
    pub(crate) fn reload(&self, stage: LoadStage) -> SettingsResult<()> {
        match load(&self.paths) {
            Ok(settings) => {
                let mut guard = self.snapshot.write().map_err(|_| SettingsError::Poisoned)?;
                if guard.as_ref() != Some(&settings) {
                    debug!(stage = stage.as_label(), "settings snapshot replaced");
                }
                *guard = Some(settings);
                Ok(())
            }
            Err(err) => {
                self.failed(stage, &err);
                Err(err)
            }
        }
    }

    fn failed(&self, stage: LoadStage, err: &SettingsError) {
        warn!(stage = stage.as_label(), error = %err, "settings load failed");
        let listener = self.listener.read().ok().and_then(|g| g.clone());
        if let Some(listener) = listener {
            listener.reload_failed(stage, err);
        }
    }

    fn current(&self) -> SettingsResult<Settings> {
        let guard = self.snapshot.read().map_err(|_| SettingsError::Poisoned)?;
        guard.clone().ok_or(SettingsError::NotLoaded)
    }
}

/// Injected settings handle with an explicit lifecycle:
/// `new` (not loaded) → `init` (ready, optionally watching) → `reload` on demand.
///
/// Cloning is cheap; all clones share one snapshot.
#[derive(Clone)]
pub struct SettingsStore {
    shared: Arc<Shared>,
    watchers: Arc<Mutex<Vec<SettingsWatcher>>>,
}

impl SettingsStore {
    /// Store over `paths`, read in order. Empty means [`DEFAULT_CONFIG_PATH`].
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let paths = if paths.is_empty() {
            vec![PathBuf::from(DEFAULT_CONFIG_PATH)]
        } else {
            paths
        };
        Self::from_parts(paths, None)
    }

    /// Store that is ready immediately and never touches the filesystem.
    pub fn from_settings(settings: Settings) -> Self {
        Self::from_parts(Vec::new(), Some(settings))
    }

    /// Attach a failure listener, replacing any previous one.
    ///
    /// The listener lives in the shared state, so clones taken before this
    /// call report to it as well. Attach it before [`SettingsStore::init`]
    /// to have first-load failures counted.
    pub fn with_listener(self, listener: ReloadListenerHandle) -> Self {
        if let Ok(mut guard) = self.shared.listener.write() {
            *guard = Some(listener);
        }
        self
    }

    fn from_parts(paths: Vec<PathBuf>, snapshot: Option<Settings>) -> Self {
        Self {
            shared: Arc::new(Shared {
                paths,
                snapshot: RwLock::new(snapshot),
                listener: RwLock::new(None),
            }),
            watchers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.shared.paths
    }

    /// First load. With `watch`, file changes trigger a reload.
    ///
    /// Steps:
    /// 1. Read and merge every path in order, then validate the result.
    /// 2. With `watch`, attach a file watcher to each path.
    /// 3. Publish the snapshot; from here on accessors stop returning
    ///    [`SettingsError::NotLoaded`].
    ///
    /// A failure at any step is reported to the listener with its
    /// [`LoadStage`] and leaves the store not loaded, so the call can be
    /// retried. Calling again after success is a no-op.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use soy_settings::SettingsStore;
    ///
    /// let store = SettingsStore::new(vec!["/etc/soyplane/config.yaml".into()]);
    /// store.init(true)?;
    /// println!("default image: {}", store.execution()?.default_image);
    /// # Ok::<(), soy_settings::SettingsError>(())
    /// ```
    pub fn init(&self, watch: bool) -> SettingsResult<()> {
        if self.is_ready() {
            info!("settings already initialized");
            return Ok(());
        }

        let settings = load(&self.shared.paths).inspect_err(|err| {
            self.shared.failed(LoadStage::Init, err);
        })?;

        if watch {
            let attached = watch::attach(&self.shared, &self.shared.paths).inspect_err(|err| {
                self.shared.failed(LoadStage::Watch, err);
            })?;
            let mut guard = self.watchers.lock().map_err(|_| SettingsError::Poisoned)?;
            *guard = attached;
            info!(paths = ?self.shared.paths, "settings watch enabled");
        }

        let mut guard = self.shared.snapshot.write().map_err(|_| SettingsError::Poisoned)?;
        *guard = Some(settings);
        info!("settings loaded");
        Ok(())
    }

    /// Reload from disk, keeping the previous snapshot on failure.
    pub fn reload(&self) -> SettingsResult<()> {
        self.shared.reload(LoadStage::Reload)
    }

    pub fn is_ready(&self) -> bool {
        self.shared
            .snapshot
            .read()
            .map(|g| g.is_some())
            .unwrap_or(false)
    }

    /// Whole settings snapshot.
    pub fn snapshot(&self) -> SettingsResult<Settings> {
        self.shared.current()
    }

    pub fn execution(&self) -> SettingsResult<ExecutionSettings> {
        self.shared.current().map(|s| s.execution)
    }
}

impl ExecutionDefaults for SettingsStore {
    fn execution_defaults(&self) -> SettingsResult<ExecutionSettings> {
        self.execution()
    }
}

impl fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsStore")
            .field("paths", &self.shared.paths)
            .field("ready", &self.is_ready())
            .finish()
    }
}
