//! Controller settings: layered YAML files, validated into an immutable
//! snapshot that controllers read through [`ExecutionDefaults`].
//!
//! Until the first successful load every accessor returns
//! [`SettingsError::NotLoaded`]; a failed reload keeps serving the last
//! good snapshot.

mod error;
pub use error::{SettingsError, SettingsResult};

mod load;

mod model;
pub use model::{ControllerSettings, ExecutionSettings, Settings};

mod store;
pub use store::{
    DEFAULT_CONFIG_PATH, ExecutionDefaults, LoadStage, ReloadListener, ReloadListenerHandle,
    SettingsStore,
};

mod watch;
