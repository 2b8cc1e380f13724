use std::{fs, path::PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::trace;

use crate::{
    error::{SettingsError, SettingsResult},
    model::Settings,
};

/// Read every file in order, merge them and validate the result.
///
/// Later files override earlier ones key by key; nested mappings merge
/// recursively, everything else is replaced. Empty files are skipped.
pub(crate) fn load(paths: &[PathBuf]) -> SettingsResult<Settings> {
    let mut merged = Value::Mapping(Mapping::new());

    for path in paths {
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;
        let layer: Value = serde_yaml::from_str(&raw).map_err(|source| SettingsError::Parse {
            origin: path.display().to_string(),
            source,
        })?;
        trace!(path = %path.display(), "settings layer read");
        merge(&mut merged, layer);
    }

    let settings: Settings =
        serde_yaml::from_value(merged).map_err(|source| SettingsError::Parse {
            origin: "merged settings".to_string(),
            source,
        })?;
    settings.validate()?;
    Ok(settings)
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn file(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn missing_sections_take_defaults() {
        let f = file("controller:\n  workers: 2\n");
        let s = load(&[f.path().to_path_buf()]).unwrap();
        assert_eq!(s.controller.workers, 2);
        assert_eq!(s.execution.default_image, "tofuutils/tenv:latest");
    }

    #[test]
    fn later_files_override_nested_keys() {
        let base = file(
            "execution:\n  defaultImage: base/image:1\n  defaultEngine: terraform\n",
        );
        let overlay = file("execution:\n  defaultImage: overlay/image:2\n");

        let s = load(&[base.path().to_path_buf(), overlay.path().to_path_buf()]).unwrap();
        assert_eq!(s.execution.default_image, "overlay/image:2");
        assert_eq!(s.execution.default_engine, "terraform");
    }

    #[test]
    fn empty_file_is_a_noop_layer() {
        let base = file("execution:\n  defaultImage: base/image:1\n");
        let empty = file("");

        let s = load(&[base.path().to_path_buf(), empty.path().to_path_buf()]).unwrap();
        assert_eq!(s.execution.default_image, "base/image:1");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load(&[PathBuf::from("/nonexistent/soyplane.yaml")]).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let f = file("execution: [unterminated\n");
        let err = load(&[f.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn wrong_type_is_a_parse_error() {
        let f = file("controller:\n  workers: many\n");
        let err = load(&[f.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }
}
