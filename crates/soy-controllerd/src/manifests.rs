//! Seeds the in-memory store from a directory of YAML manifests.
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use soy_core::client::MemoryStore;
use soy_model::Manifest;
use tracing::{debug, info};

/// Apply every `.yaml`/`.yml` document under `dir`, in file-name order.
///
/// A file may hold several `---` separated documents; empty documents are
/// skipped. The first invalid document aborts the load.
pub async fn load(dir: &Path, store: &MemoryStore) -> anyhow::Result<usize> {
    let mut applied = 0;
    for path in manifest_files(dir).await? {
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("read {}", path.display()))?;

        for manifest in parse(&text).with_context(|| format!("parse {}", path.display()))? {
            let kind = manifest.kind();
            let key = store
                .apply(manifest)
                .await
                .with_context(|| format!("apply {kind} from {}", path.display()))?;
            debug!(kind, %key, file = %path.display(), "manifest applied");
            applied += 1;
        }
    }
    info!(dir = %dir.display(), applied, "manifests loaded");
    Ok(applied)
}

fn parse(text: &str) -> anyhow::Result<Vec<Manifest>> {
    let mut out = Vec::new();
    for (idx, doc) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = serde_yaml::Value::deserialize(doc)
            .with_context(|| format!("document {idx}"))?;
        if value.is_null() {
            continue;
        }
        let manifest: Manifest =
            serde_yaml::from_value(value).with_context(|| format!("document {idx}"))?;
        out.push(manifest.normalize().with_context(|| format!("document {idx}"))?);
    }
    Ok(out)
}

async fn manifest_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("read manifest dir {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        if is_yaml && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
