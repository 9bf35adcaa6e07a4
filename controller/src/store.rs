use std::{io::ErrorKind, path::PathBuf};

use anyhow::Context;
use growbox_common::RuntimeConfig;

/// Read-only access to `runtime.json` in the data directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    runtime_path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Self {
        let data_dir = std::env::var("GROWBOX_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.growbox"));

        Self::in_dir(data_dir)
    }

    pub fn in_dir(data_dir: PathBuf) -> Self {
        Self {
            runtime_path: data_dir.join("runtime.json"),
        }
    }

    pub async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(&self.runtime_path).await {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
                .with_context(|| format!("malformed {}", self.runtime_path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}
