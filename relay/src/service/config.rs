use crate::generator::SweepConfig;
use anyhow::Context;
use scancore::geometry::{CoordinateTransformer, DEFAULT_WHEEL_BASE};
use scancore::store::{JsonlStore, MemoryStore, PointStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;
pub const DEFAULT_STORE_PATH: &str = "points.jsonl";

pub fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    pub wheel_base: f64,
    /// Durable JSON-lines store. `null` keeps points in memory only.
    pub store_path: Option<PathBuf>,
    pub outbox_capacity: usize,
    pub simulate: Option<SweepConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            wheel_base: DEFAULT_WHEEL_BASE,
            store_path: Some(PathBuf::from(DEFAULT_STORE_PATH)),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            simulate: None,
        }
    }
}

impl RelayConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading relay config {}", path_ref.display()))?;
        let config: RelayConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing relay config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        bind: SocketAddr,
        wheel_base: f64,
        store_path: Option<PathBuf>,
        outbox_capacity: usize,
    ) -> Self {
        Self {
            bind,
            wheel_base,
            store_path,
            outbox_capacity,
            simulate: None,
        }
    }

    pub fn transformer(&self) -> CoordinateTransformer {
        CoordinateTransformer::new(self.wheel_base)
    }

    pub fn open_store(&self) -> anyhow::Result<Arc<dyn PointStore>> {
        match &self.store_path {
            Some(path) => {
                let store = JsonlStore::open(path)
                    .with_context(|| format!("opening point store {}", path.display()))?;
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(MemoryStore::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_builds_transformer() {
        let cfg = RelayConfig::from_args(default_bind_address(), 20.0, None, 8);
        assert_eq!(cfg.transformer().wheel_base(), 20.0);
        assert!(cfg.simulate.is_none());
    }

    #[test]
    fn config_load_reads_yaml_with_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"bind: 127.0.0.1:9100\nwheel_base: 12.5\nsimulate:\n  tilt_max: 4\n")
            .unwrap();
        let path = temp.into_temp_path();
        let cfg = RelayConfig::load(&path).unwrap();

        assert_eq!(cfg.bind, SocketAddr::from(([127, 0, 0, 1], 9100)));
        assert_eq!(cfg.wheel_base, 12.5);
        assert_eq!(cfg.outbox_capacity, DEFAULT_OUTBOX_CAPACITY);
        let sweep = cfg.simulate.unwrap();
        assert_eq!(sweep.tilt_max, 4);
        assert_eq!(sweep.pan_max, 180);
    }

    #[test]
    fn default_store_is_durable() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.store_path, Some(PathBuf::from(DEFAULT_STORE_PATH)));

        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"wheel_base: 12.5\n").unwrap();
        let path = temp.into_temp_path();
        assert!(RelayConfig::load(&path).unwrap().store_path.is_some());
    }

    #[test]
    fn null_store_path_selects_memory() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"store_path: null\n").unwrap();
        let path = temp.into_temp_path();
        let cfg = RelayConfig::load(&path).unwrap();
        assert!(cfg.store_path.is_none());
        assert!(cfg.open_store().unwrap().is_empty());
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = RelayConfig::load("/nonexistent/relay.yaml").unwrap_err();
        assert!(err.to_string().contains("reading relay config"));
    }

    #[test]
    fn store_path_selects_durable_store() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RelayConfig {
            store_path: Some(dir.path().join("points.jsonl")),
            ..Default::default()
        };
        let store = cfg.open_store().unwrap();
        assert!(store.is_empty());
        assert!(dir.path().join("points.jsonl").exists());
    }
}
