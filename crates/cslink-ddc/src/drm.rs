use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::i2c::{I2cConfig, I2cDdcTransport};
use crate::machine::EndpointSource;
use crate::state::EndpointId;

const SYSFS_DRM: &str = "/sys/class/drm";

/// Connected monitors found through DRM connectors in sysfs.
///
/// A connector counts when its `status` reads `connected` and it has a `ddc`
/// link to an I2C adapter. Each one yields `/dev/i2c-N`.
#[derive(Debug, Clone)]
pub struct DrmEndpointSource {
    root: PathBuf,
    dev: PathBuf,
    i2c: I2cConfig,
}

impl DrmEndpointSource {
    pub fn new(i2c: I2cConfig) -> Self {
        Self::with_roots(SYSFS_DRM, "/dev", i2c)
    }

    /// Scan `root` instead of `/sys/class/drm` and map adapters under `dev`.
    pub fn with_roots(root: impl Into<PathBuf>, dev: impl Into<PathBuf>, i2c: I2cConfig) -> Self {
        Self {
            root: root.into(),
            dev: dev.into(),
            i2c,
        }
    }

    fn adapter_for(&self, connector: &Path) -> Option<PathBuf> {
        let status = std::fs::read_to_string(connector.join("status")).ok()?;
        if status.trim() != "connected" {
            return None;
        }
        let target = std::fs::read_link(connector.join("ddc")).ok()?;
        let adapter = target.file_name()?;
        Some(self.dev.join(adapter))
    }
}

impl Default for DrmEndpointSource {
    fn default() -> Self {
        Self::new(I2cConfig::default())
    }
}

impl EndpointSource for DrmEndpointSource {
    type Transport = I2cDdcTransport;

    fn enumerate(&self) -> Result<Vec<EndpointId>> {
        let entries = std::fs::read_dir(&self.root).map_err(|err| TransportError::from_io(&err))?;
        let mut endpoints: Vec<EndpointId> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let connector = entry.path();
                let adapter = self.adapter_for(&connector)?;
                debug!(?connector, ?adapter, "connected DRM connector with DDC");
                Some(EndpointId::new(adapter.to_string_lossy()))
            })
            .collect();
        endpoints.sort();
        endpoints.dedup();
        Ok(endpoints)
    }

    fn open(&self, endpoint: &EndpointId) -> Result<I2cDdcTransport> {
        I2cDdcTransport::open(endpoint.as_str(), self.i2c)
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::symlink;

    use super::*;

    fn connector(root: &Path, name: &str, status: &str, adapter: Option<&str>) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("status"), format!("{status}\n")).unwrap();
        if let Some(adapter) = adapter {
            symlink(format!("../../../i2c-dev/{adapter}"), dir.join("ddc")).unwrap();
        }
    }

    #[test]
    fn only_connected_connectors_with_ddc_are_listed() {
        let root = std::env::temp_dir().join(format!("cslink-drm-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        connector(&root, "card0-HDMI-A-1", "connected", Some("i2c-5"));
        connector(&root, "card0-DP-1", "disconnected", Some("i2c-6"));
        connector(&root, "card0-eDP-1", "connected", None);
        connector(&root, "card1-DP-2", "connected", Some("i2c-11"));

        let source = DrmEndpointSource::with_roots(&root, "/dev", I2cConfig::default());
        let endpoints = source.enumerate().unwrap();
        assert_eq!(
            endpoints,
            vec![EndpointId::from("/dev/i2c-11"), EndpointId::from("/dev/i2c-5")]
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_root_is_an_error() {
        let source = DrmEndpointSource::with_roots("/nonexistent/drm", "/dev", I2cConfig::default());
        assert!(source.enumerate().is_err());
    }
}
