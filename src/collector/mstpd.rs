//! Spanning-tree port state reported by `mstpctl`.
//!
//! Bridges are discovered from sysfs on every poll, then `mstpctl
//! showportdetail <bridge> json` runs once per bridge.

mod port;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::collector::{Emitter, Source, SourceError};
use crate::metric::MetricDescriptor;
use crate::util::run_tool;

pub use port::{MstpdMetrics, PortDetails, ShowPortDetail, metrics, parse_show_port_detail};

/// Source name used in logs and error reports.
pub const NAME: &str = "MstpdCollector";

/// Default mstpctl binary.
pub const DEFAULT_MSTPCTL_PATH: &str = "/sbin/mstpctl";

/// Default network interface directory.
pub const DEFAULT_NET_ROOT: &str = "/sys/class/net";

fn default_mstpctl_path() -> PathBuf {
    PathBuf::from(DEFAULT_MSTPCTL_PATH)
}

fn default_net_root() -> PathBuf {
    PathBuf::from(DEFAULT_NET_ROOT)
}

/// Configuration for the mstpd source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MstpdConfig {
    /// Enable this collector (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// mstpctl binary.
    #[serde(default = "default_mstpctl_path")]
    pub mstpctl_path: PathBuf,
    /// Directory listing network interfaces.
    #[serde(default = "default_net_root")]
    pub net_root: PathBuf,
}

impl Default for MstpdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mstpctl_path: default_mstpctl_path(),
            net_root: default_net_root(),
        }
    }
}

impl MstpdConfig {
    /// Set the mstpctl binary.
    pub fn with_mstpctl_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mstpctl_path = path.into();
        self
    }

    /// Set the interface directory.
    pub fn with_net_root(mut self, net_root: impl Into<PathBuf>) -> Self {
        self.net_root = net_root.into();
        self
    }

    /// Set enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Names of the bridge interfaces below `net_root`, sorted.
///
/// An interface is a bridge if it has a `bridge` attribute directory.
pub async fn list_bridges(net_root: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(net_root).await?;
    let mut bridges = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let is_bridge = tokio::fs::metadata(entry.path().join("bridge"))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_bridge {
            bridges.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    bridges.sort();
    Ok(bridges)
}

/// Source polling spanning-tree port details for every bridge.
#[derive(Debug)]
pub struct MstpdSource {
    config: MstpdConfig,
}

impl MstpdSource {
    pub fn new(config: MstpdConfig) -> Self {
        Self { config }
    }

    async fn show_port_detail(&self, bridge: &str) -> Result<ShowPortDetail, SourceError> {
        let output = run_tool(
            &self.config.mstpctl_path,
            ["showportdetail", bridge, "json"],
        )
        .await?;
        parse_show_port_detail(&output)
            .map_err(|e| SourceError::decode(format!("mstpctl output for bridge {bridge}"), e))
    }
}

#[async_trait::async_trait]
impl Source for MstpdSource {
    fn name(&self) -> &str {
        NAME
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        metrics().all()
    }

    async fn poll(&self, emitter: &Emitter) {
        let start = Instant::now();

        let bridges = match list_bridges(&self.config.net_root).await {
            Ok(bridges) => bridges,
            Err(source) => {
                emitter
                    .report(SourceError::Enumerate {
                        what: format!("bridges in {}", self.config.net_root.display()),
                        source,
                    })
                    .await;
                return;
            }
        };

        let mut ports = 0usize;
        for bridge in &bridges {
            let detail = match self.show_port_detail(bridge).await {
                Ok(detail) => detail,
                Err(e) => {
                    tracing::warn!(bridge = %bridge, "Show port detail failed");
                    emitter.report(e).await;
                    continue;
                }
            };

            for port in detail.values().flat_map(|ports| ports.values()) {
                ports += 1;
                for sample in port.samples() {
                    emitter.emit(sample).await;
                }
            }
        }

        tracing::debug!(
            bridges = bridges.len(),
            ports,
            elapsed_ms = start.elapsed().as_millis(),
            "mstpd poll finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::PollEvent;
    use crate::metric::Sample;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use tokio::sync::mpsc;

    const BR0_JSON: &str = r#"{"br0": {"swp1": {"bridgeName": "br0", "portName": "swp1", "enabled": true, "role": "Root", "state": "forwarding", "numRxBpdu": 42}}}"#;
    const BR2_JSON: &str = r#"{"br2": {"swp7": {"bridgeName": "br2", "portName": "swp7", "enabled": false, "role": "Disabled", "state": "discarding"}}}"#;

    fn net_root(dir: &Path, bridges: &[&str], ports: &[&str]) -> PathBuf {
        let root = dir.join("net");
        for bridge in bridges {
            std::fs::create_dir_all(root.join(bridge).join("bridge")).unwrap();
        }
        for port in ports {
            std::fs::create_dir_all(root.join(port).join("brport")).unwrap();
        }
        root
    }

    fn fake_mstpctl(dir: &Path) -> PathBuf {
        let script = format!(
            r#"#!/bin/sh
[ "$1" = "showportdetail" ] && [ "$3" = "json" ] || exit 64
case "$2" in
  br0) echo '{BR0_JSON}' ;;
  br1) echo "br1: mstp not running" >&2; exit 1 ;;
  br2) echo '{BR2_JSON}' ;;
esac
"#
        );
        let path = dir.join("mstpctl");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(script.as_bytes()).unwrap();
        file.sync_all().unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn collect(source: &MstpdSource) -> (Vec<Sample>, Vec<SourceError>) {
        let (tx, mut rx) = mpsc::channel(256);
        let emitter = Emitter::new(NAME, tx);
        source.poll(&emitter).await;
        drop(emitter);

        let mut samples = Vec::new();
        let mut errors = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                PollEvent::Sample(s) => samples.push(s),
                PollEvent::Error { error, .. } => errors.push(error),
                PollEvent::Done { .. } => {}
            }
        }
        (samples, errors)
    }

    #[tokio::test]
    async fn test_list_bridges() {
        let dir = tempfile::tempdir().unwrap();
        let root = net_root(dir.path(), &["br1", "br0"], &["swp1", "eth0"]);
        std::fs::write(root.join("bonding_masters"), "").unwrap();

        assert_eq!(list_bridges(&root).await.unwrap(), vec!["br0", "br1"]);
    }

    #[tokio::test]
    async fn test_failing_bridge_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        let config = MstpdConfig::default()
            .with_mstpctl_path(fake_mstpctl(dir.path()))
            .with_net_root(net_root(dir.path(), &["br0", "br1", "br2"], &["swp1"]));

        let (samples, errors) = collect(&MstpdSource::new(config)).await;

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SourceError::Tool(_)));
        assert!(errors[0].to_string().contains("mstp not running"));

        let per_port = metrics().all().len();
        assert_eq!(samples.len(), 2 * per_port);

        let rx_bpdu = samples
            .iter()
            .find(|s| s.descriptor().name() == "mstpd_num_rx_bpdu_total")
            .unwrap();
        assert_eq!(rx_bpdu.value(), 42.0);
        assert_eq!(rx_bpdu.label("interface"), Some("swp1"));

        let disabled = samples
            .iter()
            .find(|s| s.descriptor().name() == "mstpd_enabled_bool" && s.label("bridge_name") == Some("br2"))
            .unwrap();
        assert_eq!(disabled.value(), 0.0);
    }

    #[tokio::test]
    async fn test_missing_net_root_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = MstpdConfig::default().with_net_root(dir.path().join("absent"));

        let (samples, errors) = collect(&MstpdSource::new(config)).await;

        assert!(samples.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SourceError::Enumerate { .. }));
    }

    #[tokio::test]
    async fn test_no_bridges_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let config = MstpdConfig::default()
            .with_mstpctl_path(dir.path().join("never-run"))
            .with_net_root(net_root(dir.path(), &[], &["swp1"]));

        let (samples, errors) = collect(&MstpdSource::new(config)).await;
        assert!(samples.is_empty());
        assert!(errors.is_empty());
    }
}
