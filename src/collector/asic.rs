//! ASIC resource counters exported by switchd.
//!
//! switchd publishes table occupancy through a fuse filesystem that crashes
//! the daemon when read too eagerly, so every read goes through one shared
//! [`ResourceGuard`].

pub mod schema;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::collector::{Emitter, Source, SourceError};
use crate::guard::{DEFAULT_SETTLE_DELAY, ReadError, ResourceGuard};
use crate::metric::{MetricDescriptor, Sample};

pub use schema::{Mode, PollTask, ReadingType, build_tasks};

/// Default switchd fuse mount.
pub const DEFAULT_ROOT: &str = "/cumulus/switchd/run";

/// Source name used in logs and error reports.
pub const NAME: &str = "AsicCollector";

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

fn default_settle_delay() -> Duration {
    DEFAULT_SETTLE_DELAY
}

/// Configuration for the switchd counter source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsicConfig {
    /// Enable this collector (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// switchd run directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Pause before every read (default: 10ms).
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,
}

impl Default for AsicConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root: default_root(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl AsicConfig {
    /// Set the switchd run directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the settle delay.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Set enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Source polling switchd's hardware resource counters.
pub struct AsicSource {
    guard: Arc<ResourceGuard>,
}

impl AsicSource {
    /// Create a source with its own guard over `config.root`.
    pub fn new(config: &AsicConfig) -> Self {
        let guard = ResourceGuard::new(&config.root).with_settle_delay(config.settle_delay);
        Self::with_guard(Arc::new(guard))
    }

    /// Create a source reading through an existing guard.
    pub fn with_guard(guard: Arc<ResourceGuard>) -> Self {
        Self { guard }
    }

    /// Read a table mode, falling back to [`Mode::Generic`] on failure.
    async fn read_mode(&self, which: &'static str, path: &str, emitter: &Emitter) -> Mode {
        match self.guard.read(path).await {
            Ok(value) => match Mode::from_value(value) {
                Some(mode) => mode,
                None => {
                    let context = format!("{which} table mode");
                    emitter
                        .report(SourceError::decode(context, format!("{value} is not a mode")))
                        .await;
                    Mode::Generic
                }
            },
            Err(source) => {
                emitter.report(SourceError::Mode { which, source }).await;
                Mode::Generic
            }
        }
    }

    /// Read every quantity of `task`, then emit them together.
    async fn run_task(&self, task: &PollTask, emitter: &Emitter) -> Result<(), ReadError> {
        let mut values = Vec::with_capacity(task.readings().len());
        for reading in task.readings() {
            values.push(self.guard.read(&reading.path).await?);
        }

        for (reading, value) in task.readings().iter().zip(values) {
            let sample = Sample::new(task.descriptor(), value, [reading.reading_type.to_string()]);
            emitter.emit(sample).await;
        }
        Ok(())
    }
}

impl std::fmt::Debug for AsicSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsicSource")
            .field("guard", &self.guard)
            .finish()
    }
}

#[async_trait::async_trait]
impl Source for AsicSource {
    fn name(&self) -> &str {
        NAME
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        schema::metrics().all()
    }

    async fn poll(&self, emitter: &Emitter) {
        let start = Instant::now();
        let host_mode = self.read_mode("host", schema::HOST_MODE_PATH, emitter).await;
        let route_mode = self.read_mode("route", schema::ROUTE_MODE_PATH, emitter).await;

        let tasks = build_tasks(host_mode, route_mode);
        tracing::debug!(
            host_mode = %host_mode,
            route_mode = %route_mode,
            tasks = tasks.len(),
            "Resolved switchd schema"
        );

        let mut failed = 0usize;
        for task in &tasks {
            if let Err(e) = self.run_task(task, emitter).await {
                failed += 1;
                emitter.report(e).await;
            }
        }

        tracing::debug!(
            tasks = tasks.len(),
            failed,
            elapsed_ms = start.elapsed().as_millis(),
            "switchd poll finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::PollEvent;
    use std::path::Path;
    use tokio::sync::mpsc;

    fn write(root: &Path, relative: &str, value: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, value).unwrap();
    }

    /// Populate every counter of the schema for the given modes.
    fn populate(root: &Path, host: &str, route: &str) {
        write(root, schema::HOST_MODE_PATH, host);
        write(root, schema::ROUTE_MODE_PATH, route);
        for task in build_tasks(Mode::Generic, Mode::Generic) {
            for (i, reading) in task.readings().iter().enumerate() {
                write(root, &reading.path, &format!("{}\n", 10 * (i + 1)));
            }
        }
    }

    fn source(root: &Path) -> AsicSource {
        let config = AsicConfig::default()
            .with_root(root)
            .with_settle_delay(Duration::ZERO);
        AsicSource::new(&config)
    }

    async fn collect(source: &AsicSource) -> (Vec<Sample>, Vec<SourceError>) {
        let (tx, mut rx) = mpsc::channel(4096);
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

    fn values_of<'a>(samples: &'a [Sample], name: &str) -> Vec<(&'a str, f64)> {
        samples
            .iter()
            .filter(|s| s.descriptor().name() == name)
            .map(|s| (s.label_values()[0].as_str(), s.value()))
            .collect()
    }

    #[tokio::test]
    async fn test_poll_generic_modes() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), "0\n", "0\n");

        let (samples, errors) = collect(&source(dir.path())).await;
        assert!(errors.is_empty(), "{errors:?}");

        assert_eq!(
            values_of(&samples, "cumulus_switchd_host_0_entry"),
            vec![("current", 10.0), ("max", 20.0)]
        );
        assert_eq!(
            values_of(&samples, "cumulus_switchd_in_acl_v6_filter"),
            vec![("current", 10.0), ("max", 20.0), ("allocated", 30.0)]
        );
        assert_eq!(
            values_of(&samples, "cumulus_switchd_neighbor_v4_entry"),
            vec![("current", 10.0)]
        );
    }

    #[tokio::test]
    async fn test_poll_combined_host_mode_suppresses_slot_1() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), "1\n", "1\n");

        let (samples, errors) = collect(&source(dir.path())).await;
        assert!(errors.is_empty(), "{errors:?}");

        assert_eq!(values_of(&samples, "cumulus_switchd_host_v46_entry").len(), 2);
        assert!(values_of(&samples, "cumulus_switchd_host_1_entry").is_empty());
        assert!(values_of(&samples, "cumulus_switchd_host_v6_entry").is_empty());
        assert_eq!(values_of(&samples, "cumulus_switchd_route_v46_entry").len(), 2);
        assert_eq!(values_of(&samples, "cumulus_switchd_long_route_v6_entry").len(), 2);
    }

    #[tokio::test]
    async fn test_missing_mode_falls_back_to_generic() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), "2\n", "2\n");
        std::fs::remove_file(dir.path().join(schema::ROUTE_MODE_PATH)).unwrap();

        let (samples, errors) = collect(&source(dir.path())).await;

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SourceError::Mode { which: "route", .. }));
        assert_eq!(values_of(&samples, "cumulus_switchd_host_v4_entry").len(), 2);
        assert_eq!(values_of(&samples, "cumulus_switchd_route_0_entry").len(), 2);
        assert_eq!(values_of(&samples, "cumulus_switchd_route_1_entry").len(), 2);
    }

    #[tokio::test]
    async fn test_fractional_mode_falls_back_to_generic() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), "1.9\n", "2\n");

        let (samples, errors) = collect(&source(dir.path())).await;

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            SourceError::Decode { context, .. } if context == "host table mode"
        ));
        assert!(errors[0].to_string().contains("1.9 is not a mode"));
        assert_eq!(values_of(&samples, "cumulus_switchd_host_0_entry").len(), 2);
        assert_eq!(values_of(&samples, "cumulus_switchd_host_1_entry").len(), 2);
        assert!(values_of(&samples, "cumulus_switchd_host_v46_entry").is_empty());
        assert_eq!(values_of(&samples, "cumulus_switchd_route_v4_entry").len(), 2);
    }

    #[tokio::test]
    async fn test_failed_task_does_not_stop_later_tasks() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), "0\n", "0\n");
        // Second quantity of an early task is unreadable.
        std::fs::remove_file(dir.path().join("route_info/ecmp_nh/max")).unwrap();

        let (samples, errors) = collect(&source(dir.path())).await;

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("route_info/ecmp_nh/max"));
        assert!(values_of(&samples, "cumulus_switchd_ecmp_nh_entry").is_empty());
        assert_eq!(values_of(&samples, "cumulus_switchd_mac_entry").len(), 2);
        assert_eq!(
            values_of(&samples, "cumulus_switchd_acl_l4_port_range_checkers").len(),
            2
        );
    }

    #[tokio::test]
    async fn test_unparsable_counter_reported() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path(), "0\n", "0\n");
        write(dir.path(), "route_info/mac/count", "busy\n");

        let (samples, errors) = collect(&source(dir.path())).await;

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            SourceError::Resource(ReadError::Parse { .. })
        ));
        assert!(values_of(&samples, "cumulus_switchd_mac_entry").is_empty());
    }

    #[test]
    fn test_descriptors_cover_every_mode_variant() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = source(dir.path())
            .descriptors()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        for variant in [
            "cumulus_switchd_host_0_entry",
            "cumulus_switchd_host_v46_entry",
            "cumulus_switchd_route_v6_entry",
            "cumulus_switchd_long_route_v6_entry",
            "cumulus_switchd_in_acl_8021x_filter",
        ] {
            assert!(names.iter().any(|n| n == variant), "missing {variant}");
        }
    }

    #[test]
    fn test_config_defaults_from_yaml() {
        let config: AsicConfig = serde_yaml::from_str("enabled: true").unwrap();
        assert!(config.enabled);
        assert_eq!(config.root, PathBuf::from(DEFAULT_ROOT));
        assert_eq!(config.settle_delay, Duration::from_millis(10));

        let config: AsicConfig =
            serde_yaml::from_str("root: /tmp/switchd\nsettle_delay: 25ms").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.settle_delay, Duration::from_millis(25));
    }
}
