//! Collector Layer
//!
//! Sources that read switch state, and the orchestrator that polls them
//! concurrently on every scrape.
//!
//! # Architecture
//!
//! - [`Source`]: Core trait for implementing a pollable data source
//! - [`Emitter`]: Per-source handle onto the merged [`PollEvent`] channel
//! - [`Orchestrator`]: Runs every source once per scrape with fault isolation
//!
//! # Example
//!
//! ```rust,no_run
//! use cumulus_exporter::{AsicConfig, AsicSource, Orchestrator};
//!
//! # async fn run() {
//! let orchestrator = Orchestrator::new().with_source(AsicSource::new(&AsicConfig::default()));
//! let result = orchestrator.poll_all().await;
//! println!("{} samples, {} errors", result.samples.len(), result.errors.len());
//! # }
//! ```

pub mod asic;
pub mod hwmon;
pub mod mstpd;
mod registry;
pub mod smonctl;
mod traits;

use crate::config::AppConfig;

pub use registry::{DEFAULT_POLL_TIMEOUT, Orchestrator, PollResult, ReportedError};
pub use traits::{Emitter, PollEvent, Source, SourceError};

/// Build an orchestrator holding every source enabled in `config`.
///
/// A hwmon sensor list that cannot be loaded disables only the hwmon
/// source.
pub fn from_config(config: &AppConfig) -> Orchestrator {
    let collectors = &config.collectors;
    tracing::info!(requested = ?collectors.enabled(), "Building collectors");
    let mut orchestrator = Orchestrator::new().with_poll_timeout(config.poll_timeout);

    if collectors.asic.enabled {
        orchestrator.register(asic::AsicSource::new(&collectors.asic));
    }

    if collectors.hwmon.enabled {
        match config.hwmon_sensors() {
            Ok(sensors) => orchestrator.register(hwmon::HwmonSource::new(sensors)),
            Err(e) => {
                tracing::error!(error = %e, "Could not load hwmon sensor list, disabling hwmon collector");
            }
        }
    }

    if collectors.smonctl.enabled {
        orchestrator.register(smonctl::SmonctlSource::new(collectors.smonctl.clone()));
    }

    if collectors.mstpd.enabled {
        orchestrator.register(mstpd::MstpdSource::new(collectors.mstpd.clone()));
    }

    orchestrator
}
