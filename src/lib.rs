//! cumulus-exporter - Prometheus exporter for Cumulus Linux switches
//!
//! This crate provides the sources and the poll orchestration behind the
//! `cumulus-exporter` binary. It can also be used as a library to embed the
//! sources in another exporter.
//!
//! # Architecture
//!
//! - **Guard**: Serialized, paced reads from the fragile switchd fuse tree
//! - **Collectors**: ASIC counters, hwmon sensors (sysfs or smonctl), mstpd port state
//! - **Orchestrator**: Concurrent polling with per-source fault isolation and deadline
//! - **Exposition**: Prometheus text format served by an axum router
//!
//! # Example
//!
//! ```rust,no_run
//! use cumulus_exporter::{AppState, Orchestrator, create_router};
//! use cumulus_exporter::collector::mstpd::{MstpdConfig, MstpdSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new().with_source(MstpdSource::new(MstpdConfig::default()));
//!     let listener = tokio::net::TcpListener::bind("[::]:9457").await?;
//!     axum::serve(listener, create_router(AppState::new(orchestrator))).await?;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod exposition;
pub mod guard;
pub mod metric;
pub mod server;
pub mod util;

pub use collector::asic::{AsicConfig, AsicSource};
pub use collector::hwmon::{HwmonConfig, HwmonSource, SensorConfig, SensorType};
pub use collector::mstpd::{MstpdConfig, MstpdSource};
pub use collector::smonctl::{SmonctlConfig, SmonctlSource};
pub use collector::{
    Emitter, Orchestrator, PollEvent, PollResult, ReportedError, Source, SourceError,
};
pub use config::{AppConfig, ConfigError};
pub use guard::{ReadError, ResourceGuard};
pub use metric::{MetricDescriptor, Sample};
pub use server::{AppState, create_router};
