//! Vigil Metrics - Latency aggregation and idempotent metric registration.
//!
//! Probe latencies are aggregated into sliding-window histograms at three
//! granularities (role-wide, per topic, per partition) and an availability
//! ratio. Instruments live in one process-wide [`MetricRegistry`]; every key
//! is registered at most once no matter how many rounds or roles ask for it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────────┐    ┌──────────────────┐
//! │ LatencyAggregator│───▶│ MetricRegistrar  │───▶│  MetricRegistry  │
//! │ (per round)      │    │ (per role, flags)│    │ (process-wide)   │
//! └──────────────────┘    └──────────────────┘    └────────┬─────────┘
//!                                                          │
//!                                             ┌────────────▼─────────┐
//!                                             │ MetricsSession       │
//!                                             │ start/report/stop    │
//!                                             └──────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod aggregator;
mod histogram;
mod key;
mod registrar;
mod registry;
mod reporter;
mod session;

pub use aggregator::{availability_ratio, AggregateSummary, LatencyAggregator};
pub use histogram::{HistogramSnapshot, SlidingWindowHistogram};
pub use key::{MetricKey, MetricKind};
pub use registrar::{MetricRegistrar, ReportFlags};
pub use registry::{Gauge, Instrument, InstrumentSnapshot, MetricRegistry, RegistryError};
pub use reporter::{LogReporter, MetricsReporter, ReporterError};
pub use session::{with_session, MetricsSession};
