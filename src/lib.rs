// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! # rsstats: Low-Overhead Runtime Statistics
//!
//! `rsstats` is a concurrent statistics engine for actor runtimes. Hot-path
//! code increments counters obtained once at startup; a background task
//! periodically snapshots every registered statistic, logs it in size-bounded
//! records, publishes it and resets the per-period deltas.
//!
//! ## Features
//!
//! - **Sharded Counters**: Tracked threads increment a private shard with no
//!   read-modify-write; other threads fall back to one shared atomic.
//! - **Derived Statistics**: Float, int and string values computed by a closure
//!   only when read. A panicking accessor reports a default value.
//! - **Histograms and Averages**: Linear or exponential bucket histograms and
//!   running means, all built from counters.
//! - **Collector Policy**: One verbosity level decides which categories exist
//!   at all, so disabled statistics are never allocated.
//! - **Domain Groups**: Scheduler, queue and messaging instrumentation.
//! - **Report Pipeline**: A tokio task with pluggable [`LogSink`] and
//!   [`StatisticsPublisher`].
//!
//! ## Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Counter`] | Named, sharded `i64` with optional delta since the last report |
//! | [`ValueStatistic`] | Name plus accessor, evaluated at read time |
//! | [`HistogramValueStatistic`] | Bucketed distribution over hidden counters |
//! | [`AverageValueStatistic`] | `sum / count` over a stream of values |
//! | [`StatisticsLevel`] | Process-wide collection verbosity |
//! | [`StatisticsLogger`] | Periodic sweep, log and publish |
//!
//! Every statistic kind has a process-wide registry. Registration is
//! idempotent by name: the first registration wins, and later calls with
//! different options log a warning and return the existing instance.
//!
//! ## Getting Started
//!
//! ```rust
//! use rsstats::{track_current_thread, Counter, HistogramValueStatistic, ReportableStatistic};
//!
//! // A worker thread opts into the sharded increment path once.
//! track_current_thread();
//!
//! let requests = Counter::find_or_create("Docs.Requests");
//! let sizes = HistogramValueStatistic::create_exponential("Docs.RequestSize", 16);
//!
//! requests.increment();
//! sizes.add_data(300);
//!
//! assert_eq!(requests.get_current_value(), 1);
//! assert_eq!(requests.display_string(), "Docs.Requests=1, Delta=0");
//! assert_eq!(sizes.display_value(), "[256:512]=1");
//! ```
//!
//! ## Optional Features
//!
//! - **`tracing`**: Wraps every report pass in a `tracing` span.
//! - **`arrival-rate`**: Adds a requests-per-second statistic to every
//!   [`QueueTrackingStatistic`].

mod average;
mod collector;
mod context;
mod counter;
mod error;
mod histogram;
mod interval;
mod messaging;
mod name;
pub mod names;
mod queue;
mod registry;
pub mod report;
mod scheduler;
mod statistic;
mod value;

pub use average::{AverageMode, AverageOptions, AverageValueStatistic};
pub use collector::{collection_level, set_collection_level, StatisticsLevel};
pub use context::{ContextType, SchedulingContext, SchedulingContextInfo};
pub use counter::{
    is_current_thread_tracked, track_current_thread, Counter, CounterOptions, CounterValueConverter,
};
pub use error::{Error, Result};
pub use histogram::{BucketStrategy, HistogramUnit, HistogramValueStatistic};
pub use interval::{IntervalAccuracy, TimeInterval};
pub use messaging::{ExpirationPhase, MessageDirection, MessagingStatisticsGroup};
pub use name::{StatisticName, StatisticNameFormat};
pub use queue::QueueTrackingStatistic;
pub use report::{
    LogFacadeSink, LogSink, ReportSummary, ReporterHandle, StatisticsConfig, StatisticsLogger,
    StatisticsPublisher, StatisticsRole,
};
pub use scheduler::{SchedulerStatisticsGroup, WorkItemGroupHandle, WorkerThreadHandle};
pub use statistic::{CounterStorage, ReportableStatistic};
pub use value::{
    FloatValueStatistic, IntValueStatistic, StringValueStatistic, ValueKind, ValueStatistic,
    ValueStatisticBuilder,
};

/// Removes every statistic from every registry.
///
/// Instances already handed out keep working but are no longer reported.
/// Intended for test isolation and process teardown.
pub fn clear_all_registries() {
    Counter::clear_registry();
    FloatValueStatistic::clear_registry();
    IntValueStatistic::clear_registry();
    StringValueStatistic::clear_registry();
    AverageValueStatistic::clear_registry();
    log::debug!("Cleared all statistic registries");
}
