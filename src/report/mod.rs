// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Log/Report Pipeline
//!
//! A periodic task sweeps every statistic registry, writes the results to a
//! [`LogSink`] and an optional [`StatisticsPublisher`], then resets delta
//! tracking for the next period.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rsstats::{StatisticsConfig, StatisticsLogger, StatisticsRole};
//!
//! # async fn run() -> rsstats::Result<()> {
//! let config = StatisticsConfig::new().with_identity("deployment-1", "silo-a");
//! config.apply();
//!
//! let reporter = StatisticsLogger::new(config, StatisticsRole::Silo).start()?;
//! // ... run the process ...
//! reporter.stop().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod logger;
mod publisher;
mod sink;

use std::sync::Arc;

pub use config::{StatisticsConfig, StatisticsRole};
pub use logger::{
    ReportSummary, ReporterHandle, StatisticsLogger, StatisticsProvider, STATISTICS_LOG_CATEGORY,
};
pub use publisher::StatisticsPublisher;
pub use sink::{LogFacadeSink, LogSink};

use crate::average::AverageValueStatistic;
use crate::counter::Counter;
use crate::statistic::ReportableStatistic;
use crate::value::{FloatValueStatistic, IntValueStatistic, StringValueStatistic};

/// Every registered statistic that a report pass would emit, unsorted.
///
/// Each registry is copied out on its own; no registry is held while the
/// caller renders or publishes.
pub fn reportable_statistics() -> Vec<Arc<dyn ReportableStatistic>> {
    let mut statistics: Vec<Arc<dyn ReportableStatistic>> = Vec::new();
    statistics.extend(Counter::all().into_iter().map(|s| s as Arc<dyn ReportableStatistic>));
    statistics.extend(FloatValueStatistic::all().into_iter().map(|s| s as Arc<dyn ReportableStatistic>));
    statistics.extend(IntValueStatistic::all().into_iter().map(|s| s as Arc<dyn ReportableStatistic>));
    statistics.extend(StringValueStatistic::all().into_iter().map(|s| s as Arc<dyn ReportableStatistic>));
    statistics.extend(AverageValueStatistic::all().into_iter().map(|s| s as Arc<dyn ReportableStatistic>));
    statistics.retain(|statistic| !statistic.is_hidden() && statistic.storage().is_reported());
    statistics
}
