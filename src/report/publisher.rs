// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::statistic::ReportableStatistic;

/// External sink for the statistics gathered on every report tick, such as a
/// metrics table.
///
/// Errors and panics from either method are logged by the pipeline and never
/// stop the next tick.
pub trait StatisticsPublisher: Send + Sync {
    /// Called once, before the first tick, with the identity of this process.
    fn init(&self, deployment_id: &str, silo_name: &str) -> anyhow::Result<()>;

    /// Receives every `LogAndTable` statistic of the current period. Delta
    /// tracked counters are reset only after the returned future completes.
    fn report_stats<'a>(
        &'a self,
        statistics: &'a [Arc<dyn ReportableStatistic>],
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}
