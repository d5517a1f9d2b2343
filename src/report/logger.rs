// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use log::{debug, error, info, Level};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::config::{StatisticsConfig, StatisticsRole};
use super::publisher::StatisticsPublisher;
use super::sink::{LogFacadeSink, LogSink};
use crate::error::{Error, Result};
use crate::statistic::{guarded, CounterStorage, ReportableStatistic};

/// Log target of the periodic statistics records.
pub const STATISTICS_LOG_CATEGORY: &str = "rsstats::statistics";

const CHUNK_HEADER: &str = "Statistics: ^^^";
const CHUNK_FOOTER: &str = "^^^";

/// Produces synthetic statistics at report time, e.g. ratios computed from
/// raw totals. They are reported like registered ones but never registered.
pub type StatisticsProvider = Arc<dyn Fn() -> Vec<Arc<dyn ReportableStatistic>> + Send + Sync>;

/// What one report pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportSummary {
    /// Statistics written to the log
    pub logged: usize,
    /// Log records emitted
    pub chunks: usize,
    /// Statistics handed to the publisher
    pub published: usize,
    /// Whether the publisher failed or panicked
    pub publish_failed: bool,
}

/// The Log/Report pipeline.
///
/// Each pass gathers every non-hidden, reported statistic from all registries
/// plus the registered [`StatisticsProvider`]s, writes them to the [`LogSink`]
/// in size-bounded records, hands the `LogAndTable` ones to the publisher, and
/// only then resets delta tracking.
pub struct StatisticsLogger {
    config: StatisticsConfig,
    role: StatisticsRole,
    sink: Arc<dyn LogSink>,
    publisher: Option<Arc<dyn StatisticsPublisher>>,
    providers: Mutex<Vec<StatisticsProvider>>,
}

impl StatisticsLogger {
    pub fn new(config: StatisticsConfig, role: StatisticsRole) -> Self {
        Self {
            config,
            role,
            sink: Arc::new(LogFacadeSink),
            publisher: None,
            providers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn StatisticsPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn add_statistics_provider(
        &self,
        provider: impl Fn() -> Vec<Arc<dyn ReportableStatistic>> + Send + Sync + 'static,
    ) {
        self.providers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(provider));
    }

    pub fn config(&self) -> &StatisticsConfig {
        &self.config
    }

    /// Initializes the publisher and starts the periodic report task on the
    /// current tokio runtime.
    ///
    /// The first report runs one interval after start. Dropping the returned
    /// handle also stops the task, after its final flush.
    ///
    /// # Errors
    ///
    /// [`Error::Publisher`] if the publisher's `init` fails.
    pub fn start(self) -> Result<ReporterHandle> {
        if let Some(publisher) = &self.publisher {
            publisher
                .init(&self.config.deployment_id, &self.config.silo_name)
                .map_err(|source| Error::Publisher {
                    details: format!(
                        "init for deployment '{}' silo '{}'",
                        self.config.deployment_id, self.config.silo_name
                    ),
                    source,
                })?;
        }

        let interval = self.config.log_interval(self.role);
        let shutdown_timeout = self.config.shutdown_timeout;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let logger = Arc::new(self);
        let join = tokio::spawn(logger.run(interval, shutdown_rx));

        info!("Statistics reporter started with interval {interval:?}");
        Ok(ReporterHandle {
            shutdown: Some(shutdown_tx),
            join,
            shutdown_timeout,
        })
    }

    async fn run(self: Arc<Self>, interval: Duration, mut shutdown: oneshot::Receiver<()>) {
        let period = interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // A dropped handle closes the channel, which also stops the loop.
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.report_once().await;
                }
            }
        }

        if self.config.flush_on_shutdown {
            debug!("Statistics reporter flushing before shutdown");
            self.report_once().await;
        }
        debug!("Statistics reporter stopped");
    }

    /// Runs one full report pass.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn report_once(&self) -> ReportSummary {
        let statistics = self.gather();
        let mut summary = ReportSummary {
            logged: statistics.len(),
            ..ReportSummary::default()
        };

        let lines: Vec<String> = statistics
            .iter()
            .map(|statistic| {
                guarded(
                    statistic.name(),
                    || format!("{}=<unavailable>", statistic.name()),
                    || statistic.display_string(),
                )
            })
            .collect();
        summary.chunks = self.write_chunks(&lines);

        if let Some(publisher) = &self.publisher {
            let table: Vec<Arc<dyn ReportableStatistic>> = statistics
                .iter()
                .filter(|statistic| statistic.storage() == CounterStorage::LogAndTable)
                .cloned()
                .collect();
            summary.published = table.len();
            summary.publish_failed = !Self::publish(publisher.as_ref(), &table).await;
        }

        for statistic in &statistics {
            statistic.reset_current();
        }
        summary
    }

    fn gather(&self) -> Vec<Arc<dyn ReportableStatistic>> {
        let mut statistics = super::reportable_statistics();

        let providers = self
            .providers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for provider in providers {
            let extra = guarded("statistics provider", Vec::new, || provider());
            statistics.extend(
                extra
                    .into_iter()
                    .filter(|statistic| !statistic.is_hidden() && statistic.storage().is_reported()),
            );
        }

        statistics.sort_by(|a, b| a.name().cmp(b.name()));
        statistics
    }

    /// Writes `lines` in records no longer than the configured maximum, unless
    /// a single line is longer by itself. Returns the number of records.
    fn write_chunks(&self, lines: &[String]) -> usize {
        if lines.is_empty() {
            return 0;
        }
        let max = self.config.max_log_message_size;
        let mut chunks = 0;
        let mut buffer = String::from(CHUNK_HEADER);
        let mut pending = 0;

        for line in lines {
            let needed = 1 + line.len() + 1 + CHUNK_FOOTER.len();
            if pending > 0 && buffer.len() + needed > max {
                self.flush(&mut buffer);
                chunks += 1;
                pending = 0;
            }
            buffer.push('\n');
            buffer.push_str(line);
            pending += 1;
        }
        self.flush(&mut buffer);
        chunks + 1
    }

    fn flush(&self, buffer: &mut String) {
        buffer.push('\n');
        buffer.push_str(CHUNK_FOOTER);
        self.sink.log(Level::Info, STATISTICS_LOG_CATEGORY, buffer);
        buffer.clear();
        buffer.push_str(CHUNK_HEADER);
    }

    async fn publish(
        publisher: &dyn StatisticsPublisher,
        table: &[Arc<dyn ReportableStatistic>],
    ) -> bool {
        match AssertUnwindSafe(publisher.report_stats(table))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                error!("Statistics publisher failed to report {} statistics: {err:#}", table.len());
                false
            }
            Err(_) => {
                error!("Statistics publisher panicked while reporting");
                false
            }
        }
    }
}

/// Handle to a running report task.
pub struct ReporterHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl ReporterHandle {
    /// Stops the report task and waits, bounded by the configured shutdown
    /// timeout, for any in-flight tick and the final flush.
    ///
    /// # Errors
    ///
    /// [`Error::ShutdownTimeout`] if the bound is exceeded, in which case the
    /// task is aborted. [`Error::Shutdown`] if the task panicked.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already be gone; joining below reports why.
            let _ = shutdown.send(());
        }

        match tokio::time::timeout(self.shutdown_timeout, &mut self.join).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(Error::Shutdown {
                details: err.to_string(),
            }),
            Err(_) => {
                self.join.abort();
                Err(Error::ShutdownTimeout {
                    timeout: self.shutdown_timeout,
                })
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
