// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use crate::collector::{set_collection_level, StatisticsLevel};

/// Which kind of process is reporting. Selects the log interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatisticsRole {
    #[default]
    Silo,
    Client,
}

/// Statistics configuration, read once at initialization.
#[derive(Debug, Clone)]
pub struct StatisticsConfig {
    /// Verbosity published to the collector policy by [`apply`](Self::apply)
    pub collection_level: StatisticsLevel,
    /// Report interval for silos
    pub silo_log_interval: Duration,
    /// Report interval for clients
    pub client_log_interval: Duration,
    /// Upper bound on a single emitted log record, in bytes
    pub max_log_message_size: usize,
    pub deployment_id: String,
    pub silo_name: String,
    /// Run one last report when the reporter is stopped
    pub flush_on_shutdown: bool,
    /// Bound on the final flush
    pub shutdown_timeout: Duration,
    /// Turns running longer than this count as long-running. Read by
    /// [`SchedulerStatisticsGroup::init_from_config`](crate::SchedulerStatisticsGroup::init_from_config).
    pub long_turn_threshold: Duration,
    /// Queue waits longer than this count as long
    /// (see [`SchedulerStatisticsGroup::init_from_config`](crate::SchedulerStatisticsGroup::init_from_config))
    pub long_queue_wait_threshold: Duration,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            collection_level: StatisticsLevel::Info,
            silo_log_interval: Duration::from_secs(5 * 60),
            client_log_interval: Duration::from_secs(5 * 60),
            max_log_message_size: 20_000,
            deployment_id: String::new(),
            silo_name: String::new(),
            flush_on_shutdown: true,
            shutdown_timeout: Duration::from_secs(5),
            long_turn_threshold: Duration::from_millis(200),
            long_queue_wait_threshold: Duration::from_millis(100),
        }
    }
}

impl StatisticsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection_level(mut self, level: StatisticsLevel) -> Self {
        self.collection_level = level;
        self
    }

    pub fn with_silo_log_interval(mut self, interval: Duration) -> Self {
        self.silo_log_interval = interval;
        self
    }

    pub fn with_client_log_interval(mut self, interval: Duration) -> Self {
        self.client_log_interval = interval;
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_max_log_message_size(mut self, size: usize) -> Self {
        self.max_log_message_size = size.max(1);
        self
    }

    pub fn with_identity(mut self, deployment_id: impl Into<String>, silo_name: impl Into<String>) -> Self {
        self.deployment_id = deployment_id.into();
        self.silo_name = silo_name.into();
        self
    }

    pub fn with_flush_on_shutdown(mut self, flush: bool) -> Self {
        self.flush_on_shutdown = flush;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_long_turn_threshold(mut self, threshold: Duration) -> Self {
        self.long_turn_threshold = threshold;
        self
    }

    pub fn with_long_queue_wait_threshold(mut self, threshold: Duration) -> Self {
        self.long_queue_wait_threshold = threshold;
        self
    }

    pub fn log_interval(&self, role: StatisticsRole) -> Duration {
        match role {
            StatisticsRole::Silo => self.silo_log_interval,
            StatisticsRole::Client => self.client_log_interval,
        }
    }

    /// Publishes the collection level to the process-wide collector policy.
    pub fn apply(&self) {
        set_collection_level(self.collection_level);
        log::info!("Statistics collection level set to {}", self.collection_level);
    }
}
