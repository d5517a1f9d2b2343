// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Statistics Collector Policy
//!
//! One process-wide verbosity level decides which optional statistic
//! categories are created at all. Every gate is a single integer compare, so a
//! disabled category costs nothing and never allocates its counters.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::Error;

/// Statistics collection verbosity, ordered `Off < Info < Verbose < Verbose2 < Verbose3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum StatisticsLevel {
    Off = 0,
    #[default]
    Info = 1,
    Verbose = 2,
    Verbose2 = 3,
    Verbose3 = 4,
}

static COLLECTION_LEVEL: AtomicU8 = AtomicU8::new(StatisticsLevel::Info as u8);

/// Sets the process-wide collection level.
///
/// Intended to be called once during configuration, before statistic groups
/// are initialized. Categories already created stay allocated.
pub fn set_collection_level(level: StatisticsLevel) {
    COLLECTION_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns the process-wide collection level.
pub fn collection_level() -> StatisticsLevel {
    StatisticsLevel::from_u8(COLLECTION_LEVEL.load(Ordering::Relaxed))
}

impl StatisticsLevel {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => StatisticsLevel::Off,
            1 => StatisticsLevel::Info,
            2 => StatisticsLevel::Verbose,
            3 => StatisticsLevel::Verbose2,
            _ => StatisticsLevel::Verbose3,
        }
    }

    #[inline]
    const fn at_least(self, min: StatisticsLevel) -> bool {
        self as u8 >= min as u8
    }

    pub const fn is_enabled(self) -> bool {
        self.at_least(StatisticsLevel::Info)
    }

    /// Messaging totals, sizes and per-target counters.
    pub const fn collect_messaging_stats(self) -> bool {
        self.at_least(StatisticsLevel::Info)
    }

    /// Pending/enqueued/dequeued/dropped scheduler totals.
    pub const fn collect_global_scheduler_stats(self) -> bool {
        self.at_least(StatisticsLevel::Info)
    }

    pub const fn collect_thread_time_tracking_stats(self) -> bool {
        self.at_least(StatisticsLevel::Verbose)
    }

    pub const fn collect_context_switches_stats(self) -> bool {
        self.at_least(StatisticsLevel::Verbose)
    }

    pub const fn collect_serialization_stats(self) -> bool {
        self.at_least(StatisticsLevel::Verbose)
    }

    /// Per-thread and per-class turn counts and the turn length histogram.
    pub const fn collect_turns_stats(self) -> bool {
        self.at_least(StatisticsLevel::Verbose2)
    }

    /// Queue tracking statistics for internal message and work queues.
    pub const fn collect_queue_stats(self) -> bool {
        self.at_least(StatisticsLevel::Verbose2)
    }

    /// Per-work-item-group turn counters and status statistics.
    pub const fn collect_per_work_item_stats(self) -> bool {
        self.at_least(StatisticsLevel::Verbose2)
    }

    /// Whether one work-item-group's statistics are written to the log.
    ///
    /// System contexts are reported one level earlier than application ones.
    pub const fn report_per_work_item_stats(self, is_system_priority: bool) -> bool {
        if is_system_priority {
            self.at_least(StatisticsLevel::Verbose2)
        } else {
            self.at_least(StatisticsLevel::Verbose3)
        }
    }
}

impl fmt::Display for StatisticsLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatisticsLevel::Off => "Off",
            StatisticsLevel::Info => "Info",
            StatisticsLevel::Verbose => "Verbose",
            StatisticsLevel::Verbose2 => "Verbose2",
            StatisticsLevel::Verbose3 => "Verbose3",
        };
        f.write_str(name)
    }
}

impl FromStr for StatisticsLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(StatisticsLevel::Off),
            "info" => Ok(StatisticsLevel::Info),
            "verbose" => Ok(StatisticsLevel::Verbose),
            "verbose2" => Ok(StatisticsLevel::Verbose2),
            "verbose3" => Ok(StatisticsLevel::Verbose3),
            other => Err(Error::InvalidArgument {
                operation: "StatisticsLevel::from_str",
                details: format!("unknown statistics level '{other}'"),
            }),
        }
    }
}
