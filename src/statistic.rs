// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::panic::{catch_unwind, AssertUnwindSafe};

/// Where a statistic's value ends up when the report pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CounterStorage {
    /// Never emitted by the report pipeline. Still readable on demand.
    DontStore,
    /// Written to the periodic statistics log only.
    LogOnly,
    /// Written to the log and handed to the configured publisher.
    #[default]
    LogAndTable,
}

impl CounterStorage {
    pub const fn is_reported(self) -> bool {
        !matches!(self, CounterStorage::DontStore)
    }
}

/// A statistic the report pipeline can enumerate, render and publish.
///
/// Every statistic kind in this crate implements this trait, which is the
/// surface handed to a [`StatisticsPublisher`](crate::StatisticsPublisher).
pub trait ReportableStatistic: Send + Sync {
    fn name(&self) -> &str;

    fn storage(&self) -> CounterStorage;

    /// Hidden statistics are summable but never enumerated for reporting.
    fn is_hidden(&self) -> bool {
        false
    }

    /// Whether a delta since the previous report accompanies the value.
    fn is_value_delta(&self) -> bool {
        false
    }

    fn value_string(&self) -> String;

    fn delta_string(&self) -> String {
        String::new()
    }

    /// The line written to the statistics log.
    fn display_string(&self) -> String {
        if self.is_value_delta() {
            format!(
                "{}={}, Delta={}",
                self.name(),
                self.value_string(),
                self.delta_string()
            )
        } else {
            format!("{}={}", self.name(), self.value_string())
        }
    }

    /// Marks the current value as published. Called once per report period,
    /// after both log emission and publishing completed.
    fn reset_current(&self) {}
}

/// Runs user-supplied read-side code, substituting `fallback` if it panics.
///
/// Accessors and converters run on the reporting path; a broken one must
/// degrade to a default value instead of taking the reporter down.
pub(crate) fn guarded<T>(name: &str, fallback: impl FnOnce() -> T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            log::debug!("Statistic {name}: accessor panicked, using default value");
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        delta: bool,
    }

    impl ReportableStatistic for Fixed {
        fn name(&self) -> &str {
            "Test.Fixed"
        }
        fn storage(&self) -> CounterStorage {
            CounterStorage::LogOnly
        }
        fn is_value_delta(&self) -> bool {
            self.delta
        }
        fn value_string(&self) -> String {
            "7".to_string()
        }
        fn delta_string(&self) -> String {
            "2".to_string()
        }
    }

    #[test]
    fn test_display_string_without_delta() {
        assert_eq!(Fixed { delta: false }.display_string(), "Test.Fixed=7");
    }

    #[test]
    fn test_display_string_with_delta() {
        assert_eq!(
            Fixed { delta: true }.display_string(),
            "Test.Fixed=7, Delta=2"
        );
    }

    #[test]
    fn test_guarded_substitutes_fallback_on_panic() {
        let value = guarded("Test.Panics", || -1, || -> i64 { panic!("boom") });
        assert_eq!(value, -1);
        assert_eq!(guarded("Test.Ok", || -1, || 5), 5);
    }

    #[test]
    fn test_storage_reported() {
        assert!(!CounterStorage::DontStore.is_reported());
        assert!(CounterStorage::LogOnly.is_reported());
        assert!(CounterStorage::LogAndTable.is_reported());
    }
}
