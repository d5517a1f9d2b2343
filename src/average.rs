// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

use log::warn;

use crate::counter::{Counter, CounterOptions};
use crate::registry::Registry;
use crate::statistic::{guarded, CounterStorage, ReportableStatistic};
use crate::StatisticName;

/// Selects the accumulator backing an [`AverageValueStatistic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AverageMode {
    /// Two hidden Counter Core counters; safe from any thread.
    #[default]
    MultiThreaded,
    /// Two plain load/store integers. Values are only exact when the caller
    /// guarantees a single writer, e.g. a queue owned by one I/O thread.
    SingleThreaded,
}

type AverageConverter = Arc<dyn Fn(f32) -> f32 + Send + Sync>;

#[derive(Clone, Default)]
pub struct AverageOptions {
    pub storage: CounterStorage,
    pub mode: AverageMode,
    /// Display-time unit conversion, e.g. microseconds to milliseconds.
    pub converter: Option<AverageConverter>,
}

impl AverageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, storage: CounterStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn single_threaded(mut self) -> Self {
        self.mode = AverageMode::SingleThreaded;
        self
    }

    pub fn with_converter(mut self, converter: impl Fn(f32) -> f32 + Send + Sync + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }
}

enum Accumulator {
    Shared { sum: Arc<Counter>, count: Arc<Counter> },
    Exclusive { sum: AtomicI64, count: AtomicI64 },
}

/// Running mean over a counted stream of values.
pub struct AverageValueStatistic {
    name: StatisticName,
    storage: CounterStorage,
    mode: AverageMode,
    converter: Option<AverageConverter>,
    accumulator: Accumulator,
}

fn registry() -> &'static Registry<AverageValueStatistic> {
    static REGISTRY: OnceLock<Registry<AverageValueStatistic>> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new("average"))
}

impl AverageValueStatistic {
    pub fn find_or_create(name: impl Into<StatisticName>) -> Arc<Self> {
        Self::find_or_create_with(name, AverageOptions::default())
    }

    /// Registration is idempotent by name. A differing storage mode or
    /// accumulator mode on a later call is logged and ignored.
    pub fn find_or_create_with(name: impl Into<StatisticName>, options: AverageOptions) -> Arc<Self> {
        let name = name.into();
        let storage = options.storage;
        let mode = options.mode;
        let (average, created) =
            registry().find_or_insert_with(&name, || Self::new(name.clone(), options));
        if !created && (average.storage != storage || average.mode != mode) {
            warn!(
                "Average statistic {} re-registered with storage {:?} / {:?}; keeping {:?} / {:?}",
                name, storage, mode, average.storage, average.mode
            );
        }
        average
    }

    fn new(name: StatisticName, options: AverageOptions) -> Self {
        let accumulator = match options.mode {
            AverageMode::MultiThreaded => {
                let hidden = CounterOptions::new()
                    .with_delta(false)
                    .with_storage(CounterStorage::DontStore)
                    .hidden();
                Accumulator::Shared {
                    sum: Counter::find_or_create_with(format!("{name}.Sum"), hidden.clone()),
                    count: Counter::find_or_create_with(format!("{name}.Count"), hidden),
                }
            }
            AverageMode::SingleThreaded => Accumulator::Exclusive {
                sum: AtomicI64::new(0),
                count: AtomicI64::new(0),
            },
        };
        Self {
            name,
            storage: options.storage,
            mode: options.mode,
            converter: options.converter,
            accumulator,
        }
    }

    pub fn find(name: &str) -> Option<Arc<Self>> {
        registry().find(name)
    }

    /// Unregisters the average together with its hidden sum and count
    /// counters, so a later registration under the same name starts empty.
    pub fn delete(name: &str) -> bool {
        let Some(average) = registry().remove(name) else {
            return false;
        };
        if let Accumulator::Shared { sum, count } = &average.accumulator {
            Counter::delete(sum.name().as_str());
            Counter::delete(count.name().as_str());
        }
        true
    }

    pub fn all() -> Vec<Arc<Self>> {
        registry().snapshot()
    }

    pub(crate) fn clear_registry() {
        registry().clear();
    }

    pub fn name(&self) -> &StatisticName {
        &self.name
    }

    pub fn mode(&self) -> AverageMode {
        self.mode
    }

    #[inline]
    pub fn add_value(&self, value: i64) {
        match &self.accumulator {
            Accumulator::Shared { sum, count } => {
                sum.increment_by(value);
                count.increment();
            }
            Accumulator::Exclusive { sum, count } => {
                sum.store(sum.load(Ordering::Relaxed).wrapping_add(value), Ordering::Relaxed);
                count.store(count.load(Ordering::Relaxed).wrapping_add(1), Ordering::Relaxed);
            }
        }
    }

    pub fn get_sum(&self) -> i64 {
        match &self.accumulator {
            Accumulator::Shared { sum, .. } => sum.get_current_value(),
            Accumulator::Exclusive { sum, .. } => sum.load(Ordering::Relaxed),
        }
    }

    pub fn get_count(&self) -> i64 {
        match &self.accumulator {
            Accumulator::Shared { count, .. } => count.get_current_value(),
            Accumulator::Exclusive { count, .. } => count.load(Ordering::Relaxed),
        }
    }

    /// `sum / count`, or `0.0` when no value was added yet.
    pub fn get_average_value(&self) -> f32 {
        let count = self.get_count();
        if count == 0 {
            return 0.0;
        }
        self.get_sum() as f32 / count as f32
    }

    /// The average after the display converter, if any.
    pub fn get_display_value(&self) -> f32 {
        let average = self.get_average_value();
        match &self.converter {
            Some(converter) => guarded(self.name.as_str(), || average, || converter(average)),
            None => average,
        }
    }
}

impl fmt::Debug for AverageValueStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AverageValueStatistic")
            .field("name", &self.name)
            .field("storage", &self.storage)
            .field("mode", &self.mode)
            .field("average", &self.get_average_value())
            .finish()
    }
}

impl ReportableStatistic for AverageValueStatistic {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn storage(&self) -> CounterStorage {
        self.storage
    }

    fn value_string(&self) -> String {
        format!("{:.3}", self.get_display_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_average_of_three_values() {
        let average = AverageValueStatistic::find_or_create("Test.Average.Three");
        average.add_value(10);
        average.add_value(20);
        average.add_value(30);
        assert_eq!(average.get_average_value(), 20.0);
        assert_eq!(average.get_count(), 3);
        assert_eq!(average.get_sum(), 60);
    }

    #[test]
    fn test_empty_average_is_zero() {
        let average = AverageValueStatistic::find_or_create("Test.Average.Empty");
        assert_eq!(average.get_average_value(), 0.0);

        let single = AverageValueStatistic::find_or_create_with(
            "Test.Average.EmptySingle",
            AverageOptions::new().single_threaded(),
        );
        assert_eq!(single.get_average_value(), 0.0);
    }

    #[test]
    fn test_single_threaded_variant() {
        let average = AverageValueStatistic::find_or_create_with(
            "Test.Average.Single",
            AverageOptions::new().single_threaded(),
        );
        average.add_value(4);
        average.add_value(8);
        assert_eq!(average.mode(), AverageMode::SingleThreaded);
        assert_eq!(average.get_average_value(), 6.0);
        assert!(Counter::find("Test.Average.Single.Sum").is_none());
    }

    #[test]
    fn test_multi_threaded_variant_from_many_threads() {
        let average = AverageValueStatistic::find_or_create("Test.Average.Threads");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let average = average.clone();
                thread::spawn(move || {
                    crate::track_current_thread();
                    for _ in 0..250 {
                        average.add_value(2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(average.get_count(), 1000);
        assert_eq!(average.get_average_value(), 2.0);
    }

    #[test]
    fn test_converter_only_affects_display() {
        let average = AverageValueStatistic::find_or_create_with(
            "Test.Average.Converted",
            AverageOptions::new()
                .with_storage(CounterStorage::LogOnly)
                .with_converter(|micros| micros / 1000.0),
        );
        average.add_value(1500);
        assert_eq!(average.get_average_value(), 1500.0);
        assert_eq!(average.get_display_value(), 1.5);
        assert_eq!(average.display_string(), "Test.Average.Converted=1.500");
    }

    #[test]
    fn test_recreated_after_delete_starts_empty() {
        let average = AverageValueStatistic::find_or_create("Test.Average.Recreated");
        average.add_value(40);
        average.add_value(60);

        assert!(AverageValueStatistic::delete("Test.Average.Recreated"));
        assert!(Counter::find("Test.Average.Recreated.Sum").is_none());
        assert!(Counter::find("Test.Average.Recreated.Count").is_none());
        assert!(!AverageValueStatistic::delete("Test.Average.Recreated"));

        let recreated = AverageValueStatistic::find_or_create("Test.Average.Recreated");
        assert_eq!(recreated.get_count(), 0);
        assert_eq!(recreated.get_average_value(), 0.0);
        recreated.add_value(5);
        assert_eq!(recreated.get_average_value(), 5.0);
    }

    #[test]
    fn test_mismatched_storage_keeps_first_registration() {
        let first = AverageValueStatistic::find_or_create_with(
            "Test.Average.Mismatch",
            AverageOptions::new().with_storage(CounterStorage::LogOnly),
        );
        let second = AverageValueStatistic::find_or_create_with(
            "Test.Average.Mismatch",
            AverageOptions::new().with_storage(CounterStorage::DontStore),
        );
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.storage(), CounterStorage::LogOnly);
    }
}
