// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Bucketed distributions over Counter Core buckets.
//!
//! Each bucket is a hidden [`Counter`], so recording a sample costs one bucket
//! index computation plus one counter increment. The histogram is reported
//! through a registered [`StringValueStatistic`] under the histogram's name,
//! rendering the non-empty buckets as `[start:end]=count`.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::counter::{Counter, CounterOptions};
use crate::statistic::CounterStorage;
use crate::value::StringValueStatistic;
use crate::StatisticName;

/// Exponential histograms cap at 63 buckets, the last covering `[2^62, max]`.
const MAX_EXPONENTIAL_BUCKETS: usize = 63;

/// How a sample is mapped to a bucket index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStrategy {
    /// Constant-width buckets: `value / width`.
    Linear { width: i64 },
    /// `floor(log2(value))`, with values up to 1 in bucket 0.
    Exponential,
}

impl BucketStrategy {
    /// Linear buckets of width `max / num_buckets` (at least 1).
    pub fn linear(max: i64, num_buckets: usize) -> Self {
        let width = max / (num_buckets.max(1) as i64);
        BucketStrategy::Linear {
            width: width.max(1),
        }
    }

    /// Unclamped bucket index for `value`.
    pub fn bucket_index(&self, value: i64) -> usize {
        if value <= 0 {
            return 0;
        }
        match *self {
            BucketStrategy::Linear { width } => (value / width) as usize,
            BucketStrategy::Exponential => {
                if value <= 1 {
                    0
                } else {
                    (63 - value.leading_zeros()) as usize
                }
            }
        }
    }

    fn bucket_start(&self, index: usize) -> i64 {
        match *self {
            BucketStrategy::Linear { width } => width.saturating_mul(index as i64),
            BucketStrategy::Exponential if index == 0 => 0,
            BucketStrategy::Exponential => 1_i64 << index,
        }
    }

    fn bucket_end(&self, index: usize) -> i64 {
        match *self {
            BucketStrategy::Linear { width } => width.saturating_mul(index as i64 + 1),
            BucketStrategy::Exponential => 1_i64 << (index + 1),
        }
    }
}

/// Whether samples are plain values or durations recorded in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramUnit {
    Value,
    Duration,
}

pub struct HistogramValueStatistic {
    name: StatisticName,
    strategy: BucketStrategy,
    unit: HistogramUnit,
    buckets: Arc<[Arc<Counter>]>,
}

impl HistogramValueStatistic {
    /// Linear histogram with `num_buckets` buckets of width `max / num_buckets`.
    pub fn create_linear(name: impl Into<StatisticName>, num_buckets: usize, max: i64) -> Arc<Self> {
        Self::create(
            name.into(),
            num_buckets,
            BucketStrategy::linear(max, num_buckets),
            HistogramUnit::Value,
        )
    }

    /// Exponential histogram over plain values, e.g. message sizes in bytes.
    pub fn create_exponential(name: impl Into<StatisticName>, num_buckets: usize) -> Arc<Self> {
        Self::create(
            name.into(),
            num_buckets.min(MAX_EXPONENTIAL_BUCKETS),
            BucketStrategy::Exponential,
            HistogramUnit::Value,
        )
    }

    /// Exponential histogram over durations, bucketed by microseconds.
    pub fn create_exponential_duration(name: impl Into<StatisticName>, num_buckets: usize) -> Arc<Self> {
        Self::create(
            name.into(),
            num_buckets.min(MAX_EXPONENTIAL_BUCKETS),
            BucketStrategy::Exponential,
            HistogramUnit::Duration,
        )
    }

    fn create(
        name: StatisticName,
        num_buckets: usize,
        strategy: BucketStrategy,
        unit: HistogramUnit,
    ) -> Arc<Self> {
        let num_buckets = num_buckets.max(1);
        let buckets: Arc<[Arc<Counter>]> = (0..num_buckets)
            .map(|index| {
                Counter::find_or_create_with(
                    format!("{name}.Bucket.{index}"),
                    CounterOptions::new()
                        .with_delta(false)
                        .with_storage(CounterStorage::DontStore)
                        .hidden(),
                )
            })
            .collect();

        let render_buckets = buckets.clone();
        StringValueStatistic::find_or_create(name.clone(), move || {
            render(&render_buckets, strategy, unit)
        });

        Arc::new(Self {
            name,
            strategy,
            unit,
            buckets,
        })
    }

    pub fn name(&self) -> &StatisticName {
        &self.name
    }

    pub fn strategy(&self) -> BucketStrategy {
        self.strategy
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Records one sample. Out-of-range values land in the first or last bucket.
    #[inline]
    pub fn add_data(&self, value: i64) {
        let index = self.strategy.bucket_index(value).min(self.buckets.len() - 1);
        self.buckets[index].increment();
    }

    #[inline]
    pub fn add_duration(&self, duration: Duration) {
        let micros = duration.as_micros().min(i64::MAX as u128) as i64;
        self.add_data(micros);
    }

    pub fn bucket_counts(&self) -> Vec<i64> {
        self.buckets
            .iter()
            .map(|bucket| bucket.get_current_value())
            .collect()
    }

    /// The rendered distribution, as written to the statistics log.
    pub fn display_value(&self) -> String {
        render(&self.buckets, self.strategy, self.unit)
    }
}

fn render(buckets: &[Arc<Counter>], strategy: BucketStrategy, unit: HistogramUnit) -> String {
    let last = buckets.len() - 1;
    let mut out = String::new();

    for (index, bucket) in buckets.iter().enumerate() {
        let count = bucket.get_current_value();
        if count == 0 {
            continue;
        }
        if !out.is_empty() {
            out.push_str(", ");
        }
        let start = strategy.bucket_start(index);
        let _ = match unit {
            HistogramUnit::Value => {
                let end = if index == last { i64::MAX } else { strategy.bucket_end(index) };
                write!(out, "[{start}:{end}]={count}")
            }
            HistogramUnit::Duration => {
                let start = Duration::from_micros(start as u64);
                if index == last {
                    write!(out, "[{start:?}:EOT]={count}")
                } else {
                    let end = Duration::from_micros(strategy.bucket_end(index) as u64);
                    write!(out, "[{start:?}:{end:?}]={count}")
                }
            }
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_bucketing() {
        let histogram = HistogramValueStatistic::create_linear("Test.Histogram.Linear", 10, 100);
        histogram.add_data(55);
        histogram.add_data(1000);
        histogram.add_data(-4);

        let counts = histogram.bucket_counts();
        assert_eq!(counts[5], 1);
        assert_eq!(counts[9], 1);
        assert_eq!(counts[0], 1);
        assert_eq!(counts.iter().sum::<i64>(), 3);
    }

    #[test]
    fn test_exponential_bucket_index() {
        let strategy = BucketStrategy::Exponential;
        assert_eq!(strategy.bucket_index(0), 0);
        assert_eq!(strategy.bucket_index(1), 0);
        assert_eq!(strategy.bucket_index(2), 1);
        assert_eq!(strategy.bucket_index(3), 1);
        assert_eq!(strategy.bucket_index(1024), 10);
        assert_eq!(strategy.bucket_index(1025), 10);
    }

    #[test]
    fn test_exponential_overflow_clamps_to_last_bucket() {
        let histogram = HistogramValueStatistic::create_exponential("Test.Histogram.ExpClamp", 4);
        histogram.add_data(1 << 20);
        assert_eq!(histogram.bucket_counts(), vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_render_skips_empty_buckets() {
        let histogram = HistogramValueStatistic::create_linear("Test.Histogram.Render", 4, 40);
        histogram.add_data(5);
        histogram.add_data(35);
        histogram.add_data(36);

        assert_eq!(
            histogram.display_value(),
            format!("[0:10]=1, [30:{}]=2", i64::MAX)
        );
    }

    #[test]
    fn test_duration_render_uses_eot() {
        let histogram =
            HistogramValueStatistic::create_exponential_duration("Test.Histogram.Duration", 3);
        histogram.add_duration(Duration::from_micros(3));
        histogram.add_duration(Duration::from_secs(1));

        assert_eq!(histogram.display_value(), "[2µs:4µs]=1, [4µs:EOT]=1");
    }

    #[test]
    fn test_buckets_are_hidden_and_histogram_is_reported() {
        let histogram = HistogramValueStatistic::create_linear("Test.Histogram.Hidden", 2, 10);
        histogram.add_data(1);

        let bucket = Counter::find("Test.Histogram.Hidden.Bucket.0").unwrap();
        assert!(bucket.is_hidden());
        assert_eq!(bucket.get_current_value(), 1);

        let rendered = StringValueStatistic::find("Test.Histogram.Hidden").unwrap();
        assert_eq!(rendered.get_current_value(), "[0:5]=1");
    }
}
