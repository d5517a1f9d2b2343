// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Queue Tracking Statistic
//!
//! One instance per named internal queue. Enqueues record a count and a
//! queue-length sample; a dequeue that carries the item's [`TimeInterval`]
//! feeds the per-queue wait average plus two statistics shared by every
//! queue, so fleet-wide wait time comes from the same call site.

use std::sync::Arc;
use std::time::Duration;

use crate::average::{AverageOptions, AverageValueStatistic};
use crate::collector::collection_level;
use crate::counter::Counter;
use crate::interval::TimeInterval;
use crate::names;

#[cfg(feature = "arrival-rate")]
use crate::value::FloatValueStatistic;

fn micros_to_millis(micros: f32) -> f32 {
    micros / 1000.0
}

fn wait_options() -> AverageOptions {
    AverageOptions::new().with_converter(micros_to_millis)
}

/// Statistics for one named queue.
pub struct QueueTrackingStatistic {
    name: String,
    average_queue_size: Arc<AverageValueStatistic>,
    enqueued: Arc<Counter>,
    // Waits are accumulated in microseconds and displayed in milliseconds.
    average_time_in_queue: Arc<AverageValueStatistic>,
    total_time_in_queue: Arc<Counter>,
    average_time_in_all_queues: Arc<AverageValueStatistic>,
    total_time_in_all_queues: Arc<Counter>,
    #[cfg(feature = "arrival-rate")]
    _arrival_rate: Arc<FloatValueStatistic>,
}

impl QueueTrackingStatistic {
    /// Creates the queue's statistics when queue statistics are enabled at
    /// the current collection level, `None` otherwise.
    pub fn find_or_create(queue_name: &str) -> Option<Self> {
        collection_level()
            .collect_queue_stats()
            .then(|| Self::new(queue_name))
    }

    /// Creates the queue's statistics regardless of the collection level.
    pub fn new(queue_name: &str) -> Self {
        let average_queue_size = AverageValueStatistic::find_or_create(
            names::QUEUES_QUEUE_SIZE_AVERAGE_PER_QUEUE.with(queue_name),
        );
        let enqueued = Counter::find_or_create(names::QUEUES_ENQUEUED_PER_QUEUE.with(queue_name));
        let average_time_in_queue = AverageValueStatistic::find_or_create_with(
            names::QUEUES_TIME_IN_QUEUE_AVERAGE_MILLIS_PER_QUEUE.with(queue_name),
            wait_options(),
        );
        let total_time_in_queue = Counter::find_or_create(
            names::QUEUES_TIME_IN_QUEUE_TOTAL_MILLIS_PER_QUEUE.with(queue_name),
        );
        let average_time_in_all_queues = AverageValueStatistic::find_or_create_with(
            names::QUEUES_TIME_IN_QUEUE_AVERAGE_MILLIS_PER_QUEUE.with(names::ALL_QUEUES),
            wait_options(),
        );
        let total_time_in_all_queues = Counter::find_or_create(
            names::QUEUES_TIME_IN_QUEUE_TOTAL_MILLIS_PER_QUEUE.with(names::ALL_QUEUES),
        );

        #[cfg(feature = "arrival-rate")]
        let _arrival_rate = {
            let counter = enqueued.clone();
            let started = std::time::Instant::now();
            FloatValueStatistic::find_or_create(
                names::QUEUES_AVERAGE_ARRIVAL_RATE_PER_QUEUE.with(queue_name),
                move || {
                    let seconds = started.elapsed().as_secs_f32();
                    if seconds <= 0.0 {
                        0.0
                    } else {
                        counter.get_current_value() as f32 / seconds
                    }
                },
            )
        };

        Self {
            name: queue_name.to_string(),
            average_queue_size,
            enqueued,
            average_time_in_queue,
            total_time_in_queue,
            average_time_in_all_queues,
            total_time_in_all_queues,
            #[cfg(feature = "arrival-rate")]
            _arrival_rate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records `count` enqueued items and samples the queue length.
    #[inline]
    pub fn on_enqueue_request(&self, count: usize, current_length: usize) {
        self.enqueued.increment_by(count as i64);
        self.average_queue_size.add_value(current_length as i64);
    }

    /// Like [`on_enqueue_request`](Self::on_enqueue_request), and starts
    /// measuring the item's time in queue.
    #[inline]
    pub fn on_enqueue_request_timed(
        &self,
        count: usize,
        current_length: usize,
        item_in_queue: &mut TimeInterval,
    ) {
        self.on_enqueue_request(count, current_length);
        item_in_queue.start();
    }

    /// Stops the item's interval and records its wait.
    pub fn on_dequeue_request(&self, item_in_queue: &mut TimeInterval) {
        item_in_queue.stop();
        let waited = item_in_queue.elapsed();
        let micros = waited.as_micros().min(i64::MAX as u128) as i64;

        self.average_time_in_queue.add_value(micros);
        self.total_time_in_queue.increment_by(waited.as_millis() as i64);
        self.average_time_in_all_queues.add_value(micros);
        self.total_time_in_all_queues.increment_by(waited.as_millis() as i64);
    }

    /// Mean of all length samples taken so far.
    pub fn average_queue_length(&self) -> f32 {
        self.average_queue_size.get_average_value()
    }

    /// Mean time an item spent in this queue.
    pub fn average_time_in_queue(&self) -> Duration {
        micros_to_duration(self.average_time_in_queue.get_average_value())
    }

    /// Mean time in queue across every tracked queue.
    pub fn average_time_in_all_queues(&self) -> Duration {
        micros_to_duration(self.average_time_in_all_queues.get_average_value())
    }

    pub fn enqueued_count(&self) -> i64 {
        self.enqueued.get_current_value()
    }
}

fn micros_to_duration(micros: f32) -> Duration {
    Duration::from_secs_f64((micros.max(0.0) as f64) / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::IntervalAccuracy;

    #[test]
    fn test_length_samples_are_averaged() {
        let queue = QueueTrackingStatistic::new("Test.Queue.Length");
        queue.on_enqueue_request(1, 2);
        queue.on_enqueue_request(3, 6);

        assert_eq!(queue.enqueued_count(), 4);
        assert_eq!(queue.average_queue_length(), 4.0);
    }

    #[test]
    fn test_wait_is_displayed_in_milliseconds() {
        let queue = QueueTrackingStatistic::new("Test.Queue.Millis");
        let mut interval = TimeInterval::new(IntervalAccuracy::Fine);
        queue.on_enqueue_request_timed(1, 1, &mut interval);
        std::thread::sleep(Duration::from_millis(20));
        queue.on_dequeue_request(&mut interval);

        let average = AverageValueStatistic::find("Queues.TimeInQueue.Average.Milliseconds.Test.Queue.Millis")
            .unwrap();
        let shown = average.get_display_value();
        assert!((20.0..200.0).contains(&shown), "displayed {shown}ms");
        assert!(queue.average_time_in_queue() >= Duration::from_millis(20));
    }

    #[cfg(feature = "arrival-rate")]
    #[test]
    fn test_arrival_rate_follows_enqueues() {
        let queue = QueueTrackingStatistic::new("Test.Queue.Arrival");
        let rate = FloatValueStatistic::find(
            "Queues.AverageArrivalRate.RequestsPerSecond.Test.Queue.Arrival",
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(rate.get_current_value(), 0.0);

        queue.on_enqueue_request(10, 0);
        let per_second = rate.get_current_value();
        // Ten enqueues over at least 50ms and well under ten seconds.
        assert!(per_second > 1.0 && per_second <= 200.0, "rate {per_second}");
    }

    #[test]
    fn test_queues_with_same_name_share_statistics() {
        let first = QueueTrackingStatistic::new("Test.Queue.Shared");
        let second = QueueTrackingStatistic::new("Test.Queue.Shared");
        first.on_enqueue_request(2, 0);
        second.on_enqueue_request(3, 0);
        assert_eq!(first.enqueued_count(), 5);
    }
}
