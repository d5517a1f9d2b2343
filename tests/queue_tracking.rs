// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! End-to-end queue tracking. The shared all-queues statistics are only fed by
//! the test in this binary.

use std::thread;
use std::time::Duration;

use rsstats::{
    AverageValueStatistic, IntervalAccuracy, QueueTrackingStatistic, ReportableStatistic,
    TimeInterval,
};

#[test]
fn test_enqueue_wait_dequeue() {
    let queue = QueueTrackingStatistic::new("Q1");
    let mut item = TimeInterval::new(IntervalAccuracy::Fine);

    queue.on_enqueue_request_timed(1, 5, &mut item);
    thread::sleep(Duration::from_millis(100));
    queue.on_dequeue_request(&mut item);

    assert_eq!(queue.average_queue_length(), 5.0);
    assert_eq!(queue.enqueued_count(), 1);

    let waited = queue.average_time_in_queue();
    assert!(
        waited >= Duration::from_millis(100) && waited < Duration::from_millis(300),
        "waited {waited:?}"
    );

    let all_queues =
        AverageValueStatistic::find("Queues.TimeInQueue.Average.Milliseconds.AllQueues").unwrap();
    assert_eq!(all_queues.get_count(), 1);
    assert_eq!(queue.average_time_in_all_queues(), waited);

    let shown_ms = all_queues.get_display_value();
    assert!((100.0..300.0).contains(&shown_ms), "displayed {shown_ms}");
    assert!(all_queues
        .display_string()
        .starts_with("Queues.TimeInQueue.Average.Milliseconds.AllQueues="));
}
