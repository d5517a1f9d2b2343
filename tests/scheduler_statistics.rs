// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Scheduler statistics driven from tracked worker threads.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rsstats::{
    names, track_current_thread, Counter, Error, IntValueStatistic,
    SchedulerStatisticsGroup, SchedulingContextInfo, StatisticsLevel,
};

fn value(name: &str) -> i64 {
    Counter::find(name).map_or(0, |counter| counter.get_current_value())
}

#[test]
fn test_worker_pool_turns() {
    let _ = env_logger::builder().is_test(true).try_init();

    let scheduler = SchedulerStatisticsGroup::init_with_thresholds(
        StatisticsLevel::Verbose3,
        Duration::from_millis(5),
        Duration::from_millis(5),
    );
    let grain = Arc::new(SchedulingContextInfo::activation("Worker.Grain"));
    let group = scheduler.register_work_item_group("Worker.Grain", &*grain, || {
        "Active".to_string()
    });

    let workers: Vec<_> = (0..4)
        .map(|index| {
            let scheduler = scheduler.clone();
            let grain = grain.clone();
            thread::spawn(move || {
                track_current_thread();
                let thread = scheduler.register_working_thread(&format!("Worker-{index}"));
                for _ in 0..50 {
                    scheduler.on_work_item_enqueue();
                    scheduler.on_work_item_dequeue();
                    scheduler
                        .on_turn_execution_starts_by_work_group(group, thread, Some(&*grain))
                        .unwrap();
                    scheduler.on_turn_execution_end(Duration::from_micros(100));
                }
                scheduler.on_thread_starts_turn_execution(thread, None);
                scheduler.on_turn_execution_end(Duration::from_millis(20));
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    assert_eq!(value(names::SCHEDULER_PENDINGWORKITEMS), 0);
    assert_eq!(value(names::SCHEDULER_ITEMS_ENQUEUED_TOTAL), 200);
    assert_eq!(value(names::SCHEDULER_ITEMS_DEQUEUED_TOTAL), 200);
    assert_eq!(value(names::SCHEDULER_TURNSEXECUTED_APPLICATION_BYALLWORKITEMGROUPS), 200);
    assert_eq!(value(names::SCHEDULER_TURNSEXECUTED_NULL_BYALLWORKERTHREADS), 4);
    assert_eq!(value(names::SCHEDULER_TURNSEXECUTED_TOTAL_START), 204);
    assert_eq!(value(names::SCHEDULER_TURNSEXECUTED_TOTAL_END), 204);
    assert_eq!(value(names::SCHEDULER_NUM_LONG_RUNNING_TURNS), 4);
    assert_eq!(value("Scheduler.Activation.TurnsExecuted.ByActivation.Worker.Grain"), 200);
    for index in 0..4 {
        assert_eq!(
            value(&format!("Scheduler.TurnsExecuted.Application.ByThread.Worker-{index}")),
            50
        );
    }

    let histogram = scheduler.turn_length_histogram().unwrap();
    assert_eq!(histogram.bucket_counts().iter().sum::<i64>(), 204);
    // 100µs lands in [64µs:128µs].
    assert_eq!(histogram.bucket_counts()[6], 200);

    assert!(IntValueStatistic::find(names::SCHEDULER_WORKITEMGROUP_COUNT).is_some());
    assert_eq!(scheduler.work_item_group_count(), 1);
    scheduler.unregister_work_item_group(group);
    assert_eq!(scheduler.work_item_group_count(), 0);
    assert!(Counter::find("Scheduler.Activation.TurnsExecuted.ByActivation.Worker.Grain").is_none());
}

#[test]
fn test_group_turn_requires_context() {
    let scheduler = SchedulerStatisticsGroup::init(StatisticsLevel::Verbose2);
    let thread = scheduler.register_working_thread("Worker-NoContext");
    let context = SchedulingContextInfo::system_target("Worker.System");
    let group = scheduler.register_work_item_group("Worker.System", &context, String::new);

    match scheduler.on_turn_execution_starts_by_work_group(group, thread, None) {
        Err(Error::InvalidArgument { operation, .. }) => {
            assert_eq!(operation, "on_turn_execution_starts_by_work_group");
        }
        other => panic!("expected an invalid argument error, got {other:?}"),
    }
    assert_eq!(value("Scheduler.Activation.TurnsExecuted.ByActivation.Worker.System"), 0);
}
