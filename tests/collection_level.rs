// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Collection level gating.
//!
//! These tests change the process-wide collection level, so they run in their
//! own binary and serialize on a file-local lock.

use std::sync::{Mutex, MutexGuard};

use rsstats::{
    collection_level, set_collection_level, Counter, QueueTrackingStatistic,
    SchedulerStatisticsGroup, SchedulingContextInfo, StatisticsConfig, StatisticsLevel,
    StringValueStatistic,
};

static LEVEL_LOCK: Mutex<()> = Mutex::new(());

fn with_level(level: StatisticsLevel) -> MutexGuard<'static, ()> {
    let guard = LEVEL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    set_collection_level(level);
    guard
}

#[test]
fn test_default_level_is_info() {
    let _guard = LEVEL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    // Nothing in this binary sets the level outside of a guard.
    set_collection_level(StatisticsLevel::default());
    assert_eq!(collection_level(), StatisticsLevel::Info);
}

#[test]
fn test_info_skips_queue_and_work_item_statistics() {
    let _guard = with_level(StatisticsLevel::Info);

    assert!(QueueTrackingStatistic::find_or_create("Test.Gate.Queue.Info").is_none());
    assert!(Counter::find("Queues.EnQueued.Test.Gate.Queue.Info").is_none());

    let scheduler = SchedulerStatisticsGroup::init_from_policy();
    let context = SchedulingContextInfo::system_target("Test.Gate.Group.Info");
    scheduler.register_work_item_group("Test.Gate.Group.Info", &context, || "ok".to_string());

    assert!(
        Counter::find("Scheduler.Activation.TurnsExecuted.ByActivation.Test.Gate.Group.Info")
            .is_none()
    );
    assert!(
        StringValueStatistic::find("Scheduler.Activation.Status.ByActivation.Test.Gate.Group.Info")
            .is_none()
    );
    assert!(scheduler.turn_length_histogram().is_none());
}

#[test]
fn test_verbose2_allocates_queue_and_work_item_statistics() {
    let _guard = with_level(StatisticsLevel::Verbose2);

    let queue = QueueTrackingStatistic::find_or_create("Test.Gate.Queue.Verbose2")
        .expect("queue statistics are enabled at Verbose2");
    queue.on_enqueue_request(1, 1);
    assert_eq!(
        Counter::find("Queues.EnQueued.Test.Gate.Queue.Verbose2")
            .unwrap()
            .get_current_value(),
        1
    );

    let scheduler = SchedulerStatisticsGroup::init_from_policy();
    let context = SchedulingContextInfo::activation("Test.Gate.Group.Verbose2");
    scheduler.register_work_item_group("Test.Gate.Group.Verbose2", &context, || "ok".to_string());

    assert!(Counter::find(
        "Scheduler.Activation.TurnsExecuted.ByActivation.Test.Gate.Group.Verbose2"
    )
    .is_some());
    assert!(scheduler.turn_length_histogram().is_some());
}

#[test]
fn test_off_allocates_nothing() {
    let _guard = with_level(StatisticsLevel::Off);

    let scheduler = SchedulerStatisticsGroup::init_from_policy();
    scheduler.on_work_item_enqueue();
    assert!(QueueTrackingStatistic::find_or_create("Test.Gate.Queue.Off").is_none());
    assert!(!collection_level().is_enabled());
}

#[test]
fn test_config_apply_publishes_level() {
    let _guard = LEVEL_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    StatisticsConfig::new()
        .with_collection_level(StatisticsLevel::Verbose3)
        .apply();
    assert_eq!(collection_level(), StatisticsLevel::Verbose3);

    "verbose".parse::<StatisticsLevel>().map(set_collection_level).unwrap();
    assert_eq!(collection_level(), StatisticsLevel::Verbose);
}
