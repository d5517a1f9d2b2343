// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Scheduler Statistics Group
//!
//! Counters over the turn scheduler: global work-item totals, turn counts per
//! worker thread and per work-item group, classified by scheduling context,
//! and a turn length histogram.
//!
//! Worker threads and work-item groups register once and receive a stable
//! integer handle. Every hot-path event is O(1): a lock-free handle lookup
//! followed by Counter Core increments.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use papaya::HashMap;

use crate::collector::{collection_level, StatisticsLevel};
use crate::context::{SchedulingContext, TurnClass};
use crate::counter::{Counter, CounterOptions};
use crate::error::{Error, Result};
use crate::histogram::HistogramValueStatistic;
use crate::names;
use crate::report::StatisticsConfig;
use crate::statistic::CounterStorage;
use crate::value::{IntValueStatistic, StringValueStatistic};

/// Number of exponential buckets in the turn length histogram.
pub const TURN_LENGTH_HISTOGRAM_BUCKETS: usize = 31;

/// Handle returned by [`SchedulerStatisticsGroup::register_working_thread`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerThreadHandle(usize);

impl WorkerThreadHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle returned by [`SchedulerStatisticsGroup::register_work_item_group`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkItemGroupHandle(usize);

impl WorkItemGroupHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

struct WorkQueueCounters {
    pending: Arc<Counter>,
    enqueued: Arc<Counter>,
    dequeued: Arc<Counter>,
    dropped: Arc<Counter>,
    closures_created: Arc<Counter>,
    closures_executed: Arc<Counter>,
    long_queue_waits: Arc<Counter>,
}

struct TurnCounters {
    application_by_threads: Arc<Counter>,
    system_by_threads: Arc<Counter>,
    null_by_threads: Arc<Counter>,
    application_by_groups: Arc<Counter>,
    system_by_groups: Arc<Counter>,
    total_start: Arc<Counter>,
    total_end: Arc<Counter>,
    long_running: Arc<Counter>,
    turn_length: Arc<HistogramValueStatistic>,
}

struct ThreadTurnCounters {
    application: Arc<Counter>,
    system: Arc<Counter>,
    null: Arc<Counter>,
}

impl ThreadTurnCounters {
    fn for_class(&self, class: TurnClass) -> &Counter {
        match class {
            TurnClass::Application => &self.application,
            TurnClass::System => &self.system,
            TurnClass::Null => &self.null,
        }
    }
}

struct GroupStatistics {
    name: String,
    /// `None` when per-work-item statistics are disabled.
    turns: Option<Arc<Counter>>,
}

/// Statistics for one scheduler instance.
///
/// Which categories exist is decided once, at [`init`](SchedulerStatisticsGroup::init),
/// from the collection level. Calls for a disabled category are no-ops.
pub struct SchedulerStatisticsGroup {
    level: StatisticsLevel,
    long_turn_threshold: Duration,
    long_queue_wait_threshold: Duration,
    queue: Option<WorkQueueCounters>,
    turns: Option<TurnCounters>,
    threads: HashMap<usize, Arc<ThreadTurnCounters>>,
    next_thread: AtomicUsize,
    groups: HashMap<usize, Arc<GroupStatistics>>,
    next_group: AtomicUsize,
    group_count: Arc<AtomicI64>,
}

impl SchedulerStatisticsGroup {
    pub const DEFAULT_LONG_TURN_THRESHOLD: Duration = Duration::from_millis(200);
    pub const DEFAULT_LONG_QUEUE_WAIT_THRESHOLD: Duration = Duration::from_millis(100);

    /// Initializes the group at the process-wide collection level.
    pub fn init_from_policy() -> Arc<Self> {
        Self::init(collection_level())
    }

    /// Initializes the group from configuration: its collection level and
    /// the long-turn and long-queue-wait thresholds.
    pub fn init_from_config(config: &StatisticsConfig) -> Arc<Self> {
        Self::init_with_thresholds(
            config.collection_level,
            config.long_turn_threshold,
            config.long_queue_wait_threshold,
        )
    }

    /// Initializes the group, allocating the global counters enabled at `level`.
    pub fn init(level: StatisticsLevel) -> Arc<Self> {
        Self::init_with_thresholds(
            level,
            Self::DEFAULT_LONG_TURN_THRESHOLD,
            Self::DEFAULT_LONG_QUEUE_WAIT_THRESHOLD,
        )
    }

    pub fn init_with_thresholds(
        level: StatisticsLevel,
        long_turn_threshold: Duration,
        long_queue_wait_threshold: Duration,
    ) -> Arc<Self> {
        let queue = level.collect_global_scheduler_stats().then(|| WorkQueueCounters {
            pending: Counter::find_or_create_with(
                names::SCHEDULER_PENDINGWORKITEMS,
                CounterOptions::new().with_delta(false),
            ),
            enqueued: Counter::find_or_create(names::SCHEDULER_ITEMS_ENQUEUED_TOTAL),
            dequeued: Counter::find_or_create(names::SCHEDULER_ITEMS_DEQUEUED_TOTAL),
            dropped: Counter::find_or_create(names::SCHEDULER_ITEMS_DROPPED_TOTAL),
            closures_created: Counter::find_or_create(names::SCHEDULER_CLOSURE_WORK_ITEMS_CREATED),
            closures_executed: Counter::find_or_create(names::SCHEDULER_CLOSURE_WORK_ITEMS_EXECUTED),
            long_queue_waits: Counter::find_or_create(names::SCHEDULER_NUM_LONG_QUEUE_WAIT_TIMES),
        });

        let turns = level.collect_turns_stats().then(|| TurnCounters {
            application_by_threads: Counter::find_or_create(
                names::SCHEDULER_TURNSEXECUTED_APPLICATION_BYALLWORKERTHREADS,
            ),
            system_by_threads: Counter::find_or_create(
                names::SCHEDULER_TURNSEXECUTED_SYSTEM_BYALLWORKERTHREADS,
            ),
            null_by_threads: Counter::find_or_create(
                names::SCHEDULER_TURNSEXECUTED_NULL_BYALLWORKERTHREADS,
            ),
            application_by_groups: Counter::find_or_create(
                names::SCHEDULER_TURNSEXECUTED_APPLICATION_BYALLWORKITEMGROUPS,
            ),
            system_by_groups: Counter::find_or_create(
                names::SCHEDULER_TURNSEXECUTED_SYSTEM_BYALLWORKITEMGROUPS,
            ),
            total_start: Counter::find_or_create(names::SCHEDULER_TURNSEXECUTED_TOTAL_START),
            total_end: Counter::find_or_create(names::SCHEDULER_TURNSEXECUTED_TOTAL_END),
            long_running: Counter::find_or_create(names::SCHEDULER_NUM_LONG_RUNNING_TURNS),
            turn_length: HistogramValueStatistic::create_exponential_duration(
                names::SCHEDULER_TURN_LENGTH_HISTOGRAM,
                TURN_LENGTH_HISTOGRAM_BUCKETS,
            ),
        });

        let group_count = Arc::new(AtomicI64::new(0));
        if level.is_enabled() {
            let count = group_count.clone();
            IntValueStatistic::find_or_create(names::SCHEDULER_WORKITEMGROUP_COUNT, move || {
                count.load(Ordering::Relaxed)
            });
        }

        debug!("Scheduler statistics initialized at level {level}");

        Arc::new(Self {
            level,
            long_turn_threshold,
            long_queue_wait_threshold,
            queue,
            turns,
            threads: HashMap::new(),
            next_thread: AtomicUsize::new(0),
            groups: HashMap::new(),
            next_group: AtomicUsize::new(0),
            group_count,
        })
    }

    pub fn level(&self) -> StatisticsLevel {
        self.level
    }

    /// Registers a worker thread and allocates its per-class turn counters.
    pub fn register_working_thread(&self, thread_name: &str) -> WorkerThreadHandle {
        let handle = WorkerThreadHandle(self.next_thread.fetch_add(1, Ordering::Relaxed));
        if self.turns.is_some() {
            let counters = ThreadTurnCounters {
                application: Counter::find_or_create(
                    names::SCHEDULER_TURNSEXECUTED_APPLICATION_PERTHREAD.with(thread_name),
                ),
                system: Counter::find_or_create(
                    names::SCHEDULER_TURNSEXECUTED_SYSTEM_PERTHREAD.with(thread_name),
                ),
                null: Counter::find_or_create(
                    names::SCHEDULER_TURNSEXECUTED_NULL_PERTHREAD.with(thread_name),
                ),
            };
            self.threads.pin().insert(handle.0, Arc::new(counters));
        }
        debug!("Registered worker thread {thread_name} as {}", handle.0);
        handle
    }

    /// Registers a work-item group.
    ///
    /// When per-work-item statistics are enabled, allocates the group's turn
    /// counter and a status statistic backed by `status`. Both are logged only
    /// if this context is reported at the current level.
    pub fn register_work_item_group(
        &self,
        name: &str,
        context: &dyn SchedulingContext,
        status: impl Fn() -> String + Send + Sync + 'static,
    ) -> WorkItemGroupHandle {
        let handle = WorkItemGroupHandle(self.next_group.fetch_add(1, Ordering::Relaxed));
        self.group_count.fetch_add(1, Ordering::Relaxed);

        let turns = self
            .level
            .collect_per_work_item_stats()
            .then(|| Self::allocate_group_statistics(self.level, name, context, status));
        self.groups.pin().insert(
            handle.0,
            Arc::new(GroupStatistics {
                name: name.to_string(),
                turns,
            }),
        );
        handle
    }

    fn allocate_group_statistics(
        level: StatisticsLevel,
        name: &str,
        context: &dyn SchedulingContext,
        status: impl Fn() -> String + Send + Sync + 'static,
    ) -> Arc<Counter> {
        let storage = if level.report_per_work_item_stats(context.is_system_priority()) {
            CounterStorage::LogOnly
        } else {
            CounterStorage::DontStore
        };
        let turns = Counter::find_or_create_with(
            names::SCHEDULER_ACTIVATION_TURNSEXECUTED_PERACTIVATION.with(name),
            CounterOptions::new().with_storage(storage),
        );
        StringValueStatistic::builder(names::SCHEDULER_ACTIVATION_STATUS_PERACTIVATION.with(name), status)
            .storage(storage)
            .register();
        turns
    }

    /// Deletes the group's named statistics. Failures are logged, never raised.
    /// The handle's slot is not reused.
    pub fn unregister_work_item_group(&self, handle: WorkItemGroupHandle) {
        let Some(group) = self.groups.pin().remove(&handle.0).cloned() else {
            debug!("Work item group {} is not registered", handle.0);
            return;
        };
        self.group_count.fetch_sub(1, Ordering::Relaxed);

        let Some(turns) = &group.turns else {
            return;
        };
        // Missing entries are logged by the registries.
        Counter::delete(turns.name().as_str());
        StringValueStatistic::delete(
            names::SCHEDULER_ACTIVATION_STATUS_PERACTIVATION
                .with(&group.name)
                .as_str(),
        );
        debug!("Unregistered work item group {} ({})", group.name, handle.0);
    }

    pub fn on_work_item_enqueue(&self) {
        if let Some(queue) = &self.queue {
            queue.enqueued.increment();
            queue.pending.increment();
        }
    }

    pub fn on_work_item_dequeue(&self) {
        if let Some(queue) = &self.queue {
            queue.dequeued.increment();
            queue.pending.decrement_by(1);
        }
    }

    pub fn on_work_item_drop(&self, count: usize) {
        if let Some(queue) = &self.queue {
            let count = count as i64;
            queue.dropped.increment_by(count);
            queue.pending.decrement_by(count);
        }
    }

    pub fn on_closure_work_item_created(&self) {
        if let Some(queue) = &self.queue {
            queue.closures_created.increment();
        }
    }

    pub fn on_closure_work_item_executed(&self) {
        if let Some(queue) = &self.queue {
            queue.closures_executed.increment();
        }
    }

    /// Records how long a work item waited before a thread picked it up.
    pub fn on_work_item_queue_wait(&self, wait: Duration) {
        if let Some(queue) = &self.queue {
            if wait > self.long_queue_wait_threshold {
                queue.long_queue_waits.increment();
            }
        }
    }

    /// A worker thread starts a turn outside of any work-item group.
    pub fn on_thread_starts_turn_execution(
        &self,
        thread: WorkerThreadHandle,
        context: Option<&dyn SchedulingContext>,
    ) {
        let Some(turns) = &self.turns else {
            return;
        };
        turns.total_start.increment();

        let class = TurnClass::of(context);
        match class {
            TurnClass::Application => turns.application_by_threads.increment(),
            TurnClass::System => turns.system_by_threads.increment(),
            TurnClass::Null => turns.null_by_threads.increment(),
        }
        if let Some(counters) = self.threads.pin().get(&thread.0) {
            counters.for_class(class).increment();
        }
    }

    /// A worker thread starts a turn on behalf of a work-item group.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `context` is `None`: a group turn
    /// always runs in a context, so a missing one is a scheduler bug.
    pub fn on_turn_execution_starts_by_work_group(
        &self,
        group: WorkItemGroupHandle,
        thread: WorkerThreadHandle,
        context: Option<&dyn SchedulingContext>,
    ) -> Result<()> {
        let Some(context) = context else {
            return Err(Error::InvalidArgument {
                operation: "on_turn_execution_starts_by_work_group",
                details: format!(
                    "work item group {} started a turn without a scheduling context",
                    group.0
                ),
            });
        };

        if let Some(turns) = self.groups.pin().get(&group.0).and_then(|g| g.turns.as_ref()) {
            turns.increment();
        }

        let Some(turns) = &self.turns else {
            return Ok(());
        };
        turns.total_start.increment();

        let class = TurnClass::of(Some(context));
        match class {
            TurnClass::Application => turns.application_by_groups.increment(),
            TurnClass::System => turns.system_by_groups.increment(),
            TurnClass::Null => {}
        }
        if let Some(counters) = self.threads.pin().get(&thread.0) {
            counters.for_class(class).increment();
        }
        Ok(())
    }

    /// A turn finished after running for `duration`.
    pub fn on_turn_execution_end(&self, duration: Duration) {
        let Some(turns) = &self.turns else {
            return;
        };
        turns.total_end.increment();
        turns.turn_length.add_duration(duration);
        if duration > self.long_turn_threshold {
            turns.long_running.increment();
        }
    }

    pub fn work_item_group_count(&self) -> i64 {
        self.group_count.load(Ordering::Relaxed)
    }

    pub fn turn_length_histogram(&self) -> Option<&Arc<HistogramValueStatistic>> {
        self.turns.as_ref().map(|turns| &turns.turn_length)
    }
}
