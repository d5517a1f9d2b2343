// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Counter Core
//!
//! A [`Counter`] is a sharded signed integer built for extremely hot paths:
//! every scheduled turn, message send and queue operation increments one.
//!
//! # Sharding
//!
//! - **Tracked threads** (marked once with [`track_current_thread`], typically by
//!   the worker pool at spawn) write to a private shard. The shard lives in a
//!   thread-local vector indexed by the counter's process-unique id and is
//!   allocated the first time that thread touches that counter. Only the
//!   owning thread ever writes a shard, so the write is a plain relaxed
//!   load/store with no contended read-modify-write.
//! - **Untracked threads** (timers, I/O completions, anything else) add to a
//!   single shared atomic fallback. This bounds the number of shards.
//!
//! Reading sums every shard ever created plus the fallback. Shards are never
//! removed, so values contributed by threads that have exited are kept. A read
//! is O(threads that touched this counter) and belongs on the report path only.
//!
//! # Memory
//!
//! A tracked thread's shard vector is indexed by counter id and never
//! shrinks. Ids are not reused, so a counter registered again under a deleted
//! name gets a fresh slot. The slot of a deleted counter keeps its shard
//! allocated until the thread exits: one `Arc<AtomicI64>` per deleted counter
//! the thread touched, plus one vector entry per counter id ever issued below
//! the highest id the thread touched. Processes that churn per-entity counters
//! on long-lived worker threads pay this cost.
//!
//! # Consistency
//!
//! All accesses use `Ordering::Relaxed`. A read across threads is an eventually
//! consistent sum, which is acceptable for observational statistics.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use log::warn;

use crate::registry::Registry;
use crate::statistic::{guarded, CounterStorage, ReportableStatistic};
use crate::StatisticName;

static NEXT_COUNTER_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static TRACKED: Cell<bool> = const { Cell::new(false) };
    static SHARDS: RefCell<Vec<Option<Arc<AtomicI64>>>> = const { RefCell::new(Vec::new()) };
}

/// Marks the calling thread as a runtime-managed thread.
///
/// Increments from a tracked thread go to that thread's private shard.
/// Calling this more than once is harmless. The mark dies with the thread.
pub fn track_current_thread() {
    let _ = TRACKED.try_with(|tracked| tracked.set(true));
}

/// Returns whether [`track_current_thread`] was called on this thread.
pub fn is_current_thread_tracked() -> bool {
    TRACKED.try_with(Cell::get).unwrap_or(false)
}

/// Display-time transform applied to a counter's value.
pub type CounterValueConverter = Arc<dyn Fn(i64) -> i64 + Send + Sync>;

/// Registration flags for [`Counter::find_or_create_with`].
#[derive(Clone)]
pub struct CounterOptions {
    pub use_delta: bool,
    pub storage: CounterStorage,
    pub is_hidden: bool,
    pub converter: Option<CounterValueConverter>,
}

impl Default for CounterOptions {
    fn default() -> Self {
        Self {
            use_delta: true,
            storage: CounterStorage::LogAndTable,
            is_hidden: false,
            converter: None,
        }
    }
}

impl CounterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delta(mut self, use_delta: bool) -> Self {
        self.use_delta = use_delta;
        self
    }

    pub fn with_storage(mut self, storage: CounterStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }

    pub fn with_converter(mut self, converter: impl Fn(i64) -> i64 + Send + Sync + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }
}

impl fmt::Debug for CounterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterOptions")
            .field("use_delta", &self.use_delta)
            .field("storage", &self.storage)
            .field("is_hidden", &self.is_hidden)
            .field("converter", &self.converter.is_some())
            .finish()
    }
}


/// A named, sharded, monotonic or signed counter.
///
/// Obtain one with [`Counter::find_or_create`] once and cache the `Arc`; the
/// registry lookup is not meant for the hot path.
pub struct Counter {
    id: usize,
    name: StatisticName,
    use_delta: bool,
    storage: CounterStorage,
    is_hidden: bool,
    converter: Option<CounterValueConverter>,
    shards: Mutex<Vec<Arc<AtomicI64>>>,
    fallback: AtomicI64,
    /// Value at the last reset; `None` until the first reset.
    last_reset: Mutex<Option<i64>>,
}

/// Adds to a shard that only the calling thread writes.
#[inline]
fn add_owned(shard: &AtomicI64, n: i64) {
    let current = shard.load(Ordering::Relaxed);
    shard.store(current.wrapping_add(n), Ordering::Relaxed);
}

fn registry() -> &'static Registry<Counter> {
    static REGISTRY: OnceLock<Registry<Counter>> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new("counter"))
}

impl Counter {
    fn new(name: StatisticName, options: CounterOptions) -> Self {
        Self {
            id: NEXT_COUNTER_ID.fetch_add(1, Ordering::Relaxed),
            name,
            use_delta: options.use_delta,
            storage: options.storage,
            is_hidden: options.is_hidden,
            converter: options.converter,
            shards: Mutex::new(Vec::new()),
            fallback: AtomicI64::new(0),
            last_reset: Mutex::new(None),
        }
    }

    /// Finds or registers a delta-tracked, `LogAndTable`, visible counter.
    pub fn find_or_create(name: impl Into<StatisticName>) -> Arc<Counter> {
        Self::find_or_create_with(name, CounterOptions::default())
    }

    /// Finds or registers a counter with explicit flags.
    ///
    /// Registration is idempotent by name. When the name is already registered
    /// the existing instance is returned and differing flags are ignored; the
    /// first registration wins.
    pub fn find_or_create_with(name: impl Into<StatisticName>, options: CounterOptions) -> Arc<Counter> {
        let name = name.into();
        let (counter, created) = registry().find_or_insert_with(&name, || {
            Counter::new(name.clone(), options.clone())
        });
        if !created && !counter.matches(&options) {
            warn!(
                "Counter {} re-registered with different flags {:?}; keeping use_delta={}, storage={:?}, hidden={}",
                name, options, counter.use_delta, counter.storage, counter.is_hidden
            );
        }
        counter
    }

    pub fn find(name: &str) -> Option<Arc<Counter>> {
        registry().find(name)
    }

    /// Removes a counter from the registry. Handles already held keep working
    /// but are no longer reported.
    pub fn delete(name: &str) -> bool {
        registry().remove(name).is_some()
    }

    /// Every registered counter, hidden ones included.
    pub fn all() -> Vec<Arc<Counter>> {
        registry().snapshot()
    }

    pub(crate) fn clear_registry() {
        registry().clear();
    }

    fn matches(&self, options: &CounterOptions) -> bool {
        self.use_delta == options.use_delta
            && self.storage == options.storage
            && self.is_hidden == options.is_hidden
    }

    pub fn name(&self) -> &StatisticName {
        &self.name
    }

    pub fn use_delta(&self) -> bool {
        self.use_delta
    }

    pub fn storage(&self) -> CounterStorage {
        self.storage
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    #[inline]
    pub fn increment(&self) {
        self.increment_by(1);
    }

    #[inline]
    pub fn decrement_by(&self, n: i64) {
        self.increment_by(n.wrapping_neg());
    }

    /// Adds `n` to the counter. Never takes a global lock; allocates only the
    /// first time a tracked thread touches this counter.
    #[inline]
    pub fn increment_by(&self, n: i64) {
        if is_current_thread_tracked() && self.add_to_local_shard(n) {
            return;
        }
        self.fallback.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    fn add_to_local_shard(&self, n: i64) -> bool {
        SHARDS
            .try_with(|shards| {
                if let Some(Some(shard)) = shards.borrow().get(self.id) {
                    add_owned(shard, n);
                    return;
                }
                let shard = self.allocate_shard();
                add_owned(&shard, n);
                let mut shards = shards.borrow_mut();
                if shards.len() <= self.id {
                    let capacity = (self.id + 1).next_power_of_two();
                    shards.resize(capacity, None);
                }
                shards[self.id] = Some(shard);
            })
            .is_ok()
    }

    #[cold]
    fn allocate_shard(&self) -> Arc<AtomicI64> {
        let shard = Arc::new(AtomicI64::new(0));
        self.shards
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(shard.clone());
        shard
    }

    /// Sum of all thread shards plus the shared fallback.
    pub fn get_current_value(&self) -> i64 {
        let shards = self.shards.lock().unwrap_or_else(PoisonError::into_inner);
        shards
            .iter()
            .fold(self.fallback.load(Ordering::Relaxed), |sum, shard| {
                sum.wrapping_add(shard.load(Ordering::Relaxed))
            })
    }

    /// Returns the current value and the change since the last
    /// [`reset_current`](Counter::reset_current). The delta is zero before the
    /// first reset and for counters registered without delta tracking.
    pub fn get_current_value_and_delta(&self) -> (i64, i64) {
        let current = self.get_current_value();
        if !self.use_delta {
            return (current, 0);
        }
        let last = *self.last_reset.lock().unwrap_or_else(PoisonError::into_inner);
        let delta = last.map_or(0, |last| current.wrapping_sub(last));
        (current, delta)
    }

    /// Makes the current value the baseline for the next delta.
    ///
    /// Call this only after the value has been published for the period.
    pub fn reset_current(&self) {
        let mut last = self.last_reset.lock().unwrap_or_else(PoisonError::into_inner);
        *last = Some(self.get_current_value());
    }

    fn convert(&self, value: i64) -> i64 {
        match &self.converter {
            Some(converter) => guarded(self.name.as_str(), || value, || converter(value)),
            None => value,
        }
    }

    #[cfg(test)]
    pub(crate) fn shard_count(&self) -> usize {
        self.shards.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("name", &self.name)
            .field("value", &self.get_current_value())
            .field("use_delta", &self.use_delta)
            .field("storage", &self.storage)
            .field("is_hidden", &self.is_hidden)
            .finish()
    }
}

impl ReportableStatistic for Counter {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn storage(&self) -> CounterStorage {
        self.storage
    }

    fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    fn is_value_delta(&self) -> bool {
        self.use_delta
    }

    fn value_string(&self) -> String {
        self.convert(self.get_current_value()).to_string()
    }

    fn delta_string(&self) -> String {
        let (_, delta) = self.get_current_value_and_delta();
        self.convert(delta).to_string()
    }

    fn display_string(&self) -> String {
        let (current, delta) = self.get_current_value_and_delta();
        if self.use_delta {
            format!(
                "{}={}, Delta={}",
                self.name,
                self.convert(current),
                self.convert(delta)
            )
        } else {
            format!("{}={}", self.name, self.convert(current))
        }
    }

    fn reset_current(&self) {
        Counter::reset_current(self);
    }
}
