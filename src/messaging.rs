// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Messaging Statistics Group
//!
//! Message and byte totals for the transport layer, split by direction, by
//! peer and by size. Per-peer counters are created on first use and cached.

use std::fmt;
use std::sync::Arc;

use log::debug;
use papaya::HashMap;

use crate::collector::{collection_level, StatisticsLevel};
use crate::counter::{Counter, CounterOptions};
use crate::error::{Error, Result};
use crate::histogram::HistogramValueStatistic;
use crate::name::StatisticNameFormat;
use crate::names;
use crate::statistic::CounterStorage;

/// Number of exponential buckets in the message size histograms.
pub const MESSAGE_SIZE_HISTOGRAM_BUCKETS: usize = 31;

/// Peer name used when a message has no known source or target.
const UNKNOWN_PEER: &str = "Null";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageDirection {
    Request,
    Response,
    OneWay,
}

impl MessageDirection {
    pub const ALL: [MessageDirection; 3] = [
        MessageDirection::Request,
        MessageDirection::Response,
        MessageDirection::OneWay,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageDirection::Request => "Request",
            MessageDirection::Response => "Response",
            MessageDirection::OneWay => "OneWay",
        };
        f.write_str(name)
    }
}

/// Where along its path a message was found to be expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpirationPhase {
    Send,
    Receive,
    Dispatch,
    Invoke,
    Respond,
}

impl ExpirationPhase {
    pub const ALL: [ExpirationPhase; 5] = [
        ExpirationPhase::Send,
        ExpirationPhase::Receive,
        ExpirationPhase::Dispatch,
        ExpirationPhase::Invoke,
        ExpirationPhase::Respond,
    ];
}

impl fmt::Display for ExpirationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpirationPhase::Send => "Send",
            ExpirationPhase::Receive => "Receive",
            ExpirationPhase::Dispatch => "Dispatch",
            ExpirationPhase::Invoke => "Invoke",
            ExpirationPhase::Respond => "Respond",
        };
        f.write_str(name)
    }
}

fn per_direction(format: StatisticNameFormat) -> [Arc<Counter>; 3] {
    MessageDirection::ALL.map(|direction| Counter::find_or_create(format.with(direction)))
}

fn checked_bytes(operation: &'static str, what: &str, bytes: i64) -> Result<i64> {
    if bytes < 0 {
        return Err(Error::InvalidArgument {
            operation,
            details: format!("{what} must not be negative, got {bytes}"),
        });
    }
    Ok(bytes)
}

/// Counters for one direction of traffic (sent or received).
struct TrafficCounters {
    messages: Arc<Counter>,
    per_direction: [Arc<Counter>; 3],
    total_bytes: Arc<Counter>,
    header_bytes: Arc<Counter>,
    size_histogram: Arc<HistogramValueStatistic>,
    per_peer_format: StatisticNameFormat,
    per_peer: HashMap<String, Arc<Counter>>,
}

impl TrafficCounters {
    fn new(
        messages: &str,
        per_direction_format: StatisticNameFormat,
        total_bytes: &str,
        header_bytes: &str,
        histogram: &str,
        per_peer_format: StatisticNameFormat,
    ) -> Self {
        Self {
            messages: Counter::find_or_create(messages),
            per_direction: per_direction(per_direction_format),
            total_bytes: Counter::find_or_create(total_bytes),
            header_bytes: Counter::find_or_create(header_bytes),
            size_histogram: HistogramValueStatistic::create_exponential(
                histogram,
                MESSAGE_SIZE_HISTOGRAM_BUCKETS,
            ),
            per_peer_format,
            per_peer: HashMap::new(),
        }
    }

    fn record(
        &self,
        peer: Option<&str>,
        direction: MessageDirection,
        count: usize,
        total_bytes: i64,
        header_bytes: i64,
    ) {
        let count = count as i64;
        self.messages.increment_by(count);
        self.per_direction[direction.index()].increment_by(count);
        self.total_bytes.increment_by(total_bytes);
        self.header_bytes.increment_by(header_bytes);
        self.size_histogram.add_data(total_bytes);
        self.peer_counter(peer.unwrap_or(UNKNOWN_PEER)).increment_by(count);
    }

    fn peer_counter(&self, peer: &str) -> Arc<Counter> {
        let cache = self.per_peer.pin();
        if let Some(counter) = cache.get(peer) {
            return counter.clone();
        }
        let counter = Counter::find_or_create_with(
            self.per_peer_format.with(peer),
            CounterOptions::new().with_storage(CounterStorage::LogOnly),
        );
        cache.get_or_insert(peer.to_string(), counter).clone()
    }
}

struct MessagingCounters {
    sent: TrafficCounters,
    received: TrafficCounters,
    failed: [Arc<Counter>; 3],
    dropped: [Arc<Counter>; 3],
    rejected: [Arc<Counter>; 3],
    rerouted: [Arc<Counter>; 3],
    expired: [Arc<Counter>; 5],
}

/// Messaging statistics. Every call is a no-op when messaging statistics are
/// disabled at the level given to [`init`](MessagingStatisticsGroup::init).
pub struct MessagingStatisticsGroup {
    counters: Option<MessagingCounters>,
}

impl MessagingStatisticsGroup {
    pub fn init_from_policy() -> Arc<Self> {
        Self::init(collection_level())
    }

    pub fn init(level: StatisticsLevel) -> Arc<Self> {
        let counters = level.collect_messaging_stats().then(|| MessagingCounters {
            sent: TrafficCounters::new(
                names::MESSAGING_SENT_MESSAGES_TOTAL,
                names::MESSAGING_SENT_MESSAGES_PER_DIRECTION,
                names::MESSAGING_SENT_BYTES_TOTAL,
                names::MESSAGING_SENT_BYTES_HEADER,
                names::MESSAGING_SENT_MESSAGESIZEHISTOGRAM,
                names::MESSAGING_SENT_MESSAGES_PER_TARGET,
            ),
            received: TrafficCounters::new(
                names::MESSAGING_RECEIVED_MESSAGES_TOTAL,
                names::MESSAGING_RECEIVED_MESSAGES_PER_DIRECTION,
                names::MESSAGING_RECEIVED_BYTES_TOTAL,
                names::MESSAGING_RECEIVED_BYTES_HEADER,
                names::MESSAGING_RECEIVED_MESSAGESIZEHISTOGRAM,
                names::MESSAGING_RECEIVED_MESSAGES_PER_SOURCE,
            ),
            failed: per_direction(names::MESSAGING_SENT_FAILED_PER_DIRECTION),
            dropped: per_direction(names::MESSAGING_SENT_DROPPED_PER_DIRECTION),
            rejected: per_direction(names::MESSAGING_REJECTED_PER_DIRECTION),
            rerouted: per_direction(names::MESSAGING_REROUTED_PER_DIRECTION),
            expired: ExpirationPhase::ALL
                .map(|phase| Counter::find_or_create(names::MESSAGING_EXPIRED_PER_PHASE.with(phase))),
        });
        debug!("Messaging statistics initialized at level {level}");
        Arc::new(Self { counters })
    }

    pub fn is_enabled(&self) -> bool {
        self.counters.is_some()
    }

    /// Records one message sent to `target`.
    pub fn on_message_send(
        &self,
        target: Option<&str>,
        direction: MessageDirection,
        total_bytes: i64,
        header_bytes: i64,
    ) -> Result<()> {
        self.on_message_batch_send(target, direction, total_bytes, header_bytes, 1)
    }

    /// Records `count` messages sent to `target` in one batch of `total_bytes`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if either byte count is negative. Nothing is
    /// recorded in that case.
    pub fn on_message_batch_send(
        &self,
        target: Option<&str>,
        direction: MessageDirection,
        total_bytes: i64,
        header_bytes: i64,
        count: usize,
    ) -> Result<()> {
        let total_bytes = checked_bytes("on_message_send", "total bytes", total_bytes)?;
        let header_bytes = checked_bytes("on_message_send", "header bytes", header_bytes)?;
        if let Some(counters) = &self.counters {
            counters
                .sent
                .record(target, direction, count, total_bytes, header_bytes);
        }
        Ok(())
    }

    /// Records one message received from `source`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if either byte count is negative.
    pub fn on_message_receive(
        &self,
        source: Option<&str>,
        direction: MessageDirection,
        header_bytes: i64,
        body_bytes: i64,
    ) -> Result<()> {
        let header_bytes = checked_bytes("on_message_receive", "header bytes", header_bytes)?;
        let body_bytes = checked_bytes("on_message_receive", "body bytes", body_bytes)?;
        if let Some(counters) = &self.counters {
            counters.received.record(
                source,
                direction,
                1,
                header_bytes.saturating_add(body_bytes),
                header_bytes,
            );
        }
        Ok(())
    }

    pub fn on_message_expired(&self, phase: ExpirationPhase) {
        if let Some(counters) = &self.counters {
            counters.expired[phase as usize].increment();
        }
    }

    pub fn on_failed_sent_message(&self, direction: MessageDirection) {
        if let Some(counters) = &self.counters {
            counters.failed[direction.index()].increment();
        }
    }

    pub fn on_dropped_sent_message(&self, direction: MessageDirection) {
        if let Some(counters) = &self.counters {
            counters.dropped[direction.index()].increment();
        }
    }

    pub fn on_rejected_message(&self, direction: MessageDirection) {
        if let Some(counters) = &self.counters {
            counters.rejected[direction.index()].increment();
        }
    }

    pub fn on_message_reroute(&self, direction: MessageDirection) {
        if let Some(counters) = &self.counters {
            counters.rerouted[direction.index()].increment();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Message totals are process-wide; keep these tests serial.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn value(name: &str) -> i64 {
        Counter::find(name).map_or(0, |c| c.get_current_value())
    }

    #[test]
    fn test_send_updates_totals_and_peer() {
        let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let group = MessagingStatisticsGroup::init(StatisticsLevel::Info);
        let sent = value(names::MESSAGING_SENT_MESSAGES_TOTAL);
        let bytes = value(names::MESSAGING_SENT_BYTES_TOTAL);
        let requests = value("Messaging.Sent.Messages.Request");

        group
            .on_message_send(Some("Test.Silo-1"), MessageDirection::Request, 100, 20)
            .unwrap();
        group
            .on_message_batch_send(Some("Test.Silo-1"), MessageDirection::Request, 300, 40, 3)
            .unwrap();

        assert_eq!(value(names::MESSAGING_SENT_MESSAGES_TOTAL) - sent, 4);
        assert_eq!(value(names::MESSAGING_SENT_BYTES_TOTAL) - bytes, 400);
        assert_eq!(value("Messaging.Sent.Messages.Request") - requests, 4);

        let peer = Counter::find("Messaging.Sent.Messages.To.Test.Silo-1").unwrap();
        assert_eq!(peer.get_current_value(), 4);
        assert_eq!(peer.storage(), CounterStorage::LogOnly);
    }

    #[test]
    fn test_negative_bytes_are_rejected_before_counting() {
        let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let group = MessagingStatisticsGroup::init(StatisticsLevel::Info);
        let received = value(names::MESSAGING_RECEIVED_MESSAGES_TOTAL);

        let err = group
            .on_message_receive(Some("Test.Silo-2"), MessageDirection::OneWay, -1, 10)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(group
            .on_message_send(None, MessageDirection::OneWay, 10, -5)
            .is_err());
        assert_eq!(value(names::MESSAGING_RECEIVED_MESSAGES_TOTAL), received);
    }

    #[test]
    fn test_unknown_peer_is_counted_as_null() {
        let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let group = MessagingStatisticsGroup::init(StatisticsLevel::Info);
        let before = value("Messaging.Received.Messages.From.Null");
        group
            .on_message_receive(None, MessageDirection::Response, 10, 90)
            .unwrap();
        assert_eq!(value("Messaging.Received.Messages.From.Null") - before, 1);
    }

    #[test]
    fn test_expired_counters_per_phase() {
        let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let group = MessagingStatisticsGroup::init(StatisticsLevel::Info);
        let before = value("Messaging.Expired.AtInvoke");
        group.on_message_expired(ExpirationPhase::Invoke);
        group.on_message_expired(ExpirationPhase::Invoke);
        assert_eq!(value("Messaging.Expired.AtInvoke") - before, 2);
    }

    #[test]
    fn test_rejected_and_rerouted_per_direction() {
        let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let group = MessagingStatisticsGroup::init(StatisticsLevel::Info);
        let rejected = value("Messaging.Rejected.Request");
        let rejected_other = value("Messaging.Rejected.Response");
        let rerouted = value("Messaging.Rerouted.OneWay");

        group.on_rejected_message(MessageDirection::Request);
        group.on_rejected_message(MessageDirection::Request);
        group.on_message_reroute(MessageDirection::OneWay);

        assert_eq!(value("Messaging.Rejected.Request") - rejected, 2);
        assert_eq!(value("Messaging.Rejected.Response"), rejected_other);
        assert_eq!(value("Messaging.Rerouted.OneWay") - rerouted, 1);
    }

    #[test]
    fn test_off_level_records_nothing() {
        let group = MessagingStatisticsGroup::init(StatisticsLevel::Off);
        assert!(!group.is_enabled());
        group
            .on_message_send(Some("Test.Silo-Off"), MessageDirection::Request, 1, 1)
            .unwrap();
        assert!(Counter::find("Messaging.Sent.Messages.To.Test.Silo-Off").is_none());
    }
}
