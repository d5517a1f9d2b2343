// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Well-known statistic names.
//!
//! Plain names are `&'static str` and convert into [`StatisticName`](crate::StatisticName)
//! wherever one is expected. Per-entity names are [`StatisticNameFormat`]s.

use crate::StatisticNameFormat;

// Queues
pub const QUEUES_QUEUE_SIZE_AVERAGE_PER_QUEUE: StatisticNameFormat =
    StatisticNameFormat::new("Queues.QueueSize.Average.{0}");
pub const QUEUES_QUEUE_SIZE_INSTANTANEOUS_PER_QUEUE: StatisticNameFormat =
    StatisticNameFormat::new("Queues.QueueSize.Instantaneous.{0}");
pub const QUEUES_ENQUEUED_PER_QUEUE: StatisticNameFormat =
    StatisticNameFormat::new("Queues.EnQueued.{0}");
pub const QUEUES_AVERAGE_ARRIVAL_RATE_PER_QUEUE: StatisticNameFormat =
    StatisticNameFormat::new("Queues.AverageArrivalRate.RequestsPerSecond.{0}");
pub const QUEUES_TIME_IN_QUEUE_AVERAGE_MILLIS_PER_QUEUE: StatisticNameFormat =
    StatisticNameFormat::new("Queues.TimeInQueue.Average.Milliseconds.{0}");
pub const QUEUES_TIME_IN_QUEUE_TOTAL_MILLIS_PER_QUEUE: StatisticNameFormat =
    StatisticNameFormat::new("Queues.TimeInQueue.Total.Milliseconds.{0}");
/// Suffix used for the cross-queue shared wait-time statistics.
pub const ALL_QUEUES: &str = "AllQueues";

// Scheduler
pub const SCHEDULER_TURNSEXECUTED_APPLICATION_BYALLWORKERTHREADS: &str =
    "Scheduler.TurnsExecuted.Application.ByAllWorkerThreads";
pub const SCHEDULER_TURNSEXECUTED_APPLICATION_BYALLWORKITEMGROUPS: &str =
    "Scheduler.TurnsExecuted.Application.ByAllWorkItemGroups";
pub const SCHEDULER_TURNSEXECUTED_APPLICATION_PERTHREAD: StatisticNameFormat =
    StatisticNameFormat::new("Scheduler.TurnsExecuted.Application.ByThread.{0}");
pub const SCHEDULER_TURNSEXECUTED_SYSTEM_BYALLWORKERTHREADS: &str =
    "Scheduler.TurnsExecuted.System.ByAllWorkerThreads";
pub const SCHEDULER_TURNSEXECUTED_SYSTEM_BYALLWORKITEMGROUPS: &str =
    "Scheduler.TurnsExecuted.System.ByAllWorkItemGroups";
pub const SCHEDULER_TURNSEXECUTED_SYSTEM_PERTHREAD: StatisticNameFormat =
    StatisticNameFormat::new("Scheduler.TurnsExecuted.System.ByThread.{0}");
pub const SCHEDULER_TURNSEXECUTED_NULL_BYALLWORKERTHREADS: &str =
    "Scheduler.TurnsExecuted.Null.ByAllWorkerThreads";
pub const SCHEDULER_TURNSEXECUTED_NULL_PERTHREAD: StatisticNameFormat =
    StatisticNameFormat::new("Scheduler.TurnsExecuted.Null.ByThread.{0}");
pub const SCHEDULER_TURNSEXECUTED_TOTAL_START: &str = "Scheduler.TurnsExecuted.Total.Start";
pub const SCHEDULER_TURNSEXECUTED_TOTAL_END: &str = "Scheduler.TurnsExecuted.Total.End";
pub const SCHEDULER_ACTIVATION_TURNSEXECUTED_PERACTIVATION: StatisticNameFormat =
    StatisticNameFormat::new("Scheduler.Activation.TurnsExecuted.ByActivation.{0}");
pub const SCHEDULER_ACTIVATION_STATUS_PERACTIVATION: StatisticNameFormat =
    StatisticNameFormat::new("Scheduler.Activation.Status.ByActivation.{0}");
pub const SCHEDULER_TURN_LENGTH_HISTOGRAM: &str = "Scheduler.TurnLengthHistogram";
pub const SCHEDULER_PENDINGWORKITEMS: &str = "Scheduler.PendingWorkItems";
pub const SCHEDULER_WORKITEMGROUP_COUNT: &str = "Scheduler.WorkItemGroupCount";
pub const SCHEDULER_NUM_LONG_RUNNING_TURNS: &str = "Scheduler.NumLongRunningTurns";
pub const SCHEDULER_NUM_LONG_QUEUE_WAIT_TIMES: &str = "Scheduler.NumLongQueueWaitTimes";
pub const SCHEDULER_ITEMS_ENQUEUED_TOTAL: &str = "Scheduler.Items.EnQueued";
pub const SCHEDULER_ITEMS_DEQUEUED_TOTAL: &str = "Scheduler.Items.DeQueued";
pub const SCHEDULER_ITEMS_DROPPED_TOTAL: &str = "Scheduler.Items.Dropped";
pub const SCHEDULER_CLOSURE_WORK_ITEMS_CREATED: &str = "Scheduler.ClosureWorkItems.Created";
pub const SCHEDULER_CLOSURE_WORK_ITEMS_EXECUTED: &str = "Scheduler.ClosureWorkItems.Executed";

// Messaging
pub const MESSAGING_SENT_MESSAGES_TOTAL: &str = "Messaging.Sent.Messages.Total";
pub const MESSAGING_SENT_MESSAGES_PER_DIRECTION: StatisticNameFormat =
    StatisticNameFormat::new("Messaging.Sent.Messages.{0}");
pub const MESSAGING_SENT_MESSAGES_PER_TARGET: StatisticNameFormat =
    StatisticNameFormat::new("Messaging.Sent.Messages.To.{0}");
pub const MESSAGING_SENT_BYTES_TOTAL: &str = "Messaging.Sent.Bytes.Total";
pub const MESSAGING_SENT_BYTES_HEADER: &str = "Messaging.Sent.Bytes.Header";
pub const MESSAGING_SENT_MESSAGESIZEHISTOGRAM: &str = "Messaging.Sent.MessageSizeHistogram.Bytes";
pub const MESSAGING_RECEIVED_MESSAGES_TOTAL: &str = "Messaging.Received.Messages.Total";
pub const MESSAGING_RECEIVED_MESSAGES_PER_DIRECTION: StatisticNameFormat =
    StatisticNameFormat::new("Messaging.Received.Messages.{0}");
pub const MESSAGING_RECEIVED_MESSAGES_PER_SOURCE: StatisticNameFormat =
    StatisticNameFormat::new("Messaging.Received.Messages.From.{0}");
pub const MESSAGING_RECEIVED_BYTES_TOTAL: &str = "Messaging.Received.Bytes.Total";
pub const MESSAGING_RECEIVED_BYTES_HEADER: &str = "Messaging.Received.Bytes.Header";
pub const MESSAGING_RECEIVED_MESSAGESIZEHISTOGRAM: &str =
    "Messaging.Received.MessageSizeHistogram.Bytes";
pub const MESSAGING_SENT_FAILED_PER_DIRECTION: StatisticNameFormat =
    StatisticNameFormat::new("Messaging.Sent.Failed.{0}");
pub const MESSAGING_SENT_DROPPED_PER_DIRECTION: StatisticNameFormat =
    StatisticNameFormat::new("Messaging.Sent.Dropped.{0}");
pub const MESSAGING_REJECTED_PER_DIRECTION: StatisticNameFormat =
    StatisticNameFormat::new("Messaging.Rejected.{0}");
pub const MESSAGING_REROUTED_PER_DIRECTION: StatisticNameFormat =
    StatisticNameFormat::new("Messaging.Rerouted.{0}");
pub const MESSAGING_EXPIRED_PER_PHASE: StatisticNameFormat =
    StatisticNameFormat::new("Messaging.Expired.At{0}");
