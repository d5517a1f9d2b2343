// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use log::Level;

/// Destination for formatted statistics log records.
///
/// The report pipeline calls [`log`](LogSink::log) once per flushed buffer,
/// so `message` may span many lines.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, category: &str, message: &str);
}

/// Forwards records to the `log` facade, using `category` as the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacadeSink;

impl LogSink for LogFacadeSink {
    fn log(&self, level: Level, category: &str, message: &str) {
        log::log!(target: category, level, "{message}");
    }
}

impl<F> LogSink for F
where
    F: Fn(Level, &str, &str) + Send + Sync,
{
    fn log(&self, level: Level, category: &str, message: &str) {
        self(level, category, message)
    }
}
