// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

#[derive(Debug)]
/// Represents errors that can occur in the rsstats crate.
///
/// Statistics are observational, so very few operations can fail. The ones that
/// do fail indicate a caller-side bug (an invalid argument on a hot-path call),
/// a misbehaving publisher, or a reporter that could not be shut down cleanly.
pub enum Error {
    /// A hot-path domain call received an argument it cannot attribute.
    InvalidArgument {
        /// Name of the operation that rejected the argument
        operation: &'static str,
        /// Additional context about the error
        details: String,
    },
    /// A statistics publisher failed to initialize or to report.
    Publisher {
        /// Additional context about the error
        details: String,
        /// The error returned by the publisher implementation
        source: anyhow::Error,
    },
    /// The periodic reporter could not be stopped cleanly.
    Shutdown {
        /// Additional context about the error
        details: String,
    },
    /// The final flush did not complete within the configured bound.
    ShutdownTimeout {
        /// The bound that was exceeded
        timeout: Duration,
    },
}

/// Implementation of the Display trait for Error enum.
///
/// Provides human-readable error messages for each error variant.
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArgument { operation, details } => {
                write!(f, "Invalid argument to {operation}: {details}")
            }
            Error::Publisher { details, source } => {
                write!(f, "Statistics publisher failed: {details}: {source}")
            }
            Error::Shutdown { details } => {
                write!(f, "Statistics reporter shutdown failed: {details}")
            }
            Error::ShutdownTimeout { timeout } => {
                write!(
                    f,
                    "Statistics reporter did not finish its final flush within {timeout:?}"
                )
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Publisher { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

/// A Result type specialized for rsstats operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let err = Error::InvalidArgument {
            operation: "on_turn_execution_starts_by_work_group",
            details: "scheduling context is missing".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("on_turn_execution_starts_by_work_group"));
        assert!(text.contains("scheduling context is missing"));
    }

    #[test]
    fn test_publisher_error_exposes_source() {
        let err = Error::Publisher {
            details: "report_stats".to_string(),
            source: anyhow::anyhow!("table unavailable"),
        };
        assert!(err.to_string().contains("table unavailable"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
