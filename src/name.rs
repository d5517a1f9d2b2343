// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Immutable key under which a statistic is registered.
///
/// Equality and lookup are by the resolved string. A name is built either
/// directly from a string or by expanding a [`StatisticNameFormat`] with
/// positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatisticName(String);

impl StatisticName {
    pub fn new(name: impl Into<String>) -> Self {
        StatisticName(name.into())
    }

    /// Expands `format` by substituting `{0}`, `{1}`, ... with `args`.
    pub fn formatted(format: &StatisticNameFormat, args: &[&dyn fmt::Display]) -> Self {
        StatisticName(format.expand(args))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatisticName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatisticName {
    fn from(name: &str) -> Self {
        StatisticName::new(name)
    }
}

impl From<String> for StatisticName {
    fn from(name: String) -> Self {
        StatisticName(name)
    }
}

impl From<&StatisticName> for StatisticName {
    fn from(name: &StatisticName) -> Self {
        name.clone()
    }
}

impl AsRef<str> for StatisticName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A name template with positional `{N}` placeholders, such as
/// `"Scheduler.TurnsExecuted.Application.ByThread.{0}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticNameFormat(&'static str);

impl StatisticNameFormat {
    pub const fn new(template: &'static str) -> Self {
        StatisticNameFormat(template)
    }

    pub const fn template(&self) -> &'static str {
        self.0
    }

    /// Shorthand for [`StatisticName::formatted`] with a single argument.
    pub fn with(&self, arg: impl fmt::Display) -> StatisticName {
        StatisticName::formatted(self, &[&arg])
    }

    fn expand(&self, args: &[&dyn fmt::Display]) -> String {
        let template = self.0;
        let mut out = String::with_capacity(template.len() + 16);
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let placeholder = after
                .find('}')
                .and_then(|close| after[..close].parse::<usize>().ok().map(|idx| (idx, close)));

            match placeholder {
                Some((idx, close)) if idx < args.len() => {
                    out.push_str(&args[idx].to_string());
                    rest = &after[close + 1..];
                }
                // Unknown or unmatched placeholders are kept verbatim.
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}
