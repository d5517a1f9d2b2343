// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

/// Kind of scheduling context a turn runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextType {
    /// No owning activation or system target.
    None,
    /// Runtime infrastructure.
    SystemTarget,
    /// An application actor activation.
    Activation,
}

/// Classifier the scheduler hands to the statistics group for every turn.
pub trait SchedulingContext: Send + Sync {
    fn context_type(&self) -> ContextType;

    /// Stable display name, used to build per-group statistic names.
    fn name(&self) -> &str;

    /// System-priority contexts are reported at a lower verbosity.
    fn is_system_priority(&self) -> bool {
        self.context_type() == ContextType::SystemTarget
    }
}

/// Plain-data [`SchedulingContext`] for callers without their own context type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingContextInfo {
    name: String,
    context_type: ContextType,
    system_priority: bool,
}

impl SchedulingContextInfo {
    pub fn activation(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context_type: ContextType::Activation,
            system_priority: false,
        }
    }

    pub fn system_target(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context_type: ContextType::SystemTarget,
            system_priority: true,
        }
    }

    /// Overrides the priority implied by the context type.
    pub fn with_system_priority(mut self, system_priority: bool) -> Self {
        self.system_priority = system_priority;
        self
    }
}

impl SchedulingContext for SchedulingContextInfo {
    fn context_type(&self) -> ContextType {
        self.context_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_system_priority(&self) -> bool {
        self.system_priority
    }
}

/// Turn classification used to pick the per-class counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TurnClass {
    Null,
    System,
    Application,
}

impl TurnClass {
    pub(crate) fn of(context: Option<&dyn SchedulingContext>) -> Self {
        match context.map(|context| context.context_type()) {
            None | Some(ContextType::None) => TurnClass::Null,
            Some(ContextType::SystemTarget) => TurnClass::System,
            Some(ContextType::Activation) => TurnClass::Application,
        }
    }
}
