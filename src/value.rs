// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Derived value statistics.
//!
//! A value statistic is a name plus an accessor closure evaluated only when the
//! statistic is read. The accessor and the optional converter run on the
//! reporting path; if either panics the kind's default value is reported.

use std::fmt;
use std::sync::{Arc, OnceLock};

use log::warn;

use crate::registry::Registry;
use crate::statistic::{guarded, CounterStorage, ReportableStatistic};
use crate::StatisticName;

/// Value types a [`ValueStatistic`] can expose. Each has its own registry.
pub trait ValueKind: Clone + Default + Send + Sync + 'static {
    #[doc(hidden)]
    fn registry() -> &'static Registry<ValueStatistic<Self>>;

    fn render(&self) -> String;
}

macro_rules! value_kind {
    ($ty:ty, $kind:literal, |$v:ident| $render:expr) => {
        impl ValueKind for $ty {
            fn registry() -> &'static Registry<ValueStatistic<Self>> {
                static REGISTRY: OnceLock<Registry<ValueStatistic<$ty>>> = OnceLock::new();
                REGISTRY.get_or_init(|| Registry::new($kind))
            }

            fn render(&self) -> String {
                let $v = self;
                $render
            }
        }
    };
}

value_kind!(f32, "float", |v| format!("{v:.3}"));
value_kind!(i64, "int", |v| v.to_string());
value_kind!(String, "string", |v| v.clone());

pub type FloatValueStatistic = ValueStatistic<f32>;
pub type IntValueStatistic = ValueStatistic<i64>;
pub type StringValueStatistic = ValueStatistic<String>;

type Accessor<T> = Arc<dyn Fn() -> T + Send + Sync>;
type Converter<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

pub struct ValueStatistic<T: ValueKind> {
    name: StatisticName,
    storage: CounterStorage,
    accessor: Accessor<T>,
    converter: Option<Converter<T>>,
}

impl<T: ValueKind> ValueStatistic<T> {
    /// Finds or registers a `LogAndTable` statistic reading from `accessor`.
    pub fn find_or_create(
        name: impl Into<StatisticName>,
        accessor: impl Fn() -> T + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::builder(name, accessor).register()
    }

    pub fn builder(
        name: impl Into<StatisticName>,
        accessor: impl Fn() -> T + Send + Sync + 'static,
    ) -> ValueStatisticBuilder<T> {
        ValueStatisticBuilder {
            name: name.into(),
            storage: CounterStorage::LogAndTable,
            accessor: Arc::new(accessor),
            converter: None,
        }
    }

    pub fn find(name: &str) -> Option<Arc<Self>> {
        T::registry().find(name)
    }

    pub fn delete(name: &str) -> bool {
        T::registry().remove(name).is_some()
    }

    pub fn all() -> Vec<Arc<Self>> {
        T::registry().snapshot()
    }

    pub(crate) fn clear_registry() {
        T::registry().clear();
    }

    pub fn name(&self) -> &StatisticName {
        &self.name
    }

    /// Evaluates the accessor, then the converter. Never panics.
    pub fn get_current_value(&self) -> T {
        let raw = guarded(self.name.as_str(), T::default, || (self.accessor)());
        match &self.converter {
            Some(converter) => {
                let fallback = raw.clone();
                guarded(self.name.as_str(), || fallback, || converter(raw))
            }
            None => raw,
        }
    }
}

impl<T: ValueKind> fmt::Debug for ValueStatistic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueStatistic")
            .field("name", &self.name)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl<T: ValueKind> ReportableStatistic for ValueStatistic<T> {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn storage(&self) -> CounterStorage {
        self.storage
    }

    fn value_string(&self) -> String {
        self.get_current_value().render()
    }
}

/// Configures a [`ValueStatistic`] before registering it.
pub struct ValueStatisticBuilder<T: ValueKind> {
    name: StatisticName,
    storage: CounterStorage,
    accessor: Accessor<T>,
    converter: Option<Converter<T>>,
}

impl<T: ValueKind> ValueStatisticBuilder<T> {
    pub fn storage(mut self, storage: CounterStorage) -> Self {
        self.storage = storage;
        self
    }

    /// A display-time transform, e.g. ticks to milliseconds.
    pub fn converter(mut self, converter: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// Registers the statistic, or returns the one already registered under
    /// the same name. A differing storage mode is logged and ignored.
    pub fn register(self) -> Arc<ValueStatistic<T>> {
        let name = self.name.clone();
        let storage = self.storage;
        let (statistic, created) = T::registry().find_or_insert_with(&name, || self.build());
        if !created && statistic.storage != storage {
            warn!(
                "Value statistic {} re-registered with storage {:?}; keeping {:?}",
                name, storage, statistic.storage
            );
        }
        statistic
    }

    /// Builds a statistic that is not registered anywhere, for report-time
    /// synthetic values.
    pub fn detached(self) -> Arc<ValueStatistic<T>> {
        Arc::new(self.build())
    }

    fn build(self) -> ValueStatistic<T> {
        ValueStatistic {
            name: self.name,
            storage: self.storage,
            accessor: self.accessor,
            converter: self.converter,
        }
    }
}
