use std::borrow::Cow;
use std::time::Duration;

/// Tunables for a [`FiberRoot`](crate::FiberRoot).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FiberConfig {
    /// A slice yields once the deadline reports less time than this.
    pub yield_threshold: Duration,
    /// Attribute prefix that marks event bindings, e.g. `onClick`.
    pub event_prefix: Cow<'static, str>,
}

impl Default for FiberConfig {
    fn default() -> Self {
        Self {
            yield_threshold: Duration::from_millis(1),
            event_prefix: Cow::Borrowed("on"),
        }
    }
}

impl FiberConfig {
    pub fn with_yield_threshold(mut self, threshold: Duration) -> Self {
        self.yield_threshold = threshold;
        self
    }

    pub fn with_event_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.event_prefix = prefix.into();
        self
    }

    /// Event name bound by a listener attribute: prefix stripped, lower-cased.
    pub fn event_name(&self, key: &str) -> String {
        key.strip_prefix(self.event_prefix.as_ref())
            .filter(|rest| !rest.is_empty())
            .unwrap_or(key)
            .to_lowercase()
    }
}
