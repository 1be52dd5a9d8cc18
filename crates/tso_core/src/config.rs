//! Object store configuration.

use std::time::Duration;

/// Configuration for an object store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Longest a blocked `lock` sleeps before re-reading the header on its own.
    ///
    /// `None` waits purely for a wake notification or a priority interrupt.
    pub wake_check_interval: Option<Duration>,

    /// Maximum length in bytes of a name bound with `create`.
    pub name_max_len: usize,

    /// How long a transaction may run, measured on the store's clock from
    /// its start.
    ///
    /// A transaction past its deadline fails its next `lock` with
    /// `TimedOut`. Objects held by a transaction past its deadline may be
    /// taken over by any contender, which is how locks left behind by a
    /// vanished transaction are recovered.
    pub transaction_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wake_check_interval: None,
            name_max_len: 255,
            transaction_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the defensive wake check interval.
    #[must_use]
    pub const fn wake_check_interval(mut self, interval: Option<Duration>) -> Self {
        self.wake_check_interval = interval;
        self
    }

    /// Sets the maximum name length.
    #[must_use]
    pub const fn name_max_len(mut self, len: usize) -> Self {
        self.name_max_len = len;
        self
    }

    /// Sets the transaction timeout.
    #[must_use]
    pub const fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Returns the timeout in clock milliseconds, saturating.
    pub(crate) fn timeout_millis(&self) -> u64 {
        u64::try_from(self.transaction_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}
