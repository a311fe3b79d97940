use std::time::Duration;

/// When the daemon may run collection passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSettings {
    /// whether passes run at all; a disabled daemon keeps every formula
    pub enabled: bool,
    /// least time between two scheduled passes; explicit
    /// [`Daemon::collect`](crate::Daemon::collect) calls ignore it
    pub min_interval: Duration,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval: Duration::ZERO,
        }
    }
}

impl CollectorSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_min_interval(self, min_interval: Duration) -> Self {
        Self {
            min_interval,
            ..self
        }
    }
}
