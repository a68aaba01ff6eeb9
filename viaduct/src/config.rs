//! Engine configuration.

use std::time::Duration;

/// Per-engine execution settings.
///
/// Scheduling parallelism is the host runtime's concern: the engine drives
/// its work as one future, so worker threads are whatever the runtime the
/// future is spawned on provides. Log verbosity is likewise the host's
/// `tracing` subscriber.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    /// Deadline for a whole request.
    ///
    /// When hit, the request's task group is cancelled with a timeout reason
    /// and still-running fields degrade into field errors. Requires a tokio
    /// runtime; with no timeout configured the engine never touches a
    /// runtime clock.
    pub timeout: Option<Duration>,
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reads configuration from the environment.
    ///
    /// `VIADUCT_TIMEOUT_MS` sets the per-request timeout in milliseconds;
    /// unset or unparseable values leave the default.
    pub fn from_env() -> Self {
        let timeout = std::env::var("VIADUCT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis);

        Self { timeout }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::EngineConfig;

    #[test]
    fn builder_sets_timeout() {
        let config = EngineConfig::new().with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout, Some(Duration::from_millis(250)));
        assert_eq!(EngineConfig::default().timeout, None);
    }
}
