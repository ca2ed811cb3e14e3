use std::time::Duration;

const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_VERIFY_ATTEMPTS: u32 = 3;
const DEFAULT_VERIFY_BACKOFF: Duration = Duration::from_millis(50);

/// Tuning of the orchestrator's calls into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound on a single ledger call. A call that takes longer has an unknown outcome.
    pub ledger_timeout: Duration,
    /// Rounds of verification spent on an unknown outcome before giving up on it.
    pub verify_attempts: u32,
    /// Pause before the first verification round, grows linearly with each round.
    pub verify_backoff: Duration
}

impl OrchestratorConfig {
    pub fn with_ledger_timeout(mut self, timeout: Duration) -> Self {
        self.ledger_timeout = timeout;
        self
    }

    pub fn with_verify_attempts(mut self, attempts: u32) -> Self {
        self.verify_attempts = attempts;
        self
    }

    pub fn with_verify_backoff(mut self, backoff: Duration) -> Self {
        self.verify_backoff = backoff;
        self
    }

    pub(crate) fn backoff(&self, round: u32) -> Duration {
        self.verify_backoff.saturating_mul(round)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            ledger_timeout: DEFAULT_LEDGER_TIMEOUT,
            verify_attempts: DEFAULT_VERIFY_ATTEMPTS,
            verify_backoff: DEFAULT_VERIFY_BACKOFF
        }
    }
}
