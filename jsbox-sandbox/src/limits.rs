//! Execution limits for sandboxed scripts

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits applied by the coordinator before and during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Timeout applied when the caller does not pass one
    #[serde(default = "ExecutionLimits::default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Upper bound for caller-supplied timeouts
    #[serde(default = "ExecutionLimits::default_max_timeout_ms")]
    pub max_timeout_ms: u64,

    /// Maximum script length in characters
    #[serde(default = "ExecutionLimits::default_max_code_size")]
    pub max_code_size: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            default_timeout_ms: Self::default_timeout_ms(),
            max_timeout_ms: Self::default_max_timeout_ms(),
            max_code_size: Self::default_max_code_size(),
        }
    }
}

impl ExecutionLimits {
    pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
    pub const MAX_TIMEOUT_MS: u64 = 300_000;
    pub const MAX_CODE_SIZE: usize = 1_000_000;

    fn default_timeout_ms() -> u64 {
        Self::DEFAULT_TIMEOUT_MS
    }

    fn default_max_timeout_ms() -> u64 {
        Self::MAX_TIMEOUT_MS
    }

    fn default_max_code_size() -> usize {
        Self::MAX_CODE_SIZE
    }

    /// Resolve a caller-supplied timeout; over-long values are clamped.
    /// `None` is returned for a zero timeout.
    pub fn effective_timeout(&self, requested_ms: Option<u64>) -> Option<Duration> {
        match requested_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms.min(self.max_timeout_ms))),
            None => Some(Duration::from_millis(
                self.default_timeout_ms.min(self.max_timeout_ms),
            )),
        }
    }

    /// Length check in characters. The byte length bounds the char count
    /// from above, so the char walk only happens for long inputs.
    pub fn exceeds_code_size(&self, code: &str) -> Option<usize> {
        if code.len() <= self.max_code_size {
            return None;
        }
        let chars = code.chars().count();
        (chars > self.max_code_size).then_some(chars)
    }
}
