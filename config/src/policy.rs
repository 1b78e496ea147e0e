//! Orchestrator policy constants (spec §5), overridable via environment so
//! tests can shrink caps/timeouts without recompiling.

use std::time::Duration;

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default_secs: u64) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

/// Concurrency caps, retry caps, and timeouts used throughout `core`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Execute-phase worker pool cap (spec §5: 5).
    pub execute_concurrency: usize,
    /// Repair-phase worker pool cap, applied to each of its two ordered
    /// sub-passes (spec §5/§4.9: 3).
    pub repair_concurrency: usize,
    /// Spec §4.9: `MAX_REPAIR_RETRIES`.
    pub max_repair_retries: usize,
    /// Spec §4.9: `MAX_IMPORT_REPAIR_REGEN_ATTEMPTS`.
    pub max_import_repair_regen_attempts: usize,
    /// Spec §4.11: Executor's per-call LLM timeout.
    pub executor_timeout: Duration,
    /// Spec §5: package installer timeout.
    pub install_timeout: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            execute_concurrency: 5,
            repair_concurrency: 3,
            max_repair_retries: 6,
            max_import_repair_regen_attempts: 2,
            executor_timeout: Duration::from_secs(60),
            install_timeout: Duration::from_secs(120),
        }
    }
}

impl PolicyConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            execute_concurrency: env_usize("EXECUTE_CONCURRENCY", default.execute_concurrency),
            repair_concurrency: env_usize("REPAIR_CONCURRENCY", default.repair_concurrency),
            max_repair_retries: env_usize("MAX_REPAIR_RETRIES", default.max_repair_retries),
            max_import_repair_regen_attempts: env_usize(
                "MAX_IMPORT_REPAIR_REGEN_ATTEMPTS",
                default.max_import_repair_regen_attempts,
            ),
            executor_timeout: env_secs("EXECUTOR_TIMEOUT_SECS", default.executor_timeout.as_secs()),
            install_timeout: env_secs("INSTALL_TIMEOUT_SECS", default.install_timeout.as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.execute_concurrency, 5);
        assert_eq!(policy.repair_concurrency, 3);
        assert_eq!(policy.max_repair_retries, 6);
        assert_eq!(policy.max_import_repair_regen_attempts, 2);
        assert_eq!(policy.executor_timeout, Duration::from_secs(60));
        assert_eq!(policy.install_timeout, Duration::from_secs(120));
    }

    #[test]
    fn env_overrides_default() {
        std::env::set_var("CONFIG_TEST_POLICY_REPAIR_CONCURRENCY", "9");
        let v = env_usize("CONFIG_TEST_POLICY_REPAIR_CONCURRENCY", 3);
        std::env::remove_var("CONFIG_TEST_POLICY_REPAIR_CONCURRENCY");
        assert_eq!(v, 9);
    }
}
