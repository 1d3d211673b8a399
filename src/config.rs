//! Environment-driven tunables for a run.
//!
//! Read once by the embedder into an [`EngineConfig`] and passed into
//! [`crate::engine::ImplementationLoop::new`]. There is no global/implicit
//! config singleton — each run constructs and owns its own config, the way
//! `krusty-core`'s orchestrator takes an explicit `OrchestratorConfig`
//! rather than reading environment variables deep inside the loop.

use std::time::Duration;

/// Recognized configuration keys (§6). Values below are the documented
/// defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// `NAVIGATOR_MAX_TURNS` — cap on Navigator turns per session.
    pub navigator_max_turns: usize,
    /// `DRIVER_MAX_TURNS` — cap on Driver turns per batch.
    pub driver_max_turns: usize,
    /// `SESSION_HARD_LIMIT_MIN` — wall-clock deadline.
    pub session_hard_limit: Duration,
    /// `PERMISSION_TIMEOUT_MS` — per-permission-request timeout.
    pub permission_timeout: Duration,
    /// `REVIEW_DISPLAY_TIMEOUT_MS` — max wait pairing a tool with its
    /// review for display.
    pub review_display_timeout: Duration,
    /// `MAX_PROMPT_LENGTH` — upper bound on initial task length, in bytes.
    pub max_prompt_length: usize,
    /// `NAVIGATOR_EMPTY_BATCH_RETRIES` — retries before the EXECUTING
    /// fallback.
    pub navigator_empty_batch_retries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            navigator_max_turns: 50,
            driver_max_turns: 20,
            session_hard_limit: Duration::from_secs(30 * 60),
            permission_timeout: Duration::from_millis(15_000),
            review_display_timeout: Duration::from_millis(2_000),
            max_prompt_length: 10_000,
            navigator_empty_batch_retries: 5,
        }
    }
}

impl EngineConfig {
    /// Build a config from environment variables, falling back to the
    /// documented default for any key that is absent or fails to parse.
    /// A malformed value is logged, never a hard error.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            navigator_max_turns: env_usize("NAVIGATOR_MAX_TURNS", defaults.navigator_max_turns),
            driver_max_turns: env_usize("DRIVER_MAX_TURNS", defaults.driver_max_turns),
            session_hard_limit: env_minutes(
                "SESSION_HARD_LIMIT_MIN",
                defaults.session_hard_limit,
            ),
            permission_timeout: env_millis("PERMISSION_TIMEOUT_MS", defaults.permission_timeout),
            review_display_timeout: env_millis(
                "REVIEW_DISPLAY_TIMEOUT_MS",
                defaults.review_display_timeout,
            ),
            max_prompt_length: env_usize("MAX_PROMPT_LENGTH", defaults.max_prompt_length),
            navigator_empty_batch_retries: env_usize(
                "NAVIGATOR_EMPTY_BATCH_RETRIES",
                defaults.navigator_empty_batch_retries,
            ),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, raw, "malformed config value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                tracing::warn!(key, raw, "malformed config value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_minutes(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<f64>() {
            Ok(min) if min.is_finite() && min >= 0.0 => Duration::from_secs_f64(min * 60.0),
            _ => {
                tracing::warn!(key, raw, "malformed config value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.navigator_max_turns, 50);
        assert_eq!(cfg.driver_max_turns, 20);
        assert_eq!(cfg.session_hard_limit, Duration::from_secs(1800));
        assert_eq!(cfg.permission_timeout, Duration::from_millis(15_000));
        assert_eq!(cfg.review_display_timeout, Duration::from_millis(2_000));
        assert_eq!(cfg.max_prompt_length, 10_000);
        assert_eq!(cfg.navigator_empty_batch_retries, 5);
    }

    #[test]
    fn fractional_minutes_parse_to_sub_minute_durations() {
        let d = env_minutes("PAIRLOOP_TEST_DOES_NOT_EXIST", Duration::from_secs(1800));
        assert_eq!(d, Duration::from_secs(1800));
    }
}
