//! Runtime configuration.
//!
//! Resolution order, highest priority first: explicit builder overrides,
//! then environment variables, then the defaults below.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub embedding_api_key: Option<String>,
    pub embedding_endpoint: Option<String>,
    pub provider_auto_update_disabled: bool,
    /// Threaded through for interface completeness with the wider
    /// environment-variable contract; this engine has no shell-helper
    /// surface of its own, so it has no effect beyond being readable back.
    pub core_utils: Option<String>,

    pub debounce_delay: Duration,
    pub batch_size: usize,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub embedding_timeout: Duration,
    pub embedding_max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".codeindex/index.db"),
            embedding_api_key: None,
            embedding_endpoint: None,
            provider_auto_update_disabled: false,
            core_utils: None,
            debounce_delay: Duration::from_secs(2),
            batch_size: 10,
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 10_000,
            embedding_timeout: Duration::from_secs(60),
            embedding_max_retries: 3,
        }
    }
}

impl Config {
    /// Build a `Config` from `Default`, overridden by whichever of the
    /// recognised environment variables are set.
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    fn merge_env(mut self) -> Self {
        if let Ok(path) = std::env::var("DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            self.embedding_api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("EMBEDDING_ENDPOINT") {
            self.embedding_endpoint = Some(endpoint);
        }
        if let Ok(flag) = std::env::var("CODEINDEX_PROVIDER_AUTO_UPDATE_DISABLED") {
            self.provider_auto_update_disabled = parse_bool(&flag);
        }
        if let Ok(core_utils) = std::env::var("CODEINDEX_CORE_UTILS") {
            self.core_utils = Some(core_utils);
        }
        self
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.debounce_delay, Duration::from_secs(2));
        assert_eq!(cfg.embedding_max_retries, 3);
    }

    #[test]
    fn parses_truthy_bool_variants() {
        for s in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_bool(s), "{s} should be truthy");
        }
        for s in ["0", "false", "", "nah"] {
            assert!(!parse_bool(s), "{s} should be falsy");
        }
    }
}
