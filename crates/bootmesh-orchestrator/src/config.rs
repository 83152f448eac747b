//! Orchestrator configuration.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use bootmesh_consensus::ACTIVE_WINDOW_SECS;
use bootmesh_discovery::AccountName;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Actions per submitted chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 400;

/// Concurrent content downloads.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 10;

/// Account whose authority the boot node must relinquish.
pub const SYSTEM_ACCOUNT: &str = "eosio";

/// Configuration for one orchestration run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Content cache directory
    pub cache_dir: PathBuf,

    /// Local discovery document (YAML)
    pub my_discovery: PathBuf,

    /// Pin this account to the top of the order
    pub elect: Option<AccountName>,

    /// Replay and verify the chain when joining
    pub verify: bool,

    /// Single-node mode: no coordination chain, genesis typed in by the operator
    pub single: bool,

    /// Boot sequence file used instead of the agreed content
    pub boot_sequence_override: Option<PathBuf>,

    pub system_account: AccountName,

    /// Delay between checks in launch-block, replay and disablement polls
    pub poll_interval: Duration,

    /// Delay between genesis table checks
    pub genesis_poll_interval: Duration,

    /// Give up on a poll loop after this long. `None` waits forever.
    pub poll_timeout: Option<Duration>,

    pub retry: RetryPolicy,

    pub chunk_size: usize,

    /// Pause after the boot sequence so the chain can finalize it
    pub finalize_pause: Duration,

    /// Discovery rows older than this are inactive
    pub active_window_secs: u64,

    pub fetch_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./.bootmesh-cache"),
            my_discovery: PathBuf::from("./my_discovery_file.yaml"),
            elect: None,
            verify: true,
            single: false,
            boot_sequence_override: None,
            system_account: AccountName::from(SYSTEM_ACCOUNT),
            poll_interval: Duration::from_secs(1),
            genesis_poll_interval: Duration::from_millis(500),
            poll_timeout: None,
            retry: RetryPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            finalize_pause: Duration::from_secs(2),
            active_window_secs: ACTIVE_WINDOW_SECS,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

impl OrchestratorConfig {
    /// Create config from `BOOTMESH_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("BOOTMESH_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("BOOTMESH_MY_DISCOVERY") {
            config.my_discovery = PathBuf::from(path);
        }
        config.elect = lookup("BOOTMESH_ELECT")
            .filter(|s| !s.trim().is_empty())
            .map(|s| AccountName::from(s.trim()));
        if let Some(v) = lookup("BOOTMESH_VERIFY") {
            config.verify = parse_bool("BOOTMESH_VERIFY", &v)?;
        }
        if let Some(v) = lookup("BOOTMESH_SINGLE") {
            config.single = parse_bool("BOOTMESH_SINGLE", &v)?;
        }
        config.boot_sequence_override = lookup("BOOTMESH_BOOT_SEQUENCE").map(PathBuf::from);
        if let Some(v) = lookup("BOOTMESH_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(parse("BOOTMESH_POLL_INTERVAL_MS", &v)?);
        }
        if let Some(v) = lookup("BOOTMESH_POLL_TIMEOUT_SECS") {
            config.poll_timeout = Some(Duration::from_secs(parse("BOOTMESH_POLL_TIMEOUT_SECS", &v)?));
        }
        if let Some(v) = lookup("BOOTMESH_FETCH_CONCURRENCY") {
            config.fetch_concurrency = parse("BOOTMESH_FETCH_CONCURRENCY", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk size must be at least 1".into()));
        }
        if self.fetch_concurrency == 0 {
            return Err(Error::Config("BOOTMESH_FETCH_CONCURRENCY must be at least 1".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("BOOTMESH_POLL_INTERVAL_MS must be positive".into()));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {}: {}", key, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("Invalid {}: {:?}", key, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = OrchestratorConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.verify);
        assert!(!config.single);
        assert_eq!(config.chunk_size, 400);
        assert_eq!(config.fetch_concurrency, 10);
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.delay, Duration::from_millis(500));
        assert_eq!(config.genesis_poll_interval, Duration::from_millis(500));
        assert_eq!(config.system_account.as_str(), "eosio");
        assert!(config.elect.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            ("BOOTMESH_CACHE_DIR", "/tmp/cache"),
            ("BOOTMESH_ELECT", " eoscanada "),
            ("BOOTMESH_VERIFY", "no"),
            ("BOOTMESH_SINGLE", "1"),
            ("BOOTMESH_POLL_INTERVAL_MS", "250"),
            ("BOOTMESH_POLL_TIMEOUT_SECS", "60"),
            ("BOOTMESH_FETCH_CONCURRENCY", "3"),
        ]))
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.elect, Some(AccountName::from("eoscanada")));
        assert!(!config.verify);
        assert!(config.single);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.poll_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.fetch_concurrency, 3);
    }

    #[test]
    fn rejects_bad_values() {
        for pairs in [
            [("BOOTMESH_VERIFY", "maybe")],
            [("BOOTMESH_POLL_INTERVAL_MS", "soon")],
            [("BOOTMESH_POLL_INTERVAL_MS", "0")],
            [("BOOTMESH_FETCH_CONCURRENCY", "0")],
            [("BOOTMESH_SINGLE", "")],
        ] {
            let result = OrchestratorConfig::from_lookup(lookup(&pairs));
            assert!(
                matches!(result, Err(Error::Config(_))),
                "{:?} should be rejected",
                pairs
            );
        }
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            ("BOOTMESH_SEED_CONTRACT", "Not.Valid"),
            ("BOOTMESH_CHUNK", "nope"),
        ]))
        .unwrap();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
