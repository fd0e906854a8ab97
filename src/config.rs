//! Configuration loading and management.
//!
//! TOML, every section optional. The defaults bake the deployment profile
//! the relay ships with: 5000-record replay windows, 4096 cached groups,
//! 15-token admission buckets refilling one per two minutes.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use coterie_proto::kind;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Relay configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Relay identity.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Group reconstruction and caching.
    #[serde(default)]
    pub groups: GroupsConfig,
    /// Per-group admission throttling.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Write-path policy knobs.
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Relay identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Display name.
    #[serde(default = "default_relay_name")]
    pub name: String,
    /// Operator secret key, 32 bytes hex. Synthesized records are signed
    /// under it. Generate an ephemeral key at startup when unset.
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            name: default_relay_name(),
            secret_key: None,
        }
    }
}

/// Group reconstruction and caching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupsConfig {
    /// Most recent moderation records replayed per group.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Live groups kept cached per process.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Serve the synthesized admins summary. Off unless a deployment
    /// wants admin lists public.
    #[serde(default)]
    pub serve_admin_summaries: bool,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        GroupsConfig {
            history_limit: default_history_limit(),
            cache_capacity: default_cache_capacity(),
            serve_admin_summaries: false,
        }
    }
}

/// Per-group admission bucket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Tokens a fresh bucket holds.
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Seconds per refilled token.
    #[serde(default = "default_refill_secs")]
    pub refill_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            burst: default_burst(),
            refill_secs: default_refill_secs(),
        }
    }
}

/// Write-path policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Indexable-tag cap applied to capped kinds.
    #[serde(default = "default_max_indexable_tags")]
    pub max_indexable_tags: usize,
    /// Kinds the indexable-tag cap applies to.
    #[serde(default = "default_capped_kinds")]
    pub capped_kinds: Vec<u16>,
    /// Stored records older than this are never deleted, in seconds.
    #[serde(default = "default_delete_max_age_secs")]
    pub delete_max_age_secs: i64,
    /// Auto-approve join requests to open groups.
    #[serde(default = "default_true")]
    pub auto_approve_joins: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            max_indexable_tags: default_max_indexable_tags(),
            capped_kinds: default_capped_kinds(),
            delete_max_age_secs: default_delete_max_age_secs(),
            auto_approve_joins: true,
        }
    }
}

fn default_relay_name() -> String {
    "coterie".to_string()
}

fn default_history_limit() -> usize {
    5000
}

fn default_cache_capacity() -> usize {
    4096
}

fn default_burst() -> u32 {
    15
}

fn default_refill_secs() -> u64 {
    120
}

fn default_max_indexable_tags() -> usize {
    10
}

fn default_capped_kinds() -> Vec<u16> {
    vec![kind::GROUP_MEMBERS]
}

fn default_delete_max_age_secs() -> i64 {
    7200
}

fn default_true() -> bool {
    true
}
