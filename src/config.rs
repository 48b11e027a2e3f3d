//! Typed configuration tree, defaults, validation, and hot-reload of the
//! sync/schedule/classifier sub-trees.
//!
//! The host process reads a TOML file and hands this crate the parsed
//! value (parsing the file itself is out of scope); this module owns
//! filling in defaults, validating bounds, and the atomic patch path C7
//! reads on every tick.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_upstream_url() -> String {
    String::new()
}
fn default_page_size() -> u32 {
    2000
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_request_timeout_ms() -> u64 {
    15_000
}

/// Upstream ERP RPC connection parameters (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default)]
    pub lcid: u32,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            account: String::new(),
            user: String::new(),
            app_id: String::new(),
            app_secret: String::new(),
            lcid: 0,
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            page_size: default_page_size(),
        }
    }
}

fn default_schedule() -> Vec<String> {
    vec![
        "07:00".to_string(),
        "12:00".to_string(),
        "16:00".to_string(),
        "18:00".to_string(),
    ]
}
fn default_days_back() -> u32 {
    90
}
fn default_min_days() -> u32 {
    1
}
fn default_max_days() -> u32 {
    365
}
fn default_chunk_days() -> u32 {
    7
}
fn default_batch_size() -> u32 {
    500
}
fn default_parallel_chunks() -> u32 {
    2
}
fn default_retry_count() -> u32 {
    3
}

/// `sync.auto_sync.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoSyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_schedule")]
    pub schedule: Vec<String>,
    #[serde(default = "default_days_back")]
    pub days_back: u32,
}

impl Default for AutoSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            schedule: default_schedule(),
            days_back: default_days_back(),
        }
    }
}

/// `sync.manual_sync.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualSyncConfig {
    #[serde(default = "default_days_back")]
    pub default_days: u32,
    #[serde(default = "default_min_days")]
    pub min_days: u32,
    #[serde(default = "default_max_days")]
    pub max_days: u32,
}

impl Default for ManualSyncConfig {
    fn default() -> Self {
        Self {
            default_days: default_days_back(),
            min_days: default_min_days(),
            max_days: default_max_days(),
        }
    }
}

/// `sync.performance.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPerformanceConfig {
    #[serde(default = "default_chunk_days")]
    pub chunk_days: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_parallel_chunks")]
    pub parallel_chunks: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

impl Default for SyncPerformanceConfig {
    fn default() -> Self {
        Self {
            chunk_days: default_chunk_days(),
            batch_size: default_batch_size(),
            parallel_chunks: default_parallel_chunks(),
            retry_count: default_retry_count(),
        }
    }
}

/// `sync.*`, the hot-reloadable half of configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub auto_sync: AutoSyncConfig,
    #[serde(default)]
    pub manual_sync: ManualSyncConfig,
    #[serde(default)]
    pub performance: SyncPerformanceConfig,
}

fn default_max_size() -> usize {
    200
}
fn default_ttl_seconds() -> u64 {
    300
}

/// `memory_cache.*` (C4 bounds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

/// One seeded or configured material-class rule (`material_classes[]`, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialClassConfig {
    pub id: String,
    pub pattern: String,
    pub display_name: String,
}

fn default_material_classes() -> Vec<MaterialClassConfig> {
    vec![
        MaterialClassConfig {
            id: "finished".to_string(),
            pattern: r"^07\.".to_string(),
            display_name: "Finished".to_string(),
        },
        MaterialClassConfig {
            id: "self_made".to_string(),
            pattern: r"^05\.".to_string(),
            display_name: "Self-made".to_string(),
        },
        MaterialClassConfig {
            id: "purchased".to_string(),
            pattern: r"^03\.".to_string(),
            display_name: "Purchased".to_string(),
        },
    ]
}

fn default_freshness_seconds() -> u64 {
    3600
}
fn default_db_path() -> String {
    "mto_gateway.db".to_string()
}

/// The full gateway configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub memory_cache: MemoryCacheConfig,
    #[serde(default = "default_freshness_seconds")]
    pub persistent_freshness_seconds: u64,
    #[serde(default = "default_material_classes")]
    pub material_classes: Vec<MaterialClassConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            db_path: default_db_path(),
            sync: SyncConfig::default(),
            memory_cache: MemoryCacheConfig::default(),
            persistent_freshness_seconds: default_freshness_seconds(),
            material_classes: default_material_classes(),
        }
    }
}

/// A partial update to the hot-reloadable sub-trees, as accepted by
/// `UpdateSyncConfig` (§6). Every field is optional; present fields
/// replace the corresponding sub-tree wholesale after validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub sync: Option<SyncConfig>,
    pub material_classes: Option<Vec<MaterialClassConfig>>,
}

impl GatewayConfig {
    /// Loads and validates a configuration value already parsed from TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| Error::validation(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the bounds `spec.md` §4.6/§4.10 call out explicitly.
    pub fn validate(&self) -> Result<()> {
        validate_sync(&self.sync)?;
        if self.memory_cache.max_size == 0 {
            return Err(Error::validation("memory_cache.max_size must be >= 1"));
        }
        for class in &self.material_classes {
            regex::Regex::new(&class.pattern).map_err(|e| {
                Error::validation(format!(
                    "material class {} has an invalid pattern: {e}",
                    class.id
                ))
            })?;
        }
        Ok(())
    }

    /// Applies a patch to the hot-reloadable sub-trees, validating the
    /// result before committing it in place of the existing config.
    pub fn apply_patch(&mut self, patch: ConfigPatch) -> Result<()> {
        let mut candidate = self.clone();
        if let Some(sync) = patch.sync {
            candidate.sync = sync;
        }
        if let Some(classes) = patch.material_classes {
            candidate.material_classes = classes;
        }
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// Validates and clamps a caller-supplied `days_back` for a manual
    /// trigger against `sync.manual_sync.{min_days, max_days}`.
    pub fn validate_days_back(&self, days_back: u32) -> Result<u32> {
        let bounds = &self.sync.manual_sync;
        if days_back < bounds.min_days || days_back > bounds.max_days {
            return Err(Error::validation(format!(
                "days_back {days_back} out of range [{}, {}]",
                bounds.min_days, bounds.max_days
            )));
        }
        Ok(days_back)
    }
}

fn validate_sync(sync: &SyncConfig) -> Result<()> {
    let perf = &sync.performance;
    if !(1..=30).contains(&perf.chunk_days) {
        return Err(Error::validation("sync.performance.chunk_days must be in 1..=30"));
    }
    if perf.parallel_chunks == 0 {
        return Err(Error::validation("sync.performance.parallel_chunks must be >= 1"));
    }
    let manual = &sync.manual_sync;
    if manual.min_days == 0 || manual.min_days > manual.max_days {
        return Err(Error::validation(
            "sync.manual_sync.min_days must be >= 1 and <= max_days",
        ));
    }
    if !(1..=365).contains(&manual.max_days) {
        return Err(Error::validation("sync.manual_sync.max_days must be in 1..=365"));
    }
    if !(1..=365).contains(&sync.auto_sync.days_back) {
        return Err(Error::validation("sync.auto_sync.days_back must be in 1..=365"));
    }
    for entry in &sync.auto_sync.schedule {
        parse_hhmm(entry)?;
    }
    Ok(())
}

/// Parses an `"HH:MM"` schedule entry into `(hour, minute)`.
pub fn parse_hhmm(entry: &str) -> Result<(u32, u32)> {
    let (h, m) = entry
        .split_once(':')
        .ok_or_else(|| Error::validation(format!("invalid schedule entry: {entry}")))?;
    let hour: u32 = h
        .parse()
        .map_err(|_| Error::validation(format!("invalid schedule entry: {entry}")))?;
    let minute: u32 = m
        .parse()
        .map_err(|_| Error::validation(format!("invalid schedule entry: {entry}")))?;
    if hour > 23 || minute > 59 {
        return Err(Error::validation(format!("invalid schedule entry: {entry}")));
    }
    Ok((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = GatewayConfig::default();
        assert_eq!(config.upstream.page_size, 2000);
        assert_eq!(config.persistent_freshness_seconds, 3600);
        assert_eq!(config.memory_cache.max_size, 200);
        assert_eq!(config.memory_cache.ttl_seconds, 300);
        assert_eq!(config.sync.performance.chunk_days, 7);
        assert_eq!(config.sync.performance.parallel_chunks, 2);
        assert_eq!(config.sync.performance.retry_count, 3);
        assert_eq!(config.sync.auto_sync.schedule, default_schedule());
        assert_eq!(config.material_classes.len(), 3);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = GatewayConfig::from_toml_str("db_path = \"/tmp/x.db\"").unwrap();
        assert_eq!(config.db_path, "/tmp/x.db");
        assert_eq!(config.memory_cache.max_size, 200);
    }

    #[test]
    fn rejects_out_of_range_chunk_days() {
        let mut config = GatewayConfig::default();
        config.sync.performance.chunk_days = 31;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validates_days_back_bounds() {
        let config = GatewayConfig::default();
        assert!(config.validate_days_back(0).is_err());
        assert!(config.validate_days_back(400).is_err());
        assert!(config.validate_days_back(30).is_ok());
    }

    #[test]
    fn patch_replaces_sync_subtree_after_validating() {
        let mut config = GatewayConfig::default();
        let mut new_sync = config.sync.clone();
        new_sync.performance.chunk_days = 14;
        let patch = ConfigPatch {
            sync: Some(new_sync),
            material_classes: None,
        };
        config.apply_patch(patch).unwrap();
        assert_eq!(config.sync.performance.chunk_days, 14);
    }

    #[test]
    fn patch_rejects_invalid_subtree_without_mutating() {
        let mut config = GatewayConfig::default();
        let mut bad_sync = config.sync.clone();
        bad_sync.performance.chunk_days = 0;
        let patch = ConfigPatch {
            sync: Some(bad_sync),
            material_classes: None,
        };
        assert!(config.apply_patch(patch).is_err());
        assert_eq!(config.sync.performance.chunk_days, 7);
    }
}
