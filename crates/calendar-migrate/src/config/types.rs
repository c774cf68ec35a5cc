//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use crate::core::RecordType;

/// Root configuration structure.
///
/// Job status and the error log always live in the target database, so
/// separate invocations see the same job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Foreign (legacy plugin) database configuration.
    pub source: SourceConfig,

    /// Native database configuration.
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Foreign database configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// SQLite connection URL (e.g. `sqlite://legacy.db`).
    pub url: String,

    /// Prefix of the foreign plugin's tables (default: "legacy_").
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Maximum pooled connections (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

// URLs may embed credentials, keep them out of logs.
impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("url", &redact_url(&self.url))
            .field("table_prefix", &self.table_prefix)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Native database configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// SQLite connection URL (e.g. `sqlite://native.db`).
    pub url: String,

    /// Maximum pooled connections (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("url", &redact_url(&self.url))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Job identity used to key persisted status and errors.
    /// Derived from the config hash if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    /// Rows per batch for every phase (default: 10).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-phase batch size overrides.
    #[serde(default)]
    pub batch_sizes: PhaseBatchSizes,

    /// Prefix of the mapping tables created beside the foreign tables.
    #[serde(default = "default_mapping_prefix")]
    pub mapping_prefix: String,

    /// Native calendar every imported event is assigned to.
    #[serde(default = "default_calendar")]
    pub default_calendar: String,

    /// Capacity written for foreign tickets marked unlimited (-1).
    #[serde(default = "default_unlimited_capacity")]
    pub unlimited_capacity: i64,

    /// Foreign event meta keys copied onto the native event.
    #[serde(default)]
    pub custom_fields: Vec<String>,

    /// How long a persisted error log stays valid, in seconds (default: one day).
    #[serde(default = "default_error_ttl_secs")]
    pub error_ttl_secs: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            job_id: None,
            batch_size: default_batch_size(),
            batch_sizes: PhaseBatchSizes::default(),
            mapping_prefix: default_mapping_prefix(),
            default_calendar: default_calendar(),
            unlimited_capacity: default_unlimited_capacity(),
            custom_fields: Vec::new(),
            error_ttl_secs: default_error_ttl_secs(),
        }
    }
}

impl MigrationConfig {
    /// Batch size for one record type, honouring per-phase overrides.
    pub fn batch_size_for(&self, record_type: RecordType) -> usize {
        let override_size = match record_type {
            RecordType::Event => self.batch_sizes.events,
            RecordType::Ticket => self.batch_sizes.tickets,
            RecordType::Order => self.batch_sizes.orders,
            RecordType::Attendee => self.batch_sizes.attendees,
        };
        override_size.unwrap_or(self.batch_size)
    }
}

/// Per-phase batch size overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseBatchSizes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickets: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<usize>,
}

fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}[REDACTED]{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}

fn default_table_prefix() -> String {
    "legacy_".to_string()
}

fn default_max_connections() -> u32 {
    4
}

fn default_batch_size() -> usize {
    10
}

fn default_mapping_prefix() -> String {
    "_calmig_map_".to_string()
}

fn default_calendar() -> String {
    "Imported".to_string()
}

fn default_unlimited_capacity() -> i64 {
    9999
}

fn default_error_ttl_secs() -> u64 {
    86_400
}
