//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the source/target identity.
    ///
    /// Only the databases and table prefixes participate so that tuning
    /// batch sizes between invocations keeps the same job.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.url.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.source.table_prefix.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.target.url.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.migration.mapping_prefix.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Job identity keying persisted status and errors.
    pub fn job_id(&self) -> String {
        match &self.migration.job_id {
            Some(id) => id.clone(),
            None => format!("job-{}", &self.hash()[..16]),
        }
    }
}
