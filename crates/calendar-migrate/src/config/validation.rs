//! Configuration validation.

use super::Config;
use crate::core::identifier::validate_table_prefix;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.url.is_empty() {
        return Err(MigrateError::Config("source.url is required".into()));
    }
    if config.target.url.is_empty() {
        return Err(MigrateError::Config("target.url is required".into()));
    }

    // Cannot migrate into the database we read from
    if config.source.url == config.target.url {
        return Err(MigrateError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    if config.source.max_connections == 0 || config.target.max_connections == 0 {
        return Err(MigrateError::Config(
            "max_connections must be at least 1".into(),
        ));
    }

    validate_table_prefix(&config.source.table_prefix)?;
    validate_table_prefix(&config.migration.mapping_prefix)?;
    if config.source.table_prefix == config.migration.mapping_prefix {
        return Err(MigrateError::Config(
            "migration.mapping_prefix must differ from source.table_prefix".into(),
        ));
    }

    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    let overrides = &config.migration.batch_sizes;
    for (phase, size) in [
        ("events", overrides.events),
        ("tickets", overrides.tickets),
        ("orders", overrides.orders),
        ("attendees", overrides.attendees),
    ] {
        if size == Some(0) {
            return Err(MigrateError::Config(format!(
                "migration.batch_sizes.{} must be at least 1",
                phase
            )));
        }
    }

    if config.migration.default_calendar.trim().is_empty() {
        return Err(MigrateError::Config(
            "migration.default_calendar cannot be empty".into(),
        ));
    }
    if config.migration.unlimited_capacity < 0 {
        return Err(MigrateError::Config(
            "migration.unlimited_capacity cannot be negative".into(),
        ));
    }
    if config.migration.error_ttl_secs == 0 {
        return Err(MigrateError::Config(
            "migration.error_ttl_secs must be at least 1".into(),
        ));
    }

    Ok(())
}
