//! Settings and rule validation.

use crate::config::{Config, Settings, ValidationRule, AGGREGATE_CAP_PATH, COUNT_CAP_PATH, DEFAULT_COUNT_CAP, SLICE_PATH};
use crate::criteria::{DEFAULT_SLICE, UNBOUNDED};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashMap;

impl Settings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let settings = Settings {
            count_cap: config.get_as(COUNT_CAP_PATH)?.unwrap_or(DEFAULT_COUNT_CAP),
            aggregate_cap: config.get_as(AGGREGATE_CAP_PATH)?,
            slice_size: config.get_as(SLICE_PATH)?.unwrap_or(DEFAULT_SLICE),
        };
        validate_settings(&settings)?;
        Ok(settings)
    }
}

/// The aggregate cap must stay above 1, otherwise a shared reference would be
/// counted once and its item deleted by orphan cleanup.
pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.count_cap < 1 {
        return Err(ConfigError::Validation(format!("{} must be at least 1", COUNT_CAP_PATH)));
    }
    if let Some(cap) = settings.aggregate_cap {
        if cap < 2 {
            return Err(ConfigError::Validation(format!(
                "{} must be at least 2, got {}",
                AGGREGATE_CAP_PATH, cap
            )));
        }
    }
    if settings.slice_size < 1 || settings.slice_size > UNBOUNDED {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and {}",
            SLICE_PATH, UNBOUNDED
        )));
    }
    Ok(())
}

pub fn validate_rules(path: &str, rules: &HashMap<String, ValidationRule>) -> Result<(), ConfigError> {
    for (field, rule) in rules {
        if let Some(pattern) = &rule.pattern {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("{}: invalid pattern for {}: {}", path, field, e))
            })?;
        }
        if let (Some(min), Some(max)) = (rule.min_length, rule.max_length) {
            if min > max {
                return Err(ConfigError::Validation(format!(
                    "{}: min_length exceeds max_length for {}",
                    path, field
                )));
            }
        }
        if let Some(format) = &rule.format {
            if !matches!(format.to_lowercase().as_str(), "email" | "date") {
                return Err(ConfigError::Validation(format!(
                    "{}: unknown format '{}' for {}",
                    path, format, field
                )));
            }
        }
    }
    Ok(())
}
