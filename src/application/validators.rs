use std::collections::HashMap;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::resource::{ResourceKey, UNLIMITED},
};

/// Validates an externally supplied resource-limit map.
/// Rules:
/// - every key must be a known resource key
/// - every value must be `-1` (unlimited) or a non-negative integer
pub fn validate_resource_limits(limits: &HashMap<String, i64>) -> AppResult<()> {
    let mut keys: Vec<&String> = limits.keys().collect();
    keys.sort();

    for key in keys {
        if key.parse::<ResourceKey>().is_err() {
            return Err(AppError::InvalidInput(format!(
                "Unknown resource key: {key}"
            )));
        }
        let value = limits[key];
        if value < UNLIMITED {
            return Err(AppError::InvalidInput(format!(
                "Limit for {key} must be -1 (unlimited) or a non-negative integer, got {value}"
            )));
        }
    }
    Ok(())
}

/// Validates a feature key.
/// Rules:
/// - 1-64 characters
/// - only lowercase ASCII letters, digits and underscores
/// - must start with a letter
pub fn is_valid_feature_key(key: &str) -> bool {
    if key.is_empty() || key.len() > 64 {
        return false;
    }

    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub fn validate_feature_keys(features: &[String]) -> AppResult<()> {
    match features.iter().find(|f| !is_valid_feature_key(f)) {
        Some(bad) => Err(AppError::InvalidInput(format!("Invalid feature key: {bad}"))),
        None => Ok(()),
    }
}
