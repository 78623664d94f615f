//! Configuration validation
//!
//! Rules:
//! - field ranges declared on `EngineConfig` (validator derive)
//! - log level is a known level name
//! - metrics port is non-zero
//! - timing history holds at least one ring of frames

use contracts::{EngineConfig, EngineError};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Validate an `EngineConfig`
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &EngineConfig) -> Result<(), EngineError> {
    config.validate().map_err(|e| first_error("", &e))?;
    validate_log_level(config)?;
    validate_metrics_port(config)?;
    validate_timing_history(config)?;
    Ok(())
}

/// Flatten derive errors into the first offending field path
fn first_error(prefix: &str, errors: &ValidationErrors) -> EngineError {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(err) = list.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} constraint violated", err.code));
                    return EngineError::config_validation(path, message);
                }
            }
            ValidationErrorsKind::Struct(nested) => return first_error(&path, nested),
            ValidationErrorsKind::List(items) => {
                if let Some((idx, nested)) = items.iter().next() {
                    return first_error(&format!("{path}[{idx}]"), nested);
                }
            }
        }
    }
    EngineError::config_validation(prefix, "invalid configuration")
}

fn validate_log_level(config: &EngineConfig) -> Result<(), EngineError> {
    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(EngineError::config_validation(
            "logging.level",
            format!("unknown log level '{}'", config.logging.level),
        ));
    }
    Ok(())
}

fn validate_metrics_port(config: &EngineConfig) -> Result<(), EngineError> {
    if config.logging.metrics_port == Some(0) {
        return Err(EngineError::config_validation(
            "logging.metrics_port",
            "metrics port must be > 0",
        ));
    }
    Ok(())
}

fn validate_timing_history(config: &EngineConfig) -> Result<(), EngineError> {
    if config.timing_history < config.ring_depth {
        return Err(EngineError::config_validation(
            "timing_history",
            format!(
                "timing_history ({}) must be >= ring_depth ({})",
                config.timing_history, config.ring_depth
            ),
        ));
    }
    Ok(())
}
