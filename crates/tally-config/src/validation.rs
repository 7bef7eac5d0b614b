// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as threshold ranges and URL shapes. Collects all errors
//! instead of failing fast.

use crate::diagnostic::ConfigError;
use crate::model::TallyConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &TallyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.bot.default_currency.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "bot.default_currency must not be empty".to_string(),
        });
    }

    let threshold = config.resolver.auto_select_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        errors.push(ConfigError::Validation {
            message: format!(
                "resolver.auto_select_threshold must be between 0 and 1, got {threshold}"
            ),
        });
    }

    let min_confidence = config.resolver.min_candidate_confidence;
    if !(0.0..=1.0).contains(&min_confidence) {
        errors.push(ConfigError::Validation {
            message: format!(
                "resolver.min_candidate_confidence must be between 0 and 1, got {min_confidence}"
            ),
        });
    }

    if config.resolver.max_suggestions == 0 {
        errors.push(ConfigError::Validation {
            message: "resolver.max_suggestions must be at least 1".to_string(),
        });
    }

    if let Some(url) = &config.erpnext.base_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(ConfigError::Validation {
                message: format!("erpnext.base_url `{url}` must start with http:// or https://"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.retry.base_delay_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "retry.base_delay_secs must be at least 1".to_string(),
        });
    }

    if config.retry.window_secs < config.retry.base_delay_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "retry.window_secs ({}) must be at least retry.base_delay_secs ({})",
                config.retry.window_secs, config.retry.base_delay_secs
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&TallyConfig::default()).is_ok());
    }

    #[test]
    fn out_of_range_threshold_fails() {
        let mut config = TallyConfig::default();
        config.resolver.auto_select_threshold = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::Validation { message } if message.contains("auto_select_threshold")
        )));
    }

    #[test]
    fn bad_base_url_scheme_fails() {
        let mut config = TallyConfig::default();
        config.erpnext.base_url = Some("ftp://erp.example.com".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::Validation { message } if message.contains("base_url")
        )));
    }

    #[test]
    fn empty_database_path_fails() {
        let mut config = TallyConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::Validation { message } if message.contains("database_path")
        )));
    }

    #[test]
    fn window_shorter_than_base_delay_fails() {
        let mut config = TallyConfig::default();
        config.retry.base_delay_secs = 120;
        config.retry.window_secs = 60;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::Validation { message } if message.contains("window_secs")
        )));
    }

    #[test]
    fn multiple_problems_are_all_reported() {
        let mut config = TallyConfig::default();
        config.bot.default_currency = "".to_string();
        config.resolver.max_suggestions = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
