use std::path::Path;

use crate::config::schema::{Config, MAX_BATCH_SIZE};
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.worker_count == 0 {
        return Err(invalid("worker_count must be at least 1"));
    }

    if config.batch.size == 0 || config.batch.size > MAX_BATCH_SIZE {
        return Err(invalid(format!(
            "batch.size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, config.batch.size
        )));
    }

    if config.storage.bucket.trim().is_empty() {
        return Err(invalid("storage.bucket must not be empty"));
    }
    if config.storage.bucket.contains('/') {
        return Err(invalid("storage.bucket must be a bare host name"));
    }

    if config.llm.endpoint.trim().is_empty() || config.llm.model.trim().is_empty() {
        return Err(invalid("llm.endpoint and llm.model are required"));
    }

    if config.background_check.max_attempts == 0 {
        return Err(invalid("background_check.max_attempts must be at least 1"));
    }

    if config.tasks.retention_secs > config.tasks.max_age_secs {
        return Err(invalid(
            "tasks.retention_secs must not exceed tasks.max_age_secs",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(extra: &str) -> String {
        format!(
            r#"{{
                "version": "1.0",
                "storage": {{ "bucket": "cvs.example.com", "root_directory": "/tmp/cvs" }}
                {}
            }}"#,
            extra
        )
    }

    #[test]
    fn test_load_valid_config() {
        let config = load_config_from_str(&base(r#", "batch": { "size": 5, "delay_ms": 0 }"#))
            .unwrap();
        assert_eq!(config.batch.size, 5);
        assert_eq!(config.batch.delay_ms, 0);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let content = base("").replace("\"1.0\"", "\"2.0\"");
        let err = load_config_from_str(&content).unwrap_err();
        assert!(err.to_string().contains("Unsupported config version"));
    }

    #[test]
    fn test_rejects_oversized_batch() {
        let err = load_config_from_str(&base(r#", "batch": { "size": 25 }"#)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let err = load_config_from_str(&base(r#", "worker_count": 0"#)).unwrap_err();
        assert!(err.to_string().contains("worker_count"));
    }

    #[test]
    fn test_rejects_retention_longer_than_max_age() {
        let err = load_config_from_str(&base(
            r#", "tasks": { "retention_secs": 100, "max_age_secs": 10 }"#,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("retention_secs"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/deeptalent.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = load_config_from_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }
}
