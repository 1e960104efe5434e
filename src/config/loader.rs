//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[upstream]
address = "10.0.0.2:3500"

[timeouts]
request_secs = 30
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.upstream.address, "10.0.0.2:3500");
        assert_eq!(config.upstream.path_prefix, "/internal");
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.timeouts.connect_secs, 5);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3501");
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(load_config(file.path()).unwrap(), GatewayConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[upstream\naddress = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_lists_all() {
        let err = parse_config("[timeouts]\nrequest_secs = 0\nconnect_secs = 0\n").unwrap_err();
        let ConfigError::Validation(errors) = &err else {
            panic!("expected validation error, got {err}");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(
            err.to_string(),
            "Validation failed: timeouts.request_secs: must be greater than 0, \
             timeouts.connect_secs: must be greater than 0"
        );
    }
}
