//! Logging configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log line format
    #[serde(default)]
    pub format: LogFormat,
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.log_level.trim().is_empty() {
            return Err(ValidationError::MissingRequired("TELEMETRY__LOG_LEVEL"));
        }
        Ok(())
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info,doc_lineage=debug".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_compact_info() {
        let config = TelemetryConfig::default();
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.log_level.starts_with("info"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn blank_filter_is_rejected() {
        let config = TelemetryConfig {
            log_level: " ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
