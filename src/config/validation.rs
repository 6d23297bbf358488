//! Configuration validation

use crate::config::{Config, TransportType};
use schemars::schema_for;
use serde_json::Value;
use std::collections::HashSet;
use validator::Validate;

/// Validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Configuration validator
pub struct ConfigValidator {
    schema: Value,
}

impl ConfigValidator {
    /// Create a new validator with the generated schema
    pub fn new() -> Self {
        let schema = schema_for!(Config);
        Self {
            schema: serde_json::to_value(&schema).unwrap_or_default(),
        }
    }

    /// Get the JSON Schema for the configuration
    pub fn get_schema(&self) -> &Value {
        &self.schema
    }

    /// Export the schema to a JSON string
    pub fn export_schema(&self) -> String {
        serde_json::to_string_pretty(&self.schema).unwrap_or_default()
    }

    /// Validate a parsed configuration
    pub fn validate(&self, config: &Config) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(validation_errors) = config.validate() {
            for (field, field_errors) in validation_errors.field_errors() {
                for error in field_errors {
                    errors.push(ValidationError {
                        path: field.to_string(),
                        message: error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| error.code.to_string()),
                    });
                }
            }
        }

        self.validate_backends(config, &mut errors);
        self.validate_patterns("exclude_patterns", &config.exclude_patterns, &mut errors);
        self.validate_patterns(
            "no_compress_patterns",
            &config.no_compress_patterns,
            &mut errors,
        );

        if config.sessions.inactivity_timeout_secs == 0 || config.sessions.sweep_interval_secs == 0 {
            errors.push(ValidationError {
                path: "sessions".to_string(),
                message: "Session timeout and sweep interval must be greater than zero".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_backends(&self, config: &Config, errors: &mut Vec<ValidationError>) {
        let mut names = HashSet::new();

        for (idx, server) in config.servers.iter().enumerate() {
            if server.name.trim().is_empty() {
                errors.push(ValidationError {
                    path: format!("servers[{}].name", idx),
                    message: "Server name cannot be empty".to_string(),
                });
            } else if !names.insert(server.name.as_str()) {
                errors.push(ValidationError {
                    path: format!("servers[{}].name", idx),
                    message: format!("Duplicate server name: {}", server.name),
                });
            }

            if server.timeout == Some(0) {
                errors.push(ValidationError {
                    path: format!("servers[{}].timeout", idx),
                    message: "Timeout must be greater than zero".to_string(),
                });
            }

            match server.transport {
                TransportType::Stdio => {
                    if server.command.trim().is_empty() {
                        errors.push(ValidationError {
                            path: format!("servers[{}].command", idx),
                            message: format!("Stdio server '{}' needs a command", server.name),
                        });
                    }
                }
                TransportType::Http => match server.url.as_deref() {
                    None => errors.push(ValidationError {
                        path: format!("servers[{}].url", idx),
                        message: format!("HTTP server '{}' needs a url", server.name),
                    }),
                    Some(url) => {
                        if let Err(e) = url::Url::parse(url) {
                            errors.push(ValidationError {
                                path: format!("servers[{}].url", idx),
                                message: format!("Invalid url '{}': {}", url, e),
                            });
                        }
                    }
                },
            }
        }
    }

    fn validate_patterns(&self, field: &str, patterns: &[String], errors: &mut Vec<ValidationError>) {
        for (idx, pattern) in patterns.iter().enumerate() {
            if pattern.trim().is_empty() {
                errors.push(ValidationError {
                    path: format!("{}[{}]", field, idx),
                    message: "Pattern cannot be empty".to_string(),
                });
            }
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
