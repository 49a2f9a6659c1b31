//! Error types for the experiments compiler

use std::path::PathBuf;

use thiserror::Error;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompilerError>;

/// Experiments compiler errors
#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("Failed to parse yaml: {0}")]
    Yaml(String),

    #[error("Missing required field `{field}` in {entity}")]
    MissingField { entity: String, field: String },

    #[error("Invalid field `{field}` in {entity}: {reason}")]
    InvalidField {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("Duplicate experiment definition: {0}")]
    DuplicateExperiment(String),

    #[error("Unknown experiment: {name}{}", did_you_mean(.suggestion))]
    UnknownExperiment {
        name: String,
        suggestion: Option<String>,
    },

    #[error("No default value or platform value for rollout: {0}")]
    MissingRolloutValue(String),

    #[error("Failed to add rollout specification for experiment: {0}")]
    Rollout(String),

    #[error("Invalid experiment definitions: {}", join_names(.0))]
    InvalidExperiments(Vec<String>),

    #[error("Debug experiments are prohibited: {experiment} defaults to debug on {platform}")]
    DebugExperiment { experiment: String, platform: String },

    #[error("Requirement error: {0}")]
    Requirements(String),

    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),

    #[error("Default token `{token}` has no entry in the {table} table")]
    UnknownDefault { token: String, table: &'static str },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean `{}`?)", s),
        None => String::new(),
    }
}

fn join_names(names: &[String]) -> String {
    names.join(", ")
}

impl From<serde_yaml::Error> for CompilerError {
    fn from(err: serde_yaml::Error) -> Self {
        CompilerError::Yaml(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_experiment_message() {
        let err = CompilerError::UnknownExperiment {
            name: "fooo".to_string(),
            suggestion: Some("foo".to_string()),
        };
        assert_eq!(err.to_string(), "Unknown experiment: fooo (did you mean `foo`?)");

        let err = CompilerError::UnknownExperiment {
            name: "zzz".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "Unknown experiment: zzz");
    }

    #[test]
    fn test_toml_error_is_wrapped() {
        let err: CompilerError = toml::to_string(&1u8).unwrap_err().into();
        assert!(matches!(err, CompilerError::Toml(_)));
        assert!(err.to_string().starts_with("TOML error: "));
    }

    #[test]
    fn test_yaml_error_is_wrapped() {
        let err: CompilerError = serde_yaml::from_str::<serde_yaml::Value>("a: [")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("Failed to parse yaml: "));
    }
}
