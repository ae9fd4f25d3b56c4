//! Manifest and delete-file errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("KDL parse error: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("duplicate definition: {0}")]
    Duplicate(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("{} errors:\n  {}", .0.len(), join_errors(.0))]
    Multiple(Vec<ConfigError>),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n  ")
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Fold collected errors into one result.
    pub(crate) fn collect(mut errors: Vec<ConfigError>) -> ConfigResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::Multiple(errors)),
        }
    }

    /// The individual errors, flattening [`ConfigError::Multiple`].
    pub fn errors(&self) -> Vec<&ConfigError> {
        match self {
            ConfigError::Multiple(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect() {
        assert!(ConfigError::collect(vec![]).is_ok());

        let single = ConfigError::collect(vec![ConfigError::MissingField("a".into())]).unwrap_err();
        assert!(matches!(single, ConfigError::MissingField(_)));

        let many = ConfigError::collect(vec![
            ConfigError::MissingField("a".into()),
            ConfigError::Duplicate("b".into()),
        ])
        .unwrap_err();
        assert_eq!(many.errors().len(), 2);
        assert_eq!(
            many.to_string(),
            "2 errors:\n  missing required field: a\n  duplicate definition: b"
        );
    }
}
