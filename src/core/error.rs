use thiserror::Error;

/// Core error types for nsgaudit
///
/// The analysis engine itself never fails; these errors only surface at the
/// boundaries where rules or configuration are read from disk.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rule source could not produce a rule snapshot
    #[error("Rule source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration value rejected
    #[error("Configuration error in {field}: {message}")]
    Config { field: String, message: String },

    /// Internal logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Rule-source specific errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Rule export not found: {0}")]
    NotFound(String),

    #[error("Unrecognized rule export layout: expected a rule array or a securityRules list")]
    UnrecognizedLayout,

    #[error("Rule export is empty")]
    Empty,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = Error::Config {
            field: "limits.maxAddressesPerBucket".to_string(),
            message: "must be greater than zero".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error in limits.maxAddressesPerBucket: must be greater than zero"
        );
    }

    #[test]
    fn test_source_error_wraps() {
        let err: Error = SourceError::NotFound("nsg.json".to_string()).into();
        assert!(err.to_string().contains("Rule export not found: nsg.json"));
    }

    #[test]
    fn test_json_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
