//! Why a settings load can fail.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The settings file is not JSON.
    #[error("{} is not valid JSON: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Merged values do not fit [`RelaySettings`](crate::RelaySettings),
    /// e.g. a port given as a string.
    #[error("settings do not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),

    /// A field parsed but its value is unusable.
    #[error("{field}: {reason}")]
    Rejected { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_names_the_file() {
        let err = SettingsError::Read {
            path: PathBuf::from("/etc/relay.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "cannot read /etc/relay.json: denied");
    }

    #[test]
    fn malformed_error_names_the_file() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = SettingsError::Malformed {
            path: PathBuf::from("s.json"),
            source,
        };
        assert!(err.to_string().starts_with("s.json is not valid JSON: "));
    }

    #[test]
    fn rejected_error_leads_with_the_field() {
        let err = SettingsError::Rejected {
            field: "rules.matchThreshold",
            reason: "must be within 0..=100, got 150".into(),
        };
        assert_eq!(err.to_string(), "rules.matchThreshold: must be within 0..=100, got 150");
    }

    #[test]
    fn shape_errors_convert_from_serde() {
        let source = serde_json::from_value::<u16>(serde_json::json!("5001")).unwrap_err();
        let err: SettingsError = source.into();
        assert!(matches!(err, SettingsError::Shape(_)));
    }
}
