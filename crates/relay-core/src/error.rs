/// Why a raw wire payload could not become a [`crate::Message`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing or empty envelope field `{0}`")]
    MissingField(&'static str),

    #[error("invalid body for `{name}`: {reason}")]
    InvalidBody { name: String, reason: String },
}

impl ParseError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::NotAnObject(_) => "not_an_object",
            Self::MissingField(_) => "missing_field",
            Self::InvalidBody { .. } => "invalid_body",
        }
    }
}
