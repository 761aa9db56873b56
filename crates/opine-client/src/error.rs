use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Every failure the client core can report.
///
/// `Auth` is the only variant that changes session state (it forces the
/// session to anonymous). `Validation` messages come from the server or from
/// local input checks and are meant to be shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("not authenticated: {0}")]
    Auth(String),

    #[error("permission denied: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("credential storage: {0}")]
    Storage(String),
}

impl ClientError {
    /// Map a non-success HTTP status to the error taxonomy.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => ClientError::Auth(message),
            403 => ClientError::Forbidden(message),
            400 | 422 => ClientError::Validation(message),
            404 => ClientError::NotFound(message),
            409 => ClientError::Conflict(message),
            _ => ClientError::Server { status, message },
        }
    }

    /// Missing, invalid or expired credential.
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }

    /// Transient failures a caller may offer to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Server { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(ClientError::from_status(401, "expired".into()).is_auth());
        assert_eq!(
            ClientError::from_status(403, "no".into()),
            ClientError::Forbidden("no".into())
        );
        assert_eq!(
            ClientError::from_status(422, "too short".into()),
            ClientError::Validation("too short".into())
        );
        assert_eq!(
            ClientError::from_status(409, "raced".into()),
            ClientError::Conflict("raced".into())
        );
        assert!(ClientError::from_status(502, "bad gateway".into()).is_retryable());
        assert!(!ClientError::from_status(404, "gone".into()).is_retryable());
    }

    #[test]
    fn validation_message_is_verbatim() {
        let err = ClientError::Validation("Email already registered".into());
        assert_eq!(err.to_string(), "Email already registered");
    }
}
