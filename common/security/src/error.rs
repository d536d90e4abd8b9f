use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("missing agency identifier")]
    MissingAgency,
    #[error("mismatched agency context")]
    MismatchedAgency,
    #[error("unauthorized - missing required role")]
    Forbidden,
    #[error("invalid authorization token")]
    InvalidToken,
    #[error("internal security error")]
    Internal,
}

impl From<SecurityError> for (StatusCode, String) {
    fn from(e: SecurityError) -> Self {
        match e {
            SecurityError::MissingAgency => (StatusCode::BAD_REQUEST, e.to_string()),
            SecurityError::MismatchedAgency => (StatusCode::UNAUTHORIZED, e.to_string()),
            SecurityError::Forbidden => (StatusCode::FORBIDDEN, e.to_string()),
            SecurityError::InvalidToken => (StatusCode::UNAUTHORIZED, e.to_string()),
            SecurityError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}
