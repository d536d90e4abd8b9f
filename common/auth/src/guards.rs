use axum::http::{HeaderMap, StatusCode};
use uuid::Uuid;

use crate::AuthContext;

const AGENCY_HEADER: &str = "X-Agency-ID";

#[derive(Debug, Clone)]
pub enum GuardError {
    MissingAgencyHeader,
    InvalidAgencyHeader,
    AgencyMismatch { expected: Uuid, received: Uuid },
    Forbidden { required: Vec<String> },
}

impl GuardError {
    pub fn into_response(self) -> (StatusCode, String) {
        match self {
            GuardError::MissingAgencyHeader => (
                StatusCode::BAD_REQUEST,
                format!("Missing {AGENCY_HEADER} header"),
            ),
            GuardError::InvalidAgencyHeader => (
                StatusCode::BAD_REQUEST,
                format!("Invalid {AGENCY_HEADER} header"),
            ),
            GuardError::AgencyMismatch { expected, received } => (
                StatusCode::FORBIDDEN,
                format!(
                    "Authenticated agency ({expected}) does not match {AGENCY_HEADER} header ({received})",
                ),
            ),
            GuardError::Forbidden { required } => (
                StatusCode::FORBIDDEN,
                if required.is_empty() {
                    "Insufficient role".to_string()
                } else {
                    format!(
                        "Insufficient role. Required one of: {}",
                        required.join(", ")
                    )
                },
            ),
        }
    }
}

impl From<GuardError> for (StatusCode, String) {
    fn from(value: GuardError) -> Self {
        value.into_response()
    }
}

pub fn ensure_role(auth: &AuthContext, allowed: &[&str]) -> Result<(), GuardError> {
    if allowed.is_empty() {
        return Ok(());
    }

    let has_role = auth
        .claims
        .roles
        .iter()
        .any(|role| allowed.iter().any(|required| role == required));

    if has_role {
        Ok(())
    } else {
        Err(GuardError::Forbidden {
            required: allowed.iter().map(|value| value.to_string()).collect(),
        })
    }
}

pub fn agency_id_from_request(headers: &HeaderMap, auth: &AuthContext) -> Result<Uuid, GuardError> {
    let claims_agency = auth.claims.agency_id;

    match headers.get(AGENCY_HEADER) {
        Some(raw) => {
            let value = raw
                .to_str()
                .map_err(|_| GuardError::InvalidAgencyHeader)?
                .trim();
            if value.is_empty() {
                return Err(GuardError::InvalidAgencyHeader);
            }

            let requested = Uuid::parse_str(value).map_err(|_| GuardError::InvalidAgencyHeader)?;
            if requested != claims_agency {
                return Err(GuardError::AgencyMismatch {
                    expected: claims_agency,
                    received: requested,
                });
            }

            Ok(requested)
        }
        None => Err(GuardError::MissingAgencyHeader),
    }
}
