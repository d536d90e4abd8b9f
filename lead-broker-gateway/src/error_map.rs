use common_http_errors::ApiError;
use lead_broker_core::error::CoreError;
use uuid::Uuid;

/// The HTTP boundary's only knowledge of status codes (spec §7's
/// "propagation policy"): translates the core's typed error taxonomy into
/// the shared `ApiError`, which axum then turns into a response.
pub fn to_api_error(err: CoreError, trace_id: Option<Uuid>) -> ApiError {
    match err {
        CoreError::PortalUnknown => ApiError::Unauthorized { code: "portal_unknown", trace_id },
        CoreError::PortalAuthFailed => ApiError::Unauthorized { code: "portal_auth_failed", trace_id },
        CoreError::PortalInactive => ApiError::Forbidden { code: "portal_inactive", trace_id },

        CoreError::ValidationFailed(violations) => ApiError::ValidationFailed { violations, trace_id },

        // Handled by callers before reaching here for the webhook's 200-with-duplicate
        // contract; surfaced as a 409 only if a caller forwards it unhandled.
        CoreError::DuplicateSuppressed { .. } => {
            ApiError::Conflict { code: "duplicate_suppressed", trace_id, message: None }
        }

        CoreError::NoEligibleAgency | CoreError::NoEligibleAfterExclusion => {
            ApiError::Conflict { code: "no_eligible_agency", trace_id, message: None }
        }

        CoreError::AssignmentConflict { lead_id } => ApiError::Conflict {
            code: "assignment_conflict",
            trace_id,
            message: Some(format!("lead {lead_id} already has an active assignment")),
        },
        CoreError::CursorConflict { territory_key } => ApiError::Conflict {
            code: "cursor_conflict",
            trace_id,
            message: Some(format!("sequence cursor contention for territory {territory_key}")),
        },

        CoreError::StoreUnavailable(message) => ApiError::Internal { trace_id, message: Some(message) },
        CoreError::NotificationSinkUnavailable(message) => {
            ApiError::Internal { trace_id, message: Some(message) }
        }

        CoreError::AssignmentNotPending => {
            ApiError::Lifecycle { code: "assignment_not_pending", trace_id, message: None }
        }
        CoreError::AgencyMismatch => ApiError::Lifecycle { code: "agency_mismatch", trace_id, message: None },
        CoreError::LeadNotFound => ApiError::NotFound { code: "lead_not_found", trace_id },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use axum::http::StatusCode;

    #[test]
    fn validation_failed_maps_to_400() {
        let resp = to_api_error(CoreError::ValidationFailed(vec!["name_required".into()]), None).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn portal_unknown_maps_to_401() {
        let resp = to_api_error(CoreError::PortalUnknown, None).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn portal_inactive_maps_to_403() {
        let resp = to_api_error(CoreError::PortalInactive, None).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn assignment_not_pending_maps_to_400() {
        let resp = to_api_error(CoreError::AssignmentNotPending, None).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn lead_not_found_maps_to_404() {
        let resp = to_api_error(CoreError::LeadNotFound, None).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_unavailable_maps_to_500() {
        let resp = to_api_error(CoreError::StoreUnavailable("db down".into()), None).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
