use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, Opts, Registry};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<String>>,
}

/// The broker's HTTP-facing error taxonomy. Every typed error that can cross
/// a component boundary has exactly one variant here, and every variant maps
/// to exactly one status code.
#[derive(Debug)]
pub enum ApiError {
    /// Auth: PortalUnknown / PortalAuthFailed / an agency's token doesn't match.
    Unauthorized { code: &'static str, trace_id: Option<Uuid> },
    /// Auth: PortalInactive, or a caller authenticated but lacks the role/agency for this action.
    Forbidden { code: &'static str, trace_id: Option<Uuid> },
    ForbiddenMissingRole { role: &'static str, trace_id: Option<Uuid> },
    /// Input: ValidationFailed{reasons}, malformed ids, malformed headers.
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    /// Input: ValidationFailed specifically, carrying the list of violated rules.
    ValidationFailed { violations: Vec<String>, trace_id: Option<Uuid> },
    NotFound { code: &'static str, trace_id: Option<Uuid> },
    /// Conflict: AssignmentConflict / CursorConflict that could not be resolved locally.
    Conflict { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    /// Lifecycle: AssignmentNotPending, AgencyMismatch, LeadNotFound.
    Lifecycle { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    /// Infrastructure: StoreUnavailable and friends. Safe to retry.
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self {
        Self::Internal { trace_id, message: Some(e.to_string()) }
    }

    pub fn bad_request(code: &'static str, trace_id: Option<Uuid>) -> Self {
        Self::BadRequest { code, trace_id, message: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body, error_code) = match self {
            ApiError::Unauthorized { code, trace_id } => (
                StatusCode::UNAUTHORIZED,
                ErrorBody { code: code.into(), missing_role: None, trace_id, message: None, violations: None },
                code,
            ),
            ApiError::Forbidden { code, trace_id } => (
                StatusCode::FORBIDDEN,
                ErrorBody { code: code.into(), missing_role: None, trace_id, message: None, violations: None },
                code,
            ),
            ApiError::ForbiddenMissingRole { role, trace_id } => (
                StatusCode::FORBIDDEN,
                ErrorBody { code: "missing_role".into(), missing_role: Some(role.into()), trace_id, message: None, violations: None },
                "missing_role",
            ),
            ApiError::BadRequest { code, trace_id, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { code: code.into(), missing_role: None, trace_id, message, violations: None },
                code,
            ),
            ApiError::ValidationFailed { violations, trace_id } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "validation_failed".into(),
                    missing_role: None,
                    trace_id,
                    message: None,
                    violations: Some(violations),
                },
                "validation_failed",
            ),
            ApiError::NotFound { code, trace_id } => (
                StatusCode::NOT_FOUND,
                ErrorBody { code: code.into(), missing_role: None, trace_id, message: None, violations: None },
                code,
            ),
            ApiError::Conflict { code, trace_id, message } => (
                StatusCode::CONFLICT,
                ErrorBody { code: code.into(), missing_role: None, trace_id, message, violations: None },
                code,
            ),
            ApiError::Lifecycle { code, trace_id, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { code: code.into(), missing_role: None, trace_id, message, violations: None },
                code,
            ),
            ApiError::Internal { trace_id, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody { code: "internal_error".into(), missing_role: None, trace_id, message, violations: None },
                "internal_error",
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
        &["service", "code", "status"],
    )
    .expect("metric options are valid")
});

/// Registers the shared `http_errors_total` counter on `registry` once, so each
/// service's `/metrics` output carries it without redefining the metric itself.
pub fn register_http_error_metrics(registry: &Registry) {
    // Registering the same collector on multiple registries is harmless; duplicate
    // registration on the *same* registry is the only error case, which we ignore.
    let _ = registry.register(Box::new(HTTP_ERRORS_TOTAL.clone()));
}

/// Axum middleware that increments `http_errors_total` for every response whose
/// status is >= 400, tagged by the `X-Error-Code` header `ApiError` sets.
pub fn http_error_metrics_layer(
    service: &'static str,
) -> impl Fn(Request<Body>, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>> + Clone {
    move |req: Request<Body>, next: Next| {
        Box::pin(async move {
            let resp = next.run(req).await;
            let status = resp.status();
            if status.as_u16() >= 400 {
                let code = resp
                    .headers()
                    .get("X-Error-Code")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                HTTP_ERRORS_TOTAL
                    .with_label_values(&[service, code, status.as_str()])
                    .inc();
            }
            resp
        })
    }
}
