use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router;
use common_auth::{JwtConfig, JwtVerifier};
use common_http_errors::{http_error_metrics_layer, ApiError};
use lead_broker_core::capability::SystemClock;
use lead_broker_core::pipeline::batch_distribute;
use lead_broker_store::PgLeadStore;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::time::interval;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use lead_broker_gateway::admin_handlers::{audit_log_for_lead, batch_distribute_now, distribute_one, reassign};
use lead_broker_gateway::app_state::AppState;
use lead_broker_gateway::audit_adapter::GatewayAuditRecorder;
use lead_broker_gateway::config::GatewayConfig;
use lead_broker_gateway::lifecycle_handlers::{accept_lead, list_assigned, reject_lead, set_detail_status};
use lead_broker_gateway::metrics::GatewayMetrics;
use lead_broker_gateway::notifier::{run_notification_drain, ChannelNotifier};
use lead_broker_gateway::rate_limiter::InMemoryRateLimiter;
use lead_broker_gateway::webhook_handlers::ingest;

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(resp) => resp,
        Err(err) => {
            warn!(?err, "failed to render metrics");
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("metrics unavailable"))
                .expect("failed to build metrics error response")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = Arc::new(GatewayConfig::from_env()?);

    let db_pool = PgPool::connect(&config.database_url).await.context("failed to connect to database")?;
    let store: Arc<dyn lead_broker_core::store::LeadStore> = Arc::new(PgLeadStore::new(db_pool.clone()));

    let jwt_verifier = build_jwt_verifier_from_env(&config).await?;
    spawn_jwks_refresh(jwt_verifier.clone());

    let metrics = Arc::new(GatewayMetrics::new()?);
    let rate_limiter = Arc::new(InMemoryRateLimiter::new(config.rate_limit_window_secs));

    let (notification_tx, notification_rx) = tokio::sync::mpsc::channel(256);
    let notifier: Arc<dyn lead_broker_core::capability::Notifier> =
        Arc::new(ChannelNotifier::new(notification_tx, metrics.clone()));
    tokio::spawn(run_notification_drain(notification_rx));

    let audit_sink = lead_broker_store::PgAuditSink::new(db_pool.clone());
    let audit_producer = common_audit::BufferedAuditProducer::new(audit_sink, "lead-broker-gateway");
    let audit: Arc<dyn lead_broker_core::capability::AuditRecorder> =
        Arc::new(GatewayAuditRecorder::new(audit_producer));

    let state = AppState {
        store,
        notifier,
        audit,
        clock: Arc::new(SystemClock),
        jwt_verifier,
        metrics: metrics.clone(),
        rate_limiter,
        config: config.clone(),
        pg_pool: db_pool,
    };

    spawn_batch_distribute_loop(state.clone());

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderValue::from_static("x-api-key").try_into().unwrap(),
            HeaderValue::from_static("x-agency-id").try_into().unwrap(),
        ]);

    let public_routes = Router::new().route("/api/webhooks/:portal_code", post(ingest)).with_state(state.clone());

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .route("/leads", get(list_assigned))
        .route("/leads/:id/accept", put(accept_lead))
        .route("/leads/:id/reject", put(reject_lead))
        .route("/leads/:id/status", put(set_detail_status))
        .route("/admin/leads/:id/distribute", post(distribute_one))
        .route("/admin/leads/batch-distribute", post(batch_distribute_now))
        .route("/admin/leads/:id/reassign", put(reassign))
        .route("/admin/leads/:id/audit-log", get(audit_log_for_lead))
        .layer(middleware::from_fn(move |request, next| {
            let state = protected_state.clone();
            async move { auth_middleware(state, request, next).await }
        }))
        .with_state(state.clone());

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(middleware::from_fn(http_error_metrics_layer("lead-broker-gateway")))
        .layer(cors);

    let ip: std::net::IpAddr = config.host.parse().context("invalid HOST")?;
    let addr = SocketAddr::from((ip, config.port));
    info!(%addr, "starting lead-broker-gateway");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Verifies the bearer JWT once, then synthesizes the `X-User-ID` /
/// `X-Roles` / `X-Agency-ID` headers every downstream handler reads via
/// `common_security::SecurityCtxExtractor` — the same split the teacher's
/// `integration-gateway::auth_middleware` uses to keep JWT verification
/// out of individual handlers.
async fn auth_middleware(state: AppState, mut request: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(ApiError::Unauthorized { code: "missing_bearer_token", trace_id: None })?
        .to_string();

    let claims = state.jwt_verifier.verify(&token).map_err(|err| {
        warn!(error = %err, "JWT verification failed");
        ApiError::Unauthorized { code: "invalid_token", trace_id: None }
    })?;

    let headers_mut = request.headers_mut();
    headers_mut.insert(
        "X-User-ID",
        HeaderValue::from_str(&claims.subject.to_string()).expect("uuid is a valid header value"),
    );
    headers_mut.insert(
        "X-Roles",
        HeaderValue::from_str(&claims.roles.join(",")).unwrap_or(HeaderValue::from_static("")),
    );
    if !claims.has_role(common_auth::ROLE_ADMIN) {
        headers_mut.insert(
            "X-Agency-ID",
            HeaderValue::from_str(&claims.agency_id.to_string()).expect("uuid is a valid header value"),
        );
    }

    Ok(next.run(request).await)
}

async fn build_jwt_verifier_from_env(config: &GatewayConfig) -> anyhow::Result<Arc<JwtVerifier>> {
    let mut jwt_config = JwtConfig::new(config.jwt_issuer.clone(), config.jwt_audience.clone());
    if let Ok(value) = env::var("JWT_LEEWAY_SECONDS") {
        if let Ok(leeway) = value.parse::<u32>() {
            jwt_config = jwt_config.with_leeway(leeway);
        }
    }

    let mut builder = JwtVerifier::builder(jwt_config);

    if let Ok(url) = env::var("JWT_JWKS_URL") {
        info!(jwks_url = %url, "configuring JWKS fetcher");
        builder = builder.with_jwks_url(url);
    }

    if let Ok(pem) = env::var("JWT_DEV_PUBLIC_KEY_PEM") {
        warn!("using JWT_DEV_PUBLIC_KEY_PEM for verification; do not enable in production");
        builder = builder.with_rsa_pem("local-dev", pem.as_bytes()).map_err(anyhow::Error::from)?;
    }

    let verifier = builder.build().await.map_err(anyhow::Error::from)?;
    info!("JWT verifier initialised");
    Ok(Arc::new(verifier))
}

fn spawn_jwks_refresh(verifier: Arc<JwtVerifier>) {
    let Some(fetcher) = verifier.jwks_fetcher() else {
        return;
    };

    let refresh_secs = env::var("JWKS_REFRESH_SECONDS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(300)
        .max(60);
    let url = fetcher.url().to_owned();
    let handle = verifier.clone();

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(refresh_secs));
        loop {
            ticker.tick().await;
            match handle.refresh_jwks().await {
                Ok(count) => debug!(count, jwks_url = %url, "refreshed JWKS keys"),
                Err(err) => warn!(error = %err, jwks_url = %url, "failed to refresh JWKS keys"),
            }
        }
    });
}

/// Soft periodic sweep (spec §6 supplement) for leads that never got
/// picked up synchronously, e.g. a cold cache at ingest time. Bounded by
/// `BATCH_DISTRIBUTE_LIMIT` per tick so a large backlog never blocks
/// the loop indefinitely.
fn spawn_batch_distribute_loop(state: AppState) {
    let interval_secs = state.config.batch_distribute_interval_secs;
    let limit = state.config.batch_distribute_limit;

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            match batch_distribute(
                state.store.as_ref(),
                state.clock.as_ref(),
                state.notifier.as_ref(),
                state.audit.as_ref(),
                state.pipeline_config(),
                limit,
            )
            .await
            {
                Ok(outcomes) => {
                    state.metrics.set_batch_distribute_queue_depth(outcomes.len());
                    debug!(count = outcomes.len(), "batch-distribute tick completed");
                }
                Err(err) => warn!(error = %err, "batch-distribute tick failed"),
            }
        }
    });
}
