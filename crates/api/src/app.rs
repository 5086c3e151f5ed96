use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use shared::jwt::JwtConfig;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_operator_auth,
    security_headers_middleware, trace_id, OperatorAuth, RateLimiterState,
};
use crate::routes::{forms, health, mapping_datasets, public_forms, submissions};
use crate::services::attempt_limiter::AttemptLimiter;
use crate::services::email::EmailDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    /// Operator token verifier; `None` when no keys are configured.
    pub jwt: Option<Arc<JwtConfig>>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
    pub attempt_limiter: Arc<AttemptLimiter>,
    pub email: Arc<dyn EmailDispatcher>,
}

/// Builds the router with an explicit email dispatcher.
pub fn create_app_with_email(
    config: Config,
    pool: PgPool,
    email: Arc<dyn EmailDispatcher>,
) -> Router {
    let attempt_limiter = Arc::new(AttemptLimiter::in_memory(config.rate_limits.clone()));
    create_app_with_state(config, pool, email, attempt_limiter)
}

/// Builds the router around a shared attempt limiter, so a background sweep
/// can purge the same store the handlers use.
pub fn create_app_with_state(
    config: Config,
    pool: PgPool,
    email: Arc<dyn EmailDispatcher>,
    attempt_limiter: Arc<AttemptLimiter>,
) -> Router {
    let config = Arc::new(config);

    // Operator rate limiting is disabled when rate_limit_per_minute is 0
    let rate_limiter = if config.security.rate_limit_per_minute > 0 {
        Some(Arc::new(RateLimiterState::new(
            config.security.rate_limit_per_minute,
        )))
    } else {
        None
    };

    let jwt = match OperatorAuth::create_jwt_config(&config.jwt) {
        Ok(jwt) => Some(Arc::new(jwt)),
        Err(e) => {
            warn!(error = %e, "Operator endpoints disabled: JWT keys not usable");
            None
        }
    };

    let state = AppState {
        pool,
        config: config.clone(),
        jwt,
        rate_limiter,
        attempt_limiter,
        email,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Public widget routes; each handler applies its own attempt limit
    let public_form_routes = Router::new()
        .route("/api/v1/forms/:id", get(public_forms::get_public_form))
        .route("/api/v1/forms/:id/submit", post(public_forms::submit_form))
        .route("/api/v1/forms/resend-code", post(public_forms::resend_code))
        .route(
            "/api/v1/forms/validate-email",
            post(public_forms::validate_email),
        );

    // Operator routes
    // Middleware order: auth runs first, then rate limiting (which needs the operator id)
    let operator_routes = Router::new()
        .route("/api/v1/forms", post(forms::create_form))
        .route(
            "/api/v1/forms/:id/mappings",
            get(forms::get_form_mappings).put(forms::replace_form_mappings),
        )
        .route(
            "/api/v1/forms/:id/submissions",
            get(forms::list_form_submissions),
        )
        .route(
            "/api/v1/submissions/:id/propagate",
            post(submissions::propagate_submission),
        )
        .route(
            "/api/v1/mapping-datasets",
            get(mapping_datasets::list_datasets).post(mapping_datasets::create_dataset),
        )
        .route(
            "/api/v1/mapping-datasets/test-sql",
            post(mapping_datasets::test_sql),
        )
        .route(
            "/api/v1/mapping-datasets/tables",
            get(mapping_datasets::available_tables),
        )
        .route(
            "/api/v1/mapping-datasets/:id",
            get(mapping_datasets::get_dataset)
                .put(mapping_datasets::update_dataset)
                .delete(mapping_datasets::delete_dataset),
        )
        .route(
            "/api/v1/mapping-datasets/:id/apply",
            post(mapping_datasets::apply_dataset),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_operator_auth,
        ));

    // Health and metrics (no authentication required)
    let health_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(health_routes)
        .merge(public_form_routes)
        .merge(operator_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
