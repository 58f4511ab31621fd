use crate::api::views;
use crate::api::AppState;
use crate::dashboard;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Upper bound on a single request, including any warehouse round trips.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let dashboard_cors = build_dashboard_cors(state.dashboard_origin.as_deref());

    let view_routes = Router::new()
        .route("/views/summary", get(views::get_summary))
        .route("/views/fico-dropoff", get(views::get_fico_dropoff))
        .route("/views/term-selection", get(views::get_term_selection))
        .route("/views/aov", get(views::get_aov))
        .route("/views/zero-apr", get(views::get_zero_apr))
        .route("/cache/clear", post(views::clear_cache))
        .layer(dashboard_cors);

    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
        .route("/metrics", get(prometheus_metrics))
        .nest("/api", view_routes)
        .route("/", get(dashboard::serve_index))
        .route("/{*path}", get(dashboard::serve_asset))
        .layer(axum::middleware::map_response(add_security_headers))
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Inject OWASP-recommended security headers on every HTTP response.
async fn add_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    // Views carry credit-score aggregates; intermediaries must not store them.
    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }
    let is_html = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("text/html"));
    if is_html {
        headers.insert(
            "content-security-policy",
            HeaderValue::from_static("default-src 'self'; script-src 'self'; style-src 'self'"),
        );
    }
    response
}

/// Build CORS layer for the API routes based on configured origin.
fn build_dashboard_cors(dashboard_origin: Option<&str>) -> CorsLayer {
    dashboard_origin.map_or_else(
        || {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any)
        },
        |origin| {
            let allowed_origin = origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("null"));
            CorsLayer::new()
                .allow_origin(allowed_origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
        },
    )
}

/// GET /health: Simple health check endpoint.
async fn health_check() -> &'static str {
    "ok"
}

/// GET /health/detailed: Cache and warehouse session details.
async fn detailed_health_check(
    State(state): State<Arc<AppState>>,
) -> axum::Json<serde_json::Value> {
    let cache = state.service.cache();

    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "source": state.service.table().to_string(),
        "auth_method": state.auth_method,
        "cache_entries": cache.len(),
        "cache_ttl_secs": cache.ttl().num_seconds(),
        "queries_executed": state.service.queries_executed(),
    }))
}

/// GET /metrics: Prometheus-compatible metrics endpoint.
async fn prometheus_metrics(
    State(state): State<Arc<AppState>>,
) -> ([(header::HeaderName, &'static str); 1], String) {
    use std::fmt::Write;

    let cache = state.service.cache();
    let cache_entries = cache.len();
    let cache_ttl = cache.ttl().num_seconds();
    let queries = state.service.queries_executed();

    let mut out = String::with_capacity(512);
    let _ = writeln!(
        out,
        "# HELP funnel_cache_entries Number of cached warehouse results"
    );
    let _ = writeln!(out, "# TYPE funnel_cache_entries gauge");
    let _ = writeln!(out, "funnel_cache_entries {cache_entries}");
    let _ = writeln!(
        out,
        "# HELP funnel_cache_ttl_seconds Lifetime of a cached warehouse result"
    );
    let _ = writeln!(out, "# TYPE funnel_cache_ttl_seconds gauge");
    let _ = writeln!(out, "funnel_cache_ttl_seconds {cache_ttl}");
    let _ = writeln!(
        out,
        "# HELP funnel_queries_executed_total Statements answered by the warehouse since startup"
    );
    let _ = writeln!(out, "# TYPE funnel_queries_executed_total counter");
    let _ = writeln!(out, "funnel_queries_executed_total {queries}");

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], out)
}
