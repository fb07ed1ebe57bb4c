//! HTTP surface: the dispatcher that mounts every tool, standalone tool
//! servers, and the shared middleware stack.

pub mod state;

use std::time::Duration;

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{AppConfig, ToolInfo, ToolKind};
use crate::metrics::metrics_handler;
use crate::storage::Bucket;
use crate::tools;

pub use state::AppState;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'unsafe-inline' https://cdnjs.cloudflare.com; style-src 'self' 'unsafe-inline'";
const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Dashboard entry for one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolLink {
    pub name: &'static str,
    pub display_name: &'static str,
    pub port: u16,
    pub url: &'static str,
}

pub fn tool_links() -> Vec<ToolLink> {
    ToolKind::mountable()
        .map(|info| ToolLink {
            name: info.name,
            display_name: info.display_name,
            port: info.port,
            url: info.path,
        })
        .collect()
}

async fn dashboard() -> Json<Vec<ToolLink>> {
    Json(tool_links())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "message": "efficepart is running",
    }))
}

async fn generate_redirect() -> Redirect {
    Redirect::temporary("/shift/generate")
}

fn wants_json(uri: &Uri, headers: &HeaderMap) -> bool {
    uri.path().starts_with("/api/")
        || headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("application/json"))
}

async fn not_found(uri: Uri, headers: HeaderMap) -> Response {
    if wants_json(&uri, &headers) {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "Not Found",
                "message": format!("The requested URL {} was not found on the server.", uri.path()),
            })),
        )
            .into_response()
    } else {
        (StatusCode::NOT_FOUND, "404 Not Found").into_response()
    }
}

/// Counts every response by the first path segment.
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let tool = request
        .uri()
        .path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| segment.parse::<ToolKind>().is_ok())
        .unwrap_or("main")
        .to_string();

    let response = next.run(request).await;
    state.metrics.record_request(&tool, response.status().as_u16());
    response
}

#[derive(Clone)]
struct PurgeState {
    app: AppState,
    bucket: Bucket,
}

/// Deletes expired files of the bucket before serving the request.
async fn purge_expired(State(purge): State<PurgeState>, request: Request, next: Next) -> Response {
    let store = purge.app.store(purge.bucket);
    match store.purge_expired(Utc::now()).await {
        Ok(report) if report.files > 0 => {
            purge.app.metrics.record_purge(purge.bucket.as_str(), report.files);
            info!(bucket = purge.bucket.as_str(), files = report.files, "Purged expired files");
        }
        Ok(_) => {}
        Err(e) => warn!(bucket = purge.bucket.as_str(), error = %e, "Expiry purge failed"),
    }
    next.run(request).await
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(60 * 60))
}

/// Layers shared by the dispatcher and standalone servers.
fn with_common_layers(router: Router<AppState>, state: AppState) -> Router {
    let secure = state.config.secure_cookies;
    let cors = cors_layer(&state.config);

    let security_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ));

    let mut app = router
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(security_headers);
    if secure {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS),
        ));
    }

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A tool's router with its body limit and, for the file buckets, the
/// expiry purge.
fn tool_router(info: &ToolInfo, state: &AppState) -> Option<Router<AppState>> {
    let mut router = tools::router_for(info.kind)?;

    let bucket = match info.kind {
        ToolKind::Transfer => Some(Bucket::Transfer),
        ToolKind::Gigafile => Some(Bucket::Gigafile),
        _ => None,
    };
    if let Some(bucket) = bucket {
        let purge = PurgeState {
            app: state.clone(),
            bucket,
        };
        router = router.layer(middleware::from_fn_with_state(purge, purge_expired));
    }

    if let Some(limit) = info.max_upload {
        router = router.layer(DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX)));
    }
    Some(router)
}

fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
}

/// The main application: every tool nested under its path.
pub fn build_dispatcher(state: AppState) -> Router {
    let mut router = service_routes()
        .route("/", get(dashboard))
        .route("/api/blueprints", get(dashboard))
        .route("/generate", post(generate_redirect));

    for info in ToolKind::mountable() {
        if let Some(tool) = tool_router(info, &state) {
            router = router.nest(info.path, tool);
        }
    }

    with_common_layers(router, state)
}

/// One tool on its own port, mounted at the same path prefix as in the
/// dispatcher.
pub fn build_standalone(kind: ToolKind, state: AppState) -> Router {
    let info = kind.info();
    match tool_router(info, &state) {
        Some(tool) => with_common_layers(service_routes().nest(info.path, tool), state),
        None => build_dispatcher(state),
    }
}

/// Waits for ctrl-c or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Serves each `(address, router)` pair until shutdown. One expiry sweeper
/// runs for all of them.
pub async fn serve_all(state: &AppState, apps: Vec<(String, Router)>) -> anyhow::Result<()> {
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let sweeper = state.sweeper().spawn(shutdown_tx.subscribe());

    let mut servers = Vec::with_capacity(apps.len());
    for (address, app) in apps {
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {}", address))?;
        info!(address = %address, "Server listening");

        let mut shutdown_rx = shutdown_tx.subscribe();
        servers.push(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
        }));
    }

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    for server in servers {
        server.await.context("server task panicked")??;
    }
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Sweeper task ended abnormally");
    }

    info!("Server shut down");
    Ok(())
}
