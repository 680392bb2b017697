use crate::api::{
    events::stream_status_events, middleware::allowed_clients_middleware,
    targets::handlers as target_handlers, AppState,
};
use crate::control::Controller;
use axum::http::{header, HeaderValue};
use axum::{
    routing::{get, post, put},
    Extension, Router,
};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

/// Create the API router
pub fn create_router(
    controller: Arc<Controller>,
    allowed_clients: &[IpAddr],
    static_dir: Option<PathBuf>,
) -> Router {
    let state = AppState { controller };

    let mut router = Router::new()
        .route("/api/targets", get(target_handlers::get_targets))
        .route("/api/targets/:id", get(target_handlers::get_target))
        .route("/api/targets/:id/status", get(target_handlers::get_status))
        .route("/api/targets/:id/start", post(target_handlers::start_target))
        .route("/api/targets/:id/stop", post(target_handlers::stop_target))
        .route(
            "/api/targets/:id/refresh",
            post(target_handlers::refresh_target),
        )
        .route(
            "/api/targets/:id/command",
            put(target_handlers::update_command),
        )
        .route(
            "/api/targets/:id/interval",
            put(target_handlers::update_interval),
        )
        .route("/api/events", get(stream_status_events))
        .with_state(state);

    // Add static file serving if static directory is provided
    if let Some(static_path) = static_dir {
        let index_path = static_path.join("index.html");

        // Always revalidate so a redeployed frontend is picked up
        let serve_dir = ServiceBuilder::new()
            .layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, must-revalidate"),
            ))
            .service(ServeDir::new(&static_path).not_found_service(ServeFile::new(&index_path)));

        router = router.fallback_service(serve_dir);
    }

    // Restrict the whole panel to known clients when an allowlist is configured
    if !allowed_clients.is_empty() {
        info!(
            "Client allowlist enabled - restricting access to {} address(es)",
            allowed_clients.len()
        );
        router = router
            .layer(axum::middleware::from_fn(allowed_clients_middleware))
            .layer(Extension(Arc::new(allowed_clients.to_vec())));
    }

    router
}

/// Serve `router` until `signal` resolves, then stop the controller.
///
/// The stop signal is raised as soon as `signal` fires, before axum waits for
/// open connections. That closes event streams so graceful shutdown can finish,
/// and keeps poll loops from scheduling further ticks meanwhile.
pub async fn serve_until<F>(
    listener: TcpListener,
    router: Router,
    controller: Arc<Controller>,
    signal: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let stopper = Arc::clone(&controller);
    let served = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        signal.await;
        info!("Shutdown requested, closing event streams and stopping pollers");
        stopper.request_stop();
    })
    .await;

    info!("Waiting for in-flight status polls");
    controller.shutdown().await;
    served
}
