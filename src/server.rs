use anyhow::Result;
use axum::{extract::DefaultBodyLimit, routing::{get, post}, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::broadcast};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    datasource::Datasource,
    handlers::{self, AppState},
    metrics,
    signals::{setup_signal_handlers, ShutdownSignal},
};

/// How long in-flight connections may drain after a shutdown signal
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the datasource server
///
/// This function:
/// 1. Initializes metrics
/// 2. Builds the shared datasource client
/// 3. Sets up signal handlers for graceful shutdown
/// 4. Serves requests until a shutdown signal, then drains and disposes
pub async fn start_server(config: Config) -> Result<()> {
    let metrics_handle = if config.metrics.enabled {
        info!("Initializing Prometheus metrics...");
        match metrics::init_metrics() {
            Ok(handle) => Some(Arc::new(handle)),
            Err(e) => {
                warn!("Metrics disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let datasource = Arc::new(Datasource::new(&config.datasource)?);

    let (shutdown_tx, signal_handle) = setup_signal_handlers()?;
    let shutdown_rx = shutdown_tx.subscribe();

    let state = AppState {
        datasource: datasource.clone(),
    };
    let metrics_route = metrics_handle.map(|handle| (config.metrics.endpoint.clone(), handle));
    let app = create_router(state, metrics_route);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting cloud logging datasource on {}", addr);
    info!(
        folder_id = %config.datasource.folder_id,
        derived_links = config.datasource.derived_links.len(),
        "Datasource configured"
    );

    let listener = TcpListener::bind(addr).await?;
    let served = serve_until_shutdown(listener, app, shutdown_rx).await;

    signal_handle.abort();
    datasource.dispose().await;
    served?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Serve `app` until a shutdown signal arrives, then allow [`DRAIN_TIMEOUT`] for draining
pub async fn serve_until_shutdown(
    listener: TcpListener,
    app: Router,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
) -> Result<()> {
    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = drain_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            result??;
            return Ok(());
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received, draining connections...");
        }
    }

    let _ = drain_tx.send(());
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut server).await {
        Ok(result) => result??,
        Err(_) => {
            error!("Connections did not drain within {:?}, aborting", DRAIN_TIMEOUT);
            server.abort();
        }
    }

    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(
    state: AppState,
    metrics: Option<(String, Arc<PrometheusHandle>)>,
) -> Router {
    let api_routes = Router::new()
        .route("/api/query", post(handlers::query::handle_query))
        .route("/api/resources/:path", post(handlers::resources::handle_resource))
        .route("/api/health", get(handlers::health::datasource_health))
        .with_state(state);

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(api_routes);

    if let Some((endpoint, handle)) = metrics {
        let metrics_routes = Router::new()
            .route(&endpoint, get(handlers::metrics_handler::metrics))
            .with_state(handle);
        app = app.merge(metrics_routes);
    }

    app
        // Limit request body size to 10MB
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasourceSettings;

    #[tokio::test]
    async fn test_shutdown_signal_stops_server() {
        let datasource = Arc::new(Datasource::new(&DatasourceSettings::default()).unwrap());
        let app = create_router(AppState { datasource }, None);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server = tokio::spawn(serve_until_shutdown(listener, app, shutdown_rx));
        shutdown_tx.send(ShutdownSignal::Graceful).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(10), server).await.unwrap();
        assert!(result.unwrap().is_ok());
    }
}
