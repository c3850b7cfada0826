use anyhow::Result;
use futures::future::join_all;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resilia_backend::{
    api::{suites::stop_locked, AppState},
    chaos::PumbaRunner,
    config::Config,
    create_router,
    db::Database,
    k8s::K8sClient,
    suite::SuiteEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize tracing
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    );
    if config.json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Resilia Backend");

    // Initialize database
    let db = Database::new(&config.database_url).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    let metrics = PrometheusBuilder::new().install_recorder()?;

    // Connect to Kubernetes
    let k8s = Arc::new(K8sClient::connect(config.kubeconfig.as_deref(), &config.namespace).await?);
    if let Err(e) = k8s.health_check().await {
        tracing::warn!("Kubernetes cluster not reachable yet: {}", e);
    }

    let runner = Arc::new(PumbaRunner::new(k8s.clone(), config.pumba_settings()));
    let engine = Arc::new(SuiteEngine::new(k8s, runner, Arc::new(db.clone())));

    // Build application state
    let state = AppState::new(db, config.clone(), engine).with_metrics(metrics);
    let restored = state.restore_live_suites().await?;
    if restored > 0 {
        tracing::info!(restored, "Restored live suites");
    }

    // Build router
    let app = create_router(state.clone());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    teardown_live_suites(&state, Duration::from_secs(config.shutdown_timeout_secs)).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Stop every live suite concurrently, giving up after `timeout`
async fn teardown_live_suites(state: &AppState, timeout: Duration) {
    let suites = state.suites.all().await;
    let stops = suites.into_iter().map(|shared| async move {
        let mut suite = shared.lock().await;
        if !suite.state.is_live() {
            return;
        }
        tracing::info!(suite_id = %suite.id, "Tearing down suite");
        if let Err(e) = stop_locked(state, &mut suite).await {
            tracing::error!(suite_id = %suite.id, error = %e, "Suite teardown failed");
        }
    });

    if tokio::time::timeout(timeout, join_all(stops)).await.is_err() {
        tracing::warn!(timeout_secs = timeout.as_secs(), "Suite teardown timed out");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received");
}
