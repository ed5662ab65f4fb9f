use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tabrun_core::redact::Credentials;
use tabrun_core::scripting::tabular_editor::TabularEditorExecutor;
use tabrun_events::{EventBus, EventLog};
use tabrun_pipeline::Orchestrator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tabrun_api::config::ServerConfig;
use tabrun_api::router::build_app_router;
use tabrun_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tabrun_api=debug,tabrun_pipeline=debug,tabrun_events=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid configuration");
    tracing::info!(
        host = %config.host,
        port = %config.port,
        executable = %config.executor.executable.display(),
        scripts_dir = %config.executor.scripts_dir.display(),
        max_attempts = config.retry.max_attempts,
        backoff_secs = config.retry.backoff.as_secs(),
        "Loaded server configuration",
    );

    // --- Credentials ---
    let credentials = Credentials::from_env();
    if !credentials.is_complete() {
        tracing::warn!("ClientId, TenantId or ClientSecret is not set; stages will fail to connect");
    }
    let redactor = credentials.redactor();

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let event_log_handle = tokio::spawn(EventLog::run(event_bus.subscribe()));
    tracing::info!("Event bus created");

    // --- Orchestrator ---
    let executor = Arc::new(TabularEditorExecutor::new(config.executor.clone(), credentials));
    let orchestrator = Arc::new(Orchestrator::new(
        executor,
        redactor,
        config.retry,
        Arc::clone(&event_bus),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Interrupt in-flight runs; they are marked Terminated.
    orchestrator
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;

    // Dropping the last bus sender closes the channel and stops the event log.
    drop(orchestrator);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), event_log_handle).await;
    tracing::info!("Event log shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
