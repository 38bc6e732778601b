use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use visionary_api::background::BackgroundPolling;
use visionary_api::config::ServerConfig;
use visionary_api::router::build_app_router;
use visionary_api::state::AppState;
use visionary_pipeline::{PgHistoryStore, PipelineConfig, PipelineContext, PromptEnhancer, ProviderConfig};
use visionary_replicate::ReplicateApi;
use visionary_storage::{HttpMediaFetcher, SupabaseStorage};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "visionary_api=debug,visionary_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    let providers = ProviderConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        face_swap_model = %pipeline_config.face_swap_model,
        background_polling = pipeline_config.background_polling,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = visionary_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    visionary_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    visionary_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- External services ---
    let inference = Arc::new(ReplicateApi::new(
        providers.replicate_api_url,
        providers.replicate_api_token,
    ));
    let storage = Arc::new(SupabaseStorage::new(
        providers.supabase_url,
        providers.supabase_service_key,
    ));
    let fetcher = Arc::new(HttpMediaFetcher::new());
    let history = Arc::new(PgHistoryStore::new(pool.clone()));

    let mut pipeline = PipelineContext::new(inference, storage, fetcher, history, pipeline_config);
    match providers.llm_api_key {
        Some(key) => {
            pipeline = pipeline.with_enhancer(PromptEnhancer::new(
                providers.llm_api_url,
                key,
                providers.llm_model,
            ));
            tracing::info!("Prompt enhancement enabled");
        }
        None => tracing::info!("LLM_API_KEY not set, prompt enhancement disabled"),
    }

    // --- App state ---
    let background = BackgroundPolling::new();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        pipeline,
        background: background.clone(),
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
    tracing::info!(
        active_polls = background.active(),
        "Server stopped accepting connections, stopping background polling"
    );
    background
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;

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
