use content_studio::{build_router, config::Config, db, AppState};
use std::sync::Arc;
use std::time::Duration;

/// Finished jobs are kept this long for status queries
const FINISHED_JOB_RETENTION_HOURS: i64 = 24;
const JOB_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = Config::from_env()?;

    if let Err(e) = std::fs::create_dir_all(&config.media_dir) {
        tracing::warn!("Failed to create media directory {}: {}", config.media_dir, e);
    } else {
        tracing::info!("Media directory ready: {}", config.media_dir);
    }

    let db_pool = db::create_pool(&config).await.map_err(|e| {
        tracing::error!("Failed to create database pool: {}", e);
        e
    })?;

    let bind_addr = config.bind_addr.clone();
    let shared_state = Arc::new(AppState::from_config(config, db_pool));

    // Drop finished jobs once nobody is likely to poll them
    let cleanup_manager = shared_state.job_manager.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(JOB_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = cleanup_manager
                .cleanup_finished(chrono::Duration::hours(FINISHED_JOB_RETENTION_HOURS))
                .await;
            if removed > 0 {
                tracing::info!("🧹 Removed {} finished jobs", removed);
            }
        }
    });

    let app = build_router(shared_state);

    // Run the server with ConnectInfo to provide socket addresses for rate limiting
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;

    Ok(())
}

// Production-grade logging configuration
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,content_studio=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,content_studio=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for log aggregation
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();

    tracing::info!("🎬 Content studio starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);

    Ok(())
}
