// lib.rs - Content studio service: shared state and the HTTP router
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod services;
pub mod vendor;

// Vendor clients
pub mod a2e_client;
pub mod apify_client;
pub mod elevenlabs_client;
pub mod fal_client;
pub mod getty_client;
pub mod openai_client;
pub mod pexels_client;
pub mod replicate_client;
pub mod steve_ai_client;
pub mod youtube_client;

use axum::{extract::Extension, response::Json, routing::get, Router};
use config::Config;
use error::{ApiResult, AppError};
use jobs::poller::PollPolicy;
use jobs::sink::AppJobSink;
use jobs::{JobManager, JobSink, SharedJobManager};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};

// AppState holds the database pool, one client per configured vendor, and the job manager
pub struct AppState {
    pub config: Config,
    pub db_pool: sqlx::PgPool,
    pub openai_client: Option<openai_client::OpenAIClient>,
    pub elevenlabs_client: Option<elevenlabs_client::ElevenLabsClient>, // 🎙️ Voiceovers
    pub fal_client: Option<fal_client::FalClient>,
    pub a2e_client: Option<a2e_client::A2EClient>,
    pub steve_ai_client: Option<steve_ai_client::SteveAIClient>,
    pub replicate_client: Option<replicate_client::ReplicateClient>,
    pub pexels_client: Option<pexels_client::PexelsClient>,
    pub getty_client: Option<getty_client::GettyClient>,
    pub apify_client: Option<apify_client::ApifyClient>, // 👂 Social listening
    pub youtube: youtube_client::YouTubeClient,          // 📺 OAuth + uploads
    pub job_manager: SharedJobManager,
    pub job_sink: Arc<dyn JobSink>,
}

fn configured<T>(client: Option<T>, name: &str) -> Option<T> {
    if client.is_none() {
        tracing::warn!("{} credentials not found. Those features will be disabled.", name);
    }
    client
}

impl AppState {
    /// Build clients for every vendor that has credentials
    pub fn from_config(config: Config, db_pool: sqlx::PgPool) -> Self {
        let openai_client = configured(
            config
                .openai_api_key
                .clone()
                .map(|key| openai_client::OpenAIClient::new(key, config.openai_model.clone())),
            "OpenAI",
        );
        let elevenlabs_client = configured(
            config
                .elevenlabs_api_key
                .clone()
                .map(elevenlabs_client::ElevenLabsClient::new),
            "ElevenLabs",
        );
        let fal_client = configured(config.fal_key.clone().map(fal_client::FalClient::new), "Fal.ai");
        let a2e_client = configured(config.a2e_api_key.clone().map(a2e_client::A2EClient::new), "A2E");
        let steve_ai_client = configured(
            config
                .steve_ai_api_key
                .clone()
                .map(|key| steve_ai_client::SteveAIClient::new(key, config.steve_ai_base_url.clone())),
            "Steve.ai",
        );
        let replicate_client = configured(
            config
                .replicate_api_token
                .clone()
                .map(replicate_client::ReplicateClient::new),
            "Replicate",
        );
        let pexels_client = configured(
            config.pexels_api_key.clone().map(pexels_client::PexelsClient::new),
            "Pexels",
        );
        let getty_client = configured(
            config.getty_api_key.clone().map(getty_client::GettyClient::new),
            "Getty Images",
        );
        let apify_client = configured(config.apify_token.clone().map(apify_client::ApifyClient::new), "Apify");

        let job_sink: Arc<dyn JobSink> = Arc::new(AppJobSink::new(db_pool.clone(), apify_client.clone()));

        Self {
            config,
            db_pool,
            openai_client,
            elevenlabs_client,
            fal_client,
            a2e_client,
            steve_ai_client,
            replicate_client,
            pexels_client,
            getty_client,
            apify_client,
            youtube: youtube_client::YouTubeClient::new(),
            job_manager: Arc::new(JobManager::new()),
            job_sink,
        }
    }

    pub fn openai(&self) -> ApiResult<&openai_client::OpenAIClient> {
        self.openai_client.as_ref().ok_or(AppError::NotConfigured("OpenAI"))
    }

    pub fn elevenlabs(&self) -> ApiResult<&elevenlabs_client::ElevenLabsClient> {
        self.elevenlabs_client.as_ref().ok_or(AppError::NotConfigured("ElevenLabs"))
    }

    pub fn fal(&self) -> ApiResult<&fal_client::FalClient> {
        self.fal_client.as_ref().ok_or(AppError::NotConfigured("Fal.ai"))
    }

    pub fn a2e(&self) -> ApiResult<&a2e_client::A2EClient> {
        self.a2e_client.as_ref().ok_or(AppError::NotConfigured("A2E"))
    }

    pub fn steve_ai(&self) -> ApiResult<&steve_ai_client::SteveAIClient> {
        self.steve_ai_client.as_ref().ok_or(AppError::NotConfigured("Steve.ai"))
    }

    pub fn replicate(&self) -> ApiResult<&replicate_client::ReplicateClient> {
        self.replicate_client.as_ref().ok_or(AppError::NotConfigured("Replicate"))
    }

    pub fn pexels(&self) -> ApiResult<&pexels_client::PexelsClient> {
        self.pexels_client.as_ref().ok_or(AppError::NotConfigured("Pexels"))
    }

    pub fn getty(&self) -> ApiResult<&getty_client::GettyClient> {
        self.getty_client.as_ref().ok_or(AppError::NotConfigured("Getty Images"))
    }

    pub fn apify(&self) -> ApiResult<&apify_client::ApifyClient> {
        self.apify_client.as_ref().ok_or(AppError::NotConfigured("Apify"))
    }

    /// Polling policy for render jobs
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.config.poll.interval,
            max_attempts: self.config.poll.max_attempts,
            max_consecutive_errors: self.config.poll.max_consecutive_errors,
        }
    }

    /// Lip-sync jobs give up sooner
    pub fn lipsync_policy(&self) -> PollPolicy {
        self.poll_policy()
            .with_max_attempts(self.config.poll.lipsync_max_attempts)
    }
}

/// Build our application with all routes and shared state
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(handlers::auth::auth_routes())
        .merge(handlers::briefs::brief_routes())
        .merge(handlers::content::content_routes())
        .merge(handlers::generate::generate_routes())
        .merge(handlers::media::media_routes())
        .merge(handlers::listening::listening_routes())
        .merge(handlers::jobs::job_routes())
        .merge(handlers::social::social_routes())
        .route("/api/status", get(api_status))
        .nest_service("/media", ServeDir::new(&state.config.media_dir))
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

fn service_status(configured: bool) -> &'static str {
    if configured {
        "configured"
    } else {
        "not_configured"
    }
}

// API Status endpoint
async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let db_status = match sqlx::query("SELECT 1").fetch_one(&state.db_pool).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let google_oauth = state.config.google_oauth_client_id.is_some() && state.config.google_oauth_client_secret.is_some();

    Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": db_status,
            "openai": service_status(state.openai_client.is_some()),
            "elevenlabs": service_status(state.elevenlabs_client.is_some()),
            "fal": service_status(state.fal_client.is_some()),
            "a2e": service_status(state.a2e_client.is_some()),
            "steve_ai": service_status(state.steve_ai_client.is_some()),
            "replicate": service_status(state.replicate_client.is_some()),
            "pexels": service_status(state.pexels_client.is_some()),
            "getty": service_status(state.getty_client.is_some()),
            "apify": service_status(state.apify_client.is_some()),
            "youtube_oauth": service_status(google_oauth),
        }
    }))
}
