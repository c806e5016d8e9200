// Generation endpoints: text via OpenAI, voiceover via ElevenLabs, media via the
// async vendors. Media calls return a job id; clients poll /api/jobs/:id.

use super::briefs::{load_brief, load_optional_brief};
use super::content::load_content;
use super::jobs::{shared, track};
use crate::elevenlabs_client::DefaultVoices;
use crate::error::{ApiResult, AppError};
use crate::fal_client::{self, FalModels};
use crate::jobs::poller::{ExternalJob, JobStatusSource};
use crate::jobs::{JobKind, JobTarget, NewJob, Submission};
use crate::middleware::auth::{auth_middleware, CurrentUser};
use crate::models::content::{ContentType, NewContent};
use crate::replicate_client::{self, ReplicateModels};
use crate::services::ContentService;
use crate::AppState;
use axum::{
    extract::Extension,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_SCENE_COUNT: usize = 4;
const MAX_SCENE_COUNT: usize = 10;
const MAX_VOICEOVER_CHARS: usize = 5000;
const DEFAULT_ASPECT_RATIO: &str = "9:16";
const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

pub fn generate_routes() -> Router {
    Router::new()
        .route("/api/generate/script", post(generate_script))
        .route("/api/generate/caption", post(generate_caption))
        .route("/api/generate/voiceover", post(generate_voiceover))
        .route("/api/voices", get(list_voices))
        .route("/api/generate/image", post(generate_image))
        .route("/api/generate/video", post(generate_video))
        .route("/api/generate/scenes", post(generate_scenes))
        .route("/api/generate/lipsync", post(generate_lipsync))
        .layer(axum::middleware::from_fn(auth_middleware))
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ScriptRequest {
    pub brief_id: i32,
    pub platform: String,
    pub topic: String,
    pub scene_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CaptionRequest {
    pub brief_id: Option<i32>,
    pub platform: String,
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct VoiceoverRequest {
    pub text: String,
    pub voice: Option<String>,
    pub content_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub engine: Option<String>,
    pub content_id: Option<i32>,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoRequest {
    pub content_id: i32,
    pub engine: String,
    pub prompt: Option<String>,
    pub anchor_id: Option<String>,
    pub template: Option<String>,
    pub aspect_ratio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScenesRequest {
    pub content_id: i32,
    pub engine: Option<String>,
    pub aspect_ratio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LipSyncRequest {
    pub video_url: String,
    pub audio_url: String,
    pub engine: Option<String>,
    pub content_id: Option<i32>,
}

/// Vendor choice for a media request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    OpenAI,
    Fal,
    A2e,
    SteveAi,
    Replicate,
}

impl FromStr for Engine {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Engine::OpenAI),
            "fal" => Ok(Engine::Fal),
            "a2e" => Ok(Engine::A2e),
            "steve_ai" | "steveai" => Ok(Engine::SteveAi),
            "replicate" => Ok(Engine::Replicate),
            other => Err(AppError::BadRequest(format!("Unknown engine '{}'", other))),
        }
    }
}

impl Engine {
    fn name(&self) -> &'static str {
        match self {
            Engine::OpenAI => "openai",
            Engine::Fal => "fal",
            Engine::A2e => "a2e",
            Engine::SteveAi => "steve_ai",
            Engine::Replicate => "replicate",
        }
    }
}

/// Parse an engine and check it is one of `allowed`; `None` picks the first
pub fn parse_engine(engine: Option<&str>, allowed: &[Engine]) -> ApiResult<Engine> {
    let engine = match engine.map(str::trim).filter(|e| !e.is_empty()) {
        Some(e) => e.parse()?,
        None => return allowed.first().copied().ok_or_else(|| AppError::Internal("No engines".to_string())),
    };
    if allowed.contains(&engine) {
        Ok(engine)
    } else {
        let names: Vec<&str> = allowed.iter().map(Engine::name).collect();
        Err(AppError::BadRequest(format!(
            "Engine '{}' is not supported here; use one of {}",
            engine.name(),
            names.join(", ")
        )))
    }
}

pub fn validate_scene_count(scene_count: Option<usize>) -> ApiResult<usize> {
    match scene_count.unwrap_or(DEFAULT_SCENE_COUNT) {
        n @ 1..=MAX_SCENE_COUNT => Ok(n),
        n => Err(AppError::BadRequest(format!(
            "scene_count must be between 1 and {} (got {})",
            MAX_SCENE_COUNT, n
        ))),
    }
}

fn require(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        Err(AppError::BadRequest(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

fn require_url(value: &str, field: &str) -> ApiResult<()> {
    let value = value.trim();
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("{} must be an http(s) URL", field)))
    }
}

fn job_response(submission: &Submission, engine: Engine) -> Value {
    json!({
        "success": true,
        "engine": engine.name(),
        "job_id": submission.job_id,
        "deduplicated": submission.deduplicated,
        "status_url": format!("/api/jobs/{}", submission.job_id),
    })
}

// ============================================================================
// Text
// ============================================================================

async fn generate_script(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<ScriptRequest>,
) -> ApiResult<Json<Value>> {
    require(&request.platform, "platform")?;
    require(&request.topic, "topic")?;
    let scene_count = validate_scene_count(request.scene_count)?;

    let openai = state.openai()?;
    let brief = load_brief(&state, user.id, request.brief_id).await?;

    tracing::info!("✍️ Generating {}-scene {} script for user {}", scene_count, request.platform, user.id);
    let draft = openai
        .generate_script(Some(&brief), &request.platform, &request.topic, scene_count)
        .await?;

    let content = ContentService::create(
        &state.db_pool,
        &NewContent {
            user_id: user.id,
            brief_id: Some(brief.id),
            platform: request.platform.trim().to_lowercase(),
            content_type: ContentType::Script,
            title: draft.title,
            body: draft.body,
            hashtags: draft.hashtags,
            scenes: draft.scenes,
        },
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "content": content
    })))
}

async fn generate_caption(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CaptionRequest>,
) -> ApiResult<Json<Value>> {
    require(&request.platform, "platform")?;
    require(&request.topic, "topic")?;

    let openai = state.openai()?;
    let brief = load_optional_brief(&state, user.id, request.brief_id).await?;

    let draft = openai
        .generate_caption(brief.as_ref(), &request.platform, &request.topic)
        .await?;

    let content = ContentService::create(
        &state.db_pool,
        &NewContent {
            user_id: user.id,
            brief_id: brief.as_ref().map(|b| b.id),
            platform: request.platform.trim().to_lowercase(),
            content_type: ContentType::Caption,
            title: request.topic.trim().to_string(),
            body: draft.caption,
            hashtags: draft.hashtags,
            scenes: Vec::new(),
        },
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "content": content
    })))
}

// ============================================================================
// Audio
// ============================================================================

async fn generate_voiceover(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<VoiceoverRequest>,
) -> ApiResult<Json<Value>> {
    require(&request.text, "text")?;
    if request.text.chars().count() > MAX_VOICEOVER_CHARS {
        return Err(AppError::BadRequest(format!(
            "text must be at most {} characters",
            MAX_VOICEOVER_CHARS
        )));
    }

    let elevenlabs = state.elevenlabs()?;
    if let Some(content_id) = request.content_id {
        load_content(&state, user.id, content_id).await?;
    }

    let voice_id = DefaultVoices::resolve(request.voice.as_deref());
    let audio = elevenlabs
        .text_to_speech(request.text.trim(), &voice_id, None, None)
        .await?;

    let file_name = format!("voiceover_{}.mp3", Uuid::new_v4());
    let path = std::path::Path::new(&state.config.media_dir).join(&file_name);
    tokio::fs::write(&path, &audio).await.map_err(|e| {
        AppError::Internal(format!("Failed to save audio to {}: {}", path.display(), e))
    })?;

    let audio_url = state.config.media_url(&file_name);
    if let Some(content_id) = request.content_id {
        ContentService::set_audio_url(&state.db_pool, user.id, content_id, &audio_url).await?;
    }

    tracing::info!("🎙️ Saved voiceover {} ({} bytes) for user {}", file_name, audio.len(), user.id);

    Ok(Json(json!({
        "success": true,
        "audio_url": audio_url,
        "voice_id": voice_id,
        "bytes": audio.len()
    })))
}

async fn list_voices(Extension(state): Extension<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let elevenlabs = state.elevenlabs()?;
    let voices = elevenlabs.list_voices().await?;
    let defaults: Vec<Value> = DefaultVoices::ALL
        .iter()
        .map(|(name, id)| json!({ "name": name, "voice_id": id }))
        .collect();

    Ok(Json(json!({
        "success": true,
        "voices": voices,
        "defaults": defaults
    })))
}

// ============================================================================
// Images and video
// ============================================================================

async fn generate_image(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<ImageRequest>,
) -> ApiResult<Json<Value>> {
    require(&request.prompt, "prompt")?;
    let engine = parse_engine(
        request.engine.as_deref(),
        &[Engine::OpenAI, Engine::Fal, Engine::Replicate],
    )?;
    if let Some(content_id) = request.content_id {
        load_content(&state, user.id, content_id).await?;
    }

    let external = match engine {
        Engine::OpenAI => {
            let size = request.size.as_deref().unwrap_or(DEFAULT_IMAGE_SIZE);
            let url = state.openai()?.generate_image(request.prompt.trim(), size).await?;
            if let Some(content_id) = request.content_id {
                ContentService::set_media_ready(&state.db_pool, content_id, &url).await?;
            }
            return Ok(Json(json!({
                "success": true,
                "engine": engine.name(),
                "image_url": url
            })));
        }
        Engine::Fal => {
            let fal = state.fal()?;
            let job = fal.submit(FalModels::IMAGE, &fal_client::image_input(request.prompt.trim())).await?;
            (job, shared(fal))
        }
        _ => {
            let replicate = state.replicate()?;
            let job = replicate
                .create_prediction(ReplicateModels::IMAGE, replicate_client::image_input(request.prompt.trim()))
                .await?;
            (job, shared(replicate))
        }
    };

    let target = match request.content_id {
        Some(content_id) => {
            ContentService::mark_media_processing(&state.db_pool, content_id).await?;
            JobTarget::ContentMedia { content_id }
        }
        None => JobTarget::None,
    };

    let (job, source) = external;
    let submission = track(
        &state,
        NewJob {
            user_id: user.id,
            kind: JobKind::Image,
            external: job,
            target,
        },
        source,
        state.poll_policy(),
    )
    .await;

    Ok(Json(job_response(&submission, engine)))
}

async fn generate_video(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<VideoRequest>,
) -> ApiResult<Json<Value>> {
    let engine = parse_engine(
        Some(&request.engine),
        &[Engine::Fal, Engine::A2e, Engine::SteveAi, Engine::Replicate],
    )?;
    let content = load_content(&state, user.id, request.content_id).await?;
    let aspect_ratio = request.aspect_ratio.as_deref().unwrap_or(DEFAULT_ASPECT_RATIO);

    let prompt = request
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(content.body.as_str())
        .to_string();
    if prompt.trim().is_empty() {
        return Err(AppError::BadRequest(
            "prompt is required when the content has no body".to_string(),
        ));
    }

    let (external, source, kind): (ExternalJob, Arc<dyn JobStatusSource>, JobKind) = match engine {
        Engine::Fal => {
            let fal = state.fal()?;
            let job = fal
                .submit(FalModels::TEXT_TO_VIDEO, &fal_client::text_to_video_input(&prompt, aspect_ratio))
                .await?;
            (job, shared(fal), JobKind::Video)
        }
        Engine::A2e => {
            let a2e = state.a2e()?;
            let anchor_id = request
                .anchor_id
                .as_deref()
                .filter(|a| !a.trim().is_empty())
                .ok_or_else(|| AppError::BadRequest("anchor_id is required for a2e".to_string()))?;
            let audio_url = content.audio_url.as_deref().ok_or_else(|| {
                AppError::BadRequest("Generate a voiceover for this content before an avatar video".to_string())
            })?;
            let job = a2e.generate_avatar_video(anchor_id, audio_url, &content.title).await?;
            (job, shared(a2e), JobKind::Avatar)
        }
        Engine::SteveAi => {
            let steve = state.steve_ai()?;
            let job = steve
                .create_video(&prompt, request.template.as_deref(), aspect_ratio)
                .await?;
            (job, shared(steve), JobKind::Video)
        }
        _ => {
            let replicate = state.replicate()?;
            let job = replicate
                .create_prediction(ReplicateModels::VIDEO, replicate_client::video_input(&prompt))
                .await?;
            (job, shared(replicate), JobKind::Video)
        }
    };

    ContentService::mark_media_processing(&state.db_pool, content.id).await?;
    let submission = track(
        &state,
        NewJob {
            user_id: user.id,
            kind,
            external,
            target: JobTarget::ContentMedia { content_id: content.id },
        },
        source,
        state.poll_policy(),
    )
    .await;

    tracing::info!("🎬 {} video job {} for content {}", engine.name(), submission.job_id, content.id);
    Ok(Json(job_response(&submission, engine)))
}

async fn generate_scenes(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<ScenesRequest>,
) -> ApiResult<Json<Value>> {
    let engine = parse_engine(request.engine.as_deref(), &[Engine::Fal, Engine::Replicate])?;
    let content = load_content(&state, user.id, request.content_id).await?;
    let aspect_ratio = request.aspect_ratio.as_deref().unwrap_or(DEFAULT_ASPECT_RATIO);

    if content.scenes.is_empty() {
        return Err(AppError::BadRequest(format!("Content {} has no scenes", content.id)));
    }

    let pending = content.scenes_without_video();
    let mut jobs = Vec::with_capacity(pending.len());

    for scene in pending {
        let prompt = if scene.description.trim().is_empty() {
            scene.narration.clone()
        } else {
            scene.description.clone()
        };

        let (external, source): (ExternalJob, Arc<dyn JobStatusSource>) = match engine {
            Engine::Fal => {
                let fal = state.fal()?;
                let job = fal
                    .submit(FalModels::TEXT_TO_VIDEO, &fal_client::text_to_video_input(&prompt, aspect_ratio))
                    .await?;
                (job, shared(fal))
            }
            _ => {
                let replicate = state.replicate()?;
                let job = replicate
                    .create_prediction(ReplicateModels::VIDEO, replicate_client::video_input(&prompt))
                    .await?;
                (job, shared(replicate))
            }
        };

        ContentService::mark_scene_processing(&state.db_pool, content.id, scene.index).await?;
        let submission = track(
            &state,
            NewJob {
                user_id: user.id,
                kind: JobKind::Scene,
                external,
                target: JobTarget::ContentScene {
                    content_id: content.id,
                    scene_index: scene.index,
                },
            },
            source,
            state.poll_policy(),
        )
        .await;

        jobs.push(json!({
            "scene_index": scene.index,
            "job_id": submission.job_id,
            "deduplicated": submission.deduplicated,
        }));
    }

    tracing::info!("🎞️ Started {} scene jobs for content {}", jobs.len(), content.id);

    Ok(Json(json!({
        "success": true,
        "engine": engine.name(),
        "content_id": content.id,
        "jobs": jobs
    })))
}

async fn generate_lipsync(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<LipSyncRequest>,
) -> ApiResult<Json<Value>> {
    require_url(&request.video_url, "video_url")?;
    require_url(&request.audio_url, "audio_url")?;
    let engine = parse_engine(request.engine.as_deref(), &[Engine::Fal, Engine::A2e])?;
    if let Some(content_id) = request.content_id {
        load_content(&state, user.id, content_id).await?;
    }

    let video_url = request.video_url.trim();
    let audio_url = request.audio_url.trim();
    let (external, source): (ExternalJob, Arc<dyn JobStatusSource>) = match engine {
        Engine::Fal => {
            let fal = state.fal()?;
            let job = fal
                .submit(FalModels::LIP_SYNC, &fal_client::lip_sync_input(video_url, audio_url))
                .await?;
            (job, shared(fal))
        }
        _ => {
            let a2e = state.a2e()?;
            let job = a2e.lip_sync(video_url, audio_url).await?;
            (job, shared(a2e))
        }
    };

    let target = match request.content_id {
        Some(content_id) => {
            ContentService::mark_media_processing(&state.db_pool, content_id).await?;
            JobTarget::ContentMedia { content_id }
        }
        None => JobTarget::None,
    };

    let submission = track(
        &state,
        NewJob {
            user_id: user.id,
            kind: JobKind::LipSync,
            external,
            target,
        },
        source,
        state.lipsync_policy(),
    )
    .await;

    Ok(Json(job_response(&submission, engine)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_count_bounds() {
        assert_eq!(validate_scene_count(None).unwrap(), 4);
        assert_eq!(validate_scene_count(Some(1)).unwrap(), 1);
        assert_eq!(validate_scene_count(Some(10)).unwrap(), 10);
        assert!(matches!(validate_scene_count(Some(0)), Err(AppError::BadRequest(_))));
        assert!(matches!(validate_scene_count(Some(11)), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_engine_selection() {
        let video = [Engine::Fal, Engine::A2e, Engine::SteveAi, Engine::Replicate];
        assert_eq!(parse_engine(Some("Steve_AI"), &video).unwrap(), Engine::SteveAi);
        assert_eq!(parse_engine(None, &[Engine::Fal, Engine::A2e]).unwrap(), Engine::Fal);
        assert!(matches!(parse_engine(Some("openai"), &video), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_engine(Some("sora"), &video), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_url_validation() {
        assert!(require_url("https://cdn.example.com/a.mp4", "video_url").is_ok());
        assert!(require_url("ftp://host/a.mp4", "video_url").is_err());
        assert!(require_url("  ", "audio_url").is_err());
    }
}
