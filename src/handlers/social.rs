// Connected social accounts and the YouTube OAuth/upload flow

use super::content::load_content;
use crate::error::{ApiResult, AppError};
use crate::middleware::auth::{auth_middleware, CurrentUser};
use crate::models::content::{GeneratedContent, MediaStatus};
use crate::models::social::{ConnectedAccount, SocialAccount, SocialAccountResponse, YouTubeUploadRequest};
use crate::services::{ScheduledPostService, SocialAccountService};
use crate::youtube_client::{self, OAuthState, UploadMetadata, YOUTUBE_SCOPES};
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const YOUTUBE_PLATFORM: &str = "youtube";
/// OAuth round trips older than this are rejected
const OAUTH_STATE_MAX_AGE_MINUTES: i64 = 15;
/// Refresh access tokens that expire within this window
const TOKEN_REFRESH_MARGIN_MINUTES: i64 = 5;
const MAX_TITLE_CHARS: usize = 100;

pub fn social_routes() -> Router {
    let protected = Router::new()
        .route("/youtube/connect", get(connect_youtube))
        .route("/api/social/accounts", get(list_accounts))
        .route("/api/social/accounts/:id", delete(disconnect_account))
        .route("/api/social/posts", get(list_posts))
        .route("/api/youtube/upload", post(upload_to_youtube))
        .layer(axum::middleware::from_fn(auth_middleware));

    Router::new()
        .route("/youtube/callback", get(youtube_oauth_callback))
        .merge(protected)
}

#[derive(Debug, Deserialize)]
pub struct YouTubeCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn oauth_credentials(state: &AppState) -> ApiResult<(&str, &str)> {
    match (
        state.config.google_oauth_client_id.as_deref(),
        state.config.google_oauth_client_secret.as_deref(),
    ) {
        (Some(id), Some(secret)) => Ok((id, secret)),
        _ => Err(AppError::NotConfigured("Google OAuth")),
    }
}

// ============================================================================
// OAuth Connection Flow
// ============================================================================

/// Returns the Google consent URL; the browser follows it
async fn connect_youtube(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let (client_id, _) = oauth_credentials(&state)?;

    let signed_state = OAuthState::new(user.id).sign(&state.config.jwt_secret);
    let auth_url = youtube_client::build_google_oauth_url(
        client_id,
        &state.config.google_oauth_redirect_uri,
        &YOUTUBE_SCOPES,
        &signed_state,
    );

    tracing::info!("🔐 Initiating YouTube OAuth for user {}", user.id);

    Ok(Json(json!({
        "success": true,
        "auth_url": auth_url,
        "message": "Redirect to Google OAuth"
    })))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn result_page(status: StatusCode, title: &str, message: &str) -> Response {
    let page = format!(
        r#"<!DOCTYPE html><html><head><title>{title}</title>
<style>body {{ font-family: Arial; max-width: 600px; margin: 100px auto; text-align: center; }}</style>
</head><body><h1>{title}</h1><p>{message}</p></body></html>"#,
        title = escape_html(title),
        message = escape_html(message),
    );
    (status, Html(page)).into_response()
}

async fn youtube_oauth_callback(
    Query(params): Query<YouTubeCallbackQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    if let Some(error) = params.error {
        tracing::error!("YouTube OAuth error: {}", error);
        return result_page(StatusCode::BAD_REQUEST, "Connection Failed", &format!("Error: {}", error));
    }

    let (Some(code), Some(raw_state)) = (params.code, params.state) else {
        return result_page(
            StatusCode::BAD_REQUEST,
            "Connection Failed",
            "Missing authorization code or state",
        );
    };

    let oauth_state = match OAuthState::verify(
        &raw_state,
        &state.config.jwt_secret,
        Duration::minutes(OAUTH_STATE_MAX_AGE_MINUTES),
    ) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Rejected OAuth state: {:?}", e);
            return result_page(StatusCode::BAD_REQUEST, "Connection Failed", "Invalid or expired state");
        }
    };

    match complete_connection(&state, oauth_state.user_id, &code).await {
        Ok(0) => result_page(
            StatusCode::OK,
            "No YouTube Channels Found",
            "This Google account has no YouTube channel. Create one, then connect again.",
        ),
        Ok(count) => result_page(
            StatusCode::OK,
            "YouTube Connected",
            &format!("Connected {} YouTube channel(s) to your account. You can close this window.", count),
        ),
        Err(e) => {
            tracing::error!("YouTube connection failed for user {}: {}", oauth_state.user_id, e);
            result_page(e.status_code(), "Connection Failed", &e.to_string())
        }
    }
}

/// Exchange the code and store every channel on the Google account
async fn complete_connection(state: &AppState, user_id: i32, code: &str) -> ApiResult<usize> {
    let (client_id, client_secret) = oauth_credentials(state)?;

    let tokens = state
        .youtube
        .exchange_code_for_token(code, client_id, client_secret, &state.config.google_oauth_redirect_uri)
        .await?;
    let channels = state.youtube.list_channels(&tokens.access_token).await?;
    let token_expiry = Utc::now() + Duration::seconds(tokens.expires_in);

    for channel in &channels {
        let account = ConnectedAccount {
            platform: YOUTUBE_PLATFORM.to_string(),
            external_id: channel.id.clone(),
            display_name: channel.title.clone(),
            thumbnail_url: channel.thumbnail_url.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            token_expiry: Some(token_expiry),
            scopes: tokens.scope.clone(),
        };
        SocialAccountService::upsert(&state.db_pool, user_id, &account).await?;
        tracing::info!("✅ Connected YouTube channel: {} (ID: {})", channel.title, channel.id);
    }

    Ok(channels.len())
}

// ============================================================================
// Account Management API
// ============================================================================

async fn list_accounts(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let accounts: Vec<SocialAccountResponse> = SocialAccountService::list_active(&state.db_pool, user.id)
        .await?
        .into_iter()
        .map(SocialAccountResponse::from)
        .collect();

    Ok(Json(json!({
        "success": true,
        "accounts": accounts,
        "total": accounts.len()
    })))
}

async fn disconnect_account(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    if !SocialAccountService::deactivate(&state.db_pool, user.id, id).await? {
        return Err(AppError::NotFound(format!("Account {} not found", id)));
    }

    tracing::info!("🔌 User {} disconnected account {}", user.id, id);
    Ok(Json(json!({
        "success": true,
        "message": "Account disconnected"
    })))
}

async fn list_posts(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let posts = ScheduledPostService::list(&state.db_pool, user.id).await?;

    Ok(Json(json!({
        "success": true,
        "posts": posts,
        "total": posts.len()
    })))
}

// ============================================================================
// Upload
// ============================================================================

/// Build upload metadata from the request, falling back to the content record
pub fn upload_metadata(
    request: &YouTubeUploadRequest,
    content: &GeneratedContent,
    now: DateTime<Utc>,
) -> ApiResult<UploadMetadata> {
    let privacy = request.privacy.trim().to_lowercase();
    if !youtube_client::is_valid_privacy(&privacy) {
        return Err(AppError::BadRequest(
            "privacy must be one of public, private, unlisted".to_string(),
        ));
    }

    let title: String = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(content.title.as_str())
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    if title.trim().is_empty() {
        return Err(AppError::BadRequest("A video title is required".to_string()));
    }

    let description = match request.description.as_deref() {
        Some(d) => d.to_string(),
        None if content.hashtags.is_empty() => content.body.clone(),
        None => format!("{}\n\n{}", content.body, content.hashtags.join(" ")),
    };

    let tags = request.tags.clone().unwrap_or_else(|| {
        content
            .hashtags
            .iter()
            .map(|t| t.trim_start_matches('#').to_string())
            .collect()
    });

    Ok(UploadMetadata {
        title,
        description,
        privacy,
        // A publish time in the past means "now"
        publish_at: request.publish_at.filter(|at| *at > now),
        tags,
    })
}

/// Current access token, refreshed first when it is about to expire
async fn usable_access_token(state: &AppState, account: &SocialAccount) -> ApiResult<String> {
    if !account.token_expires_within(Duration::minutes(TOKEN_REFRESH_MARGIN_MINUTES)) {
        return Ok(account.access_token.clone());
    }

    let refresh_token = account.refresh_token.as_deref().ok_or_else(|| {
        AppError::Conflict("Account token expired; reconnect the channel".to_string())
    })?;
    let (client_id, client_secret) = oauth_credentials(state)?;

    tracing::info!("🔄 Refreshing access token for account {}", account.id);
    let tokens = state
        .youtube
        .refresh_access_token(refresh_token, client_id, client_secret)
        .await?;
    let expiry = Utc::now() + Duration::seconds(tokens.expires_in);
    SocialAccountService::update_access_token(&state.db_pool, account.id, &tokens.access_token, expiry).await?;

    Ok(tokens.access_token)
}

async fn upload_to_youtube(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<YouTubeUploadRequest>,
) -> ApiResult<Json<Value>> {
    let account = SocialAccountService::get_active(&state.db_pool, user.id, request.account_id)
        .await?
        .filter(|a| a.platform == YOUTUBE_PLATFORM)
        .ok_or_else(|| AppError::NotFound(format!("YouTube account {} not found", request.account_id)))?;
    let content = load_content(&state, user.id, request.content_id).await?;

    let media_url = match (content.media_status.as_str(), content.media_url.as_deref()) {
        (status, Some(url)) if status == MediaStatus::Ready.as_str() => url.to_string(),
        _ => {
            return Err(AppError::BadRequest(format!(
                "Content {} has no finished video to upload",
                content.id
            )))
        }
    };

    let now = Utc::now();
    let metadata = upload_metadata(&request, &content, now)?;
    let access_token = usable_access_token(&state, &account).await?;

    let video = state.youtube.download_media(&media_url).await?;
    tracing::info!("📤 Uploading content {} ({} bytes) to channel {}", content.id, video.len(), account.external_id);

    let file_name = format!("content_{}.mp4", content.id);
    let scheduled_for = metadata.publish_at.unwrap_or(now);

    let uploaded = match state
        .youtube
        .upload_video(&access_token, video, &file_name, &metadata)
        .await
    {
        Ok(uploaded) => uploaded,
        Err(e) => {
            let message = e.to_string();
            ScheduledPostService::record(
                &state.db_pool,
                user.id,
                content.id,
                account.id,
                scheduled_for,
                "failed",
                None,
                Some(&message),
            )
            .await?;
            return Err(e.into());
        }
    };

    let status = if metadata.publish_at.is_some() { "scheduled" } else { "published" };
    let post = ScheduledPostService::record(
        &state.db_pool,
        user.id,
        content.id,
        account.id,
        scheduled_for,
        status,
        Some(&uploaded.id),
        None,
    )
    .await?;

    tracing::info!("✅ Uploaded content {} as YouTube video {} ({})", content.id, uploaded.id, status);

    Ok(Json(json!({
        "success": true,
        "video_id": uploaded.id,
        "video_url": format!("https://www.youtube.com/watch?v={}", uploaded.id),
        "post": post
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json as SqlJson;

    fn content() -> GeneratedContent {
        GeneratedContent {
            id: 9,
            user_id: 1,
            brief_id: None,
            platform: "youtube".to_string(),
            content_type: "video".to_string(),
            title: "Morning espresso ritual".to_string(),
            body: "Three steps to a better shot.".to_string(),
            hashtags: vec!["#coffee".to_string(), "#espresso".to_string()],
            status: "approved".to_string(),
            media_url: Some("https://cdn.example.com/v.mp4".to_string()),
            media_status: "ready".to_string(),
            media_error: None,
            audio_url: None,
            scenes: SqlJson(Vec::new()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(privacy: &str, publish_at: Option<DateTime<Utc>>) -> YouTubeUploadRequest {
        YouTubeUploadRequest {
            account_id: 1,
            content_id: 9,
            title: None,
            description: None,
            privacy: privacy.to_string(),
            publish_at,
            tags: None,
        }
    }

    #[test]
    fn test_metadata_defaults_from_content() {
        let now = Utc::now();
        let metadata = upload_metadata(&request("Unlisted", None), &content(), now).unwrap();
        assert_eq!(metadata.title, "Morning espresso ritual");
        assert_eq!(metadata.privacy, "unlisted");
        assert_eq!(metadata.description, "Three steps to a better shot.\n\n#coffee #espresso");
        assert_eq!(metadata.tags, vec!["coffee", "espresso"]);
        assert!(metadata.publish_at.is_none());
    }

    #[test]
    fn test_only_future_publish_times_are_kept() {
        let now = Utc::now();
        let future = now + Duration::days(1);
        let past = now - Duration::hours(1);

        let scheduled = upload_metadata(&request("private", Some(future)), &content(), now).unwrap();
        assert_eq!(scheduled.publish_at, Some(future));

        let immediate = upload_metadata(&request("public", Some(past)), &content(), now).unwrap();
        assert!(immediate.publish_at.is_none());
    }

    #[test]
    fn test_invalid_privacy_rejected() {
        let result = upload_metadata(&request("friends-only", None), &content(), Utc::now());
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_long_titles_are_truncated() {
        let mut req = request("public", None);
        req.title = Some("x".repeat(150));
        let metadata = upload_metadata(&req, &content(), Utc::now()).unwrap();
        assert_eq!(metadata.title.chars().count(), 100);
    }

    #[test]
    fn test_result_page_escapes_html() {
        assert_eq!(escape_html("<script>\"x\" & y</script>"), "&lt;script&gt;&quot;x&quot; &amp; y&lt;/script&gt;");
    }
}
