// Social listening: Apify scans, captured hits and AI reply drafts

use super::briefs::{load_brief, load_optional_brief};
use super::content::ensure_updated;
use super::jobs::{shared, track};
use crate::apify_client::scraper_input;
use crate::error::{ApiResult, AppError};
use crate::jobs::{JobKind, JobTarget, NewJob};
use crate::middleware::auth::{auth_middleware, CurrentUser};
use crate::models::listening::{HitListQuery, ReplyStatus, ScanRequest, UpdateReplyRequest};
use crate::services::ListeningService;
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

pub const SUPPORTED_PLATFORMS: [&str; 6] = ["twitter", "instagram", "tiktok", "facebook", "reddit", "youtube"];
const DEFAULT_SCAN_ITEMS: u32 = 50;
const MAX_SCAN_ITEMS: u32 = 200;
const DEFAULT_HIT_LIMIT: i64 = 100;
const MAX_HIT_LIMIT: i64 = 500;

pub fn listening_routes() -> Router {
    Router::new()
        .route("/api/listening/scan", post(start_scan))
        .route("/api/listening/hits", get(list_hits))
        .route("/api/listening/hits/:id/reply", post(draft_reply))
        .route("/api/listening/replies", get(list_replies))
        .route("/api/listening/replies/:id", patch(update_reply))
        .layer(axum::middleware::from_fn(auth_middleware))
}

/// Trimmed keywords, first spelling wins for case-insensitive duplicates
pub fn dedupe_keywords(keywords: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_lowercase()))
        .collect()
}

pub fn validate_platform(platform: &str) -> ApiResult<String> {
    let platform = platform.trim().to_lowercase();
    if SUPPORTED_PLATFORMS.contains(&platform.as_str()) {
        Ok(platform)
    } else {
        Err(AppError::BadRequest(format!(
            "Unsupported platform '{}'; use one of {}",
            platform,
            SUPPORTED_PLATFORMS.join(", ")
        )))
    }
}

async fn start_scan(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<ScanRequest>,
) -> ApiResult<Json<Value>> {
    let platform = validate_platform(&request.platform)?;
    let max_items = request.max_items.unwrap_or(DEFAULT_SCAN_ITEMS);
    if max_items == 0 || max_items > MAX_SCAN_ITEMS {
        return Err(AppError::BadRequest(format!(
            "max_items must be between 1 and {}",
            MAX_SCAN_ITEMS
        )));
    }

    let apify = state.apify()?;
    let brief = load_brief(&state, user.id, request.brief_id).await?;

    let keywords = dedupe_keywords(request.keywords.as_deref().unwrap_or(&brief.keywords));
    if keywords.is_empty() {
        return Err(AppError::BadRequest(
            "No keywords to listen for; add keywords to the brief or the request".to_string(),
        ));
    }

    let external = apify
        .start_run(
            &state.config.apify_listening_actor,
            &scraper_input(&platform, &keywords, max_items),
        )
        .await?;

    let submission = track(
        &state,
        NewJob {
            user_id: user.id,
            kind: JobKind::ListeningScan,
            external,
            target: JobTarget::ListeningScan {
                brief_id: Some(brief.id),
                platform: platform.clone(),
                keywords: keywords.clone(),
            },
        },
        shared(apify),
        state.poll_policy(),
    )
    .await;

    tracing::info!(
        "👂 Listening scan {} on {} for brief {} ({} keywords)",
        submission.job_id,
        platform,
        brief.id,
        keywords.len()
    );

    Ok(Json(json!({
        "success": true,
        "job_id": submission.job_id,
        "deduplicated": submission.deduplicated,
        "platform": platform,
        "keywords": keywords,
        "status_url": format!("/api/jobs/{}", submission.job_id),
    })))
}

async fn list_hits(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<HitListQuery>,
) -> ApiResult<Json<Value>> {
    let limit = query.limit.unwrap_or(DEFAULT_HIT_LIMIT).clamp(1, MAX_HIT_LIMIT);
    let hits = ListeningService::list_hits(&state.db_pool, user.id, query.brief_id, limit).await?;

    Ok(Json(json!({
        "success": true,
        "hits": hits,
        "total": hits.len()
    })))
}

async fn draft_reply(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(hit_id): Path<i32>,
) -> ApiResult<Json<Value>> {
    let openai = state.openai()?;
    let hit = ListeningService::get_hit(&state.db_pool, user.id, hit_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listening hit {} not found", hit_id)))?;
    let brief = load_optional_brief(&state, user.id, hit.brief_id).await?;

    let body = openai.draft_reply(brief.as_ref(), &hit).await?;
    if body.is_empty() {
        return Err(AppError::Internal("The model returned an empty reply".to_string()));
    }

    let reply = ListeningService::create_reply(&state.db_pool, user.id, hit.id, &body).await?;
    tracing::info!("💬 Drafted reply {} for hit {}", reply.id, hit.id);

    Ok(Json(json!({
        "success": true,
        "reply": reply
    })))
}

async fn list_replies(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let replies = ListeningService::list_replies(&state.db_pool, user.id).await?;

    Ok(Json(json!({
        "success": true,
        "replies": replies,
        "total": replies.len()
    })))
}

/// Resolve the status and body a reply update should store
pub fn apply_reply_update(
    current: ReplyStatus,
    current_body: &str,
    request: &UpdateReplyRequest,
) -> ApiResult<(ReplyStatus, String)> {
    if request.status.is_none() && request.body.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    let body = match request.body.as_deref() {
        Some(body) => {
            if !current.is_editable() {
                return Err(AppError::Conflict(format!(
                    "Reply is {} and can no longer be edited",
                    current.as_str()
                )));
            }
            let body = body.trim();
            if body.is_empty() {
                return Err(AppError::BadRequest("Reply body cannot be empty".to_string()));
            }
            body.to_string()
        }
        None => current_body.to_string(),
    };

    let status = match request.status {
        Some(next) if next == current => next,
        Some(next) if current.can_transition_to(next) => next,
        Some(next) => {
            return Err(AppError::Conflict(format!(
                "Cannot move reply from {} to {}",
                current.as_str(),
                next.as_str()
            )))
        }
        None => current,
    };

    Ok((status, body))
}

async fn update_reply(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateReplyRequest>,
) -> ApiResult<Json<Value>> {
    let reply = ListeningService::get_reply(&state.db_pool, user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reply {} not found", id)))?;
    let current: ReplyStatus = reply.status.parse().map_err(AppError::Internal)?;

    let (status, body) = apply_reply_update(current, &reply.body, &request)?;
    let updated = ensure_updated(
        ListeningService::update_reply(&state.db_pool, user.id, id, current, status, &body).await?,
        "Reply",
        id,
    )?;

    Ok(Json(json!({
        "success": true,
        "reply": updated
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(status: Option<ReplyStatus>, body: Option<&str>) -> UpdateReplyRequest {
        UpdateReplyRequest {
            status,
            body: body.map(str::to_string),
        }
    }

    #[test]
    fn test_keyword_dedupe() {
        let keywords = vec![" Coffee ".to_string(), "coffee".to_string(), "".to_string(), "Tea".to_string()];
        assert_eq!(dedupe_keywords(&keywords), vec!["Coffee", "Tea"]);
    }

    #[test]
    fn test_platform_validation() {
        assert_eq!(validate_platform(" TikTok ").unwrap(), "tiktok");
        assert!(matches!(validate_platform("myspace"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_pending_reply_can_be_edited_and_approved() {
        let (status, body) = apply_reply_update(
            ReplyStatus::Pending,
            "old",
            &update(Some(ReplyStatus::Approved), Some(" new text ")),
        )
        .unwrap();
        assert_eq!(status, ReplyStatus::Approved);
        assert_eq!(body, "new text");
    }

    #[test]
    fn test_reviewed_reply_rules() {
        assert!(matches!(
            apply_reply_update(ReplyStatus::Approved, "ok", &update(None, Some("edit"))),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            apply_reply_update(ReplyStatus::Rejected, "ok", &update(Some(ReplyStatus::Posted), None)),
            Err(AppError::Conflict(_))
        ));
        let (status, body) =
            apply_reply_update(ReplyStatus::Approved, "ok", &update(Some(ReplyStatus::Posted), None)).unwrap();
        assert_eq!(status, ReplyStatus::Posted);
        assert_eq!(body, "ok");
    }

    #[test]
    fn test_empty_update_is_rejected() {
        assert!(matches!(
            apply_reply_update(ReplyStatus::Pending, "ok", &update(None, None)),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            apply_reply_update(ReplyStatus::Pending, "ok", &update(None, Some("  "))),
            Err(AppError::BadRequest(_))
        ));
    }
}
