use crate::error::{ApiResult, AppError};
use crate::middleware::auth::{auth_middleware, CurrentUser};
use crate::models::content::{ContentListQuery, ContentStatus, GeneratedContent, UpdateContentStatusRequest};
use crate::services::ContentService;
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    response::Json,
    routing::{get, patch},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn content_routes() -> Router {
    Router::new()
        .route("/api/content", get(list_content))
        .route("/api/content/:id", get(get_content))
        .route("/api/content/:id/status", patch(update_status))
        .layer(axum::middleware::from_fn(auth_middleware))
}

/// Load a content record owned by `user_id`, 404 otherwise
pub(crate) async fn load_content(state: &AppState, user_id: i32, content_id: i32) -> ApiResult<GeneratedContent> {
    ContentService::get(&state.db_pool, user_id, content_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Content {} not found", content_id)))
}

async fn list_content(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ContentListQuery>,
) -> ApiResult<Json<Value>> {
    let items = ContentService::list(&state.db_pool, user.id, query.status, query.brief_id).await?;

    Ok(Json(json!({
        "success": true,
        "content": items,
        "total": items.len()
    })))
}

async fn get_content(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    let content = load_content(&state, user.id, id).await?;

    Ok(Json(json!({
        "success": true,
        "content": content
    })))
}

/// Check a review transition against the current status
pub(crate) fn check_transition(current: &str, next: ContentStatus) -> ApiResult<()> {
    let current: ContentStatus = current.parse().map_err(AppError::Internal)?;
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::Conflict(format!(
            "Cannot move content from {} to {}",
            current.as_str(),
            next.as_str()
        )))
    }
}

/// A conditional update that matched nothing lost a race with another request
pub(crate) fn ensure_updated<T>(updated: Option<T>, record: &str, id: i32) -> ApiResult<T> {
    updated.ok_or_else(|| {
        AppError::Conflict(format!(
            "{} {} was changed by another request; reload and try again",
            record, id
        ))
    })
}

async fn update_status(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateContentStatusRequest>,
) -> ApiResult<Json<Value>> {
    let content = load_content(&state, user.id, id).await?;
    check_transition(&content.status, request.status)?;

    let updated = ensure_updated(
        ContentService::update_status(&state.db_pool, user.id, id, &content.status, request.status).await?,
        "Content",
        id,
    )?;
    tracing::info!("✅ Content {} moved to {}", id, request.status.as_str());

    Ok(Json(json!({
        "success": true,
        "content": updated
    })))
}
