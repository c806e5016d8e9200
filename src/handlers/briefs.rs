use crate::error::{ApiResult, AppError};
use crate::middleware::auth::{auth_middleware, CurrentUser};
use crate::models::brief::{BrandBrief, CreateBriefRequest};
use crate::services::BriefService;
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn brief_routes() -> Router {
    Router::new()
        .route("/api/briefs", get(list_briefs).post(create_brief))
        .route("/api/briefs/:id", get(get_brief))
        .layer(axum::middleware::from_fn(auth_middleware))
}

/// Load a brief owned by `user_id`, 404 otherwise
pub(crate) async fn load_brief(state: &AppState, user_id: i32, brief_id: i32) -> ApiResult<BrandBrief> {
    BriefService::get(&state.db_pool, user_id, brief_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Brief {} not found", brief_id)))
}

/// Optional brief context for prompts
pub(crate) async fn load_optional_brief(
    state: &AppState,
    user_id: i32,
    brief_id: Option<i32>,
) -> ApiResult<Option<BrandBrief>> {
    match brief_id {
        Some(id) => load_brief(state, user_id, id).await.map(Some),
        None => Ok(None),
    }
}

async fn create_brief(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateBriefRequest>,
) -> ApiResult<Json<Value>> {
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("Brief name is required".to_string()));
    }

    let brief = BriefService::create(&state.db_pool, user.id, &request).await?;
    tracing::info!("📝 User {} created brief {} ({})", user.id, brief.id, brief.name);

    Ok(Json(json!({
        "success": true,
        "brief": brief
    })))
}

async fn list_briefs(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let briefs = BriefService::list(&state.db_pool, user.id).await?;

    Ok(Json(json!({
        "success": true,
        "briefs": briefs,
        "total": briefs.len()
    })))
}

async fn get_brief(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    let brief = load_brief(&state, user.id, id).await?;

    Ok(Json(json!({
        "success": true,
        "brief": brief
    })))
}
