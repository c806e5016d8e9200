// Stock media search across Pexels and Getty

use crate::error::{ApiResult, AppError};
use crate::middleware::auth::{auth_middleware, CurrentUser};
use crate::models::media::{MediaSearchQuery, StockKind, StockSource};
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

const DEFAULT_PER_PAGE: u32 = 15;
const MAX_PER_PAGE: u32 = 80;

pub fn media_routes() -> Router {
    Router::new()
        .route("/api/media/search", get(search_media))
        .layer(axum::middleware::from_fn(auth_middleware))
}

pub fn validate_search(query: &MediaSearchQuery) -> ApiResult<u32> {
    if query.query.trim().is_empty() {
        return Err(AppError::BadRequest("query is required".to_string()));
    }
    if query.source == StockSource::Getty && query.kind == StockKind::Video {
        return Err(AppError::BadRequest("Getty search only supports photos".to_string()));
    }
    match query.per_page.unwrap_or(DEFAULT_PER_PAGE) {
        n @ 1..=MAX_PER_PAGE => Ok(n),
        _ => Err(AppError::BadRequest(format!(
            "per_page must be between 1 and {}",
            MAX_PER_PAGE
        ))),
    }
}

async fn search_media(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<MediaSearchQuery>,
) -> ApiResult<Json<Value>> {
    let per_page = validate_search(&query)?;
    let phrase = query.query.trim();

    let assets = match (query.source, query.kind) {
        (StockSource::Pexels, StockKind::Video) => state.pexels()?.search_videos(phrase, per_page).await?,
        (StockSource::Pexels, StockKind::Photo) => state.pexels()?.search_photos(phrase, per_page).await?,
        (StockSource::Getty, _) => state.getty()?.search_images(phrase, per_page).await?,
    };

    tracing::debug!("🔍 Stock search '{}' for user {}: {} results", phrase, user.id, assets.len());

    Ok(Json(json!({
        "success": true,
        "source": query.source,
        "kind": query.kind,
        "results": assets,
        "total": assets.len()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(q: &str, source: StockSource, kind: StockKind, per_page: Option<u32>) -> MediaSearchQuery {
        MediaSearchQuery {
            query: q.to_string(),
            source,
            kind,
            per_page,
        }
    }

    #[test]
    fn test_search_validation() {
        assert_eq!(validate_search(&query("coffee", StockSource::Pexels, StockKind::Video, None)).unwrap(), 15);
        assert_eq!(validate_search(&query("coffee", StockSource::Getty, StockKind::Photo, Some(80))).unwrap(), 80);
        assert!(validate_search(&query(" ", StockSource::Pexels, StockKind::Photo, None)).is_err());
        assert!(validate_search(&query("coffee", StockSource::Getty, StockKind::Video, None)).is_err());
        assert!(validate_search(&query("coffee", StockSource::Pexels, StockKind::Photo, Some(0))).is_err());
    }
}
