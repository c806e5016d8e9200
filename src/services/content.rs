// src/services/content.rs
use crate::models::content::{ContentStatus, GeneratedContent, MediaStatus, NewContent};
use sqlx::types::Json;
use sqlx::PgPool;

pub struct ContentService;

impl ContentService {
    /// Save a freshly generated script, caption or media record
    pub async fn create(pool: &PgPool, content: &NewContent) -> Result<GeneratedContent, sqlx::Error> {
        sqlx::query_as::<_, GeneratedContent>(
            r#"
            INSERT INTO generated_content (
                user_id, brief_id, platform, content_type, title, body, hashtags,
                status, media_status, scenes, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', 'none', $8, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(content.user_id)
        .bind(content.brief_id)
        .bind(&content.platform)
        .bind(content.content_type.as_str())
        .bind(&content.title)
        .bind(&content.body)
        .bind(&content.hashtags)
        .bind(Json(&content.scenes))
        .fetch_one(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        user_id: i32,
        status: Option<ContentStatus>,
        brief_id: Option<i32>,
    ) -> Result<Vec<GeneratedContent>, sqlx::Error> {
        sqlx::query_as::<_, GeneratedContent>(
            r#"
            SELECT * FROM generated_content
            WHERE user_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::int IS NULL OR brief_id = $3)
            ORDER BY created_at DESC
            LIMIT 200
            "#,
        )
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .bind(brief_id)
        .fetch_all(pool)
        .await
    }

    pub async fn get(pool: &PgPool, user_id: i32, id: i32) -> Result<Option<GeneratedContent>, sqlx::Error> {
        sqlx::query_as::<_, GeneratedContent>("SELECT * FROM generated_content WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Move the review status on only if it is still `expected`.
    /// Returns `None` when another request changed it first.
    pub async fn update_status(
        pool: &PgPool,
        user_id: i32,
        id: i32,
        expected: &str,
        status: ContentStatus,
    ) -> Result<Option<GeneratedContent>, sqlx::Error> {
        sqlx::query_as::<_, GeneratedContent>(
            r#"
            UPDATE generated_content SET status = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = $4
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(status.as_str())
        .bind(expected)
        .fetch_optional(pool)
        .await
    }

    pub async fn set_audio_url(pool: &PgPool, user_id: i32, id: i32, audio_url: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE generated_content SET audio_url = $3, updated_at = NOW() WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .bind(audio_url)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn mark_media_processing(pool: &PgPool, id: i32) -> Result<(), sqlx::Error> {
        Self::set_media(pool, id, MediaStatus::Processing, None, None).await
    }

    pub async fn set_media_ready(pool: &PgPool, id: i32, url: &str) -> Result<(), sqlx::Error> {
        Self::set_media(pool, id, MediaStatus::Ready, Some(url), None).await
    }

    pub async fn set_media_failed(pool: &PgPool, id: i32, error: &str) -> Result<(), sqlx::Error> {
        Self::set_media(pool, id, MediaStatus::Failed, None, Some(error)).await
    }

    async fn set_media(
        pool: &PgPool,
        id: i32,
        status: MediaStatus,
        url: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE generated_content
            SET media_status = $2,
                media_url = COALESCE($3, media_url),
                media_error = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(url)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_scene_processing(pool: &PgPool, id: i32, scene_index: usize) -> Result<(), sqlx::Error> {
        Self::patch_scene(pool, id, scene_index, MediaStatus::Processing, None, None).await
    }

    pub async fn set_scene_video(pool: &PgPool, id: i32, scene_index: usize, url: &str) -> Result<(), sqlx::Error> {
        Self::patch_scene(pool, id, scene_index, MediaStatus::Ready, Some(url), None).await
    }

    pub async fn set_scene_failed(pool: &PgPool, id: i32, scene_index: usize, error: &str) -> Result<(), sqlx::Error> {
        Self::patch_scene(pool, id, scene_index, MediaStatus::Failed, None, Some(error)).await
    }

    /// Merge status/url/error into one element of the `scenes` JSON array
    async fn patch_scene(
        pool: &PgPool,
        id: i32,
        scene_index: usize,
        status: MediaStatus,
        url: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE generated_content
            SET scenes = jsonb_set(
                    scenes,
                    ARRAY[$2::int::text],
                    (scenes -> $2::int)
                        || jsonb_build_object('status', $3::text, 'error', $5::text)
                        || CASE WHEN $4::text IS NULL THEN '{}'::jsonb
                                ELSE jsonb_build_object('video_url', $4::text) END,
                    false),
                updated_at = NOW()
            WHERE id = $1 AND jsonb_array_length(scenes) > $2::int
            "#,
        )
        .bind(id)
        .bind(scene_index as i32)
        .bind(status.as_str())
        .bind(url)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }
}
