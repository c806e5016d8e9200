// src/services/listening.rs
use crate::models::listening::{ListeningHit, NewListeningHit, ReplyDraft, ReplyStatus};
use sqlx::PgPool;

pub struct ListeningService;

impl ListeningService {
    /// Insert scraped hits, skipping ones already stored; returns the number inserted
    pub async fn insert_hits(
        pool: &PgPool,
        user_id: i32,
        brief_id: Option<i32>,
        hits: &[NewListeningHit],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut inserted = 0;

        for hit in hits {
            let result = sqlx::query(
                r#"
                INSERT INTO listening_hits (
                    user_id, brief_id, platform, author, text, url, matched_keywords, posted_at, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(brief_id)
            .bind(&hit.platform)
            .bind(&hit.author)
            .bind(&hit.text)
            .bind(&hit.url)
            .bind(&hit.matched_keywords)
            .bind(hit.posted_at)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn list_hits(
        pool: &PgPool,
        user_id: i32,
        brief_id: Option<i32>,
        limit: i64,
    ) -> Result<Vec<ListeningHit>, sqlx::Error> {
        sqlx::query_as::<_, ListeningHit>(
            r#"
            SELECT * FROM listening_hits
            WHERE user_id = $1 AND ($2::int IS NULL OR brief_id = $2)
            ORDER BY COALESCE(posted_at, created_at) DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(brief_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn get_hit(pool: &PgPool, user_id: i32, id: i32) -> Result<Option<ListeningHit>, sqlx::Error> {
        sqlx::query_as::<_, ListeningHit>("SELECT * FROM listening_hits WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create_reply(pool: &PgPool, user_id: i32, hit_id: i32, body: &str) -> Result<ReplyDraft, sqlx::Error> {
        sqlx::query_as::<_, ReplyDraft>(
            r#"
            INSERT INTO reply_drafts (user_id, hit_id, body, status, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(hit_id)
        .bind(body)
        .fetch_one(pool)
        .await
    }

    pub async fn list_replies(pool: &PgPool, user_id: i32) -> Result<Vec<ReplyDraft>, sqlx::Error> {
        sqlx::query_as::<_, ReplyDraft>("SELECT * FROM reply_drafts WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn get_reply(pool: &PgPool, user_id: i32, id: i32) -> Result<Option<ReplyDraft>, sqlx::Error> {
        sqlx::query_as::<_, ReplyDraft>("SELECT * FROM reply_drafts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Returns `None` when the draft is no longer in `expected` status
    pub async fn update_reply(
        pool: &PgPool,
        user_id: i32,
        id: i32,
        expected: ReplyStatus,
        status: ReplyStatus,
        body: &str,
    ) -> Result<Option<ReplyDraft>, sqlx::Error> {
        sqlx::query_as::<_, ReplyDraft>(
            r#"
            UPDATE reply_drafts SET status = $3, body = $4, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = $5
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(status.as_str())
        .bind(body)
        .bind(expected.as_str())
        .fetch_optional(pool)
        .await
    }
}
