// src/services/social.rs
use crate::models::social::{ConnectedAccount, ScheduledPost, SocialAccount};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub struct SocialAccountService;

impl SocialAccountService {
    /// Insert or refresh an account after an OAuth round-trip
    pub async fn upsert(pool: &PgPool, user_id: i32, account: &ConnectedAccount) -> Result<SocialAccount, sqlx::Error> {
        sqlx::query_as::<_, SocialAccount>(
            r#"
            INSERT INTO social_accounts (
                user_id, platform, external_id, display_name, thumbnail_url,
                access_token, refresh_token, token_expiry, scopes, is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, true, NOW(), NOW())
            ON CONFLICT (user_id, platform, external_id)
            DO UPDATE SET
                display_name = EXCLUDED.display_name,
                thumbnail_url = EXCLUDED.thumbnail_url,
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, social_accounts.refresh_token),
                token_expiry = EXCLUDED.token_expiry,
                scopes = EXCLUDED.scopes,
                is_active = true,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&account.platform)
        .bind(&account.external_id)
        .bind(&account.display_name)
        .bind(&account.thumbnail_url)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.token_expiry)
        .bind(&account.scopes)
        .fetch_one(pool)
        .await
    }

    pub async fn list_active(pool: &PgPool, user_id: i32) -> Result<Vec<SocialAccount>, sqlx::Error> {
        sqlx::query_as::<_, SocialAccount>(
            "SELECT * FROM social_accounts WHERE user_id = $1 AND is_active = true ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn get_active(pool: &PgPool, user_id: i32, id: i32) -> Result<Option<SocialAccount>, sqlx::Error> {
        sqlx::query_as::<_, SocialAccount>(
            "SELECT * FROM social_accounts WHERE id = $1 AND user_id = $2 AND is_active = true",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Returns false when no active account matched
    pub async fn deactivate(pool: &PgPool, user_id: i32, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE social_accounts SET is_active = false, updated_at = NOW() WHERE id = $1 AND user_id = $2 AND is_active = true",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_access_token(
        pool: &PgPool,
        id: i32,
        access_token: &str,
        token_expiry: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE social_accounts SET access_token = $2, token_expiry = $3, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(access_token)
            .bind(token_expiry)
            .execute(pool)
            .await?;
        Ok(())
    }
}

pub struct ScheduledPostService;

impl ScheduledPostService {
    pub async fn record(
        pool: &PgPool,
        user_id: i32,
        content_id: i32,
        social_account_id: i32,
        scheduled_for: DateTime<Utc>,
        status: &str,
        external_post_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<ScheduledPost, sqlx::Error> {
        sqlx::query_as::<_, ScheduledPost>(
            r#"
            INSERT INTO scheduled_posts (
                user_id, content_id, social_account_id, scheduled_for, status, external_post_id, error, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(content_id)
        .bind(social_account_id)
        .bind(scheduled_for)
        .bind(status)
        .bind(external_post_id)
        .bind(error)
        .fetch_one(pool)
        .await
    }

    pub async fn list(pool: &PgPool, user_id: i32) -> Result<Vec<ScheduledPost>, sqlx::Error> {
        sqlx::query_as::<_, ScheduledPost>(
            "SELECT * FROM scheduled_posts WHERE user_id = $1 ORDER BY scheduled_for DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
