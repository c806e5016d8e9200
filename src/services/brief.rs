// src/services/brief.rs
use crate::models::brief::{BrandBrief, CreateBriefRequest};
use sqlx::PgPool;

pub struct BriefService;

impl BriefService {
    pub async fn create(
        pool: &PgPool,
        user_id: i32,
        request: &CreateBriefRequest,
    ) -> Result<BrandBrief, sqlx::Error> {
        sqlx::query_as::<_, BrandBrief>(
            r#"
            INSERT INTO brand_briefs (user_id, name, brand_voice, target_audience, goals, keywords, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.name.trim())
        .bind(&request.brand_voice)
        .bind(&request.target_audience)
        .bind(&request.goals)
        .bind(request.normalized_keywords())
        .fetch_one(pool)
        .await
    }

    pub async fn list(pool: &PgPool, user_id: i32) -> Result<Vec<BrandBrief>, sqlx::Error> {
        sqlx::query_as::<_, BrandBrief>(
            "SELECT * FROM brand_briefs WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn get(pool: &PgPool, user_id: i32, id: i32) -> Result<Option<BrandBrief>, sqlx::Error> {
        sqlx::query_as::<_, BrandBrief>("SELECT * FROM brand_briefs WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}
