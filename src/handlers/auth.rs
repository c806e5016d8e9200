use crate::error::{ApiResult, AppError};
use crate::middleware::auth::{auth_middleware, CurrentUser};
use crate::middleware::rate_limit::strict_rate_limit_middleware;
use crate::models::auth::*;
use crate::services::UserService;
use crate::AppState;
use axum::{
    extract::Extension,
    response::Json,
    routing::{get, post, Router},
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{json, Value};
use std::sync::Arc;

/// Tokens stay valid for a week
const TOKEN_TTL_DAYS: i64 = 7;

pub fn auth_routes() -> Router {
    let public = Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .layer(axum::middleware::from_fn(strict_rate_limit_middleware));

    let protected = Router::new()
        .route("/api/auth/verify", get(verify_token))
        .layer(axum::middleware::from_fn(auth_middleware));

    public.merge(protected)
}

fn validate_registration(payload: &RegisterRequest) -> Result<(), AppError> {
    if payload.email.trim().is_empty() || payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email, username, and password are required".to_string(),
        ));
    }
    if !payload.email.contains('@') {
        return Err(AppError::BadRequest("Email address is not valid".to_string()));
    }
    if payload.password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters long".to_string(),
        ));
    }
    Ok(())
}

async fn register(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    validate_registration(&payload)?;

    let email = payload.email.trim().to_lowercase();
    let username = payload.username.trim();

    if UserService::exists(&state.db_pool, &email, username).await? {
        return Err(AppError::Conflict(
            "User with this email or username already exists".to_string(),
        ));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        tracing::error!("Error hashing password: {}", e);
        AppError::Internal("Failed to create user".to_string())
    })?;

    let user = UserService::create(&state.db_pool, &email, username, &password_hash).await?;
    let token = generate_jwt_token(&user, &state.config.jwt_secret)?;

    tracing::info!("👤 Registered user {} ({})", user.id, user.username);

    Ok(Json(AuthResponse {
        success: true,
        message: "User registered successfully".to_string(),
        user: UserResponse::from(user),
        token,
    }))
}

async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".to_string()));
    }

    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let email = payload.email.trim().to_lowercase();
    let user = UserService::find_active_by_email(&state.db_pool, &email)
        .await?
        .ok_or_else(invalid)?;

    let password_ok = verify(&payload.password, &user.password_hash).map_err(|e| {
        tracing::error!("Error verifying password: {}", e);
        AppError::Internal("Internal server error".to_string())
    })?;
    if !password_ok {
        return Err(invalid());
    }

    let token = generate_jwt_token(&user, &state.config.jwt_secret)?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        user: UserResponse::from(user),
        token,
    }))
}

async fn verify_token(
    Extension(state): Extension<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let user = UserService::find_active_by_id(&state.db_pool, current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "user": UserResponse::from(user)
    })))
}

pub fn generate_jwt_token(user: &User, jwt_secret: &str) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        email: user.email.clone(),
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .map_err(|e| {
        tracing::error!("Error generating JWT token: {}", e);
        AppError::Internal("Failed to generate authentication token".to_string())
    })
}

pub fn verify_jwt_token(token: &str, jwt_secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 42,
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password_hash: String::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_round_trip_and_expiry() {
        let token = generate_jwt_token(&user(), "s3cret").unwrap();
        let claims = verify_jwt_token(&token, "s3cret").unwrap();

        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.username, "ada");
        let ttl = claims.exp - claims.iat;
        assert_eq!(ttl as i64, Duration::days(7).num_seconds());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = generate_jwt_token(&user(), "s3cret").unwrap();
        assert!(verify_jwt_token(&token, "other").is_err());
    }

    #[test]
    fn test_registration_validation() {
        let request = |email: &str, username: &str, password: &str| RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        };

        assert!(validate_registration(&request("a@b.co", "ada", "hunter22")).is_ok());
        assert!(validate_registration(&request("", "ada", "hunter22")).is_err());
        assert!(validate_registration(&request("not-an-email", "ada", "hunter22")).is_err());
        assert!(validate_registration(&request("a@b.co", "ada", "short")).is_err());
    }
}
