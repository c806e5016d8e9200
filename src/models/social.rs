use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SocialAccount {
    pub id: i32,
    pub user_id: i32,
    pub platform: String,
    pub external_id: String,
    pub display_name: String,
    pub thumbnail_url: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<chrono::DateTime<chrono::Utc>>,
    pub scopes: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl SocialAccount {
    /// True when the access token expires within `margin`
    pub fn token_expires_within(&self, margin: chrono::Duration) -> bool {
        match self.token_expiry {
            Some(expiry) => expiry <= chrono::Utc::now() + margin,
            None => false,
        }
    }
}

/// Account as shown to clients (no tokens)
#[derive(Debug, Serialize, Deserialize)]
pub struct SocialAccountResponse {
    pub id: i32,
    pub platform: String,
    pub external_id: String,
    pub display_name: String,
    pub thumbnail_url: Option<String>,
    pub is_active: bool,
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

impl From<SocialAccount> for SocialAccountResponse {
    fn from(account: SocialAccount) -> Self {
        Self {
            id: account.id,
            platform: account.platform,
            external_id: account.external_id,
            display_name: account.display_name,
            thumbnail_url: account.thumbnail_url,
            is_active: account.is_active,
            connected_at: account.created_at,
        }
    }
}

/// Channel data plus OAuth tokens, ready to be upserted
#[derive(Debug, Clone)]
pub struct ConnectedAccount {
    pub platform: String,
    pub external_id: String,
    pub display_name: String,
    pub thumbnail_url: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<chrono::DateTime<chrono::Utc>>,
    pub scopes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledPost {
    pub id: i32,
    pub user_id: i32,
    pub content_id: i32,
    pub social_account_id: i32,
    pub scheduled_for: chrono::DateTime<chrono::Utc>,
    pub status: String, // "scheduled", "published", "failed", "cancelled"
    pub external_post_id: Option<String>,
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct YouTubeUploadRequest {
    pub account_id: i32,
    pub content_id: i32,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_privacy")]
    pub privacy: String,
    pub publish_at: Option<chrono::DateTime<chrono::Utc>>,
    pub tags: Option<Vec<String>>,
}

fn default_privacy() -> String {
    "private".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(expiry: Option<chrono::DateTime<chrono::Utc>>) -> SocialAccount {
        SocialAccount {
            id: 1,
            user_id: 1,
            platform: "youtube".to_string(),
            external_id: "UC123".to_string(),
            display_name: "Acme".to_string(),
            thumbnail_url: None,
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_expiry: expiry,
            scopes: String::new(),
            is_active: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_token_expiry_margin() {
        let soon = account(Some(chrono::Utc::now() + chrono::Duration::seconds(30)));
        assert!(soon.token_expires_within(chrono::Duration::minutes(1)));

        let later = account(Some(chrono::Utc::now() + chrono::Duration::hours(1)));
        assert!(!later.token_expires_within(chrono::Duration::minutes(1)));

        assert!(!account(None).token_expires_within(chrono::Duration::minutes(1)));
    }

    #[test]
    fn test_response_hides_tokens() {
        let json = serde_json::to_value(SocialAccountResponse::from(account(None))).unwrap();
        assert!(json.get("access_token").is_none());
        assert_eq!(json["external_id"], "UC123");
    }
}
