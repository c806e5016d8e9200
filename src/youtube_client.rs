// YouTube Data API v3 client for channel lookup and video uploads
// Docs: https://developers.google.com/youtube/v3

use crate::error::VendorError;
use crate::vendor::{read_json, send_with_retry};
use base64::Engine;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const VENDOR: &str = "youtube";
/// Timeout for a whole-video upload
const UPLOAD_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15 * 60);

pub const YOUTUBE_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/youtube.upload",
    "https://www.googleapis.com/auth/youtube.readonly",
    "https://www.googleapis.com/auth/userinfo.email",
];

#[derive(Debug, Clone)]
pub struct YouTubeClient {
    client: Client,
    api_url: String,
    upload_url: String,
    token_url: String,
}

// ============================================================================
// OAuth and Channel Structures
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct YouTubeChannel {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    description: String,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    default: Option<ThumbnailInfo>,
    medium: Option<ThumbnailInfo>,
    high: Option<ThumbnailInfo>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailInfo {
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
}

// ============================================================================
// Video Upload Structures
// ============================================================================

#[derive(Debug, Serialize, PartialEq)]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct VideoStatus {
    #[serde(rename = "privacyStatus")]
    pub privacy_status: String, // "public", "private", "unlisted"
    #[serde(rename = "publishAt", skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct VideoResource {
    pub snippet: VideoSnippet,
    pub status: VideoStatus,
}

#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub title: String,
    pub description: String,
    pub privacy: String,
    pub publish_at: Option<chrono::DateTime<chrono::Utc>>,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VideoUploadResponse {
    pub id: String,
}

pub fn is_valid_privacy(privacy: &str) -> bool {
    ["public", "private", "unlisted"].contains(&privacy)
}

/// YouTube only honours `publishAt` on private videos
pub fn build_video_resource(metadata: &UploadMetadata) -> VideoResource {
    let privacy_status = if metadata.publish_at.is_some() {
        "private".to_string()
    } else {
        metadata.privacy.clone()
    };

    VideoResource {
        snippet: VideoSnippet {
            title: metadata.title.chars().take(100).collect(),
            description: metadata.description.chars().take(5000).collect(),
            category_id: "22".to_string(), // People & Blogs
            tags: (!metadata.tags.is_empty()).then(|| metadata.tags.clone()),
        },
        status: VideoStatus {
            privacy_status,
            publish_at: metadata
                .publish_at
                .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
        },
    }
}

// ============================================================================
// YouTube Client Implementation
// ============================================================================

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            api_url: "https://www.googleapis.com/youtube/v3".to_string(),
            upload_url: "https://www.googleapis.com/upload/youtube/v3".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
        }
    }

    /// Point every endpoint at one host (used by tests)
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: format!("{}/youtube/v3", base_url),
            upload_url: format!("{}/upload/youtube/v3", base_url),
            token_url: format!("{}/token", base_url),
        }
    }

    /// List user's YouTube channels using OAuth access token
    pub async fn list_channels(&self, access_token: &str) -> Result<Vec<YouTubeChannel>, VendorError> {
        let url = format!("{}/channels", self.api_url);

        let response = send_with_retry(VENDOR, || {
            self.client
                .get(&url)
                .query(&[("part", "snippet"), ("mine", "true")])
                .bearer_auth(access_token)
        })
        .await?;

        let channel_response: ChannelListResponse = read_json(VENDOR, response).await?;

        Ok(channel_response
            .items
            .into_iter()
            .map(|item| {
                let thumbnail_url = item
                    .snippet
                    .thumbnails
                    .and_then(|t| t.high.or(t.medium).or(t.default))
                    .map(|t| t.url);

                YouTubeChannel {
                    id: item.id,
                    title: item.snippet.title,
                    description: item.snippet.description,
                    thumbnail_url,
                }
            })
            .collect())
    }

    /// Fetch a generated video from wherever the vendor hosted it
    pub async fn download_media(&self, media_url: &str) -> Result<Vec<u8>, VendorError> {
        let response = send_with_retry(VENDOR, || self.client.get(media_url)).await?;
        let bytes = response.bytes().await.map_err(|e| VendorError::http(VENDOR, e))?;
        Ok(bytes.to_vec())
    }

    /// Upload video bytes with metadata in one multipart request
    pub async fn upload_video(
        &self,
        access_token: &str,
        video_data: Vec<u8>,
        file_name: &str,
        metadata: &UploadMetadata,
    ) -> Result<VideoUploadResponse, VendorError> {
        let resource = build_video_resource(metadata);
        let metadata_json = serde_json::to_string(&resource).map_err(|e| VendorError::decode(VENDOR, e))?;
        let url = format!("{}/videos", self.upload_url);

        // Uploads are not retried; a multipart body can only be sent once
        let form = reqwest::multipart::Form::new()
            .part(
                "snippet",
                reqwest::multipart::Part::text(metadata_json)
                    .mime_str("application/json")
                    .map_err(|e| VendorError::http(VENDOR, e))?,
            )
            .part(
                "media",
                reqwest::multipart::Part::bytes(video_data)
                    .file_name(file_name.to_string())
                    .mime_str("video/*")
                    .map_err(|e| VendorError::http(VENDOR, e))?,
            );

        let response = self
            .client
            .post(&url)
            .query(&[("part", "snippet,status"), ("uploadType", "multipart")])
            .bearer_auth(access_token)
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| VendorError::http(VENDOR, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("YouTube upload failed: {}", body);
            return Err(VendorError::Api {
                vendor: VENDOR,
                status,
                body,
            });
        }

        let upload_response: VideoUploadResponse = read_json(VENDOR, response).await?;
        tracing::info!("✅ Video uploaded to YouTube: {} (ID: {})", resource.snippet.title, upload_response.id);

        Ok(upload_response)
    }

    /// Exchange authorization code for access token
    pub async fn exchange_code_for_token(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Result<GoogleTokenResponse, VendorError> {
        let params = [
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = send_with_retry(VENDOR, || self.client.post(&self.token_url).form(&params)).await?;
        read_json(VENDOR, response).await
    }

    /// Refresh an expired access token using refresh token
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<GoogleTokenResponse, VendorError> {
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = send_with_retry(VENDOR, || self.client.post(&self.token_url).form(&params)).await?;
        read_json(VENDOR, response).await
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Google OAuth Helpers
// ============================================================================

/// Build Google OAuth authorization URL
pub fn build_google_oauth_url(client_id: &str, redirect_uri: &str, scopes: &[&str], state: &str) -> String {
    let scope_string = scopes.join(" ");

    // prompt=consent makes Google hand back a refresh token on every connect
    format!(
        "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&state={}&prompt=consent",
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scope_string),
        urlencoding::encode(state)
    )
}

/// Payload carried through the OAuth round trip in `state`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuthState {
    pub user_id: i32,
    pub timestamp: i64,
    pub nonce: String,
}

#[derive(Debug, PartialEq)]
pub enum OAuthStateError {
    Malformed,
    BadSignature,
    Expired,
}

impl OAuthState {
    pub fn new(user_id: i32) -> Self {
        let nonce: [u8; 16] = rand::thread_rng().gen();
        Self {
            user_id,
            timestamp: chrono::Utc::now().timestamp(),
            nonce: hex::encode(nonce),
        }
    }

    /// `<base64url json>.<hex sha256(secret + payload)>`
    pub fn sign(&self, secret: &str) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let payload = base64::prelude::BASE64_URL_SAFE_NO_PAD.encode(json);
        let signature = signature(secret, &payload);
        format!("{}.{}", payload, signature)
    }

    pub fn verify(state: &str, secret: &str, max_age: chrono::Duration) -> Result<Self, OAuthStateError> {
        let (payload, sig) = state.split_once('.').ok_or(OAuthStateError::Malformed)?;
        if signature(secret, payload) != sig {
            return Err(OAuthStateError::BadSignature);
        }

        let bytes = base64::prelude::BASE64_URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| OAuthStateError::Malformed)?;
        let parsed: OAuthState = serde_json::from_slice(&bytes).map_err(|_| OAuthStateError::Malformed)?;

        let age = chrono::Utc::now().timestamp() - parsed.timestamp;
        if age > max_age.num_seconds() || age < -60 {
            return Err(OAuthStateError::Expired);
        }
        Ok(parsed)
    }
}

fn signature(secret: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn metadata(publish_at: Option<chrono::DateTime<Utc>>) -> UploadMetadata {
        UploadMetadata {
            title: "Launch day".to_string(),
            description: "New roast".to_string(),
            privacy: "public".to_string(),
            publish_at,
            tags: vec![],
        }
    }

    #[test]
    fn test_scheduled_upload_is_private() {
        let when = Utc.with_ymd_and_hms(2030, 1, 2, 15, 0, 0).unwrap();
        let resource = build_video_resource(&metadata(Some(when)));
        assert_eq!(resource.status.privacy_status, "private");
        assert_eq!(resource.status.publish_at.as_deref(), Some("2030-01-02T15:00:00Z"));
        assert!(resource.snippet.tags.is_none());

        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["status"]["publishAt"], "2030-01-02T15:00:00Z");
    }

    #[test]
    fn test_immediate_upload_keeps_privacy() {
        let resource = build_video_resource(&metadata(None));
        assert_eq!(resource.status.privacy_status, "public");
        let json = serde_json::to_value(&resource).unwrap();
        assert!(json["status"].get("publishAt").is_none());
    }

    #[test]
    fn test_oauth_state_round_trip() {
        let state = OAuthState::new(42);
        let signed = state.sign("secret");
        let verified = OAuthState::verify(&signed, "secret", Duration::minutes(10)).unwrap();
        assert_eq!(verified, state);
    }

    #[test]
    fn test_oauth_state_rejects_tampering() {
        let signed = OAuthState::new(42).sign("secret");
        assert_eq!(
            OAuthState::verify(&signed, "other", Duration::minutes(10)),
            Err(OAuthStateError::BadSignature)
        );

        // Another user's payload under the original signature
        let forged = OAuthState::new(1).sign("secret");
        let (payload, _) = forged.split_once('.').unwrap();
        let (_, original_sig) = signed.split_once('.').unwrap();
        assert_eq!(
            OAuthState::verify(&format!("{}.{}", payload, original_sig), "secret", Duration::minutes(10)),
            Err(OAuthStateError::BadSignature)
        );
        assert_eq!(
            OAuthState::verify("no-dot", "secret", Duration::minutes(10)),
            Err(OAuthStateError::Malformed)
        );
    }

    #[test]
    fn test_oauth_state_expires() {
        let old = OAuthState {
            timestamp: Utc::now().timestamp() - 3600,
            ..OAuthState::new(7)
        };
        assert_eq!(
            OAuthState::verify(&old.sign("secret"), "secret", Duration::minutes(10)),
            Err(OAuthStateError::Expired)
        );
    }

    #[test]
    fn test_oauth_url_is_encoded() {
        let url = build_google_oauth_url("id", "http://localhost:3000/youtube/callback", &YOUTUBE_SCOPES, "a.b");
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fyoutube%2Fcallback"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("state=a.b"));
    }
}
