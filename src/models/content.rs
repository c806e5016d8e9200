use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedContent {
    pub id: i32,
    pub user_id: i32,
    pub brief_id: Option<i32>,
    pub platform: String,
    pub content_type: String, // "script", "caption", "image", "video"
    pub title: String,
    pub body: String,
    pub hashtags: Vec<String>,
    pub status: String,       // see ContentStatus
    pub media_url: Option<String>,
    pub media_status: String, // see MediaStatus
    pub media_error: Option<String>,
    pub audio_url: Option<String>,
    pub scenes: Json<Vec<Scene>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// One shot of a multi-scene script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub index: usize,
    pub description: String,
    #[serde(default)]
    pub narration: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub status: MediaStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GeneratedContent {
    pub fn review_status(&self) -> Option<ContentStatus> {
        self.status.parse().ok()
    }

    /// Scenes that still need a video
    pub fn scenes_without_video(&self) -> Vec<&Scene> {
        self.scenes
            .iter()
            .filter(|s| s.video_url.is_none() && s.status != MediaStatus::Processing)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Script,
    Caption,
    Image,
    Video,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Script => "script",
            ContentType::Caption => "caption",
            ContentType::Image => "image",
            ContentType::Video => "video",
        }
    }
}

/// Review state of a content record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Pending,
    Approved,
    Rejected,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Pending => "pending",
            ContentStatus::Approved => "approved",
            ContentStatus::Rejected => "rejected",
        }
    }

    /// Pending items get reviewed; reviewed items can only be re-opened
    pub fn can_transition_to(&self, next: ContentStatus) -> bool {
        matches!(
            (self, next),
            (ContentStatus::Pending, ContentStatus::Approved)
                | (ContentStatus::Pending, ContentStatus::Rejected)
                | (ContentStatus::Approved, ContentStatus::Pending)
                | (ContentStatus::Rejected, ContentStatus::Pending)
        )
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ContentStatus::Pending),
            "approved" => Ok(ContentStatus::Approved),
            "rejected" => Ok(ContentStatus::Rejected),
            other => Err(format!("Unknown content status '{}'", other)),
        }
    }
}

/// Progress of the media attached to a content record or scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    #[default]
    None,
    Processing,
    Ready,
    Failed,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::None => "none",
            MediaStatus::Processing => "processing",
            MediaStatus::Ready => "ready",
            MediaStatus::Failed => "failed",
        }
    }
}

/// New record produced by a generation call
#[derive(Debug, Clone)]
pub struct NewContent {
    pub user_id: i32,
    pub brief_id: Option<i32>,
    pub platform: String,
    pub content_type: ContentType,
    pub title: String,
    pub body: String,
    pub hashtags: Vec<String>,
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContentStatusRequest {
    pub status: ContentStatus,
}

#[derive(Debug, Deserialize)]
pub struct ContentListQuery {
    pub status: Option<ContentStatus>,
    pub brief_id: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_transitions() {
        use ContentStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("approved".parse::<ContentStatus>(), Ok(ContentStatus::Approved));
        assert!("published".parse::<ContentStatus>().is_err());
    }

    #[test]
    fn test_scene_defaults_when_deserializing() {
        let scene: Scene = serde_json::from_str(r#"{"index": 0, "description": "Sunrise over a cafe"}"#).unwrap();
        assert_eq!(scene.status, MediaStatus::None);
        assert!(scene.video_url.is_none());
        assert!(scene.narration.is_empty());
    }
}
