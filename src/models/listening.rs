use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// A captured mention or comment that matched a brief's keywords
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ListeningHit {
    pub id: i32,
    pub user_id: i32,
    pub brief_id: Option<i32>,
    pub platform: String,
    pub author: String,
    pub text: String,
    pub url: Option<String>,
    pub matched_keywords: Vec<String>,
    pub posted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewListeningHit {
    pub platform: String,
    pub author: String,
    pub text: String,
    pub url: Option<String>,
    pub matched_keywords: Vec<String>,
    pub posted_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReplyDraft {
    pub id: i32,
    pub user_id: i32,
    pub hit_id: i32,
    pub body: String,
    pub status: String, // see ReplyStatus
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Pending,
    Approved,
    Rejected,
    Posted,
}

impl ReplyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyStatus::Pending => "pending",
            ReplyStatus::Approved => "approved",
            ReplyStatus::Rejected => "rejected",
            ReplyStatus::Posted => "posted",
        }
    }

    pub fn can_transition_to(&self, next: ReplyStatus) -> bool {
        matches!(
            (self, next),
            (ReplyStatus::Pending, ReplyStatus::Approved)
                | (ReplyStatus::Pending, ReplyStatus::Rejected)
                | (ReplyStatus::Approved, ReplyStatus::Posted)
        )
    }

    /// Only drafts nobody has signed off on can still be edited
    pub fn is_editable(&self) -> bool {
        matches!(self, ReplyStatus::Pending)
    }
}

impl FromStr for ReplyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReplyStatus::Pending),
            "approved" => Ok(ReplyStatus::Approved),
            "rejected" => Ok(ReplyStatus::Rejected),
            "posted" => Ok(ReplyStatus::Posted),
            other => Err(format!("Unknown reply status '{}'", other)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub brief_id: i32,
    pub platform: String,
    /// Overrides the brief's keywords when present
    pub keywords: Option<Vec<String>>,
    pub max_items: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct HitListQuery {
    pub brief_id: Option<i32>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReplyRequest {
    pub status: Option<ReplyStatus>,
    pub body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_transitions() {
        use ReplyStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Posted));
        assert!(!Pending.can_transition_to(Posted));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Posted.can_transition_to(Pending));
    }

    #[test]
    fn test_only_pending_is_editable() {
        assert!(ReplyStatus::Pending.is_editable());
        assert!(!ReplyStatus::Approved.is_editable());
        assert_eq!("posted".parse::<ReplyStatus>(), Ok(ReplyStatus::Posted));
    }
}
