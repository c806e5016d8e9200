// Apify client
// Runs the social listening scraper actor and reads its dataset

use crate::error::VendorError;
use crate::jobs::poller::{ExternalJob, JobStatusSource, Provider, RemoteJobState};
use crate::vendor::{first_str, read_json, send_with_retry, submit_with_retry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const VENDOR: &str = "apify";

#[derive(Clone)]
pub struct ApifyClient {
    client: Client,
    token: String,
    base_url: String,
}

#[derive(Deserialize, Debug)]
struct RunEnvelope {
    data: ActorRun,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActorRun {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub default_dataset_id: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

/// A scraped post normalised across platforms
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedPost {
    pub platform: String,
    pub author: String,
    pub text: String,
    pub url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

pub fn map_run(run: &ActorRun) -> RemoteJobState {
    match run.status.as_str() {
        "READY" => RemoteJobState::Pending { queue_position: None },
        "RUNNING" => RemoteJobState::Running { progress: None },
        "SUCCEEDED" => RemoteJobState::Succeeded {
            output_url: None,
            payload: json!({ "defaultDatasetId": run.default_dataset_id }),
        },
        "FAILED" | "ABORTED" | "TIMED-OUT" | "TIMING-OUT" | "ABORTING" => RemoteJobState::Failed {
            error: run
                .status_message
                .clone()
                .unwrap_or_else(|| format!("Actor run {}", run.status.to_lowercase())),
        },
        other => RemoteJobState::Failed {
            error: format!("Unknown Apify run status '{}'", other),
        },
    }
}

/// Pull the fields we store out of one dataset item; items without text are dropped
pub fn normalize_item(item: &Value, platform: &str) -> Option<ScrapedPost> {
    let text = first_str(item, &["/text", "/full_text", "/caption", "/content"])?.trim();
    if text.is_empty() {
        return None;
    }

    let author = first_str(
        item,
        &["/author", "/username", "/ownerUsername", "/user/screen_name", "/author/name"],
    )
    .unwrap_or_default();
    let url = first_str(item, &["/url", "/postUrl"]).map(str::to_string);
    let posted_at = first_str(item, &["/timestamp", "/createdAt", "/created_at"])
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc));

    Some(ScrapedPost {
        platform: platform.to_string(),
        author: author.to_string(),
        text: text.to_string(),
        url,
        posted_at,
    })
}

pub fn scraper_input(platform: &str, keywords: &[String], max_items: u32) -> Value {
    json!({
        "platform": platform,
        "searchTerms": keywords,
        "maxItems": max_items,
    })
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, "https://api.apify.com/v2".to_string())
    }

    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            token,
            base_url,
        }
    }

    pub async fn start_run(&self, actor: &str, input: &Value) -> Result<ExternalJob, VendorError> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor);
        let response = submit_with_retry(VENDOR, || {
            self.client.post(&url).bearer_auth(&self.token).json(input)
        })
        .await?;

        let envelope: RunEnvelope = read_json(VENDOR, response).await?;
        tracing::info!("🕷️ Apify run {} started for {}", envelope.data.id, actor);
        Ok(ExternalJob::new(Provider::Apify, envelope.data.id))
    }

    pub async fn run_status(&self, run_id: &str) -> Result<ActorRun, VendorError> {
        let url = format!("{}/actor-runs/{}", self.base_url, run_id);
        let response = send_with_retry(VENDOR, || self.client.get(&url).bearer_auth(&self.token)).await?;

        let envelope: RunEnvelope = read_json(VENDOR, response).await?;
        Ok(envelope.data)
    }

    pub async fn dataset_items(&self, dataset_id: &str, limit: u32) -> Result<Vec<Value>, VendorError> {
        let url = format!("{}/datasets/{}/items", self.base_url, dataset_id);
        let limit = limit.to_string();
        let response = send_with_retry(VENDOR, || {
            self.client
                .get(&url)
                .bearer_auth(&self.token)
                .query(&[("clean", "true"), ("format", "json"), ("limit", limit.as_str())])
        })
        .await?;

        read_json(VENDOR, response).await
    }
}

#[async_trait]
impl JobStatusSource for ApifyClient {
    fn provider(&self) -> Provider {
        Provider::Apify
    }

    async fn fetch_state(&self, job: &ExternalJob) -> Result<RemoteJobState, VendorError> {
        let run = self.run_status(&job.id).await?;
        Ok(map_run(&run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(status: &str) -> ActorRun {
        ActorRun {
            id: "run-1".to_string(),
            status: status.to_string(),
            default_dataset_id: Some("ds-1".to_string()),
            status_message: None,
        }
    }

    #[test]
    fn test_run_states() {
        assert_eq!(map_run(&run("READY")), RemoteJobState::Pending { queue_position: None });
        assert_eq!(map_run(&run("RUNNING")), RemoteJobState::Running { progress: None });
        assert_eq!(
            map_run(&run("SUCCEEDED")),
            RemoteJobState::Succeeded {
                output_url: None,
                payload: json!({"defaultDatasetId": "ds-1"}),
            }
        );
        for status in ["FAILED", "ABORTED", "TIMED-OUT", "TIMING-OUT", "ABORTING"] {
            assert!(matches!(map_run(&run(status)), RemoteJobState::Failed { .. }), "{}", status);
        }
    }

    #[test]
    fn test_normalize_tweet_shape() {
        let item = json!({
            "full_text": "  Loving the new espresso blend  ",
            "user": {"screen_name": "bean_fan"},
            "url": "https://x.com/bean_fan/status/1",
            "created_at": "2025-03-01T10:00:00Z"
        });
        let post = normalize_item(&item, "twitter").unwrap();
        assert_eq!(post.text, "Loving the new espresso blend");
        assert_eq!(post.author, "bean_fan");
        assert_eq!(post.url.as_deref(), Some("https://x.com/bean_fan/status/1"));
        assert!(post.posted_at.is_some());
    }

    #[test]
    fn test_normalize_instagram_shape() {
        let item = json!({
            "caption": "Morning ritual",
            "ownerUsername": "cafe_life",
            "postUrl": "https://instagram.com/p/abc",
            "timestamp": "not a date"
        });
        let post = normalize_item(&item, "instagram").unwrap();
        assert_eq!(post.author, "cafe_life");
        assert_eq!(post.url.as_deref(), Some("https://instagram.com/p/abc"));
        assert!(post.posted_at.is_none());
    }

    #[test]
    fn test_items_without_text_are_dropped() {
        assert!(normalize_item(&json!({"author": "x"}), "tiktok").is_none());
        assert!(normalize_item(&json!({"text": "   "}), "tiktok").is_none());
    }
}
