// Steve.ai "Studio Package" client
// Script-to-video renders

use crate::error::VendorError;
use crate::jobs::poller::{ExternalJob, JobStatusSource, Provider, RemoteJobState};
use crate::vendor::{first_str, read_json, send_with_retry, submit_with_retry};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const VENDOR: &str = "steve_ai";

#[derive(Clone)]
pub struct SteveAIClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize, Debug)]
struct CreateVideoRequest<'a> {
    script: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<&'a str>,
    aspect_ratio: &'a str,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SteveVideoStatus {
    #[serde(default, alias = "id")]
    pub video_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub fn map_status(status: &SteveVideoStatus, raw: &Value) -> RemoteJobState {
    match status.status.as_str() {
        "queued" => RemoteJobState::Pending { queue_position: None },
        "rendering" | "processing" => RemoteJobState::Running {
            progress: status.progress,
        },
        "completed" => RemoteJobState::Succeeded {
            output_url: status.video_url.clone(),
            payload: raw.clone(),
        },
        "failed" => RemoteJobState::Failed {
            error: status
                .error
                .clone()
                .unwrap_or_else(|| "Steve.ai render failed".to_string()),
        },
        other => RemoteJobState::Failed {
            error: format!("Unknown Steve.ai status '{}'", other),
        },
    }
}

impl SteveAIClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Start a render from a script; `aspect_ratio` like "9:16"
    pub async fn create_video(
        &self,
        script: &str,
        template: Option<&str>,
        aspect_ratio: &str,
    ) -> Result<ExternalJob, VendorError> {
        let url = format!("{}/videos", self.base_url);
        let body = CreateVideoRequest {
            script,
            template,
            aspect_ratio,
        };

        let response = submit_with_retry(VENDOR, || {
            self.client.post(&url).bearer_auth(&self.api_key).json(&body)
        })
        .await?;

        let created: Value = read_json(VENDOR, response).await?;
        let id = first_str(&created, &["/video_id", "/id", "/data/video_id"])
            .ok_or(VendorError::MissingField {
                vendor: VENDOR,
                field: "video_id",
            })?
            .to_string();

        tracing::info!("🎞️ Steve.ai render {} started", id);
        Ok(ExternalJob::new(Provider::SteveAi, id))
    }

    pub async fn status(&self, id: &str) -> Result<(SteveVideoStatus, Value), VendorError> {
        let url = format!("{}/videos/{}", self.base_url, id);
        let response = send_with_retry(VENDOR, || self.client.get(&url).bearer_auth(&self.api_key)).await?;

        let raw: Value = read_json(VENDOR, response).await?;
        let status = serde_json::from_value(raw.clone()).map_err(|e| VendorError::decode(VENDOR, e))?;
        Ok((status, raw))
    }
}

#[async_trait]
impl JobStatusSource for SteveAIClient {
    fn provider(&self) -> Provider {
        Provider::SteveAi
    }

    async fn fetch_state(&self, job: &ExternalJob) -> Result<RemoteJobState, VendorError> {
        let (status, raw) = self.status(&job.id).await?;
        Ok(map_status(&status, &raw))
    }
}
