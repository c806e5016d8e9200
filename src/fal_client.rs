// Fal.ai queue API client
// Text-to-video, image generation and lip-sync run as queued requests

use crate::error::VendorError;
use crate::jobs::poller::{ExternalJob, JobStatusSource, Provider, RemoteJobState};
use crate::vendor::{first_str, read_json, send_with_retry, submit_with_retry};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const VENDOR: &str = "fal";

pub struct FalModels;

impl FalModels {
    pub const TEXT_TO_VIDEO: &'static str = "fal-ai/kling-video/v1.6/standard/text-to-video";
    pub const IMAGE: &'static str = "fal-ai/flux/dev";
    pub const LIP_SYNC: &'static str = "fal-ai/sync-lipsync";
}

#[derive(Clone)]
pub struct FalClient {
    client: Client,
    api_key: String,
    queue_url: String,
}

#[derive(Deserialize, Debug)]
struct SubmitResponse {
    request_id: String,
    #[serde(default)]
    status_url: Option<String>,
    #[serde(default)]
    response_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FalStatus {
    pub status: String,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What a status response means before the result is fetched
#[derive(Debug, PartialEq)]
pub enum FalPhase {
    Queued(Option<u32>),
    InProgress,
    Completed,
    Failed(String),
}

pub fn map_status(status: &FalStatus) -> FalPhase {
    if let Some(error) = status.error.as_ref().filter(|e| !e.is_empty()) {
        return FalPhase::Failed(error.clone());
    }
    match status.status.as_str() {
        "IN_QUEUE" => FalPhase::Queued(status.queue_position),
        "IN_PROGRESS" => FalPhase::InProgress,
        "COMPLETED" => FalPhase::Completed,
        other => FalPhase::Failed(format!("Unknown Fal.ai status '{}'", other)),
    }
}

/// Media URL in a Fal.ai result, whichever model produced it
pub fn output_url(result: &Value) -> Option<String> {
    first_str(result, &["/video/url", "/images/0/url", "/image/url", "/audio/url"]).map(str::to_string)
}

pub fn text_to_video_input(prompt: &str, aspect_ratio: &str) -> Value {
    json!({ "prompt": prompt, "aspect_ratio": aspect_ratio, "duration": "5" })
}

pub fn image_input(prompt: &str) -> Value {
    json!({ "prompt": prompt, "image_size": "square_hd", "num_images": 1 })
}

pub fn lip_sync_input(video_url: &str, audio_url: &str) -> Value {
    json!({ "video_url": video_url, "audio_url": audio_url })
}

impl FalClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://queue.fal.run".to_string())
    }

    pub fn with_base_url(api_key: String, queue_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            queue_url,
        }
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    /// Queue a request for `model`; the returned job carries the status/result URLs
    pub async fn submit(&self, model: &str, input: &Value) -> Result<ExternalJob, VendorError> {
        let url = format!("{}/{}", self.queue_url, model);
        let auth = self.auth_header();

        let response = submit_with_retry(VENDOR, || {
            self.client
                .post(&url)
                .header("Authorization", &auth)
                .json(input)
        })
        .await?;

        let submitted: SubmitResponse = read_json(VENDOR, response).await?;
        tracing::info!("📤 Fal.ai request {} queued on {}", submitted.request_id, model);

        let base = format!("{}/{}/requests/{}", self.queue_url, model, submitted.request_id);
        Ok(ExternalJob {
            provider: Provider::Fal,
            status_url: Some(submitted.status_url.unwrap_or_else(|| format!("{}/status", base))),
            response_url: Some(submitted.response_url.unwrap_or(base)),
            id: submitted.request_id,
        })
    }

    pub async fn status(&self, job: &ExternalJob) -> Result<FalStatus, VendorError> {
        let url = job.status_url.as_deref().ok_or(VendorError::MissingField {
            vendor: VENDOR,
            field: "status_url",
        })?;
        let auth = self.auth_header();

        let response = send_with_retry(VENDOR, || self.client.get(url).header("Authorization", &auth)).await?;
        read_json(VENDOR, response).await
    }

    pub async fn result(&self, job: &ExternalJob) -> Result<Value, VendorError> {
        let url = job.response_url.as_deref().ok_or(VendorError::MissingField {
            vendor: VENDOR,
            field: "response_url",
        })?;
        let auth = self.auth_header();

        let response = send_with_retry(VENDOR, || self.client.get(url).header("Authorization", &auth)).await?;
        read_json(VENDOR, response).await
    }
}

#[async_trait]
impl JobStatusSource for FalClient {
    fn provider(&self) -> Provider {
        Provider::Fal
    }

    async fn fetch_state(&self, job: &ExternalJob) -> Result<RemoteJobState, VendorError> {
        let status = self.status(job).await?;
        Ok(match map_status(&status) {
            FalPhase::Queued(queue_position) => RemoteJobState::Pending { queue_position },
            FalPhase::InProgress => RemoteJobState::Running { progress: None },
            FalPhase::Failed(error) => RemoteJobState::Failed { error },
            FalPhase::Completed => {
                let payload = self.result(job).await?;
                match output_url(&payload) {
                    Some(url) => RemoteJobState::Succeeded {
                        output_url: Some(url),
                        payload,
                    },
                    None => RemoteJobState::Failed {
                        error: first_str(&payload, &["/detail", "/error"])
                            .unwrap_or("Fal.ai result has no media URL")
                            .to_string(),
                    },
                }
            }
        })
    }
}
