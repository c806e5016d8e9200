// Replicate predictions client

use crate::error::VendorError;
use crate::jobs::poller::{ExternalJob, JobStatusSource, Provider, RemoteJobState};
use crate::vendor::{read_json, send_with_retry, submit_with_retry};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const VENDOR: &str = "replicate";

pub struct ReplicateModels;

impl ReplicateModels {
    pub const IMAGE: &'static str = "black-forest-labs/flux-schnell";
    pub const VIDEO: &'static str = "minimax/video-01";
}

#[derive(Clone)]
pub struct ReplicateClient {
    client: Client,
    api_token: String,
    base_url: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Prediction {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub urls: Option<PredictionUrls>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PredictionUrls {
    #[serde(default)]
    pub get: Option<String>,
}

/// First URL in a prediction output, which is a string or a list of strings
pub fn output_url(output: &Value) -> Option<String> {
    match output {
        Value::String(url) if !url.is_empty() => Some(url.clone()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str()).map(str::to_string),
        _ => None,
    }
}

pub fn map_prediction(prediction: &Prediction) -> RemoteJobState {
    match prediction.status.as_str() {
        "starting" => RemoteJobState::Pending { queue_position: None },
        "processing" => RemoteJobState::Running { progress: None },
        "succeeded" => RemoteJobState::Succeeded {
            output_url: output_url(&prediction.output),
            payload: prediction.output.clone(),
        },
        "failed" | "canceled" => RemoteJobState::Failed {
            error: match &prediction.error {
                Some(Value::String(e)) => e.clone(),
                Some(Value::Null) | None => format!("Prediction {}", prediction.status),
                Some(other) => other.to_string(),
            },
        },
        other => RemoteJobState::Failed {
            error: format!("Unknown Replicate status '{}'", other),
        },
    }
}

pub fn image_input(prompt: &str) -> Value {
    json!({ "prompt": prompt, "num_outputs": 1, "output_format": "png" })
}

pub fn video_input(prompt: &str) -> Value {
    json!({ "prompt": prompt, "prompt_optimizer": true })
}

impl ReplicateClient {
    pub fn new(api_token: String) -> Self {
        Self::with_base_url(api_token, "https://api.replicate.com/v1".to_string())
    }

    pub fn with_base_url(api_token: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_token,
            base_url,
        }
    }

    /// `version_or_model` is either a 64-char version hash or `owner/name`
    pub async fn create_prediction(&self, version_or_model: &str, input: Value) -> Result<ExternalJob, VendorError> {
        let (url, body) = if version_or_model.contains('/') {
            (
                format!("{}/models/{}/predictions", self.base_url, version_or_model),
                json!({ "input": input }),
            )
        } else {
            (
                format!("{}/predictions", self.base_url),
                json!({ "version": version_or_model, "input": input }),
            )
        };

        let response = submit_with_retry(VENDOR, || {
            self.client.post(&url).bearer_auth(&self.api_token).json(&body)
        })
        .await?;

        let prediction: Prediction = read_json(VENDOR, response).await?;
        tracing::info!("🔮 Replicate prediction {} created ({})", prediction.id, version_or_model);

        Ok(ExternalJob {
            provider: Provider::Replicate,
            status_url: prediction.urls.and_then(|u| u.get),
            response_url: None,
            id: prediction.id,
        })
    }

    pub async fn get_prediction(&self, job: &ExternalJob) -> Result<Prediction, VendorError> {
        let url = job
            .status_url
            .clone()
            .unwrap_or_else(|| format!("{}/predictions/{}", self.base_url, job.id));

        let response = send_with_retry(VENDOR, || self.client.get(&url).bearer_auth(&self.api_token)).await?;
        read_json(VENDOR, response).await
    }
}

#[async_trait]
impl JobStatusSource for ReplicateClient {
    fn provider(&self) -> Provider {
        Provider::Replicate
    }

    async fn fetch_state(&self, job: &ExternalJob) -> Result<RemoteJobState, VendorError> {
        let prediction = self.get_prediction(job).await?;
        Ok(map_prediction(&prediction))
    }
}
