// A2E API client
// Talking-avatar videos and lip-sync, both tracked through /video/awsResult

use crate::error::VendorError;
use crate::jobs::poller::{ExternalJob, JobStatusSource, Provider, RemoteJobState};
use crate::vendor::{first_str, read_json, send_with_mode, RetryMode};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const VENDOR: &str = "a2e";

#[derive(Clone)]
pub struct A2EClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// Every A2E response wraps its payload in `{code, msg, data}`
#[derive(Deserialize, Debug)]
struct Envelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    fn into_data(self) -> Result<Value, VendorError> {
        if self.code != 0 {
            return Err(VendorError::Api {
                vendor: VENDOR,
                status: 200,
                body: format!("code {}: {}", self.code, self.msg.unwrap_or_default()),
            });
        }
        Ok(self.data)
    }
}

/// Translate an awsResult record into the shared job state
pub fn map_task(task: &Value) -> RemoteJobState {
    let status = task.get("status").and_then(Value::as_str).unwrap_or("pending");
    match status {
        "success" => RemoteJobState::Succeeded {
            output_url: first_str(task, &["/result", "/result_url", "/video_url"]).map(str::to_string),
            payload: task.clone(),
        },
        "fail" | "failed" => RemoteJobState::Failed {
            error: first_str(task, &["/error_msg", "/msg"])
                .unwrap_or("A2E task failed")
                .to_string(),
        },
        "processing" => RemoteJobState::Running {
            progress: task.get("progress").and_then(Value::as_f64),
        },
        // init, sent, pending and anything newer
        _ => RemoteJobState::Pending { queue_position: None },
    }
}

fn task_id(data: &Value) -> Result<String, VendorError> {
    first_str(data, &["/_id", "/id", "/0/_id"])
        .map(str::to_string)
        .ok_or(VendorError::MissingField {
            vendor: VENDOR,
            field: "data._id",
        })
}

impl A2EClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://video.a2e.ai/api/v1".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    async fn post(&self, path: &str, body: &Value, mode: RetryMode) -> Result<Value, VendorError> {
        let url = format!("{}{}", self.base_url, path);
        let response = send_with_mode(VENDOR, mode, || {
            self.client.post(&url).bearer_auth(&self.api_key).json(body)
        })
        .await?;

        let envelope: Envelope = read_json(VENDOR, response).await?;
        envelope.into_data()
    }

    /// Render `anchor_id` speaking the audio at `audio_url`
    pub async fn generate_avatar_video(
        &self,
        anchor_id: &str,
        audio_url: &str,
        title: &str,
    ) -> Result<ExternalJob, VendorError> {
        let body = json!({
            "title": title,
            "anchor_id": anchor_id,
            "anchor_type": 0,
            "audioSrc": audio_url,
            "resolution": 1080,
        });
        let data = self.post("/video/generate", &body, RetryMode::Submission).await?;
        let id = task_id(&data)?;
        tracing::info!("🧑‍🎤 A2E avatar video {} submitted", id);
        Ok(ExternalJob::new(Provider::A2e, id))
    }

    pub async fn lip_sync(&self, video_url: &str, audio_url: &str) -> Result<ExternalJob, VendorError> {
        let body = json!({
            "title": "lipsync",
            "original_video_url": video_url,
            "audio_url": audio_url,
        });
        let data = self.post("/video/lipsync", &body, RetryMode::Submission).await?;
        let id = task_id(&data)?;
        tracing::info!("👄 A2E lip-sync {} submitted", id);
        Ok(ExternalJob::new(Provider::A2e, id))
    }

    /// Raw status record for a task id
    pub async fn status(&self, id: &str) -> Result<Value, VendorError> {
        let data = self.post("/video/awsResult", &json!({ "_id": id }), RetryMode::Idempotent).await?;
        // Either the record itself or a one-element list
        match data {
            Value::Array(mut items) if !items.is_empty() => Ok(items.swap_remove(0)),
            Value::Object(_) => Ok(data),
            _ => Err(VendorError::MissingField {
                vendor: VENDOR,
                field: "data",
            }),
        }
    }
}

#[async_trait]
impl JobStatusSource for A2EClient {
    fn provider(&self) -> Provider {
        Provider::A2e
    }

    async fn fetch_state(&self, job: &ExternalJob) -> Result<RemoteJobState, VendorError> {
        let task = self.status(&job.id).await?;
        Ok(map_task(&task))
    }
}
