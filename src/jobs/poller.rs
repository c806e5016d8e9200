// src/jobs/poller.rs
//! Generic "poll until terminal state" loop for vendor-side async jobs.
//! Every provider (Fal.ai, A2E, Steve.ai, Replicate, Apify) plugs in through
//! [`JobStatusSource`]; the loop owns interval, attempt cap and cancellation.

use crate::error::VendorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Vendor running an asynchronous job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Fal,
    A2e,
    SteveAi,
    Replicate,
    Apify,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Fal => "fal",
            Provider::A2e => "a2e",
            Provider::SteveAi => "steve_ai",
            Provider::Replicate => "replicate",
            Provider::Apify => "apify",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a job living on a vendor's side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalJob {
    pub provider: Provider,
    pub id: String,
    /// Some vendors hand back the exact URLs to poll; others derive them from the id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_url: Option<String>,
}

impl ExternalJob {
    pub fn new(provider: Provider, id: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
            status_url: None,
            response_url: None,
        }
    }
}

/// Vendor job state translated into one vocabulary
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteJobState {
    Pending { queue_position: Option<u32> },
    Running { progress: Option<f64> },
    Succeeded {
        output_url: Option<String>,
        payload: serde_json::Value,
    },
    Failed { error: String },
}

impl RemoteJobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteJobState::Succeeded { .. } | RemoteJobState::Failed { .. })
    }
}

#[async_trait]
pub trait JobStatusSource: Send + Sync {
    fn provider(&self) -> Provider;

    async fn fetch_state(&self, job: &ExternalJob) -> Result<RemoteJobState, VendorError>;
}

#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
            max_consecutive_errors: 5,
        }
    }
}

impl PollPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed {
        output_url: Option<String>,
        payload: serde_json::Value,
    },
    Failed { error: String },
    TimedOut { attempts: u32 },
    Cancelled,
}

/// Poll `job` until it reaches a terminal state, the attempt cap is hit,
/// too many transient errors happen in a row, or `cancel` fires.
/// An in-flight status check is abandoned as soon as `cancel` fires.
///
/// The first check happens immediately. `on_update` is awaited with the
/// attempt number for every non-terminal state observed.
pub async fn poll_until_terminal<S, F, Fut>(
    source: &S,
    job: &ExternalJob,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut on_update: F,
) -> PollOutcome
where
    S: JobStatusSource + ?Sized,
    F: FnMut(u32, &RemoteJobState) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut consecutive_errors = 0u32;

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        let fetched = tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            fetched = source.fetch_state(job) => fetched,
        };

        match fetched {
            Ok(RemoteJobState::Succeeded { output_url, payload }) => {
                tracing::info!(provider = %job.provider, external_id = %job.id, attempt, "job completed");
                return PollOutcome::Completed { output_url, payload };
            }
            Ok(RemoteJobState::Failed { error }) => {
                tracing::warn!(provider = %job.provider, external_id = %job.id, attempt, "job failed: {}", error);
                return PollOutcome::Failed { error };
            }
            Ok(state) => {
                consecutive_errors = 0;
                tracing::debug!(provider = %job.provider, external_id = %job.id, attempt, ?state, "job still in progress");
                on_update(attempt, &state).await;
            }
            Err(e) if e.is_transient() => {
                consecutive_errors += 1;
                tracing::warn!(
                    provider = %job.provider,
                    external_id = %job.id,
                    consecutive_errors,
                    "transient error while polling: {}",
                    e
                );
                if consecutive_errors > policy.max_consecutive_errors {
                    return PollOutcome::Failed {
                        error: format!("Gave up after {} consecutive errors: {}", consecutive_errors, e),
                    };
                }
            }
            Err(e) => {
                tracing::error!(provider = %job.provider, external_id = %job.id, "polling failed: {}", e);
                return PollOutcome::Failed { error: e.to_string() };
            }
        }

        if attempt == policy.max_attempts {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }

    tracing::warn!(provider = %job.provider, external_id = %job.id, attempts = policy.max_attempts, "job timed out");
    PollOutcome::TimedOut {
        attempts: policy.max_attempts,
    }
}
