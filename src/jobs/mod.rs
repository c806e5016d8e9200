// src/jobs/mod.rs
//! Background tracking for vendor-side generation jobs.
//! Each submitted job gets a tokio task that polls the vendor until the job
//! finishes, then hands the outcome to a [`JobSink`] for persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub mod poller;
pub mod sink;

use poller::{poll_until_terminal, ExternalJob, JobStatusSource, PollOutcome, PollPolicy, Provider, RemoteJobState};

/// Unique identifier for a background job
pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Video,
    Scene,
    LipSync,
    Avatar,
    Image,
    ListeningScan,
}

/// Where a finished job's result gets written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobTarget {
    None,
    ContentMedia {
        content_id: i32,
    },
    ContentScene {
        content_id: i32,
        scene_index: usize,
    },
    ListeningScan {
        brief_id: Option<i32>,
        platform: String,
        keywords: Vec<String>,
    },
}

/// Job status representing the current state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Queued {
        queue_position: Option<u32>,
    },
    Running {
        progress: Option<f64>,
        attempts: u32,
    },
    Completed {
        output_url: Option<String>,
        duration_seconds: f64,
    },
    Failed {
        error: String,
    },
    TimedOut {
        attempts: u32,
    },
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed { .. } | JobStatus::Failed { .. } | JobStatus::TimedOut { .. } | JobStatus::Cancelled
        )
    }

    fn from_remote(state: &RemoteJobState, attempts: u32) -> Self {
        match state {
            RemoteJobState::Pending { queue_position } => JobStatus::Queued {
                queue_position: *queue_position,
            },
            RemoteJobState::Running { progress } => JobStatus::Running {
                progress: *progress,
                attempts,
            },
            // Terminal states never reach the progress callback
            RemoteJobState::Succeeded { output_url, .. } => JobStatus::Completed {
                output_url: output_url.clone(),
                duration_seconds: 0.0,
            },
            RemoteJobState::Failed { error } => JobStatus::Failed { error: error.clone() },
        }
    }
}

/// Job metadata
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub user_id: i32,
    pub kind: JobKind,
    pub external: ExternalJob,
    pub target: JobTarget,
    pub status: JobStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request to start tracking a vendor job
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: i32,
    pub kind: JobKind,
    pub external: ExternalJob,
    pub target: JobTarget,
}

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub job_id: JobId,
    pub deduplicated: bool,
}

#[derive(Error, Debug, PartialEq)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(JobId),
    #[error("Job {0} has already finished")]
    AlreadyFinished(JobId),
}

/// Receives the outcome of every finished job
#[async_trait]
pub trait JobSink: Send + Sync {
    async fn on_finished(&self, job: &Job, outcome: &PollOutcome);
}

/// Job manager handles background polling and state
pub struct JobManager {
    /// Jobs indexed by job_id
    jobs: RwLock<HashMap<JobId, Job>>,
    /// Unfinished jobs indexed by their vendor identity
    in_flight: RwLock<HashMap<(Provider, String), JobId>>,
    /// Cancellation handle for each running job
    cancel_tokens: RwLock<HashMap<JobId, CancellationToken>>,
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            in_flight: RwLock::new(HashMap::new()),
            cancel_tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Start polling a vendor job in the background.
    ///
    /// Submitting a vendor job that is already being tracked returns the
    /// existing job id instead of spawning a second poller.
    pub async fn submit(
        self: &Arc<Self>,
        new_job: NewJob,
        source: Arc<dyn JobStatusSource>,
        policy: PollPolicy,
        sink: Arc<dyn JobSink>,
    ) -> Submission {
        let key = (new_job.external.provider, new_job.external.id.clone());

        let mut in_flight = self.in_flight.write().await;
        if let Some(existing) = in_flight.get(&key) {
            tracing::info!("🔁 {} job {} already tracked as {}", key.0, key.1, existing);
            return Submission {
                job_id: existing.clone(),
                deduplicated: true,
            };
        }

        let job = Job {
            id: Uuid::new_v4().to_string(),
            user_id: new_job.user_id,
            kind: new_job.kind,
            external: new_job.external,
            target: new_job.target,
            status: JobStatus::Queued { queue_position: None },
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        let job_id = job.id.clone();
        let external = job.external.clone();
        let token = CancellationToken::new();

        in_flight.insert(key, job_id.clone());
        self.jobs.write().await.insert(job_id.clone(), job);
        self.cancel_tokens.write().await.insert(job_id.clone(), token.clone());
        drop(in_flight);

        tracing::info!("🎬 Created {} job {} for external id {}", external.provider, job_id, external.id);

        let manager = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            manager.run(id, external, source, policy, sink, token).await;
        });

        Submission {
            job_id,
            deduplicated: false,
        }
    }

    async fn run(
        self: Arc<Self>,
        job_id: JobId,
        external: ExternalJob,
        source: Arc<dyn JobStatusSource>,
        policy: PollPolicy,
        sink: Arc<dyn JobSink>,
        token: CancellationToken,
    ) {
        let manager = self.clone();
        let progress_id = job_id.clone();

        let outcome = poll_until_terminal(source.as_ref(), &external, &policy, &token, |attempt, state| {
            let manager = manager.clone();
            let id = progress_id.clone();
            let status = JobStatus::from_remote(state, attempt);
            async move {
                manager.record_progress(&id, status, attempt).await;
            }
        })
        .await;

        let finished = self.finish(&job_id, &external, &outcome).await;
        self.cancel_tokens.write().await.remove(&job_id);

        if let Some(job) = finished {
            sink.on_finished(&job, &outcome).await;
        }
    }

    async fn record_progress(&self, job_id: &str, status: JobStatus, attempts: u32) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            if job.started_at.is_none() && matches!(status, JobStatus::Running { .. }) {
                job.started_at = Some(Utc::now());
            }
            job.attempts = attempts;
            job.status = status;
        }
    }

    /// Mark the job terminal and release its dedup slot in one step
    async fn finish(&self, job_id: &str, external: &ExternalJob, outcome: &PollOutcome) -> Option<Job> {
        let mut in_flight = self.in_flight.write().await;
        let key = (external.provider, external.id.clone());
        if in_flight.get(&key).map(String::as_str) == Some(job_id) {
            in_flight.remove(&key);
        }

        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(job_id)?;
        let now = Utc::now();
        let since = job.started_at.unwrap_or(job.created_at);

        job.status = match outcome {
            PollOutcome::Completed { output_url, .. } => JobStatus::Completed {
                output_url: output_url.clone(),
                duration_seconds: (now - since).num_milliseconds() as f64 / 1000.0,
            },
            PollOutcome::Failed { error } => JobStatus::Failed { error: error.clone() },
            PollOutcome::TimedOut { attempts } => JobStatus::TimedOut { attempts: *attempts },
            PollOutcome::Cancelled => JobStatus::Cancelled,
        };
        job.completed_at = Some(now);

        tracing::info!("📊 Job {} finished: {:?}", job_id, job.status);
        Some(job.clone())
    }

    /// Get job details
    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// All jobs owned by a user, newest first
    pub async fn list_for_user(&self, user_id: i32) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut owned: Vec<Job> = jobs.values().filter(|j| j.user_id == user_id).cloned().collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned
    }

    /// Ask a running job to stop polling. Jobs owned by other users look missing.
    pub async fn cancel(&self, job_id: &str, user_id: i32) -> Result<(), JobError> {
        {
            let jobs = self.jobs.read().await;
            match jobs.get(job_id) {
                Some(job) if job.user_id == user_id => {
                    if job.status.is_terminal() {
                        return Err(JobError::AlreadyFinished(job_id.to_string()));
                    }
                }
                _ => return Err(JobError::NotFound(job_id.to_string())),
            }
        }

        let tokens = self.cancel_tokens.read().await;
        match tokens.get(job_id) {
            Some(token) => {
                token.cancel();
                tracing::info!("🛑 Cancellation requested for job {}", job_id);
                Ok(())
            }
            None => Err(JobError::AlreadyFinished(job_id.to_string())),
        }
    }

    /// Drop finished jobs older than `max_age`; returns how many were removed
    pub async fn cleanup_finished(&self, max_age: chrono::Duration) -> usize {
        let mut jobs = self.jobs.write().await;
        let cutoff = Utc::now() - max_age;
        let before = jobs.len();

        jobs.retain(|_, job| match job.completed_at {
            Some(completed_at) => completed_at >= cutoff,
            None => true,
        });

        let removed = before - jobs.len();
        if removed > 0 {
            tracing::debug!("🗑️ Cleaned up {} finished jobs", removed);
        }
        removed
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared job manager instance (stored in AppState)
pub type SharedJobManager = Arc<JobManager>;

#[cfg(test)]
mod tests {
    use super::poller::tests::{fast_policy, ScriptedSource};
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        finished: Mutex<Vec<(JobId, PollOutcome)>>,
    }

    #[async_trait]
    impl JobSink for RecordingSink {
        async fn on_finished(&self, job: &Job, outcome: &PollOutcome) {
            self.finished.lock().unwrap().push((job.id.clone(), outcome.clone()));
        }
    }

    /// Sink that holds every finished job until released
    struct GatedSink {
        release: tokio::sync::Notify,
        entered: tokio::sync::Notify,
    }

    #[async_trait]
    impl JobSink for GatedSink {
        async fn on_finished(&self, _job: &Job, _outcome: &PollOutcome) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    fn new_job(user_id: i32, external_id: &str) -> NewJob {
        NewJob {
            user_id,
            kind: JobKind::Video,
            external: ExternalJob::new(Provider::Fal, external_id),
            target: JobTarget::ContentMedia { content_id: 7 },
        }
    }

    async fn wait_for_terminal(manager: &JobManager, job_id: &str) -> Job {
        for _ in 0..200 {
            if let Some(job) = manager.get(job_id).await {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never finished", job_id);
    }

    fn running_forever() -> Arc<ScriptedSource> {
        Arc::new(ScriptedSource::new(
            Provider::Fal,
            vec![Ok(RemoteJobState::Running { progress: Some(0.5) })],
        ))
    }

    #[tokio::test]
    async fn test_job_completes_and_reaches_sink() {
        let manager = Arc::new(JobManager::new());
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(ScriptedSource::new(
            Provider::Fal,
            vec![
                Ok(RemoteJobState::Running { progress: None }),
                Ok(RemoteJobState::Succeeded {
                    output_url: Some("https://cdn/v.mp4".to_string()),
                    payload: json!({}),
                }),
            ],
        ));

        let submission = manager.submit(new_job(1, "req-1"), source, fast_policy(10), sink.clone()).await;
        assert!(!submission.deduplicated);

        let job = wait_for_terminal(&manager, &submission.job_id).await;
        match job.status {
            JobStatus::Completed { output_url, .. } => assert_eq!(output_url.as_deref(), Some("https://cdn/v.mp4")),
            other => panic!("unexpected status {:?}", other),
        }
        assert!(job.completed_at.is_some());
        assert!(job.started_at.is_some());

        // Sink runs right after the status flips
        tokio::time::sleep(Duration::from_millis(20)).await;
        let finished = sink.finished.lock().unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].0, submission.job_id);
    }

    #[tokio::test]
    async fn test_duplicate_submission_reuses_job() {
        let manager = Arc::new(JobManager::new());
        let sink = Arc::new(RecordingSink::default());

        let first = manager.submit(new_job(1, "req-2"), running_forever(), fast_policy(10_000), sink.clone()).await;
        let second = manager.submit(new_job(1, "req-2"), running_forever(), fast_policy(10_000), sink.clone()).await;

        assert!(second.deduplicated);
        assert_eq!(first.job_id, second.job_id);
        assert_eq!(manager.list_for_user(1).await.len(), 1);

        manager.cancel(&first.job_id, 1).await.unwrap();
        let job = wait_for_terminal(&manager, &first.job_id).await;
        assert_eq!(job.status, JobStatus::Cancelled);

        // Once finished, the same vendor id can be tracked again
        tokio::time::sleep(Duration::from_millis(20)).await;
        let third = manager.submit(new_job(1, "req-2"), running_forever(), fast_policy(10_000), sink).await;
        assert!(!third.deduplicated);
        assert_ne!(third.job_id, first.job_id);
        manager.cancel(&third.job_id, 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let manager = Arc::new(JobManager::new());
        let sink = Arc::new(RecordingSink::default());
        let submission = manager.submit(new_job(1, "req-3"), running_forever(), fast_policy(10_000), sink).await;

        assert_eq!(
            manager.cancel(&submission.job_id, 2).await,
            Err(JobError::NotFound(submission.job_id.clone()))
        );
        assert_eq!(
            manager.cancel("missing", 1).await,
            Err(JobError::NotFound("missing".to_string()))
        );

        manager.cancel(&submission.job_id, 1).await.unwrap();
        wait_for_terminal(&manager, &submission.job_id).await;
        assert_eq!(
            manager.cancel(&submission.job_id, 1).await,
            Err(JobError::AlreadyFinished(submission.job_id.clone()))
        );
    }

    #[tokio::test]
    async fn test_progress_is_recorded() {
        let manager = Arc::new(JobManager::new());
        let sink = Arc::new(RecordingSink::default());
        let submission = manager.submit(new_job(3, "req-4"), running_forever(), fast_policy(10_000), sink).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let job = manager.get(&submission.job_id).await.unwrap();
        match job.status {
            JobStatus::Running { progress, attempts } => {
                assert_eq!(progress, Some(0.5));
                assert!(attempts >= 1);
            }
            other => panic!("unexpected status {:?}", other),
        }
        manager.cancel(&submission.job_id, 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_only_removes_old_finished_jobs() {
        let manager = Arc::new(JobManager::new());
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(ScriptedSource::new(
            Provider::Replicate,
            vec![Ok(RemoteJobState::Failed { error: "nsfw".to_string() })],
        ));
        let done = manager.submit(new_job(1, "req-5"), source, fast_policy(10), sink.clone()).await;
        let running = manager.submit(new_job(1, "req-6"), running_forever(), fast_policy(10_000), sink).await;
        wait_for_terminal(&manager, &done.job_id).await;

        assert_eq!(manager.cleanup_finished(chrono::Duration::hours(1)).await, 0);
        assert_eq!(manager.cleanup_finished(chrono::Duration::zero()).await, 1);
        assert!(manager.get(&done.job_id).await.is_none());
        assert!(manager.get(&running.job_id).await.is_some());
        manager.cancel(&running.job_id, 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_finished_job_frees_slot_before_sink_returns() {
        let manager = Arc::new(JobManager::new());
        let sink = Arc::new(GatedSink {
            release: tokio::sync::Notify::new(),
            entered: tokio::sync::Notify::new(),
        });
        let source = Arc::new(ScriptedSource::new(
            Provider::Fal,
            vec![Ok(RemoteJobState::Failed { error: "rejected".to_string() })],
        ));

        let first = manager.submit(new_job(1, "req-7"), source, fast_policy(10), sink.clone()).await;
        tokio::time::timeout(Duration::from_secs(5), sink.entered.notified())
            .await
            .expect("sink should be called");

        // Sink is still running, but the job is already terminal
        let second = manager.submit(new_job(1, "req-7"), running_forever(), fast_policy(10_000), sink.clone()).await;
        assert!(!second.deduplicated);
        assert_ne!(second.job_id, first.job_id);

        sink.release.notify_one();
        manager.cancel(&second.job_id, 1).await.unwrap();
        sink.release.notify_one();
    }
}
