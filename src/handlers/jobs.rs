// src/handlers/jobs.rs
//! Job endpoints - list, status, cancel

use axum::{
    extract::{Extension, Path},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use crate::error::{ApiResult, AppError};
use crate::jobs::poller::{JobStatusSource, PollPolicy};
use crate::jobs::{JobError, JobId, NewJob, Submission};
use crate::middleware::auth::{auth_middleware, CurrentUser};
use crate::AppState;

impl From<JobError> for AppError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::NotFound(_) => AppError::NotFound(e.to_string()),
            JobError::AlreadyFinished(_) => AppError::Conflict(e.to_string()),
        }
    }
}

/// Wrap a vendor client as a poll source
pub(crate) fn shared<S>(client: &S) -> Arc<dyn JobStatusSource>
where
    S: JobStatusSource + Clone + 'static,
{
    Arc::new(client.clone())
}

/// Hand a vendor job to the job manager with the app's sink
pub(crate) async fn track(
    state: &AppState,
    new_job: NewJob,
    source: Arc<dyn JobStatusSource>,
    policy: PollPolicy,
) -> Submission {
    state
        .job_manager
        .submit(new_job, source, policy, state.job_sink.clone())
        .await
}

/// GET /api/jobs - All jobs for the current user
pub async fn list_jobs(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let jobs = state.job_manager.list_for_user(user.id).await;

    Ok(Json(json!({
        "success": true,
        "job_count": jobs.len(),
        "jobs": jobs
    })))
}

/// GET /api/jobs/:job_id - Job status
pub async fn get_job(
    Path(job_id): Path<JobId>,
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let job = state
        .job_manager
        .get(&job_id)
        .await
        .filter(|job| job.user_id == user.id)
        .ok_or_else(|| AppError::from(JobError::NotFound(job_id.clone())))?;

    Ok(Json(json!({
        "success": true,
        "job": job
    })))
}

/// POST /api/jobs/:job_id/cancel - Stop polling a running job
pub async fn cancel_job(
    Path(job_id): Path<JobId>,
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    state.job_manager.cancel(&job_id, user.id).await?;

    Ok(Json(json!({
        "success": true,
        "job_id": job_id,
        "message": "Cancellation requested"
    })))
}

/// Routes for job management
pub fn job_routes() -> Router {
    Router::new()
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/:job_id", get(get_job))
        .route("/api/jobs/:job_id/cancel", post(cancel_job))
        .layer(axum::middleware::from_fn(auth_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_job_errors_map_to_http() {
        let missing = AppError::from(JobError::NotFound("j1".to_string()));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let finished = AppError::from(JobError::AlreadyFinished("j1".to_string()));
        assert_eq!(finished.status_code(), StatusCode::CONFLICT);
    }
}
