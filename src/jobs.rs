//! Starting analysis jobs and waiting for them to finish.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;

use crate::cvms::CvmsClient;
use crate::error::{ApiError, ApiResult, PollTimeout};
use crate::model::{ConnectorDescriptor, JobHandle, JobStatus, ProjectId};

/// Seconds between two status checks
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 4;

/// Seconds before a wait gives up
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30 * 60;

/// Something that can report the status of a job
/// Note: async_fn_in_trait is allowed because this trait is internal and already bounds Send + Sync
#[allow(async_fn_in_trait)]
pub trait JobStatusSource: Send + Sync {
    async fn job_status(&self, job: &JobHandle) -> ApiResult<JobStatus>;
}

/// What kind of work a polled job is, for progress messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    ConnectorAnalysis,
    FileAnalysis,
}

/// Poll loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
        }
    }
}

/// Polls `source` until `job` reports `completed`.
///
/// A failed status check or any other status counts as not done yet. Returns
/// the number of checks made, or [`PollTimeout`] once `timeout` has passed.
pub async fn await_completion<S: JobStatusSource>(
    source: &S,
    job: &JobHandle,
    kind: JobKind,
    schedule: PollSchedule,
) -> Result<u32, PollTimeout> {
    let deadline = Instant::now() + schedule.timeout;
    let mut checks = 0u32;

    loop {
        checks += 1;
        match source.job_status(job).await {
            Ok(status) if status.is_terminal() => {
                tracing::debug!("Job {} completed after {} checks", job, checks);
                return Ok(checks);
            }
            Ok(status) => match kind {
                JobKind::FileAnalysis => tracing::info!(
                    "File analysis is still going on, status: {}",
                    status.status
                ),
                JobKind::ConnectorAnalysis => tracing::info!(
                    "Analysis was not ready yet, status: {}",
                    status.status
                ),
            },
            Err(e) => tracing::info!("Status check of job {} failed: {}", job, e),
        }

        if Instant::now() >= deadline {
            return Err(PollTimeout {
                job: job.clone(),
                timeout: schedule.timeout,
            });
        }
        tokio::time::sleep(schedule.interval).await;
    }
}

/// Starts analysis jobs on the central platform
pub struct JobRunner<'a> {
    cvms: &'a CvmsClient,
}

impl<'a> JobRunner<'a> {
    pub fn new(cvms: &'a CvmsClient) -> Self {
        Self { cvms }
    }

    /// Triggers `connector`. A failure is logged and yields no job.
    pub async fn trigger(
        &self,
        project: &ProjectId,
        connector: &ConnectorDescriptor,
    ) -> Option<JobHandle> {
        tracing::debug!(
            "Triggering collector: {} with id {}",
            connector.name,
            connector.id
        );
        match self.cvms.trigger_analysis(project, &connector.id).await {
            Ok(job) => Some(job),
            Err(e) => {
                tracing::error!("Triggering collector {} failed: {}", connector.name, e);
                None
            }
        }
    }

    /// Uploads `file` for analysis. A missing file or failed upload is logged
    /// and yields no job.
    pub async fn upload_for_analysis(&self, project: &ProjectId, file: &Path) -> Option<JobHandle> {
        match self.try_upload(project, file).await {
            Ok(job) => {
                tracing::info!("File: {} has been sent!", file.display());
                Some(job)
            }
            Err(ApiError::MissingFile(path)) => {
                tracing::info!("File: {} not found!", path.display());
                None
            }
            Err(e) => {
                tracing::error!("Sending file {} failed: {}", file.display(), e);
                None
            }
        }
    }

    async fn try_upload(&self, project: &ProjectId, file: &Path) -> ApiResult<JobHandle> {
        if !tokio::fs::try_exists(file).await.unwrap_or(false) {
            return Err(ApiError::MissingFile(file.to_path_buf()));
        }
        self.cvms.upload_analysis(project, file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays a fixed list of statuses, repeating the last one
    struct ScriptedStatus {
        statuses: Mutex<Vec<&'static str>>,
        calls: AtomicU32,
    }

    impl ScriptedStatus {
        fn new(statuses: &[&'static str]) -> Self {
            let mut statuses = statuses.to_vec();
            statuses.reverse();
            Self {
                statuses: Mutex::new(statuses),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl JobStatusSource for ScriptedStatus {
        async fn job_status(&self, _job: &JobHandle) -> ApiResult<JobStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.pop().unwrap()
            } else {
                statuses[0]
            };
            if status == "error" {
                return Err(ApiError::NotFound("job".to_string()));
            }
            Ok(JobStatus {
                status: status.to_string(),
            })
        }
    }

    fn job() -> JobHandle {
        JobHandle::new("job-1")
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_on_first_check() {
        let source = ScriptedStatus::new(&["completed"]);
        let checks = await_completion(
            &source,
            &job(),
            JobKind::ConnectorAnalysis,
            PollSchedule::default(),
        )
        .await
        .unwrap();
        assert_eq!(checks, 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_polling_once_completed() {
        let source = ScriptedStatus::new(&["queued", "running", "completed", "running"]);
        let start = Instant::now();
        let checks = await_completion(
            &source,
            &job(),
            JobKind::ConnectorAnalysis,
            PollSchedule::default(),
        )
        .await
        .unwrap();
        assert_eq!(checks, 3);
        assert_eq!(source.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_checks_are_retried() {
        let source = ScriptedStatus::new(&["error", "error", "completed"]);
        let checks = await_completion(
            &source,
            &job(),
            JobKind::FileAnalysis,
            PollSchedule::default(),
        )
        .await
        .unwrap();
        assert_eq!(checks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_never_completed() {
        let source = ScriptedStatus::new(&["running"]);
        let schedule = PollSchedule::default();
        let start = Instant::now();

        let err = await_completion(&source, &job(), JobKind::ConnectorAnalysis, schedule)
            .await
            .unwrap_err();

        assert_eq!(err.job, job());
        assert_eq!(err.timeout, Duration::from_secs(1800));
        let expected = (DEFAULT_POLL_TIMEOUT_SECS / DEFAULT_POLL_INTERVAL_SECS) as u32;
        let calls = source.calls();
        assert!(
            calls.abs_diff(expected) <= 1,
            "expected about {expected} checks, got {calls}"
        );
        assert!(start.elapsed() >= schedule.timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_schedule() {
        let source = ScriptedStatus::new(&["running"]);
        let schedule = PollSchedule {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
        };
        assert!(
            await_completion(&source, &job(), JobKind::FileAnalysis, schedule)
                .await
                .is_err()
        );
        assert!(source.calls().abs_diff(6) <= 1);
    }
}
