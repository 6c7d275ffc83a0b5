//! Polling helpers for import jobs.
//!
//! The importer itself never waits for a job; callers combine
//! [`XUnitImporterService::job_status`] with [`retry`] and decide which
//! statuses end the wait.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use super::{ImportError, ImportResult, JobId, JobStatus, XUnitImporterService};
use crate::config::ImportConfig;

/// Interval and timeout used when polling a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for PollSettings {
    fn from(config: &ImportConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            timeout: Duration::from_secs(config.poll_timeout_secs),
        }
    }
}

/// Errors returned by [`retry`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// `f` did not produce a value before the timeout.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// `f` failed; polling stopped at that attempt.
    #[error(transparent)]
    Aborted(E),
}

/// Calls `f` every `interval` until it yields a value, fails, or `timeout`
/// elapses.
///
/// `f` returns `Ok(None)` to keep polling. The first call happens after one
/// `interval`.
pub async fn retry<T, E, F, Fut>(interval: Duration, timeout: Duration, mut f: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let attempts = async {
        loop {
            tokio::time::sleep(interval).await;
            match f().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(err) => return Err(err),
            }
        }
    };

    match tokio::time::timeout(timeout, attempts).await {
        Ok(result) => result.map_err(RetryError::Aborted),
        Err(_) => Err(RetryError::Timeout(timeout)),
    }
}

/// Polls a job until its status is one of `terminal`.
///
/// Returns the terminal status that ended the wait.
pub async fn wait_for_status<I>(
    importer: &I,
    job_id: JobId,
    settings: PollSettings,
    terminal: &[JobStatus],
) -> ImportResult<JobStatus>
where
    I: XUnitImporterService + ?Sized,
{
    retry(settings.interval, settings.timeout, || async move {
        let status = importer.job_status(job_id).await?;
        debug!(job_id, %status, "Polled import job");
        Ok::<_, ImportError>(terminal.contains(&status).then_some(status))
    })
    .await
    .map_err(|e| into_import_error(e, job_id))
}

/// Polls a job until the importer reports `SUCCESS`.
///
/// `READY` and `RUNNING` keep the wait going; any other status fails with
/// [`ImportError::UnexpectedStatus`].
pub async fn wait_for_success<I>(importer: &I, job_id: JobId, settings: PollSettings) -> ImportResult<()>
where
    I: XUnitImporterService + ?Sized,
{
    retry(settings.interval, settings.timeout, || async move {
        let done: ImportResult<Option<()>> = match importer.job_status(job_id).await? {
            JobStatus::Ready => Ok(None),
            JobStatus::Running => {
                info!(job_id, "Polarion job is RUNNING");
                Ok(None)
            }
            JobStatus::Success => {
                info!(job_id, "Polarion job completed successfully");
                Ok(Some(()))
            }
            status @ JobStatus::Other(_) => Err(ImportError::UnexpectedStatus { job_id, status }),
        };
        done
    })
    .await
    .map_err(|e| into_import_error(e, job_id))
}

fn into_import_error(err: RetryError<ImportError>, job_id: JobId) -> ImportError {
    match err {
        RetryError::Timeout(timeout) => ImportError::Timeout { job_id, timeout },
        RetryError::Aborted(err) => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::report::PolarionXUnit;

    /// Importer replaying a fixed sequence of statuses, then repeating the
    /// last one.
    struct ScriptedImporter {
        statuses: Mutex<Vec<JobStatus>>,
        polls: AtomicUsize,
    }

    impl ScriptedImporter {
        fn new(statuses: &[&str]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().rev().map(|s| JobStatus::from(*s)).collect()),
                polls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl XUnitImporterService for ScriptedImporter {
        async fn import(&self, _xunit: &PolarionXUnit) -> ImportResult<JobId> {
            Ok(1)
        }

        async fn job_status(&self, _job_id: JobId) -> ImportResult<JobStatus> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                Ok(statuses.pop().unwrap())
            } else {
                Ok(statuses[0].clone())
            }
        }
    }

    fn fast() -> PollSettings {
        PollSettings::new(Duration::from_millis(1), Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_retry_ok() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result = retry(Duration::from_millis(1), Duration::from_millis(50), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ImportError>(Some(7))
        })
        .await
        .unwrap();

        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_timeout() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let err = retry(Duration::from_millis(1), Duration::from_millis(30), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<Option<()>, ImportError>(None)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, RetryError::Timeout(_)));
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_retry_stops_on_error() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let err = retry(Duration::from_millis(1), Duration::from_millis(500), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<Option<()>, _>(ImportError::NotFound(3))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, RetryError::Aborted(ImportError::NotFound(3))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_for_success() {
        let importer = ScriptedImporter::new(&["READY", "RUNNING", "RUNNING", "SUCCESS"]);
        wait_for_success(&importer, 1, fast()).await.unwrap();
        assert_eq!(importer.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_wait_for_success_unknown_status() {
        let importer = ScriptedImporter::new(&["RUNNING", "FAILED"]);
        let err = wait_for_success(&importer, 5, fast()).await.unwrap_err();
        assert!(
            matches!(
                &err,
                ImportError::UnexpectedStatus { job_id: 5, status } if status.as_str() == "FAILED"
            ),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_wait_for_success_timeout() {
        let importer = ScriptedImporter::new(&["RUNNING"]);
        let settings = PollSettings::new(Duration::from_millis(1), Duration::from_millis(20));
        let err = wait_for_success(&importer, 9, settings).await.unwrap_err();
        assert!(matches!(err, ImportError::Timeout { job_id: 9, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_wait_for_status_custom_terminal_set() {
        let importer = ScriptedImporter::new(&["READY", "RUNNING", "FAILED"]);
        let terminal = [JobStatus::Success, JobStatus::from("FAILED")];
        let status = wait_for_status(&importer, 1, fast(), &terminal).await.unwrap();
        assert_eq!(status, JobStatus::Other("FAILED".to_string()));
    }

    #[test]
    fn test_settings_from_config() {
        let config = ImportConfig {
            poll_interval_secs: 3,
            poll_timeout_secs: 60,
            ..Default::default()
        };
        let settings = PollSettings::from(&config);
        assert_eq!(settings.interval, Duration::from_secs(3));
        assert_eq!(settings.timeout, Duration::from_secs(60));
    }
}
