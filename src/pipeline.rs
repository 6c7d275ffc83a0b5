//! End-to-end report import.
//!
//! ```text
//!   JUnit XML ──► JUnitTestSuites ──► transform() ──► PolarionXUnit
//!                                                         │
//!                                                  import() ──► JobId
//!                                                                 │
//!                                                  wait_for_success()
//! ```
//!
//! [`import_reports`] runs this for many reports with a bounded number of
//! imports in flight, using [`parallel_limit`].

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::executor::{ParallelError, parallel_limit};
use crate::importer::{
    ImportError, ImportResult, JobId, PollSettings, XUnitImporterService, wait_for_success,
};
use crate::report::{JUnitTestSuites, transform};

/// Run-level metadata attached to an imported report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMetadata {
    pub project_id: String,
    pub title: String,
    pub template_id: String,
}

impl RunMetadata {
    pub fn new(
        project_id: impl Into<String>,
        title: impl Into<String>,
        template_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            template_id: template_id.into(),
        }
    }
}

/// A JUnit report waiting to be imported.
#[derive(Debug, Clone)]
pub struct ReportUpload {
    /// Label used in logs, e.g. the report's storage key.
    pub key: String,
    pub junit_xml: String,
    pub metadata: RunMetadata,
}

/// Imports one JUnit report and waits until the importer finishes it.
///
/// Returns the import job id.
pub async fn import_report<I>(
    importer: &I,
    upload: &ReportUpload,
    settings: PollSettings,
) -> ImportResult<JobId>
where
    I: XUnitImporterService + ?Sized,
{
    let junit = JUnitTestSuites::from_xml(&upload.junit_xml)?;

    let metadata = &upload.metadata;
    let xunit = transform(&junit, &metadata.project_id, &metadata.title, &metadata.template_id)?;

    let job_id = importer.import(&xunit).await?;
    info!(key = %upload.key, job_id, "Polarion job started");
    if let Some(url) = importer.log_url(job_id) {
        info!(key = %upload.key, logs = %url, "Polarion job logs");
    }

    wait_for_success(importer, job_id, settings).await?;
    Ok(job_id)
}

/// Imports every report with at most `limit` imports in flight.
///
/// Job ids are returned in the order of `uploads`. The first failed import
/// stops the remaining ones and is returned.
///
/// # Errors
///
/// - [`ParallelError::TaskFailed`] with the first import error
/// - [`ParallelError::Cancelled`] if `cancel` fired first
pub async fn import_reports<I>(
    importer: &I,
    uploads: &[ReportUpload],
    limit: usize,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> Result<Vec<JobId>, ParallelError<ImportError>>
where
    I: XUnitImporterService + ?Sized,
{
    let tasks: Vec<_> = uploads
        .iter()
        .map(|upload| move || import_report(importer, upload, settings))
        .collect();

    let result = parallel_limit(cancel, tasks, limit).await;
    if let Err(err) = &result {
        warn!(reports = uploads.len(), error = %err, "Report import failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::importer::JobStatus;
    use crate::report::PolarionXUnit;

    const FIXTURE: &str = include_str!("../testdata/junit.xml");

    /// Importer that accepts everything and reports jobs as finished.
    #[derive(Default)]
    struct RecordingImporter {
        next_id: AtomicU64,
        imported: Mutex<Vec<PolarionXUnit>>,
        /// Job id and title of each accepted import.
        titles: Mutex<Vec<(JobId, String)>>,
        logged: Mutex<Vec<JobId>>,
        fail_titles: Vec<String>,
        /// Import latency per title.
        delays: Vec<(String, Duration)>,
    }

    #[async_trait]
    impl XUnitImporterService for RecordingImporter {
        async fn import(&self, xunit: &PolarionXUnit) -> ImportResult<JobId> {
            let title = xunit.properties[1].value.clone();
            if let Some((_, delay)) = self.delays.iter().find(|(t, _)| *t == title) {
                tokio::time::sleep(*delay).await;
            }
            if self.fail_titles.contains(&title) {
                return Err(ImportError::Protocol(format!("rejected {title}")));
            }
            self.imported.lock().unwrap().push(xunit.clone());
            let job_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 100;
            self.titles.lock().unwrap().push((job_id, title));
            Ok(job_id)
        }

        async fn job_status(&self, _job_id: JobId) -> ImportResult<JobStatus> {
            Ok(JobStatus::Success)
        }

        fn log_url(&self, job_id: JobId) -> Option<String> {
            self.logged.lock().unwrap().push(job_id);
            Some(format!("http://importer/xunit-log?jobId={job_id}"))
        }
    }

    fn fast() -> PollSettings {
        PollSettings::new(Duration::from_millis(1), Duration::from_millis(500))
    }

    fn upload(key: &str, title: &str) -> ReportUpload {
        ReportUpload {
            key: key.to_string(),
            junit_xml: FIXTURE.to_string(),
            metadata: RunMetadata::new("RedHatManagedIntegration", title, "XUnit"),
        }
    }

    #[tokio::test]
    async fn test_import_report() {
        let importer = RecordingImporter::default();
        let job_id = import_report(&importer, &upload("a.zip", "Some Tests"), fast())
            .await
            .unwrap();

        assert_eq!(job_id, 100);
        assert_eq!(*importer.logged.lock().unwrap(), vec![100]);
        let imported = importer.imported.lock().unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].suites[0].cases.len(), 3);
    }

    #[tokio::test]
    async fn test_import_report_invalid_xml() {
        let importer = RecordingImporter::default();
        let mut bad = upload("bad.zip", "Some Tests");
        bad.junit_xml = "<testsuites><testsuite tests=\"x\"/></testsuites>".to_string();

        let err = import_report(&importer, &bad, fast()).await.unwrap_err();
        assert!(matches!(err, ImportError::Report(_)), "got {err:?}");
        assert!(importer.imported.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_reports_in_order() {
        // Earlier reports take longer, so ids are handed out out of order.
        let importer = RecordingImporter {
            delays: (0..5)
                .map(|i| (format!("Run {i}"), Duration::from_millis((5 - i) * 10)))
                .collect(),
            ..Default::default()
        };
        let uploads: Vec<_> = (0..5)
            .map(|i| upload(&format!("{i}.zip"), &format!("Run {i}")))
            .collect();

        let job_ids = import_reports(&importer, &uploads, 5, fast(), &CancellationToken::new())
            .await
            .unwrap();

        let titles = importer.titles.lock().unwrap();
        assert_eq!(titles.len(), 5);
        assert_ne!(job_ids, vec![100, 101, 102, 103, 104]);
        for (upload, job_id) in uploads.iter().zip(&job_ids) {
            let (_, title) = titles.iter().find(|(id, _)| id == job_id).unwrap();
            assert_eq!(title, &upload.metadata.title);
        }
        assert_eq!(*importer.logged.lock().unwrap().iter().max().unwrap(), 104);
    }

    #[tokio::test]
    async fn test_import_reports_first_error() {
        let importer = RecordingImporter {
            fail_titles: vec!["Run 1".to_string()],
            ..Default::default()
        };
        let uploads: Vec<_> = (0..3)
            .map(|i| upload(&format!("{i}.zip"), &format!("Run {i}")))
            .collect();

        let err = import_reports(&importer, &uploads, 1, fast(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(
            matches!(&err, ParallelError::TaskFailed(ImportError::Protocol(msg)) if msg == "rejected Run 1"),
            "got {err:?}"
        );
        // Run 2 never started.
        assert_eq!(importer.imported.lock().unwrap().len(), 1);
    }
}
