//! Polarion xUnit importer.
//!
//! The importer accepts a Polarion xUnit document, queues it as an import
//! job and reports the job's progress:
//!
//! ```text
//!   import(xunit) ──► POST /xunit ──────────────► job id
//!                                                   │
//!   job_status(id) ─► GET /xunit-queue?jobIds=id ◄──┘
//!                          │
//!                          ▼
//!                READY ─► RUNNING ─► SUCCESS
//! ```
//!
//! Job state is owned by the server; clients only observe it. Polling until
//! a job finishes is left to callers, see [`poll`].
//!
//! # Key Components
//!
//! - [`XUnitImporterService`]: the importer seam used by the pipeline
//! - [`XUnitImporter`]: HTTP implementation backed by `reqwest`
//! - [`poll`]: interval/timeout polling helpers

pub mod client;
pub mod poll;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::report::{PolarionXUnit, ReportError};

pub use client::XUnitImporter;
pub use poll::{PollSettings, RetryError, retry, wait_for_status, wait_for_success};

/// Endpoint receiving xUnit uploads, relative to the importer base URL.
pub const XUNIT_ENDPOINT: &str = "/xunit";

/// Endpoint reporting import job status, relative to the importer base URL.
pub const JOB_QUEUE_ENDPOINT: &str = "/xunit-queue";

/// Endpoint serving an import job's log, relative to the importer base URL.
pub const JOB_LOG_ENDPOINT: &str = "/xunit-log";

/// Identifier of a server-side import job.
pub type JobId = u64;

/// Status of an import job as reported by the importer.
///
/// Statuses other than the three known ones are passed through unchanged
/// as [`JobStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    Ready,
    Running,
    Success,
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Ready => "READY",
            JobStatus::Running => "RUNNING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Other(status) => status,
        }
    }
}

impl From<String> for JobStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "READY" => JobStatus::Ready,
            "RUNNING" => JobStatus::Running,
            "SUCCESS" => JobStatus::Success,
            _ => JobStatus::Other(status),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(status: &str) -> Self {
        JobStatus::from(status.to_string())
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type for importer operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Errors that can occur while talking to the importer.
///
/// - **Transport**: the request did not produce a successful HTTP response
/// - **Protocol**: the response body did not have the documented shape
/// - **Polling**: the job did not reach an expected status in time
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Network failure, non-2xx status or cancellation.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A successful response whose body violates the documented shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The importer has no job with this id.
    #[error("Job with id {0} not found")]
    NotFound(JobId),

    /// The xUnit document could not be encoded, or a JUnit report could not
    /// be read.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// The job reported a status outside the expected set.
    #[error("Unknown status {status} for job {job_id}")]
    UnexpectedStatus { job_id: JobId, status: JobStatus },

    /// The job did not reach a terminal status before the polling timeout.
    #[error("Timed out after {timeout:?} waiting for job {job_id}")]
    Timeout { job_id: JobId, timeout: Duration },
}

/// Failures below the HTTP response level.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The importer answered with a non-2xx status.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The caller's cancellation token fired while the request was in flight.
    #[error("request cancelled")]
    Cancelled,
}

/// The operations the pipeline needs from an importer.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait XUnitImporterService: Send + Sync {
    /// Uploads `xunit` and returns the id of the created import job.
    async fn import(&self, xunit: &PolarionXUnit) -> ImportResult<JobId>;

    /// Returns the current status of an import job.
    async fn job_status(&self, job_id: JobId) -> ImportResult<JobStatus>;

    /// URL of the log page for an import job, if the importer serves one.
    fn log_url(&self, _job_id: JobId) -> Option<String> {
        None
    }
}
