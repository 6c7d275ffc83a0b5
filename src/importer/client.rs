//! HTTP client for the Polarion xUnit importer.

use std::future::Future;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    ImportError, ImportResult, JOB_LOG_ENDPOINT, JOB_QUEUE_ENDPOINT, JobId, JobStatus,
    TransportError, XUNIT_ENDPOINT, XUnitImporterService,
};
use crate::config::ImporterConfig;
use crate::report::PolarionXUnit;

/// Name of the multipart part carrying the document.
const FILE_PART: &str = "file";

/// File name the importer keys its response by.
const FILE_NAME: &str = "file.xml";

#[derive(Debug, Deserialize)]
struct ImportResponse {
    files: ImportedFiles,
}

#[derive(Debug, Deserialize)]
struct ImportedFiles {
    #[serde(rename = "file.xml")]
    file: ImportedFile,
}

#[derive(Debug, Deserialize)]
struct ImportedFile {
    #[serde(rename = "job-ids", default)]
    job_ids: Vec<JobId>,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    #[serde(default)]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    status: JobStatus,
}

/// Client for a single importer endpoint.
///
/// The base URL and credentials are fixed at construction; every request
/// carries them as HTTP Basic authentication. Clones share the underlying
/// connection pool.
#[derive(Clone)]
pub struct XUnitImporter {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
    cancellation_token: Option<CancellationToken>,
}

impl XUnitImporter {
    /// Creates a client for the importer at `url`.
    ///
    /// * `url` - Importer base URL, e.g. `https://polarion.example.com/polarion/import`
    pub fn new(url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url, username, password)
    }

    /// Creates a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            cancellation_token: None,
        }
    }

    /// Creates a client from the `[importer]` configuration section.
    pub fn from_config(config: &ImporterConfig) -> Self {
        Self::new(&config.url, &config.username, &config.password)
    }

    /// Aborts in-flight requests when `token` is cancelled.
    ///
    /// Aborted requests fail with [`TransportError::Cancelled`].
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// The importer base URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> ImportResult<T> {
        let request = request.basic_auth(&self.username, Some(&self.password));

        let body = self
            .cancellable(async {
                let response = request.send().await.map_err(TransportError::Request)?;

                let status = response.status();
                if !status.is_success() {
                    let body = error_body(response.text().await);
                    return Err(TransportError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }

                response.bytes().await.map_err(TransportError::Request)
            })
            .await?;

        serde_json::from_slice(&body)
            .map_err(|e| ImportError::Protocol(format!("unexpected response body: {e}")))
    }

    async fn cancellable<T, F>(&self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        match &self.cancellation_token {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(TransportError::Cancelled),
                result = fut => result,
            },
            None => fut.await,
        }
    }
}

#[async_trait]
impl XUnitImporterService for XUnitImporter {
    async fn import(&self, xunit: &PolarionXUnit) -> ImportResult<JobId> {
        let xml = xunit.to_xml()?;

        let part = Part::bytes(xml.into_bytes())
            .file_name(FILE_NAME)
            .mime_str("application/octet-stream")
            .map_err(TransportError::Request)?;
        let form = Form::new().part(FILE_PART, part);

        let request = self
            .client
            .post(format!("{}{}", self.url, XUNIT_ENDPOINT))
            .multipart(form);

        let response: ImportResponse = self.send(request).await?;

        let job_id = response
            .files
            .file
            .job_ids
            .first()
            .copied()
            .ok_or_else(|| ImportError::Protocol("importer didn't return the job id".to_string()))?;

        debug!(job_id, "xUnit import queued");
        Ok(job_id)
    }

    async fn job_status(&self, job_id: JobId) -> ImportResult<JobStatus> {
        let request = self
            .client
            .get(format!("{}{}", self.url, JOB_QUEUE_ENDPOINT))
            .query(&[("jobIds", job_id)])
            .header(ACCEPT, HeaderValue::from_static("application/json"));

        let response: JobStatusResponse = self.send(request).await?;

        response
            .jobs
            .into_iter()
            .next()
            .map(|job| job.status)
            .ok_or(ImportError::NotFound(job_id))
    }

    fn log_url(&self, job_id: JobId) -> Option<String> {
        Some(format!("{}{}?jobId={}", self.url, JOB_LOG_ENDPOINT, job_id))
    }
}

/// Body of a failed response, or why it could not be read.
fn error_body(body: reqwest::Result<String>) -> String {
    body.unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}
