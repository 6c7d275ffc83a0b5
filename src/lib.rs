//! delorean: report import core for release tooling.
//!
//! This crate converts JUnit test reports into the Polarion xUnit format,
//! uploads them to the Polarion xUnit importer and follows the resulting
//! import jobs. Many reports can be imported at once under a concurrency
//! cap.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Executor**: Run a batch of tasks with a bounded number in flight
//! - **Report**: JUnit and Polarion xUnit models, conversion and XML encoding
//! - **Importer**: HTTP client for the xUnit importer and job polling
//! - **Pipeline**: Parse, convert, import and wait, for one or many reports
//!
//! # Example
//!
//! ```no_run
//! use delorean::config::load_config;
//! use delorean::importer::{PollSettings, XUnitImporter};
//! use delorean::pipeline::{ReportUpload, RunMetadata, import_reports};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config(std::path::Path::new("delorean.toml"))?;
//!     let importer = XUnitImporter::from_config(&config.importer);
//!
//!     let uploads = vec![ReportUpload {
//!         key: "nightly.zip".to_string(),
//!         junit_xml: std::fs::read_to_string("junit-integreatly-operator.xml")?,
//!         metadata: RunMetadata::new("RedHatManagedIntegration", "Nightly", "XUnit"),
//!     }];
//!
//!     let job_ids = import_reports(
//!         &importer,
//!         &uploads,
//!         config.import.workers,
//!         PollSettings::from(&config.import),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//!     println!("imported as jobs {:?}", job_ids);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod executor;
pub mod importer;
pub mod pipeline;
pub mod report;

// Re-export commonly used types
pub use config::{Config, load_config};
pub use executor::{ParallelError, Task, parallel_limit};
pub use importer::{ImportError, JobId, JobStatus, XUnitImporter, XUnitImporterService};
pub use report::{JUnitTestSuites, PolarionXUnit, ReportError, transform};
