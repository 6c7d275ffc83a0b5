//! Test report models and the JUnit to Polarion xUnit conversion.
//!
//! - [`junit`] models generic JUnit XML reports and parses them.
//! - [`xunit`] models the Polarion xUnit importer format, converts JUnit
//!   reports into it and encodes the result as XML.

pub mod junit;
pub mod xunit;

pub use junit::{
    JUnitFailure, JUnitSkipped, JUnitTestCase, JUnitTestSuite, JUnitTestSuites, Property,
};
pub use xunit::{PolarionXUnit, XUnitTestCase, XUnitTestSuite, transform, transform_with};

/// Result type for report parsing, conversion and encoding.
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors that can occur while handling test reports.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The report is empty or structurally invalid for the requested
    /// operation (for example, it contains no test suites).
    #[error("Malformed report: {0}")]
    MalformedInput(String),

    /// The report could not be parsed as XML of the expected shape.
    #[error("Failed to parse report XML: {0}")]
    Parse(#[from] quick_xml::DeError),

    /// Writing the XML document failed.
    #[error("Failed to encode report XML: {0}")]
    Encode(String),
}
