//! Polarion xUnit report generation.
//!
//! The Polarion xUnit importer accepts a JUnit-shaped document enriched with
//! run-level properties (project, title, template) and a test case id on
//! every test case:
//!
//! ```xml
//! <testsuites>
//!   <properties>
//!     <property name="polarion-project-id" value="RedHatManagedIntegration"/>
//!     <property name="polarion-testrun-title" value="Some Tests"/>
//!     <property name="polarion-testrun-template-id" value="XUnit"/>
//!     <property name="polarion-lookup-method" value="custom"/>
//!   </properties>
//!   <testsuite tests="7" failures="3" time="4354.820" name="">
//!     <properties/>
//!     <testcase classname="" name="Tests/A01_-_Verify_stages" time="11.140">
//!       <properties><property name="polarion-testcase-id" value="A01"/></properties>
//!     </testcase>
//!   </testsuite>
//! </testsuites>
//! ```
//!
//! [`PolarionXUnit::to_xml`] writes this layout without whitespace between
//! elements. Attribute order and child order are fixed.
//!
//! # Test case ids
//!
//! Test names encode a slash-delimited hierarchy whose last id-bearing
//! segment starts with an uppercase letter, two digits and an underscore
//! (`TestIntegreatly/Happy_Path/A01_-_Verify_stages` has id `A01`). Cases
//! without such a segment are dropped from the converted report.

use std::sync::LazyLock;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use super::junit::{
    JUnitFailure, JUnitSkipped, JUnitTestCase, JUnitTestSuites, Property, deserialize_properties,
    restore_failure_contents,
};
use super::{ReportError, ReportResult};

pub const PROJECT_ID_PROPERTY: &str = "polarion-project-id";
pub const TESTRUN_TITLE_PROPERTY: &str = "polarion-testrun-title";
pub const TESTRUN_TEMPLATE_ID_PROPERTY: &str = "polarion-testrun-template-id";
pub const LOOKUP_METHOD_PROPERTY: &str = "polarion-lookup-method";
pub const TESTCASE_ID_PROPERTY: &str = "polarion-testcase-id";

/// Lookup method telling Polarion to match cases by [`TESTCASE_ID_PROPERTY`].
pub const CUSTOM_LOOKUP_METHOD: &str = "custom";

static CASE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:.+/)*?([A-Z][0-9]{2})_.*$").expect("case id pattern is valid")
});

/// Extracts the Polarion test case id from a test case name.
///
/// Returns `None` when no path segment of the name starts with an id.
pub fn extract_case_id(name: &str) -> Option<&str> {
    CASE_ID_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Root of a Polarion xUnit document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PolarionXUnit {
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: Vec<Property>,
    #[serde(rename = "testsuite", default)]
    pub suites: Vec<XUnitTestSuite>,
}

/// A `<testsuite>` of a Polarion xUnit document.
///
/// The scalar attributes are copied verbatim from the source JUnit suite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct XUnitTestSuite {
    #[serde(rename = "@tests", default)]
    pub tests: u32,
    #[serde(rename = "@failures", default)]
    pub failures: u32,
    #[serde(rename = "@time", default)]
    pub time: String,
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: Vec<Property>,
    #[serde(rename = "testcase", default)]
    pub cases: Vec<XUnitTestCase>,
}

/// A JUnit test case plus its Polarion properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "XUnitTestCaseRepr")]
pub struct XUnitTestCase {
    pub case: JUnitTestCase,
    pub properties: Vec<Property>,
}

impl XUnitTestCase {
    pub fn new(case: JUnitTestCase, id: impl Into<String>) -> Self {
        Self {
            case,
            properties: vec![Property::new(TESTCASE_ID_PROPERTY, id)],
        }
    }

    /// The value of the `polarion-testcase-id` property, if present.
    pub fn case_id(&self) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == TESTCASE_ID_PROPERTY)
            .map(|p| p.value.as_str())
    }
}

/// Wire layout of `<testcase>`, where the JUnit fields and the properties
/// sit side by side.
#[derive(Deserialize)]
struct XUnitTestCaseRepr {
    #[serde(rename = "@classname", default)]
    classname: String,
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@time", default)]
    time: String,
    #[serde(default)]
    skipped: Option<JUnitSkipped>,
    #[serde(default)]
    failure: Option<JUnitFailure>,
    #[serde(default, deserialize_with = "deserialize_properties")]
    properties: Vec<Property>,
}

impl From<XUnitTestCaseRepr> for XUnitTestCase {
    fn from(repr: XUnitTestCaseRepr) -> Self {
        Self {
            case: JUnitTestCase {
                classname: repr.classname,
                name: repr.name,
                time: repr.time,
                skipped: repr.skipped,
                failure: repr.failure,
            },
            properties: repr.properties,
        }
    }
}

/// Converts a JUnit report into a Polarion xUnit report.
///
/// Only the first suite of `junit` is converted. Cases whose names carry no
/// test case id are dropped and logged.
///
/// # Errors
///
/// Returns [`ReportError::MalformedInput`] if `junit` has no suites.
pub fn transform(
    junit: &JUnitTestSuites,
    project_id: &str,
    title: &str,
    template_id: &str,
) -> ReportResult<PolarionXUnit> {
    transform_with(junit, project_id, title, template_id, |case| {
        info!(name = %case.name, "skip: test case has no Polarion id");
    })
}

/// Like [`transform`], but reports every dropped case to `on_skip` instead
/// of logging it.
pub fn transform_with<F>(
    junit: &JUnitTestSuites,
    project_id: &str,
    title: &str,
    template_id: &str,
    mut on_skip: F,
) -> ReportResult<PolarionXUnit>
where
    F: FnMut(&JUnitTestCase),
{
    let suite = junit
        .suites
        .first()
        .ok_or_else(|| ReportError::MalformedInput("report contains no test suites".to_string()))?;

    if junit.suites.len() > 1 {
        debug!(
            suites = junit.suites.len(),
            "Only the first test suite is converted"
        );
    }

    let mut cases = Vec::with_capacity(suite.cases.len());
    for case in &suite.cases {
        match extract_case_id(&case.name) {
            Some(id) => cases.push(XUnitTestCase::new(case.clone(), id)),
            None => on_skip(case),
        }
    }

    Ok(PolarionXUnit {
        properties: vec![
            Property::new(PROJECT_ID_PROPERTY, project_id),
            Property::new(TESTRUN_TITLE_PROPERTY, title),
            Property::new(TESTRUN_TEMPLATE_ID_PROPERTY, template_id),
            Property::new(LOOKUP_METHOD_PROPERTY, CUSTOM_LOOKUP_METHOD),
        ],
        suites: vec![XUnitTestSuite {
            tests: suite.tests,
            failures: suite.failures,
            time: suite.time.clone(),
            name: suite.name.clone(),
            properties: suite.properties.clone(),
            cases,
        }],
    })
}

impl PolarionXUnit {
    /// Parses a Polarion xUnit document written by [`to_xml`](Self::to_xml).
    pub fn from_xml(xml: &str) -> ReportResult<Self> {
        let mut xunit: Self = quick_xml::de::from_str(xml)?;
        let failures = xunit
            .suites
            .iter_mut()
            .flat_map(|suite| suite.cases.iter_mut())
            .filter_map(|case| case.case.failure.as_mut());
        restore_failure_contents(xml, failures)?;
        Ok(xunit)
    }

    /// Encodes the report in the importer's XML layout.
    pub fn to_xml(&self) -> ReportResult<String> {
        let mut writer = Writer::new(Vec::new());

        write_event(&mut writer, Event::Start(BytesStart::new("testsuites")))?;
        write_properties(&mut writer, &self.properties)?;

        for suite in &self.suites {
            let tests = suite.tests.to_string();
            let failures = suite.failures.to_string();

            let mut testsuite = BytesStart::new("testsuite");
            testsuite.push_attribute(("tests", tests.as_str()));
            testsuite.push_attribute(("failures", failures.as_str()));
            testsuite.push_attribute(("time", suite.time.as_str()));
            testsuite.push_attribute(("name", suite.name.as_str()));
            write_event(&mut writer, Event::Start(testsuite))?;

            write_properties(&mut writer, &suite.properties)?;
            for case in &suite.cases {
                write_testcase(&mut writer, case)?;
            }

            write_event(&mut writer, Event::End(BytesEnd::new("testsuite")))?;
        }

        write_event(&mut writer, Event::End(BytesEnd::new("testsuites")))?;

        String::from_utf8(writer.into_inner()).map_err(|e| ReportError::Encode(e.to_string()))
    }
}

fn write_event<W: std::io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> ReportResult<()> {
    writer
        .write_event(event)
        .map_err(|e| ReportError::Encode(e.to_string()))
}

fn write_properties<W: std::io::Write>(
    writer: &mut Writer<W>,
    properties: &[Property],
) -> ReportResult<()> {
    if properties.is_empty() {
        return write_event(writer, Event::Empty(BytesStart::new("properties")));
    }

    write_event(writer, Event::Start(BytesStart::new("properties")))?;
    for property in properties {
        let mut element = BytesStart::new("property");
        element.push_attribute(("name", property.name.as_str()));
        element.push_attribute(("value", property.value.as_str()));
        write_event(writer, Event::Empty(element))?;
    }
    write_event(writer, Event::End(BytesEnd::new("properties")))
}

fn write_testcase<W: std::io::Write>(
    writer: &mut Writer<W>,
    testcase: &XUnitTestCase,
) -> ReportResult<()> {
    let case = &testcase.case;

    let mut element = BytesStart::new("testcase");
    element.push_attribute(("classname", case.classname.as_str()));
    element.push_attribute(("name", case.name.as_str()));
    element.push_attribute(("time", case.time.as_str()));
    write_event(writer, Event::Start(element))?;

    if let Some(skipped) = &case.skipped {
        let mut element = BytesStart::new("skipped");
        element.push_attribute(("message", skipped.message.as_str()));
        write_event(writer, Event::Empty(element))?;
    }

    if let Some(failure) = &case.failure {
        let mut element = BytesStart::new("failure");
        element.push_attribute(("message", failure.message.as_str()));
        element.push_attribute(("type", failure.kind.as_str()));
        if failure.contents.is_empty() {
            write_event(writer, Event::Empty(element))?;
        } else {
            write_event(writer, Event::Start(element))?;
            write_event(writer, Event::Text(BytesText::new(&failure.contents)))?;
            write_event(writer, Event::End(BytesEnd::new("failure")))?;
        }
    }

    write_properties(writer, &testcase.properties)?;
    write_event(writer, Event::End(BytesEnd::new("testcase")))
}
