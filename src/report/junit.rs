//! JUnit XML report model.
//!
//! Mirrors the subset of the JUnit schema that test report generators such
//! as `go-junit-report` emit:
//!
//! ```xml
//! <testsuites>
//!   <testsuite tests="3" failures="1" time="1.234" name="pkg">
//!     <properties>
//!       <property name="go.version" value="go1.21"/>
//!     </properties>
//!     <testcase classname="pkg" name="TestAdd" time="0.100"/>
//!     <testcase classname="pkg" name="TestSub" time="0.150">
//!       <failure message="Failed" type="">assert 2 - 1 == 0</failure>
//!     </testcase>
//!     <testcase classname="pkg" name="TestMul" time="0.050">
//!       <skipped message="Skip"/>
//!     </testcase>
//!   </testsuite>
//! </testsuites>
//! ```
//!
//! Attributes and elements outside this subset (`errors`, `system-out`, ...)
//! are ignored when parsing. Failure contents are kept verbatim, including
//! leading and trailing whitespace.

use quick_xml::DeError;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Deserializer};

use super::{ReportError, ReportResult};

/// A `name`/`value` pair from a `<properties>` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Property {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@value", default)]
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Root of a JUnit report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JUnitTestSuites {
    #[serde(rename = "testsuite", default)]
    pub suites: Vec<JUnitTestSuite>,
}

impl JUnitTestSuites {
    /// Parses a JUnit XML document.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Parse`](super::ReportError::Parse) if the
    /// document is not well-formed or a numeric attribute is invalid.
    pub fn from_xml(xml: &str) -> ReportResult<Self> {
        let mut junit: Self = quick_xml::de::from_str(xml)?;
        let failures = junit
            .suites
            .iter_mut()
            .flat_map(|suite| suite.cases.iter_mut())
            .filter_map(|case| case.failure.as_mut());
        restore_failure_contents(xml, failures)?;
        Ok(junit)
    }
}

/// A single `<testsuite>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JUnitTestSuite {
    #[serde(rename = "@tests", default)]
    pub tests: u32,
    #[serde(rename = "@failures", default)]
    pub failures: u32,
    /// Duration as written by the generator; kept verbatim.
    #[serde(rename = "@time", default)]
    pub time: String,
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: Vec<Property>,
    #[serde(rename = "testcase", default)]
    pub cases: Vec<JUnitTestCase>,
}

/// A single `<testcase>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JUnitTestCase {
    #[serde(rename = "@classname", default)]
    pub classname: String,
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@time", default)]
    pub time: String,
    #[serde(default)]
    pub skipped: Option<JUnitSkipped>,
    #[serde(default)]
    pub failure: Option<JUnitFailure>,
}

impl JUnitTestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_classname(mut self, classname: impl Into<String>) -> Self {
        self.classname = classname.into();
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = time.into();
        self
    }

    pub fn with_failure(mut self, failure: JUnitFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn with_skipped(mut self, message: impl Into<String>) -> Self {
        self.skipped = Some(JUnitSkipped {
            message: message.into(),
        });
        self
    }
}

/// `<failure message=".." type="..">contents</failure>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JUnitFailure {
    #[serde(rename = "@message", default)]
    pub message: String,
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(rename = "$text", default)]
    pub contents: String,
}

impl JUnitFailure {
    pub fn new(message: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: String::new(),
            contents: contents.into(),
        }
    }
}

/// `<skipped message=".."/>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JUnitSkipped {
    #[serde(rename = "@message", default)]
    pub message: String,
}

#[derive(Deserialize)]
struct PropertyList {
    #[serde(rename = "property", default)]
    items: Vec<Property>,
}

/// Flattens `<properties><property/>...</properties>` into a plain list.
pub(crate) fn deserialize_properties<'de, D>(deserializer: D) -> Result<Vec<Property>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(PropertyList::deserialize(deserializer)?.items)
}

/// Collects the text of every `<failure>` element in document order.
///
/// The serde deserializer trims text content, so stack traces lose their
/// indentation and trailing newlines. The plain event reader does not trim.
fn failure_contents(xml: &str) -> Result<Vec<String>, DeError> {
    let mut reader = Reader::from_str(xml);
    let mut contents = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"failure" => current = Some(String::new()),
            Event::Empty(e) if e.name().as_ref() == b"failure" => contents.push(String::new()),
            Event::End(e) if e.name().as_ref() == b"failure" => {
                if let Some(text) = current.take() {
                    contents.push(text);
                }
            }
            Event::Text(e) => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&e.decode()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(contents)
}

/// Overwrites the trimmed contents of `failures` with the verbatim text
/// from `xml`. `failures` must be in document order.
pub(crate) fn restore_failure_contents<'a>(
    xml: &str,
    failures: impl Iterator<Item = &'a mut JUnitFailure>,
) -> ReportResult<()> {
    let contents = failure_contents(xml)?;
    let mut failures: Vec<_> = failures.collect();

    if failures.len() != contents.len() {
        return Err(ReportError::MalformedInput(format!(
            "found {} <failure> elements but {} test case failures",
            contents.len(),
            failures.len()
        )));
    }

    for (failure, text) in failures.iter_mut().zip(contents) {
        failure.contents = text;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = include_str!("../../testdata/junit.xml");

    #[test]
    fn test_parse_fixture() {
        let junit = JUnitTestSuites::from_xml(FIXTURE).unwrap();

        assert_eq!(junit.suites.len(), 1);
        let suite = &junit.suites[0];
        assert_eq!(suite.tests, 7);
        assert_eq!(suite.failures, 3);
        assert_eq!(suite.time, "4354.820");
        assert_eq!(suite.name, "");
        assert!(suite.properties.is_empty());
        assert_eq!(suite.cases.len(), 7);
    }

    #[test]
    fn test_parse_failure_and_skip() {
        let junit = JUnitTestSuites::from_xml(FIXTURE).unwrap();
        let cases = &junit.suites[0].cases;

        let failed = cases
            .iter()
            .find(|c| c.name.contains("A22_"))
            .unwrap();
        assert_eq!(failed.failure, Some(JUnitFailure::new("Failed", "Some error")));
        assert_eq!(failed.skipped, None);

        let skipped = cases
            .iter()
            .find(|c| c.name.contains("A21_"))
            .unwrap();
        assert_eq!(skipped.skipped.as_ref().unwrap().message, "Skip");
        assert_eq!(skipped.failure, None);
    }

    #[test]
    fn test_parse_properties_and_unknown_elements() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
  <testsuite tests="1" failures="0" errors="0" time="0.010" name="pkg/foo">
    <properties>
      <property name="go.version" value="go1.21"/>
    </properties>
    <testcase classname="foo" name="TestFoo" time="0.010">
      <system-out>hello</system-out>
    </testcase>
  </testsuite>
</testsuites>"#;

        let junit = JUnitTestSuites::from_xml(xml).unwrap();
        let suite = &junit.suites[0];
        assert_eq!(suite.name, "pkg/foo");
        assert_eq!(suite.properties, vec![Property::new("go.version", "go1.21")]);
        assert_eq!(suite.cases, vec![
            JUnitTestCase::new("TestFoo")
                .with_classname("foo")
                .with_time("0.010")
        ]);
    }

    #[test]
    fn test_failure_contents_keep_whitespace() {
        let xml = r#"<testsuites>
  <testsuite tests="2" failures="2" time="0.020" name="pkg">
    <testcase classname="pkg" name="TestFoo" time="0.010">
      <failure message="Failed" type="">
    foo_test.go:12: boom
</failure>
    </testcase>
    <testcase classname="pkg" name="TestBar" time="0.010">
      <failure message="Failed" type=""/>
    </testcase>
  </testsuite>
</testsuites>"#;

        let junit = JUnitTestSuites::from_xml(xml).unwrap();
        let cases = &junit.suites[0].cases;
        assert_eq!(
            cases[0].failure.as_ref().unwrap().contents,
            "\n    foo_test.go:12: boom\n"
        );
        assert_eq!(cases[1].failure.as_ref().unwrap().contents, "");
    }

    #[test]
    fn test_failure_contents_unescaped() {
        let xml = r#"<testsuites><testsuite tests="1" failures="1"><testcase name="TestFoo"><failure message="Failed">  got &lt;nil&gt; &amp; more
</failure></testcase></testsuite></testsuites>"#;

        let junit = JUnitTestSuites::from_xml(xml).unwrap();
        assert_eq!(
            junit.suites[0].cases[0].failure.as_ref().unwrap().contents,
            "  got <nil> & more\n"
        );
    }

    #[test]
    fn test_parse_empty_report() {
        let junit = JUnitTestSuites::from_xml("<testsuites></testsuites>").unwrap();
        assert!(junit.suites.is_empty());
    }

    #[test]
    fn test_parse_invalid_count() {
        let xml = r#"<testsuites><testsuite tests="many" failures="0"/></testsuites>"#;
        assert!(JUnitTestSuites::from_xml(xml).is_err());
    }
}
