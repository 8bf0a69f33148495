//! Catch XML reporter layout.
//!
//! ```xml
//! <Catch name="catchrun">
//!   <Group name="catchrun">
//!     <TestCase name="Foo" tags="" filename="Tests.cpp" line="54">
//!       <Section name="equals">
//!         <Section name="bar">
//!           <Expression success="false" type="REQUIRE" filename="Tests.cpp" line="62">
//!             <Original>x == 42</Original>
//!             <Expanded>44 == 42</Expanded>
//!           </Expression>
//!           <OverallResults successes="0" failures="2" expectedFailures="0"/>
//!         </Section>
//!         <OverallResults successes="0" failures="2" expectedFailures="0"/>
//!       </Section>
//!       <OverallResult success="false"/>
//!     </TestCase>
//!     <OverallResults successes="0" failures="1" expectedFailures="0"/>
//!   </Group>
//!   <OverallResults successes="0" failures="1" expectedFailures="0"/>
//! </Catch>
//! ```
//!
//! Like Catch without `-s`, passing expressions are counted but not listed.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use termcolor::WriteColor;

use super::{io_error, ReportOptions, Reporter};
use crate::diagnostics::CatchError;
use crate::err_msg;
use crate::report::{CaseReport, Location, Outcome, PathResult, Record, RunReport};

pub struct XmlReporter {
    options: ReportOptions,
}

impl XmlReporter {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }
}

type XmlResult = Result<(), quick_xml::Error>;

/// Success and failure counts of a path or a run.
#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    successes: usize,
    failures: usize,
}

impl Counts {
    fn of_path(path: &PathResult) -> Self {
        let mut counts = Counts::default();
        for record in &path.records {
            match record.outcome() {
                Some(Outcome::Pass) => counts.successes += 1,
                Some(_) => counts.failures += 1,
                None => {}
            }
        }
        counts
    }

    fn attributes(&self) -> [(&'static str, String); 3] {
        [
            ("successes", self.successes.to_string()),
            ("failures", self.failures.to_string()),
            ("expectedFailures", "0".to_string()),
        ]
    }
}

struct XmlOut<'w> {
    writer: Writer<&'w mut dyn WriteColor>,
    durations: bool,
}

impl<'w> XmlOut<'w> {
    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> XmlResult {
        let mut tag = BytesStart::new(name);
        tag.extend_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Start(tag))
    }

    fn end(&mut self, name: &str) -> XmlResult {
        self.writer.write_event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> XmlResult {
        let mut tag = BytesStart::new(name);
        tag.extend_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Empty(tag))
    }

    fn text_element(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) -> XmlResult {
        self.start(name, attributes)?;
        self.writer.write_event(Event::Text(BytesText::new(text.trim())))?;
        self.end(name)
    }

    fn overall_results(&mut self, counts: Counts, seconds: Option<f64>) -> XmlResult {
        let mut attributes = counts.attributes().to_vec();
        if let Some(seconds) = seconds.filter(|_| self.durations) {
            attributes.push(("durationInSeconds", seconds.to_string()));
        }
        let borrowed: Vec<(&str, &str)> =
            attributes.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.empty("OverallResults", &borrowed)
    }

    fn located(&mut self, name: &str, location: Option<&Location>, text: &str) -> XmlResult {
        match location {
            Some(location) => {
                let line = location.line.to_string();
                self.text_element(
                    name,
                    &[("filename", location.file.as_str()), ("line", line.as_str())],
                    text,
                )
            }
            None => self.text_element(name, &[], text),
        }
    }

    fn record(&mut self, record: &Record) -> XmlResult {
        match record {
            Record::Assertion(a) if !a.passed => {
                let line = a.location.line.to_string();
                let kind = a.kind.to_string();
                self.start(
                    "Expression",
                    &[
                        ("success", "false"),
                        ("type", kind.as_str()),
                        ("filename", a.location.file.as_str()),
                        ("line", line.as_str()),
                    ],
                )?;
                self.text_element("Original", &[], &a.original)?;
                self.text_element("Expanded", &[], &a.expanded)?;
                self.end("Expression")
            }
            Record::Assertion(_) | Record::Success { .. } => Ok(()),
            Record::Failure { message, location } => self.located("Failure", Some(location), message),
            Record::Error { message, location } => {
                self.located("Exception", location.as_ref(), message)
            }
            Record::Warning { message, .. } => self.text_element("Warning", &[], message),
            Record::Info { message } => self.text_element("Info", &[], message),
        }
    }

    fn path(&mut self, path: &PathResult) -> XmlResult {
        for section in &path.sections {
            self.start("Section", &[("name", section.as_str())])?;
        }
        for record in &path.records {
            self.record(record)?;
        }
        let counts = Counts::of_path(path);
        for _ in &path.sections {
            self.overall_results(counts, Some(path.duration.as_secs_f64()))?;
            self.end("Section")?;
        }
        Ok(())
    }

    fn case(&mut self, case: &CaseReport) -> XmlResult {
        let tags = case.tags.to_string();
        let line = case.location.line.to_string();
        self.start(
            "TestCase",
            &[
                ("name", case.name.as_str()),
                ("tags", tags.as_str()),
                ("filename", case.location.file.as_str()),
                ("line", line.as_str()),
            ],
        )?;

        for path in &case.paths {
            self.path(path)?;
        }

        let success = case.status().is_pass().to_string();
        let seconds = case.duration().as_secs_f64().to_string();
        if self.durations {
            self.empty(
                "OverallResult",
                &[("success", success.as_str()), ("durationInSeconds", seconds.as_str())],
            )?;
        } else {
            self.empty("OverallResult", &[("success", success.as_str())])?;
        }
        self.end("TestCase")
    }
}

impl Reporter for XmlReporter {
    fn report(&self, report: &RunReport, out: &mut dyn WriteColor) -> Result<(), CatchError> {
        let mut xml = XmlOut {
            writer: Writer::new_with_indent(&mut *out, b' ', 2),
            durations: self.options.durations,
        };
        write_report(&mut xml, &self.options.name, report)
            .map_err(|e| err_msg!(Io, "failed to write xml report").with_cause(e))?;
        drop(xml);
        writeln!(out).map_err(io_error)?;
        out.flush().map_err(io_error)
    }
}

fn write_report(xml: &mut XmlOut<'_>, name: &str, report: &RunReport) -> XmlResult {
    xml.writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    xml.start("Catch", &[("name", name)])?;
    xml.start("Group", &[("name", name)])?;

    // Group and run totals count test cases, as Catch does.
    let mut cases = Counts::default();
    for case in &report.cases {
        xml.case(case)?;
        if case.status().is_pass() {
            cases.successes += 1;
        } else {
            cases.failures += 1;
        }
    }
    xml.overall_results(cases, None)?;
    xml.end("Group")?;
    xml.overall_results(cases, None)?;
    xml.end("Catch")
}
