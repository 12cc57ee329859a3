//! JaCoCo XML report parser
//!
//! Reads the `report > package > class > counter` tree that JaCoCo emits.
//! The DOCTYPE declaration the report carries is skipped without fetching
//! the external DTD. Counters nested under methods are attributed to their
//! enclosing class; `sourcefile`, `package` and `report` level counters are
//! ignored.

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::Path;

/// Counter kinds emitted by JaCoCo; only Instruction drives the gate
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Instruction,
    Branch,
    Line,
    Complexity,
    Method,
    Class,
    #[default]
    Other,
}

impl CounterKind {
    fn from_attr(value: &str) -> Self {
        match value {
            "INSTRUCTION" => CounterKind::Instruction,
            "BRANCH" => CounterKind::Branch,
            "LINE" => CounterKind::Line,
            "COMPLEXITY" => CounterKind::Complexity,
            "METHOD" => CounterKind::Method,
            "CLASS" => CounterKind::Class,
            _ => CounterKind::Other,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Counter {
    pub kind: CounterKind,
    pub missed: u64,
    pub covered: u64,
}

#[derive(Debug, Default, Clone)]
pub struct Class {
    pub name: String,
    pub source_file_name: String,
    pub counters: Vec<Counter>,
}

#[derive(Debug, Default, Clone)]
pub struct Package {
    pub name: String,
    pub classes: Vec<Class>,
}

#[derive(Debug, Default, Clone)]
pub struct Report {
    pub packages: Vec<Package>,
}

/// Parse a JaCoCo XML report file
pub fn parse_report(path: &Path) -> Result<Report> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read coverage report: {}", path.display()))?;
    parse_report_string(&content)
}

/// Parse JaCoCo XML content from a string
pub fn parse_report_string(content: &str) -> Result<Report> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut report = Report::default();
    let mut current_package: Option<Package> = None;
    let mut current_class: Option<Class> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"package" => {
                    current_package = Some(package_from_attrs(e));
                }
                b"class" => {
                    current_class = Some(class_from_attrs(e));
                }
                b"counter" => {
                    if let Some(ref mut class) = current_class {
                        class.counters.push(counter_from_attrs(e));
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"package" => {
                    report.packages.push(package_from_attrs(e));
                }
                b"class" => {
                    // A class with no counters still enters the tree; the
                    // join later reports it as unscored
                    let class = class_from_attrs(e);
                    if let Some(ref mut package) = current_package {
                        package.classes.push(class);
                    }
                }
                b"counter" => {
                    if let Some(ref mut class) = current_class {
                        class.counters.push(counter_from_attrs(e));
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"package" => {
                    if let Some(package) = current_package.take() {
                        report.packages.push(package);
                    }
                }
                b"class" => {
                    if let (Some(ref mut package), Some(class)) =
                        (&mut current_package, current_class.take())
                    {
                        package.classes.push(class);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("Error parsing JaCoCo XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(report)
}

fn package_from_attrs(e: &BytesStart) -> Package {
    let mut package = Package::default();
    for attr in e.attributes().filter_map(|a| a.ok()) {
        if attr.key.as_ref() == b"name" {
            package.name = String::from_utf8_lossy(&attr.value).to_string();
        }
    }
    package
}

fn class_from_attrs(e: &BytesStart) -> Class {
    let mut class = Class::default();
    for attr in e.attributes().filter_map(|a| a.ok()) {
        match attr.key.as_ref() {
            b"name" => class.name = String::from_utf8_lossy(&attr.value).to_string(),
            b"sourcefilename" => {
                class.source_file_name = String::from_utf8_lossy(&attr.value).to_string()
            }
            _ => {}
        }
    }
    class
}

fn counter_from_attrs(e: &BytesStart) -> Counter {
    let mut counter = Counter::default();
    for attr in e.attributes().filter_map(|a| a.ok()) {
        match attr.key.as_ref() {
            b"type" => {
                counter.kind = CounterKind::from_attr(&String::from_utf8_lossy(&attr.value))
            }
            b"missed" => {
                counter.missed = String::from_utf8_lossy(&attr.value).parse().unwrap_or(0)
            }
            b"covered" => {
                counter.covered = String::from_utf8_lossy(&attr.value).parse().unwrap_or(0)
            }
            _ => {}
        }
    }
    counter
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<!DOCTYPE report PUBLIC "-//JACOCO//DTD Report 1.1//EN" "report.dtd">
<report name="artifact-manager">
    <sessioninfo id="build-1" start="1700000000000" dump="1700000001000"/>
    <package name="com/acme">
        <class name="com/acme/Foo" sourcefilename="Foo.java">
            <method name="bar" desc="()V" line="10">
                <counter type="INSTRUCTION" missed="4" covered="16"/>
                <counter type="LINE" missed="1" covered="3"/>
            </method>
            <counter type="INSTRUCTION" missed="10" covered="40"/>
            <counter type="BRANCH" missed="2" covered="2"/>
        </class>
        <sourcefile name="Foo.java">
            <line nr="10" mi="0" ci="3" mb="0" cb="0"/>
            <counter type="INSTRUCTION" missed="10" covered="40"/>
        </sourcefile>
        <counter type="INSTRUCTION" missed="10" covered="40"/>
    </package>
    <counter type="INSTRUCTION" missed="10" covered="40"/>
</report>"#;

    #[test]
    fn test_parse_report() {
        let report = parse_report_string(SAMPLE).unwrap();
        assert_eq!(report.packages.len(), 1);

        let package = &report.packages[0];
        assert_eq!(package.name, "com/acme");
        assert_eq!(package.classes.len(), 1);

        let class = &package.classes[0];
        assert_eq!(class.name, "com/acme/Foo");
        assert_eq!(class.source_file_name, "Foo.java");
        // Method-level counters belong to the class; sourcefile, package
        // and report counters do not
        assert_eq!(class.counters.len(), 4);
    }

    #[test]
    fn test_counter_attributes() {
        let report = parse_report_string(SAMPLE).unwrap();
        let class = &report.packages[0].classes[0];

        let class_level = &class.counters[2];
        assert_eq!(class_level.kind, CounterKind::Instruction);
        assert_eq!(class_level.missed, 10);
        assert_eq!(class_level.covered, 40);
    }

    #[test]
    fn test_unknown_counter_kind_is_other() {
        let xml = r#"<report><package name="p">
            <class name="p/C" sourcefilename="C.java">
                <counter type="MUTATION" missed="1" covered="1"/>
            </class>
        </package></report>"#;

        let report = parse_report_string(xml).unwrap();
        let class = &report.packages[0].classes[0];
        assert_eq!(class.counters[0].kind, CounterKind::Other);
    }

    #[test]
    fn test_class_without_counters() {
        let xml = r#"<report><package name="p">
            <class name="p/Iface" sourcefilename="Iface.java"/>
        </package></report>"#;

        let report = parse_report_string(xml).unwrap();
        let class = &report.packages[0].classes[0];
        assert_eq!(class.source_file_name, "Iface.java");
        assert!(class.counters.is_empty());
    }

    #[test]
    fn test_malformed_xml_is_fatal() {
        let xml = "<report><package name=\"p\"><class></report>";
        assert!(parse_report_string(xml).is_err());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = parse_report(Path::new("does/not/exist/jacoco.xml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read coverage report"));
    }

    #[test]
    fn test_parse_report_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jacoco.xml");
        fs::write(&path, SAMPLE).unwrap();

        let report = parse_report(&path).unwrap();
        assert_eq!(report.packages.len(), 1);
    }
}
