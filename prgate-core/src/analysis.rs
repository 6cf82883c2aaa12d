//! Static-analysis report parsing and gating.
//!
//! The report is a JSON object keyed by file name. Each entry may carry a
//! `test` section (the candidate run, with events and a score) and a `base`
//! section (the baseline run, with a score). Events are arrays of the form
//! `[line, marker, code, message, ...]`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

use crate::artifact::{self, Artifact};
use crate::error::{PrGateError, Result};
use crate::fs::FileSystem;
use crate::model::{AnalysisEvent, AnalysisSummary, FileAnalysisResult, Severity};

/// Analyzer codes that never fail the gate by default.
pub const DEFAULT_ALLOWED_CODES: [&str; 3] = ["0511", "0703", "0613"];

/// Codes exempted from failing the analysis gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList(BTreeSet<String>);

impl AllowList {
    /// Build an allow-list from explicit codes.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(codes.into_iter().map(Into::into).collect())
    }

    /// Whether `code` is exempted.
    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    /// Iterate allowed codes in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_CODES)
    }
}

/// Parsed and gated static-analysis report.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    /// Whether the analysis gate failed.
    pub failed: bool,
    /// Informational event counts.
    pub summary: AnalysisSummary,
    /// Per-file results sorted by file name.
    pub files: Vec<FileAnalysisResult>,
}

#[derive(Debug, Deserialize)]
struct RawFileEntry {
    #[serde(default)]
    test: Option<RawRun>,
    #[serde(default)]
    base: Option<RawRun>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRun {
    #[serde(default)]
    events: Vec<Vec<Value>>,
    #[serde(default)]
    score: Option<Value>,
}

/// Classify a raw event marker and code into a severity and blocking flag.
pub fn classify_event(marker: &str, code: &str, allow_list: &AllowList) -> (Severity, bool) {
    let severity = Severity::from_marker(marker);
    let gating = matches!(severity, Severity::Warning | Severity::Error);
    if allow_list.contains(code) {
        (severity.downgraded(), false)
    } else {
        (severity, gating)
    }
}

/// Load the analysis report at `path`.
///
/// A missing report is [`Artifact::Absent`]; undecodable JSON is
/// [`Artifact::Malformed`].
pub fn load_analysis_report<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    allow_list: &AllowList,
) -> Artifact<AnalysisReport> {
    info!("Evaluating static analysis report {}", path.display());
    artifact::load(fs, path, |text| parse_analysis_report(text, allow_list))
}

/// Parse and gate an analysis report.
pub fn parse_analysis_report(text: &str, allow_list: &AllowList) -> Result<AnalysisReport> {
    let raw: BTreeMap<String, RawFileEntry> = serde_json::from_str(text)?;

    let mut failed = false;
    let mut summary = AnalysisSummary::default();
    let mut files = Vec::with_capacity(raw.len());

    for (filename, entry) in raw {
        let baseline_score = match entry.base.as_ref() {
            Some(base) => parse_score(base.score.as_ref(), &filename)?,
            None => None,
        };
        let Some(test) = entry.test else {
            files.push(FileAnalysisResult {
                filename,
                events: Vec::new(),
                current_score: None,
                baseline_score,
            });
            continue;
        };

        let mut events = Vec::with_capacity(test.events.len());
        for raw_event in &test.events {
            let event = parse_event(raw_event, &filename, allow_list)?;
            if event.blocking {
                summary.failures += 1;
            } else if event.severity == Severity::Comment {
                summary.comments += 1;
            } else {
                summary.warnings += 1;
            }
            events.push(event);
        }

        let result = FileAnalysisResult {
            current_score: parse_score(test.score.as_ref(), &filename)?,
            filename,
            events,
            baseline_score,
        };
        if result.failed() {
            debug!("analysis gate failed for {}", result.filename);
            failed = true;
        }
        files.push(result);
    }

    Ok(AnalysisReport {
        failed,
        summary,
        files,
    })
}

fn parse_event(raw: &[Value], filename: &str, allow_list: &AllowList) -> Result<AnalysisEvent> {
    let field = |index: usize| raw.get(index).and_then(value_to_string);
    let marker = field(1).ok_or_else(|| malformed_event(filename, "missing marker"))?;
    let code = field(2).ok_or_else(|| malformed_event(filename, "missing code"))?;
    let (severity, blocking) = classify_event(&marker, &code, allow_list);
    Ok(AnalysisEvent {
        line: field(0),
        marker,
        severity,
        code,
        message: field(3).unwrap_or_default(),
        blocking,
    })
}

fn parse_score(value: Option<&Value>, filename: &str) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => Ok(number.as_f64()),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => text.trim().parse::<f64>().map(Some).map_err(|err| {
            PrGateError::Other(format!("invalid score {text:?} for {filename}: {err}"))
        }),
        Some(other) => Err(PrGateError::Other(format!(
            "invalid score {other} for {filename}"
        ))),
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn malformed_event(filename: &str, detail: &str) -> PrGateError {
    PrGateError::Other(format!("malformed analysis event in {filename}: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use std::io;

    fn parse(text: &str) -> AnalysisReport {
        parse_analysis_report(text, &AllowList::default()).expect("parse report")
    }

    #[test]
    fn blocking_error_with_regressed_score_fails() {
        let report = parse(
            r#"{"a.py": {"test": {"events": [[10, "E", "9999", "broken"]], "score": 8.5},
                         "base": {"score": 9.0}}}"#,
        );

        assert!(report.failed);
        assert_eq!(report.summary.failures, 1);
        assert_eq!(report.summary.warnings, 0);
        assert_eq!(report.summary.comments, 0);
        let file = &report.files[0];
        assert_eq!(file.current_score, Some(8.5));
        assert_eq!(file.baseline_score, Some(9.0));
        assert_eq!(file.events[0].line.as_deref(), Some("10"));
        assert_eq!(file.events[0].message, "broken");
    }

    #[test]
    fn allow_listed_warning_is_downgraded_to_comment() {
        let report = parse(r#"{"b.py": {"test": {"events": [[3, "W", "0511", "TODO"]]}}}"#);

        assert!(!report.failed);
        assert_eq!(report.summary.failures, 0);
        assert_eq!(report.summary.warnings, 0);
        assert_eq!(report.summary.comments, 1);
        assert_eq!(report.files[0].events[0].severity, Severity::Comment);
    }

    #[test]
    fn allow_listed_error_never_fails_regardless_of_score() {
        let report = parse(
            r#"{"c.py": {"test": {"events": [[1, "E", "0703", "broad except"]], "score": 9.5},
                         "base": {"score": 10.0}}}"#,
        );

        assert!(!report.failed);
        assert_eq!(report.summary.warnings, 1);
        assert!(!report.files[0].has_blocking_events());
    }

    #[test]
    fn non_gating_markers_count_as_comments() {
        let report = parse(
            r#"{"d.py": {"test": {"events": [[1, "C", "0103", "name"], [2, "R", "0201", "method"]],
                                  "score": "9.8"}}}"#,
        );

        assert!(!report.failed);
        assert_eq!(report.summary.comments, 2);
        assert_eq!(report.files[0].current_score, Some(9.8));
    }

    #[test]
    fn low_absolute_score_fails_without_events() {
        let report = parse(r#"{"e.py": {"test": {"events": [], "score": 7.5}, "base": {}}}"#);

        assert!(report.failed);
        assert_eq!(report.summary, AnalysisSummary::default());
    }

    #[test]
    fn files_without_test_section_cannot_fail() {
        let report = parse(r#"{"gone.py": {"base": {"score": 3.0}}}"#);

        assert!(!report.failed);
        assert_eq!(report.files[0].baseline_score, Some(3.0));
        assert_eq!(report.files[0].current_score, None);
    }

    #[test]
    fn files_are_sorted_and_counts_are_order_independent() {
        let first = parse(
            r#"{"z.py": {"test": {"events": [[1, "W", "1111", "w"]]}},
                "a.py": {"test": {"events": [[1, "C", "0103", "c"]]}}}"#,
        );
        let second = parse(
            r#"{"a.py": {"test": {"events": [[1, "C", "0103", "c"]]}},
                "z.py": {"test": {"events": [[1, "W", "1111", "w"]]}}}"#,
        );

        assert_eq!(first, second);
        let names: Vec<&str> = first.files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["a.py", "z.py"]);
    }

    #[test]
    fn custom_allow_list_is_respected() {
        let allow = AllowList::new(["1111"]);
        let report =
            parse_analysis_report(r#"{"z.py": {"test": {"events": [[1, "W", "1111", "w"]]}}}"#, &allow)
                .expect("parse");
        assert!(!report.failed);
        assert_eq!(allow.codes().collect::<Vec<_>>(), vec!["1111"]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = parse_analysis_report("{\"a.py\": ", &AllowList::default()).unwrap_err();
        assert!(matches!(err, PrGateError::Json(_)));
    }

    #[test]
    fn event_without_code_is_an_error() {
        let err = parse_analysis_report(
            r#"{"a.py": {"test": {"events": [[1, "E"]]}}}"#,
            &AllowList::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing code"));
    }

    #[test]
    fn missing_report_is_not_applicable() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .returning(|_| Err(io::Error::new(io::ErrorKind::NotFound, "missing").into()));

        let artifact =
            load_analysis_report(&fs, Path::new("report.json"), &AllowList::default());
        assert!(matches!(artifact, Artifact::Absent));
    }

    #[test]
    fn truncated_report_is_malformed() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .returning(|_| Ok("{\"a.py\": {\"test\"".to_string()));

        let artifact =
            load_analysis_report(&fs, Path::new("report.json"), &AllowList::default());
        assert!(matches!(artifact, Artifact::Malformed(_)));
    }
}
