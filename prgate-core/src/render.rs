//! Report section rendering.
//!
//! Sections are rendered through the [`Renderer`] seam, which takes a fixed
//! [`Template`] identifier and a JSON context. [`HtmlRenderer`] is the built-in
//! implementation.

use std::collections::BTreeMap;
use std::fmt::Write;

use html_escape::encode_text;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{AllowList, AnalysisReport};
use crate::error::{PrGateError, Result};
use crate::model::{
    AnalysisSummary, Bucket, FileAnalysisResult, StyleFinding, TestComparisonRecord,
};
use crate::reconcile::{UnitTestReport, UnitTestSummary};
use crate::style::StyleReport;

/// Anchor of the unit-test section in the rendered report.
pub const UNIT_TEST_ANCHOR: &str = "unittests";
/// Anchor of the static-analysis section in the rendered report.
pub const ANALYSIS_ANCHOR: &str = "pylint";
/// Anchor of the style section in the rendered report.
pub const STYLE_ANCHOR: &str = "pycodestyle";

/// Unit-test buckets in display order.
const UNIT_TEST_BUCKETS: [(Bucket, &str); 5] = [
    (Bucket::NewFailure, "New failures"),
    (Bucket::Added, "Added tests"),
    (Bucket::Deleted, "Deleted tests"),
    (Bucket::UnstableChange, "Unstable test changes"),
    (Bucket::OkChange, "Other changes"),
];

/// Fixed template identifiers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Template {
    /// Unit-test delta summary.
    UnitTestSummary,
    /// Static-analysis score table.
    AnalysisSummary,
    /// Static-analysis events per file.
    AnalysisDetail,
    /// Style findings per file.
    StyleDetail,
}

impl Template {
    /// Stable template name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnitTestSummary => "unit_test_summary",
            Self::AnalysisSummary => "analysis_summary",
            Self::AnalysisDetail => "analysis_detail",
            Self::StyleDetail => "style_detail",
        }
    }
}

/// Renders a template with a JSON context.
#[cfg_attr(test, mockall::automock)]
pub trait Renderer {
    /// Render `template` with `context` into a report fragment.
    fn render(&self, template: Template, context: &Value) -> Result<String>;
}

/// Context for [`Template::UnitTestSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitTestContext {
    /// Whether unit tests failed.
    pub failed: bool,
    /// Bucket counts.
    pub summary: UnitTestSummary,
    /// Bucketed records.
    pub report: UnitTestReport,
    /// Outcomes that count as broken.
    pub error_conditions: Vec<String>,
}

impl UnitTestContext {
    /// Build the context from a reconciled report.
    pub fn from_report(report: &UnitTestReport) -> Self {
        Self {
            failed: report.failed,
            summary: report.summary(),
            report: report.clone(),
            error_conditions: vec!["error".to_string(), "failure".to_string()],
        }
    }
}

/// One row of the analysis score table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileScoreRow {
    /// File name.
    pub filename: String,
    /// Candidate score.
    pub current_score: Option<f64>,
    /// Baseline score.
    pub baseline_score: Option<f64>,
    /// Whether this file fails the gate.
    pub failed: bool,
}

/// Context for [`Template::AnalysisSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummaryContext {
    /// Whether the analysis gate failed.
    pub failed: bool,
    /// Event counts.
    pub summary: AnalysisSummary,
    /// Score rows sorted by file name.
    pub files: Vec<FileScoreRow>,
}

impl AnalysisSummaryContext {
    /// Build the context from an analysis report.
    pub fn from_report(report: &AnalysisReport) -> Self {
        Self {
            failed: report.failed,
            summary: report.summary,
            files: report
                .files
                .iter()
                .map(|file| FileScoreRow {
                    filename: file.filename.clone(),
                    current_score: file.current_score,
                    baseline_score: file.baseline_score,
                    failed: file.failed(),
                })
                .collect(),
        }
    }
}

/// Context for [`Template::AnalysisDetail`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDetailContext {
    /// Files with at least one event, sorted by file name.
    pub files: Vec<FileAnalysisResult>,
    /// Codes exempted from gating.
    pub allowed_codes: Vec<String>,
}

impl AnalysisDetailContext {
    /// Build the context from an analysis report.
    pub fn from_report(report: &AnalysisReport, allow_list: &AllowList) -> Self {
        Self {
            files: report
                .files
                .iter()
                .filter(|file| !file.events.is_empty())
                .cloned()
                .collect(),
            allowed_codes: allow_list.codes().map(str::to_string).collect(),
        }
    }
}

/// Context for [`Template::StyleDetail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleContext {
    /// Findings grouped by file.
    pub report: BTreeMap<String, Vec<StyleFinding>>,
}

impl StyleContext {
    /// Build the context from a style report.
    pub fn from_report(report: &StyleReport) -> Self {
        Self {
            report: report.files.clone(),
        }
    }
}

/// Serialize a typed context into the JSON mapping passed to a [`Renderer`].
pub fn to_context<T: Serialize>(context: &T) -> Result<Value> {
    Ok(serde_json::to_value(context)?)
}

/// Built-in HTML renderer for the four report templates.
#[derive(Debug, Default, Clone)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    /// Create a new HTML renderer.
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, template: Template, context: &Value) -> Result<String> {
        match template {
            Template::UnitTestSummary => Ok(render_unit_tests(&decode(template, context)?)),
            Template::AnalysisSummary => Ok(render_analysis_summary(&decode(template, context)?)),
            Template::AnalysisDetail => Ok(render_analysis_detail(&decode(template, context)?)),
            Template::StyleDetail => Ok(render_style(&decode(template, context)?)),
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(template: Template, context: &Value) -> Result<T> {
    T::deserialize(context).map_err(|err| {
        PrGateError::Render(format!("invalid context for {}: {err}", template.as_str()))
    })
}

fn render_unit_tests(context: &UnitTestContext) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "<h2 id=\"{UNIT_TEST_ANCHOR}\">Unit tests: {}</h2>",
        status_label(context.failed)
    );
    for (bucket, title) in UNIT_TEST_BUCKETS {
        append_changes(&mut output, bucket, title, context.report.bucket(bucket));
    }
    let summary = &context.summary;
    let total = summary.new_failures
        + summary.added
        + summary.deleted
        + summary.unstable_changes
        + summary.ok_changes;
    if total == 0 {
        let _ = writeln!(output, "<p>No changes in unit test results.</p>");
    }
    output
}

fn append_changes(
    output: &mut String,
    bucket: Bucket,
    title: &str,
    records: &[TestComparisonRecord],
) {
    if records.is_empty() {
        return;
    }
    let _ = writeln!(
        output,
        "<h3 class=\"{}\">{title} ({})</h3>",
        bucket.as_str(),
        records.len()
    );
    let _ = writeln!(
        output,
        "<table>\n<tr><th>Test</th><th>Before</th><th>After</th></tr>"
    );
    for record in records {
        let _ = writeln!(
            output,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            encode_text(&record.identity.to_string()),
            record.baseline.map(|o| o.as_str()).unwrap_or("-"),
            record.candidate.map(|o| o.as_str()).unwrap_or("-"),
        );
    }
    let _ = writeln!(output, "</table>");
}

fn render_analysis_summary(context: &AnalysisSummaryContext) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "<h2 id=\"{ANALYSIS_ANCHOR}\">Static analysis: {}</h2>",
        status_label(context.failed)
    );
    let summary = &context.summary;
    let _ = writeln!(
        output,
        "<p>{} must be fixed, {} warnings, {} comments.</p>",
        summary.failures, summary.warnings, summary.comments
    );
    if context.files.is_empty() {
        return output;
    }
    let _ = writeln!(
        output,
        "<table>\n<tr><th>File</th><th>Baseline score</th><th>Score</th><th>Status</th></tr>"
    );
    for row in &context.files {
        let _ = writeln!(
            output,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            encode_text(&row.filename),
            format_score(row.baseline_score),
            format_score(row.current_score),
            if row.failed { "failed" } else { "ok" }
        );
    }
    let _ = writeln!(output, "</table>");
    output
}

fn render_analysis_detail(context: &AnalysisDetailContext) -> String {
    let mut output = String::new();
    for file in &context.files {
        let _ = writeln!(output, "<h3>{}</h3>\n<ul>", encode_text(&file.filename));
        for event in &file.events {
            let allowed = if context.allowed_codes.contains(&event.code) {
                " (allowed)"
            } else {
                ""
            };
            let _ = writeln!(
                output,
                "<li>{} line {}: [{}{}] {}{allowed}</li>",
                event.severity.as_str(),
                encode_text(event.line.as_deref().unwrap_or("?")),
                encode_text(&event.marker),
                encode_text(&event.code),
                encode_text(&event.message),
            );
        }
        let _ = writeln!(output, "</ul>");
    }
    output
}

fn render_style(context: &StyleContext) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "<h2 id=\"{STYLE_ANCHOR}\">Style report</h2>");
    if context.report.is_empty() {
        let _ = writeln!(output, "<p>No style findings.</p>");
        return output;
    }
    for (filename, findings) in &context.report {
        let _ = writeln!(output, "<h3>{}</h3>\n<ul>", encode_text(filename));
        for finding in findings {
            let _ = writeln!(
                output,
                "<li>line {}: [{}] {}</li>",
                encode_text(&finding.line),
                encode_text(&finding.code),
                encode_text(&finding.message),
            );
        }
        let _ = writeln!(output, "</ul>");
    }
    output
}

fn status_label(failed: bool) -> &'static str {
    if failed { "failed" } else { "succeeded" }
}

fn format_score(score: Option<f64>) -> String {
    score
        .map(|score| format!("{score:.2}"))
        .unwrap_or_else(|| "-".to_string())
}
