#![deny(missing_docs)]
//! prgate core library.
//!
//! Parses CI artifacts (static analysis, style checks and unit-test results),
//! reconciles baseline and candidate test runs, assembles a rendered report and
//! publishes verdicts to a pull-request tracker.

pub mod analysis;
pub mod artifact;
pub mod error;
pub mod fs;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod reconcile;
pub mod render;
pub mod report;
pub mod style;
pub mod xunit;

pub use analysis::{AllowList, AnalysisReport, load_analysis_report, parse_analysis_report};
pub use artifact::Artifact;
pub use error::{PrGateError, Result};
pub use fs::{FileSystem, StdFileSystem};
pub use model::{
    AnalysisEvent, AnalysisSummary, Bucket, FileAnalysisResult, Severity, StyleFinding,
    TestComparisonRecord, TestIdentity, TestOutcome, UnstableSet,
};
pub use pipeline::{
    ArtifactLayout, Evaluation, LINT_FAILED, LINT_SUCCEEDED, UNIT_FAILED, UNIT_SUCCEEDED,
    evaluate,
};
pub use publish::{
    CommentPolicy, CommitState, CommitStatus, IssueTarget, PublishOutcome, Publisher, Tracker,
    compose_message, report_url,
};
pub use reconcile::{TestRunLayout, UnitTestReport, UnitTestSummary, reconcile_test_runs};
pub use render::{HtmlRenderer, Renderer, Template};
pub use report::{ReportSections, assemble_report};
pub use style::{StyleReport, load_style_report, parse_style_report};
