//! Normalized records for lint findings and test results.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Files scoring below this fail unless they did not regress against the baseline.
pub const SCORE_THRESHOLD: f64 = 9.0;
/// Files scoring below this always fail.
pub const ABSOLUTE_SCORE_THRESHOLD: f64 = 8.0;

/// Severity of a static-analysis event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational finding.
    Comment,
    /// Warning-level finding.
    Warning,
    /// Error-level finding.
    Error,
}

impl Severity {
    /// Map a raw event marker to a severity.
    pub fn from_marker(marker: &str) -> Self {
        match marker {
            "E" => Self::Error,
            "W" => Self::Warning,
            _ => Self::Comment,
        }
    }

    /// One step less severe.
    pub fn downgraded(self) -> Self {
        match self {
            Self::Error => Self::Warning,
            Self::Warning | Self::Comment => Self::Comment,
        }
    }

    /// Human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One static-analysis finding attached to a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEvent {
    /// Line reference reported by the analyzer, if any.
    pub line: Option<String>,
    /// Raw marker as emitted by the analyzer.
    pub marker: String,
    /// Classified severity, after allow-list downgrades.
    pub severity: Severity,
    /// Analyzer message code.
    pub code: String,
    /// Analyzer message text.
    pub message: String,
    /// Whether this event fails the analysis gate.
    pub blocking: bool,
}

/// Analysis results for a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysisResult {
    /// File name as keyed in the report.
    pub filename: String,
    /// Events from the candidate run, in report order.
    pub events: Vec<AnalysisEvent>,
    /// Score from the candidate run.
    pub current_score: Option<f64>,
    /// Score from the baseline run.
    pub baseline_score: Option<f64>,
}

impl FileAnalysisResult {
    /// Whether any event blocks the gate.
    pub fn has_blocking_events(&self) -> bool {
        self.events.iter().any(|event| event.blocking)
    }

    /// Whether the score rules fail this file.
    pub fn score_failed(&self) -> bool {
        let Some(current) = self.current_score else {
            return false;
        };
        if current < ABSOLUTE_SCORE_THRESHOLD {
            return true;
        }
        let regressed = self
            .baseline_score
            .map(|baseline| current < baseline)
            .unwrap_or(false);
        current < SCORE_THRESHOLD && regressed
    }

    /// Whether this file fails the analysis gate.
    pub fn failed(&self) -> bool {
        self.has_blocking_events() || self.score_failed()
    }
}

/// Aggregate event counts for an analysis report.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Events that must be fixed.
    pub failures: usize,
    /// Non-blocking warnings.
    pub warnings: usize,
    /// Comments to review.
    pub comments: usize,
}

/// A single style-checker finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleFinding {
    /// File the finding belongs to.
    pub filename: String,
    /// Line reference as reported (may include a column).
    pub line: String,
    /// Checker code, e.g. `E501`.
    pub code: String,
    /// Checker message.
    pub message: String,
}

/// Identity joining a test across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestIdentity {
    /// Fully-qualified class name.
    pub class_name: String,
    /// Test method name.
    pub method_name: String,
}

impl TestIdentity {
    /// Create a new identity.
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    /// Parse a `class:method` reference.
    pub fn parse(text: &str) -> Option<Self> {
        let (class_name, method_name) = text.trim().split_once(':')?;
        if class_name.is_empty() || method_name.is_empty() {
            return None;
        }
        Some(Self::new(class_name, method_name))
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class_name, self.method_name)
    }
}

/// Result status of a single test.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    /// The test passed.
    Pass,
    /// An assertion failed.
    Failure,
    /// The test raised an unexpected error.
    Error,
    /// The test was skipped.
    Skipped,
}

impl TestOutcome {
    /// Whether this outcome counts as a broken test.
    pub fn is_error_class(&self) -> bool {
        matches!(self, Self::Failure | Self::Error)
    }

    /// Human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Failure => "failure",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A test joined across the baseline and candidate runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestComparisonRecord {
    /// Test identity.
    pub identity: TestIdentity,
    /// Outcome in the baseline run.
    pub baseline: Option<TestOutcome>,
    /// Outcome in the candidate run.
    pub candidate: Option<TestOutcome>,
}

/// Tests known to flip outcome nondeterministically.
pub type UnstableSet = BTreeSet<TestIdentity>;

/// Classification of a test comparison.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    /// A stable test that now fails or errors.
    NewFailure,
    /// A stable test whose outcome changed to a non-error outcome.
    OkChange,
    /// An unstable test whose outcome changed.
    UnstableChange,
    /// A test only present in the candidate run.
    Added,
    /// A test only present in the baseline run.
    Deleted,
}

impl Bucket {
    /// Stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewFailure => "new-failure",
            Self::OkChange => "ok-change",
            Self::UnstableChange => "unstable-change",
            Self::Added => "added",
            Self::Deleted => "deleted",
        }
    }
}
