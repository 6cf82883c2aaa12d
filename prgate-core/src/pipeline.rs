//! End-to-end evaluation of the CI artifacts of one run.

use std::path::PathBuf;

use log::{error, info};

use crate::analysis::{AllowList, AnalysisReport, load_analysis_report};
use crate::artifact::Artifact;
use crate::error::{PrGateError, Result};
use crate::fs::FileSystem;
use crate::reconcile::{TestRunLayout, UnitTestReport, reconcile_test_runs};
use crate::report::ReportSections;
use crate::style::{StyleReport, load_style_report};

/// Printed when the static-analysis gate fails.
pub const LINT_FAILED: &str = "PRGATE-FAIL-LINT";
/// Printed when the static-analysis gate passes.
pub const LINT_SUCCEEDED: &str = "PRGATE-SUCCEED-LINT";
/// Printed when the unit-test gate fails.
pub const UNIT_FAILED: &str = "PRGATE-FAIL-UNIT";
/// Printed when the unit-test gate passes.
pub const UNIT_SUCCEEDED: &str = "PRGATE-SUCCEED-UNIT";

/// Location of every input artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    /// Structured static-analysis report.
    pub analysis_report: PathBuf,
    /// Line-oriented style report.
    pub style_report: PathBuf,
    /// Style report tried when `style_report` is missing.
    pub style_fallback: Option<PathBuf>,
    /// Unit-test artifacts of both runs.
    pub tests: TestRunLayout,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            analysis_report: PathBuf::from("LatestPylint/pylintpy3Report.json"),
            style_report: PathBuf::from("LatestPylint/pep8py3.txt"),
            style_fallback: Some(PathBuf::from("LatestPylint/pep8.txt")),
            tests: TestRunLayout {
                baseline_root: PathBuf::from("MasterUnitTests"),
                candidate_root: PathBuf::from("LatestUnitTests"),
                pattern: "*/nosetestspy3-*.xml".to_string(),
                unstable_list: PathBuf::from("UnstableTests.txt"),
            },
        }
    }
}

/// Verdicts of every applicable section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Reconciled unit tests, absent when no test data was found.
    pub unit_tests: Option<UnitTestReport>,
    /// Static analysis, absent when no report was produced.
    pub analysis: Option<AnalysisReport>,
    /// Style findings, absent when missing or unparsable.
    pub style: Option<StyleReport>,
}

impl Evaluation {
    /// Borrow the sections for rendering and publishing.
    pub fn sections(&self) -> ReportSections<'_> {
        ReportSections {
            unit_tests: self.unit_tests.as_ref(),
            analysis: self.analysis.as_ref(),
            style: self.style.as_ref(),
        }
    }

    /// Whether any present gate failed.
    pub fn failed(&self) -> bool {
        self.analysis.as_ref().map(|a| a.failed).unwrap_or(false)
            || self.unit_tests.as_ref().map(|u| u.failed).unwrap_or(false)
    }

    /// Sentinel tokens for the present gates, static analysis first.
    pub fn sentinels(&self) -> Vec<&'static str> {
        let mut tokens = Vec::new();
        if let Some(analysis) = &self.analysis {
            tokens.push(if analysis.failed {
                LINT_FAILED
            } else {
                LINT_SUCCEEDED
            });
        }
        if let Some(unit_tests) = &self.unit_tests {
            tokens.push(if unit_tests.failed {
                UNIT_FAILED
            } else {
                UNIT_SUCCEEDED
            });
        }
        tokens
    }
}

/// Evaluate every artifact in `layout`.
///
/// Missing optional artifacts make their section absent. A malformed analysis
/// report or corrupt test-result file is returned as an error.
pub fn evaluate<F: FileSystem + ?Sized>(
    fs: &F,
    layout: &ArtifactLayout,
    allow_list: &AllowList,
) -> Result<Evaluation> {
    let analysis = match load_analysis_report(fs, &layout.analysis_report, allow_list) {
        Artifact::Present(report) => Some(report),
        Artifact::Absent => None,
        Artifact::Malformed(reason) => {
            return Err(PrGateError::Other(format!(
                "malformed static analysis report {}: {reason}",
                layout.analysis_report.display()
            )));
        }
    };

    let style = load_style_report(fs, &layout.style_report, layout.style_fallback.as_deref());
    if let Artifact::Malformed(reason) = &style {
        error!("Was not able to parse the style report: {reason}");
    }
    let style = style.present();

    let unit_tests = match reconcile_test_runs(fs, &layout.tests) {
        Ok(report) => Some(report),
        Err(PrGateError::NoTestData) => {
            error!("No unit test results found; omitting unit test section");
            None
        }
        Err(err) => return Err(err),
    };

    let evaluation = Evaluation {
        unit_tests,
        analysis,
        style,
    };
    info!("Evaluation sentinels: {:?}", evaluation.sentinels());
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use std::io;
    use std::path::Path;

    fn not_found() -> PrGateError {
        io::Error::new(io::ErrorKind::NotFound, "missing").into()
    }

    #[test]
    fn default_layout_matches_ci_artifacts() {
        let layout = ArtifactLayout::default();
        assert_eq!(
            layout.analysis_report,
            Path::new("LatestPylint/pylintpy3Report.json")
        );
        assert_eq!(layout.tests.pattern, "*/nosetestspy3-*.xml");
    }

    #[test]
    fn nothing_present_yields_empty_evaluation() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string().returning(|_| Err(not_found()));
        fs.expect_find_files().returning(|_, _| Ok(Vec::new()));

        let evaluation =
            evaluate(&fs, &ArtifactLayout::default(), &AllowList::default()).expect("evaluation");

        assert_eq!(evaluation, Evaluation::default());
        assert!(!evaluation.failed());
        assert!(evaluation.sentinels().is_empty());
    }

    #[test]
    fn malformed_analysis_report_is_fatal() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .withf(|path| path.ends_with("pylintpy3Report.json"))
            .returning(|_| Ok("{".to_string()));

        let err = evaluate(&fs, &ArtifactLayout::default(), &AllowList::default()).unwrap_err();
        assert!(err.to_string().contains("malformed static analysis report"));
    }

    #[test]
    fn malformed_style_report_is_omitted() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .withf(|path| path.ends_with("pep8py3.txt"))
            .returning(|_| Ok("not a style line".to_string()));
        fs.expect_read_to_string().returning(|_| Err(not_found()));
        fs.expect_find_files().returning(|_, _| Ok(Vec::new()));

        let evaluation =
            evaluate(&fs, &ArtifactLayout::default(), &AllowList::default()).expect("evaluation");
        assert!(evaluation.style.is_none());
    }

    #[test]
    fn sentinels_follow_gate_verdicts() {
        let evaluation = Evaluation {
            unit_tests: Some(UnitTestReport {
                failed: true,
                ..UnitTestReport::default()
            }),
            analysis: Some(AnalysisReport {
                failed: false,
                summary: Default::default(),
                files: Vec::new(),
            }),
            style: None,
        };

        assert_eq!(evaluation.sentinels(), vec![LINT_SUCCEEDED, UNIT_FAILED]);
        assert!(evaluation.failed());
        assert!(evaluation.sections().style.is_none());
    }
}
