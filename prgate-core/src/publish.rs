//! Publishing of CI verdicts to a pull-request tracker.
//!
//! The [`Tracker`] trait is the seam to the hosting platform. [`Publisher`]
//! composes the summary message and decides which statuses and comments to
//! send for a resolved [`IssueTarget`].

use std::fmt::Write;

use log::info;

use crate::error::{PrGateError, Result};
use crate::render::{ANALYSIS_ANCHOR, UNIT_TEST_ANCHOR};
use crate::report::ReportSections;

/// Status context label for the static-analysis gate.
pub const ANALYSIS_CONTEXT: &str = "Pylint";
/// Status context label for the unit-test gate.
pub const UNIT_TEST_CONTEXT: &str = "Unit tests";
/// Path of the rendered report below the CI build URL.
pub const REPORT_ARTIFACT_PATH: &str = "artifact/artifacts/PullRequestReport.html";

/// Commit status states understood by the tracker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommitState {
    /// Checks are running.
    Pending,
    /// Checks passed.
    Success,
    /// Checks failed.
    Failure,
}

impl CommitState {
    /// State for a finished gate.
    pub fn from_failed(failed: bool) -> Self {
        if failed { Self::Failure } else { Self::Success }
    }

    /// API label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// A commit status to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStatus {
    /// Status state.
    pub state: CommitState,
    /// Link shown next to the status.
    pub target_url: String,
    /// Short description.
    pub description: String,
    /// Context label distinguishing this status from others on the commit.
    pub context: String,
}

/// Client for the pull-request tracking system.
#[cfg_attr(test, mockall::automock)]
pub trait Tracker {
    /// Attach a status to the commit `sha`.
    fn set_commit_status(&self, sha: &str, status: &CommitStatus) -> Result<()>;
    /// Post a comment on an issue or pull request.
    fn post_comment(&self, issue: u64, body: &str) -> Result<()>;
    /// Return the head commit SHA of a pull request.
    fn latest_pull_commit(&self, pull: u64) -> Result<String>;
}

/// The issue or pull request a run reports to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IssueTarget {
    /// A pull-request build.
    PullRequest(u64),
    /// A scheduled build reporting to a tracking issue.
    Daily(u64),
}

impl IssueTarget {
    /// Resolve the target from the pull-request id, falling back to the tracking issue id.
    pub fn resolve(pull_request: Option<u64>, target_issue: Option<u64>) -> Result<Self> {
        match (pull_request, target_issue) {
            (Some(pull), _) => Ok(Self::PullRequest(pull)),
            (None, Some(issue)) => Ok(Self::Daily(issue)),
            (None, None) => Err(PrGateError::Config(
                "neither a pull request id nor a target issue id is configured".to_string(),
            )),
        }
    }

    /// Issue number shared by issues and pull requests.
    pub fn number(&self) -> u64 {
        match self {
            Self::PullRequest(number) | Self::Daily(number) => *number,
        }
    }
}

/// When the summary message may be posted as a comment.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CommentPolicy {
    /// Whether comment posting is enabled at all.
    pub enabled: bool,
    /// Restrict posting to a single issue number.
    pub allowed_issue: Option<u64>,
}

impl CommentPolicy {
    /// Whether a comment may be posted on `target`.
    pub fn allows(&self, target: IssueTarget) -> bool {
        self.enabled
            && self
                .allowed_issue
                .map(|allowed| allowed == target.number())
                .unwrap_or(true)
    }
}

/// What a publish run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Number of commit statuses set.
    pub statuses: usize,
    /// Whether the summary comment was posted.
    pub comment_posted: bool,
}

/// Derive the report URL from a CI build URL.
pub fn report_url(build_url: &str) -> String {
    let mut url = build_url.replace("jenkins/job", "jenkins/view/All/job");
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(REPORT_ARTIFACT_PATH);
    url
}

/// Compose the summary message for the present sections.
///
/// Only non-zero counts are mentioned.
pub fn compose_message(sections: &ReportSections<'_>, report_url: &str) -> String {
    let mut message = String::from("CI results:\n");

    if let Some(unit_tests) = sections.unit_tests {
        let summary = unit_tests.summary();
        let _ = writeln!(message, " * Unit tests: {}", status_label(unit_tests.failed));
        append_count(&mut message, summary.new_failures, "new failures");
        append_count(&mut message, summary.deleted, "tests deleted");
        append_count(&mut message, summary.ok_changes, "tests no longer failing");
        append_count(&mut message, summary.added, "tests added");
        append_count(&mut message, summary.unstable_changes, "changes in unstable tests");
    }

    if let Some(analysis) = sections.analysis {
        let summary = analysis.summary;
        let _ = writeln!(message, " * Pylint check: {}", status_label(analysis.failed));
        append_count(
            &mut message,
            summary.failures,
            "warnings and errors that must be fixed",
        );
        append_count(&mut message, summary.warnings, "warnings");
        append_count(&mut message, summary.comments, "comments to review");
    }

    if let Some(style) = sections.style {
        let _ = writeln!(message, " * Pycodestyle check: {}", status_label(style.failed()));
        append_count(&mut message, style.comments, "comments to review");
    }

    let _ = writeln!(message, "\nDetails at {report_url}");
    message
}

fn append_count(message: &mut String, count: usize, label: &str) {
    if count > 0 {
        let _ = writeln!(message, "   * {count} {label}");
    }
}

fn status_label(failed: bool) -> &'static str {
    if failed { "failed" } else { "succeeded" }
}

/// Publishes verdicts for one resolved target.
pub struct Publisher<'a, T: Tracker + ?Sized> {
    tracker: &'a T,
    target: IssueTarget,
    comments: CommentPolicy,
}

impl<'a, T: Tracker + ?Sized> Publisher<'a, T> {
    /// Create a publisher for `target`.
    pub fn new(tracker: &'a T, target: IssueTarget, comments: CommentPolicy) -> Self {
        Self {
            tracker,
            target,
            comments,
        }
    }

    /// Publish gate statuses and, if allowed, the summary comment.
    ///
    /// `timestamp` is embedded in status descriptions.
    pub fn publish(
        &self,
        sections: &ReportSections<'_>,
        report_url: &str,
        timestamp: &str,
    ) -> Result<PublishOutcome> {
        let mut outcome = PublishOutcome {
            statuses: self.publish_statuses(sections, report_url, timestamp)?,
            comment_posted: false,
        };

        if self.comments.allows(self.target) {
            let message = compose_message(sections, report_url);
            self.tracker.post_comment(self.target.number(), &message)?;
            outcome.comment_posted = true;
        } else {
            info!(
                "comment posting not enabled for issue {}; skipping comment",
                self.target.number()
            );
        }
        Ok(outcome)
    }

    fn publish_statuses(
        &self,
        sections: &ReportSections<'_>,
        report_url: &str,
        timestamp: &str,
    ) -> Result<usize> {
        let mut statuses = Vec::new();
        if let Some(analysis) = sections.analysis {
            statuses.push((ANALYSIS_CONTEXT, ANALYSIS_ANCHOR, analysis.failed));
        }
        if let Some(unit_tests) = sections.unit_tests {
            statuses.push((UNIT_TEST_CONTEXT, UNIT_TEST_ANCHOR, unit_tests.failed));
        }
        if statuses.is_empty() {
            return Ok(0);
        }
        let Some(sha) = self.head_commit()? else {
            return Ok(0);
        };
        for (context, anchor, failed) in &statuses {
            let status = CommitStatus {
                state: CommitState::from_failed(*failed),
                target_url: format!("{report_url}#{anchor}"),
                description: format!("Finished at {timestamp}"),
                context: context.to_string(),
            };
            self.tracker.set_commit_status(&sha, &status)?;
        }
        Ok(statuses.len())
    }

    /// Mark every gate as pending at the start of a CI run.
    pub fn begin(&self, build_url: &str, timestamp: &str) -> Result<PublishOutcome> {
        let mut outcome = PublishOutcome::default();
        let Some(sha) = self.head_commit()? else {
            return Ok(outcome);
        };
        for context in [ANALYSIS_CONTEXT, UNIT_TEST_CONTEXT] {
            let status = CommitStatus {
                state: CommitState::Pending,
                target_url: build_url.to_string(),
                description: format!("Tests started at {timestamp}"),
                context: context.to_string(),
            };
            self.tracker.set_commit_status(&sha, &status)?;
            outcome.statuses += 1;
        }
        Ok(outcome)
    }

    fn head_commit(&self) -> Result<Option<String>> {
        match self.target {
            IssueTarget::PullRequest(pull) => self.tracker.latest_pull_commit(pull).map(Some),
            IssueTarget::Daily(issue) => {
                info!("issue {issue} is not a pull request; skipping commit statuses");
                Ok(None)
            }
        }
    }
}
