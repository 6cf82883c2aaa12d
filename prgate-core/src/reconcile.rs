//! Reconciliation of baseline and candidate unit-test runs.
//!
//! Both runs are collected into identity-keyed maps, joined with a full outer
//! join, and every differing record is classified into a [`Bucket`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{PrGateError, Result};
use crate::fs::FileSystem;
use crate::model::{Bucket, TestComparisonRecord, TestIdentity, TestOutcome, UnstableSet};
use crate::xunit::parse_xunit;

/// Outcomes of one run keyed by test identity.
pub type RunResults = BTreeMap<TestIdentity, TestOutcome>;

/// Where to find the test-result artifacts of both runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunLayout {
    /// Root directory of the baseline run artifacts.
    pub baseline_root: PathBuf,
    /// Root directory of the candidate run artifacts.
    pub candidate_root: PathBuf,
    /// Glob pattern, relative to each root, selecting xUnit files.
    pub pattern: String,
    /// File listing unstable tests, one `class:method` per line.
    pub unstable_list: PathBuf,
}

/// Per-bucket counts.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitTestSummary {
    /// Stable tests that started failing.
    pub new_failures: usize,
    /// Tests only in the candidate run.
    pub added: usize,
    /// Tests only in the baseline run.
    pub deleted: usize,
    /// Stable tests whose outcome changed without failing.
    pub ok_changes: usize,
    /// Unstable tests whose outcome changed.
    pub unstable_changes: usize,
}

/// Classified comparison between two test runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitTestReport {
    /// Whether the candidate run introduced failures.
    pub failed: bool,
    /// Stable tests that started failing.
    pub new_failures: Vec<TestComparisonRecord>,
    /// Stable tests whose outcome changed without failing.
    pub ok_changes: Vec<TestComparisonRecord>,
    /// Unstable tests whose outcome changed.
    pub unstable_changes: Vec<TestComparisonRecord>,
    /// Tests only in the candidate run.
    pub added: Vec<TestComparisonRecord>,
    /// Tests only in the baseline run.
    pub deleted: Vec<TestComparisonRecord>,
}

impl UnitTestReport {
    /// Count the records in each bucket.
    pub fn summary(&self) -> UnitTestSummary {
        UnitTestSummary {
            new_failures: self.new_failures.len(),
            added: self.added.len(),
            deleted: self.deleted.len(),
            ok_changes: self.ok_changes.len(),
            unstable_changes: self.unstable_changes.len(),
        }
    }

    /// Records in `bucket`, sorted by identity.
    pub fn bucket(&self, bucket: Bucket) -> &[TestComparisonRecord] {
        match bucket {
            Bucket::NewFailure => &self.new_failures,
            Bucket::OkChange => &self.ok_changes,
            Bucket::UnstableChange => &self.unstable_changes,
            Bucket::Added => &self.added,
            Bucket::Deleted => &self.deleted,
        }
    }

    fn push(&mut self, bucket: Bucket, record: TestComparisonRecord) {
        let target = match bucket {
            Bucket::NewFailure => &mut self.new_failures,
            Bucket::OkChange => &mut self.ok_changes,
            Bucket::UnstableChange => &mut self.unstable_changes,
            Bucket::Added => &mut self.added,
            Bucket::Deleted => &mut self.deleted,
        };
        target.push(record);
    }
}

/// Load both runs described by `layout` and reconcile them.
pub fn reconcile_test_runs<F: FileSystem + ?Sized>(
    fs: &F,
    layout: &TestRunLayout,
) -> Result<UnitTestReport> {
    info!("Evaluating baseline/candidate unit test reports");
    let unstable = load_unstable_set(fs, &layout.unstable_list);
    let baseline = collect_run(fs, &layout.baseline_root, &layout.pattern)?;
    let candidate = collect_run(fs, &layout.candidate_root, &layout.pattern)?;
    let report = reconcile(&baseline, &candidate, &unstable)?;
    info!("Unit test summary {:?}", report.summary());
    Ok(report)
}

/// Read the unstable-test list; a missing list is treated as empty.
pub fn load_unstable_set<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> UnstableSet {
    match fs.read_to_string(path) {
        Ok(text) => parse_unstable_list(&text),
        Err(err) => {
            warn!(
                "unable to open list of unstable tests {}: {err}",
                path.display()
            );
            UnstableSet::new()
        }
    }
}

/// Parse one `class:method` reference per line, skipping blanks and `#` comments.
pub fn parse_unstable_list(text: &str) -> UnstableSet {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let identity = TestIdentity::parse(line);
            if identity.is_none() {
                warn!("ignoring unstable test entry without class:method form: {line}");
            }
            identity
        })
        .collect()
}

/// Parse every xUnit file of one run; within the run the last-seen outcome wins.
pub fn collect_run<F: FileSystem + ?Sized>(
    fs: &F,
    root: &Path,
    pattern: &str,
) -> Result<RunResults> {
    debug!("Scanning directory {}", root.display());
    let mut results = RunResults::new();
    for path in fs.find_files(root, pattern)? {
        debug!("Opening file {}", path.display());
        let text = fs.read_to_string(&path)?;
        let cases = parse_xunit(&text).map_err(|err| match err {
            PrGateError::Xml(message) => {
                PrGateError::Xml(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        results.extend(cases);
    }
    Ok(results)
}

/// Join both runs and bucket every record.
///
/// Returns [`PrGateError::NoTestData`] when neither run has any results.
pub fn reconcile(
    baseline: &RunResults,
    candidate: &RunResults,
    unstable: &UnstableSet,
) -> Result<UnitTestReport> {
    let identities: BTreeSet<&TestIdentity> = baseline.keys().chain(candidate.keys()).collect();
    if identities.is_empty() {
        warn!("No unit test results found");
        return Err(PrGateError::NoTestData);
    }

    let mut report = UnitTestReport::default();
    for identity in identities {
        let record = TestComparisonRecord {
            identity: identity.clone(),
            baseline: baseline.get(identity).copied(),
            candidate: candidate.get(identity).copied(),
        };
        let Some(bucket) = classify(&record, unstable) else {
            continue;
        };
        if fails_build(bucket, &record) {
            report.failed = true;
        }
        report.push(bucket, record);
    }
    Ok(report)
}

/// Bucket for a single record, or `None` when nothing changed.
pub fn classify(record: &TestComparisonRecord, unstable: &UnstableSet) -> Option<Bucket> {
    match (record.baseline, record.candidate) {
        (Some(old), Some(new)) if old == new => None,
        (Some(_), Some(_)) if unstable.contains(&record.identity) => Some(Bucket::UnstableChange),
        (Some(_), Some(new)) if new.is_error_class() => Some(Bucket::NewFailure),
        (Some(_), Some(_)) => Some(Bucket::OkChange),
        (None, Some(_)) => Some(Bucket::Added),
        (Some(_), None) => Some(Bucket::Deleted),
        (None, None) => None,
    }
}

fn fails_build(bucket: Bucket, record: &TestComparisonRecord) -> bool {
    match bucket {
        Bucket::NewFailure => true,
        Bucket::Added => record
            .candidate
            .map(|outcome| outcome.is_error_class())
            .unwrap_or(false),
        Bucket::OkChange | Bucket::UnstableChange | Bucket::Deleted => false,
    }
}
