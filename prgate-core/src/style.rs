//! Style-checker report parsing.
//!
//! Style findings are advisory: they are rendered but never fail the build.

use std::collections::BTreeMap;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::artifact::{self, Artifact};
use crate::error::{PrGateError, Result};
use crate::fs::FileSystem;
use crate::model::StyleFinding;

/// Parsed style-checker report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleReport {
    /// Findings grouped by file, in encounter order within each file.
    pub files: BTreeMap<String, Vec<StyleFinding>>,
    /// Total number of findings.
    pub comments: usize,
}

impl StyleReport {
    /// Style reports never gate the build.
    pub fn failed(&self) -> bool {
        false
    }
}

/// Load the style report, falling back to `fallback` when `primary` is missing.
///
/// A malformed report is logged and surfaces as [`Artifact::Malformed`]; it does not
/// trigger the fallback.
pub fn load_style_report<F: FileSystem + ?Sized>(
    fs: &F,
    primary: &Path,
    fallback: Option<&Path>,
) -> Artifact<StyleReport> {
    info!("Evaluating style report {}", primary.display());
    let report = artifact::load(fs, primary, parse_style_report);
    match (report, fallback) {
        (Artifact::Absent, Some(fallback)) => {
            info!(
                "style report {} missing, trying {}",
                primary.display(),
                fallback.display()
            );
            artifact::load(fs, fallback, parse_style_report)
        }
        (report, _) => report,
    }
}

/// Parse a line-oriented style report of `file:line:[CODE] message` entries.
pub fn parse_style_report(text: &str) -> Result<StyleReport> {
    let mut report = StyleReport::default();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let finding = parse_line(line).map_err(|err| {
            warn!("unable to parse style report line {}: {line}", index + 1);
            err
        })?;
        report.comments += 1;
        report
            .files
            .entry(finding.filename.clone())
            .or_default()
            .push(finding);
    }
    Ok(report)
}

fn parse_line(line: &str) -> Result<StyleFinding> {
    let mut parts = line.splitn(3, ':');
    let (Some(filename), Some(line_ref), Some(rest)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed(line, "expected file:line:message"));
    };
    let rest = rest.trim_start().trim_start_matches('[');
    let (code, message) = rest
        .split_once("] ")
        .ok_or_else(|| malformed(line, "missing [CODE] marker"))?;
    Ok(StyleFinding {
        filename: filename.to_string(),
        line: line_ref.to_string(),
        code: code.to_string(),
        message: message.trim_end().to_string(),
    })
}

fn malformed(line: &str, detail: &str) -> PrGateError {
    PrGateError::Other(format!("malformed style line ({detail}): {line}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use std::io;

    #[test]
    fn parses_single_finding() {
        let report = parse_style_report("c.py:12:[E501] line too long\n").expect("parse");

        assert!(!report.failed());
        assert_eq!(report.comments, 1);
        assert_eq!(
            report.files["c.py"],
            vec![StyleFinding {
                filename: "c.py".to_string(),
                line: "12".to_string(),
                code: "E501".to_string(),
                message: "line too long".to_string(),
            }]
        );
    }

    #[test]
    fn keeps_encounter_order_within_file_and_columns_in_message() {
        let report = parse_style_report(
            "b.py:9:[W291] trailing whitespace\n\
             a.py:1:[E302] expected 2 blank lines\n\
             b.py:3:[E225] missing whitespace: around operator\n",
        )
        .expect("parse");

        assert_eq!(report.comments, 3);
        let codes: Vec<&str> = report.files["b.py"]
            .iter()
            .map(|finding| finding.code.as_str())
            .collect();
        assert_eq!(codes, vec!["W291", "E225"]);
        assert_eq!(
            report.files["b.py"][1].message,
            "missing whitespace: around operator"
        );
        assert_eq!(report.files.keys().next().map(String::as_str), Some("a.py"));
    }

    #[test]
    fn malformed_line_aborts_whole_report() {
        assert!(parse_style_report("c.py:12:[E501] ok\nbroken line\n").is_err());
        assert!(parse_style_report("c.py:12:no code marker\n").is_err());
    }

    #[test]
    fn blank_lines_are_ignored() {
        let report = parse_style_report("\nc.py:1:[E1] m\n\n").expect("parse");
        assert_eq!(report.comments, 1);
    }

    #[test]
    fn falls_back_when_primary_missing() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .withf(|path| path == Path::new("pep8py3.txt"))
            .returning(|_| Err(io::Error::new(io::ErrorKind::NotFound, "missing").into()));
        fs.expect_read_to_string()
            .withf(|path| path == Path::new("pep8.txt"))
            .returning(|_| Ok("c.py:12:[E501] line too long\n".to_string()));

        let report = load_style_report(
            &fs,
            Path::new("pep8py3.txt"),
            Some(Path::new("pep8.txt")),
        );
        assert_eq!(report.present().map(|r| r.comments), Some(1));
    }

    #[test]
    fn malformed_primary_does_not_fall_back() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .withf(|path| path == Path::new("pep8py3.txt"))
            .times(1)
            .returning(|_| Ok("garbage".to_string()));

        let report = load_style_report(
            &fs,
            Path::new("pep8py3.txt"),
            Some(Path::new("pep8.txt")),
        );
        assert!(matches!(report, Artifact::Malformed(_)));
    }

    #[test]
    fn absent_without_fallback() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .returning(|_| Err(io::Error::new(io::ErrorKind::NotFound, "missing").into()));

        let report = load_style_report(&fs, Path::new("pep8py3.txt"), None);
        assert!(matches!(report, Artifact::Absent));
    }
}
