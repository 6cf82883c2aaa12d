//! xUnit XML test-result parsing.

use crate::error::{PrGateError, Result};
use crate::model::{TestIdentity, TestOutcome};

/// Extract every `testcase` in an xUnit document with its outcome, in document order.
pub fn parse_xunit(text: &str) -> Result<Vec<(TestIdentity, TestOutcome)>> {
    let document =
        roxmltree::Document::parse(text).map_err(|err| PrGateError::Xml(err.to_string()))?;

    let mut cases = Vec::new();
    for node in document
        .descendants()
        .filter(|node| node.has_tag_name("testcase"))
    {
        let name = node.attribute("name").ok_or_else(|| {
            let position = document.text_pos_at(node.range().start);
            PrGateError::Xml(format!("testcase without name at {position}"))
        })?;
        let class_name = node.attribute("classname").unwrap_or_default();
        let outcome = node
            .children()
            .filter(|child| child.is_element())
            .find_map(|child| match child.tag_name().name() {
                "failure" => Some(TestOutcome::Failure),
                "error" => Some(TestOutcome::Error),
                "skipped" => Some(TestOutcome::Skipped),
                _ => None,
            })
            .unwrap_or(TestOutcome::Pass);
        cases.push((TestIdentity::new(class_name, name), outcome));
    }
    Ok(cases)
}
