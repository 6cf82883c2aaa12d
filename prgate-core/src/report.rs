//! Assembly of the rendered pull-request report.

use log::warn;

use crate::analysis::{AllowList, AnalysisReport};
use crate::error::Result;
use crate::reconcile::UnitTestReport;
use crate::render::{
    AnalysisDetailContext, AnalysisSummaryContext, Renderer, StyleContext, Template,
    UnitTestContext, to_context,
};
use crate::style::StyleReport;

/// Sections available for the report; `None` marks a section as not applicable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportSections<'a> {
    /// Reconciled unit-test results.
    pub unit_tests: Option<&'a UnitTestReport>,
    /// Static-analysis results.
    pub analysis: Option<&'a AnalysisReport>,
    /// Style-checker findings.
    pub style: Option<&'a StyleReport>,
}

/// Render every present section in fixed order: unit tests, static analysis, style.
///
/// Failing to render the advisory style section drops that section; other render
/// failures are returned.
pub fn assemble_report<R: Renderer + ?Sized>(
    renderer: &R,
    sections: &ReportSections<'_>,
    allow_list: &AllowList,
) -> Result<String> {
    let mut output = String::new();

    if let Some(unit_tests) = sections.unit_tests {
        let context = to_context(&UnitTestContext::from_report(unit_tests))?;
        output.push_str(&renderer.render(Template::UnitTestSummary, &context)?);
    }

    if let Some(analysis) = sections.analysis {
        let summary = to_context(&AnalysisSummaryContext::from_report(analysis))?;
        output.push_str(&renderer.render(Template::AnalysisSummary, &summary)?);
        let detail = to_context(&AnalysisDetailContext::from_report(analysis, allow_list))?;
        output.push_str(&renderer.render(Template::AnalysisDetail, &detail)?);
    }

    if let Some(style) = sections.style {
        let rendered = to_context(&StyleContext::from_report(style))
            .and_then(|context| renderer.render(Template::StyleDetail, &context));
        match rendered {
            Ok(fragment) => output.push_str(&fragment),
            Err(err) => warn!("omitting style section: {err}"),
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parse_analysis_report;
    use crate::error::PrGateError;
    use crate::render::MockRenderer;
    use crate::style::parse_style_report;
    use mockall::Sequence;

    fn analysis() -> AnalysisReport {
        parse_analysis_report(
            r#"{"a.py": {"test": {"events": [[1, "C", "0103", "name"]], "score": 9.5}}}"#,
            &AllowList::default(),
        )
        .expect("analysis")
    }

    #[test]
    fn renders_sections_in_fixed_order() {
        let unit_tests = UnitTestReport::default();
        let analysis = analysis();
        let style = parse_style_report("c.py:1:[E1] m\n").expect("style");

        let mut renderer = MockRenderer::new();
        let mut sequence = Sequence::new();
        for (template, fragment) in [
            (Template::UnitTestSummary, "[unit]"),
            (Template::AnalysisSummary, "[summary]"),
            (Template::AnalysisDetail, "[detail]"),
            (Template::StyleDetail, "[style]"),
        ] {
            renderer
                .expect_render()
                .withf(move |requested, _| *requested == template)
                .times(1)
                .in_sequence(&mut sequence)
                .returning(move |_, _| Ok(fragment.to_string()));
        }

        let sections = ReportSections {
            unit_tests: Some(&unit_tests),
            analysis: Some(&analysis),
            style: Some(&style),
        };
        let html = assemble_report(&renderer, &sections, &AllowList::default()).expect("html");

        assert_eq!(html, "[unit][summary][detail][style]");
    }

    #[test]
    fn absent_sections_contribute_nothing() {
        let renderer = MockRenderer::new();
        let html = assemble_report(&renderer, &ReportSections::default(), &AllowList::default())
            .expect("html");
        assert!(html.is_empty());
    }

    #[test]
    fn style_render_failure_is_dropped() {
        let style = parse_style_report("c.py:1:[E1] m\n").expect("style");
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .returning(|_, _| Err(PrGateError::Render("template missing".to_string())));

        let sections = ReportSections {
            style: Some(&style),
            ..ReportSections::default()
        };
        let html = assemble_report(&renderer, &sections, &AllowList::default()).expect("html");
        assert!(html.is_empty());
    }

    #[test]
    fn gating_render_failure_propagates() {
        let analysis = analysis();
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .returning(|_, _| Err(PrGateError::Render("template missing".to_string())));

        let sections = ReportSections {
            analysis: Some(&analysis),
            ..ReportSections::default()
        };
        assert!(assemble_report(&renderer, &sections, &AllowList::default()).is_err());
    }

    #[test]
    fn passes_section_context_to_renderer() {
        let analysis = analysis();
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .withf(|template, context| {
                *template == Template::AnalysisSummary && context["files"][0]["filename"] == "a.py"
            })
            .returning(|_, _| Ok(String::new()));
        renderer
            .expect_render()
            .withf(|template, context| {
                *template == Template::AnalysisDetail
                    && context["allowedCodes"] == serde_json::json!(["0511", "0613", "0703"])
            })
            .returning(|_, _| Ok(String::new()));

        let sections = ReportSections {
            analysis: Some(&analysis),
            ..ReportSections::default()
        };
        assemble_report(&renderer, &sections, &AllowList::default()).expect("html");
    }
}
