//! Human-readable quality report stored with every audit record.

use std::fmt::{self, Write};
use std::path::Path;

use crate::config::EnrollmentConfig;
use crate::gate::{AcceptBasis, GateDecision};
use crate::quality::{Criterion, QualityReport};

const RULE_WIDTH: usize = 55;

fn mark(passed: bool) -> &'static str {
    if passed {
        "[ok]"
    } else {
        "[x]"
    }
}

/// Render the audit text for one photo. `enrollment` supplies the
/// critical/support partition the decision was made under.
pub fn render_text(
    photo_path: &str,
    report: &QualityReport,
    decision: &GateDecision,
    enrollment: &EnrollmentConfig,
) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, photo_path, report, decision, enrollment);
    out
}

fn write_report(
    out: &mut String,
    photo_path: &str,
    report: &QualityReport,
    decision: &GateDecision,
    enrollment: &EnrollmentConfig,
) -> fmt::Result {
    let file_name = Path::new(photo_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| photo_path.to_string());

    writeln!(out, "PHOTO: {file_name}")?;
    writeln!(out, "{}\n", "=".repeat(RULE_WIDTH))?;

    write_block(
        out,
        report,
        &format!("CRITICAL CRITERIA (all {} must pass):", enrollment.critical.len()),
        &enrollment.critical,
    )?;
    write_block(
        out,
        report,
        &format!(
            "SUPPORT CRITERIA (at least {} of {} must pass):",
            enrollment.min_support_passed,
            enrollment.support.len()
        ),
        &enrollment.support,
    )?;

    let critical_passed = enrollment.critical.iter().filter(|c| report.passed(**c)).count();
    let support_passed = enrollment.support.iter().filter(|c| report.passed(**c)).count();

    writeln!(out, "TOTALS:")?;
    writeln!(out, "  criteria passed: {}/{}", report.passed_count(), Criterion::ALL.len())?;
    writeln!(out, "  overall quality: {:.2}/1.00\n", report.overall_quality)?;

    writeln!(out, "DECISION ANALYSIS:")?;
    writeln!(out, "  critical: {critical_passed}/{} passed", enrollment.critical.len())?;
    writeln!(out, "  support: {support_passed}/{} passed", enrollment.support.len())?;
    writeln!(out, "  overall: {}%\n", (report.overall_quality * 100.0) as u32)?;

    writeln!(out, "SCORES:")?;
    for (criterion, result) in report.criteria.iter() {
        writeln!(out, "  {:<15} {:.2} {}", criterion.name(), result.score, mark(result.passed))?;
    }
    writeln!(out)?;

    match decision {
        GateDecision::Accepted { basis } => {
            write!(out, "PHOTO ACCEPTED\n  basis: {}", basis_text(*basis))
        }
        GateDecision::Rejected { reason } => write!(out, "PHOTO REJECTED\n  reason: {reason}"),
    }
}

fn write_block(out: &mut String, report: &QualityReport, title: &str, criteria: &[Criterion]) -> fmt::Result {
    writeln!(out, "{title}")?;
    for criterion in criteria {
        let result = report.criteria.get(*criterion);
        writeln!(out, "  {}:", criterion.label())?;
        writeln!(out, "    {} {} (score {:.2})", mark(result.passed), result.message, result.score)?;
    }
    writeln!(out)
}

fn basis_text(basis: AcceptBasis) -> &'static str {
    match basis {
        AcceptBasis::CriticalAndSupport => "all critical criteria and enough support criteria passed",
        AcceptBasis::CriticalAndHighOverall => "all critical criteria passed with a high overall quality",
        AcceptBasis::Majority => "enough criteria passed with the overall quality above the floor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{EnrollmentGate, RejectReason};

    #[test]
    fn test_rejected_report_lists_failures() {
        let config = EnrollmentConfig::default();
        let report = QualityReport::undetectable();
        let decision = EnrollmentGate::new(&config).decide(&report);
        let text = render_text("/photos/class/ada.jpg", &report, &decision, &config);

        assert!(text.starts_with("PHOTO: ada.jpg\n"));
        assert!(text.contains("CRITICAL CRITERIA (all 3 must pass):"));
        assert!(text.contains("SUPPORT CRITERIA (at least 1 of 2 must pass):"));
        assert!(text.contains("[x] face not detected (score 0.00)"));
        assert!(text.contains("criteria passed: 0/5"));
        assert!(text.contains("PHOTO REJECTED"));
        assert!(text.ends_with(
            "reason: critical criteria failed: Face sharpness, Face angle, Face integrity"
        ));
    }

    #[test]
    fn test_sections_in_order() {
        let config = EnrollmentConfig::default();
        let report = QualityReport::undetectable();
        let decision = EnrollmentGate::new(&config).decide(&report);
        let text = render_text("a.jpg", &report, &decision, &config);

        let headings = [
            "PHOTO:",
            "CRITICAL CRITERIA",
            "SUPPORT CRITERIA",
            "TOTALS:",
            "DECISION ANALYSIS:",
            "SCORES:",
            "PHOTO REJECTED",
        ];
        let positions: Vec<usize> = headings
            .iter()
            .map(|h| text.find(h).unwrap_or_else(|| panic!("missing {h}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
        assert!(text.contains(&format!("{}\n\nCRITICAL", "=".repeat(RULE_WIDTH))));
        assert_eq!(text.matches("[x]").count(), 10);
    }

    #[test]
    fn test_accepted_report_names_basis() {
        let config = EnrollmentConfig::default();
        let report = QualityReport::undetectable();
        let decision = GateDecision::Accepted {
            basis: AcceptBasis::CriticalAndHighOverall,
        };
        let text = render_text("b.jpg", &report, &decision, &config);
        assert!(text.contains("PHOTO ACCEPTED"));
        assert!(text.contains("high overall quality"));

        let rejected = GateDecision::Rejected {
            reason: RejectReason::OverallBelowFloor {
                overall: 0.5,
                min_overall: 0.6,
            },
        };
        let text = render_text("b.jpg", &report, &rejected, &config);
        assert!(text.ends_with("reason: overall quality 0.50 below 0.60"));
    }
}
