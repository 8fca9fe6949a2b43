//! Enrollment acceptance policy.
//!
//! The canonical policy is [`EnrollmentPolicy::Strict`]: every critical
//! criterion passes, the overall score reaches the floor, and either enough
//! support criteria pass or the overall score is high. The
//! [`EnrollmentPolicy::Majority`] rule is the looser bulk-registration
//! alternate and only applies when configured.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{EnrollmentConfig, EnrollmentPolicy};
use crate::quality::{Criterion, QualityReport};

/// Why a photo was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptBasis {
    CriticalAndSupport,
    CriticalAndHighOverall,
    Majority,
}

/// Why a photo was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    CriticalFailed { failed: Vec<Criterion> },
    InsufficientSupport { overall: f64, high_overall: f64 },
    OverallBelowFloor { overall: f64, min_overall: f64 },
    TooFewPassed { passed: usize, required: usize },
    /// The photo passed quality checks but its embedding is empty or all zeros.
    UnusableEmbedding,
    EmbeddingLength { expected: usize, actual: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::CriticalFailed { failed } => {
                let labels: Vec<&str> = failed.iter().map(|c| c.label()).collect();
                write!(f, "critical criteria failed: {}", labels.join(", "))
            }
            RejectReason::InsufficientSupport { overall, high_overall } => write!(
                f,
                "insufficient support criteria and overall quality {overall:.2} below {high_overall:.2}"
            ),
            RejectReason::OverallBelowFloor { overall, min_overall } => {
                write!(f, "overall quality {overall:.2} below {min_overall:.2}")
            }
            RejectReason::TooFewPassed { passed, required } => {
                write!(f, "only {passed} criteria passed, {required} required")
            }
            RejectReason::UnusableEmbedding => f.write_str("embedding is empty or all zeros"),
            RejectReason::EmbeddingLength { expected, actual } => {
                write!(f, "embedding has {actual} values, expected {expected}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Accepted { basis: AcceptBasis },
    Rejected { reason: RejectReason },
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted { .. })
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            GateDecision::Accepted { .. } => None,
            GateDecision::Rejected { reason } => Some(reason),
        }
    }
}

/// Stateless accept/reject decision over a [`QualityReport`].
pub struct EnrollmentGate<'a> {
    config: &'a EnrollmentConfig,
}

impl<'a> EnrollmentGate<'a> {
    pub fn new(config: &'a EnrollmentConfig) -> Self {
        Self { config }
    }

    pub fn decide(&self, report: &QualityReport) -> GateDecision {
        let decision = match self.config.policy {
            EnrollmentPolicy::Strict => self.decide_strict(report),
            EnrollmentPolicy::Majority => self.decide_majority(report),
        };
        match &decision {
            GateDecision::Accepted { basis } => {
                tracing::info!(overall = report.overall_quality, ?basis, "photo accepted")
            }
            GateDecision::Rejected { reason } => {
                tracing::info!(overall = report.overall_quality, %reason, "photo rejected")
            }
        }
        decision
    }

    fn decide_strict(&self, report: &QualityReport) -> GateDecision {
        let cfg = self.config;
        let overall = report.overall_quality;

        let failed: Vec<Criterion> = cfg
            .critical
            .iter()
            .copied()
            .filter(|c| !report.passed(*c))
            .collect();
        if !failed.is_empty() {
            return GateDecision::Rejected {
                reason: RejectReason::CriticalFailed { failed },
            };
        }

        let support_passed = cfg.support.iter().filter(|c| report.passed(**c)).count();
        let high = overall >= cfg.high_overall;
        if support_passed < cfg.min_support_passed && !high {
            return GateDecision::Rejected {
                reason: RejectReason::InsufficientSupport {
                    overall,
                    high_overall: cfg.high_overall,
                },
            };
        }

        if overall < cfg.min_overall {
            return GateDecision::Rejected {
                reason: RejectReason::OverallBelowFloor {
                    overall,
                    min_overall: cfg.min_overall,
                },
            };
        }

        let basis = if support_passed >= cfg.min_support_passed {
            AcceptBasis::CriticalAndSupport
        } else {
            AcceptBasis::CriticalAndHighOverall
        };
        GateDecision::Accepted { basis }
    }

    fn decide_majority(&self, report: &QualityReport) -> GateDecision {
        let cfg = self.config;
        let overall = report.overall_quality;
        if overall < cfg.min_overall {
            return GateDecision::Rejected {
                reason: RejectReason::OverallBelowFloor {
                    overall,
                    min_overall: cfg.min_overall,
                },
            };
        }
        let passed = report.passed_count();
        if passed < cfg.majority_min_passed {
            return GateDecision::Rejected {
                reason: RejectReason::TooFewPassed {
                    passed,
                    required: cfg.majority_min_passed,
                },
            };
        }
        GateDecision::Accepted {
            basis: AcceptBasis::Majority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::{CriterionMetrics, CriterionResult, QualityCriteria, QualitySummary};

    /// A report with the given overall score and pass flags in canonical
    /// criterion order.
    fn report(overall: f64, passed: [bool; 5]) -> QualityReport {
        let r = |p: bool| CriterionResult::new(if p { 1.0 } else { 0.0 }, p, "", CriterionMetrics::Undetectable);
        let criteria = QualityCriteria {
            sharpness: r(passed[0]),
            eyes_open: r(passed[1]),
            face_angle: r(passed[2]),
            face_integrity: r(passed[3]),
            lighting: r(passed[4]),
        };
        let summary = QualitySummary::from_criteria(&criteria);
        QualityReport {
            overall_quality: overall,
            criteria,
            summary,
        }
    }

    fn strict() -> EnrollmentConfig {
        EnrollmentConfig::default()
    }

    #[test]
    fn test_below_floor_rejects_even_with_support() {
        let cfg = strict();
        let decision = EnrollmentGate::new(&cfg).decide(&report(0.5999, [true, true, true, true, false]));
        assert!(matches!(
            decision,
            GateDecision::Rejected {
                reason: RejectReason::OverallBelowFloor { .. }
            }
        ));
    }

    #[test]
    fn test_floor_without_support_rejects() {
        let cfg = strict();
        let decision = EnrollmentGate::new(&cfg).decide(&report(0.60, [true, false, true, true, false]));
        assert!(matches!(
            decision,
            GateDecision::Rejected {
                reason: RejectReason::InsufficientSupport { .. }
            }
        ));
    }

    #[test]
    fn test_high_overall_substitutes_for_support() {
        let cfg = strict();
        let decision = EnrollmentGate::new(&cfg).decide(&report(0.75, [true, false, true, true, false]));
        assert_eq!(
            decision,
            GateDecision::Accepted {
                basis: AcceptBasis::CriticalAndHighOverall
            }
        );
    }

    #[test]
    fn test_critical_and_support_accepts() {
        let cfg = strict();
        let decision = EnrollmentGate::new(&cfg).decide(&report(0.62, [true, false, true, true, true]));
        assert_eq!(
            decision,
            GateDecision::Accepted {
                basis: AcceptBasis::CriticalAndSupport
            }
        );
    }

    #[test]
    fn test_critical_failures_listed_first() {
        let cfg = strict();
        let decision = EnrollmentGate::new(&cfg).decide(&report(0.2, [false, false, true, false, false]));
        let Some(RejectReason::CriticalFailed { failed }) = decision.reason() else {
            panic!("unexpected decision {decision:?}");
        };
        assert_eq!(failed, &vec![Criterion::Sharpness, Criterion::FaceIntegrity]);
        assert_eq!(
            decision.reason().unwrap().to_string(),
            "critical criteria failed: Face sharpness, Face integrity"
        );
    }

    #[test]
    fn test_majority_policy() {
        let cfg = EnrollmentConfig {
            policy: EnrollmentPolicy::Majority,
            ..EnrollmentConfig::default()
        };
        let gate = EnrollmentGate::new(&cfg);

        // Sharpness fails, which the strict gate never tolerates.
        let decision = gate.decide(&report(0.65, [false, true, true, true, false]));
        assert_eq!(
            decision,
            GateDecision::Accepted {
                basis: AcceptBasis::Majority
            }
        );

        let decision = gate.decide(&report(0.65, [false, true, true, false, false]));
        assert_eq!(
            decision.reason(),
            Some(&RejectReason::TooFewPassed { passed: 2, required: 3 })
        );

        let decision = gate.decide(&report(0.59, [true; 5]));
        assert!(matches!(
            decision.reason(),
            Some(RejectReason::OverallBelowFloor { .. })
        ));
    }
}
