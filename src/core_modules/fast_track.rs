// THEORY:
// The `fast_track` module scores whether upstream signals are already good
// enough to skip detailed per-region processing. It consumes the phase-0
// boundary detection (with its coverage ratio) and the closed-region
// analysis, and produces an auditable decision: every criterion it consults
// contributes a named tag and a 0-1 score, so a decision can always be traced
// back to the measurements behind it.
//
// Three conditions disqualify outright, with high confidence: no boundaries
// detected at all, no closed-region analysis available, and zero closed
// regions. Past those gates, eligibility demands agreement from at least two
// independent criteria (closure ratio, coverage ratio, layout simplicity) so
// a single flattering signal can never trigger the fast path on its own. An
// oversized image appends an additional ineligible signal but does not by
// itself zero out eligibility.

use log::debug;

use crate::core_modules::closed_region::ClosedRegionResult;
use crate::core_modules::zone::BoundaryHints;

/// Hard-disqualifier tags, reported with high confidence.
pub const INELIGIBLE_NO_BOUNDARIES: &str = "INELIGIBLE_NO_BOUNDARIES";
pub const INELIGIBLE_NO_CLOSED_REGION_DATA: &str = "INELIGIBLE_NO_CLOSED_REGION_DATA";
pub const INELIGIBLE_NO_CLOSED_REGIONS: &str = "INELIGIBLE_NO_CLOSED_REGIONS";

/// Thresholds for fast-track eligibility scoring.
#[derive(Debug, Clone)]
pub struct FastTrackConfig {
    /// Minimum closure ratio for the closure criterion to pass.
    pub min_closure_ratio: f64,
    /// Minimum boundary coverage ratio for the coverage criterion to pass.
    pub min_coverage_ratio: f64,
    /// A layout with more boundaries than this is too busy for the fast path.
    pub max_boundary_count: usize,
    /// Images with a larger dimension than this get an extra ineligible signal.
    pub max_image_dimension: u32,
}

impl Default for FastTrackConfig {
    fn default() -> Self {
        Self {
            min_closure_ratio: 0.5,
            min_coverage_ratio: 0.3,
            max_boundary_count: 50,
            max_image_dimension: 8192,
        }
    }
}

/// One scored criterion in a fast-track decision.
#[derive(Debug, Clone)]
pub struct Criterion {
    pub tag: String,
    pub score: f64,
    pub eligible: bool,
}

/// The outcome of fast-track evaluation. Read-only once constructed.
#[derive(Debug, Clone)]
pub struct FastTrackDecision {
    pub eligible: bool,
    pub confidence: f64,
    pub criteria: Vec<Criterion>,
}

impl FastTrackDecision {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.criteria.iter().any(|c| c.tag == tag)
    }

    fn disqualified(tag: &'static str) -> Self {
        Self {
            eligible: false,
            confidence: 0.95,
            criteria: vec![Criterion {
                tag: tag.to_string(),
                score: 0.0,
                eligible: false,
            }],
        }
    }
}

/// Scores whether detection quality is sufficient to skip detailed processing.
#[derive(Debug, Clone, Default)]
pub struct FastTrackEvaluator {
    config: FastTrackConfig,
}

impl FastTrackEvaluator {
    pub fn new(config: FastTrackConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        hints: &BoundaryHints,
        closed: Option<&ClosedRegionResult>,
        image_size: Option<(u32, u32)>,
    ) -> FastTrackDecision {
        // Hard requirements short-circuit with high confidence.
        if hints.polygons.is_empty() {
            return FastTrackDecision::disqualified(INELIGIBLE_NO_BOUNDARIES);
        }
        let Some(closed) = closed else {
            return FastTrackDecision::disqualified(INELIGIBLE_NO_CLOSED_REGION_DATA);
        };
        if closed.closed_region_count == 0 {
            return FastTrackDecision::disqualified(INELIGIBLE_NO_CLOSED_REGIONS);
        }

        let mut criteria = Vec::new();

        let closure = closed.closure_ratio;
        criteria.push(Criterion {
            tag: if closure >= self.config.min_closure_ratio {
                "CLOSURE_ELIGIBLE".to_string()
            } else {
                "CLOSURE_INELIGIBLE".to_string()
            },
            score: (closure / self.config.min_closure_ratio).min(1.0),
            eligible: closure >= self.config.min_closure_ratio,
        });

        let coverage = hints.coverage_ratio.unwrap_or(0.0);
        criteria.push(Criterion {
            tag: if coverage >= self.config.min_coverage_ratio {
                "COVERAGE_ELIGIBLE".to_string()
            } else {
                "COVERAGE_INELIGIBLE".to_string()
            },
            score: (coverage / self.config.min_coverage_ratio).min(1.0),
            eligible: coverage >= self.config.min_coverage_ratio,
        });

        let count = closed.total_boundary_count;
        let simple = count <= self.config.max_boundary_count;
        criteria.push(Criterion {
            tag: if simple {
                "BOUNDARY_COUNT_ELIGIBLE".to_string()
            } else {
                "BOUNDARY_COUNT_INELIGIBLE".to_string()
            },
            score: if count == 0 {
                1.0
            } else {
                (self.config.max_boundary_count as f64 / count as f64).min(1.0)
            },
            eligible: simple,
        });

        if let Some((w, h)) = image_size {
            if w.max(h) > self.config.max_image_dimension {
                criteria.push(Criterion {
                    tag: "IMAGE_TOO_LARGE".to_string(),
                    score: 0.0,
                    eligible: false,
                });
            }
        }

        let eligible_count = criteria.iter().filter(|c| c.eligible).count();
        let eligible = eligible_count >= 2;

        let confidence = if criteria.is_empty() {
            0.5
        } else {
            criteria.iter().map(|c| c.score).sum::<f64>() / criteria.len() as f64
        };

        debug!(
            "fast-track: eligible={eligible} ({eligible_count} passing criteria, confidence {confidence:.3})"
        );

        FastTrackDecision {
            eligible,
            confidence,
            criteria,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::closed_region::ClosedRegionResult;
    use crate::core_modules::geometry::Point;

    fn closed_result(closed: usize, total: usize) -> ClosedRegionResult {
        ClosedRegionResult {
            has_closed_regions: closed > 0,
            closed_region_count: closed,
            total_boundary_count: total,
            closure_ratio: if total == 0 { 0.0 } else { closed as f64 / total as f64 },
            regions: Vec::new(),
        }
    }

    fn hints(count: usize, coverage: Option<f64>) -> BoundaryHints {
        BoundaryHints {
            polygons: vec![vec![Point::new(0.0, 0.0)]; count],
            coverage_ratio: coverage,
        }
    }

    #[test]
    fn zero_boundaries_is_a_hard_disqualifier() {
        let evaluator = FastTrackEvaluator::default();
        let decision = evaluator.evaluate(&hints(0, None), Some(&closed_result(0, 0)), None);
        assert!(!decision.eligible);
        assert!(decision.has_tag(INELIGIBLE_NO_BOUNDARIES));
        assert!(decision.confidence >= 0.9);
    }

    #[test]
    fn missing_closed_region_data_is_a_hard_disqualifier() {
        let evaluator = FastTrackEvaluator::default();
        let decision = evaluator.evaluate(&hints(5, Some(0.5)), None, None);
        assert!(!decision.eligible);
        assert!(decision.has_tag(INELIGIBLE_NO_CLOSED_REGION_DATA));
    }

    #[test]
    fn zero_closed_regions_is_a_hard_disqualifier() {
        let evaluator = FastTrackEvaluator::default();
        let decision = evaluator.evaluate(&hints(5, Some(0.5)), Some(&closed_result(0, 5)), None);
        assert!(!decision.eligible);
        assert!(decision.has_tag(INELIGIBLE_NO_CLOSED_REGIONS));
        assert!(decision.confidence >= 0.9);
    }

    #[test]
    fn strong_signals_are_eligible() {
        let evaluator = FastTrackEvaluator::default();
        let decision = evaluator.evaluate(&hints(8, Some(0.6)), Some(&closed_result(7, 8)), None);
        assert!(decision.eligible);
        assert!(decision.has_tag("CLOSURE_ELIGIBLE"));
        assert!(decision.has_tag("COVERAGE_ELIGIBLE"));
        assert!(decision.has_tag("BOUNDARY_COUNT_ELIGIBLE"));
        assert!(decision.confidence > 0.9);
    }

    #[test]
    fn one_passing_criterion_is_not_enough() {
        let evaluator = FastTrackEvaluator::default();
        // Closure passes; coverage fails; the boundary count is too busy.
        let decision =
            evaluator.evaluate(&hints(80, Some(0.1)), Some(&closed_result(60, 80)), None);
        assert!(!decision.eligible);
        assert!(decision.has_tag("CLOSURE_ELIGIBLE"));
        assert!(decision.has_tag("COVERAGE_INELIGIBLE"));
        assert!(decision.has_tag("BOUNDARY_COUNT_INELIGIBLE"));
    }

    #[test]
    fn oversized_image_adds_signal_but_does_not_veto() {
        let evaluator = FastTrackEvaluator::default();
        let decision = evaluator.evaluate(
            &hints(8, Some(0.6)),
            Some(&closed_result(7, 8)),
            Some((20_000, 4_000)),
        );
        // Still two+ eligible criteria, so still eligible.
        assert!(decision.eligible);
        assert!(decision.has_tag("IMAGE_TOO_LARGE"));
        // But the extra zero score drags confidence down.
        let baseline = evaluator
            .evaluate(&hints(8, Some(0.6)), Some(&closed_result(7, 8)), None)
            .confidence;
        assert!(decision.confidence < baseline);
    }
}
