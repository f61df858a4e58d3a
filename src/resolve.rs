//src/resolve.rs

use std::cmp::Ordering;

use ahash::AHashMap;

use crate::types::{AlignmentRecord, GeneFinderHit};

/// Which end of the score range is best.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOrder {
    /// Lower is better (e-values).
    Ascending,
    /// Higher is better (bit scores).
    Descending,
}

/// Something that claims a region of a target sequence with a priority.
pub trait Candidate {
    fn target_id(&self) -> &str;
    /// 0-based half-open `[start, end)` on the target.
    fn interval(&self) -> (u64, u64);
    /// `None` ranks after every real score.
    fn score(&self) -> Option<f64>;
}

impl Candidate for AlignmentRecord {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    fn interval(&self) -> (u64, u64) {
        self.target_interval()
    }

    /// Alignment hits compete on bit score.
    fn score(&self) -> Option<f64> {
        Some(self.bit_score)
    }
}

impl Candidate for GeneFinderHit {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    /// GFF coordinates are 1-based inclusive.
    fn interval(&self) -> (u64, u64) {
        let lo = self.start.min(self.end);
        let hi = self.start.max(self.end);
        (lo.saturating_sub(1), hi)
    }

    fn score(&self) -> Option<f64> {
        self.score
    }
}

pub(crate) fn overlaps(a: (u64, u64), b: (u64, u64)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

fn compare_scores(a: Option<f64>, b: Option<f64>, order: ScoreOrder) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            match order {
                ScoreOrder::Ascending => ord,
                ScoreOrder::Descending => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Greedy best-first selection of non-overlapping candidates per target.
///
/// Candidates are stably sorted best-first and accepted unless they overlap
/// one already accepted on the same target. Exact score ties keep input
/// order. The result is in acceptance (best-first) order.
pub fn resolve_duplicates<T: Candidate>(candidates: Vec<T>, order: ScoreOrder) -> Vec<T> {
    let total = candidates.len();
    let mut sorted = candidates;
    sorted.sort_by(|a, b| compare_scores(a.score(), b.score(), order));

    let mut accepted_spans: AHashMap<String, Vec<(u64, u64)>> = AHashMap::new();
    let mut accepted = Vec::with_capacity(sorted.len());

    for cand in sorted {
        let span = cand.interval();
        let spans = accepted_spans.entry(cand.target_id().to_string()).or_default();
        if spans.iter().any(|&kept| overlaps(kept, span)) {
            continue;
        }
        spans.push(span);
        accepted.push(cand);
    }

    if accepted.len() < total {
        log::debug!(
            "Duplicate resolution dropped {} of {} overlapping candidates",
            total - accepted.len(),
            total
        );
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Span {
        name: &'static str,
        target: &'static str,
        start: u64,
        end: u64,
        score: Option<f64>,
    }

    impl Candidate for Span {
        fn target_id(&self) -> &str {
            self.target
        }
        fn interval(&self) -> (u64, u64) {
            (self.start, self.end)
        }
        fn score(&self) -> Option<f64> {
            self.score
        }
    }

    fn span(name: &'static str, target: &'static str, start: u64, end: u64, score: f64) -> Span {
        Span { name, target, start, end, score: Some(score) }
    }

    fn names(spans: &[Span]) -> Vec<&'static str> {
        spans.iter().map(|s| s.name).collect()
    }

    fn candidates() -> Vec<Span> {
        vec![
            span("a", "t1", 0, 100, 50.0),
            span("b", "t1", 50, 150, 80.0),
            span("c", "t1", 140, 300, 60.0),
            span("d", "t2", 0, 100, 10.0),
            span("e", "t1", 300, 400, 5.0),
        ]
    }

    #[test]
    fn test_descending_keeps_highest_scores() {
        let out = resolve_duplicates(candidates(), ScoreOrder::Descending);
        assert_eq!(names(&out), vec!["b", "d", "e"]);
    }

    #[test]
    fn test_ascending_keeps_lowest_scores() {
        let out = resolve_duplicates(candidates(), ScoreOrder::Ascending);
        assert_eq!(names(&out), vec!["e", "d", "a", "c"]);
    }

    #[test]
    fn test_resolved_output_never_overlaps_on_a_target() {
        for order in [ScoreOrder::Ascending, ScoreOrder::Descending] {
            let out = resolve_duplicates(candidates(), order);
            for (i, x) in out.iter().enumerate() {
                for y in &out[i + 1..] {
                    if x.target == y.target {
                        assert!(!overlaps(x.interval(), y.interval()), "{} overlaps {}", x.name, y.name);
                    }
                }
            }
        }
    }

    #[test]
    fn test_adjacent_half_open_intervals_both_survive() {
        let out = resolve_duplicates(
            vec![span("x", "t", 0, 10, 1.0), span("y", "t", 10, 20, 2.0)],
            ScoreOrder::Descending,
        );
        assert_eq!(names(&out), vec!["y", "x"]);
    }

    #[test]
    fn test_ties_resolved_by_input_order() {
        let out = resolve_duplicates(
            vec![span("first", "t", 0, 10, 3.0), span("second", "t", 5, 15, 3.0)],
            ScoreOrder::Ascending,
        );
        assert_eq!(names(&out), vec!["first"]);
    }

    #[test]
    fn test_missing_scores_rank_last() {
        let mut unscored = span("unscored", "t", 0, 10, 0.0);
        unscored.score = None;
        let out = resolve_duplicates(
            vec![unscored, span("scored", "t", 5, 15, 1e9)],
            ScoreOrder::Ascending,
        );
        assert_eq!(names(&out), vec!["scored"]);
    }

    #[test]
    fn test_gff_hits_use_one_based_inclusive_coordinates() {
        let hit = GeneFinderHit {
            target_id: "scaf".to_string(),
            feature_type: "rRNA".to_string(),
            start: 11,
            end: 20,
            score: Some(1e-200),
            strand: '+',
            attributes: String::new(),
        };
        assert_eq!(hit.interval(), (10, 20));
    }
}
