//src/filter.rs

use crate::error::{JoinError, Result};
use crate::types::AlignmentRecord;

/// How far (in positions) an alignment may stop short of a sequence end and
/// still count as reaching it.
pub const END_TOLERANCE: i64 = 5;

/// Which length `min_length_pct` is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceLength {
    /// Scaffold length; used when generic 16S references are searched
    /// against bin scaffolds.
    #[default]
    Target,
    /// Query length; used when ASVs are searched against candidate 16S.
    Query,
}

/// Thresholds for alignments that may run off a scaffold end.
///
/// An end-overlap alignment only needs `min_length_with_overlap`; any other
/// alignment also needs `percent_identity >= min_length_pct_no_overlap`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndOverlapRule {
    pub min_length_with_overlap: u64,
    pub min_length_pct_no_overlap: f64,
}

/// A conjunction of optional predicates. Unset fields are not evaluated, so
/// `FilterCriteria::default()` keeps everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub max_gap_openings: Option<u64>,
    pub max_mismatches: Option<u64>,
    pub min_alignment_length: Option<u64>,
    pub min_percent_identity: Option<f64>,
    pub min_length_percent: Option<f64>,
    pub reference_length: ReferenceLength,
    pub end_overlap: Option<EndOverlapRule>,
}

impl FilterCriteria {
    pub fn with_end_overlap(mut self, min_length_with_overlap: u64, min_length_pct_no_overlap: f64) -> Self {
        self.end_overlap = Some(EndOverlapRule {
            min_length_with_overlap,
            min_length_pct_no_overlap,
        });
        self
    }

    pub fn is_identity(&self) -> bool {
        *self == FilterCriteria {
            reference_length: self.reference_length,
            ..FilterCriteria::default()
        }
    }

    /// Whether `rec` satisfies every active predicate.
    pub fn accepts(&self, rec: &AlignmentRecord) -> Result<bool> {
        if let Some(max) = self.max_gap_openings {
            if rec.gap_openings > max {
                return Ok(false);
            }
        }
        if let Some(max) = self.max_mismatches {
            if rec.mismatch_count > max {
                return Ok(false);
            }
        }
        if let Some(min) = self.min_alignment_length {
            if rec.alignment_length < min {
                return Ok(false);
            }
        }
        if let Some(min) = self.min_percent_identity {
            if rec.percent_identity < min {
                return Ok(false);
            }
        }
        if let Some(min) = self.min_length_percent {
            let reference = match self.reference_length {
                ReferenceLength::Target => rec.target_length,
                ReferenceLength::Query => rec.query_length,
            };
            let pct = (rec.alignment_length as f64 / reference as f64) * 100.0;
            if pct < min {
                return Ok(false);
            }
        }
        if let Some(rule) = self.end_overlap {
            let long_enough = rec.alignment_length >= rule.min_length_with_overlap;
            let keep = if is_end_overlap(rec)? {
                long_enough
            } else {
                // Compared against percent identity, not a length percentage.
                rec.percent_identity >= rule.min_length_pct_no_overlap && long_enough
            };
            if !keep {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn near(a: u64, b: u64) -> bool {
    (a as i64 - b as i64).abs() <= END_TOLERANCE
}

/// Whether the alignment reaches an end of both the query and the target,
/// meaning the gene likely continues past a scaffold boundary.
///
/// Equal query and target lengths are always treated as overlapping.
pub fn is_end_overlap(rec: &AlignmentRecord) -> Result<bool> {
    if rec.query_length == rec.target_length {
        return Ok(true);
    }
    if rec.target_start >= rec.target_end {
        return Err(JoinError::DataIntegrity(format!(
            "alignment of {} on {} has target start {} not before target end {}",
            rec.query_id, rec.target_id, rec.target_start, rec.target_end
        )));
    }

    let target_runs_to_end = near(rec.target_end, rec.target_length);
    let target_from_start = rec.target_start as i64 <= END_TOLERANCE;

    let overlap = if rec.is_reverse_query() {
        (near(rec.query_start, rec.query_length) && target_runs_to_end)
            || (rec.query_end as i64 <= END_TOLERANCE && target_from_start)
    } else {
        (rec.query_start as i64 <= END_TOLERANCE && target_runs_to_end)
            || (near(rec.query_end, rec.query_length) && target_from_start)
    };
    Ok(overlap)
}

/// Keep the records that pass `criteria`, preserving order.
pub fn filter_alignment_stats(
    records: Vec<AlignmentRecord>,
    criteria: &FilterCriteria,
) -> Result<Vec<AlignmentRecord>> {
    if criteria.is_identity() {
        return Ok(records);
    }
    let before = records.len();
    let mut kept = Vec::with_capacity(before);
    for rec in records {
        if criteria.accepts(&rec)? {
            kept.push(rec);
        }
    }
    log::debug!("Filter kept {} of {} alignment records", kept.len(), before);
    Ok(kept)
}
