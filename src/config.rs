//src/config.rs

use crate::filter::{FilterCriteria, ReferenceLength};

pub const DEFAULT_MARKER: &str = "16S";
pub const DEFAULT_SEARCH_TOOL: &str = "mmseqs";

// Fractions, while percent identity is reported on a 0-100 scale, so these
// only reject hits below 0.9%.
pub const S1_MIN_PCT_ID: f64 = 0.90;
pub const S2_MIN_PCT_ID: f64 = 0.90;
pub const S1_MIN_LENGTH: u64 = 100;
pub const S2_MIN_LENGTH: u64 = 250;
pub const S2_MIN_LENGTH_PCT: f64 = 95.0;
pub const MAX_GAPS: u64 = 3;
pub const MAX_MISMATCH: u64 = 2;

/// Settings for stage 1: generic 16S references searched against bins,
/// reconciled with the gene finder.
///
/// Only percent identity and alignment length are checked by default. A
/// reference 16S covers a small share of a scaffold, so a length percentage
/// against the target would reject nearly every real hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateConfig {
    pub search_tool: String,
    pub allow_empty: bool,
    pub marker: String,
    pub criteria: FilterCriteria,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            search_tool: DEFAULT_SEARCH_TOOL.to_string(),
            allow_empty: false,
            marker: DEFAULT_MARKER.to_string(),
            criteria: FilterCriteria {
                min_alignment_length: Some(S1_MIN_LENGTH),
                min_percent_identity: Some(S1_MIN_PCT_ID),
                reference_length: ReferenceLength::Target,
                ..FilterCriteria::default()
            },
        }
    }
}

impl CandidateConfig {
    /// Drop every threshold.
    pub fn without_filters(mut self) -> Self {
        self.criteria = FilterCriteria {
            reference_length: ReferenceLength::Target,
            ..FilterCriteria::default()
        };
        self
    }
}

/// Settings for stage 2: ASVs searched against the candidate 16S sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    pub search_tool: String,
    pub allow_empty: bool,
    pub criteria: FilterCriteria,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            search_tool: DEFAULT_SEARCH_TOOL.to_string(),
            allow_empty: false,
            criteria: FilterCriteria {
                max_gap_openings: Some(MAX_GAPS),
                max_mismatches: Some(MAX_MISMATCH),
                min_alignment_length: Some(S2_MIN_LENGTH),
                min_percent_identity: Some(S2_MIN_PCT_ID),
                min_length_percent: Some(S2_MIN_LENGTH_PCT),
                reference_length: ReferenceLength::Query,
                end_overlap: None,
            },
        }
    }
}

impl MatchConfig {
    pub fn without_filters(mut self) -> Self {
        self.criteria = FilterCriteria {
            reference_length: ReferenceLength::Query,
            ..FilterCriteria::default()
        };
        self
    }
}
