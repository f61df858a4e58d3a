//src/types.rs

use crate::reformat::SearchTool;

/// One row of BLAST/MMseqs2 tabular output in the 14-column layout
/// `qseqid sseqid pident length mismatch gapopen qstart qend sstart send evalue bitscore qlen slen`.
///
/// Positions are 1-based and inclusive. The target is never reported
/// reverse-complemented, while `query_start > query_end` marks a query that
/// aligned on the reverse strand.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub query_id: String,
    pub target_id: String,
    pub percent_identity: f64,
    pub alignment_length: u64,
    pub mismatch_count: u64,
    pub gap_openings: u64,
    pub query_start: u64,
    pub query_end: u64,
    pub target_start: u64,
    pub target_end: u64,
    pub e_value: f64,
    pub bit_score: f64,
    pub query_length: u64,
    pub target_length: u64,
}

impl AlignmentRecord {
    /// Target span as a 0-based half-open interval.
    pub fn target_interval(&self) -> (u64, u64) {
        let lo = self.target_start.min(self.target_end);
        let hi = self.target_start.max(self.target_end);
        (lo.saturating_sub(1), hi)
    }

    pub fn is_reverse_query(&self) -> bool {
        self.query_start > self.query_end
    }
}

/// A FASTA entry keyed by the first whitespace-delimited token of its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub header: String,
    pub residues: String,
}

impl SequenceRecord {
    /// Copy out `[start, end)` (0-based) as a new record with the same header.
    /// Returns `None` when the range does not fit the sequence.
    pub fn slice(&self, start: usize, end: usize) -> Option<SequenceRecord> {
        if start > end || end > self.residues.len() {
            return None;
        }
        Some(SequenceRecord {
            header: self.header.clone(),
            residues: self.residues.get(start..end)?.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

/// One row of gene-finder GFF output.
///
/// `start`/`end` are kept exactly as written (1-based inclusive);
/// `score` is `None` when the column holds `.`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneFinderHit {
    pub target_id: String,
    pub feature_type: String,
    pub start: u64,
    pub end: u64,
    pub score: Option<f64>,
    pub strand: char,
    pub attributes: String,
}

/// One or more gene-finder fragments on a target joined into a single span.
/// `start`/`stop` are 0-based half-open, so `stop - start == residues.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedInterval {
    pub target_id: String,
    pub start: u64,
    pub stop: u64,
    pub residues: String,
}

impl MergedInterval {
    /// Header in the gene finder's own `target:start-end` syntax.
    pub fn header(&self) -> String {
        format!("{}:{}-{}", self.target_id, self.start, self.stop)
    }

    pub fn span(&self) -> u64 {
        self.stop.saturating_sub(self.start)
    }
}

/// The part of a scaffold that a surviving alignment covers.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRegion {
    pub record: AlignmentRecord,
    pub residues: String,
}

/// A merged gene-finder interval together with the annotation row that won
/// duplicate resolution for it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedInterval {
    pub interval: MergedInterval,
    pub annotation: Option<GeneFinderHit>,
}

/// Which search produced the sequence kept in a [`CombinedHit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    AlignmentOnly,
    GeneFinderOnly,
    /// Found by both, the alignment tool's sequence is strictly longer.
    AlignmentLonger,
    /// Found by both, the gene finder's sequence is longer or equally long.
    GeneFinderLongerOrEqual,
}

impl Provenance {
    pub fn note(&self, search_tool: SearchTool) -> String {
        let tool = search_tool.label();
        let finder = SearchTool::Barrnap.label();
        match self {
            Provenance::AlignmentOnly => tool.to_string(),
            Provenance::GeneFinderOnly => finder.to_string(),
            Provenance::AlignmentLonger => format!("{tool}>{finder}"),
            Provenance::GeneFinderLongerOrEqual => format!("{finder}>={tool}"),
        }
    }
}

/// A resolved 16S sequence with the note describing where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedHit {
    pub header: String,
    pub residues: String,
    pub provenance: Provenance,
    pub provenance_note: String,
}

/// One row of the unified statistics table. Gene-finder rows have no
/// alignment statistics, so most numeric columns are optional and written
/// as `NA`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRow {
    pub query_header: Option<String>,
    pub bin_header: String,
    pub pident: Option<f64>,
    pub length: Option<u64>,
    pub mismatch: Option<u64>,
    pub gapopen: Option<u64>,
    pub query_start: Option<u64>,
    pub query_end: Option<u64>,
    pub bin_start: Option<u64>,
    pub bin_end: Option<u64>,
    pub evalue: Option<f64>,
    pub bitscore: Option<f64>,
    pub search_tool: SearchTool,
}
