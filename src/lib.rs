// src/lib.rs
pub mod types;
pub mod error;
pub mod config;
pub mod fasta;
pub mod alignment_stats;
pub mod filter;
pub mod resolve;
pub mod gene_finder;
pub mod combine;
pub mod reformat;

use std::fs;
use std::path::{Path, PathBuf};

use crate::alignment_stats::{extract_aligned_regions, read_alignment_stats, target_ids};
use crate::combine::combine;
use crate::config::{CandidateConfig, MatchConfig};
use crate::error::{JoinError, Result};
use crate::fasta::{fasta_text, read_fasta_records};
use crate::filter::filter_alignment_stats;
use crate::gene_finder::load_gene_finder_output;
use crate::reformat::{reformat_alignment_stats, QueryRole, SearchTool, StatisticsTable};
use crate::resolve::{resolve_duplicates, ScoreOrder};
use crate::types::{CombinedHit, Provenance};

/// Output of one pipeline stage. Text is generated on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResults {
    /// Resolved sequences with their provenance notes
    pub hits: Vec<CombinedHit>,

    /// Unified statistics, already relabelled for the stage's query role
    pub statistics: StatisticsTable,
}

impl StageResults {
    /// FASTA text, `>header note` then the unwrapped sequence.
    pub fn get_fasta_text(&self) -> String {
        fasta_text(self.hits.iter().map(|h| {
            (
                h.header.as_str(),
                h.provenance_note.as_str(),
                h.residues.as_str(),
            )
        }))
    }

    pub fn get_statistics_text(&self) -> String {
        self.statistics.to_tsv()
    }

    /// Write the sequences and the statistics. Both texts are rendered and
    /// staged next to their destinations before either destination is
    /// replaced. On error neither output is left behind.
    pub fn write_outputs<P: AsRef<Path>, Q: AsRef<Path>>(&self, fasta_path: P, statistics_path: Q) -> Result<()> {
        let staged = [
            (fasta_path.as_ref(), self.get_fasta_text()),
            (statistics_path.as_ref(), self.get_statistics_text()),
        ];
        let mut pending = Vec::with_capacity(staged.len());
        for (dest, text) in &staged {
            let tmp = staging_path(dest);
            if let Err(e) = fs::write(&tmp, text) {
                for (tmp, _) in &pending {
                    let _ = fs::remove_file(tmp);
                }
                return Err(e.into());
            }
            pending.push((tmp, *dest));
        }
        // A failed rename takes back the destinations already replaced, so
        // a new FASTA never sits next to an old statistics table.
        let mut placed: Vec<&Path> = Vec::with_capacity(pending.len());
        for (tmp, dest) in &pending {
            if let Err(e) = fs::rename(tmp, dest) {
                for done in &placed {
                    let _ = fs::remove_file(done);
                }
                for (tmp, _) in &pending {
                    let _ = fs::remove_file(tmp);
                }
                return Err(e.into());
            }
            placed.push(*dest);
        }
        Ok(())
    }
}

fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

/// Input files for stage 1.
#[derive(Debug, Clone)]
pub struct CandidateInputs {
    /// BLAST/MMseqs2 statistics of generic 16S against the bins
    pub alignment_stats: PathBuf,
    /// Bin scaffolds (or the scaffolds that had hits)
    pub scaffolds: PathBuf,
    /// Gene finder sequences with `target:start-end` headers
    pub gene_finder_fasta: PathBuf,
    /// Gene finder GFF annotation
    pub gene_finder_gff: PathBuf,
}

/// Input files for stage 2.
#[derive(Debug, Clone)]
pub struct MatchInputs {
    /// BLAST/MMseqs2 statistics of ASVs against the candidate 16S sequences
    pub alignment_stats: PathBuf,
    /// Candidate 16S sequences from stage 1
    pub candidates: PathBuf,
}

/// Stage 1: find candidate 16S sequences in the bins.
///
/// The alignment statistics are filtered, overlapping hits on a scaffold are
/// resolved by bit score and the aligned regions are cut from the scaffolds.
/// The gene finder's fragments are merged and annotated, then both sources
/// are combined.
pub fn find_candidates(inputs: &CandidateInputs, config: &CandidateConfig) -> Result<StageResults> {
    let records = read_alignment_stats(&inputs.alignment_stats)?;
    let total = records.len();
    let filtered = filter_alignment_stats(records, &config.criteria)?;
    let resolved = resolve_duplicates(filtered, ScoreOrder::Descending);
    log::info!(
        "{} of {} {} hits remain after filtering and duplicate resolution",
        resolved.len(),
        total,
        config.search_tool
    );

    let scaffolds = read_fasta_records(&inputs.scaffolds, Some(&target_ids(&resolved)));
    let regions = extract_aligned_regions(&resolved, &scaffolds)?;

    let gene_finder_hits = load_gene_finder_output(
        &inputs.gene_finder_fasta,
        &inputs.gene_finder_gff,
        &config.marker,
    )?;
    log::info!("Gene finder reported {} merged {} regions", gene_finder_hits.len(), config.marker);

    let combined = combine(&regions, &gene_finder_hits, &config.search_tool, config.allow_empty)?;
    Ok(StageResults {
        hits: combined.hits,
        statistics: combined.statistics,
    })
}

/// Stage 2: keep the candidate 16S sequences that ASVs match.
pub fn find_asv_matches(inputs: &MatchInputs, config: &MatchConfig) -> Result<StageResults> {
    let tool: SearchTool = config.search_tool.parse()?;
    let records = read_alignment_stats(&inputs.alignment_stats)?;
    let total = records.len();
    let filtered = filter_alignment_stats(records, &config.criteria)?;
    log::info!("{} of {} ASV matches pass the filters", filtered.len(), total);

    if filtered.is_empty() && !config.allow_empty {
        return Err(JoinError::EmptyResult(format!(
            "{} returned no hits of ASVs against the candidate 16S sequences after filtering. \
             Relax the filter thresholds (minimum length, percent identity), or set allow_empty \
             to produce empty outputs.",
            tool.label()
        )));
    }

    let candidates = read_fasta_records(&inputs.candidates, Some(&target_ids(&filtered)));
    let hits = candidates
        .into_values()
        .map(|rec| CombinedHit {
            header: rec.header,
            residues: rec.residues,
            provenance: Provenance::AlignmentOnly,
            provenance_note: Provenance::AlignmentOnly.note(tool),
        })
        .collect();
    let statistics = reformat_alignment_stats(&filtered, QueryRole::Asv, &config.search_tool)?;
    Ok(StageResults { hits, statistics })
}
