//src/alignment_stats.rs

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use ahash::AHashSet;

use crate::error::{JoinError, Result};
use crate::fasta::SequenceTable;
use crate::types::{AlignedRegion, AlignmentRecord};

/// Number of columns in the tabular output requested from BLAST and MMseqs2.
pub const ALIGNMENT_COLUMNS: usize = 14;

fn field<T: FromStr>(fields: &[&str], idx: usize, name: &str, source: &str, line: usize) -> Result<T> {
    fields[idx].trim().parse::<T>().map_err(|_| {
        JoinError::parse(
            source,
            line,
            format!("column {} ({}) has invalid value '{}'", idx + 1, name, fields[idx]),
        )
    })
}

/// Parse one tab-separated row.
/// ```text
/// qseqid sseqid pident length mismatch gapopen qstart qend sstart send evalue bitscore qlen slen
/// ```
pub fn parse_alignment_line(line: &str, source: &str, line_no: usize) -> Result<AlignmentRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != ALIGNMENT_COLUMNS {
        return Err(JoinError::parse(
            source,
            line_no,
            format!("expected {} columns, found {}", ALIGNMENT_COLUMNS, fields.len()),
        ));
    }

    Ok(AlignmentRecord {
        query_id: fields[0].to_string(),
        target_id: fields[1].to_string(),
        percent_identity: field(&fields, 2, "pident", source, line_no)?,
        alignment_length: field(&fields, 3, "length", source, line_no)?,
        mismatch_count: field(&fields, 4, "mismatch", source, line_no)?,
        gap_openings: field(&fields, 5, "gapopen", source, line_no)?,
        query_start: field(&fields, 6, "qstart", source, line_no)?,
        query_end: field(&fields, 7, "qend", source, line_no)?,
        target_start: field(&fields, 8, "sstart", source, line_no)?,
        target_end: field(&fields, 9, "send", source, line_no)?,
        e_value: field(&fields, 10, "evalue", source, line_no)?,
        bit_score: field(&fields, 11, "bitscore", source, line_no)?,
        query_length: field(&fields, 12, "qlen", source, line_no)?,
        target_length: field(&fields, 13, "slen", source, line_no)?,
    })
}

/// Reads a BLAST/MMseqs2 statistics file (no header row).
///
/// A zero-byte file is not an error: the search can legitimately find
/// nothing. Any malformed row rejects the whole file.
pub fn read_alignment_stats<P: AsRef<Path>>(path: P) -> Result<Vec<AlignmentRecord>> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let reader = BufReader::new(File::open(path)?);

    let mut records = Vec::new();
    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_alignment_line(line, &source, idx + 1)?);
    }
    log::debug!("Read {} alignment records from {}", records.len(), source);
    Ok(records)
}

/// The set of target identifiers referenced by `records`.
pub fn target_ids(records: &[AlignmentRecord]) -> AHashSet<String> {
    records.iter().map(|r| r.target_id.clone()).collect()
}

/// Slice the aligned part of each record's scaffold out of `scaffolds`.
///
/// Records whose scaffold is missing are skipped with a warning. A reversed
/// target interval or one running past the scaffold end is fatal.
pub fn extract_aligned_regions(
    records: &[AlignmentRecord],
    scaffolds: &SequenceTable,
) -> Result<Vec<AlignedRegion>> {
    let mut regions = Vec::with_capacity(records.len());
    for rec in records {
        let Some(scaffold) = scaffolds.get(&rec.target_id) else {
            log::warn!(
                "Scaffold {} from the alignment statistics is not in the sequence file; skipping hit from {}",
                rec.target_id,
                rec.query_id
            );
            continue;
        };
        if rec.target_start == 0 {
            return Err(JoinError::DataIntegrity(format!(
                "alignment of {} on {} has target start 0; positions are 1-based",
                rec.query_id, rec.target_id
            )));
        }
        if rec.target_start > rec.target_end {
            return Err(JoinError::DataIntegrity(format!(
                "alignment of {} on {} has target start {} after target end {}; \
                 targets are never expected reverse-reported",
                rec.query_id, rec.target_id, rec.target_start, rec.target_end
            )));
        }
        let (start, end) = rec.target_interval();
        let slice = scaffold.slice(start as usize, end as usize).ok_or_else(|| {
            JoinError::DataIntegrity(format!(
                "alignment of {} ends at {} but scaffold {} is only {} bp; \
                 the statistics and sequence files do not match",
                rec.query_id,
                rec.target_end,
                rec.target_id,
                scaffold.len()
            ))
        })?;
        regions.push(AlignedRegion {
            record: rec.clone(),
            residues: slice.residues,
        });
    }
    Ok(regions)
}
