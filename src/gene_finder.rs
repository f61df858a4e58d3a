//src/gene_finder.rs
//
// Barrnap reports each 16S copy as a GFF row plus a FASTA record whose
// header is `target:start-end` (0-based, half-open). A single gene copy can
// come back as several fragments, which are stitched together here.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ahash::AHashMap;

use crate::error::{JoinError, Result};
use crate::fasta::SequenceTable;
use crate::resolve::{overlaps, resolve_duplicates, Candidate, ScoreOrder};
use crate::types::{AnnotatedInterval, GeneFinderHit, MergedInterval};

pub const GFF_COLUMNS: usize = 9;

/// Split a `target:start-end` header into its parts.
pub fn parse_region_header(header: &str) -> Result<(String, u64, u64)> {
    let bad = |why: &str| {
        JoinError::parse(
            "gene finder FASTA",
            0,
            format!("header '{}' is not target:start-end ({})", header, why),
        )
    };
    let (target, range) = header.rsplit_once(':').ok_or_else(|| bad("no ':'"))?;
    let (start, stop) = range.split_once('-').ok_or_else(|| bad("no '-'"))?;
    let start: u64 = start.parse().map_err(|_| bad("start is not a number"))?;
    let stop: u64 = stop.parse().map_err(|_| bad("end is not a number"))?;
    if target.is_empty() {
        return Err(bad("empty target name"));
    }
    Ok((target.to_string(), start, stop))
}

/// Turn every gene-finder FASTA record into a single-fragment interval.
pub fn fragments_from_fasta(table: &SequenceTable) -> Result<Vec<MergedInterval>> {
    table
        .values()
        .map(|rec| {
            let (target_id, start, stop) = parse_region_header(&rec.header)?;
            Ok(MergedInterval {
                target_id,
                start,
                stop,
                residues: rec.residues.clone(),
            })
        })
        .collect()
}

fn check_span(interval: &MergedInterval) -> Result<()> {
    if interval.stop < interval.start || interval.span() != interval.residues.len() as u64 {
        return Err(JoinError::DataIntegrity(format!(
            "gene finder interval {} spans {} bp but carries {} bp of sequence; \
             the gene finder FASTA and its coordinates do not match",
            interval.header(),
            interval.span(),
            interval.residues.len()
        )));
    }
    Ok(())
}

/// Merge fragments that touch or overlap on the same target.
///
/// Fragments are sorted by `(target_id, start)` and scanned once. A fragment
/// starting at or before the running end is folded in, contributing only the
/// residues past that end; otherwise the running interval is emitted and the
/// fragment starts a new one. Every emitted interval must satisfy
/// `stop - start == residues.len()`.
pub fn normalize(fragments: Vec<MergedInterval>) -> Result<Vec<MergedInterval>> {
    let mut sorted = fragments;
    sorted.sort_by(|a, b| a.target_id.cmp(&b.target_id).then(a.start.cmp(&b.start)));

    let mut merged: Vec<MergedInterval> = Vec::with_capacity(sorted.len());
    let mut running: Option<MergedInterval> = None;

    for frag in sorted {
        running = match running.take() {
            Some(mut cur) if cur.target_id == frag.target_id && frag.start <= cur.stop => {
                if frag.stop > cur.stop {
                    let trim_point = (cur.stop - frag.start) as usize;
                    let suffix = frag.residues.get(trim_point..).unwrap_or("");
                    cur.residues.push_str(suffix);
                    cur.stop = frag.stop;
                }
                Some(cur)
            }
            Some(done) => {
                merged.push(done);
                Some(frag)
            }
            None => Some(frag),
        };
    }
    if let Some(done) = running {
        merged.push(done);
    }

    for interval in &merged {
        check_span(interval)?;
    }
    Ok(merged)
}

fn is_marker(feature_type: &str, attributes: &str, marker: &str) -> bool {
    feature_type == marker
        || attributes
            .split(';')
            .filter_map(|kv| kv.trim().strip_prefix("Name="))
            .any(|name| name == marker || name.starts_with(&format!("{marker}_")))
}

/// Parse one GFF row.
pub fn parse_gff_line(line: &str, source: &str, line_no: usize) -> Result<GeneFinderHit> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != GFF_COLUMNS {
        return Err(JoinError::parse(
            source,
            line_no,
            format!("expected {} GFF columns, found {}", GFF_COLUMNS, fields.len()),
        ));
    }
    let coord = |idx: usize, name: &str| -> Result<u64> {
        fields[idx].trim().parse().map_err(|_| {
            JoinError::parse(source, line_no, format!("{} '{}' is not a position", name, fields[idx]))
        })
    };
    let score = match fields[5].trim() {
        "." | "" => None,
        s => Some(s.parse::<f64>().map_err(|_| {
            JoinError::parse(source, line_no, format!("score '{}' is not a number", s))
        })?),
    };

    Ok(GeneFinderHit {
        target_id: fields[0].to_string(),
        feature_type: fields[2].to_string(),
        start: coord(3, "start")?,
        end: coord(4, "end")?,
        score,
        strand: fields[6].chars().next().unwrap_or('.'),
        attributes: fields[8].trim_end().to_string(),
    })
}

/// Read the gene finder's GFF, keeping only rows for `marker` (e.g. `16S`).
/// Comment and blank lines are skipped; an empty file yields no hits.
pub fn read_gene_finder_gff<P: AsRef<Path>>(path: P, marker: &str) -> Result<Vec<GeneFinderHit>> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let reader = BufReader::new(File::open(path)?);

    let mut hits = Vec::new();
    let mut skipped = 0usize;
    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let hit = parse_gff_line(&line, &source, idx + 1)?;
        if is_marker(&hit.feature_type, &hit.attributes, marker) {
            hits.push(hit);
        } else {
            skipped += 1;
        }
    }
    log::debug!(
        "Read {} {} annotations from {} ({} other features skipped)",
        hits.len(),
        marker,
        source,
        skipped
    );
    Ok(hits)
}

/// Attach to each merged interval the best-scoring annotation row that
/// overlaps it.
///
/// Annotation rows are first resolved among themselves (lowest score wins,
/// on their own GFF coordinates), so several fragments map to at most one
/// row per region.
pub fn annotate_intervals(
    intervals: Vec<MergedInterval>,
    annotations: Vec<GeneFinderHit>,
) -> Vec<AnnotatedInterval> {
    let resolved = resolve_duplicates(annotations, ScoreOrder::Ascending);
    let mut by_target: AHashMap<String, Vec<GeneFinderHit>> = AHashMap::new();
    for hit in resolved {
        by_target.entry(hit.target_id.clone()).or_default().push(hit);
    }

    intervals
        .into_iter()
        .map(|interval| {
            let span = (interval.start, interval.stop);
            let annotation = by_target
                .get(&interval.target_id)
                .and_then(|hits| hits.iter().find(|h| overlaps(h.interval(), span)))
                .cloned();
            if annotation.is_none() {
                log::debug!("No annotation row overlaps gene finder interval {}", interval.header());
            }
            AnnotatedInterval { interval, annotation }
        })
        .collect()
}

/// Load, merge and annotate the gene finder's FASTA and GFF output.
pub fn load_gene_finder_output<P: AsRef<Path>, Q: AsRef<Path>>(
    fasta_path: P,
    gff_path: Q,
    marker: &str,
) -> Result<Vec<AnnotatedInterval>> {
    let table = crate::fasta::read_fasta_records(fasta_path, None);
    let merged = normalize(fragments_from_fasta(&table)?)?;
    if merged.is_empty() {
        return Ok(Vec::new());
    }
    let annotations = read_gene_finder_gff(gff_path, marker)?;
    Ok(annotate_intervals(merged, annotations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn frag(header: &str, residues: &str) -> MergedInterval {
        let (target_id, start, stop) = parse_region_header(header).unwrap();
        MergedInterval {
            target_id,
            start,
            stop,
            residues: residues.to_string(),
        }
    }

    fn summary(intervals: &[MergedInterval]) -> Vec<(String, String)> {
        intervals.iter().map(|i| (i.header(), i.residues.clone())).collect()
    }

    #[test]
    fn test_parse_region_header() {
        assert_eq!(parse_region_header("scaf_1:10-25").unwrap(), ("scaf_1".to_string(), 10, 25));
        assert_eq!(parse_region_header("bin:3:0-4").unwrap(), ("bin:3".to_string(), 0, 4));
        assert!(parse_region_header("scaf_1").is_err());
        assert!(parse_region_header("scaf_1:10").is_err());
        assert!(parse_region_header("scaf_1:a-b").is_err());
    }

    #[test]
    fn test_merges_touching_and_overlapping_fragments() {
        let fragments = vec![
            frag("a:0-3", "abc"),
            frag("b:0-3", "abc"),
            frag("b:3-4", "d"),
            frag("b:3-7", "defg"),
            frag("c:1002-1007", "abcde"),
            frag("c:1003-1012", "bcdefghij"),
            frag("d:0-4", "abcd"),
        ];
        let merged = normalize(fragments).unwrap();
        let expected: Vec<(String, String)> = vec![
            ("a:0-3", "abc"),
            ("b:0-7", "abcdefg"),
            ("c:1002-1012", "abcdefghij"),
            ("d:0-4", "abcd"),
        ]
        .into_iter()
        .map(|(h, s)| (h.to_string(), s.to_string()))
        .collect();
        assert_eq!(summary(&merged), expected);
    }

    #[test]
    fn test_separate_fragments_on_one_target_stay_separate() {
        let merged = normalize(vec![frag("t:20-24", "GGGG"), frag("t:0-4", "AAAA")]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].header(), "t:0-4");
        assert_eq!(merged[1].header(), "t:20-24");
    }

    #[test]
    fn test_contained_fragment_adds_nothing() {
        let merged = normalize(vec![frag("t:0-10", "AAAAACCCCC"), frag("t:2-5", "AAA")]).unwrap();
        assert_eq!(summary(&merged), vec![("t:0-10".to_string(), "AAAAACCCCC".to_string())]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let fragments = vec![
            frag("b:0-3", "abc"),
            frag("b:3-7", "defg"),
            frag("b:9-11", "xy"),
            frag("c:5-8", "abc"),
            frag("c:6-9", "bcd"),
        ];
        let once = normalize(fragments).unwrap();
        let twice = normalize(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_span_mismatch_is_integrity_error() {
        let result = normalize(vec![frag("a:0-5", "abc")]);
        assert!(matches!(result, Err(JoinError::DataIntegrity(_))));
    }

    const GFF: &str = "##gff-version 3\n\
        scaf_1\tbarrnap:0.9\trRNA\t101\t1600\t0\t+\t.\tName=16S_rRNA;product=16S ribosomal RNA\n\
        scaf_1\tbarrnap:0.9\trRNA\t1700\t1810\t1.2e-10\t+\t.\tName=5S_rRNA;product=5S ribosomal RNA\n\
        scaf_2\tbarrnap:0.9\trRNA\t1\t700\t3e-50\t-\t.\tName=16S_rRNA;product=16S ribosomal RNA (partial)\n\
        scaf_2\tbarrnap:0.9\trRNA\t500\t900\t1e-20\t-\t.\tName=16S_rRNA;product=16S ribosomal RNA (partial)\n";

    #[test]
    fn test_read_gff_keeps_marker_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rrna.gff");
        std::fs::write(&path, GFF).unwrap();
        let hits = read_gene_finder_gff(&path, "16S").unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].target_id, "scaf_1");
        assert_eq!(hits[0].score, Some(0.0));
        assert_eq!(hits[2].strand, '-');
    }

    #[test]
    fn test_gff_wrong_column_count_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rrna.gff");
        std::fs::write(&path, "scaf_1\tbarrnap\trRNA\t1\t10\n").unwrap();
        assert!(matches!(read_gene_finder_gff(&path, "16S"), Err(JoinError::Parse { .. })));
    }

    #[test]
    fn test_annotation_join_uses_best_score() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rrna.gff");
        std::fs::write(&path, GFF).unwrap();
        let hits = read_gene_finder_gff(&path, "16S").unwrap();

        let intervals = vec![
            MergedInterval {
                target_id: "scaf_2".to_string(),
                start: 0,
                stop: 900,
                residues: "A".repeat(900),
            },
            MergedInterval {
                target_id: "scaf_9".to_string(),
                start: 0,
                stop: 4,
                residues: "ACGT".to_string(),
            },
        ];
        let annotated = annotate_intervals(intervals, hits);
        let best = annotated[0].annotation.as_ref().unwrap();
        assert_eq!(best.start, 1);
        assert_eq!(best.score, Some(3e-50));
        assert!(annotated[1].annotation.is_none());
    }
}
