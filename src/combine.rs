//src/combine.rs

use ahash::AHashMap;

use crate::error::{JoinError, Result};
use crate::reformat::{gene_finder_statistics, reformat_alignment_stats, QueryRole, SearchTool, StatisticsTable};
use crate::resolve::overlaps;
use crate::types::{AlignedRegion, AlignmentRecord, AnnotatedInterval, CombinedHit, Provenance};

/// Unified sequences and statistics for the candidate 16S stage.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedOutput {
    pub hits: Vec<CombinedHit>,
    pub statistics: StatisticsTable,
}

/// One sequence from one source, placed on its target as a 0-based
/// half-open span.
#[derive(Debug, Clone, Copy)]
struct Placed<'a> {
    target: &'a str,
    span: (u64, u64),
    residues: &'a str,
}

fn placed_alignments(hits: &[AlignedRegion]) -> Vec<Placed<'_>> {
    hits.iter()
        .map(|h| Placed {
            target: h.record.target_id.as_str(),
            span: h.record.target_interval(),
            residues: h.residues.as_str(),
        })
        .collect()
}

fn placed_intervals(hits: &[AnnotatedInterval]) -> Vec<Placed<'_>> {
    hits.iter()
        .map(|h| Placed {
            target: h.interval.target_id.as_str(),
            span: (h.interval.start, h.interval.stop),
            residues: h.interval.residues.as_str(),
        })
        .collect()
}

fn overlap_len(a: (u64, u64), b: (u64, u64)) -> u64 {
    a.1.min(b.1).saturating_sub(a.0.max(b.0))
}

/// Pair each alignment region with the unpaired gene-finder interval on the
/// same target that overlaps it the most. Regions left without a partner
/// come back alone.
fn pair_by_overlap(tool: &[Placed], finder: &[Placed]) -> Vec<(Option<usize>, Option<usize>)> {
    let mut finder_by_target: AHashMap<&str, Vec<usize>> = AHashMap::new();
    for (j, f) in finder.iter().enumerate() {
        finder_by_target.entry(f.target).or_default().push(j);
    }

    let mut paired = vec![false; finder.len()];
    let mut pairs = Vec::with_capacity(tool.len() + finder.len());
    for (i, t) in tool.iter().enumerate() {
        let best = finder_by_target.get(t.target).and_then(|candidates| {
            candidates
                .iter()
                .copied()
                .filter(|&j| !paired[j] && overlaps(t.span, finder[j].span))
                .max_by_key(|&j| (overlap_len(t.span, finder[j].span), std::cmp::Reverse(j)))
        });
        if let Some(j) = best {
            paired[j] = true;
        }
        pairs.push((Some(i), best));
    }
    pairs.extend(
        paired
            .iter()
            .enumerate()
            .filter(|(_, done)| !**done)
            .map(|(j, _)| (None, Some(j))),
    );
    pairs
}

/// Give every chosen sequence a header. On a target with several sequences
/// the longest keeps the bare target name and the rest are named
/// `target:start-end`. Output is sorted by header.
fn keyed_hits(chosen: Vec<(Placed, Provenance)>, tool: SearchTool) -> Vec<CombinedHit> {
    let mut by_target: AHashMap<&str, Vec<(Placed, Provenance)>> = AHashMap::new();
    for (placed, provenance) in chosen {
        by_target.entry(placed.target).or_default().push((placed, provenance));
    }

    let mut hits = Vec::new();
    for (target, mut group) in by_target {
        group.sort_by(|a, b| {
            b.0.residues
                .len()
                .cmp(&a.0.residues.len())
                .then(a.0.span.0.cmp(&b.0.span.0))
        });
        for (i, (placed, provenance)) in group.into_iter().enumerate() {
            let header = if i == 0 {
                target.to_string()
            } else {
                format!("{}:{}-{}", target, placed.span.0, placed.span.1)
            };
            hits.push(CombinedHit {
                header,
                residues: placed.residues.to_string(),
                provenance,
                provenance_note: provenance.note(tool),
            });
        }
    }
    hits.sort_by(|a, b| a.header.cmp(&b.header));
    hits
}

/// Pick the sequence to report for each pair. A region found by both sources
/// keeps the strictly longer sequence, and the gene finder's on a tie.
fn choose<'a>(
    pairs: &[(Option<usize>, Option<usize>)],
    tool: &[Placed<'a>],
    finder: &[Placed<'a>],
) -> Vec<(Placed<'a>, Provenance)> {
    pairs
        .iter()
        .filter_map(|pair| match *pair {
            (Some(i), None) => Some((tool[i], Provenance::AlignmentOnly)),
            (None, Some(j)) => Some((finder[j], Provenance::GeneFinderOnly)),
            (Some(i), Some(j)) => Some(if tool[i].residues.len() > finder[j].residues.len() {
                (tool[i], Provenance::AlignmentLonger)
            } else {
                (finder[j], Provenance::GeneFinderLongerOrEqual)
            }),
            (None, None) => None,
        })
        .collect()
}

/// Merge the alignment-tool regions and the gene-finder intervals into one
/// sequence table plus one statistics table.
///
/// Both sources empty is always an error. One source empty is an error
/// unless `allow_empty`, in which case the other source is passed through.
/// When both have hits, regions are paired by overlap on the same target;
/// a pair keeps the strictly longer sequence, and the gene finder's on a
/// tie. Statistics are the alignment rows followed by the gene-finder rows,
/// each already deduplicated.
pub fn combine(
    alignment_hits: &[AlignedRegion],
    gene_finder_hits: &[AnnotatedInterval],
    search_tool_name: &str,
    allow_empty: bool,
) -> Result<CombinedOutput> {
    let tool: SearchTool = search_tool_name.parse()?;
    let tool_label = tool.label();
    let finder_label = SearchTool::Barrnap.label();

    let records: Vec<AlignmentRecord> = alignment_hits.iter().map(|h| h.record.clone()).collect();
    let from_tool = placed_alignments(alignment_hits);
    let from_finder = placed_intervals(gene_finder_hits);

    match (alignment_hits.is_empty(), gene_finder_hits.is_empty()) {
        (true, true) => Err(JoinError::EmptyResult(format!(
            "There were no hits from either {tool_label} or {finder_label}, so no 16S candidates can be \
             reported. Check that the bins contain 16S sequences, or relax the filter thresholds \
             (minimum length, percent identity) if filtering removed every {tool_label} hit."
        ))),
        (true, false) if !allow_empty => Err(JoinError::EmptyResult(format!(
            "{tool_label} returned no hits after filtering, while {finder_label} found {} 16S regions. \
             Set allow_empty to continue with the {finder_label} results only, or relax the filter thresholds.",
            gene_finder_hits.len()
        ))),
        (false, true) if !allow_empty => Err(JoinError::EmptyResult(format!(
            "{finder_label} returned no hits, while {tool_label} found {} 16S regions. \
             Set allow_empty to continue with the {tool_label} results only.",
            alignment_hits.len()
        ))),
        (true, false) => {
            log::warn!("{tool_label} found no hits; continuing with {finder_label} results only");
            let pairs = pair_by_overlap(&from_tool, &from_finder);
            Ok(CombinedOutput {
                hits: keyed_hits(choose(&pairs, &from_tool, &from_finder), tool),
                statistics: StatisticsTable {
                    role: QueryRole::Probe16s,
                    rows: gene_finder_statistics(gene_finder_hits),
                },
            })
        }
        (false, true) => {
            log::warn!("{finder_label} found no hits; continuing with {tool_label} results only");
            let pairs = pair_by_overlap(&from_tool, &from_finder);
            Ok(CombinedOutput {
                hits: keyed_hits(choose(&pairs, &from_tool, &from_finder), tool),
                statistics: reformat_alignment_stats(&records, QueryRole::Probe16s, search_tool_name)?,
            })
        }
        (false, false) => {
            let pairs = pair_by_overlap(&from_tool, &from_finder);
            let both = pairs.iter().filter(|(a, g)| a.is_some() && g.is_some()).count();
            log::info!(
                "After merge: {} sequences found by {}, {} found by {}, {} found by both",
                from_finder.len(),
                finder_label,
                from_tool.len(),
                tool_label,
                both
            );

            let hits = keyed_hits(choose(&pairs, &from_tool, &from_finder), tool);
            let mut statistics = reformat_alignment_stats(&records, QueryRole::Probe16s, search_tool_name)?;
            statistics.rows.extend(gene_finder_statistics(gene_finder_hits));
            Ok(CombinedOutput { hits, statistics })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment_stats::tests::record;
    use crate::types::MergedInterval;

    fn region(target: &str, sstart: u64, residues: &str) -> AlignedRegion {
        AlignedRegion {
            record: record("probe", target, sstart, sstart + residues.len() as u64 - 1, 100.0),
            residues: residues.to_string(),
        }
    }

    fn interval(target: &str, start: u64, residues: &str) -> AnnotatedInterval {
        AnnotatedInterval {
            interval: MergedInterval {
                target_id: target.to_string(),
                start,
                stop: start + residues.len() as u64,
                residues: residues.to_string(),
            },
            annotation: None,
        }
    }

    fn summary(out: &CombinedOutput) -> Vec<(&str, &str, Provenance)> {
        out.hits
            .iter()
            .map(|h| (h.header.as_str(), h.residues.as_str(), h.provenance))
            .collect()
    }

    #[test]
    fn test_both_empty_is_an_error() {
        for allow_empty in [false, true] {
            match combine(&[], &[], "mmseqs", allow_empty) {
                Err(JoinError::EmptyResult(msg)) => assert!(msg.contains("no hits"), "{}", msg),
                other => panic!("expected EmptyResult, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_alignment_empty_without_allow_empty_names_tool() {
        let finder = vec![interval("s1", 0, "ACGT")];
        match combine(&[], &finder, "blast", false) {
            Err(JoinError::EmptyResult(msg)) => {
                assert!(msg.contains("BLAST"));
                assert!(msg.contains("allow_empty"));
            }
            other => panic!("expected EmptyResult, got {:?}", other),
        }
    }

    #[test]
    fn test_alignment_empty_with_allow_empty_passes_gene_finder_through() {
        let finder = vec![interval("s1", 0, "ACGT"), interval("s2", 10, "GGCC")];
        let out = combine(&[], &finder, "mmseqs", true).unwrap();
        assert_eq!(
            summary(&out),
            vec![
                ("s1", "ACGT", Provenance::GeneFinderOnly),
                ("s2", "GGCC", Provenance::GeneFinderOnly),
            ]
        );
        assert_eq!(out.statistics.rows.len(), 2);
        assert!(out.statistics.rows.iter().all(|r| r.search_tool == SearchTool::Barrnap));
    }

    #[test]
    fn test_gene_finder_empty_is_symmetric() {
        let tool = vec![region("s1", 1, "ACGT")];
        match combine(&tool, &[], "mmseqs", false) {
            Err(JoinError::EmptyResult(msg)) => assert!(msg.contains("Barrnap")),
            other => panic!("expected EmptyResult, got {:?}", other),
        }
        let out = combine(&tool, &[], "mmseqs", true).unwrap();
        assert_eq!(summary(&out), vec![("s1", "ACGT", Provenance::AlignmentOnly)]);
        assert_eq!(out.hits[0].provenance_note, "MMseqs2");
        assert_eq!(out.statistics.rows[0].search_tool, SearchTool::Mmseqs);
    }

    #[test]
    fn test_both_sources_pick_longer_and_prefer_gene_finder_on_tie() {
        let tool = vec![
            region("only_tool", 1, "AAAA"),
            region("tool_longer", 1, "CCCCCC"),
            region("finder_longer", 1, "GG"),
            region("tie", 1, "TTTT"),
        ];
        let finder = vec![
            interval("only_finder", 0, "ACAC"),
            interval("tool_longer", 0, "CCC"),
            interval("finder_longer", 0, "GGGGG"),
            interval("tie", 0, "TTTA"),
        ];
        let out = combine(&tool, &finder, "blast", false).unwrap();
        assert_eq!(
            summary(&out),
            vec![
                ("finder_longer", "GGGGG", Provenance::GeneFinderLongerOrEqual),
                ("only_finder", "ACAC", Provenance::GeneFinderOnly),
                ("only_tool", "AAAA", Provenance::AlignmentOnly),
                ("tie", "TTTA", Provenance::GeneFinderLongerOrEqual),
                ("tool_longer", "CCCCCC", Provenance::AlignmentLonger),
            ]
        );
        assert_eq!(out.hits[4].provenance_note, "BLAST>Barrnap");
        assert_eq!(out.hits[3].provenance_note, "Barrnap>=BLAST");

        let tools: Vec<SearchTool> = out.statistics.rows.iter().map(|r| r.search_tool).collect();
        assert_eq!(tools[..4], [SearchTool::Blast; 4]);
        assert_eq!(tools[4..], [SearchTool::Barrnap; 4]);
    }

    #[test]
    fn test_several_regions_on_one_target_keep_distinct_headers() {
        let finder = vec![interval("s", 0, "AC"), interval("s", 100, "ACGTAC")];
        let out = combine(&[], &finder, "mmseqs", true).unwrap();
        let headers: Vec<&str> = out.hits.iter().map(|h| h.header.as_str()).collect();
        assert_eq!(headers, vec!["s", "s:0-2"]);
        assert_eq!(out.hits[0].residues, "ACGTAC");
    }

    #[test]
    fn test_copies_on_one_scaffold_pair_by_position_not_length() {
        let tool = vec![
            region("scaf", 1, &"A".repeat(1500)),
            region("scaf", 5001, &"C".repeat(1400)),
        ];
        let finder = vec![
            interval("scaf", 0, &"T".repeat(1300)),
            interval("scaf", 5000, &"G".repeat(1450)),
            interval("scaf", 9000, &"N".repeat(100)),
        ];
        let out = combine(&tool, &finder, "mmseqs", false).unwrap();
        let got: Vec<(&str, usize, char, Provenance)> = out
            .hits
            .iter()
            .map(|h| {
                (
                    h.header.as_str(),
                    h.residues.len(),
                    h.residues.chars().next().unwrap(),
                    h.provenance,
                )
            })
            .collect();
        assert_eq!(
            got,
            vec![
                ("scaf", 1500, 'A', Provenance::AlignmentLonger),
                ("scaf:5000-6450", 1450, 'G', Provenance::GeneFinderLongerOrEqual),
                ("scaf:9000-9100", 100, 'N', Provenance::GeneFinderOnly),
            ]
        );
    }

    #[test]
    fn test_non_overlapping_regions_on_one_target_are_not_paired() {
        let tool = vec![region("s", 1, "ACGTACGT")];
        let finder = vec![interval("s", 100, "GGGG")];
        let out = combine(&tool, &finder, "mmseqs", false).unwrap();
        assert_eq!(
            summary(&out),
            vec![
                ("s", "ACGTACGT", Provenance::AlignmentOnly),
                ("s:100-104", "GGGG", Provenance::GeneFinderOnly),
            ]
        );
    }

    #[test]
    fn test_unknown_tool_name_is_configuration_error() {
        let finder = vec![interval("s1", 0, "ACGT")];
        assert!(matches!(
            combine(&[], &finder, "vsearch", true),
            Err(JoinError::Configuration(_))
        ));
    }
}
