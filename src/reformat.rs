//src/reformat.rs

use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::error::{JoinError, Result};
use crate::types::{AlignmentRecord, AnnotatedInterval, StatisticsRow};

/// Token written for a missing value.
pub const MISSING: &str = "NA";

/// Output columns. `{query}` and `{target}` are replaced by the role prefixes.
const COLUMN_TEMPLATE: [&str; 13] = [
    "{query}_header",
    "{target}_header",
    "pident",
    "length",
    "mismatch",
    "gapopen",
    "{query}_start",
    "{query}_end",
    "{target}_start",
    "{target}_end",
    "evalue",
    "bitscore",
    "search_tool",
];

/// The tool a statistics row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchTool {
    Mmseqs,
    Blast,
    Barrnap,
}

impl SearchTool {
    pub fn label(&self) -> &'static str {
        match self {
            SearchTool::Mmseqs => "MMseqs2",
            SearchTool::Blast => "BLAST",
            SearchTool::Barrnap => "Barrnap",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [SearchTool::Mmseqs, SearchTool::Blast, SearchTool::Barrnap]
            .into_iter()
            .find(|tool| tool.label() == label)
    }
}

/// Only the alignment tools can be named on input; the gene finder is
/// attached internally.
impl FromStr for SearchTool {
    type Err = JoinError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "mmseqs" => Ok(SearchTool::Mmseqs),
            "blast" => Ok(SearchTool::Blast),
            other => Err(JoinError::Configuration(format!(
                "the search tool name '{}' is not recognized; use 'mmseqs' or 'blast'",
                other
            ))),
        }
    }
}

/// What the query sequences of a search were.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRole {
    /// Generic 16S references searched against bin scaffolds.
    Probe16s,
    /// ASVs searched against candidate 16S from the bins.
    Asv,
    /// Bin-derived sequences used as queries.
    Bin,
}

impl QueryRole {
    pub fn prefix(&self) -> &'static str {
        match self {
            QueryRole::Probe16s => "16s",
            QueryRole::Asv => "asv",
            QueryRole::Bin => "bin",
        }
    }

    /// Targets are bin sequences unless the bins are the queries.
    pub fn target_prefix(&self) -> &'static str {
        match self {
            QueryRole::Bin => "target",
            _ => "bin",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        [QueryRole::Probe16s, QueryRole::Asv, QueryRole::Bin]
            .into_iter()
            .find(|role| role.prefix() == prefix)
    }

    pub fn column_names(&self) -> Vec<String> {
        COLUMN_TEMPLATE
            .iter()
            .map(|col| {
                col.replace("{query}", self.prefix())
                    .replace("{target}", self.target_prefix())
            })
            .collect()
    }
}

/// Rows of the unified statistics report, labelled for one query role.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsTable {
    pub role: QueryRole,
    pub rows: Vec<StatisticsRow>,
}

/// Relabel alignment-tool records for `role`. `search_tool` must be
/// `mmseqs` or `blast`.
pub fn reformat_alignment_stats(
    records: &[AlignmentRecord],
    role: QueryRole,
    search_tool: &str,
) -> Result<StatisticsTable> {
    let tool: SearchTool = search_tool.parse()?;
    let rows = records
        .iter()
        .map(|rec| StatisticsRow {
            query_header: Some(rec.query_id.clone()),
            bin_header: rec.target_id.clone(),
            pident: Some(rec.percent_identity),
            length: Some(rec.alignment_length),
            mismatch: Some(rec.mismatch_count),
            gapopen: Some(rec.gap_openings),
            query_start: Some(rec.query_start),
            query_end: Some(rec.query_end),
            bin_start: Some(rec.target_start),
            bin_end: Some(rec.target_end),
            evalue: Some(rec.e_value),
            bitscore: Some(rec.bit_score),
            search_tool: tool,
        })
        .collect();
    Ok(StatisticsTable { role, rows })
}

/// Statistics rows for gene-finder intervals. The query header is the
/// interval's `target:start-end` name; positions on the bin are written
/// 1-based inclusive like the alignment rows.
pub fn gene_finder_statistics(intervals: &[AnnotatedInterval]) -> Vec<StatisticsRow> {
    intervals
        .iter()
        .map(|ann| {
            let iv = &ann.interval;
            StatisticsRow {
                query_header: Some(iv.header()),
                bin_header: iv.target_id.clone(),
                pident: None,
                length: Some(iv.span()),
                mismatch: None,
                gapopen: None,
                query_start: None,
                query_end: None,
                bin_start: Some(iv.start + 1),
                bin_end: Some(iv.stop),
                evalue: ann.annotation.as_ref().and_then(|a| a.score),
                bitscore: None,
                search_tool: SearchTool::Barrnap,
            }
        })
        .collect()
}

fn opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => MISSING.to_string(),
    }
}

impl StatisticsTable {
    /// Tab-separated text with a header row.
    pub fn to_tsv(&self) -> String {
        let mut output = self.role.column_names().join("\t");
        output.push('\n');
        for row in &self.rows {
            let evalue = match row.evalue {
                Some(e) => format!("{:e}", e),
                None => MISSING.to_string(),
            };
            writeln!(
                output,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                row.query_header.as_deref().unwrap_or(MISSING),
                row.bin_header,
                opt(&row.pident),
                opt(&row.length),
                opt(&row.mismatch),
                opt(&row.gapopen),
                opt(&row.query_start),
                opt(&row.query_end),
                opt(&row.bin_start),
                opt(&row.bin_end),
                evalue,
                opt(&row.bitscore),
                row.search_tool.label(),
            )
            .unwrap();
        }
        output
    }
}

fn read_opt<T: FromStr>(value: &str, column: &str, source: &str, line: usize) -> Result<Option<T>> {
    if value == MISSING {
        return Ok(None);
    }
    value
        .parse::<T>()
        .map(Some)
        .map_err(|_| JoinError::parse(source, line, format!("{} '{}' is not a number", column, value)))
}

/// Read a statistics table written by [`StatisticsTable::to_tsv`].
pub fn read_statistics_table<P: AsRef<Path>>(path: P) -> Result<StatisticsTable> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let mut lines = BufReader::new(File::open(path)?).lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(JoinError::parse(&source, 1, "missing header row")),
    };
    let role = header
        .split('\t')
        .next()
        .and_then(|col| col.strip_suffix("_header"))
        .and_then(QueryRole::from_prefix)
        .ok_or_else(|| JoinError::parse(&source, 1, format!("unrecognized header row '{}'", header)))?;
    if header.split('\t').collect::<Vec<_>>() != role.column_names() {
        return Err(JoinError::parse(&source, 1, format!("unexpected columns '{}'", header)));
    }

    let mut rows = Vec::new();
    for (idx, line_result) in lines.enumerate() {
        let line = line_result?;
        let line_no = idx + 2;
        if line.trim().is_empty() {
            continue;
        }
        let f: Vec<&str> = line.split('\t').collect();
        if f.len() != COLUMN_TEMPLATE.len() {
            return Err(JoinError::parse(
                &source,
                line_no,
                format!("expected {} columns, found {}", COLUMN_TEMPLATE.len(), f.len()),
            ));
        }
        let search_tool = SearchTool::from_label(f[12]).ok_or_else(|| {
            JoinError::parse(&source, line_no, format!("unknown search tool label '{}'", f[12]))
        })?;
        rows.push(StatisticsRow {
            query_header: (f[0] != MISSING).then(|| f[0].to_string()),
            bin_header: f[1].to_string(),
            pident: read_opt(f[2], "pident", &source, line_no)?,
            length: read_opt(f[3], "length", &source, line_no)?,
            mismatch: read_opt(f[4], "mismatch", &source, line_no)?,
            gapopen: read_opt(f[5], "gapopen", &source, line_no)?,
            query_start: read_opt(f[6], "query start", &source, line_no)?,
            query_end: read_opt(f[7], "query end", &source, line_no)?,
            bin_start: read_opt(f[8], "bin start", &source, line_no)?,
            bin_end: read_opt(f[9], "bin end", &source, line_no)?,
            evalue: read_opt(f[10], "evalue", &source, line_no)?,
            bitscore: read_opt(f[11], "bitscore", &source, line_no)?,
            search_tool,
        });
    }
    Ok(StatisticsTable { role, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment_stats::tests::record;
    use crate::types::{GeneFinderHit, MergedInterval};
    use tempfile::TempDir;

    #[test]
    fn test_search_tool_labels() {
        let recs = vec![record("q", "s", 1, 100, 180.0)];
        let mm = reformat_alignment_stats(&recs, QueryRole::Probe16s, "mmseqs").unwrap();
        assert_eq!(mm.rows[0].search_tool.label(), "MMseqs2");
        let bl = reformat_alignment_stats(&recs, QueryRole::Probe16s, "blast").unwrap();
        assert_eq!(bl.rows[0].search_tool.label(), "BLAST");
        for bad in ["diamond", "MMseqs2", "", "Blast"] {
            assert!(matches!(
                reformat_alignment_stats(&recs, QueryRole::Asv, bad),
                Err(JoinError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_column_names_follow_role() {
        let cols = QueryRole::Asv.column_names();
        assert_eq!(cols[0], "asv_header");
        assert_eq!(cols[1], "bin_header");
        assert_eq!(cols[6], "asv_start");
        assert_eq!(cols[9], "bin_end");
        assert_eq!(cols[12], "search_tool");
        assert_eq!(QueryRole::Probe16s.column_names()[7], "16s_end");
        assert_eq!(QueryRole::Bin.column_names()[1], "target_header");
    }

    #[test]
    fn test_relabel_copies_values() {
        let recs = vec![record("probe", "scaf", 10, 109, 180.0)];
        let table = reformat_alignment_stats(&recs, QueryRole::Probe16s, "blast").unwrap();
        let row = &table.rows[0];
        assert_eq!(row.query_header.as_deref(), Some("probe"));
        assert_eq!(row.bin_header, "scaf");
        assert_eq!(row.bin_start, Some(10));
        assert_eq!(row.bin_end, Some(109));
        assert_eq!(row.length, Some(100));
    }

    #[test]
    fn test_statistics_table_round_trip() {
        let recs = vec![record("probe", "scaf", 10, 109, 180.5)];
        let mut table = reformat_alignment_stats(&recs, QueryRole::Probe16s, "mmseqs").unwrap();
        table.rows.extend(gene_finder_statistics(&[AnnotatedInterval {
            interval: MergedInterval {
                target_id: "scaf".to_string(),
                start: 500,
                stop: 504,
                residues: "ACGT".to_string(),
            },
            annotation: Some(GeneFinderHit {
                target_id: "scaf".to_string(),
                feature_type: "rRNA".to_string(),
                start: 501,
                end: 504,
                score: Some(2.5e-30),
                strand: '+',
                attributes: "Name=16S_rRNA".to_string(),
            }),
        }]));

        let text = table.to_tsv();
        assert!(text.starts_with("16s_header\tbin_header\tpident"));
        assert!(text.contains("scaf:500-504\tscaf\tNA\t4\tNA"));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.tsv");
        std::fs::write(&path, &text).unwrap();
        let back = read_statistics_table(&path).unwrap();
        assert_eq!(back, table);
    }
}
