//src/fasta.rs

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind};
use std::path::Path;

use ahash::AHashSet;
use flate2::read::MultiGzDecoder;

use crate::error::Result;
use crate::types::SequenceRecord;

/// Header -> record, ordered by header.
pub type SequenceTable = BTreeMap<String, SequenceRecord>;

fn open_maybe_gz(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let f = File::open(path)?;
    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    Ok(if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    })
}

/// Parse FASTA text. Only the first whitespace-delimited token of a header
/// is kept. Sequence text before the first header is an error.
pub fn parse_fasta<R: BufRead>(reader: R) -> io::Result<Vec<SequenceRecord>> {
    let mut records = Vec::new();
    let mut current: Option<SequenceRecord> = None;

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(header_line) = line.strip_prefix('>') {
            if let Some(done) = current.take() {
                records.push(done);
            }
            let header = header_line.split_whitespace().next().unwrap_or("");
            current = Some(SequenceRecord {
                header: header.to_string(),
                residues: String::new(),
            });
        } else {
            match current.as_mut() {
                Some(rec) => rec.residues.push_str(line.trim()),
                None => {
                    return Err(io::Error::new(
                        ErrorKind::InvalidData,
                        format!("line {}: sequence data before the first '>' header", idx + 1),
                    ))
                }
            }
        }
    }
    if let Some(done) = current {
        records.push(done);
    }
    Ok(records)
}

/// Load a FASTA file into a header-ordered table, optionally keeping only
/// the headers in `headers`.
///
/// An upstream tool may legitimately write nothing, so an empty file gives
/// an empty table. Unreadable or unparseable input also gives an empty table
/// and logs a warning rather than failing the stage.
pub fn read_fasta_records<P: AsRef<Path>>(
    path: P,
    headers: Option<&AHashSet<String>>,
) -> SequenceTable {
    let path = path.as_ref();
    let mut table = SequenceTable::new();

    let records = match open_maybe_gz(path).and_then(parse_fasta) {
        Ok(records) => records,
        Err(e) => {
            log::warn!(
                "Could not read sequences from {}: {}; continuing with no sequences from this file",
                path.display(),
                e
            );
            return table;
        }
    };

    for rec in records {
        if let Some(keep) = headers {
            if !keep.contains(&rec.header) {
                continue;
            }
        }
        table.insert(rec.header.clone(), rec);
    }
    log::debug!("Read {} sequences from {}", table.len(), path.display());
    table
}

/// Render records as FASTA, one unwrapped sequence line per record.
/// A non-empty `description` is appended to the header after a space.
pub fn fasta_text<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str, &'a str)>,
{
    let mut output = String::new();
    for (header, description, residues) in records {
        output.push('>');
        output.push_str(header);
        if !description.is_empty() {
            output.push(' ');
            output.push_str(description);
        }
        output.push('\n');
        output.push_str(residues);
        output.push('\n');
    }
    output
}

/// Copy the entries of `in_path` whose header is in `headers` to `out_path`.
pub fn pull_sequences_by_header<P: AsRef<Path>, Q: AsRef<Path>>(
    in_path: P,
    out_path: Q,
    headers: &AHashSet<String>,
) -> Result<usize> {
    let table = read_fasta_records(in_path, Some(headers));
    let text = fasta_text(
        table
            .values()
            .map(|rec| (rec.header.as_str(), "", rec.residues.as_str())),
    );
    std::fs::write(out_path, text)?;
    Ok(table.len())
}
