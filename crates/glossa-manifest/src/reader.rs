//! Manifest reading and writing
//!
//! Both directions are pull-based: [`RecordReader`] yields one decoded line at
//! a time and [`records`] yields one encoded line at a time, so consumers set
//! the pace.

use crate::error::ManifestError;
use crate::model::{Manifest, ManifestRecord};
use std::iter::Enumerate;
use std::str::Lines;

/// Iterator over the non-blank lines of a manifest
///
/// Yields `(line_number, record)` with 1-based line numbers.
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    lines: Enumerate<Lines<'a>>,
}

impl<'a> RecordReader<'a> {
    #[must_use]
    pub fn new(content: &'a str) -> Self {
        Self {
            lines: content.lines().enumerate(),
        }
    }
}

impl Iterator for RecordReader<'_> {
    type Item = (usize, Result<ManifestRecord, ManifestError>);

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, line) in self.lines.by_ref() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let record = serde_json::from_str::<ManifestRecord>(line)
                .map_err(|e| ManifestError::malformed(line_no, e.to_string()));
            return Some((line_no, record));
        }
        None
    }
}

/// Parse a manifest
///
/// Malformed lines are skipped with a warning. Only the first header counts.
///
/// # Errors
/// `ManifestError::NoHeader` if no valid header record exists
pub fn parse(content: &str) -> Result<Manifest, ManifestError> {
    let mut header = None;
    let mut entries = Vec::new();

    for (line, record) in RecordReader::new(content) {
        match record {
            Ok(ManifestRecord::Header(h)) => {
                if header.is_none() {
                    header = Some(h);
                } else {
                    tracing::debug!(line, "ignoring repeated manifest header");
                }
            }
            Ok(ManifestRecord::File { entry }) => entries.push(entry),
            Ok(ManifestRecord::Unknown) => {
                tracing::debug!(line, "ignoring unknown manifest record type");
            }
            Err(err) => tracing::warn!(line, error = %err, "skipping malformed manifest record"),
        }
    }

    let header = header.ok_or(ManifestError::NoHeader)?;
    Ok(Manifest::new(header, entries))
}

/// Encode a manifest line by line: header first, then every entry
pub fn records(manifest: &Manifest) -> impl Iterator<Item = String> + '_ {
    std::iter::once(ManifestRecord::Header(manifest.header().clone()))
        .chain(
            manifest
                .entries()
                .iter()
                .map(|entry| ManifestRecord::File {
                    entry: entry.clone(),
                }),
        )
        .map(|record| serde_json::to_string(&record).unwrap_or_default())
}

/// Encode a whole manifest, one record per line
#[must_use]
pub fn serialize(manifest: &Manifest) -> String {
    let mut out = String::new();
    for line in records(manifest) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}
