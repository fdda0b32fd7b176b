//! Record files: question, gold answer and candidate lists.
//!
//! A file is a sequence of blocks separated by lines holding a single `|`.
//! Inside a block, fields are separated by the `[content]` marker:
//!
//! ```text
//! |
//! [content]
//! This Italian city is home to the Uffizi
//! [content]
//! Florence
//! [content]
//! ['Florence', 'Rome', 'Uffizi']
//! |
//! ```
//!
//! Output files carry one more field, the reranked list.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::literal::{decode_list, encode_list};

pub const FIELD_MARKER: &str = "[content]";

static BLOCK_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\|\s*$").expect("Invalid block separator regex"));

/// One question with its retrieved candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub question: String,
    pub gold_answer: String,
    /// Candidates in upstream retrieval order, best first.
    pub preds: Vec<String>,
    /// Set once by the rerank pass; always a permutation of `preds`.
    pub reranked_preds: Option<Vec<String>>,
}

impl Record {
    pub fn new(
        question: impl Into<String>,
        gold_answer: impl Into<String>,
        preds: Vec<String>,
    ) -> Self {
        Self {
            question: question.into(),
            gold_answer: gold_answer.into(),
            preds,
            reranked_preds: None,
        }
    }

    /// The list metrics are computed over.
    pub fn evaluation_list(&self, use_reranked: bool) -> &[String] {
        match (&self.reranked_preds, use_reranked) {
            (Some(reranked), true) => reranked,
            _ => &self.preds,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Parse every well-formed block in `content`.
///
/// Blocks without the field marker, or with fewer than three fields after it,
/// are skipped.
pub fn parse_records(content: &str) -> Vec<Record> {
    let mut records = Vec::new();
    for (index, block) in BLOCK_SEPARATOR.split(content).enumerate() {
        match parse_block(block) {
            Some(record) => records.push(record),
            None if !block.trim().is_empty() => {
                tracing::debug!(block = index, "skipping malformed block");
            }
            None => {}
        }
    }
    records
}

fn parse_block(block: &str) -> Option<Record> {
    if !block.contains(FIELD_MARKER) {
        return None;
    }
    let parts: Vec<&str> = block.split(FIELD_MARKER).collect();
    if parts.len() < 4 {
        return None;
    }
    Some(Record::new(
        parts[1].trim(),
        parts[2].trim(),
        decode_list(parts[3].trim()),
    ))
}

/// Read and parse a record file.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<Record>, DatasetError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_records(&content))
}

/// Render records in the block format, followed by the reranked list (or the
/// original list when a record was never reranked).
pub fn render_records(records: &[Record]) -> String {
    let mut out = String::new();
    for record in records {
        let reranked = record.reranked_preds.as_ref().unwrap_or(&record.preds);
        out.push_str("|\n");
        out.push_str(FIELD_MARKER);
        out.push('\n');
        for field in [
            record.question.clone(),
            record.gold_answer.clone(),
            encode_list(&record.preds),
        ] {
            out.push_str(&field);
            out.push('\n');
            out.push_str(FIELD_MARKER);
            out.push('\n');
        }
        out.push_str(&encode_list(reranked));
        out.push_str("\n|\n");
    }
    out
}

/// Render and write records to `path`.
pub fn write_records(path: impl AsRef<Path>, records: &[Record]) -> Result<(), DatasetError> {
    let path = path.as_ref();
    std::fs::write(path, render_records(records)).map_err(|source| DatasetError::Write {
        path: path.display().to_string(),
        source,
    })
}
