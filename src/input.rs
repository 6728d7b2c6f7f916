//! Reads documents for upsert from JSON Lines files.
//!
//! Each non-empty line is an object:
//!
//! ```json
//! {"text": "Qdrant is a vector database.", "metadata": {"source": "docs"}, "id": "doc-1"}
//! ```
//!
//! `metadata` and `id` are optional, but `id` must be given on every line or
//! on none.
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::domain::document::{Metadata, UpsertRequest};

#[derive(Debug, Deserialize)]
struct InputLine {
    text: String,
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    id: Option<String>,
}

pub fn read_jsonl(path: &Path) -> Result<UpsertRequest> {
    let file = File::open(path).with_context(|| format!("Failed to open input file {:?}", path))?;
    let mut texts = Vec::new();
    let mut metadatas = Vec::new();
    let mut ids = Vec::new();
    let mut any_metadata = false;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {} of {:?}", index + 1, path))?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: InputLine = serde_json::from_str(&line)
            .with_context(|| format!("Invalid JSON on line {} of {:?}", index + 1, path))?;
        any_metadata |= parsed.metadata.is_some();
        texts.push(parsed.text);
        metadatas.push(parsed.metadata.unwrap_or_default());
        ids.push(parsed.id);
    }

    let with_ids = ids.iter().filter(|id| id.is_some()).count();
    let ids = if with_ids == 0 {
        None
    } else if with_ids == ids.len() {
        Some(ids.into_iter().flatten().collect())
    } else {
        return Err(anyhow!(
            "{:?}: {} of {} lines have an id; give an id on every line or on none",
            path,
            with_ids,
            ids.len()
        ));
    };

    log::info!("Read {} documents from {:?}", texts.len(), path);
    Ok(UpsertRequest::new(
        texts,
        if any_metadata { Some(metadatas) } else { None },
        ids,
    ))
}
