//! Current brain format: one JSON document.
//!
//! ```json
//! { "version": "1.3.0",
//!   "words":    { "cat": [0, 1, 2] },
//!   "contexts": { "0": ["<s>", "the", "cat"] },
//!   "lines":    { "0": "the cat sat on the mat" } }
//! ```
//!
//! `contexts` may be absent in documents produced by older tools; the index is then
//! rebuilt by relearning `lines`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::brain::Brain;
use crate::config::BrainConfig;
use crate::error::{BrainError, Result};
use crate::index::{ContextId, ContextIndex};
use crate::learn;
use crate::lines::{LineId, LineTable};
use crate::tokenizer;

pub const FORMAT_VERSION: &str = "1.3.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub words: BTreeMap<String, Vec<ContextId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<BTreeMap<ContextId, Vec<String>>>,
    pub lines: BTreeMap<LineId, String>,
}

impl Snapshot {
    /// Check the tables reference each other consistently.
    pub fn validate(&self) -> Result<()> {
        let Some(contexts) = &self.contexts else {
            return Ok(());
        };
        dense_ids(contexts)?;
        for (word, ids) in &self.words {
            if let Some(bad) = ids.iter().find(|&&id| id as usize >= contexts.len()) {
                return Err(BrainError::format(format!(
                    "word {word:?} references unknown context {bad}"
                )));
            }
        }
        Ok(())
    }

    fn into_tables(self, cfg: &BrainConfig) -> Result<(ContextIndex, LineTable)> {
        let lines = LineTable::from_lines(self.lines);
        let index = match self.contexts {
            Some(contexts) => {
                dense_ids(&contexts)?;
                ContextIndex::from_tables(self.words, contexts.into_values().collect())?
            }
            None if self.words.is_empty() => ContextIndex::new(),
            None => {
                warn!("Brain has no context table; rebuilding it from {} lines", lines.len());
                let mut index = ContextIndex::new();
                for (_, line) in lines.iter() {
                    learn::learn_tokens(
                        &mut index,
                        &tokenizer::tokenize(line),
                        cfg.context_width,
                    );
                }
                index
            }
        };
        Ok((index, lines))
    }
}

fn dense_ids(contexts: &BTreeMap<ContextId, Vec<String>>) -> Result<()> {
    // BTreeMap keys are sorted, so density means key == position.
    match contexts.keys().enumerate().find(|&(pos, &id)| pos as ContextId != id) {
        Some((pos, id)) => Err(BrainError::format(format!(
            "context ids must be dense: expected {pos}, found {id}"
        ))),
        None => Ok(()),
    }
}

/// Read and shape-check a JSON brain. Nothing is built if the document is malformed.
pub fn load_brain_json(path: &Path) -> Result<Snapshot> {
    let text = fs::read_to_string(path)?;
    parse_snapshot(&text)
}

pub fn parse_snapshot(text: &str) -> Result<Snapshot> {
    let doc: Value = serde_json::from_str(text)?;
    let Some(root) = doc.as_object() else {
        return Err(BrainError::format("brain document must be a JSON object"));
    };
    for table in ["words", "lines"] {
        match root.get(table) {
            Some(v) if v.is_object() => {}
            Some(_) => return Err(BrainError::format(format!("`{table}` must be a mapping"))),
            None => return Err(BrainError::format(format!("missing `{table}`"))),
        }
    }
    if let Some(v) = root.get("contexts") {
        if !v.is_object() {
            return Err(BrainError::format("`contexts` must be a mapping"));
        }
    }
    match root.get("version").and_then(Value::as_str) {
        Some(v) if v.starts_with("1.") => {}
        Some(v) => return Err(BrainError::format(format!("unsupported brain version {v}"))),
        None => return Err(BrainError::format("missing `version`")),
    }

    let snapshot: Snapshot =
        serde_json::from_value(doc).map_err(|e| BrainError::format(e.to_string()))?;
    snapshot.validate()?;
    Ok(snapshot)
}

/// Write `snapshot` to `path` atomically: a sibling temp file is fully written and synced,
/// then renamed over the previous brain.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    let written = (|| -> Result<()> {
        let file = File::create(&tmp)?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer(&mut w, snapshot)?;
        w.flush()?;
        w.get_ref().sync_all()?;
        Ok(())
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl Brain {
    pub fn to_snapshot(&self) -> Snapshot {
        let index = self.index();
        Snapshot {
            version: FORMAT_VERSION.to_string(),
            words: index
                .words()
                .map(|(w, ids)| (w.to_string(), ids.to_vec()))
                .collect(),
            contexts: Some(
                index
                    .contexts()
                    .iter()
                    .enumerate()
                    .map(|(id, seq)| (id as ContextId, seq.clone()))
                    .collect(),
            ),
            lines: self.lines().as_map().clone(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot, cfg: BrainConfig) -> Result<Self> {
        let (index, lines) = snapshot.into_tables(&cfg)?;
        Ok(Brain::from_parts(cfg, index, lines))
    }

    pub fn load_json(path: &Path, cfg: BrainConfig) -> Result<Self> {
        let brain = Self::from_snapshot(load_brain_json(path)?, cfg)?;
        let stats = brain.stats();
        info!(
            "Brain loaded from {:?}: {} words, {} contexts, {} lines",
            path, stats.words, stats.contexts, stats.lines
        );
        Ok(brain)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_snapshot(path, &self.to_snapshot())?;
        info!("Brain saved to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brain() -> Brain {
        let mut brain = Brain::new(BrainConfig::default().with_seed(11));
        brain.learn("the cat sat on the mat");
        brain.learn("the dog sat on the rug");
        brain
    }

    #[test]
    fn save_then_load_reproduces_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brains").join("current.borg.json");
        let before = brain();
        before.save_json(&path).unwrap();

        let after = Brain::load_json(&path, BrainConfig::default()).unwrap();
        assert_eq!(after.stats(), before.stats());
        for (word, ids) in before.index().words() {
            assert_eq!(after.index().contexts_containing(word), ids, "{word}");
        }
        assert_eq!(after.to_snapshot(), before.to_snapshot());
        assert!(!dir.path().join("brains").join("current.borg.json.tmp").exists());
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.json");
        let mut b = brain();
        b.save_json(&path).unwrap();
        b.learn("a brand new line");
        b.save_json(&path).unwrap();
        let loaded = Brain::load_json(&path, BrainConfig::default()).unwrap();
        assert_eq!(loaded.stats().lines, 3);
    }

    #[test]
    fn words_and_lines_must_be_mappings() {
        for doc in [
            r#"{"version":"1.3.0","words":[],"lines":{}}"#,
            r#"{"version":"1.3.0","words":{},"lines":"nope"}"#,
            r#"{"version":"1.3.0","lines":{}}"#,
            r#"[1,2,3]"#,
        ] {
            assert!(matches!(parse_snapshot(doc), Err(BrainError::Format(_))), "{doc}");
        }
    }

    #[test]
    fn rejects_orphaned_and_sparse_contexts() {
        let orphan = r#"{"version":"1.3.0","words":{"cat":[3]},"contexts":{"0":["cat"]},"lines":{}}"#;
        assert!(matches!(parse_snapshot(orphan), Err(BrainError::Format(_))));

        let sparse = r#"{"version":"1.3.0","words":{},"contexts":{"1":["cat"]},"lines":{}}"#;
        assert!(matches!(parse_snapshot(sparse), Err(BrainError::Format(_))));
    }

    #[test]
    fn rejects_unknown_major_version() {
        let doc = r#"{"version":"2.0.0","words":{},"lines":{}}"#;
        assert!(matches!(parse_snapshot(doc), Err(BrainError::Format(_))));
    }

    #[test]
    fn missing_context_table_is_rebuilt_from_lines() {
        let doc = r#"{"version":"1.3.0","words":{"cat":[0]},"lines":{"0":"the cat sat"}}"#;
        let snapshot = parse_snapshot(doc).unwrap();
        let brain = Brain::from_snapshot(snapshot, BrainConfig::default()).unwrap();
        assert_eq!(brain.stats().contexts, 3);
        assert_eq!(brain.stats().words, 3);
    }

    #[test]
    fn ids_round_trip_as_string_keys() {
        let json = serde_json::to_value(brain().to_snapshot()).unwrap();
        assert!(json["contexts"]["0"].is_array());
        assert!(json["lines"]["1"].is_string());
    }
}
