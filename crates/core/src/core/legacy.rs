//! Reader for the legacy (1.2) brain archive and its one-way upgrade to the JSON snapshot.
//!
//! The archive is a folder of typed records: LZ4 chunks holding the word table (`WORD`),
//! the context table (`CTXS`) and the raw lines (`LINE`). It carries no schema version.
//! Older writers stored some keys as raw byte strings instead of text; those are decoded
//! ("unicode repair") while loading so the upgraded brain has one text key per word.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

use tracing::{info, warn};

use crate::brain::Brain;
use crate::config::BrainConfig;
use crate::error::{BrainError, Result};
use crate::index::ContextId;
use crate::lines::LineId;
use crate::snapshot::{self, Snapshot, FORMAT_VERSION};
use crate::storage;

const TAG_WORDS: [u8; 4] = *b"WORD";
const TAG_CONTEXTS: [u8; 4] = *b"CTXS";
const TAG_LINES: [u8; 4] = *b"LINE";

/// How a string was stored in the archive.
const KIND_TEXT: u8 = 0;
const KIND_BYTES: u8 = 1;

/// Counts of the encoding fixes applied while reading an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Byte-string keys decoded as UTF-8.
    pub decoded_keys: usize,
    /// Keys that were not valid UTF-8 and were decoded as Latin-1.
    pub latin1_fallbacks: usize,
    /// Repaired word keys that collided with an existing key and were merged into it.
    pub merged_keys: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LegacyBrain {
    pub words: BTreeMap<String, Vec<ContextId>>,
    /// Absent in archives written before contexts were stored; rebuilt from `lines` then.
    pub contexts: Option<Vec<Vec<String>>>,
    pub lines: BTreeMap<LineId, String>,
    pub repairs: RepairReport,
}

impl LegacyBrain {
    pub fn into_snapshot(self) -> Snapshot {
        Snapshot {
            version: FORMAT_VERSION.to_string(),
            words: self.words,
            contexts: self.contexts.map(|contexts| {
                contexts
                    .into_iter()
                    .enumerate()
                    .map(|(id, seq)| (id as ContextId, seq))
                    .collect()
            }),
            lines: self.lines,
        }
    }
}

/// Summary of an upgrade run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpgradeReport {
    pub words: usize,
    pub contexts: usize,
    pub lines: usize,
    pub repairs: RepairReport,
}

/// Open a legacy archive read-only and decode it.
pub fn load_brain_legacy(path: &Path) -> Result<LegacyBrain> {
    let file = File::open(path)?;
    let brain = read_archive(&mut BufReader::new(file))?;
    info!(
        "Loaded legacy archive {:?}: {} words, {} contexts, {} lines",
        path,
        brain.words.len(),
        brain.contexts.as_ref().map_or(0, Vec::len),
        brain.lines.len()
    );
    Ok(brain)
}

/// Convert a legacy archive into a current-format JSON brain at `dest`.
///
/// The archive is only read. The result is validated before it is written, and an
/// archive without a context table gets one rebuilt from its lines.
pub fn upgrade(src: &Path, dest: &Path) -> Result<UpgradeReport> {
    if same_file(src, dest)? {
        return Err(BrainError::format(format!(
            "upgrade would overwrite its input {:?}",
            src
        )));
    }
    let legacy = load_brain_legacy(src)?;
    let repairs = legacy.repairs;
    let mut snapshot = legacy.into_snapshot();
    snapshot.validate()?;
    if snapshot.contexts.is_none() {
        snapshot = Brain::from_snapshot(snapshot, BrainConfig::default())?.to_snapshot();
    }

    let report = UpgradeReport {
        words: snapshot.words.len(),
        contexts: snapshot.contexts.as_ref().map_or(0, BTreeMap::len),
        lines: snapshot.lines.len(),
        repairs,
    };
    snapshot::save_snapshot(dest, &snapshot)?;
    info!("Upgraded {:?} -> {:?} (version {})", src, dest, FORMAT_VERSION);
    Ok(report)
}

fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    if !b.exists() {
        return Ok(false);
    }
    Ok(a.canonicalize()? == b.canonicalize()?)
}

/// Whether the file at `path` starts with the legacy archive magic.
pub fn is_legacy_archive(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    match storage::read_exact::<8, _>(&mut file) {
        Ok(magic) => Ok(&magic == storage::LEGACY_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn read_archive<R: Read>(r: &mut R) -> Result<LegacyBrain> {
    let magic = storage::read_exact::<8, _>(r)
        .map_err(|_| BrainError::format("not a legacy brain archive (too short)"))?;
    if &magic != storage::LEGACY_MAGIC {
        return Err(BrainError::format("bad legacy archive magic"));
    }

    let mut repairs = RepairReport::default();
    let mut words: Option<BTreeMap<String, Vec<ContextId>>> = None;
    let mut contexts: Option<Vec<Vec<String>>> = None;
    let mut lines: Option<BTreeMap<LineId, String>> = None;

    loop {
        let (tag, len) = match storage::read_chunk_header(r) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        let payload = storage::read_lz4_payload(r, len).map_err(corrupt)?;
        let mut cursor = Cursor::new(payload);
        match tag {
            TAG_WORDS => words = Some(read_words(&mut cursor, &mut repairs).map_err(corrupt)?),
            TAG_CONTEXTS => {
                contexts = Some(read_contexts(&mut cursor, &mut repairs).map_err(corrupt)?)
            }
            TAG_LINES => lines = Some(read_lines(&mut cursor, &mut repairs).map_err(corrupt)?),
            _ => {
                // Unknown chunk: skipped.
            }
        }
    }

    let words = words.ok_or_else(|| BrainError::format("legacy archive is missing WORD"))?;
    let lines = lines.ok_or_else(|| BrainError::format("legacy archive is missing LINE"))?;

    if repairs != RepairReport::default() {
        warn!(
            decoded = repairs.decoded_keys,
            latin1 = repairs.latin1_fallbacks,
            merged = repairs.merged_keys,
            "Repaired byte-string keys in legacy archive"
        );
    }

    Ok(LegacyBrain {
        words,
        contexts,
        lines,
        repairs,
    })
}

fn corrupt(e: io::Error) -> BrainError {
    BrainError::format(format!("corrupt legacy archive: {e}"))
}

fn read_words(
    r: &mut Cursor<Vec<u8>>,
    repairs: &mut RepairReport,
) -> io::Result<BTreeMap<String, Vec<ContextId>>> {
    let count = storage::read_u32_le(r)?;
    let mut words: BTreeMap<String, Vec<ContextId>> = BTreeMap::new();
    for _ in 0..count {
        let (key, repaired) = read_string(r, repairs)?;
        let n = storage::read_u32_le(r)?;
        let mut ids = Vec::with_capacity((n as usize).min(1 << 16));
        for _ in 0..n {
            ids.push(storage::read_u32_le(r)?);
        }

        let entry = words.entry(key);
        if repaired && matches!(entry, std::collections::btree_map::Entry::Occupied(_)) {
            repairs.merged_keys += 1;
        }
        let merged = entry.or_default();
        merged.extend(ids);
        merged.sort_unstable();
        merged.dedup();
    }
    Ok(words)
}

fn read_contexts(
    r: &mut Cursor<Vec<u8>>,
    repairs: &mut RepairReport,
) -> io::Result<Vec<Vec<String>>> {
    let count = storage::read_u32_le(r)?;
    let mut contexts = Vec::with_capacity((count as usize).min(1 << 16));
    for _ in 0..count {
        let n = storage::read_u32_le(r)?;
        let mut seq = Vec::with_capacity((n as usize).min(64));
        for _ in 0..n {
            seq.push(read_string(r, repairs)?.0);
        }
        contexts.push(seq);
    }
    Ok(contexts)
}

fn read_lines(
    r: &mut Cursor<Vec<u8>>,
    repairs: &mut RepairReport,
) -> io::Result<BTreeMap<LineId, String>> {
    let count = storage::read_u32_le(r)?;
    let mut lines = BTreeMap::new();
    for _ in 0..count {
        let id = storage::read_u64_le(r)?;
        lines.insert(id, read_string(r, repairs)?.0);
    }
    Ok(lines)
}

/// Read a tagged string. Returns the text and whether it needed repair.
fn read_string(r: &mut Cursor<Vec<u8>>, repairs: &mut RepairReport) -> io::Result<(String, bool)> {
    let kind = storage::read_u8(r)?;
    let bytes = storage::read_bytes(r)?;
    match kind {
        KIND_TEXT | KIND_BYTES => {}
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown string kind {other}"),
            ))
        }
    }

    match String::from_utf8(bytes) {
        Ok(text) if kind == KIND_TEXT => Ok((text, false)),
        Ok(text) => {
            repairs.decoded_keys += 1;
            Ok((text, true))
        }
        Err(e) => {
            repairs.latin1_fallbacks += 1;
            let text = e.into_bytes().into_iter().map(char::from).collect();
            Ok((text, true))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixture::{archive, archive_without_contexts, Key};
    use super::*;

    fn cafe_archive() -> Vec<u8> {
        archive(
            &[
                (Key::Text("café"), &[0]),
                (Key::Bytes(b"caf\xc3\xa9"), &[1]),
                (Key::Bytes(b"\xc3\xa9"), &[1]),
                (Key::Text("noir"), &[0]),
            ],
            &[&["<s>", "café", "noir"], &["café", "é", "</s>"]],
            &[(0, "café noir"), (1, "café é")],
        )
    }

    #[test]
    fn byte_string_keys_are_decoded_and_merged() {
        let brain = read_archive(&mut Cursor::new(cafe_archive())).unwrap();
        assert_eq!(brain.words.get("é"), Some(&vec![1]));
        assert_eq!(brain.words.get("café"), Some(&vec![0, 1]));
        assert_eq!(brain.words.len(), 3);
        assert_eq!(brain.repairs.decoded_keys, 2);
        assert_eq!(brain.repairs.merged_keys, 1);
        assert_eq!(brain.lines.get(&1).map(String::as_str), Some("café é"));
    }

    #[test]
    fn invalid_utf8_falls_back_to_latin1() {
        let bytes = archive(
            &[(Key::Bytes(b"na\xefve"), &[0])],
            &[&["<s>", "naïve", "</s>"]],
            &[(0, "naïve")],
        );
        let brain = read_archive(&mut Cursor::new(bytes)).unwrap();
        assert!(brain.words.contains_key("naïve"));
        assert_eq!(brain.repairs.latin1_fallbacks, 1);
    }

    #[test]
    fn rejects_foreign_files() {
        let err = read_archive(&mut Cursor::new(b"{\"words\":{}}".to_vec())).unwrap_err();
        assert!(matches!(err, BrainError::Format(_)));
    }

    #[test]
    fn missing_tables_are_a_format_error() {
        let bytes = storage::LEGACY_MAGIC.to_vec();
        let err = read_archive(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, BrainError::Format(_)));
    }

    #[test]
    fn upgrade_writes_current_format_and_leaves_input_alone() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("archive.borg");
        let dest = dir.path().join("current.borg.json");
        let original = cafe_archive();
        std::fs::write(&src, &original).unwrap();

        let report = upgrade(&src, &dest).unwrap();
        assert_eq!(report.words, 3);
        assert_eq!(report.contexts, 2);
        assert_eq!(report.lines, 2);
        assert_eq!(std::fs::read(&src).unwrap(), original);

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(doc["version"], FORMAT_VERSION);
        assert_eq!(doc["words"]["é"], serde_json::json!([1]));
        assert_eq!(doc["words"].as_object().unwrap().len(), 3);
    }

    #[test]
    fn upgrade_refuses_inconsistent_archives() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("archive.borg");
        let dest = dir.path().join("current.borg.json");
        std::fs::write(&src, archive(&[(Key::Text("ghost"), &[9])], &[], &[])).unwrap();

        assert!(matches!(upgrade(&src, &dest), Err(BrainError::Format(_))));
        assert!(!dest.exists());
    }

    #[test]
    fn archives_without_contexts_are_rebuilt_from_lines() {
        let bytes = archive_without_contexts(
            &[(Key::Text("cat"), &[0]), (Key::Bytes(b"caf\xc3\xa9"), &[1])],
            &[(0, "the cat sat"), (1, "café noir")],
        );
        let legacy = read_archive(&mut Cursor::new(bytes.clone())).unwrap();
        assert!(legacy.contexts.is_none());
        assert_eq!(legacy.repairs.decoded_keys, 1);

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("archive.borg");
        let dest = dir.path().join("current.borg.json");
        std::fs::write(&src, &bytes).unwrap();

        let report = upgrade(&src, &dest).unwrap();
        assert_eq!(report.lines, 2);
        // "the cat sat" and "café noir" padded to width 3: three windows plus two.
        assert_eq!(report.contexts, 5);
        assert_eq!(report.words, 5);

        let brain = Brain::load_json(&dest, BrainConfig::default()).unwrap();
        assert_eq!(brain.stats().contexts, 5);
        assert!(brain.audit().is_healthy());
        assert!(brain.index().contains_word("café"));
    }

    #[test]
    fn upgrade_never_targets_its_own_input() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("archive.borg");
        let original = cafe_archive();
        std::fs::write(&src, &original).unwrap();

        let alias = dir.path().join(".").join("archive.borg");
        assert!(matches!(upgrade(&src, &alias), Err(BrainError::Format(_))));
        assert_eq!(std::fs::read(&src).unwrap(), original);
    }

    #[test]
    fn sniffs_the_archive_magic() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("archive.borg");
        let json = dir.path().join("current.borg.json");
        let empty = dir.path().join("empty");
        std::fs::write(&legacy, cafe_archive()).unwrap();
        std::fs::write(&json, r#"{"version":"1.3.0","words":{},"lines":{}}"#).unwrap();
        std::fs::write(&empty, b"").unwrap();

        assert!(is_legacy_archive(&legacy).unwrap());
        assert!(!is_legacy_archive(&json).unwrap());
        assert!(!is_legacy_archive(&empty).unwrap());
    }
}
