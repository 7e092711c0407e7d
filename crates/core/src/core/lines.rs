//! Raw line records, kept verbatim next to the tokenized contexts.

use std::collections::BTreeMap;

use hashbrown::HashSet;

use crate::tokenizer;

pub type LineId = u64;

#[derive(Debug, Clone)]
pub struct LineTable {
    lines: BTreeMap<LineId, String>,
    // `None` once the id space above the highest id is used up.
    next_id: Option<LineId>,
    // Normalized renderings of every recorded line; replies equal to one of these are echoes.
    normalized: HashSet<String>,
}

impl Default for LineTable {
    fn default() -> Self {
        Self {
            lines: BTreeMap::new(),
            next_id: Some(0),
            normalized: HashSet::new(),
        }
    }
}

impl LineTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(lines: BTreeMap<LineId, String>) -> Self {
        let next_id = match lines.keys().next_back() {
            Some(&last) => last.checked_add(1),
            None => Some(0),
        };
        let normalized = lines.values().map(|l| tokenizer::normalize_line(l)).collect();
        Self {
            lines,
            next_id,
            normalized,
        }
    }

    /// Store `text` under a freshly allocated id. Repeats are recorded again.
    pub fn record(&mut self, text: &str) -> LineId {
        let id = match self.next_id {
            Some(id) => {
                self.next_id = id.checked_add(1);
                id
            }
            None => self.first_free_id(),
        };
        self.normalized.insert(tokenizer::normalize_line(text));
        self.lines.insert(id, text.to_string());
        id
    }

    /// Lowest id not in use. Only reached after an id of `u64::MAX` was loaded.
    fn first_free_id(&self) -> LineId {
        let mut candidate: LineId = 0;
        for &id in self.lines.keys() {
            if id != candidate {
                break;
            }
            candidate = candidate.saturating_add(1);
        }
        candidate
    }

    pub fn get(&self, id: LineId) -> Option<&str> {
        self.lines.get(&id).map(String::as_str)
    }

    /// True if the rendered `reply` equals the normalized form of a learned line.
    pub fn is_echo(&self, reply: &str) -> bool {
        self.normalized.contains(reply)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LineId, &str)> {
        self.lines.iter().map(|(&id, l)| (id, l.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<LineId, String> {
        &self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_keep_growing_after_reload() {
        let mut table = LineTable::new();
        table.record("one");
        table.record("two");
        let reloaded = LineTable::from_lines(table.as_map().clone());
        let mut reloaded = reloaded;
        assert_eq!(reloaded.record("three"), 2);
        assert_eq!(reloaded.get(0), Some("one"));
    }

    #[test]
    fn duplicates_are_recorded_again() {
        let mut table = LineTable::new();
        let a = table.record("same line");
        let b = table.record("same line");
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn echo_detection_uses_normalized_form() {
        let mut table = LineTable::new();
        table.record("The Cat sat.");
        assert!(table.is_echo("the cat sat"));
        assert!(!table.is_echo("the cat"));
    }

    #[test]
    fn ids_wrap_into_free_slots_after_the_top_id() {
        let mut lines = BTreeMap::new();
        lines.insert(0, "the first line".to_string());
        lines.insert(u64::MAX, "the last line".to_string());
        let mut table = LineTable::from_lines(lines);

        assert_eq!(table.record("a new line"), 1);
        assert_eq!(table.record("another one"), 2);
        assert_eq!(table.get(0), Some("the first line"));
        assert_eq!(table.get(u64::MAX), Some("the last line"));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn recording_at_the_top_id_keeps_going() {
        let mut lines = BTreeMap::new();
        lines.insert(u64::MAX - 1, "near the top".to_string());
        let mut table = LineTable::from_lines(lines);

        assert_eq!(table.record("top"), u64::MAX);
        assert_eq!(table.record("wrapped"), 0);
        assert_eq!(table.len(), 3);
    }
}
