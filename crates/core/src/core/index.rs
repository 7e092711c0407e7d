//! The associative word/context index both engines operate on.
//!
//! Words map to the sorted list of contexts they appear in; context ids are dense
//! positions in the context table. Nothing is ever removed, so every id handed out
//! stays valid for the life of the index.

use hashbrown::HashMap;

use crate::error::{BrainError, Result};

pub type ContextId = u32;

/// Marks the beginning of a learned line inside a context.
pub const START: &str = "<s>";
/// Marks the end of a learned line inside a context.
pub const END: &str = "</s>";

#[inline]
pub fn is_sentinel(word: &str) -> bool {
    word == START || word == END
}

#[derive(Debug, Clone, Default)]
pub struct ContextIndex {
    words: HashMap<String, Vec<ContextId>>,
    contexts: Vec<Vec<String>>,
    lookup: HashMap<Vec<String>, ContextId>,
    num_words: usize,
    num_contexts: usize,
}

/// Result of a consistency audit over the index tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexAudit {
    pub words: usize,
    pub contexts: usize,
    pub references: usize,
    /// Word -> context references pointing past the context table.
    pub orphaned_references: usize,
    /// Context members whose word entry does not list the context back.
    pub missing_backrefs: usize,
    /// Word keys that the tokenizer would not produce as-is.
    pub unnormalized_keys: usize,
    /// Identical word sequences stored under more than one id.
    pub duplicate_contexts: usize,
    pub counters_match: bool,
}

impl IndexAudit {
    pub fn is_healthy(&self) -> bool {
        self.orphaned_references == 0 && self.missing_backrefs == 0 && self.counters_match
    }
}

impl ContextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from persisted tables.
    ///
    /// Context ids are positions in `contexts`. Fails without building anything if a word
    /// references a context that does not exist.
    pub fn from_tables(
        words: impl IntoIterator<Item = (String, Vec<ContextId>)>,
        contexts: Vec<Vec<String>>,
    ) -> Result<Self> {
        let mut lookup = HashMap::with_capacity(contexts.len());
        for (id, seq) in contexts.iter().enumerate() {
            let id = ContextId::try_from(id)
                .map_err(|_| BrainError::format("context table too large"))?;
            lookup.entry(seq.clone()).or_insert(id);
        }

        let mut table: HashMap<String, Vec<ContextId>> = HashMap::new();
        for (word, mut ids) in words {
            if let Some(bad) = ids.iter().find(|&&id| id as usize >= contexts.len()) {
                return Err(BrainError::format(format!(
                    "word {word:?} references unknown context {bad}"
                )));
            }
            let merged = table.entry(word).or_default();
            merged.append(&mut ids);
            merged.sort_unstable();
            merged.dedup();
        }

        Ok(Self {
            num_words: table.len(),
            num_contexts: contexts.len(),
            words: table,
            contexts,
            lookup,
        })
    }

    /// Register `words` as a context, or return the id of the identical one already present.
    ///
    /// Sentinels are stored in the sequence but are not indexed as words.
    pub fn insert_context(&mut self, words: &[String]) -> ContextId {
        if let Some(&id) = self.lookup.get(words) {
            return id;
        }

        let id = self.contexts.len() as ContextId;
        self.contexts.push(words.to_vec());
        self.lookup.insert(words.to_vec(), id);
        self.num_contexts += 1;

        for word in words.iter().filter(|w| !is_sentinel(w)) {
            match self.words.get_mut(word.as_str()) {
                Some(ids) => {
                    // Fresh ids are always the largest, so pushing keeps the list sorted.
                    if ids.last() != Some(&id) {
                        ids.push(id);
                    }
                }
                None => {
                    self.words.insert(word.clone(), vec![id]);
                    self.num_words += 1;
                }
            }
        }
        id
    }

    /// Contexts `word` occurs in, ascending. Unseen words yield an empty slice.
    pub fn contexts_containing(&self, word: &str) -> &[ContextId] {
        self.words.get(word).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn context_words(&self, id: ContextId) -> Result<&[String]> {
        self.contexts
            .get(id as usize)
            .map(Vec::as_slice)
            .ok_or(BrainError::ContextNotFound(id))
    }

    pub fn contains_word(&self, word: &str) -> bool {
        !self.contexts_containing(word).is_empty()
    }

    pub fn occurrences(&self, word: &str) -> usize {
        self.contexts_containing(word).len()
    }

    pub fn num_words(&self) -> usize {
        self.num_words
    }

    pub fn num_contexts(&self) -> usize {
        self.num_contexts
    }

    pub fn words(&self) -> impl Iterator<Item = (&str, &[ContextId])> {
        self.words.iter().map(|(w, ids)| (w.as_str(), ids.as_slice()))
    }

    pub fn contexts(&self) -> &[Vec<String>] {
        &self.contexts
    }

    pub fn audit(&self) -> IndexAudit {
        let mut audit = IndexAudit {
            words: self.words.len(),
            contexts: self.contexts.len(),
            counters_match: self.num_words == self.words.len()
                && self.num_contexts == self.contexts.len(),
            duplicate_contexts: self.contexts.len().saturating_sub(self.lookup.len()),
            ..Default::default()
        };

        for (word, ids) in &self.words {
            audit.references += ids.len();
            audit.orphaned_references += ids
                .iter()
                .filter(|&&id| id as usize >= self.contexts.len())
                .count();
            if crate::tokenizer::tokenize(word).as_slice() != std::slice::from_ref(word) {
                audit.unnormalized_keys += 1;
            }
        }

        for (id, seq) in self.contexts.iter().enumerate() {
            let id = id as ContextId;
            for word in seq.iter().filter(|w| !is_sentinel(w)) {
                if self.contexts_containing(word).binary_search(&id).is_err() {
                    audit.missing_backrefs += 1;
                }
            }
        }
        audit
    }
}
