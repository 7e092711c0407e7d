//! Learn engine: cut a token sequence into sliding-window contexts and index them.

use crate::index::{ContextIndex, END, START};

/// What a single `learn` call added to the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearnOutcome {
    pub new_words: usize,
    pub new_contexts: usize,
}

/// Sliding windows of `width` over the tokens padded with start/end sentinels.
///
/// A line of `n` tokens yields `n + 3 - width` windows (at least one). Empty input yields none.
pub fn context_windows(tokens: &[String], width: usize) -> Vec<Vec<String>> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut padded = Vec::with_capacity(tokens.len() + 2);
    padded.push(START.to_string());
    padded.extend(tokens.iter().cloned());
    padded.push(END.to_string());

    if padded.len() <= width {
        return vec![padded];
    }
    padded.windows(width).map(<[String]>::to_vec).collect()
}

pub fn learn_tokens(index: &mut ContextIndex, tokens: &[String], width: usize) -> LearnOutcome {
    let words_before = index.num_words();
    let contexts_before = index.num_contexts();
    for window in context_windows(tokens, width) {
        index.insert_context(&window);
    }
    LearnOutcome {
        new_words: index.num_words() - words_before,
        new_contexts: index.num_contexts() - contexts_before,
    }
}
