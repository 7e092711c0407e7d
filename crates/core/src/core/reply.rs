//! Reply engine: anchor on the rarest known stimulus word, then walk the index outward.
//!
//! The walk starts from one context containing the seed and repeatedly extends the output
//! at either boundary with the neighbours found in another context containing the boundary
//! word. Candidate contexts are taken in ascending id order, so a fixed PRNG seed over an
//! unchanged index always produces the same text.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::Result;
use crate::index::{is_sentinel, ContextId, ContextIndex, END, START};
use crate::lines::LineTable;
use crate::prng::Prng;
use crate::tokenizer;

/// Limits applied to a single reply.
#[derive(Debug, Clone, Copy)]
pub struct ReplyPolicy {
    pub max_words: usize,
    pub attempts: usize,
}

/// A generated reply plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOutcome {
    pub text: Option<String>,
    pub seed: Option<String>,
    pub attempts: usize,
    /// The retry budget ran out and `text` repeats a learned line verbatim.
    pub echoed: bool,
}

impl ReplyOutcome {
    fn silent() -> Self {
        Self {
            text: None,
            seed: None,
            attempts: 0,
            echoed: false,
        }
    }
}

/// Rarest stimulus token present in the index; ties go to the lexicographically smallest word.
pub fn pick_seed<'a>(index: &ContextIndex, tokens: &'a [String]) -> Option<&'a str> {
    tokens
        .iter()
        .filter(|t| index.contains_word(t))
        .min_by(|a, b| {
            index
                .occurrences(a)
                .cmp(&index.occurrences(b))
                .then_with(|| a.cmp(b))
        })
        .map(String::as_str)
}

pub fn reply(
    index: &ContextIndex,
    lines: &LineTable,
    stimulus: &str,
    policy: ReplyPolicy,
    rng: &mut Prng,
) -> Result<ReplyOutcome> {
    let tokens = tokenizer::tokenize(stimulus);
    let Some(seed) = pick_seed(index, &tokens) else {
        debug!("no known word in stimulus; no reply");
        return Ok(ReplyOutcome::silent());
    };

    let mut last_echo = None;
    let mut attempts = 0;
    while attempts < policy.attempts {
        attempts += 1;
        let words = walk(index, seed, policy.max_words, rng)?;
        if words.is_empty() {
            continue;
        }
        let text = tokenizer::render(&words);
        if !lines.is_echo(&text) {
            return Ok(ReplyOutcome {
                text: Some(text),
                seed: Some(seed.to_string()),
                attempts,
                echoed: false,
            });
        }
        debug!(attempt = attempts, "reply repeats a learned line; retrying");
        last_echo = Some(text);
    }

    let echoed = last_echo.is_some();
    if echoed {
        warn!(seed, attempts, "retry budget exhausted; replying with a learned line");
    }
    Ok(ReplyOutcome {
        text: last_echo,
        seed: Some(seed.to_string()),
        attempts,
        echoed,
    })
}

/// One generation walk around `seed`. Returns the words without sentinels.
pub fn walk(
    index: &ContextIndex,
    seed: &str,
    max_words: usize,
    rng: &mut Prng,
) -> Result<Vec<String>> {
    let Some(&start) = rng.choose(index.contexts_containing(seed)) else {
        return Ok(Vec::new());
    };

    let mut out: VecDeque<String> = index.context_words(start)?.iter().cloned().collect();
    trim_to_budget(&mut out, seed, max_words);

    // Each extension adds at least one word, so this bounds the loop even on cycles.
    let step_limit = max_words.saturating_mul(2).max(4);

    let mut steps = 0;
    while steps < step_limit && word_count(&out) < max_words {
        steps += 1;
        let (Some(boundary), prev) = (out.back(), out.len().checked_sub(2).map(|i| &out[i]))
        else {
            break;
        };
        if boundary == END {
            break;
        }
        let Some((id, pos)) = pick_extension(index, boundary, prev, Side::Right, rng)? else {
            break;
        };
        let room = max_words - word_count(&out);
        let tail = &index.context_words(id)?[pos + 1..];
        out.extend(take_words(tail.iter(), room));
    }

    steps = 0;
    while steps < step_limit && word_count(&out) < max_words {
        steps += 1;
        let (Some(boundary), next) = (out.front(), out.get(1)) else {
            break;
        };
        if boundary == START {
            break;
        }
        let Some((id, pos)) = pick_extension(index, boundary, next, Side::Left, rng)? else {
            break;
        };
        let room = max_words - word_count(&out);
        let head = &index.context_words(id)?[..pos];
        for word in take_words(head.iter().rev(), room) {
            out.push_front(word);
        }
    }

    Ok(out.into_iter().filter(|w| !is_sentinel(w)).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Choose a context that can extend the output past `boundary` on `side`.
///
/// Contexts that also agree with the word next to the boundary (`anchor`) are preferred;
/// otherwise any context with a neighbour on that side qualifies.
fn pick_extension(
    index: &ContextIndex,
    boundary: &str,
    anchor: Option<&String>,
    side: Side,
    rng: &mut Prng,
) -> Result<Option<(ContextId, usize)>> {
    let mut loose: Vec<(ContextId, usize)> = Vec::new();
    let mut tight: Vec<(ContextId, usize)> = Vec::new();

    for &id in index.contexts_containing(boundary) {
        let words = index.context_words(id)?;
        let Some(pos) = position_with_neighbour(words, boundary, side) else {
            continue;
        };
        let agrees = match (side, anchor) {
            (Side::Right, Some(a)) => pos > 0 && &words[pos - 1] == a,
            (Side::Left, Some(a)) => words.get(pos + 1) == Some(a),
            (_, None) => false,
        };
        if agrees {
            tight.push((id, pos));
        }
        loose.push((id, pos));
    }

    let pool = if tight.is_empty() { &loose } else { &tight };
    Ok(rng.choose(pool).copied())
}

fn position_with_neighbour(words: &[String], boundary: &str, side: Side) -> Option<usize> {
    match side {
        Side::Right => words[..words.len().saturating_sub(1)]
            .iter()
            .position(|w| w == boundary),
        Side::Left => words
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, w)| *w == boundary)
            .map(|(i, _)| i),
    }
}

/// Take words in order until `room` real words were taken; sentinels are free.
fn take_words<'a>(words: impl Iterator<Item = &'a String>, room: usize) -> Vec<String> {
    let mut taken = Vec::new();
    let mut real = 0;
    for word in words {
        if !is_sentinel(word) {
            if real == room {
                break;
            }
            real += 1;
        }
        taken.push(word.clone());
    }
    taken
}

fn word_count(out: &VecDeque<String>) -> usize {
    out.iter().filter(|w| !is_sentinel(w)).count()
}

/// Shrink the starting context around `seed` until it fits in `max_words`.
fn trim_to_budget(out: &mut VecDeque<String>, seed: &str, max_words: usize) {
    while word_count(out) > max_words {
        let seed_pos = out.iter().position(|w| w == seed).unwrap_or(0);
        if out.len() - 1 - seed_pos >= seed_pos {
            out.pop_back();
        } else {
            out.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learn::learn_tokens;

    fn indexed(lines: &[&str]) -> (ContextIndex, LineTable) {
        let mut index = ContextIndex::new();
        let mut table = LineTable::new();
        for line in lines {
            learn_tokens(&mut index, &tokenizer::tokenize(line), 3);
            table.record(line);
        }
        (index, table)
    }

    fn policy() -> ReplyPolicy {
        ReplyPolicy {
            max_words: 30,
            attempts: 8,
        }
    }

    #[test]
    fn seed_prefers_rare_words_then_alphabetical() {
        let (index, _) = indexed(&["the cat sat on the mat", "the dog sat on the rug"]);
        let tokens = tokenizer::tokenize("the cat");
        assert_eq!(pick_seed(&index, &tokens), Some("cat"));

        // cat and dog both occur in three contexts.
        let tokens = tokenizer::tokenize("dog cat");
        assert_eq!(pick_seed(&index, &tokens), Some("cat"));

        let tokens = tokenizer::tokenize("unknown words only");
        assert_eq!(pick_seed(&index, &tokens), None);
    }

    #[test]
    fn unknown_stimulus_gives_no_reply() {
        let (index, lines) = indexed(&["hello there"]);
        let out = reply(&index, &lines, "zebra", policy(), &mut Prng::new(1)).unwrap();
        assert_eq!(out.text, None);
        assert_eq!(out.attempts, 0);
    }

    #[test]
    fn walk_only_uses_indexed_vocabulary() {
        let (index, _) = indexed(&[
            "the cat sat on the mat",
            "the dog sat on the rug",
            "a bird flew over the dog",
        ]);
        let known: Vec<&str> = index.words().map(|(w, _)| w).collect();
        for seed in 0..50 {
            let words = walk(&index, "cat", 30, &mut Prng::new(seed)).unwrap();
            assert!(!words.is_empty());
            for word in &words {
                assert!(known.contains(&word.as_str()), "fabricated word {word}");
            }
        }
    }

    #[test]
    fn walk_respects_max_words() {
        let (index, _) = indexed(&["one two three four five six seven eight nine ten"]);
        for max in 1..6 {
            let words = walk(&index, "five", max, &mut Prng::new(9)).unwrap();
            assert!(words.len() <= max);
            assert!(words.iter().any(|w| w == "five"));
        }
    }

    #[test]
    fn walk_terminates_on_cycles() {
        let (index, _) = indexed(&["la la la la la la"]);
        let words = walk(&index, "la", 12, &mut Prng::new(3)).unwrap();
        assert!(words.len() <= 12);
    }

    #[test]
    fn same_seed_same_reply() {
        let (index, lines) = indexed(&[
            "the cat sat on the mat",
            "the dog sat on the rug",
            "my cat likes the warm rug",
        ]);
        let a = reply(&index, &lines, "cat", policy(), &mut Prng::new(42)).unwrap();
        let b = reply(&index, &lines, "cat", policy(), &mut Prng::new(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_learned_line_exhausts_budget_and_echoes() {
        let (index, lines) = indexed(&["only one way to say this"]);
        let out = reply(&index, &lines, "way", policy(), &mut Prng::new(5)).unwrap();
        assert!(out.echoed);
        assert_eq!(out.attempts, 8);
        assert_eq!(out.text.as_deref(), Some("only one way to say this"));
    }

    #[test]
    fn paraphrases_instead_of_echoing() {
        let learned = ["the cat sat on the mat", "the dog sat on the rug"];
        let (index, lines) = indexed(&learned);
        for seed in 1..20 {
            let out = reply(&index, &lines, "cat", policy(), &mut Prng::new(seed)).unwrap();
            let text = out.text.expect("cat is known");
            assert!(text.split(' ').any(|w| w == "cat" || w == "sat"));
            if !out.echoed {
                assert!(!learned.contains(&text.as_str()));
            }
        }
    }
}
