use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BrainConfig;
use crate::error::Result;
use crate::index::{ContextIndex, IndexAudit};
use crate::learn::{self, LearnOutcome};
use crate::lines::LineTable;
use crate::prng::Prng;
use crate::reply::{self, ReplyOutcome, ReplyPolicy};
use crate::tokenizer;

/// Table sizes reported by `stats` tooling and the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrainStats {
    pub words: usize,
    pub contexts: usize,
    pub lines: usize,
}

/// A complete brain: the context index, the raw lines it was learned from, and the
/// random source used for replies.
///
/// There is exactly one of these per brain process. Front-ends reach it through a
/// [`crate::client::BrainClient`], never directly.
#[derive(Debug, Clone)]
pub struct Brain {
    cfg: BrainConfig,
    index: ContextIndex,
    lines: LineTable,
    rng: Prng,
}

impl Default for Brain {
    fn default() -> Self {
        Self::new(BrainConfig::default())
    }
}

impl Brain {
    pub fn new(cfg: BrainConfig) -> Self {
        Self::from_parts(cfg, ContextIndex::new(), LineTable::new())
    }

    pub(crate) fn from_parts(cfg: BrainConfig, index: ContextIndex, lines: LineTable) -> Self {
        let cfg = cfg.sanitized();
        let rng = cfg.seed.map_or_else(Prng::from_clock, Prng::new);
        Self {
            cfg,
            index,
            lines,
            rng,
        }
    }

    pub fn config(&self) -> &BrainConfig {
        &self.cfg
    }

    pub fn index(&self) -> &ContextIndex {
        &self.index
    }

    pub fn lines(&self) -> &LineTable {
        &self.lines
    }

    /// Learn one observed line.
    ///
    /// Lines without any usable token are ignored entirely. Otherwise the raw line is
    /// always recorded, even when every context in it is already known.
    pub fn learn(&mut self, text: &str) -> LearnOutcome {
        let tokens = tokenizer::tokenize(text);
        if tokens.is_empty() {
            return LearnOutcome::default();
        }
        let outcome = learn::learn_tokens(&mut self.index, &tokens, self.cfg.context_width);
        let line_id = self.lines.record(text);
        debug!(
            line_id,
            new_words = outcome.new_words,
            new_contexts = outcome.new_contexts,
            "learned line"
        );
        outcome
    }

    /// Generate a reply to `stimulus`; `None` means nothing in it is known.
    pub fn reply(&mut self, stimulus: &str) -> Result<Option<String>> {
        Ok(self.reply_outcome(stimulus)?.text)
    }

    pub fn reply_outcome(&mut self, stimulus: &str) -> Result<ReplyOutcome> {
        let policy = self.policy();
        reply::reply(&self.index, &self.lines, stimulus, policy, &mut self.rng)
    }

    /// Reply using a throwaway PRNG seeded with `seed`; the brain's own random state is untouched.
    pub fn reply_seeded(&self, stimulus: &str, seed: u64) -> Result<ReplyOutcome> {
        reply::reply(
            &self.index,
            &self.lines,
            stimulus,
            self.policy(),
            &mut Prng::new(seed),
        )
    }

    pub fn stats(&self) -> BrainStats {
        BrainStats {
            words: self.index.num_words(),
            contexts: self.index.num_contexts(),
            lines: self.lines.len(),
        }
    }

    pub fn audit(&self) -> IndexAudit {
        self.index.audit()
    }

    fn policy(&self) -> ReplyPolicy {
        ReplyPolicy {
            max_words: self.cfg.max_reply_words,
            attempts: self.cfg.reply_attempts,
        }
    }
}
