use serde::{Deserialize, Serialize};

/// Tunables for the learn and reply engines.
///
/// Changing `context_width` on an existing brain is allowed but only affects lines
/// learned afterwards; the stored contexts keep the width they were learned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Sliding window width (in tokens, sentinels included) used to cut contexts.
    pub context_width: usize,
    /// Upper bound on words in a generated reply.
    pub max_reply_words: usize,
    /// Walks attempted before a verbatim echo of a learned line is accepted.
    pub reply_attempts: usize,
    /// Fixed seed for reproducible replies; `None` seeds from the clock.
    pub seed: Option<u64>,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            context_width: 3,
            max_reply_words: 30,
            reply_attempts: 8,
            seed: None,
        }
    }
}

impl BrainConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_context_width(mut self, width: usize) -> Self {
        self.context_width = width;
        self
    }

    pub fn with_max_reply_words(mut self, max: usize) -> Self {
        self.max_reply_words = max;
        self
    }

    pub fn with_reply_attempts(mut self, attempts: usize) -> Self {
        self.reply_attempts = attempts;
        self
    }

    /// Clamp values into the ranges the engines support.
    pub(crate) fn sanitized(mut self) -> Self {
        self.context_width = self.context_width.clamp(2, 8);
        self.max_reply_words = self.max_reply_words.max(1);
        self.reply_attempts = self.reply_attempts.max(1);
        self
    }
}
