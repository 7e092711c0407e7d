//! # borg
//!
//! A persistent, self-learning chat text generator.
//!
//! Observed lines are cut into short word contexts and indexed; replies are produced by
//! anchoring on the rarest known word of the stimulus and walking the index outward.
//! No grammar, no models: only the order of words as they were seen.
//!
//! ## Quick Start
//!
//! ```
//! use borg::prelude::*;
//!
//! let mut brain = Brain::new(BrainConfig::default().with_seed(42));
//! brain.learn("the cat sat on the mat");
//! brain.learn("the dog sat on the rug");
//!
//! let reply = brain.reply("cat").unwrap();
//! assert!(reply.is_some());
//! assert_eq!(brain.reply("zebra").unwrap(), None);
//! ```
//!
//! ## Sharing one brain
//!
//! Several front-end processes can share a single brain through the `borgd` gateway.
//! Front-ends hold a [`client::BrainClient`] chosen once from [`client::ClientConfig`]:
//! a [`client::LocalBrainClient`] owns the brain in-process, a
//! [`client::RemoteBrainClient`] forwards `learn`/`reply` over HTTP.
//!
//! ## Modules
//!
//! - [`tokenizer`]: text normalization shared by learning and replying
//! - [`index`]: the word/context index
//! - [`learn`] / [`reply`]: the two engines
//! - [`brain`]: the brain facade tying index, lines and randomness together
//! - [`snapshot`]: current JSON format; [`legacy`]: read-only legacy archive and upgrade
//! - [`client`]: local and remote `BrainClient`s
//! - [`commands`]: the `!command` registry for chat front-ends

#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/tokenizer.rs"]
pub mod tokenizer;

#[path = "core/index.rs"]
pub mod index;

#[path = "core/lines.rs"]
pub mod lines;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/learn.rs"]
pub mod learn;

#[path = "core/reply.rs"]
pub mod reply;

#[path = "core/brain.rs"]
pub mod brain;

#[path = "core/storage.rs"]
pub mod storage;

#[path = "core/snapshot.rs"]
pub mod snapshot;

#[path = "core/legacy.rs"]
pub mod legacy;

#[path = "core/paths.rs"]
pub mod paths;

#[path = "core/client.rs"]
pub mod client;

#[path = "core/commands.rs"]
pub mod commands;

/// Prelude module for convenient imports.
///
/// ```
/// use borg::prelude::*;
/// ```
pub mod prelude {
    pub use crate::brain::{Brain, BrainStats};
    pub use crate::client::{
        BrainClient, ClientConfig, ClientError, LocalBrainClient, RemoteBrainClient, SharedBrain,
    };
    pub use crate::config::BrainConfig;
    pub use crate::error::BrainError;
    pub use crate::index::{ContextId, ContextIndex};
    pub use crate::paths::AppPaths;
}
