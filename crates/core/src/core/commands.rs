//! `!command` handling for chat front-ends.
//!
//! The registry is a fixed table built at compile time; front-ends look a command up by
//! name and run it against whatever [`BrainClient`] they hold.

use crate::client::{BrainClient, ClientError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Version,
    Words,
    Save,
    Quit,
}

/// What a front-end should do after running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Say(String),
    Quit,
}

pub const PREFIX: char = '!';

pub const REGISTRY: &[(&str, Command, &str)] = &[
    ("help", Command::Help, "list commands"),
    ("version", Command::Version, "show the borg version"),
    ("words", Command::Words, "show how much the brain knows"),
    ("save", Command::Save, "persist the brain now"),
    ("quit", Command::Quit, "leave"),
];

/// Parse `!name args...`; returns `None` for ordinary chat lines and unknown commands.
pub fn parse(line: &str) -> Option<Command> {
    let name = line.trim().strip_prefix(PREFIX)?.split_whitespace().next()?;
    REGISTRY
        .iter()
        .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, cmd, _)| cmd)
}

pub async fn run(cmd: Command, client: &dyn BrainClient) -> Result<Outcome, ClientError> {
    let text = match cmd {
        Command::Help => REGISTRY
            .iter()
            .map(|(name, _, help)| format!("{PREFIX}{name}: {help}"))
            .collect::<Vec<_>>()
            .join("\n"),
        Command::Version => format!("I am a version {} borg!", env!("CARGO_PKG_VERSION")),
        Command::Words => {
            let s = client.stats().await?;
            format!(
                "I know {} words ({} contexts) from {} lines",
                s.words, s.contexts, s.lines
            )
        }
        Command::Save => {
            client.save_all().await?;
            "Brain saved".to_string()
        }
        Command::Quit => return Ok(Outcome::Quit),
    };
    Ok(Outcome::Say(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::Brain;
    use crate::client::LocalBrainClient;

    #[test]
    fn parses_known_commands_only() {
        assert_eq!(parse("!words"), Some(Command::Words));
        assert_eq!(parse("  !VERSION please"), Some(Command::Version));
        assert_eq!(parse("!nope"), None);
        assert_eq!(parse("words"), None);
        assert_eq!(parse("!"), None);
    }

    #[tokio::test]
    async fn words_reports_brain_size() {
        let client = LocalBrainClient::new(Brain::default());
        client.learn("hello big world").await.unwrap();
        let out = run(Command::Words, &client).await.unwrap();
        assert_eq!(out, Outcome::Say("I know 3 words (3 contexts) from 1 lines".into()));
        assert_eq!(run(Command::Quit, &client).await.unwrap(), Outcome::Quit);
    }
}
