//! Text normalization shared by the learn and reply paths.
//!
//! Both engines must see exactly the same tokens for a given input, otherwise lookups
//! made while replying would miss contexts recorded while learning.

/// Placeholder front-ends substitute for addressee nicknames.
pub const NICK_PLACEHOLDER: &str = "#nick";

/// Tokens longer than this are dropped (URLs, pasted hashes, keyboard mashing).
pub const MAX_WORD_LEN: usize = 50;

/// Characters that separate tokens in addition to whitespace.
///
/// `<` and `>` are included so the context sentinels can never be produced from text.
const SEPARATORS: &[char] = &[
    ',', ';', ':', '!', '?', '"', '(', ')', '[', ']', '{', '}', '<', '>', '|', '`',
];

/// Characters trimmed from the edges of a token but kept inside it (`don't`, `re-run`).
const EDGE_TRIM: &[char] = &['.', '\'', '-', '*', '_', '~', '#', '/', '\\', '&', '+', '='];

pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .filter_map(normalize_token)
        .collect()
}

/// Render a token sequence the way replies are emitted.
pub fn render(words: &[String]) -> String {
    words.join(" ")
}

/// Normalized form of a whole line, used to recognise verbatim echoes.
pub fn normalize_line(text: &str) -> String {
    render(&tokenize(text))
}

fn normalize_token(raw: &str) -> Option<String> {
    if raw.eq_ignore_ascii_case(NICK_PLACEHOLDER) {
        return Some(NICK_PLACEHOLDER.to_string());
    }
    let trimmed = raw.trim_matches(EDGE_TRIM);
    if trimmed.is_empty() || trimmed.chars().count() > MAX_WORD_LEN {
        return None;
    }
    if !trimmed.chars().any(char::is_alphanumeric) {
        return None;
    }
    Some(trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_case_and_strips_punctuation() {
        assert_eq!(
            tokenize("The Cat, sat on the MAT!"),
            vec!["the", "cat", "sat", "on", "the", "mat"]
        );
    }

    #[test]
    fn keeps_inner_apostrophes_and_hyphens() {
        assert_eq!(tokenize("don't re-run 'it'."), vec!["don't", "re-run", "it"]);
    }

    #[test]
    fn keeps_nick_placeholder() {
        assert_eq!(tokenize("hi #NICK how are you"), vec!["hi", "#nick", "how", "are", "you"]);
    }

    #[test]
    fn drops_symbol_only_and_oversized_tokens() {
        let long = "a".repeat(MAX_WORD_LEN + 1);
        assert_eq!(tokenize(&format!("... -- {long} ok")), vec!["ok"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn never_produces_sentinel_shaped_tokens() {
        assert_eq!(tokenize("<s> </s>"), vec!["s", "s"]);
    }

    #[test]
    fn normalize_line_is_stable() {
        assert_eq!(normalize_line("Hello,   World."), "hello world");
        assert_eq!(normalize_line(&normalize_line("Hello,   World.")), "hello world");
    }
}
