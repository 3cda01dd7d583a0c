//! Inline markup for `/format` messages
//!
//! Recognizes `*bold*`, `_italic_`, `~underline~`, ```` ```code``` ```` and
//! `` `code` `` spans. A matching style wraps the *whole* message in its
//! terminal control sequence, not just the delimited span; styles compose
//! by applying each rule in turn to the output of the previous one.

use std::sync::LazyLock;

use regex::Regex;

const RESET: &str = "\x1b[0m";

struct Style {
    pattern: Regex,
    sgr: &'static str,
}

impl Style {
    fn new(pattern: &str, sgr: &'static str) -> Self {
        Self {
            // Patterns are literals below; a bad one is a programming error.
            pattern: Regex::new(pattern).expect("markup pattern must compile"),
            sgr,
        }
    }
}

// Triple backticks must be tried before the single-backtick rule.
static STYLES: LazyLock<[Style; 5]> = LazyLock::new(|| {
    [
        Style::new(r"\*([^*]+)\*", "\x1b[1m"),
        Style::new(r"_([^_]+)_", "\x1b[3m"),
        Style::new(r"~([^~]+)~", "\x1b[4m"),
        Style::new(r"(?s)```(.+?)```", "\x1b[7m"),
        Style::new(r"`([^`]+)`", "\x1b[7m"),
    ]
});

/// Apply inline markup to a message
///
/// Text without any delimiter pair comes back unchanged.
pub fn format_message(text: &str) -> String {
    let mut formatted = text.to_string();

    for style in STYLES.iter() {
        if !style.pattern.is_match(&formatted) {
            continue;
        }
        let stripped = style.pattern.replace_all(&formatted, "$1");
        formatted = format!("{}{}{}", style.sgr, stripped, RESET);
    }

    formatted
}
