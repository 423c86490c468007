//! SQL text normalization
//!
//! Comments and layout noise cost prompt tokens without carrying lineage, so
//! definitions are reduced before they are sent to the model. This is a pure
//! text transform; nothing here parses SQL.

use regex::Regex;
use std::sync::OnceLock;

fn block_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment pattern"))
}

fn line_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"--[^\n]*").expect("valid line comment pattern"))
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid blank line pattern"))
}

fn horizontal_space() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("valid whitespace pattern"))
}

/// Normalize a SQL definition for prompting
///
/// - literal `\n` / `\t` escapes (as produced by some CSV exports) become
///   real newlines and tabs
/// - `/* ... */` and `-- ...` comments are removed
/// - runs of blank lines collapse to one newline
/// - runs of spaces and tabs collapse to one space
///
/// Block comments are removed first so a `--` inside a block comment cannot
/// swallow the comment terminator.
pub fn normalize_sql(raw: &str) -> String {
    let text = raw.replace("\\n", "\n").replace("\\t", "\t");
    let text = block_comment().replace_all(&text, "");
    let text = line_comment().replace_all(&text, "");
    let text = blank_lines().replace_all(&text, "\n");
    let text = horizontal_space().replace_all(&text, " ");
    text.trim().to_string()
}
