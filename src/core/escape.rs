//! The two escaping passes applied to user-supplied text.
//!
//! - [`escape_markdown`] makes text safe for Telegram MarkdownV2. It runs when
//!   a configuration is built, so configurations carry markup-ready text.
//! - [`escape_source_literal`] makes any text safe to embed as a string
//!   literal in a generated bot program. It runs inside the generator and is
//!   unaware of markup: a `\.` produced by the first pass survives the second
//!   one byte-for-byte once the program is parsed back.

/// Characters that MarkdownV2 treats as markup
pub const MARKDOWN_SPECIAL_CHARS: &[char] = &[
    '_', '[', ']', '(', ')', '*', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '?',
];

/// Escapes every MarkdownV2 special character with a backslash.
///
/// Empty input is returned unchanged.
///
/// # Examples
/// ```
/// use botforge::core::escape::escape_markdown;
///
/// assert_eq!(escape_markdown("Hello. World!"), "Hello\\. World\\!");
/// assert_eq!(escape_markdown(""), "");
/// ```
pub fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len() * 2);

    for c in text.chars() {
        if MARKDOWN_SPECIAL_CHARS.contains(&c) {
            result.push('\\');
        }
        result.push(c);
    }

    result
}

/// Escapes text for a double-quoted literal in a generated program.
///
/// Backslashes and quotes are escaped, control characters become escape
/// sequences. Everything else, including emoji and Cyrillic, passes through.
pub fn escape_source_literal(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + 8);

    for c in text.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => result.push_str(&format!("\\u{:04X}", c as u32)),
            c => result.push(c),
        }
    }

    result
}

/// Wraps [`escape_source_literal`] output in double quotes
pub fn quote_literal(text: &str) -> String {
    format!("\"{}\"", escape_source_literal(text))
}
