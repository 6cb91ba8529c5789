//! Text sanitization utilities for cleaning extracted page text
//!
//! Scraper already decodes HTML entities, so these helpers only deal with
//! invisible characters and whitespace layout.

use regex::Regex;
use std::sync::LazyLock;

// Pre-compiled regex patterns for performance
static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

static MULTI_NEWLINE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Sanitize multi-line body text
///
/// This function applies multiple cleaning steps:
/// 1. Remove zero-width characters
/// 2. Remove control characters (except newline/tab)
/// 3. Normalize whitespace
/// 4. Trim each line
/// 5. Remove excessive blank lines
///
/// # Examples
///
/// ```
/// use newsdrift::parser::sanitize::sanitize_text;
///
/// let dirty = "Hello\u{200B}World  \n\n\n\nTest";
/// let clean = sanitize_text(dirty);
/// assert!(!clean.contains('\u{200B}'));
/// ```
pub fn sanitize_text(text: &str) -> String {
    let mut result = remove_zero_width(text);

    result = remove_control_chars(&result);
    result = normalize_whitespace(&result);
    result = trim_lines(&result);
    result = collapse_newlines(&result);

    result.trim().to_string()
}

/// Clean a single-line value such as a title, author or timestamp
///
/// Only invisible characters and surrounding whitespace are removed; inner
/// spacing is kept as the page had it.
///
/// # Examples
///
/// ```
/// use newsdrift::parser::sanitize::clean_inline;
///
/// assert_eq!(clean_inline("  央行 上调\u{200B} 利率 \n"), "央行 上调 利率");
/// ```
pub fn clean_inline(text: &str) -> String {
    remove_zero_width(text).trim().to_string()
}

/// Remove zero-width spaces and similar invisible characters
///
/// Removes:
/// - \u{200B} Zero-width space
/// - \u{200C} Zero-width non-joiner
/// - \u{200D} Zero-width joiner
/// - \u{200E} Left-to-right mark
/// - \u{200F} Right-to-left mark
/// - \u{2028}-\u{202F} Separators and formatting characters
/// - \u{FEFF} Byte order mark (BOM)
///
/// # Examples
///
/// ```
/// use newsdrift::parser::sanitize::remove_zero_width;
///
/// let text = "新\u{200B}浪\u{FEFF}网";
/// assert_eq!(remove_zero_width(text), "新浪网");
/// ```
pub fn remove_zero_width(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(*c,
                '\u{200B}'..='\u{200F}' |
                '\u{2028}'..='\u{202F}' |
                '\u{FEFF}'
            )
        })
        .collect()
}

/// Remove control characters except newline and tab
pub fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Normalize multiple spaces/tabs to single space
///
/// Does NOT affect newlines - those are handled separately.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text, " ").to_string()
}

/// Trim whitespace from each line
pub fn trim_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse 3+ consecutive newlines to 2
pub fn collapse_newlines(text: &str) -> String {
    MULTI_NEWLINE_REGEX.replace_all(text, "\n\n").to_string()
}

/// Check if text contains meaningful content
///
/// Returns false if text is empty, whitespace, or only invisible characters.
///
/// # Examples
///
/// ```
/// use newsdrift::parser::sanitize::has_content;
///
/// assert!(has_content("Hello"));
/// assert!(!has_content(""));
/// assert!(!has_content("   \n\t  "));
/// assert!(!has_content("\u{200B}"));
/// ```
pub fn has_content(text: &str) -> bool {
    text.chars().any(|c| {
        !c.is_whitespace() && !matches!(c, '\u{200B}'..='\u{200F}' | '\u{2028}'..='\u{202F}' | '\u{FEFF}')
    })
}
