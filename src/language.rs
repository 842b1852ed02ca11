//! Question-language detection for prompt rendering.
//!
//! Only distinguishes Arabic-script text from everything else, which
//! feeds the `{language}` template placeholder when the caller does not
//! specify a language explicitly.

/// Returns true if the text contains any character in the Arabic
/// Unicode block (U+0600..U+06FF).
pub fn is_arabic(text: &str) -> bool {
    text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c))
}

/// Map a question to the language name used in prompt templates.
pub fn detect_language(text: &str) -> &'static str {
    if is_arabic(text) {
        "arabic"
    } else {
        "english"
    }
}
