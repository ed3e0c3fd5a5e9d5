//! Simple placeholder substitution for the HTML pages which are compiled into
//! the binary. Placeholders take the form `< name >`, and all of them are
//! replaced in a single pass over the template.

use aho_corasick::{AhoCorasick, BuildError};

/// Replace every placeholder in the template with its paired value.
/// Placeholders which appear in the template but not in `replacements` are
/// left as they are.
pub fn fill_template(
    template: &str,
    replacements: &[(&str, String)],
) -> Result<String, BuildError> {
    let patterns: Vec<&str> = replacements.iter().map(|(p, _)| *p).collect();
    let replace_with: Vec<&str> =
        replacements.iter().map(|(_, v)| v.as_str()).collect();

    let ac = AhoCorasick::new(patterns)?;

    Ok(ac.replace_all(template, &replace_with))
}

/// Escape text so that it can be placed inside an HTML element
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
