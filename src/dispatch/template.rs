//! Message template rendering.

use std::collections::HashMap;

/// Render a `{key}`-delimited template with a single substitution pass.
///
/// Placeholders with no matching key are left literally in place. There
/// is no recursive expansion: values containing `{...}` are emitted
/// verbatim, and no escaping of literal braces is supported.
pub fn render(template: &str, data: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];

        match tail[1..].find('}') {
            Some(close) => {
                let key = &tail[1..close + 1];
                let is_word = !key.is_empty()
                    && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                match data.get(key) {
                    Some(value) if is_word => {
                        out.push_str(value);
                    }
                    _ => {
                        // Unmatched or malformed placeholder stays literal
                        out.push_str(&tail[..close + 2]);
                    }
                }
                rest = &tail[close + 2..];
            }
            None => {
                out.push_str(tail);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}
