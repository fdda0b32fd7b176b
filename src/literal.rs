//! Bracketed list literals: `['Paris', 'London', "O'Hare"]`.
//!
//! This is the encoding used for candidate lists inside record files. The
//! decoder is lenient (whitespace, either quote style, no quotes at all); the
//! encoder always produces the canonical form.

/// Decode the bracketed list in `raw`, from the first `[` to the last `]`.
///
/// Brackets inside candidate titles therefore stay part of the item. Returns
/// an empty list when there is no `[ ... ]` group. Items are split on
/// commas, trimmed, unquoted (one matching pair of `'` or `"`), and dropped if
/// empty.
pub fn decode_list(raw: &str) -> Vec<String> {
    let flat = raw.replace(['\r', '\n'], " ");
    let Some(open) = flat.find('[') else {
        return Vec::new();
    };
    let Some(close) = flat.rfind(']').filter(|&close| close > open) else {
        return Vec::new();
    };
    let interior = &flat[open + 1..close];

    interior
        .split(',')
        .map(|token| strip_quotes(token.trim()).trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_quotes(token: &str) -> &str {
    for quote in ['\'', '"'] {
        if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
            return &token[1..token.len() - 1];
        }
    }
    token
}

/// Encode `items` as a bracketed list literal.
pub fn encode_list<S: AsRef<str>>(items: &[S]) -> String {
    let rendered: Vec<String> = items.iter().map(|s| quote_item(s.as_ref())).collect();
    format!("[{}]", rendered.join(", "))
}

fn quote_item(item: &str) -> String {
    if item.contains('\'') && !item.contains('"') {
        format!("\"{item}\"")
    } else {
        format!("'{item}'")
    }
}
