// sanitize.rs — Arbitrary text to valid Python identifier
//
// Total and pure: every maximal run of characters outside `[A-Za-z0-9_]`
// collapses to a single `_`. The result is then made a legal identifier
// (leading digit gets a `_` prefix, keywords get a `_` suffix). Empty results
// become `FALLBACK`.

/// Substituted when sanitization leaves nothing.
pub const FALLBACK: &str = "arg";

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Sanitize `name` into an identifier. Never fails.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if is_ident_char(c) {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }

    if out.is_empty() {
        return FALLBACK.to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if is_keyword(&out) {
        out.push('_');
    }
    out
}

/// Sanitize the first non-empty candidate, or `fallback` when all are empty.
pub fn sanitize_first(candidates: &[&str], fallback: &str) -> String {
    match candidates.iter().find(|c| !c.is_empty()) {
        Some(c) => sanitize(c),
        None => fallback.to_string(),
    }
}

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

/// True if `s` is already a valid, non-keyword identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(is_ident_char) && !is_keyword(s)
}
