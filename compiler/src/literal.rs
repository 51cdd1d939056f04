// literal.rs — Raw values to Python literals
//
// Formats a raw string value according to its declared scalar type. Numeric
// input that does not parse degrades to a string literal; formatting never
// fails.

use std::fmt::Write;

use crate::graph::{ScalarType, TypeTag};

/// Largest magnitude at which every integral f64 is exactly representable.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Format `raw` as a literal of the declared type.
pub fn format_literal(raw: &str, ty: &TypeTag) -> String {
    match ty.scalar() {
        Some(ScalarType::Int) => format_int(raw).unwrap_or_else(|| quote(raw)),
        Some(ScalarType::Float) => format_float(raw).unwrap_or_else(|| quote(raw)),
        Some(ScalarType::Bool) => format_bool(raw).to_string(),
        Some(ScalarType::String) | None => quote(raw),
    }
}

fn format_int(raw: &str) -> Option<String> {
    let s = raw.trim();
    if let Ok(n) = s.parse::<i128>() {
        return Some(n.to_string());
    }
    // Integral spellings such as `5.0` or `1e3` are accepted.
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT {
        Some((f as i64).to_string())
    } else {
        None
    }
}

fn format_float(raw: &str) -> Option<String> {
    let f = raw.trim().parse::<f64>().ok()?;
    if !f.is_finite() {
        return None;
    }
    if f.fract() == 0.0 {
        Some(format!("{}.0", f))
    } else {
        Some(f.to_string())
    }
}

fn format_bool(raw: &str) -> &'static str {
    let v = raw.to_lowercase();
    if v == "true" || v == "1" {
        "True"
    } else {
        "False"
    }
}

/// Single-quoted string literal with escapes applied. Control characters
/// without a short escape are written as `\xNN`.
pub fn quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('\'');
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TypeTag {
        TypeTag::parse(s)
    }

    #[test]
    fn int_literals() {
        assert_eq!(format_literal("5", &t("int")), "5");
        assert_eq!(format_literal(" 42 ", &t("int")), "42");
        assert_eq!(format_literal("007", &t("int")), "7");
        assert_eq!(format_literal("-3", &t("int")), "-3");
        assert_eq!(format_literal("5.0", &t("int")), "5");
        assert_eq!(format_literal("1e3", &t("int")), "1000");
    }

    #[test]
    fn int_fallback_to_string() {
        assert_eq!(format_literal("abc", &t("int")), "'abc'");
        assert_eq!(format_literal("2.5", &t("int")), "'2.5'");
        assert_eq!(format_literal("", &t("int")), "''");
    }

    #[test]
    fn float_literals() {
        assert_eq!(format_literal("3", &t("float")), "3.0");
        assert_eq!(format_literal("0.25", &t("float")), "0.25");
        assert_eq!(format_literal("-2", &t("float")), "-2.0");
        assert_eq!(format_literal("1e2", &t("float")), "100.0");
    }

    #[test]
    fn float_fallback_to_string() {
        assert_eq!(format_literal("fast", &t("float")), "'fast'");
        assert_eq!(format_literal("nan", &t("float")), "'nan'");
        assert_eq!(format_literal("inf", &t("float")), "'inf'");
    }

    #[test]
    fn bool_literals() {
        assert_eq!(format_literal("true", &t("bool")), "True");
        assert_eq!(format_literal("TRUE", &t("bool")), "True");
        assert_eq!(format_literal("1", &t("bool")), "True");
        assert_eq!(format_literal("yes", &t("bool")), "False");
        assert_eq!(format_literal("", &t("bool")), "False");
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(format_literal("it's", &t("str")), r"'it\'s'");
        assert_eq!(format_literal("a\\b", &t("str")), r"'a\\b'");
        assert_eq!(format_literal("l1\nl2", &t("str")), r"'l1\nl2'");
    }

    #[test]
    fn control_characters_use_hex_escapes() {
        let lit = quote("a\u{0}b\u{1b}c\u{7f}");
        assert_eq!(lit, r"'a\x00b\x1bc\x7f'");
        assert!(!lit.chars().any(char::is_control));
    }

    #[test]
    fn non_scalar_types_quote() {
        assert_eq!(format_literal("gs://bucket", &t("Dataset")), "'gs://bucket'");
        assert_eq!(format_literal("5", &t("Any")), "'5'");
    }
}
