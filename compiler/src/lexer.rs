// lexer.rs — Tokenizer for free-form component bodies
//
// Produces just enough Python structure to find function headers: the `def`
// keyword, identifiers, brackets, `->`, `:`, `@` and line breaks. String
// literals (including triple-quoted ones spanning lines) and comments are
// consumed whole so their contents can never look like code.
//
// Preconditions: input is valid UTF-8.
// Postconditions: every byte of the input is covered by a token, a skipped
//                 run (whitespace, comment, line continuation) or nothing
//                 else; spans are byte offsets into the input.
// Failure modes: none. Characters with no dedicated token become `Other`.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Body tokens.
///
/// Identifiers carry no value; use the span to retrieve the text.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+|\\\r?\n|#[^\n]*")]
pub enum Token {
    #[token("def")]
    Def,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(":")]
    Colon,
    #[token("->")]
    Arrow,
    #[token("@")]
    At,

    /// Single-line string, either quote style.
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r#"'([^'\\\n]|\\.)*'"#)]
    Str,

    /// Triple-quoted string; runs to the matching delimiter or end of input.
    #[token("\"\"\"", |lex| close_triple(lex, "\"\"\""))]
    #[token("'''", |lex| close_triple(lex, "'''"))]
    DocStr,

    #[regex(r"[0-9][0-9A-Za-z_.]*")]
    Number,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[token("\n")]
    Newline,

    /// Anything else (operators, stray quotes, non-ASCII).
    Other,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Def => write!(f, "def"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Colon => write!(f, ":"),
            Token::Arrow => write!(f, "->"),
            Token::At => write!(f, "@"),
            Token::Str => write!(f, "<string>"),
            Token::DocStr => write!(f, "<docstring>"),
            Token::Number => write!(f, "<number>"),
            Token::Ident => write!(f, "<ident>"),
            Token::Newline => write!(f, "<newline>"),
            Token::Other => write!(f, "<other>"),
        }
    }
}

// ── Callbacks ──

fn close_triple(lex: &mut logos::Lexer<'_, Token>, delim: &str) -> bool {
    let rest = lex.remainder();
    let mut from = 0;
    // Skip escaped characters so `\"""` does not close the string.
    while let Some(pos) = rest[from..].find(['\\', delim.as_bytes()[0] as char]) {
        let at = from + pos;
        if rest[at..].starts_with('\\') {
            from = at + 1 + rest[at + 1..].chars().next().map_or(0, char::len_utf8);
            continue;
        }
        if rest[at..].starts_with(delim) {
            lex.bump(at + delim.len());
            return true;
        }
        from = at + 1;
    }
    lex.bump(rest.len());
    true
}

// ── Public API ──

/// Tokenize a component body.
pub fn lex(source: &str) -> Vec<(Token, Span)> {
    Token::lexer(source)
        .spanned()
        .map(|(result, range)| {
            let span = Span {
                start: range.start,
                end: range.end,
            };
            (result.unwrap_or(Token::Other), span)
        })
        .collect()
}

// ── Tests ──
