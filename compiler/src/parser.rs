// parser.rs — Function-header recognition in free-form component bodies
//
// Finds the first `def name(params) [-> annotation]:` that starts a line,
// together with any decorator lines directly above it. Uses chumsky
// combinators over the token stream from `lexer::lex()`.
//
// Preconditions: none.
// Postconditions: a returned `Header` covers whole lines from its start up to
//                 and including the header's closing colon.
// Failure modes: none. Bodies without a header yield `None`.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::lexer::{lex, Token};

/// A recognized function header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Byte offset of the start of the first decorator line, or of the `def`
    /// line when undecorated.
    pub start: usize,
    /// Byte offset just past the header's closing `:`.
    pub end: usize,
    /// The function name as written.
    pub name: String,
}

/// Locate the first function header in `source`.
///
/// Only headers whose first token (`@` or `def`) opens a line qualify;
/// anything inside a string or comment is invisible.
pub fn find_header(source: &str) -> Option<Header> {
    let tokens = lex(source);
    let len = source.len();

    for (i, (tok, _)) in tokens.iter().enumerate() {
        if !matches!(tok, Token::Def | Token::At) {
            continue;
        }
        if i > 0 && tokens[i - 1].0 != Token::Newline {
            continue;
        }

        let token_iter = tokens[i..].iter().map(|(tok, span)| {
            let cspan: SimpleSpan = (span.start..span.end).into();
            (tok.clone(), cspan)
        });
        let eoi: SimpleSpan = (len..len).into();
        let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

        if let Ok((name, span)) = header_parser().parse(stream).into_result() {
            return Some(Header {
                start: line_start(source, span.start),
                end: span.end,
                name: source[name.start..name.end].to_string(),
            });
        }
    }
    None
}

fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map_or(0, |nl| nl + 1)
}

// ── Grammar ──
//
//   header    = decorator* "def" ident params ("->" annotation)? ":"
//   decorator = "@" <any but newline>* newline+
//   params    = "(" (params | <any but parens>)* ")"
//
// Parentheses nest to any depth, so defaults such as `x=(1, 2)` or
// `n=f(g(1))` stay inside the parameter list.

fn header_parser<'tokens, I>() -> impl Parser<'tokens, I, (SimpleSpan, SimpleSpan), extra::Default>
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let decorator = just(Token::At)
        .then(none_of([Token::Newline]).repeated())
        .then(just(Token::Newline).repeated().at_least(1))
        .ignored();

    let name = just(Token::Ident).map_with(|_, e| {
        let span: SimpleSpan = e.span();
        span
    });

    let params = recursive(|group| {
        group
            .or(none_of([Token::LParen, Token::RParen]).ignored())
            .repeated()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .ignored()
    });

    let annotation = just(Token::Arrow)
        .then(none_of([Token::Colon, Token::Newline]).repeated().at_least(1))
        .ignored();

    decorator
        .repeated()
        .ignore_then(just(Token::Def))
        .ignore_then(name)
        .then_ignore(params)
        .then_ignore(annotation.or_not())
        .then_ignore(just(Token::Colon))
        .map_with(|name, e| (name, e.span()))
        .then_ignore(any().repeated())
}

// ── Tests ──
