//! Tokenizing assembly words.
//!
//! Source lines are split on spaces into words before they are lexed,
//! so each word is expected to lex into exactly one [`Token`].
//! [`classify`] performs this check.

use logos::{Lexer, Logos};

/// A single word of source code.
#[derive(Debug, Logos, PartialEq, Eq, Clone)]
#[logos(error = LexErr)]
pub enum Token {
    /// A decimal integer, optionally signed (e.g., `9`, `-14`, `+3`).
    #[regex(r"[+-]?[0-9]+", lex_int)]
    Int(i32),

    /// A label definition (e.g., `LOOP:`, `ŁAŃCUCH:`). The colon is not included.
    #[regex(r"[\p{L}_][\p{L}\p{N}_]*:", |lx| { let s = lx.slice(); s[..s.len() - 1].to_string() })]
    LabelDef(String),
}

/// Any errors raised in attempting to tokenize a word.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// Integer literal does not fit within the range of an `i32`.
    DoesNotFitI32,
    /// Word did not match any token.
    #[default]
    InvalidSymbol,
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::DoesNotFitI32 => f.write_str("integer literal does not fit in a cell"),
            LexErr::InvalidSymbol => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}

fn lex_int(lx: &Lexer<'_, Token>) -> Result<i32, LexErr> {
    lx.slice().parse::<i32>().map_err(|_| LexErr::DoesNotFitI32)
}

/// Lexes a word, returning its token if the entire word forms exactly one token.
///
/// ```
/// use acu_ensemble::parse::lex::{classify, Token};
///
/// assert_eq!(classify("-12"), Some(Token::Int(-12)));
/// assert_eq!(classify("LOOP:"), Some(Token::LabelDef("LOOP".to_string())));
/// assert_eq!(classify("12abc"), None);
/// assert_eq!(classify("99999999999"), None);
/// ```
pub fn classify(word: &str) -> Option<Token> {
    let mut lx = Token::lexer(word);
    let token = lx.next()?.ok()?;

    (lx.span() == (0..word.len())).then_some(token)
}

/// Parses a word as an integer literal.
pub fn parse_int(word: &str) -> Option<i32> {
    match classify(word)? {
        Token::Int(n) => Some(n),
        _ => None,
    }
}
