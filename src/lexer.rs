use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::{GramError, Result};

/// Token categories produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Comment,
    Linebreak,
    Spaces,
    Identifier,
    Str,
    Epsilon,
    Nonterminal,
    OpenParen,
    CloseParen,
    /// `->`
    ArrowNormal,
    /// `=>`
    ArrowDouble,
    /// `==name=>`
    ArrowLabeled,
    NotEquals,
    Equals,
    Colon,
    Or,
    Question,
    Dot,
    Comma,
}

/// A single lexed token together with the exact text it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: &str) -> Self {
        Token {
            kind,
            text: text.to_string(),
        }
    }
}

/// Token patterns in priority order. First match at the current position
/// wins; there is no longest-match across kinds, so the ordering is
/// load-bearing (`nonterminal` before the operators that could eat its
/// angle brackets, `arrow_labeled` before `equals`).
static PATTERNS: Lazy<Vec<(TokenKind, Regex)>> = Lazy::new(|| {
    let table = [
        (TokenKind::Comment, r"^//.*"),
        (TokenKind::Linebreak, r"^\n"),
        (TokenKind::Spaces, r"^[ ]+"),
        (TokenKind::Identifier, r"^[A-Za-z_0-9]+"),
        (TokenKind::Str, r#"^"([^\\"\n]|\\.)*""#),
        (TokenKind::Epsilon, r"^<>"),
        (TokenKind::Nonterminal, r"^<[ ]*~?[ ]*[A-Za-z_0-9]+[ ]*>"),
        (TokenKind::OpenParen, r"^\("),
        (TokenKind::CloseParen, r"^\)"),
        (TokenKind::ArrowNormal, r"^->"),
        (TokenKind::ArrowDouble, r"^=>"),
        (TokenKind::ArrowLabeled, r"^==[ ]*[A-Za-z_]+[ ]*=>"),
        (TokenKind::NotEquals, r"^!="),
        (TokenKind::Equals, r"^="),
        (TokenKind::Colon, r"^:"),
        (TokenKind::Or, r"^\|"),
        (TokenKind::Question, r"^\?"),
        (TokenKind::Dot, r"^\."),
        (TokenKind::Comma, r"^,"),
    ];

    table
        .iter()
        .map(|(kind, pattern)| (*kind, Regex::new(pattern).expect("token pattern compiles")))
        .collect()
});

const SNIPPET_LEN: usize = 16;

/// Match one token at the start of `input`, returning it with the number of
/// bytes consumed.
fn next_token(input: &str) -> Result<(Token, usize)> {
    for (kind, pattern) in PATTERNS.iter() {
        if let Some(found) = pattern.find(input) {
            return Ok((Token::new(*kind, found.as_str()), found.end()));
        }
    }

    let snippet: String = input.chars().take(SNIPPET_LEN).collect();
    Err(GramError::lexer(
        "Lexer: Tokenizing grammar",
        vec![format!("no token pattern matches {:?}", snippet)],
    ))
}

/// Tokenize the whole source into a flat stream.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < source.len() {
        let (token, consumed) = next_token(&source[pos..])?;
        pos += consumed;
        tokens.push(token);
    }
    Ok(tokens)
}

/// Tokenize and split the stream at linebreaks, one token list per source
/// line. Blank and comment-only lines still show up here; the classifier
/// filters them.
pub fn token_lines(source: &str) -> Result<Vec<Vec<Token>>> {
    let mut lines = vec![Vec::new()];
    for token in tokenize(source)? {
        match token.kind {
            TokenKind::Linebreak => lines.push(Vec::new()),
            _ => {
                if let Some(line) = lines.last_mut() {
                    line.push(token);
                }
            }
        }
    }
    Ok(lines)
}
