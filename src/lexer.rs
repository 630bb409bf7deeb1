//! Tokenizer for SMALL source text.
//!
//! The token classes and the single-regex design follow the surface grammar:
//! identifiers that collide with the keyword set become keyword tokens,
//! `//` comments and horizontal whitespace are skipped, and newlines only
//! advance the line counter. Anything else is a fatal lexical diagnostic.

use crate::diag::Diagnostic;
use fnv::FnvHashSet;
use lazy_static::lazy_static;
use regex::Regex;

/// Token classes produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Ident,
    Number,
    Op,
    Sym,
    Eof,
}

/// A single token with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub col: u32,
}

lazy_static! {
    static ref KEYWORDS: FnvHashSet<&'static str> = [
        "function", "if", "else", "while", "return", "spawn", "await", "True", "False", "and",
        "or",
    ]
    .iter()
    .copied()
    .collect();
    static ref TOKEN_RE: Regex = Regex::new(
        "^(?:(?P<ws>[ \\t\\r]+)\
         |(?P<nl>\\n)\
         |(?P<comment>//[^\\n]*)\
         |(?P<num>[0-9]+)\
         |(?P<id>[A-Za-z_][A-Za-z0-9_]*)\
         |(?P<op>==|!=|>=|<=|[-+*/<>])\
         |(?P<sym>[(){};,=]))"
    )
    .unwrap();
}

/// Turns source text into a token list terminated by an `Eof` token.
pub fn lex(src: &str) -> Result<Vec<Token>, Diagnostic> {
    let mut toks = Vec::new();
    let mut pos = 0;
    let mut line: u32 = 1;
    let mut col: u32 = 1;

    while pos < src.len() {
        let caps = match TOKEN_RE.captures(&src[pos..]) {
            Some(caps) => caps,
            None => {
                let snippet: String = src[pos..].chars().take(20).collect();
                return Err(Diagnostic::UnexpectedCharacter { line, col, snippet });
            }
        };
        let text = &caps[0];

        if caps.name("ws").is_some() || caps.name("comment").is_some() {
            pos += text.len();
            col += text.len() as u32;
            continue;
        }
        if caps.name("nl").is_some() {
            pos += 1;
            line += 1;
            col = 1;
            continue;
        }

        let kind = if caps.name("id").is_some() {
            if KEYWORDS.contains(text) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            }
        } else if caps.name("num").is_some() {
            TokenKind::Number
        } else if caps.name("op").is_some() {
            TokenKind::Op
        } else {
            TokenKind::Sym
        };

        toks.push(Token {
            kind,
            text: text.to_owned(),
            line,
            col,
        });
        pos += text.len();
        col += text.len() as u32;
    }

    toks.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line,
        col,
    });
    Ok(toks)
}
