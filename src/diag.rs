//! Diagnostic definitions and rendering.
//!
//! Every failure the front end can produce is a variant of [`Diagnostic`].
//! All of them are fatal: the driver reports the diagnostic and aborts, no
//! partial analysis is attempted. Rendering against the source buffer is done
//! with `annotate-snippets` so the offending line is shown in context.

use annotate_snippets::display_list::{DisplayList, FormatOptions};
use annotate_snippets::snippet::{Annotation, AnnotationType, Slice, Snippet, SourceAnnotation};
use std::error::Error;
use std::fmt;

/// A fatal analysis failure, reported with the line it arose on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The lexer hit a character that starts no token.
    UnexpectedCharacter { line: u32, col: u32, snippet: String },
    /// The parser found a token other than what the grammar requires.
    UnexpectedToken {
        line: u32,
        expected: String,
        found: String,
    },
    /// Two function definitions share a name.
    DuplicateFunction { line: u32, name: String },
    /// A `spawn` appears lexically inside an `if` or `while` body.
    SpawnInControl { line: u32 },
    /// An `await` appears lexically inside an `if` or `while` body.
    AwaitInControl { line: u32 },
    /// A statement calls or spawns a function the program never defines.
    UndefinedFunction { line: u32, name: String },
}

impl Diagnostic {
    /// Source line the diagnostic points at.
    pub fn line(&self) -> u32 {
        match *self {
            Diagnostic::UnexpectedCharacter { line, .. }
            | Diagnostic::UnexpectedToken { line, .. }
            | Diagnostic::DuplicateFunction { line, .. }
            | Diagnostic::SpawnInControl { line }
            | Diagnostic::AwaitInControl { line }
            | Diagnostic::UndefinedFunction { line, .. } => line,
        }
    }

    /// Renders the diagnostic against the source buffer it came from,
    /// annotating the offending line.
    pub fn annotate(&self, origin: &str, source: &str) -> String {
        let message = self.to_string();
        let line = self.line().max(1) as usize;
        let source_line = source.lines().nth(line - 1).unwrap_or("");
        let annotations = if source_line.is_empty() {
            vec![]
        } else {
            vec![SourceAnnotation {
                range: (0, source_line.len()),
                label: "",
                annotation_type: AnnotationType::Error,
            }]
        };
        let snippet = Snippet {
            title: Some(Annotation {
                id: None,
                label: Some(&message),
                annotation_type: AnnotationType::Error,
            }),
            footer: vec![],
            slices: vec![Slice {
                source: source_line,
                line_start: line,
                origin: Some(origin),
                fold: false,
                annotations,
            }],
            opt: FormatOptions {
                color: true,
                ..Default::default()
            },
        };
        DisplayList::from(snippet).to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnexpectedCharacter { line, col, snippet } => {
                write!(
                    f,
                    "unexpected character at line {} col {}: {:?}",
                    line, col, snippet
                )
            }
            Diagnostic::UnexpectedToken {
                line,
                expected,
                found,
            } => write!(f, "expected {} at line {}, got {}", expected, line, found),
            Diagnostic::DuplicateFunction { line, name } => {
                write!(f, "duplicate function `{}` at line {}", name, line)
            }
            Diagnostic::SpawnInControl { line } => {
                write!(f, "spawn not allowed inside if/while (line {})", line)
            }
            Diagnostic::AwaitInControl { line } => {
                write!(f, "await not allowed inside if/while (line {})", line)
            }
            Diagnostic::UndefinedFunction { line, name } => {
                write!(f, "call to undefined function `{}` at line {}", name, line)
            }
        }
    }
}

impl Error for Diagnostic {}
