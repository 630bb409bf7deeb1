//! A static data-race detector for SMALL programs with structured
//! `spawn`/`await` concurrency.
//!
//! Given SMALL source text, the analyzer reports pairs of accesses to the
//! same variable that may execute concurrently with at least one write. The
//! pipeline after parsing has three stages: interprocedural read/write
//! *effect* summaries per function computed to a monotone fixed point, an
//! *escape* pass finding spawned threads that outlive their function, and a
//! structural *walk* of every function body that maintains the set of live
//! threads and handle bindings, querying a conflict checker at each access.
//!
//! The analysis is approximate: it may report races that cannot occur, and
//! it makes no attempt to prove their absence. It relies on the structural
//! rule that `spawn` and `await` never appear inside `if` or `while`, which
//! the validator enforces before any pass runs.
//!
//! Most uses go through [`Database`]: load a program with
//! [`Database::parse`], then request [`Database::race_result`]. The
//! [`analyze_source`] convenience wraps both for one-shot runs.

pub mod ast;
pub mod concurrency;
pub mod conflicts;
pub mod constraints;
pub mod database;
pub mod diag;
pub mod effects;
pub mod engine;
pub mod escapes;
pub mod lexer;
pub mod parser;

#[cfg(test)]
mod effect_tests;
#[cfg(test)]
mod parser_tests;

pub use crate::conflicts::{RaceKind, RaceWarning};
pub use crate::database::{Database, DbOptions};
pub use crate::diag::Diagnostic;

/// Analyzes SMALL source text and returns the sorted race candidates.
pub fn analyze_source(text: &str) -> Result<Vec<RaceWarning>, Diagnostic> {
    let mut db = Database::new(DbOptions::default());
    db.parse(text)?;
    Ok(db.race_result().as_ref().clone())
}
