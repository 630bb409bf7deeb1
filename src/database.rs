//! Main API entry point for loading and analyzing SMALL programs.
//!
//! A variable of type `Database` represents one loaded program. You can
//! construct a `Database` object, load it from source text using the `parse`
//! method, then query analysis results which will be computed on demand.
//! Loading is fail-fast: lexical errors, parse errors, and semantic
//! constraint violations abort with a [`Diagnostic`] and leave the database
//! empty, so every later pass may assume a well-formed, fully resolved
//! program.
//!
//! ## Passes
//!
//! Analysis is organized as passes over the parsed program, each cached on
//! first request and invalidated by the next `parse`:
//!
//! * **effects** — interprocedural read/write summaries per function,
//!   computed by monotone union iteration to a fixed point.
//! * **escapes** — threads spawned but never awaited in their own function,
//!   which must be injected into callers at each call site.
//! * **races** — the concurrent-state walk over every function body,
//!   producing the deduplicated, sorted list of race candidates.
//!
//! The analyzer itself is single-threaded; all analysis data is owned by the
//! database and discarded with it.

use crate::ast::Program;
use crate::conflicts::RaceWarning;
use crate::constraints;
use crate::diag::Diagnostic;
use crate::effects;
use crate::effects::EffectTable;
use crate::engine;
use crate::escapes;
use crate::escapes::EscapeTable;
use crate::lexer;
use crate::parser::Parser;
use log::info;
use std::sync::Arc;
use std::time::Instant;

/// Structure for options that affect database processing, and must be
/// constant for the lifetime of the database container.
#[derive(Debug, Default, Clone)]
pub struct DbOptions {
    /// If true, elapsed time is logged after the completion of each pass.
    pub timing: bool,
}

fn time<R, F: FnOnce() -> R>(opts: &DbOptions, name: &str, f: F) -> R {
    let now = Instant::now();
    let ret = f();
    if opts.timing {
        info!("{} {}ms", name, now.elapsed().as_millis());
    }
    ret
}

/// Master type of analysis containers.
///
/// A variable of type `Database` holds a loaded program and the analysis
/// results for it. Results are generated lazily and are invalidated on any
/// reload of the program's source. Cloning the result `Arc`s out of the
/// accessors is cheap if results need to outlive the database.
pub struct Database {
    options: DbOptions,
    program: Option<Arc<Program>>,
    effects: Option<Arc<EffectTable>>,
    escapes: Option<Arc<EscapeTable>>,
    races: Option<Arc<Vec<RaceWarning>>>,
}

impl Database {
    /// Constructs a new database object representing no program.
    ///
    /// Use `parse` to load it with data.
    pub fn new(options: DbOptions) -> Database {
        Database {
            options,
            program: None,
            effects: None,
            escapes: None,
            races: None,
        }
    }

    /// Replaces the content of the database with the parsed and validated
    /// form of `text`.
    ///
    /// Tokenizing, parsing, and structural validation (no spawn/await inside
    /// if/while, every callee defined) run together; the first failure is
    /// returned and the database stays empty. All analysis results are
    /// invalidated; they will not immediately be rerun, but will be when next
    /// requested.
    pub fn parse(&mut self, text: &str) -> Result<(), Diagnostic> {
        self.program = None;
        self.effects = None;
        self.escapes = None;
        self.races = None;

        let opts = self.options.clone();
        let program = time(&opts, "parse", || -> Result<Program, Diagnostic> {
            let tokens = lexer::lex(text)?;
            let program = Parser::new(tokens).parse_program()?;
            constraints::validate(&program)?;
            Ok(program)
        })?;
        self.program = Some(Arc::new(program));
        Ok(())
    }

    /// Obtains a reference to the currently loaded program.
    pub fn parse_result(&self) -> &Arc<Program> {
        self.program.as_ref().expect("no program has been parsed")
    }

    /// Calculates and returns the per-function effect summaries.
    pub fn effect_result(&mut self) -> &Arc<EffectTable> {
        if self.effects.is_none() {
            let opts = self.options.clone();
            let program = self.parse_result().clone();
            let table = time(&opts, "effects", || effects::function_effects(&program));
            self.effects = Some(Arc::new(table));
        }
        self.effects.as_ref().unwrap()
    }

    /// Calculates and returns the escaping threads of each function.
    pub fn escape_result(&mut self) -> &Arc<EscapeTable> {
        if self.escapes.is_none() {
            let opts = self.options.clone();
            let program = self.parse_result().clone();
            let effects = self.effect_result().clone();
            let table = time(&opts, "escapes", || {
                escapes::escaping_threads(&program, &effects)
            });
            self.escapes = Some(Arc::new(table));
        }
        self.escapes.as_ref().unwrap()
    }

    /// Walks every function body and returns the deduplicated race
    /// candidates, sorted by `(line_a, var, kind)` for stable output.
    pub fn race_result(&mut self) -> &Arc<Vec<RaceWarning>> {
        if self.races.is_none() {
            let opts = self.options.clone();
            let program = self.parse_result().clone();
            let effects = self.effect_result().clone();
            let escapes = self.escape_result().clone();
            let warnings = time(&opts, "races", || {
                engine::analyze_program(&program, &effects, &escapes)
            });
            self.races = Some(Arc::new(warnings));
        }
        self.races.as_ref().unwrap()
    }
}
