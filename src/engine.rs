//! The concurrent-state walker.
//!
//! Each function body is traversed statement by statement while a
//! [`ConcurState`] tracks the threads that may be running concurrently with
//! the statement at hand. Every variable access is checked against that live
//! set, and every new spawn is checked pairwise against it, accumulating
//! [`RaceWarning`]s into a shared set.
//!
//! State handling follows the structure of the program. Sequences thread the
//! state forward; `if` walks both branches from independent clones and joins
//! the results; `while` joins the incoming state with the state after one
//! body pass, which is already the fixed point because no thread can be
//! spawned inside a loop. Calls inject the callee's escaped threads into the
//! live set, substituted through the actual arguments. Overwriting a handle
//! variable clears its binding, so a stale thread can no longer be joined by
//! name, but it stays live and keeps producing access warnings.

use crate::ast::{Expr, FunctionDef, Program, Spawn, SpawnTarget, Stmt};
use crate::concurrency::{join_states, ConcurState, ThreadInfo};
use crate::conflicts::{check_access, check_thread_thread, mode_for, AccessMode, RaceWarning};
use crate::effects::{effect_of_stmt, substitute, vars_in_expr, EffectTable};
use crate::escapes::EscapeTable;
use fnv::FnvHashSet;
use itertools::Itertools;
use std::collections::BTreeSet;

/// Walks one function body, threading the concurrent state through every
/// statement and accumulating warnings.
pub struct Walker<'a> {
    prog: &'a Program,
    effects: &'a EffectTable,
    escapes: &'a EscapeTable,
    current: &'a FunctionDef,
    warnings: &'a mut BTreeSet<RaceWarning>,
}

impl<'a> Walker<'a> {
    pub fn new(
        prog: &'a Program,
        effects: &'a EffectTable,
        escapes: &'a EscapeTable,
        current: &'a FunctionDef,
        warnings: &'a mut BTreeSet<RaceWarning>,
    ) -> Walker<'a> {
        Walker {
            prog,
            effects,
            escapes,
            current,
            warnings,
        }
    }

    fn emit(&mut self, warnings: Vec<RaceWarning>) {
        self.warnings.extend(warnings);
    }

    /// Analyzes `stmt` starting from `state`, returning the state after it.
    pub fn walk(&mut self, stmt: &Stmt, mut state: ConcurState) -> ConcurState {
        match stmt {
            Stmt::Assign { line, target, expr } => {
                // Overwriting a handle variable invalidates its bindings so a
                // later await cannot join a stale thread.
                if let Some(bound) = state.handle_env.get_mut(target) {
                    bound.clear();
                }

                let reads = vars_in_expr(expr);
                let writes: FnvHashSet<String> = std::iter::once(target.clone()).collect();
                for var in reads.iter().chain(writes.iter()).unique().sorted() {
                    if let Some(mode) = mode_for(var, &reads, &writes) {
                        let ctx = format!("{}:{} at line {}", self.current.name, mode, line);
                        let found = check_access(&state, var, mode, *line, &ctx);
                        self.emit(found);
                    }
                }
                state
            }
            Stmt::AssignCall {
                line,
                target,
                func,
                args,
            } => {
                if let Some(bound) = state.handle_env.get_mut(target) {
                    bound.clear();
                }
                self.call_site(&mut state, func, args, *line, Some(target));
                state
            }
            Stmt::Call { line, func, args } => {
                self.call_site(&mut state, func, args, *line, None);
                state
            }
            Stmt::Spawn(spawn) => {
                self.spawn_site(&mut state, spawn);
                state
            }
            Stmt::Await { handle, .. } => {
                // Joining terminates exactly the threads bound to the handle
                // at this point; the binding itself becomes empty.
                let bound = state.handle_env.insert(handle.clone(), FnvHashSet::default());
                for tid in bound.into_iter().flatten() {
                    state.active.remove(&tid);
                }
                state
            }
            Stmt::Return { line, expr } => {
                let reads = vars_in_expr(expr);
                for var in reads.iter().sorted() {
                    let ctx = format!("{}:R(return) at line {}", self.current.name, line);
                    let found = check_access(&state, var, AccessMode::Read, *line, &ctx);
                    self.emit(found);
                }
                state
            }
            Stmt::Seq { stmts, .. } => {
                for s in stmts {
                    state = self.walk(s, state);
                }
                state
            }
            Stmt::If {
                line,
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_reads = vars_in_expr(cond);
                for var in cond_reads.iter().sorted() {
                    let ctx = format!("{}:R(if-cond) at line {}", self.current.name, line);
                    let found = check_access(&state, var, AccessMode::Read, *line, &ctx);
                    self.emit(found);
                }
                let then_state = self.walk(then_branch, state.clone());
                let else_state = self.walk(else_branch, state);
                join_states(then_state, else_state)
            }
            Stmt::While { line, cond, body } => {
                let cond_reads = vars_in_expr(cond);
                for var in cond_reads.iter().sorted() {
                    let ctx = format!("{}:R(while-cond) at line {}", self.current.name, line);
                    let found = check_access(&state, var, AccessMode::Read, *line, &ctx);
                    self.emit(found);
                }
                // One body pass is already the fixed point: spawns cannot
                // occur in loop bodies, so the live set cannot grow across
                // iterations.
                let body_state = self.walk(body, state.clone());
                join_states(state, body_state)
            }
        }
    }

    /// Shared handling for `f(...)` and `x = f(...)`: argument reads, the
    /// substituted callee footprint, the result write when there is one, and
    /// finally the injection of the callee's escaped threads.
    fn call_site(
        &mut self,
        state: &mut ConcurState,
        func: &str,
        args: &[Expr],
        line: u32,
        ret_target: Option<&str>,
    ) {
        let arg_reads: FnvHashSet<String> = args.iter().flat_map(vars_in_expr).collect();
        for var in arg_reads.iter().sorted() {
            let ctx = format!("{}:R(arg) at call site line {}", self.current.name, line);
            let found = check_access(state, var, AccessMode::Read, line, &ctx);
            self.emit(found);
        }

        let callee_def = self.prog.function(func);
        let callee_eff = substitute(&self.effects[func], callee_def, args);

        for var in callee_eff
            .reads
            .iter()
            .chain(callee_eff.writes.iter())
            .unique()
            .sorted()
        {
            if let Some(mode) = mode_for(var, &callee_eff.reads, &callee_eff.writes) {
                // Point at the earliest access site inside the callee.
                let site = callee_eff.first_site(var, line);
                let ctx = format!(
                    "{}:{} during call from {} at line {}",
                    func, mode, self.current.name, line
                );
                let found = check_access(state, var, mode, site, &ctx);
                self.emit(found);
            }
        }

        if let Some(target) = ret_target {
            let ctx = format!("{}:W(ret) at line {}", self.current.name, line);
            let found = check_access(state, target, AccessMode::Write, line, &ctx);
            self.emit(found);
        }

        // Spawns escaping the callee may still be running after the call
        // returns; install them as live threads under fresh ids.
        for escaped in &self.escapes[func] {
            let footprint = substitute(&escaped.footprint(), callee_def, args);
            let tid = format!("escaped:{}@call{}", escaped.thread_id, line);
            let thread =
                ThreadInfo::from_effect(footprint, tid.clone(), escaped.desc.clone(), escaped.spawn_line);
            state.active.insert(tid, thread);
        }
    }

    fn spawn_site(&mut self, state: &mut ConcurState, spawn: &Spawn) {
        let line = spawn.line;

        if let Some(handle) = &spawn.handle {
            if let Some(bound) = state.handle_env.get_mut(handle) {
                bound.clear();
            }
            let ctx = format!("{}:W(handle) at spawn line {}", self.current.name, line);
            let found = check_access(state, handle, AccessMode::Write, line, &ctx);
            self.emit(found);
        }

        // The parent evaluates arguments before the new thread starts, so
        // those reads are checked against the threads already running.
        let (footprint, desc, base) = match &spawn.target {
            SpawnTarget::Call { func, args, .. } => {
                let arg_reads: FnvHashSet<String> = args.iter().flat_map(vars_in_expr).collect();
                for var in arg_reads.iter().sorted() {
                    let ctx = format!("{}:R(arg) at spawn line {}", self.current.name, line);
                    let found = check_access(state, var, AccessMode::Read, line, &ctx);
                    self.emit(found);
                }
                let footprint = substitute(&self.effects[func], self.prog.function(func), args);
                let desc = format!("spawn {}(...) in {}", func, self.current.name);
                (footprint, desc, spawn.handle.as_deref().unwrap_or(func))
            }
            SpawnTarget::Block { body, .. } => {
                let footprint = effect_of_stmt(body, self.prog, self.effects);
                let desc = format!("spawn {{block}} in {}", self.current.name);
                (footprint, desc, spawn.handle.as_deref().unwrap_or("_anon"))
            }
        };

        let tid = format!("{}:{}@{}", self.current.name, base, line);
        let thread = ThreadInfo::from_effect(footprint, tid.clone(), desc, line);

        for old in state.active.values() {
            let found = check_thread_thread(&thread, old, line);
            self.emit(found);
        }

        state.active.insert(tid.clone(), thread);

        if let Some(handle) = &spawn.handle {
            state
                .handle_env
                .entry(handle.clone())
                .or_default()
                .insert(tid);
        } else if let SpawnTarget::Call { func, .. } = &spawn.target {
            // Handle-less `spawn f(...)` may be joined as `await f`; repeated
            // spawns of the same callee accumulate under its name.
            state
                .handle_env
                .entry(func.clone())
                .or_default()
                .insert(tid);
        }
    }
}

/// Walks every function of a validated program and returns the deduplicated
/// warnings, sorted by `(line_a, var, kind)`.
pub fn analyze_program(
    prog: &Program,
    effects: &EffectTable,
    escapes: &EscapeTable,
) -> Vec<RaceWarning> {
    let mut warnings = BTreeSet::new();
    for fdef in prog.functions.values() {
        let mut walker = Walker::new(prog, effects, escapes, fdef, &mut warnings);
        walker.walk(&fdef.body, ConcurState::default());
    }
    warnings.into_iter().collect()
}
