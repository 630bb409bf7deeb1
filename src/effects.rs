//! Interprocedural read/write effect analysis.
//!
//! An [`Effect`] summarizes which variables a region of code may read and
//! write, together with the source lines of each access. Function summaries
//! are computed by monotone union iteration: every summary starts empty and
//! only grows, so on the finite lattice of (identifier, line) subsets the
//! iteration reaches a fixed point. A bounded iteration count is kept as a
//! termination guard.
//!
//! Calls are approximated by substitution: a callee's summary is rewritten
//! through the actual arguments of the call site, mapping each formal
//! parameter to the variables of its actual. This is the only aliasing the
//! analysis models; everything that is not a formal passes through as a
//! global.

use crate::ast::{Expr, FunctionDef, Program, SpawnTarget, Stmt};
use fnv::{FnvHashMap, FnvHashSet};
use log::debug;

/// Per-function effect summaries keyed by function name.
pub type EffectTable = FnvHashMap<String, Effect>;

/// Read/write footprint of a function or statement fragment.
///
/// Every name in `reads` has a nonempty entry in `read_sites`, and
/// symmetrically for writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effect {
    pub reads: FnvHashSet<String>,
    pub writes: FnvHashSet<String>,
    pub read_sites: FnvHashMap<String, FnvHashSet<u32>>,
    pub write_sites: FnvHashMap<String, FnvHashSet<u32>>,
}

impl Effect {
    /// Records a read of `var` at `line`.
    pub fn add_read(&mut self, var: &str, line: u32) {
        self.reads.insert(var.to_owned());
        self.read_sites.entry(var.to_owned()).or_default().insert(line);
    }

    /// Records a write of `var` at `line`.
    pub fn add_write(&mut self, var: &str, line: u32) {
        self.writes.insert(var.to_owned());
        self.write_sites
            .entry(var.to_owned())
            .or_default()
            .insert(line);
    }

    /// Unions `other` into `self`.
    pub fn merge(&mut self, other: &Effect) {
        self.reads.extend(other.reads.iter().cloned());
        self.writes.extend(other.writes.iter().cloned());
        for (var, lines) in &other.read_sites {
            self.read_sites
                .entry(var.clone())
                .or_default()
                .extend(lines.iter().copied());
        }
        for (var, lines) in &other.write_sites {
            self.write_sites
                .entry(var.clone())
                .or_default()
                .extend(lines.iter().copied());
        }
    }

    /// Smallest recorded site for `var`, reads and writes together, or
    /// `fallback` when no site is recorded.
    pub fn first_site(&self, var: &str, fallback: u32) -> u32 {
        let reads = self.read_sites.get(var).into_iter().flatten();
        let writes = self.write_sites.get(var).into_iter().flatten();
        reads.chain(writes).copied().min().unwrap_or(fallback)
    }
}

/// Set of variable names referenced by an expression.
pub fn vars_in_expr(expr: &Expr) -> FnvHashSet<String> {
    let mut vars = FnvHashSet::default();
    collect_vars(expr, &mut vars);
    vars
}

fn collect_vars(expr: &Expr, vars: &mut FnvHashSet<String>) {
    match expr {
        Expr::Var { name, .. } => {
            vars.insert(name.clone());
        }
        Expr::Num { .. } | Expr::Bool { .. } => {}
        Expr::Arith { left, right, .. } | Expr::Rel { left, right, .. } => {
            collect_vars(left, vars);
            collect_vars(right, vars);
        }
    }
}

/// Rewrites a callee effect through the actual arguments of a call site.
///
/// Each formal parameter maps to the variables of its actual argument, so a
/// constant-only actual maps the formal to nothing and the formal contributes
/// no accesses at this call site. A missing actual is tolerated the same way.
/// Names that are not formals pass through unchanged, as globals. Line sites
/// carry through unchanged.
pub fn substitute(callee_eff: &Effect, callee_def: &FunctionDef, args: &[Expr]) -> Effect {
    let mut mapping: FnvHashMap<&str, FnvHashSet<String>> = FnvHashMap::default();
    for (i, param) in callee_def.params.iter().enumerate() {
        let actual = args.get(i).map(vars_in_expr).unwrap_or_default();
        mapping.insert(param, actual);
    }

    let mut out = Effect::default();
    for var in &callee_eff.reads {
        let lines: Vec<u32> = callee_eff
            .read_sites
            .get(var)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        match mapping.get(var.as_str()) {
            Some(targets) => {
                for target in targets {
                    for &line in &lines {
                        out.add_read(target, line);
                    }
                }
            }
            None => {
                for &line in &lines {
                    out.add_read(var, line);
                }
            }
        }
    }
    for var in &callee_eff.writes {
        let lines: Vec<u32> = callee_eff
            .write_sites
            .get(var)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        match mapping.get(var.as_str()) {
            Some(targets) => {
                for target in targets {
                    for &line in &lines {
                        out.add_write(target, line);
                    }
                }
            }
            None => {
                for &line in &lines {
                    out.add_write(var, line);
                }
            }
        }
    }
    out
}

/// Effect of a single statement under the current summary table.
pub fn effect_of_stmt(stmt: &Stmt, prog: &Program, effects: &EffectTable) -> Effect {
    let mut eff = Effect::default();
    match stmt {
        Stmt::Assign { line, target, expr } => {
            for var in vars_in_expr(expr) {
                eff.add_read(&var, *line);
            }
            eff.add_write(target, *line);
        }
        Stmt::AssignCall {
            line,
            target,
            func,
            args,
        } => {
            for arg in args {
                for var in vars_in_expr(arg) {
                    eff.add_read(&var, *line);
                }
            }
            eff.merge(&substitute(&effects[func.as_str()], prog.function(func), args));
            eff.add_write(target, *line);
        }
        Stmt::Call { line, func, args } => {
            for arg in args {
                for var in vars_in_expr(arg) {
                    eff.add_read(&var, *line);
                }
            }
            eff.merge(&substitute(&effects[func.as_str()], prog.function(func), args));
        }
        Stmt::Spawn(s) => {
            if let Some(handle) = &s.handle {
                eff.add_write(handle, s.line);
            }
            match &s.target {
                SpawnTarget::Call { func, args, .. } => {
                    for arg in args {
                        for var in vars_in_expr(arg) {
                            eff.add_read(&var, s.line);
                        }
                    }
                    eff.merge(&substitute(
                        &effects[func.as_str()],
                        prog.function(func),
                        args,
                    ));
                }
                SpawnTarget::Block { body, .. } => {
                    eff.merge(&effect_of_stmt(body, prog, effects));
                }
            }
        }
        Stmt::Await { .. } => {}
        Stmt::Return { line, expr } => {
            for var in vars_in_expr(expr) {
                eff.add_read(&var, *line);
            }
        }
        Stmt::Seq { stmts, .. } => {
            for s in stmts {
                eff.merge(&effect_of_stmt(s, prog, effects));
            }
        }
        Stmt::If {
            line,
            cond,
            then_branch,
            else_branch,
        } => {
            for var in vars_in_expr(cond) {
                eff.add_read(&var, *line);
            }
            eff.merge(&effect_of_stmt(then_branch, prog, effects));
            eff.merge(&effect_of_stmt(else_branch, prog, effects));
        }
        Stmt::While { line, cond, body } => {
            for var in vars_in_expr(cond) {
                eff.add_read(&var, *line);
            }
            eff.merge(&effect_of_stmt(body, prog, effects));
        }
    }
    eff
}

// Termination guard; the finite lattice converges well before this on any
// real input.
const MAX_FIXPOINT_ITERATIONS: usize = 50;

/// Computes the effect summary of every function to a monotone fixed point.
pub fn function_effects(prog: &Program) -> EffectTable {
    let names: Vec<&String> = prog.functions.keys().collect();
    let mut effects: EffectTable = names
        .iter()
        .map(|name| ((*name).clone(), Effect::default()))
        .collect();

    for iteration in 1..=MAX_FIXPOINT_ITERATIONS {
        let mut changed = false;
        for name in &names {
            let fdef = prog.function(name);
            let recomputed = effect_of_stmt(&fdef.body, prog, &effects);
            if let Some(stored) = effects.get_mut(name.as_str()) {
                if *stored != recomputed {
                    stored.merge(&recomputed);
                    changed = true;
                }
            }
        }
        if !changed {
            debug!("effect fixpoint converged after {} iteration(s)", iteration);
            return effects;
        }
    }
    debug!("effect fixpoint stopped at the iteration bound");
    effects
}
