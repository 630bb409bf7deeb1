//! Structural validation run before any analysis pass.
//!
//! Two constraints are enforced, both fatal. First, `spawn` and `await` must
//! not appear lexically inside an `if` or `while` body; plain `{ ... }`
//! blocks are neutral. Keeping thread creation and joining out of branching
//! control flow is what makes a purely syntactic answer to "is this spawn
//! awaited in the same function?" sufficient. Second, every named callee must
//! resolve to a defined function, so the later passes can look definitions up
//! without failure paths.

use crate::ast::{Program, Spawn, SpawnTarget, Stmt};
use crate::diag::Diagnostic;

/// Validates every function body of a parsed program.
pub fn validate(prog: &Program) -> Result<(), Diagnostic> {
    for f in prog.functions.values() {
        check_control(&f.body, false)?;
        check_callees(&f.body, prog)?;
    }
    Ok(())
}

fn check_control(stmt: &Stmt, inside_control: bool) -> Result<(), Diagnostic> {
    match stmt {
        Stmt::Spawn(s) if inside_control => Err(Diagnostic::SpawnInControl { line: s.line }),
        Stmt::Await { line, .. } if inside_control => {
            Err(Diagnostic::AwaitInControl { line: *line })
        }
        Stmt::Seq { stmts, .. } => {
            for s in stmts {
                check_control(s, inside_control)?;
            }
            Ok(())
        }
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            check_control(then_branch, true)?;
            check_control(else_branch, true)
        }
        Stmt::While { body, .. } => check_control(body, true),
        _ => Ok(()),
    }
}

fn check_callees(stmt: &Stmt, prog: &Program) -> Result<(), Diagnostic> {
    match stmt {
        Stmt::AssignCall { line, func, .. } | Stmt::Call { line, func, .. } => {
            resolve(prog, func, *line)
        }
        Stmt::Spawn(s) => match &s.target {
            SpawnTarget::Call { func, .. } => resolve(prog, func, s.line),
            SpawnTarget::Block { body, .. } => check_callees(body, prog),
        },
        Stmt::Seq { stmts, .. } => {
            for s in stmts {
                check_callees(s, prog)?;
            }
            Ok(())
        }
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            check_callees(then_branch, prog)?;
            check_callees(else_branch, prog)
        }
        Stmt::While { body, .. } => check_callees(body, prog),
        _ => Ok(()),
    }
}

fn resolve(prog: &Program, func: &str, line: u32) -> Result<(), Diagnostic> {
    if prog.functions.contains_key(func) {
        Ok(())
    } else {
        Err(Diagnostic::UndefinedFunction {
            line,
            name: func.to_owned(),
        })
    }
}

/// Collects the spawn statements and awaited handle names of a function body.
///
/// Only sequences are descended into; the validator guarantees that `spawn`
/// and `await` never occur under `if` or `while`, and spawn-block bodies
/// belong to the spawned thread rather than to this function.
pub fn list_spawns_awaits(stmt: &Stmt) -> (Vec<&Spawn>, Vec<&str>) {
    let mut spawns = Vec::new();
    let mut awaits = Vec::new();
    collect(stmt, &mut spawns, &mut awaits);
    (spawns, awaits)
}

fn collect<'a>(stmt: &'a Stmt, spawns: &mut Vec<&'a Spawn>, awaits: &mut Vec<&'a str>) {
    match stmt {
        Stmt::Spawn(s) => spawns.push(s),
        Stmt::Await { handle, .. } => awaits.push(handle),
        Stmt::Seq { stmts, .. } => {
            for s in stmts {
                collect(s, spawns, awaits);
            }
        }
        _ => {}
    }
}
