//! Escaped-thread analysis.
//!
//! A spawn whose handle is never awaited in its own function may still be
//! running when the function returns. Each such spawn is captured as a
//! [`ThreadInfo`] keyed by the function it escapes from, and the walker
//! injects those threads into the caller's live set at every call site.
//! Because spawn and await cannot occur under `if` or `while`, the awaited
//! set is a purely syntactic question. Handle-less spawns are joined through
//! the callee-name sugar within the same function and never escape.

use crate::ast::{Program, SpawnTarget};
use crate::concurrency::ThreadInfo;
use crate::constraints::list_spawns_awaits;
use crate::effects::{effect_of_stmt, substitute, EffectTable};
use fnv::{FnvHashMap, FnvHashSet};
use log::debug;

/// Escaping threads keyed by the function they escape from. Every function
/// has an entry, possibly empty.
pub type EscapeTable = FnvHashMap<String, Vec<ThreadInfo>>;

/// Computes the escaping threads of every function.
pub fn escaping_threads(prog: &Program, effects: &EffectTable) -> EscapeTable {
    let mut escapes = EscapeTable::default();
    for (fname, fdef) in &prog.functions {
        let (spawns, awaits) = list_spawns_awaits(&fdef.body);
        let awaited: FnvHashSet<&str> = awaits.into_iter().collect();

        let mut threads = Vec::new();
        for spawn in spawns {
            let handle = match &spawn.handle {
                Some(h) if !awaited.contains(h.as_str()) => h,
                _ => continue,
            };

            let (footprint, desc) = match &spawn.target {
                SpawnTarget::Call { func, args, .. } => (
                    substitute(&effects[func.as_str()], prog.function(func), args),
                    format!("escaped spawn {}(...) from {}", func, fname),
                ),
                SpawnTarget::Block { body, .. } => (
                    effect_of_stmt(body, prog, effects),
                    format!("escaped spawn {{block}} from {}", fname),
                ),
            };

            let tid = format!("{}:{}@{}", fname, handle, spawn.line);
            threads.push(ThreadInfo::from_effect(footprint, tid, desc, spawn.line));
        }

        if !threads.is_empty() {
            debug!("{}: {} escaping thread(s)", fname, threads.len());
        }
        escapes.insert(fname.clone(), threads);
    }
    escapes
}
