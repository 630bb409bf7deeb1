//! Symbolic concurrent state maintained by the walker.
//!
//! A [`ThreadInfo`] snapshots the read/write footprint of a spawned thread's
//! whole body. The [`ConcurState`] tracks which threads are live at the
//! current analysis point and which thread ids each handle variable is bound
//! to. Control-flow splits receive independent clones of the state and the
//! branch results are merged back structurally.

use crate::effects::Effect;
use fnv::{FnvHashMap, FnvHashSet};
use std::collections::hash_map::Entry;

/// Footprint of a live thread under analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadInfo {
    /// Deterministic id derived from the spawning function, the handle or
    /// callee name, and the spawn line. Reproducible ids let state joins
    /// recognize the same thread observed on two branches.
    pub thread_id: String,
    /// Human-readable label used in warning contexts.
    pub desc: String,
    pub spawn_line: u32,
    pub reads: FnvHashSet<String>,
    pub writes: FnvHashSet<String>,
    pub read_sites: FnvHashMap<String, FnvHashSet<u32>>,
    pub write_sites: FnvHashMap<String, FnvHashSet<u32>>,
}

impl ThreadInfo {
    /// Captures a computed effect as the footprint of a new thread.
    pub fn from_effect(eff: Effect, thread_id: String, desc: String, spawn_line: u32) -> ThreadInfo {
        ThreadInfo {
            thread_id,
            desc,
            spawn_line,
            reads: eff.reads,
            writes: eff.writes,
            read_sites: eff.read_sites,
            write_sites: eff.write_sites,
        }
    }

    /// The stored footprint as a plain effect, used when an escaped thread is
    /// substituted through the arguments of a call site.
    pub fn footprint(&self) -> Effect {
        Effect {
            reads: self.reads.clone(),
            writes: self.writes.clone(),
            read_sites: self.read_sites.clone(),
            write_sites: self.write_sites.clone(),
        }
    }
}

/// Threads live at the current analysis point, plus handle bindings.
///
/// `Clone` is deep enough that mutation on one control-flow branch cannot be
/// observed on the other.
#[derive(Debug, Clone, Default)]
pub struct ConcurState {
    /// Live threads keyed by thread id.
    pub active: FnvHashMap<String, ThreadInfo>,
    /// Handle variable name to the set of thread ids it would join.
    pub handle_env: FnvHashMap<String, FnvHashSet<String>>,
}

/// Structural merge of the states reached on two control-flow branches.
///
/// Threads present on both sides merge their footprints; description and
/// spawn line are kept from the left side. Handle bindings union pointwise.
pub fn join_states(a: ConcurState, b: ConcurState) -> ConcurState {
    let mut out = a;
    for (tid, thread) in b.active {
        match out.active.entry(tid) {
            Entry::Occupied(mut occupied) => {
                let merged = occupied.get_mut();
                merged.reads.extend(thread.reads);
                merged.writes.extend(thread.writes);
                for (var, lines) in thread.read_sites {
                    merged.read_sites.entry(var).or_default().extend(lines);
                }
                for (var, lines) in thread.write_sites {
                    merged.write_sites.entry(var).or_default().extend(lines);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(thread);
            }
        }
    }
    for (handle, tids) in b.handle_env {
        out.handle_env.entry(handle).or_default().extend(tids);
    }
    out
}
