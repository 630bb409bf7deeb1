//! Race classification and warning emission.
//!
//! Two granularities of interleaving are flagged. An access-vs-thread
//! conflict pairs the statement currently being walked against a live
//! thread's footprint. A thread-vs-thread conflict pairs a freshly spawned
//! thread against each already-live one. In both cases at least one side
//! must write the variable.

use crate::concurrency::{ConcurState, ThreadInfo};
use fnv::FnvHashSet;
use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use tinyvec::TinyVec;

/// How the statement under analysis touches a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::Read => "R",
            AccessMode::Write => "W",
            AccessMode::ReadWrite => "RW",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a race candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceKind {
    ReadVsThread,
    WriteVsThread,
    ReadWriteVsThread,
    ThreadVsThread,
}

impl RaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RaceKind::ReadVsThread => "R vs T",
            RaceKind::WriteVsThread => "W vs T",
            RaceKind::ReadWriteVsThread => "RW vs T",
            RaceKind::ThreadVsThread => "T vs T",
        }
    }
}

impl From<AccessMode> for RaceKind {
    fn from(mode: AccessMode) -> RaceKind {
        match mode {
            AccessMode::Read => RaceKind::ReadVsThread,
            AccessMode::Write => RaceKind::WriteVsThread,
            AccessMode::ReadWrite => RaceKind::ReadWriteVsThread,
        }
    }
}

impl fmt::Display for RaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Kinds order by their rendered text so warnings sort the way they print.
impl Ord for RaceKind {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for RaceKind {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A race candidate: one access or thread (side A) against a live thread
/// (side B).
///
/// Warnings compare structurally, and the total order leads with
/// `(line_a, var, kind)`, so accumulating them in a `BTreeSet` both collapses
/// duplicates and yields the stable report order directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceWarning {
    pub var: String,
    pub kind: RaceKind,
    pub line_a: u32,
    pub ctx_a: String,
    /// Sorted lines at which side B touches the variable.
    pub lines_b: TinyVec<[u32; 4]>,
    pub ctx_b: String,
}

impl RaceWarning {
    fn sort_key(&self) -> (u32, &str, &'static str, &[u32], &str, &str) {
        (
            self.line_a,
            self.var.as_str(),
            self.kind.as_str(),
            &self.lines_b[..],
            self.ctx_a.as_str(),
            self.ctx_b.as_str(),
        )
    }
}

impl Ord for RaceWarning {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for RaceWarning {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RaceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines_b = if self.lines_b.is_empty() {
            "?".to_owned()
        } else {
            self.lines_b.iter().join(", ")
        };
        writeln!(
            f,
            "[RACE] var='{}' @ line {} ({})",
            self.var, self.line_a, self.kind
        )?;
        writeln!(f, "  A: {}", self.ctx_a)?;
        write!(f, "  B: lines {{{}}} in {}", lines_b, self.ctx_b)
    }
}

/// Access mode of `var` given the read and write sets of a statement, or
/// `None` when the statement does not touch it.
pub fn mode_for(
    var: &str,
    reads: &FnvHashSet<String>,
    writes: &FnvHashSet<String>,
) -> Option<AccessMode> {
    match (reads.contains(var), writes.contains(var)) {
        (true, true) => Some(AccessMode::ReadWrite),
        (true, false) => Some(AccessMode::Read),
        (false, true) => Some(AccessMode::Write),
        (false, false) => None,
    }
}

// A read only conflicts with a writer; a write conflicts with any access.
fn conflicts(mode: AccessMode, thread: &ThreadInfo, var: &str) -> bool {
    match mode {
        AccessMode::Read => thread.writes.contains(var),
        AccessMode::Write | AccessMode::ReadWrite => {
            thread.writes.contains(var) || thread.reads.contains(var)
        }
    }
}

/// Lines at which `thread` touches `var`; the spawn line is the fallback when
/// the footprint records no site.
fn other_lines(thread: &ThreadInfo, var: &str) -> TinyVec<[u32; 4]> {
    let mut lines: BTreeSet<u32> = BTreeSet::new();
    if thread.writes.contains(var) {
        if let Some(sites) = thread.write_sites.get(var) {
            lines.extend(sites.iter().copied());
        }
    }
    if thread.reads.contains(var) {
        if let Some(sites) = thread.read_sites.get(var) {
            lines.extend(sites.iter().copied());
        }
    }
    if lines.is_empty() {
        lines.insert(thread.spawn_line);
    }
    lines.into_iter().collect()
}

/// Checks one access against every live thread and returns the warnings.
pub fn check_access(
    state: &ConcurState,
    var: &str,
    mode: AccessMode,
    line: u32,
    ctx: &str,
) -> Vec<RaceWarning> {
    let mut out = Vec::new();
    for thread in state.active.values() {
        if conflicts(mode, thread, var) {
            out.push(RaceWarning {
                var: var.to_owned(),
                kind: RaceKind::from(mode),
                line_a: line,
                ctx_a: ctx.to_owned(),
                lines_b: other_lines(thread, var),
                ctx_b: format!("{} (spawn line {})", thread.desc, thread.spawn_line),
            });
        }
    }
    out
}

/// Pairwise overlap between a newly spawned thread and an already-live one:
/// every variable one side writes and the other touches.
pub fn check_thread_thread(
    new: &ThreadInfo,
    old: &ThreadInfo,
    discover_line: u32,
) -> Vec<RaceWarning> {
    let mut overlap: BTreeSet<&str> = BTreeSet::new();
    for var in &new.writes {
        if old.reads.contains(var) || old.writes.contains(var) {
            overlap.insert(var);
        }
    }
    for var in &new.reads {
        if old.writes.contains(var) {
            overlap.insert(var);
        }
    }

    let mut out = Vec::new();
    for var in overlap {
        let lines_b: TinyVec<[u32; 4]> = other_lines(old, var)
            .into_iter()
            .chain(other_lines(new, var))
            .collect::<BTreeSet<u32>>()
            .into_iter()
            .collect();
        out.push(RaceWarning {
            var: var.to_owned(),
            kind: RaceKind::ThreadVsThread,
            line_a: discover_line,
            ctx_a: format!(
                "concurrent threads overlap starting at spawn line {}",
                discover_line
            ),
            lines_b,
            ctx_b: format!(
                "{} (spawn {}) || {} (spawn {})",
                old.desc, old.spawn_line, new.desc, new.spawn_line
            ),
        });
    }
    out
}
