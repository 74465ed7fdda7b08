// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Sliding mark-compact collector for the global stack.
//!
//! A collection runs in phases over one engine:
//!
//! 1. **Mark** (`mark`): walk from every root and flag reachable cells.
//!    Between choice points the trail is scanned (`trail`) and bindings of
//!    unreachable cells are undone early, so the collector keeps no garbage
//!    alive just because backtracking could reach it.
//! 2. **Compact trail** (`trail`): drop the entries deleted by early reset.
//! 3. **Sweep** (`sweep`): link every root slot that points into the global
//!    stack into the relocation chain of its target.
//! 4. **Compact** (`compact`): slide marked cells down in two passes,
//!    resolving relocation chains as targets reach their new address.
//!
//! Global addresses are indices, so relocation chains are kept in an explicit
//! map from a target address to the slots that must learn its new address.
//! The per-cell flags live in a table created for the collection
//! (`bits::GcBits`).

pub mod bits;
pub mod check;

mod compact;
mod mark;
mod sweep;
mod trail;

#[cfg(test)]
mod mark_test;
#[cfg(test)]
mod trail_test;

use crate::engine::{Engine, Signals};
use crate::shared::Atom;
use crate::stacks::frames::FOREIGN_SIZE;
use crate::stacks::{ForeignFrameRef, StackKind, TermRef};
use bits::GcBits;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Callbacks into the virtual machine that owns the frames.
pub trait VmHooks: Send {
    /// Which of the `nslots` slots of a frame running `clause` at `pc` have
    /// been initialised. Slots reported `false` are cleared to unbound
    /// before marking, so stale garbage in them is never traced.
    fn initialised_slots(&self, clause: u64, pc: u64, nslots: usize) -> Vec<bool> {
        let _ = (clause, pc);
        vec![true; nslots]
    }
}

/// Hook that treats every slot as initialised.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllSlotsLive;

impl VmHooks for AllSlotsLive {}

/// Cumulative collector statistics of one engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Completed collections.
    pub collections: u64,
    /// Global cells reclaimed in total.
    pub global_reclaimed: u64,
    /// Trail entries reclaimed in total.
    pub trail_reclaimed: u64,
    /// Time spent collecting.
    pub time: Duration,
}

/// Outcome of one collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcReport {
    /// Global cells in use before the collection.
    pub global_before: usize,
    /// Global cells in use after it.
    pub global_after: usize,
    /// Trail entries before the collection.
    pub trail_before: usize,
    /// Trail entries after it.
    pub trail_after: usize,
    /// Wall time spent collecting.
    pub elapsed: Duration,
}

/// Snapshot of the collector state of an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcStatus {
    /// Collections are currently blocked.
    pub blocked: bool,
    /// A collection has been requested and not yet serviced.
    pub requested: bool,
    /// Completed collections.
    pub collections: u64,
}

/// Where a global mark lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MarkHolder {
    /// Inline integer in a local record.
    Cell(usize),
    /// The engine's frozen bar.
    FrozenBar,
}

/// A slot waiting for the new address of a relocation target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    /// Block cell holding a pointer word.
    Cell(usize),
    /// Argument register holding a pointer word.
    Register(usize),
    /// Trail entry.
    Trail(usize),
    /// A global mark; it becomes the new address plus `extent`.
    GlobalMark { holder: MarkHolder, extent: usize },
}

/// Counters checked at the end of a collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct GcCounters {
    /// Live global cells found by marking.
    pub total_marked: usize,
    /// Pointer slots into the global stack that must be relocated.
    pub needs_relocation: usize,
    /// Slots linked into relocation chains.
    pub relocation_cells: usize,
    /// Slots updated from relocation chains.
    pub relocated_cells: usize,
    /// Trail entries removed by early reset and merging.
    pub trail_deleted: usize,
}

/// State of one collection.
pub(crate) struct Collector<'e> {
    engine: &'e mut Engine,
    bits: GcBits,
    /// Cells still to visit during marking.
    work: Vec<usize>,
    /// Local cells marked so far; the sweep unmarks them.
    marked_locals: Vec<usize>,
    visited_frames: HashSet<usize>,
    chains: HashMap<usize, Vec<Slot>>,
    counters: GcCounters,
}

impl<'e> Collector<'e> {
    pub(crate) fn new(engine: &'e mut Engine) -> Self {
        let bits = GcBits::new(engine.stacks.block_len());
        Self {
            engine,
            bits,
            work: Vec::new(),
            marked_locals: Vec::new(),
            visited_frames: HashSet::new(),
            chains: HashMap::new(),
            counters: GcCounters::default(),
        }
    }

    /// Run all phases and return the final counters.
    pub(crate) fn collect(mut self) -> GcCounters {
        self.mark_phase();
        self.check_marks();
        self.compact_trail();
        self.sweep_roots();
        self.compact_global();
        self.check_relocation();
        self.counters
    }

    fn checks_enabled(&self) -> bool {
        cfg!(debug_assertions) || self.engine.config.check_consistency
    }
}

/// Global variables moved into term references for the duration of a
/// collection.
struct SavedGlobals {
    frame: ForeignFrameRef,
    refs: Vec<(Atom, TermRef)>,
}

impl Engine {
    /// Collect garbage on the global stack and the trail.
    ///
    /// Returns `None` without doing anything when collection is disabled or
    /// blocked.
    pub fn garbage_collect(&mut self) -> Option<GcReport> {
        if !self.config.gc_enabled || self.gc_blocked > 0 {
            trace!(blocked = self.gc_blocked, "garbage collection skipped");
            return None;
        }
        let shared = Arc::clone(&self.shared);
        let term_gc = shared.enter_term_gc();
        self.gc_blocked += 1;
        self.signals_blocked += 1;
        self.signals.remove(Signals::GC);

        let started = Instant::now();
        let global_before = self.stacks.g_top;
        let trail_before = self.stacks.trail.len();

        self.clear_uninitialised_slots();
        let report = match self.save_global_vars() {
            Ok(saved) => {
                let counters = Collector::new(self).collect();
                if let Some(saved) = saved {
                    self.restore_global_vars(saved);
                }
                let elapsed = started.elapsed();
                let report = GcReport {
                    global_before,
                    global_after: self.stacks.g_top,
                    trail_before,
                    trail_after: self.stacks.trail.len(),
                    elapsed,
                };
                self.record_collection(&report);
                debug!(
                    global_before,
                    global_after = report.global_after,
                    trail_before,
                    trail_after = report.trail_after,
                    marked = counters.total_marked,
                    trail_deleted = counters.trail_deleted,
                    ?elapsed,
                    "garbage collection"
                );
                Some(report)
            }
            Err(err) => {
                warn!(%err, "garbage collection skipped: no room for global variable roots");
                None
            }
        };

        if report.is_some() && self.config.trim_after_gc {
            self.trim_stacks();
        }

        self.signals_blocked -= 1;
        self.gc_blocked -= 1;
        if term_gc.finish() {
            self.signals.insert(Signals::ATOM_GC);
        }
        report
    }

    fn record_collection(&mut self, report: &GcReport) {
        self.stacks.global.gced_size = report.global_after;
        self.stacks.trail_info.gced_size = report.trail_after;
        self.stats.collections += 1;
        self.stats.global_reclaimed += report.global_before.saturating_sub(report.global_after) as u64;
        self.stats.trail_reclaimed += report.trail_before.saturating_sub(report.trail_after) as u64;
        self.stats.time += report.elapsed;
    }

    /// Request a collection if `kind` has grown enough to make one worth it.
    ///
    /// Requests are coalesced in [`Signals::GC`] and serviced by
    /// [`Engine::handle_signals`]. Returns true if a collection is pending.
    pub fn consider_garbage_collect(&mut self, kind: StackKind) -> bool {
        if !self.config.gc_enabled || self.gc_blocked > 0 {
            return false;
        }
        let info = *self.stacks.info(kind);
        if !info.gc {
            return false;
        }
        let used = self.stacks.used(kind);
        let room = self.stacks.room(kind);
        let threshold = info
            .factor
            .saturating_mul(info.gced_size)
            .saturating_add(self.config.small_gc_threshold);
        let wanted = used > threshold || (room < info.min_free && used > info.gced_size);
        if wanted && !self.signals.contains(Signals::GC) {
            trace!(stack = %kind, used, room, gced = info.gced_size, "collection requested");
            self.signals.insert(Signals::GC);
        }
        self.signals.contains(Signals::GC)
    }

    /// Collector state.
    #[must_use]
    pub const fn gc_status(&self) -> GcStatus {
        GcStatus {
            blocked: self.gc_blocked > 0,
            requested: self.signals.contains(Signals::GC),
            collections: self.stats.collections,
        }
    }

    /// Cumulative statistics.
    #[must_use]
    pub const fn gc_stats(&self) -> &GcStats {
        &self.stats
    }

    /// Prevent collections until the matching [`Engine::unblock_gc`].
    pub const fn block_gc(&mut self) {
        self.gc_blocked += 1;
    }

    /// Undo one [`Engine::block_gc`].
    pub const fn unblock_gc(&mut self) {
        self.gc_blocked = self.gc_blocked.saturating_sub(1);
    }

    /// Install the hooks consulted for frame slot liveness.
    pub fn set_hooks(&mut self, hooks: Box<dyn VmHooks>) {
        self.hooks = hooks;
    }

    /// Frames reachable from the current frame and from every choice point.
    pub(crate) fn reachable_frames(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut frames = Vec::new();
        let starts = core::iter::once(self.frame).chain(
            self.stacks
                .choice_chain(self.choice)
                .into_iter()
                .map(|ch| self.stacks.choice(ch).frame),
        );
        for start in starts {
            let mut current = start;
            while let Some(fr) = current {
                if !seen.insert(fr) {
                    break;
                }
                frames.push(fr);
                current = self.stacks.frame(fr).parent;
            }
        }
        frames
    }

    fn clear_uninitialised_slots(&mut self) {
        let mut dead = Vec::new();
        for fr in self.reachable_frames() {
            let view = self.stacks.frame(fr);
            let live = self.hooks.initialised_slots(view.clause, view.pc, view.nslots);
            for slot in 0..view.nslots {
                if !live.get(slot).copied().unwrap_or(true) {
                    dead.push(view.slot(slot));
                }
            }
        }
        for cell in dead {
            self.stacks.memory[cell] = crate::term::Word::VAR;
        }
    }

    fn save_global_vars(&mut self) -> Result<Option<SavedGlobals>, crate::error::StackError> {
        if self.global_vars.is_empty() {
            return Ok(None);
        }
        let mut names: Vec<Atom> = self.global_vars.keys().copied().collect();
        names.sort_unstable();
        self.reserve(0, FOREIGN_SIZE + names.len(), 0)?;
        let frame = self.open_foreign_frame()?;
        let mut refs = Vec::with_capacity(names.len());
        for name in names {
            let term = self.new_term_ref()?;
            let value = self.global_vars.get(&name).copied().unwrap_or_default();
            let cell = self.cell_of(term);
            self.stacks.memory[cell] = value;
            refs.push((name, term));
        }
        Ok(Some(SavedGlobals { frame, refs }))
    }

    fn restore_global_vars(&mut self, saved: SavedGlobals) {
        for (name, term) in saved.refs {
            let value = self.stacks.memory[self.cell_of(term)];
            self.global_vars.insert(name, value);
        }
        self.close_foreign_frame(saved.frame);
    }
}
