// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Trail scan, early reset and trail compaction.
//!
//! A trail segment holds the bindings made since one boundary (choice point
//! or foreign frame) was created. During marking each segment is scanned from
//! its top down to the boundary's trail mark:
//!
//! - bindings of unmarked cells are undone now and dropped
//! - bindings of cells at or above the boundary's global mark are dropped,
//!   since backtracking discards those cells entirely
//! - bindings of local cells below the boundary's record are dropped without
//!   touching the cell, which may belong to a newer record by now
//! - surviving assignments keep their old value alive by marking it
//!
//! Deleted entries are squeezed out by [`Collector::compact_trail`] before
//! the sweep, which then only sees live entries.

use super::Collector;
use super::check::fatal;
use crate::stacks::TrailEntry;
use crate::stacks::frames::{CHOICE_TRAIL_MARK, FOREIGN_TRAIL_MARK};
use crate::term::Word;

/// What backtracking to the boundary owning a trail segment keeps.
#[derive(Clone, Copy, Debug)]
pub(super) struct SegmentLimits {
    /// Global cells at or above this are discarded.
    pub global_mark: usize,
    /// Local cells below this belong to records newer than the boundary.
    pub local_floor: usize,
}

impl Collector<'_> {
    /// Early reset of the trail segment `[mark, top)`. `limits` describe the
    /// boundary owning the segment, `None` for the oldest segment, which
    /// nothing ever undoes.
    pub(super) fn early_reset_vars(&mut self, mark: usize, top: usize, limits: Option<SegmentLimits>) {
        self.merge_trailed_assignments(mark, top);

        let mut i = top;
        while i > mark {
            i -= 1;
            match self.engine.stacks.trail[i] {
                TrailEntry::Deleted => {}
                TrailEntry::Bind(target) => {
                    if self.is_stale_local(target, limits) {
                        self.delete_trail_entry(i);
                    } else if !self.bits.is_marked(target) {
                        self.engine.stacks.memory[target] = Word::VAR;
                        self.delete_trail_entry(i);
                    } else if self.is_discarded(target, limits) {
                        self.delete_trail_entry(i);
                    }
                }
                TrailEntry::Value(value) => {
                    let target = match (i > mark).then(|| self.engine.stacks.trail[i - 1]) {
                        Some(TrailEntry::Bind(target)) => target,
                        _ => fatal("early reset", i, None, "assignment entry without its binding"),
                    };
                    if self.is_stale_local(target, limits) {
                        self.delete_trail_entry(i);
                        self.delete_trail_entry(i - 1);
                    } else if !self.bits.is_marked(target) {
                        self.engine.stacks.memory[target] = self.engine.stacks.memory[value];
                        self.delete_trail_entry(i);
                        self.delete_trail_entry(i - 1);
                    } else if self.is_discarded(target, limits) {
                        self.delete_trail_entry(i);
                        self.delete_trail_entry(i - 1);
                    } else {
                        self.mark_variable(value);
                    }
                    i -= 1;
                }
            }
        }
    }

    /// True if backtracking to the boundary throws away the global cell
    /// `target` itself.
    fn is_discarded(&self, target: usize, limits: Option<SegmentLimits>) -> bool {
        limits.is_some_and(|l| self.engine.stacks.is_global(target) && target >= l.global_mark)
    }

    /// True if `target` is a local cell the entry must no longer restore:
    /// it lies below the boundary's record, or the segment is never undone.
    fn is_stale_local(&self, target: usize, limits: Option<SegmentLimits>) -> bool {
        self.engine.stacks.is_local(target) && limits.is_none_or(|l| target < l.local_floor)
    }

    fn delete_trail_entry(&mut self, i: usize) {
        self.engine.stacks.trail[i] = TrailEntry::Deleted;
        self.counters.trail_deleted += 1;
    }

    /// Drop all but the oldest assignment to each cell in `[mark, top)`.
    ///
    /// The oldest entry restores the value the cell had when the segment
    /// began, which is all backtracking to the boundary needs. The `first`
    /// flag of each target serves as the "seen" set and is cleared again
    /// before returning.
    pub(super) fn merge_trailed_assignments(&mut self, mark: usize, top: usize) {
        let mut seen = Vec::new();
        for i in mark + 1..top {
            if !matches!(self.engine.stacks.trail[i], TrailEntry::Value(_)) {
                continue;
            }
            let TrailEntry::Bind(target) = self.engine.stacks.trail[i - 1] else {
                continue;
            };
            if self.bits.is_first(target) {
                self.delete_trail_entry(i - 1);
                self.delete_trail_entry(i);
            } else {
                self.bits.set_first(target);
                seen.push(target);
            }
        }
        for target in seen {
            self.bits.clear_first(target);
        }
    }

    /// Remove deleted entries and rewrite the trail marks of every choice
    /// point and foreign frame.
    pub(super) fn compact_trail(&mut self) {
        let stacks = &mut self.engine.stacks;
        let old = core::mem::take(&mut stacks.trail);
        let mut kept_before = Vec::with_capacity(old.len() + 1);
        let mut trail = Vec::with_capacity(old.capacity());
        for entry in old {
            kept_before.push(trail.len());
            if entry != TrailEntry::Deleted {
                trail.push(entry);
            }
        }
        kept_before.push(trail.len());
        let last = kept_before.len() - 1;
        stacks.trail = trail;

        for ch in stacks.choice_chain(self.engine.choice) {
            let mark = stacks.choice(ch).trail_mark.min(last);
            stacks.set_mark(ch + CHOICE_TRAIL_MARK, kept_before[mark]);
        }
        for ff in stacks.foreign_chain(self.engine.foreign) {
            let mark = stacks.foreign(ff).trail_mark.min(last);
            stacks.set_mark(ff + FOREIGN_TRAIL_MARK, kept_before[mark]);
        }
    }
}
