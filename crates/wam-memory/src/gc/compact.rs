// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Two-pass sliding compaction of the global stack.
//!
//! The downward pass walks from `g_top` to 0, computing where each marked
//! cell will land and linking cells that point *down* into the chains of
//! their targets. The upward pass walks from 0 to `g_top`: when a target is
//! reached its final address is known, so its chain is resolved before the
//! cell moves. Cells pointing *up* are linked during this pass, with their
//! new address, and resolved when the target is reached later.
//!
//! Indirect blocks move as a unit; the doubled header lets the downward pass
//! step over them.

use super::check::fatal;
use super::{Collector, Slot};
use crate::stacks::TrailEntry;

impl Collector<'_> {
    /// Queue `slot` to receive the new address of `target`.
    pub(super) fn into_relocation_chain(&mut self, target: usize, slot: Slot) {
        self.chains.entry(target).or_default().push(slot);
        self.bits.set_first(target);
        self.counters.relocation_cells += 1;
    }

    /// Give every slot waiting on `target` its new address.
    fn update_relocation_chain(&mut self, target: usize, new_addr: usize) {
        self.bits.clear_first(target);
        let Some(slots) = self.chains.remove(&target) else {
            return;
        };
        for slot in slots {
            self.update_slot(slot, new_addr);
        }
    }

    fn update_slot(&mut self, slot: Slot, new_addr: usize) {
        match slot {
            Slot::Cell(cell) => {
                let word = self.engine.stacks.memory[cell];
                self.engine.stacks.memory[cell] = word.with_address(new_addr);
            }
            Slot::Register(i) => {
                self.engine.registers[i] = self.engine.registers[i].with_address(new_addr);
            }
            Slot::Trail(i) => {
                self.engine.stacks.trail[i] = match self.engine.stacks.trail[i] {
                    TrailEntry::Bind(_) => TrailEntry::Bind(new_addr),
                    TrailEntry::Value(_) => TrailEntry::Value(new_addr),
                    TrailEntry::Deleted => TrailEntry::Deleted,
                };
            }
            Slot::GlobalMark { holder, extent } => self.write_mark(holder, new_addr + extent),
        }
        self.counters.relocated_cells += 1;
    }

    pub(super) fn compact_global(&mut self) {
        self.sweep_down();
        self.sweep_up();
    }

    fn sweep_down(&mut self) {
        let mut dest = self.counters.total_marked;
        let mut p = self.engine.stacks.g_top;
        while p > 0 {
            let last = self.engine.stacks.memory[p - 1];
            let size = if last.is_indirect_header() { last.cell_size() } else { 1 };
            let start = p - size;
            if self.bits.is_marked(start) {
                if size > dest {
                    fatal("compact down", start, Some(last), "more marked cells than counted");
                }
                dest -= size;
                if size == 1 {
                    if let Some(target) = last.global_target() {
                        if !self.bits.is_marked(target) {
                            fatal("compact down", start, Some(last), "pointer to unmarked cell");
                        }
                        if target < start {
                            self.into_relocation_chain(target, Slot::Cell(start));
                        }
                    }
                }
            }
            p = start;
        }
        if dest != 0 {
            fatal("compact down", 0, None, "fewer marked cells than counted");
        }
    }

    fn sweep_up(&mut self) {
        let top = self.engine.stacks.g_top;
        let mut dest = 0;
        let mut p = 0;
        while p < top {
            let word = self.engine.stacks.memory[p];
            let size = word.cell_size();
            if self.bits.is_marked(p) {
                if self.bits.is_first(p) {
                    self.update_relocation_chain(p, dest);
                }
                if size == 1 {
                    if let Some(target) = word.global_target() {
                        if target > p {
                            self.into_relocation_chain(target, Slot::Cell(dest));
                        }
                    }
                }
                self.engine.stacks.memory.copy_within(p..p + size, dest);
                self.bits.clear_range(p, size);
                dest += size;
            }
            p += size;
        }
        self.engine.stacks.g_top = dest;
    }
}
