// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Sweep of the roots outside the global stack.
//!
//! Every slot outside the global stack that points into it is linked into
//! the relocation chain of its target: marked local cells, argument
//! registers, trail entries and the global marks of choice points, foreign
//! frames and the frozen bar. Local marks are cleared on the way.

use super::{Collector, MarkHolder, Slot};
use crate::stacks::TrailEntry;
use crate::stacks::frames::{CHOICE_GLOBAL_MARK, FOREIGN_GLOBAL_MARK};

impl Collector<'_> {
    pub(super) fn sweep_roots(&mut self) {
        self.sweep_local_cells();
        self.sweep_registers();
        self.sweep_trail();
        self.sweep_global_marks();
    }

    fn sweep_local_cells(&mut self) {
        for cell in core::mem::take(&mut self.marked_locals) {
            self.bits.clear_marked(cell);
            if let Some(target) = self.engine.stacks.memory[cell].global_target() {
                self.counters.needs_relocation += 1;
                self.into_relocation_chain(target, Slot::Cell(cell));
            }
        }
    }

    fn sweep_registers(&mut self) {
        for i in 0..self.engine.registers.len() {
            if let Some(target) = self.engine.registers[i].global_target() {
                self.counters.needs_relocation += 1;
                self.into_relocation_chain(target, Slot::Register(i));
            }
        }
    }

    fn sweep_trail(&mut self) {
        for i in 0..self.engine.stacks.trail.len() {
            let target = match self.engine.stacks.trail[i] {
                TrailEntry::Bind(addr) if self.engine.stacks.is_global(addr) => addr,
                TrailEntry::Value(addr) => addr,
                _ => continue,
            };
            self.counters.needs_relocation += 1;
            self.into_relocation_chain(target, Slot::Trail(i));
        }
    }

    fn sweep_global_marks(&mut self) {
        let stacks = &self.engine.stacks;
        let mut marks = Vec::new();
        for ch in stacks.choice_chain(self.engine.choice) {
            marks.push((stacks.choice(ch).global_mark, MarkHolder::Cell(ch + CHOICE_GLOBAL_MARK)));
        }
        for ff in stacks.foreign_chain(self.engine.foreign) {
            marks.push((stacks.foreign(ff).global_mark, MarkHolder::Cell(ff + FOREIGN_GLOBAL_MARK)));
        }
        marks.push((self.engine.frozen_bar, MarkHolder::FrozenBar));
        for (mark, holder) in marks {
            self.sweep_global_mark(mark, holder);
        }
    }

    /// Relink a global mark to the nearest live cell below it.
    ///
    /// After compaction the mark becomes the end of that cell's new location,
    /// or 0 if nothing below the mark survived.
    fn sweep_global_mark(&mut self, mark: usize, holder: MarkHolder) {
        let mut p = mark.min(self.engine.stacks.g_top);
        while p > 0 {
            let last = self.engine.stacks.memory[p - 1];
            let size = if last.is_indirect_header() { last.cell_size() } else { 1 };
            let start = p - size;
            if self.bits.is_marked(start) {
                self.counters.needs_relocation += 1;
                self.into_relocation_chain(start, Slot::GlobalMark { holder, extent: size });
                return;
            }
            p = start;
        }
        self.write_mark(holder, 0);
    }

    pub(super) fn write_mark(&mut self, holder: MarkHolder, value: usize) {
        match holder {
            MarkHolder::Cell(cell) => self.engine.stacks.set_mark(cell, value),
            MarkHolder::FrozenBar => self.engine.frozen_bar = value,
        }
    }
}
