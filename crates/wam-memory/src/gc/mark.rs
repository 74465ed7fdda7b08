// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mark phase.
//!
//! Marking uses an explicit work list of cell addresses, so term depth never
//! reaches the native stack and cyclic terms terminate on already marked
//! cells. Global cells count towards `total_marked`; marked local cells are
//! remembered so the sweep can link and unmark them.
//!
//! Choice points and foreign frames split the trail into segments. They are
//! visited newest first: the trail segment above each boundary is early
//! reset before the frames that boundary would resume are marked, because
//! once execution backtracks past it, bindings made after it are undone
//! anyway.

use super::Collector;
use super::trail::SegmentLimits;
use crate::term::{Storage, Tag, Word};

/// A point execution can return to: a choice point or a foreign frame.
#[derive(Clone, Copy, Debug)]
struct Boundary {
    addr: usize,
    /// Lowest local cell owned by the record itself.
    floor: usize,
    trail_mark: usize,
    global_mark: usize,
    frame: Option<usize>,
}

impl Collector<'_> {
    pub(super) fn mark_phase(&mut self) {
        if self.engine.residue_vars {
            self.mark_attvars();
        }
        self.mark_registers();
        self.mark_term_refs();
        let frame = self.engine.frame;
        self.mark_environments(frame);

        // Cells below the frozen bar survive backtracking to any boundary.
        let frozen = self.engine.frozen_bar;
        let mut top = self.engine.stacks.trail.len();
        for boundary in self.boundaries() {
            if boundary.trail_mark <= top {
                let limits = SegmentLimits {
                    global_mark: boundary.global_mark.max(frozen),
                    local_floor: boundary.floor,
                };
                self.early_reset_vars(boundary.trail_mark, top, Some(limits));
                top = boundary.trail_mark;
            }
            self.mark_environments(boundary.frame);
        }
        self.early_reset_vars(0, top, None);
    }

    /// Choice points and foreign frames, newest first.
    fn boundaries(&self) -> Vec<Boundary> {
        let stacks = &self.engine.stacks;
        let choices = stacks.choice_chain(self.engine.choice).into_iter().map(|ch| {
            let view = stacks.choice(ch);
            Boundary {
                addr: ch,
                floor: ch,
                trail_mark: view.trail_mark,
                global_mark: view.global_mark,
                frame: view.frame,
            }
        });
        let foreign = stacks.foreign_chain(self.engine.foreign).into_iter().map(|ff| {
            let view = stacks.foreign(ff);
            Boundary {
                addr: ff,
                floor: view.bottom(),
                trail_mark: view.trail_mark,
                global_mark: view.global_mark,
                frame: None,
            }
        });
        let mut all: Vec<Boundary> = choices.chain(foreign).collect();
        // Newer records sit at lower local addresses.
        all.sort_unstable_by_key(|b| b.addr);
        all
    }

    /// Mark everything reachable from the cell at `addr`.
    pub(super) fn mark_variable(&mut self, addr: usize) {
        self.work.push(addr);
        self.drain();
    }

    /// Mark everything reachable from a word held outside the block.
    fn mark_word_root(&mut self, word: Word) {
        self.push_targets(word);
        self.drain();
    }

    fn drain(&mut self) {
        while let Some(cell) = self.work.pop() {
            if self.bits.is_marked(cell) {
                continue;
            }
            self.bits.set_marked(cell);
            let word = self.engine.stacks.memory[cell];
            if self.engine.stacks.is_global(cell) {
                self.counters.total_marked += 1;
                if word.global_target().is_some() {
                    self.counters.needs_relocation += 1;
                }
            } else {
                self.marked_locals.push(cell);
            }
            self.push_targets(word);
        }
    }

    fn push_targets(&mut self, word: Word) {
        match (word.tag(), word.storage()) {
            (Tag::Reference, Storage::Global | Storage::Local) | (Tag::AttVar, Storage::Global) => {
                self.work.push(word.address());
            }
            (Tag::Compound, Storage::Global) => self.mark_compound(word.address()),
            (Tag::Integer | Tag::Float | Tag::String, Storage::Global) => {
                self.mark_indirect(word.address());
            }
            _ => {}
        }
    }

    fn mark_compound(&mut self, functor: usize) {
        if self.bits.is_marked(functor) {
            return;
        }
        self.bits.set_marked(functor);
        self.counters.total_marked += 1;
        let arity = self.engine.stacks.memory[functor].functor_arity();
        for arg in (functor + 1..=functor + arity).rev() {
            self.work.push(arg);
        }
    }

    fn mark_indirect(&mut self, header: usize) {
        if self.bits.is_marked(header) {
            return;
        }
        let size = self.engine.stacks.memory[header].cell_size();
        self.bits.mark_range(header, size);
        self.counters.total_marked += size;
    }

    /// Mark every attributed variable on the global stack.
    pub(super) fn mark_attvars(&mut self) {
        let stacks = &self.engine.stacks;
        let mut attvars = Vec::new();
        let mut p = 0;
        while p < stacks.g_top {
            let word = stacks.memory[p];
            if word.is_attvar() {
                attvars.push(p);
            }
            p += word.cell_size();
        }
        for cell in attvars {
            self.mark_variable(cell);
        }
    }

    fn mark_registers(&mut self) {
        for i in 0..self.engine.registers.len() {
            let word = self.engine.registers[i];
            self.mark_word_root(word);
        }
    }

    /// Mark the term references of every open foreign frame.
    pub(super) fn mark_term_refs(&mut self) {
        let stacks = &self.engine.stacks;
        let mut cells = Vec::new();
        for ff in stacks.foreign_chain(self.engine.foreign) {
            let view = stacks.foreign(ff);
            cells.extend(view.bottom()..ff);
        }
        for cell in cells {
            self.mark_variable(cell);
        }
    }

    /// Mark the slots of `frame` and all its parents not visited before.
    pub(super) fn mark_environments(&mut self, frame: Option<usize>) {
        let mut current = frame;
        while let Some(fr) = current {
            if !self.visited_frames.insert(fr) {
                break;
            }
            let view = self.engine.stacks.frame(fr);
            for slot in 0..view.nslots {
                self.mark_variable(view.slot(slot));
            }
            current = view.parent;
        }
    }
}
