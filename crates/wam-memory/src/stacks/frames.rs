// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Local stack records and the handles callers hold to them.
//!
//! Record layouts (cell offsets from the record address):
//!
//! ```text
//! Environment frame:  [parent, clause, pc, nslots, slot0, slot1, ...]
//! Choice point:       [parent, frame, trail_mark, global_mark]
//! Foreign frame:      [parent, trail_mark, global_mark, nrefs]
//!                     term refs occupy [ff - nrefs, ff)
//! ```
//!
//! Links are `Reference|Local` words and the unbound word means "none".
//! Counts and marks are inline integers. Every local pointer is therefore a
//! self-describing word and growth relocates them with one linear scan.

use super::StackSet;
use crate::term::Word;

/// Parent frame link.
pub const FRAME_PARENT: usize = 0;
/// Opaque clause identifier, passed to [`crate::gc::VmHooks`].
pub const FRAME_CLAUSE: usize = 1;
/// Program counter within the clause.
pub const FRAME_PC: usize = 2;
/// Number of variable slots.
pub const FRAME_NSLOTS: usize = 3;
/// Cells before the first slot.
pub const FRAME_HEADER: usize = 4;

/// Previous choice point link.
pub const CHOICE_PARENT: usize = 0;
/// Frame to resume on backtracking.
pub const CHOICE_FRAME: usize = 1;
/// Trail top when the choice point was created.
pub const CHOICE_TRAIL_MARK: usize = 2;
/// Global top when the choice point was created.
pub const CHOICE_GLOBAL_MARK: usize = 3;
/// Cells of a choice point.
pub const CHOICE_SIZE: usize = 4;

/// Enclosing foreign frame link.
pub const FOREIGN_PARENT: usize = 0;
/// Trail top when the frame was opened.
pub const FOREIGN_TRAIL_MARK: usize = 1;
/// Global top when the frame was opened.
pub const FOREIGN_GLOBAL_MARK: usize = 2;
/// Number of term references below the frame.
pub const FOREIGN_NREFS: usize = 3;
/// Cells of a foreign frame header.
pub const FOREIGN_SIZE: usize = 4;

/// Handle to a local cell holding a term.
///
/// Stores the distance from the end of the block, so it stays valid when
/// the stacks are resized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TermRef(pub(crate) usize);

/// Handle to an environment frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameRef(pub(crate) usize);

/// Handle to a choice point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChoiceRef(pub(crate) usize);

/// Handle to a foreign frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ForeignFrameRef(pub(crate) usize);

/// Decoded environment frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameView {
    pub addr: usize,
    pub parent: Option<usize>,
    pub clause: u64,
    pub pc: u64,
    pub nslots: usize,
}

impl FrameView {
    /// Address of slot `i`.
    #[must_use]
    pub const fn slot(&self, i: usize) -> usize {
        self.addr + FRAME_HEADER + i
    }
}

/// Decoded choice point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChoiceView {
    pub addr: usize,
    pub parent: Option<usize>,
    pub frame: Option<usize>,
    pub trail_mark: usize,
    pub global_mark: usize,
}

/// Decoded foreign frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForeignView {
    pub addr: usize,
    pub parent: Option<usize>,
    pub trail_mark: usize,
    pub global_mark: usize,
    pub nrefs: usize,
}

impl ForeignView {
    /// Lowest address of the frame including its term references.
    #[must_use]
    pub const fn bottom(&self) -> usize {
        self.addr - self.nrefs
    }
}

#[inline]
pub(crate) const fn link_word(link: Option<usize>) -> Word {
    match link {
        Some(addr) => Word::local_ref(addr),
        None => Word::VAR,
    }
}

#[inline]
pub(crate) const fn count_word(value: usize) -> Word {
    Word::small_int(value as i64)
}

#[inline]
const fn count_value(word: Word) -> usize {
    word.small_int_value() as usize
}

impl StackSet {
    fn link(&self, addr: usize) -> Option<usize> {
        self.memory[addr].local_target()
    }

    /// Decode the frame at `addr`.
    #[must_use]
    pub fn frame(&self, addr: usize) -> FrameView {
        FrameView {
            addr,
            parent: self.link(addr + FRAME_PARENT),
            clause: self.memory[addr + FRAME_CLAUSE].small_int_value() as u64,
            pc: self.memory[addr + FRAME_PC].small_int_value() as u64,
            nslots: count_value(self.memory[addr + FRAME_NSLOTS]),
        }
    }

    /// Decode the choice point at `addr`.
    #[must_use]
    pub fn choice(&self, addr: usize) -> ChoiceView {
        ChoiceView {
            addr,
            parent: self.link(addr + CHOICE_PARENT),
            frame: self.link(addr + CHOICE_FRAME),
            trail_mark: count_value(self.memory[addr + CHOICE_TRAIL_MARK]),
            global_mark: count_value(self.memory[addr + CHOICE_GLOBAL_MARK]),
        }
    }

    /// Decode the foreign frame at `addr`.
    #[must_use]
    pub fn foreign(&self, addr: usize) -> ForeignView {
        ForeignView {
            addr,
            parent: self.link(addr + FOREIGN_PARENT),
            trail_mark: count_value(self.memory[addr + FOREIGN_TRAIL_MARK]),
            global_mark: count_value(self.memory[addr + FOREIGN_GLOBAL_MARK]),
            nrefs: count_value(self.memory[addr + FOREIGN_NREFS]),
        }
    }

    /// Write a frame header into cells allocated at `addr`.
    pub(crate) fn write_frame(&mut self, addr: usize, parent: Option<usize>, clause: u64, pc: u64, nslots: usize) {
        self.memory[addr + FRAME_PARENT] = link_word(parent);
        self.memory[addr + FRAME_CLAUSE] = Word::small_int(clause as i64);
        self.memory[addr + FRAME_PC] = Word::small_int(pc as i64);
        self.memory[addr + FRAME_NSLOTS] = count_word(nslots);
    }

    pub(crate) fn set_frame_pc(&mut self, addr: usize, pc: u64) {
        self.memory[addr + FRAME_PC] = Word::small_int(pc as i64);
    }

    /// Write a choice point into cells allocated at `addr`.
    pub(crate) fn write_choice(&mut self, addr: usize, view: &ChoiceView) {
        self.memory[addr + CHOICE_PARENT] = link_word(view.parent);
        self.memory[addr + CHOICE_FRAME] = link_word(view.frame);
        self.memory[addr + CHOICE_TRAIL_MARK] = count_word(view.trail_mark);
        self.memory[addr + CHOICE_GLOBAL_MARK] = count_word(view.global_mark);
    }

    /// Write a foreign frame header into cells allocated at `addr`.
    pub(crate) fn write_foreign(&mut self, addr: usize, view: &ForeignView) {
        self.memory[addr + FOREIGN_PARENT] = link_word(view.parent);
        self.memory[addr + FOREIGN_TRAIL_MARK] = count_word(view.trail_mark);
        self.memory[addr + FOREIGN_GLOBAL_MARK] = count_word(view.global_mark);
        self.memory[addr + FOREIGN_NREFS] = count_word(view.nrefs);
    }

    pub(crate) fn set_foreign_nrefs(&mut self, addr: usize, nrefs: usize) {
        self.memory[addr + FOREIGN_NREFS] = count_word(nrefs);
    }

    /// Overwrite a mark stored in a local record (trail or global mark).
    pub(crate) fn set_mark(&mut self, cell: usize, value: usize) {
        self.memory[cell] = count_word(value);
    }

    /// Addresses of the choice point chain starting at `choice`, newest first.
    #[must_use]
    pub fn choice_chain(&self, choice: Option<usize>) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = choice;
        while let Some(addr) = current {
            chain.push(addr);
            current = self.link(addr + CHOICE_PARENT);
        }
        chain
    }

    /// Addresses of the foreign frame chain starting at `foreign`, newest first.
    #[must_use]
    pub fn foreign_chain(&self, foreign: Option<usize>) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = foreign;
        while let Some(addr) = current {
            chain.push(addr);
            current = self.link(addr + FOREIGN_PARENT);
        }
        chain
    }
}
