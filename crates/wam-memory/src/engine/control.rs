// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Environment frames, choice points and foreign frames.

use super::Engine;
use crate::error::StackError;
use crate::stacks::frames::{CHOICE_SIZE, ChoiceView, FOREIGN_SIZE, FRAME_HEADER, ForeignView};
use crate::stacks::{ChoiceRef, ForeignFrameRef, FrameRef, TermRef};

impl Engine {
    /// Allocate `n` local cells; the caller has reserved them.
    fn alloc_local_reserved(&mut self, n: usize) -> Result<usize, StackError> {
        self.stacks.alloc_local(n).ok_or(StackError::Overflow {
            stack: crate::stacks::StackKind::Local,
            requested: n,
            limit: self.stacks.local.limit,
        })
    }

    /// Set the local top below the newest live record.
    pub(crate) fn recompute_local_top(&mut self) {
        let mut top = self.stacks.block_len();
        if let Some(fr) = self.frame {
            top = top.min(fr);
        }
        if let Some(ch) = self.choice {
            top = top.min(ch);
        }
        if let Some(ff) = self.foreign {
            top = top.min(self.stacks.foreign(ff).bottom());
        }
        self.stacks.l_top = top;
    }

    // --- Environment frames ---

    /// Push an environment frame with `nslots` unbound slots and make it
    /// current.
    pub fn push_frame(&mut self, clause: u64, pc: u64, nslots: usize) -> Result<FrameRef, StackError> {
        self.reserve(0, FRAME_HEADER + nslots, 0)?;
        let fr = self.alloc_local_reserved(FRAME_HEADER + nslots)?;
        self.stacks.write_frame(fr, self.frame, clause, pc, nslots);
        self.frame = Some(fr);
        Ok(FrameRef(self.stacks.offset_of(fr)))
    }

    /// Leave the current frame, returning to its parent.
    ///
    /// The frame's cells are released unless a choice point still needs them.
    pub fn pop_frame(&mut self) {
        if let Some(fr) = self.frame {
            self.frame = self.stacks.frame(fr).parent;
            self.recompute_local_top();
        }
    }

    /// The current frame.
    #[must_use]
    pub fn current_frame(&self) -> Option<FrameRef> {
        self.frame.map(|fr| FrameRef(self.stacks.offset_of(fr)))
    }

    /// Term reference to slot `i` of `frame`.
    #[must_use]
    pub fn frame_slot(&self, frame: FrameRef, i: usize) -> TermRef {
        let fr = self.stacks.address_of(frame.0);
        TermRef(self.stacks.offset_of(self.stacks.frame(fr).slot(i)))
    }

    /// Update the program counter of `frame`.
    pub fn set_pc(&mut self, frame: FrameRef, pc: u64) {
        let fr = self.stacks.address_of(frame.0);
        self.stacks.set_frame_pc(fr, pc);
    }

    // --- Choice points ---

    /// Push a choice point capturing the current trail and global tops.
    pub fn push_choice(&mut self) -> Result<ChoiceRef, StackError> {
        self.reserve(0, CHOICE_SIZE, 0)?;
        let ch = self.alloc_local_reserved(CHOICE_SIZE)?;
        let view = ChoiceView {
            addr: ch,
            parent: self.choice,
            frame: self.frame,
            trail_mark: self.stacks.trail.len(),
            global_mark: self.stacks.g_top,
        };
        self.stacks.write_choice(ch, &view);
        self.choice = Some(ch);
        Ok(ChoiceRef(self.stacks.offset_of(ch)))
    }

    /// The newest choice point.
    #[must_use]
    pub fn current_choice(&self) -> Option<ChoiceRef> {
        self.choice.map(|ch| ChoiceRef(self.stacks.offset_of(ch)))
    }

    /// Backtrack to the newest choice point: undo the trail down to its mark,
    /// discard global cells created after it and resume its frame. The
    /// choice point stays in place. Returns false if there is none.
    pub fn backtrack(&mut self) -> bool {
        let Some(ch) = self.choice else {
            return false;
        };
        let view = self.stacks.choice(ch);
        self.undo_trail(view.trail_mark);
        self.stacks.g_top = view.global_mark.max(self.frozen_bar);
        self.frame = view.frame;
        while let Some(ff) = self.foreign {
            if ff >= ch {
                break;
            }
            self.foreign = self.stacks.foreign(ff).parent;
        }
        self.recompute_local_top();
        true
    }

    /// Remove the newest choice point without backtracking.
    pub fn cut(&mut self) {
        if let Some(ch) = self.choice {
            self.choice = self.stacks.choice(ch).parent;
            self.recompute_local_top();
        }
    }

    // --- Foreign frames ---

    /// Open a foreign frame for term references.
    pub fn open_foreign_frame(&mut self) -> Result<ForeignFrameRef, StackError> {
        self.reserve(0, FOREIGN_SIZE, 0)?;
        let ff = self.alloc_local_reserved(FOREIGN_SIZE)?;
        let view = ForeignView {
            addr: ff,
            parent: self.foreign,
            trail_mark: self.stacks.trail.len(),
            global_mark: self.stacks.g_top,
            nrefs: 0,
        };
        self.stacks.write_foreign(ff, &view);
        self.foreign = Some(ff);
        Ok(ForeignFrameRef(self.stacks.offset_of(ff)))
    }

    /// Allocate a new unbound term reference in the newest foreign frame.
    ///
    /// # Errors
    ///
    /// [`StackError::NoForeignFrame`] without an open frame and
    /// [`StackError::ForeignFrameNotTop`] if a frame or choice point was
    /// pushed after it.
    pub fn new_term_ref(&mut self) -> Result<TermRef, StackError> {
        let Some(ff) = self.foreign else {
            return Err(StackError::NoForeignFrame);
        };
        if self.stacks.foreign(ff).bottom() != self.stacks.l_top {
            return Err(StackError::ForeignFrameNotTop);
        }
        self.reserve(0, 1, 0)?;
        // Growth may have moved the frame.
        let Some(ff) = self.foreign else {
            return Err(StackError::NoForeignFrame);
        };
        let cell = self.alloc_local_reserved(1)?;
        let nrefs = self.stacks.foreign(ff).nrefs + 1;
        self.stacks.set_foreign_nrefs(ff, nrefs);
        Ok(TermRef(self.stacks.offset_of(cell)))
    }

    /// Allocate `n` consecutive term references.
    pub fn new_term_refs(&mut self, n: usize) -> Result<Vec<TermRef>, StackError> {
        (0..n).map(|_| self.new_term_ref()).collect()
    }

    /// Close `frame` and every foreign frame opened after it, keeping their
    /// bindings.
    pub fn close_foreign_frame(&mut self, frame: ForeignFrameRef) {
        let target = self.stacks.address_of(frame.0);
        while let Some(ff) = self.foreign {
            if ff > target {
                break;
            }
            self.foreign = self.stacks.foreign(ff).parent;
        }
        self.recompute_local_top();
    }

    /// Undo all bindings made since `frame` was opened and discard the global
    /// cells created since. The frame stays open.
    pub fn rewind_foreign_frame(&mut self, frame: ForeignFrameRef) {
        let ff = self.stacks.address_of(frame.0);
        let view = self.stacks.foreign(ff);
        self.undo_trail(view.trail_mark);
        self.stacks.g_top = view.global_mark.max(self.frozen_bar);
    }
}
