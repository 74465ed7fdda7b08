// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Binding, destructive assignment and trail undo.
//!
//! A binding is trailed only if backtracking could still observe the old
//! value: the cell is a global cell older than the newest boundary's global
//! mark (or below the frozen bar), or a local cell older than the newest
//! boundary record. Destructive assignment saves the old value in a fresh
//! global cell and trails a `Bind` followed by a `Value` entry.

use super::Engine;
use crate::error::StackError;
use crate::stacks::{StackKind, TermRef, TrailEntry};
use crate::term::Word;

impl Engine {
    /// Allocate `n` global cells; the caller has reserved them.
    pub(crate) fn alloc_global_reserved(&mut self, n: usize) -> Result<usize, StackError> {
        self.stacks.alloc_global(n).ok_or(StackError::Overflow {
            stack: StackKind::Global,
            requested: n,
            limit: self.stacks.global.limit,
        })
    }

    fn push_trail_reserved(&mut self, entry: TrailEntry) -> Result<(), StackError> {
        self.stacks.push_trail(entry).map(|_| ()).ok_or(StackError::Overflow {
            stack: StackKind::Trail,
            requested: 1,
            limit: self.stacks.trail_info.limit,
        })
    }

    /// True if a change to `cell` must be trailed.
    pub(crate) fn needs_trail(&self, cell: usize) -> bool {
        let newest = match (self.choice, self.foreign) {
            (Some(ch), Some(ff)) => Some(ch.min(ff)),
            (ch, ff) => ch.or(ff),
        };
        let Some(record) = newest else {
            return false;
        };
        if self.stacks.is_global(cell) {
            let mark = if Some(record) == self.choice {
                self.stacks.choice(record).global_mark
            } else {
                self.stacks.foreign(record).global_mark
            };
            cell < mark.max(self.frozen_bar)
        } else {
            cell > record
        }
    }

    /// Bind the unbound cell `cell` to `value`, trailing if needed.
    /// Binding an attributed variable is a trailed assignment.
    pub(crate) fn bind_cell(&mut self, cell: usize, value: Word) -> Result<(), StackError> {
        if self.stacks.memory[cell].is_attvar() {
            return self.assign_cell(cell, value);
        }
        if self.needs_trail(cell) {
            self.push_trail_reserved(TrailEntry::Bind(cell))?;
        }
        self.stacks.memory[cell] = value;
        Ok(())
    }

    /// Overwrite `cell` with `value` so that backtracking restores the old
    /// contents. Needs one global cell and two trail entries reserved.
    pub(crate) fn assign_cell(&mut self, cell: usize, value: Word) -> Result<(), StackError> {
        if self.needs_trail(cell) {
            let saved = self.alloc_global_reserved(1)?;
            self.stacks.memory[saved] = self.stacks.memory[cell];
            self.push_trail_reserved(TrailEntry::Bind(cell))?;
            self.push_trail_reserved(TrailEntry::Value(saved))?;
        }
        self.stacks.memory[cell] = value;
        Ok(())
    }

    /// Word to store when linking to the term in `cell`.
    ///
    /// Unbound local variables are moved to the global stack first, since
    /// global cells never point into the local stack. Needs one global cell
    /// and one trail entry reserved.
    pub(crate) fn linkable_word(&mut self, cell: usize) -> Result<Word, StackError> {
        let (cell, word) = self.stacks.deref(cell);
        if word.is_var() {
            if self.stacks.is_global(cell) {
                return Ok(Word::global_ref(cell));
            }
            let var = self.alloc_global_reserved(1)?;
            self.stacks.memory[var] = Word::VAR;
            let link = Word::global_ref(var);
            self.bind_cell(cell, link)?;
            return Ok(link);
        }
        if word.is_attvar() {
            return Ok(Word::global_ref(cell));
        }
        Ok(word)
    }

    /// Bind the variable in `var` to the term in `value`.
    ///
    /// Binding a variable to itself does nothing.
    ///
    /// # Errors
    ///
    /// [`StackError::NotAVariable`] if `var` is bound.
    pub fn bind(&mut self, var: TermRef, value: TermRef) -> Result<(), StackError> {
        self.reserve(2, 0, 3)?;
        let (_, target) = self.stacks.deref(self.cell_of(var));
        if !target.can_bind() {
            return Err(StackError::NotAVariable);
        }
        let value = self.linkable_word(self.cell_of(value))?;
        // Linking may have globalised `var` itself; look again.
        let (cell, _) = self.stacks.deref(self.cell_of(var));
        if value.global_target() == Some(cell) {
            return Ok(());
        }
        self.bind_cell(cell, value)
    }

    /// Destructively replace argument `index` (1-based) of the compound in
    /// `term` with the term in `value`; undone on backtracking.
    ///
    /// Returns false if `term` is not a compound with that argument.
    pub fn setarg(&mut self, index: usize, term: TermRef, value: TermRef) -> Result<bool, StackError> {
        self.reserve(2, 0, 3)?;
        let (_, word) = self.stacks.deref(self.cell_of(term));
        if !word.is_compound() {
            return Ok(false);
        }
        let functor = word.address();
        let arity = self.stacks.memory[functor].functor_arity();
        if index == 0 || index > arity {
            return Ok(false);
        }
        let value = self.linkable_word(self.cell_of(value))?;
        self.assign_cell(functor + index, value)?;
        Ok(true)
    }

    /// Undo trail entries down to `mark`.
    pub(crate) fn undo_trail(&mut self, mark: usize) {
        while self.stacks.trail.len() > mark {
            match self.stacks.trail.pop() {
                Some(TrailEntry::Value(saved)) => {
                    if let Some(TrailEntry::Bind(cell)) = self.stacks.trail.pop() {
                        self.stacks.memory[cell] = self.stacks.memory[saved];
                    }
                }
                Some(TrailEntry::Bind(cell)) => self.stacks.memory[cell] = Word::VAR,
                Some(TrailEntry::Deleted) | None => {}
            }
        }
    }
}
