// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The engine context: one Prolog thread's stacks and registers.
//!
//! Every operation on terms, frames and the collector goes through an
//! [`Engine`]. The engine owns its stacks exclusively; only the atom table
//! and GC coordination are shared with other engines through
//! [`SharedState`].
//!
//! Operations that allocate first reserve all the space they need (which
//! may collect or grow the stacks) and only then compute raw addresses.
//! Raw addresses are therefore never held across a collection or a move.

mod binding;
mod control;
mod signals;
mod terms;

#[cfg(test)]
mod control_test;

pub use signals::Signals;
pub use terms::Term;

use crate::config::EngineConfig;
use crate::error::StackError;
use crate::gc::{AllSlotsLive, GcStats, VmHooks};
use crate::shared::{Atom, SharedState};
use crate::stacks::{StackKind, StackSet, TermRef, next_stack_size};
use crate::term::Word;
use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Number of argument registers.
pub const REGISTER_COUNT: usize = 256;

/// A Prolog engine's memory context.
pub struct Engine {
    pub(crate) shared: Arc<SharedState>,
    pub(crate) config: EngineConfig,
    pub(crate) stacks: StackSet,
    pub(crate) hooks: Box<dyn VmHooks>,

    /// Argument registers; roots for the collector.
    pub(crate) registers: Vec<Word>,
    /// Current environment frame.
    pub(crate) frame: Option<usize>,
    /// Newest choice point.
    pub(crate) choice: Option<usize>,
    /// Newest foreign frame.
    pub(crate) foreign: Option<usize>,
    /// Backtracking never lowers the global top below this.
    pub(crate) frozen_bar: usize,
    /// Non-backtrackable global variables.
    pub(crate) global_vars: HashMap<Atom, Word>,
    /// Keep every attributed variable alive.
    pub(crate) residue_vars: bool,

    pub(crate) signals: Signals,
    pub(crate) signals_blocked: usize,
    pub(crate) gc_blocked: usize,
    pub(crate) stats: GcStats,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("global_top", &self.stacks.global_top())
            .field("local_top", &self.stacks.local_top())
            .field("trail_top", &self.stacks.trail_top())
            .field("frame", &self.frame)
            .field("choice", &self.choice)
            .field("foreign", &self.foreign)
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine with empty stacks.
    pub fn new(shared: Arc<SharedState>, config: EngineConfig) -> Result<Self, StackError> {
        let stacks = StackSet::new(&config)?;
        Ok(Self {
            shared,
            config,
            stacks,
            hooks: Box::new(AllSlotsLive),
            registers: vec![Word::VAR; REGISTER_COUNT],
            frame: None,
            choice: None,
            foreign: None,
            frozen_bar: 0,
            global_vars: HashMap::new(),
            residue_vars: false,
            signals: Signals::empty(),
            signals_blocked: 0,
            gc_blocked: 0,
            stats: GcStats::default(),
        })
    }

    /// The shared process state.
    #[must_use]
    pub const fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// The configuration this engine was created with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the stacks.
    #[must_use]
    pub const fn stacks(&self) -> &StackSet {
        &self.stacks
    }

    /// Cells in use on a stack.
    #[must_use]
    pub fn used(&self, kind: StackKind) -> usize {
        self.stacks.used(kind)
    }

    /// Intern an atom in the shared table.
    pub fn intern(&self, name: &str) -> Atom {
        self.shared.intern(name)
    }

    #[inline]
    pub(crate) fn cell_of(&self, term: TermRef) -> usize {
        self.stacks.address_of(term.0)
    }

    // --- Registers ---

    /// Word held by argument register `i`.
    #[must_use]
    pub fn register(&self, i: usize) -> Word {
        self.registers[i]
    }

    /// Load the term in `term` into argument register `i`.
    pub fn set_register(&mut self, i: usize, term: TermRef) -> Result<(), StackError> {
        self.reserve(1, 0, 1)?;
        let word = self.linkable_word(self.cell_of(term))?;
        self.registers[i] = word;
        Ok(())
    }

    /// Store argument register `i` into `term`.
    pub fn get_register(&mut self, i: usize, term: TermRef) {
        let cell = self.cell_of(term);
        self.stacks.memory[cell] = self.registers[i];
    }

    /// Reset all argument registers to unbound.
    pub fn clear_registers(&mut self) {
        self.registers.fill(Word::VAR);
    }

    // --- Global variables and the frozen bar ---

    /// Set a non-backtrackable global variable.
    ///
    /// Freezes the global stack so backtracking cannot discard the value.
    pub fn nb_setval(&mut self, name: Atom, value: TermRef) -> Result<(), StackError> {
        self.reserve(1, 0, 1)?;
        let word = self.linkable_word(self.cell_of(value))?;
        self.global_vars.insert(name, word);
        self.freeze_global();
        Ok(())
    }

    /// Read a global variable into `term`. Returns false if it is not set.
    pub fn nb_getval(&mut self, name: Atom, term: TermRef) -> bool {
        let Some(&word) = self.global_vars.get(&name) else {
            return false;
        };
        let cell = self.cell_of(term);
        self.stacks.memory[cell] = word;
        true
    }

    /// Remove a global variable.
    pub fn nb_delete(&mut self, name: Atom) -> bool {
        self.global_vars.remove(&name).is_some()
    }

    /// Protect everything currently on the global stack from backtracking.
    pub fn freeze_global(&mut self) {
        self.frozen_bar = self.stacks.g_top;
    }

    /// Current frozen bar.
    #[must_use]
    pub const fn frozen_bar(&self) -> usize {
        self.frozen_bar
    }

    /// Keep attributed variables alive even when unreachable, so residual
    /// constraints can be reported.
    pub const fn set_residue_vars(&mut self, enabled: bool) {
        self.residue_vars = enabled;
    }

    // --- Space management ---

    /// Make sure the stacks have room for the given number of cells,
    /// collecting or growing as needed.
    pub fn reserve(&mut self, global: usize, local: usize, trail: usize) -> Result<(), StackError> {
        let global_short = self.stacks.room(StackKind::Global) < global;
        let trail_short = self.stacks.room(StackKind::Trail) < trail;
        if (global_short || trail_short) && self.gc_blocked == 0 {
            let wanted = (global_short && self.consider_garbage_collect(StackKind::Global))
                || (trail_short && self.consider_garbage_collect(StackKind::Trail));
            if wanted {
                self.garbage_collect();
            }
        }
        self.grow_stacks(local, global, trail)
    }

    /// Grow the stacks so each has at least the given free space.
    ///
    /// Stacks that already have the room keep their size. Fails without
    /// changing anything if a stack would exceed its limit.
    pub fn grow_stacks(&mut self, local: usize, global: usize, trail: usize) -> Result<(), StackError> {
        let global_size = self.grown_size(StackKind::Global, global)?;
        let local_size = self.grown_size(StackKind::Local, local)?;
        let trail_size = self.grown_size(StackKind::Trail, trail)?;
        self.resize_stacks(global_size, local_size, trail_size);
        Ok(())
    }

    fn grown_size(&self, kind: StackKind, extra: usize) -> Result<usize, StackError> {
        let info = self.stacks.info(kind);
        if self.stacks.room(kind) >= extra {
            return Ok(info.size);
        }
        let used = self.stacks.used(kind);
        let overflow = StackError::Overflow {
            stack: kind,
            requested: extra,
            limit: info.limit,
        };
        let needed = used.checked_add(extra).ok_or_else(|| overflow.clone())?;
        if needed > info.limit {
            return Err(overflow);
        }
        let wanted = needed.saturating_add(info.min_free).min(info.limit);
        next_stack_size(info.size, wanted, info.limit).ok_or(overflow)
    }

    /// Shrink stacks that are much larger than their current use.
    ///
    /// A stack is trimmed to the smallest ladder size above its use plus
    /// its free reserve, never below its initial size.
    pub fn trim_stacks(&mut self) {
        let mut sizes = [0; 3];
        for (size, kind) in sizes.iter_mut().zip(StackKind::ALL) {
            let info = self.stacks.info(kind);
            let wanted = self.stacks.used(kind).saturating_add(info.min_free);
            let trimmed = next_stack_size(info.initial, wanted, info.limit).unwrap_or(info.size);
            *size = if trimmed < info.size / 2 { trimmed } else { info.size };
        }
        self.resize_stacks(sizes[0], sizes[1], sizes[2]);
    }

    fn resize_stacks(&mut self, global_size: usize, local_size: usize, trail_size: usize) {
        let before = (
            self.stacks.global.size,
            self.stacks.local.size,
            self.stacks.trail_info.size,
        );
        if before == (global_size, local_size, trail_size) {
            return;
        }
        self.with_signals_blocked(|engine| {
            let old_base = engine.stacks.local_base();
            let delta = engine.stacks.resize(global_size, local_size, trail_size);
            if delta != 0 {
                engine.relocate_roots(old_base, delta);
            }
            debug!(
                global = ?(before.0, global_size),
                local = ?(before.1, local_size),
                trail = ?(before.2, trail_size),
                delta,
                "stacks resized"
            );
        });
    }

    /// Shift the local pointers the engine holds outside the block.
    fn relocate_roots(&mut self, old_base: usize, delta: isize) {
        let shift = |addr: usize| addr.wrapping_add_signed(delta);
        self.frame = self.frame.map(shift);
        self.choice = self.choice.map(shift);
        self.foreign = self.foreign.map(shift);
        let words = self.registers.iter_mut().chain(self.global_vars.values_mut());
        for word in words {
            if let Some(addr) = word.local_target() {
                if addr >= old_base {
                    *word = word.with_address(shift(addr));
                }
            }
        }
    }

    // --- Atom GC support ---

    /// Add every atom this engine references to `live`.
    pub(crate) fn collect_atoms(&self, live: &mut HashSet<Atom>) {
        let mut note = |word: Word| {
            if word.is_atom() {
                live.insert(word.atom_value());
            } else if word.is_functor() {
                live.insert(word.functor_name());
            }
        };
        let memory = &self.stacks.memory;
        let mut p = 0;
        while p < self.stacks.g_top {
            note(memory[p]);
            p += memory[p].cell_size();
        }
        memory[self.stacks.l_top..].iter().copied().for_each(&mut note);
        self.registers.iter().copied().for_each(&mut note);
        for (&name, &value) in &self.global_vars {
            note(Word::atom(name));
            note(value);
        }
    }
}
