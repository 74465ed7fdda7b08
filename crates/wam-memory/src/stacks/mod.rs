// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The three cooperating stacks of an engine.
//!
//! The global and local stacks share one block, the trail lives beside it:
//!
//! ```text
//! BLOCK (Vec<Word>):
//! ┌────────────────────────────────────────────────────────────────────┐
//! │   GLOBAL                      FREE         FREE            LOCAL   │
//! │   (grows up)                 (global)     (local)      (grows down)│
//! │   [f/2][X][...]◄─g_top            │     l_top─►[choice][frame]     │
//! └────────────────────────────────────────────────────────────────────┘
//! ▲ 0                        global.size ▲                    len ▲
//!
//! TRAIL (Vec<TrailEntry>):
//! [Bind][Bind][Bind][Value]◄─t_top
//! ```
//!
//! Global addresses never change when the block is resized; local addresses
//! move with the end of the block. Callers hold local cells through handles
//! that count from the end ([`TermRef`] and friends) and therefore never
//! observe the move.

pub mod frames;
pub mod growth;


pub use frames::{ChoiceRef, ForeignFrameRef, FrameRef, TermRef};
pub use growth::{LADDER_SWITCH, next_stack_size};

use crate::config::{EngineConfig, StackConfig};
use crate::error::StackError;
use crate::term::{Tag, Word};
use core::fmt;

/// One of the three stacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StackKind {
    /// Term storage, reclaimed by the collector.
    Global,
    /// Environment frames, choice points and foreign frames.
    Local,
    /// Undo log of bindings and assignments.
    Trail,
}

impl StackKind {
    /// All stacks, in sizing order.
    pub const ALL: [Self; 3] = [Self::Global, Self::Local, Self::Trail];
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Global => "global",
            Self::Local => "local",
            Self::Trail => "trail",
        })
    }
}

/// One trail entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrailEntry {
    /// A binding of the cell at this address; undone by resetting it.
    Bind(usize),
    /// Follows the `Bind` of a destructive assignment; the address is a
    /// global cell holding the value to restore.
    Value(usize),
    /// Removed during a collection, compacted away before it ends.
    Deleted,
}

/// Sizing and collection bookkeeping of one stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackInfo {
    /// Current size in cells (entries for the trail).
    pub size: usize,
    /// Hard limit.
    pub limit: usize,
    /// Initial size; trimming never goes below it.
    pub initial: usize,
    /// Free space to keep before growing.
    pub min_free: usize,
    /// Growth factor of the collection heuristic.
    pub factor: usize,
    /// Usage right after the last collection.
    pub gced_size: usize,
    /// The collector reclaims space on this stack.
    pub gc: bool,
}

impl StackInfo {
    const fn new(config: &StackConfig, gc: bool) -> Self {
        Self {
            size: config.initial,
            limit: config.effective_limit(),
            initial: config.initial,
            min_free: config.min_free,
            factor: config.factor,
            gced_size: 0,
            gc,
        }
    }
}

/// The stacks of one engine.
#[derive(Debug)]
pub struct StackSet {
    pub(crate) memory: Vec<Word>,
    pub(crate) trail: Vec<TrailEntry>,
    pub(crate) g_top: usize,
    pub(crate) l_top: usize,
    pub(crate) global: StackInfo,
    pub(crate) local: StackInfo,
    pub(crate) trail_info: StackInfo,
}

impl StackSet {
    /// Allocate stacks with the configured initial sizes.
    ///
    /// # Errors
    ///
    /// Returns an overflow error if an initial size exceeds its limit.
    pub fn new(config: &EngineConfig) -> Result<Self, StackError> {
        for kind in StackKind::ALL {
            let stack = config.stack(kind);
            if stack.initial > stack.effective_limit() {
                return Err(StackError::Overflow {
                    stack: kind,
                    requested: stack.initial,
                    limit: stack.effective_limit(),
                });
            }
        }
        let len = config.global.initial + config.local.initial;
        Ok(Self {
            memory: vec![Word::VAR; len],
            trail: Vec::with_capacity(config.trail.initial),
            g_top: 0,
            l_top: len,
            global: StackInfo::new(&config.global, true),
            local: StackInfo::new(&config.local, false),
            trail_info: StackInfo::new(&config.trail, true),
        })
    }

    /// Bookkeeping of one stack.
    #[must_use]
    pub const fn info(&self, kind: StackKind) -> &StackInfo {
        match kind {
            StackKind::Global => &self.global,
            StackKind::Local => &self.local,
            StackKind::Trail => &self.trail_info,
        }
    }

    /// Length of the shared global/local block.
    #[inline]
    #[must_use]
    pub fn block_len(&self) -> usize {
        self.memory.len()
    }

    /// First free global cell.
    #[inline]
    #[must_use]
    pub const fn global_top(&self) -> usize {
        self.g_top
    }

    /// Lowest live local cell.
    #[inline]
    #[must_use]
    pub const fn local_top(&self) -> usize {
        self.l_top
    }

    /// Number of trail entries.
    #[inline]
    #[must_use]
    pub fn trail_top(&self) -> usize {
        self.trail.len()
    }

    /// Live trail entries, oldest first.
    #[must_use]
    pub fn trail_entries(&self) -> &[TrailEntry] {
        &self.trail
    }

    /// Lowest address belonging to the local stack.
    #[inline]
    #[must_use]
    pub const fn local_base(&self) -> usize {
        self.global.size
    }

    /// Cells (entries) in use on a stack.
    #[must_use]
    pub fn used(&self, kind: StackKind) -> usize {
        match kind {
            StackKind::Global => self.g_top,
            StackKind::Local => self.memory.len() - self.l_top,
            StackKind::Trail => self.trail.len(),
        }
    }

    /// Free cells (entries) left on a stack.
    #[must_use]
    pub fn room(&self, kind: StackKind) -> usize {
        match kind {
            StackKind::Global => self.global.size - self.g_top,
            StackKind::Local => self.l_top - self.local_base(),
            StackKind::Trail => self.trail_info.size.saturating_sub(self.trail.len()),
        }
    }

    /// True if `addr` lies in the global area.
    #[inline]
    #[must_use]
    pub const fn is_global(&self, addr: usize) -> bool {
        addr < self.global.size
    }

    /// True if `addr` lies in the local area.
    #[inline]
    #[must_use]
    pub fn is_local(&self, addr: usize) -> bool {
        addr >= self.local_base() && addr < self.memory.len()
    }

    /// Word at `addr`.
    #[inline]
    #[must_use]
    pub fn word(&self, addr: usize) -> Word {
        self.memory[addr]
    }

    /// Payload words of the indirect block whose header is at `header`.
    #[must_use]
    pub fn indirect_payload(&self, header: usize) -> &[Word] {
        let n = self.memory[header].address();
        &self.memory[header + 1..header + 1 + n]
    }

    // --- Allocation ---

    /// Bump-allocate `n` global cells. `None` means the stack must grow.
    pub fn alloc_global(&mut self, n: usize) -> Option<usize> {
        if self.room(StackKind::Global) < n {
            return None;
        }
        let addr = self.g_top;
        self.g_top += n;
        Some(addr)
    }

    /// Allocate an indirect block `[hdr, payload.., hdr]` and return the
    /// address of its first header.
    pub fn alloc_indirect(&mut self, tag: Tag, payload: &[Word]) -> Option<usize> {
        let n = payload.len();
        let addr = self.alloc_global(n + 2)?;
        let header = Word::indirect_header(tag, n);
        self.memory[addr] = header;
        self.memory[addr + 1..=addr + n].copy_from_slice(payload);
        self.memory[addr + n + 1] = header;
        Some(addr)
    }

    /// Allocate `n` local cells below the current top, cleared to unbound.
    /// Returns the lowest address of the block.
    pub fn alloc_local(&mut self, n: usize) -> Option<usize> {
        if self.room(StackKind::Local) < n {
            return None;
        }
        self.l_top -= n;
        self.memory[self.l_top..self.l_top + n].fill(Word::VAR);
        Some(self.l_top)
    }

    /// Append a trail entry. `None` means the trail must grow.
    pub fn push_trail(&mut self, entry: TrailEntry) -> Option<usize> {
        if self.room(StackKind::Trail) == 0 {
            return None;
        }
        self.trail.push(entry);
        Some(self.trail.len() - 1)
    }

    // --- Handles ---

    /// End-relative offset of a local address.
    #[inline]
    #[must_use]
    pub fn offset_of(&self, addr: usize) -> usize {
        self.memory.len() - addr
    }

    /// Local address of an end-relative offset.
    #[inline]
    #[must_use]
    pub fn address_of(&self, offset: usize) -> usize {
        self.memory.len() - offset
    }

    /// Follow references from `addr` to the cell holding the value.
    #[must_use]
    pub fn deref(&self, mut addr: usize) -> (usize, Word) {
        loop {
            let word = self.memory[addr];
            if word.is_ref() {
                addr = word.address();
            } else {
                return (addr, word);
            }
        }
    }
}
