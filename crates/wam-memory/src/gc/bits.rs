// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Per-cell collector flags.
//!
//! The table exists only for the duration of one collection, so both flags
//! are clear whenever the collector is not running.

use bitflags::bitflags;

bitflags! {
    /// Collector flags of one cell.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CellFlags: u8 {
        /// Reachable from a root.
        const MARK = 1;
        /// Head of a relocation chain; also scratch for duplicate detection
        /// while merging trailed assignments.
        const FIRST = 1 << 1;
    }
}

/// Mark and first flags for every cell of the block.
#[derive(Debug)]
pub struct GcBits {
    flags: Vec<CellFlags>,
}

impl GcBits {
    /// A cleared table covering `len` cells.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            flags: vec![CellFlags::empty(); len],
        }
    }

    #[inline]
    #[must_use]
    pub fn is_marked(&self, addr: usize) -> bool {
        self.flags[addr].contains(CellFlags::MARK)
    }

    #[inline]
    pub fn set_marked(&mut self, addr: usize) {
        self.flags[addr].insert(CellFlags::MARK);
    }

    #[inline]
    pub fn clear_marked(&mut self, addr: usize) {
        self.flags[addr].remove(CellFlags::MARK);
    }

    #[inline]
    #[must_use]
    pub fn is_first(&self, addr: usize) -> bool {
        self.flags[addr].contains(CellFlags::FIRST)
    }

    #[inline]
    pub fn set_first(&mut self, addr: usize) {
        self.flags[addr].insert(CellFlags::FIRST);
    }

    #[inline]
    pub fn clear_first(&mut self, addr: usize) {
        self.flags[addr].remove(CellFlags::FIRST);
    }

    /// Set the mark flag on a range of cells.
    pub fn mark_range(&mut self, start: usize, len: usize) {
        for flags in &mut self.flags[start..start + len] {
            flags.insert(CellFlags::MARK);
        }
    }

    /// Clear both flags on a range of cells.
    pub fn clear_range(&mut self, start: usize, len: usize) {
        self.flags[start..start + len].fill(CellFlags::empty());
    }

    /// True if no cell carries any flag.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.flags.iter().all(|flags| flags.is_empty())
    }
}
