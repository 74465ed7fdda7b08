// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Stack resizing and local pointer relocation.
//!
//! Resizing allocates a new block, copies the global area to the same
//! addresses and the local area to the new end of the block. Every local
//! address then moves by the same `delta`; this module shifts the local
//! pointers stored in the block and on the trail. Pointers held by the
//! engine itself are shifted by the engine.

use super::{StackSet, TrailEntry};
use crate::term::{MAX_ADDRESS, Word};

/// Below this size (in cells) stacks double; above it they grow by half.
pub const LADDER_SWITCH: usize = 4 * 1024 * 1024 / size_of::<Word>();

/// Smallest size on the growth ladder from `current` that holds `required`
/// cells, capped by `limit`. `None` if `required` exceeds the limit.
#[must_use]
pub fn next_stack_size(current: usize, required: usize, limit: usize) -> Option<usize> {
    let limit = limit.min(MAX_ADDRESS);
    if required > limit {
        return None;
    }
    let mut size = current.max(1);
    while size < required {
        size = if size < LADDER_SWITCH {
            size * 2
        } else {
            size + size / 2
        };
    }
    Some(size.min(limit))
}

#[inline]
const fn shift(addr: usize, delta: isize) -> usize {
    addr.wrapping_add_signed(delta)
}

impl StackSet {
    /// Resize the stacks and relocate local pointers inside them.
    ///
    /// The new sizes must hold the data currently in use. Returns the offset
    /// every local address moved by.
    pub(crate) fn resize(&mut self, global_size: usize, local_size: usize, trail_size: usize) -> isize {
        let old_len = self.memory.len();
        let old_base = self.local_base();
        let new_len = global_size + local_size;
        let delta = new_len as isize - old_len as isize;

        if global_size != self.global.size || local_size != self.local.size {
            let local_used = old_len - self.l_top;
            let mut memory = vec![Word::VAR; new_len];
            memory[..self.g_top].copy_from_slice(&self.memory[..self.g_top]);
            memory[new_len - local_used..].copy_from_slice(&self.memory[self.l_top..]);
            self.memory = memory;
            self.l_top = new_len - local_used;
            self.global.size = global_size;
            self.local.size = local_size;
            if delta != 0 {
                self.relocate_local_pointers(old_base, delta);
            }
        }

        if trail_size > self.trail.capacity() {
            self.trail.reserve_exact(trail_size - self.trail.len());
        } else if trail_size < self.trail_info.size {
            self.trail.shrink_to(trail_size);
        }
        self.trail_info.size = trail_size;

        delta
    }

    fn relocate_local_pointers(&mut self, old_base: usize, delta: isize) {
        // Global cells, stepping over indirect payloads.
        let mut p = 0;
        while p < self.g_top {
            let word = self.memory[p];
            if let Some(addr) = word.local_target() {
                self.memory[p] = word.with_address(shift(addr, delta));
            }
            p += word.cell_size();
        }

        for cell in &mut self.memory[self.l_top..] {
            if let Some(addr) = cell.local_target() {
                *cell = cell.with_address(shift(addr, delta));
            }
        }

        for entry in &mut self.trail {
            match *entry {
                TrailEntry::Bind(addr) if addr >= old_base => {
                    *entry = TrailEntry::Bind(shift(addr, delta));
                }
                _ => {}
            }
        }
    }
}
