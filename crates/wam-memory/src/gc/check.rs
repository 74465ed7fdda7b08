// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Consistency checks and fatal error reporting.
//!
//! A collector that finds its own bookkeeping inconsistent cannot continue
//! safely: the stacks may already be partially rewritten. [`fatal`] logs the
//! phase, the address and the offending cell, then panics (release builds
//! abort on panic).
//!
//! The recount checks walk the whole global stack and only run when
//! `debug_assertions` or [`crate::EngineConfig::check_consistency`] is on.

use super::Collector;
use crate::term::Word;
use tracing::error;

/// Report an internal inconsistency and abort.
#[allow(clippy::panic)]
#[cold]
pub fn fatal(phase: &str, addr: usize, cell: Option<Word>, message: &str) -> ! {
    error!(phase, addr, ?cell, message, "garbage collector consistency failure");
    panic!("GC {phase}: {message} at {addr} ({cell:?})");
}

impl Collector<'_> {
    /// Recount marked global cells forward and backward.
    pub(super) fn check_marks(&self) {
        if !self.checks_enabled() {
            return;
        }
        let stacks = &self.engine.stacks;
        let expected = self.counters.total_marked;

        let mut forward = 0;
        let mut p = 0;
        while p < stacks.g_top {
            let size = stacks.memory[p].cell_size();
            if self.bits.is_marked(p) {
                forward += size;
            }
            p += size;
        }
        if forward != expected {
            fatal("check marks", p, None, &format!("forward scan found {forward}, expected {expected}"));
        }

        let mut backward = 0;
        let mut p = stacks.g_top;
        while p > 0 {
            let last = stacks.memory[p - 1];
            let size = if last.is_indirect_header() { last.cell_size() } else { 1 };
            if self.bits.is_marked(p - size) {
                backward += size;
            }
            p -= size;
        }
        if backward != expected {
            fatal("check marks", 0, None, &format!("backward scan found {backward}, expected {expected}"));
        }
    }

    /// Verify the relocation bookkeeping after compaction.
    pub(super) fn check_relocation(&self) {
        let counters = &self.counters;
        if !self.chains.is_empty() {
            let target = self.chains.keys().min().copied().unwrap_or_default();
            fatal("relocate", target, None, "relocation chain left unresolved");
        }
        if !self.checks_enabled() {
            return;
        }
        if counters.relocated_cells != counters.relocation_cells
            || counters.relocation_cells != counters.needs_relocation
        {
            fatal(
                "relocate",
                0,
                None,
                &format!(
                    "relocated {} of {} linked, {} needed",
                    counters.relocated_cells, counters.relocation_cells, counters.needs_relocation
                ),
            );
        }
        let stacks = &self.engine.stacks;
        if stacks.g_top != counters.total_marked {
            fatal("relocate", stacks.g_top, None, "global top differs from marked total");
        }
        if !self.bits.is_clear() {
            fatal("relocate", 0, None, "collector flags left set");
        }
        let mut p = 0;
        while p < stacks.g_top {
            let word = stacks.memory[p];
            if word.global_target().is_some_and(|target| target >= stacks.g_top) {
                fatal("relocate", p, Some(word), "pointer beyond the global top");
            }
            p += word.cell_size();
        }
    }
}
