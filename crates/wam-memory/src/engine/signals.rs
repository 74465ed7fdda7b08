// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Pending engine signals.
//!
//! Collections are never started in the middle of an allocation. Heuristics
//! raise [`Signals::GC`] instead, and the virtual machine services it at its
//! next safe point through [`Engine::handle_signals`]. Raising an already
//! pending signal coalesces with it.

use super::Engine;
use bitflags::bitflags;
use tracing::trace;

bitflags! {
    /// Set of pending signals.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Signals: u8 {
        /// A global stack collection is wanted.
        const GC = 1;
        /// An atom collection was deferred and should be retried by the
        /// host, see [`crate::SharedState::garbage_collect_atoms`].
        const ATOM_GC = 1 << 1;
    }
}

impl Engine {
    /// Raise signals.
    pub fn raise(&mut self, signals: Signals) {
        self.signals.insert(signals);
    }

    /// Signals currently pending.
    #[must_use]
    pub const fn pending_signals(&self) -> Signals {
        self.signals
    }

    /// True while signal handling is blocked.
    #[must_use]
    pub const fn signals_blocked(&self) -> bool {
        self.signals_blocked > 0
    }

    /// Service pending signals at a safe point.
    ///
    /// Runs a pending collection. Signals the engine cannot service itself
    /// ([`Signals::ATOM_GC`]) are cleared and returned to the caller. While
    /// signals are blocked nothing happens and nothing is returned.
    pub fn handle_signals(&mut self) -> Signals {
        if self.signals_blocked > 0 {
            return Signals::empty();
        }
        if self.signals.contains(Signals::GC) {
            trace!("servicing collection request");
            if self.garbage_collect().is_none() {
                // Disabled or blocked: drop the request, heuristics re-raise it.
                self.signals.remove(Signals::GC);
            }
        }
        let forwarded = self.signals & Signals::ATOM_GC;
        self.signals.remove(forwarded);
        forwarded
    }

    /// Run `f` with signal handling blocked.
    pub fn with_signals_blocked<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.signals_blocked += 1;
        let result = f(self);
        self.signals_blocked -= 1;
        result
    }
}
