// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Process-wide state shared by all engines.
//!
//! Engines own their stacks exclusively. What they share lives here, behind
//! an `Arc`:
//! - the atom table, so atoms compare by index across engines
//! - the GC coordination record, which keeps atom GC and term GC mutually
//!   exclusive
//!
//! Term GC runs concurrently in any number of engines. Atom GC must see no
//! term GC in progress, because a collection in flight may hold atom words
//! outside any stack. Atom GC therefore checks the `active` counter and
//! defers instead of blocking; the last term GC to leave re-signals it.


use crate::engine::Engine;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Index of an interned atom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u32);

impl Atom {
    /// Atom from a raw table index.
    #[inline]
    #[must_use]
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Raw table index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The empty list `[]`.
pub const ATOM_NIL: Atom = Atom(0);

/// The list constructor `'[|]'`.
pub const ATOM_DOT: Atom = Atom(1);

/// Atoms with an index below this are never collected.
const BUILTIN_ATOMS: &[&str] = &["[]", "[|]", "true", "false", "end_of_file"];

#[derive(Debug)]
struct AtomEntry {
    name: Arc<str>,
    /// Registrations held by host code.
    references: usize,
}

#[derive(Debug, Default)]
struct AtomTable {
    entries: Vec<Option<AtomEntry>>,
    by_name: HashMap<Arc<str>, Atom>,
    free: Vec<u32>,
}

impl AtomTable {
    fn with_builtins() -> Self {
        let mut table = Self::default();
        for name in BUILTIN_ATOMS {
            table.intern(name);
        }
        table
    }

    fn intern(&mut self, name: &str) -> Atom {
        if let Some(&atom) = self.by_name.get(name) {
            return atom;
        }
        let name: Arc<str> = Arc::from(name);
        let entry = AtomEntry {
            name: Arc::clone(&name),
            references: 0,
        };
        let atom = if let Some(index) = self.free.pop() {
            self.entries[index as usize] = Some(entry);
            Atom(index)
        } else {
            let index = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
            self.entries.push(Some(entry));
            Atom(index)
        };
        self.by_name.insert(name, atom);
        atom
    }

    fn entry_mut(&mut self, atom: Atom) -> Option<&mut AtomEntry> {
        self.entries.get_mut(atom.index()).and_then(Option::as_mut)
    }

    fn sweep(&mut self, live: &HashSet<Atom>) -> usize {
        let mut reclaimed = 0;
        for index in BUILTIN_ATOMS.len()..self.entries.len() {
            let atom = Atom(u32::try_from(index).unwrap_or(u32::MAX));
            let dead = matches!(
                &self.entries[index],
                Some(entry) if entry.references == 0 && !live.contains(&atom)
            );
            if dead {
                if let Some(entry) = self.entries[index].take() {
                    self.by_name.remove(&entry.name);
                }
                self.free.push(atom.0);
                reclaimed += 1;
            }
        }
        reclaimed
    }
}

/// Coordination between term GC and atom GC.
#[derive(Debug, Default)]
struct GcCoordination {
    /// Term collections currently running.
    active: usize,
    /// Atom GC was requested while term GC was active.
    atom_gc_pending: bool,
}

/// Result of an atom collection request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomGcOutcome {
    /// The collection ran and freed this many atoms.
    Collected(usize),
    /// A term collection is active; the request is remembered and handed
    /// back to the last term collection that exits.
    Deferred,
}

/// State shared by every engine of one process.
#[derive(Debug)]
pub struct SharedState {
    atoms: Mutex<AtomTable>,
    gc: Mutex<GcCoordination>,
}

/// Marks one engine's term collection as active.
///
/// Call [`TermGcGuard::finish`] to learn whether atom GC must be
/// re-signalled; dropping the guard leaves silently.
#[must_use]
pub struct TermGcGuard<'a> {
    shared: &'a SharedState,
    finished: bool,
}

impl TermGcGuard<'_> {
    /// Leave the term collection. Returns true when this was the last active
    /// collection and an atom collection was deferred meanwhile.
    pub fn finish(mut self) -> bool {
        self.finished = true;
        self.shared.leave_term_gc()
    }
}

impl Drop for TermGcGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.leave_term_gc();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SharedState {
    /// Create the shared state with the builtin atoms interned.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            atoms: Mutex::new(AtomTable::with_builtins()),
            gc: Mutex::new(GcCoordination::default()),
        })
    }

    // --- Atoms ---

    /// Intern `name`, returning the existing atom if there is one.
    pub fn intern(&self, name: &str) -> Atom {
        lock(&self.atoms).intern(name)
    }

    /// Look up an atom without interning.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Atom> {
        lock(&self.atoms).by_name.get(name).copied()
    }

    /// Text of an atom, or `None` if it was collected.
    #[must_use]
    pub fn atom_name(&self, atom: Atom) -> Option<Arc<str>> {
        lock(&self.atoms)
            .entries
            .get(atom.index())
            .and_then(Option::as_ref)
            .map(|entry| Arc::clone(&entry.name))
    }

    /// Number of live atoms.
    #[must_use]
    pub fn atom_count(&self) -> usize {
        lock(&self.atoms).entries.iter().flatten().count()
    }

    /// Keep `atom` alive while host code holds it outside any stack.
    pub fn register_atom(&self, atom: Atom) {
        if let Some(entry) = lock(&self.atoms).entry_mut(atom) {
            entry.references += 1;
        }
    }

    /// Release a registration taken with [`SharedState::register_atom`].
    pub fn unregister_atom(&self, atom: Atom) {
        if let Some(entry) = lock(&self.atoms).entry_mut(atom) {
            entry.references = entry.references.saturating_sub(1);
        }
    }

    // --- GC coordination ---

    /// Enter a term collection.
    pub fn enter_term_gc(&self) -> TermGcGuard<'_> {
        lock(&self.gc).active += 1;
        TermGcGuard {
            shared: self,
            finished: false,
        }
    }

    fn leave_term_gc(&self) -> bool {
        let mut gc = lock(&self.gc);
        gc.active = gc.active.saturating_sub(1);
        if gc.active == 0 && gc.atom_gc_pending {
            gc.atom_gc_pending = false;
            return true;
        }
        false
    }

    /// Number of term collections in progress.
    #[must_use]
    pub fn active_term_gcs(&self) -> usize {
        lock(&self.gc).active
    }

    /// Collect atoms not referenced from any of `engines`, from host
    /// registrations or from the builtin set.
    ///
    /// The caller passes every engine of the process. Defers when a term
    /// collection is active.
    pub fn garbage_collect_atoms(&self, engines: &[&Engine]) -> AtomGcOutcome {
        // Holding the coordination lock keeps term GC from starting meanwhile.
        let mut gc = lock(&self.gc);
        if gc.active > 0 {
            gc.atom_gc_pending = true;
            debug!(active = gc.active, "atom GC deferred");
            return AtomGcOutcome::Deferred;
        }
        let mut live = HashSet::new();
        for engine in engines {
            engine.collect_atoms(&mut live);
        }
        let reclaimed = lock(&self.atoms).sweep(&live);
        drop(gc);
        debug!(reclaimed, live = live.len(), "atom GC");
        AtomGcOutcome::Collected(reclaimed)
    }
}
