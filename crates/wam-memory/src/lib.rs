// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Stack memory model and compacting garbage collector for a WAM-style
//! Prolog engine.
//!
//! Terms are tagged 64-bit words living on three cooperating stacks:
//!
//! - the **global stack** holds compound terms, indirect data and variables
//!   that outlive a call
//! - the **local stack** holds environment frames, choice points and foreign
//!   frames with their term references
//! - the **trail** records bindings and assignments to undo on backtracking
//!
//! The collector ([`gc`]) reclaims unreachable global cells with a sliding
//! mark-compact pass, resets bindings early where backtracking would undo
//! them anyway, and compacts the trail. Stacks grow on demand ([`stacks`]),
//! relocating every local pointer.
//!
//! # Example
//!
//! ```
//! use wam_memory::{Engine, EngineConfig, SharedState, Term};
//!
//! let shared = SharedState::new();
//! let mut engine = Engine::new(shared, EngineConfig::small(1024)).unwrap();
//! let frame = engine.open_foreign_frame().unwrap();
//! let t = engine.new_term_ref().unwrap();
//! let a = engine.new_term_ref().unwrap();
//! engine.put_integer(a, 42).unwrap();
//! let foo = engine.intern("foo");
//! engine.put_compound(t, foo, &[a]).unwrap();
//! engine.garbage_collect();
//! assert_eq!(engine.get_term(t), Term::compound("foo", vec![Term::Integer(42)]));
//! engine.close_foreign_frame(frame);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod gc;
pub mod shared;
pub mod stacks;
pub mod term;

#[cfg(test)]
mod config_test;

pub use config::{EngineConfig, StackConfig};
pub use engine::{Engine, REGISTER_COUNT, Signals, Term};
pub use error::StackError;
pub use gc::{AllSlotsLive, GcReport, GcStats, GcStatus, VmHooks};
pub use shared::{ATOM_DOT, ATOM_NIL, Atom, AtomGcOutcome, SharedState};
pub use stacks::{ChoiceRef, ForeignFrameRef, FrameRef, StackKind, TermRef, TrailEntry};
pub use term::{Storage, Tag, Word};
