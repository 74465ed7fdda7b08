// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Errors surfaced by stack operations.
//!
//! Resource exhaustion is the only failure a well-behaved caller sees.
//! Internal inconsistencies found by the collector are not errors: they
//! abort through [`crate::gc::check::fatal`].

use crate::stacks::StackKind;
use thiserror::Error;

/// Error returned by operations that allocate on or manipulate the stacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    /// A stack cannot grow to satisfy a request.
    #[error("{stack} stack overflow: requested {requested} cells, limit is {limit}")]
    Overflow {
        /// The exhausted stack.
        stack: StackKind,
        /// Cells requested by the failing operation.
        requested: usize,
        /// Hard limit of the stack in cells.
        limit: usize,
    },

    /// A term reference was requested without an open foreign frame.
    #[error("no foreign frame is open")]
    NoForeignFrame,

    /// Term references can only be added to the newest local record.
    #[error("foreign frame is not the newest local record")]
    ForeignFrameNotTop,

    /// A compound term has more arguments than a functor cell can encode.
    #[error("arity {arity} exceeds the maximum compound arity")]
    ArityTooLarge {
        /// Requested arity.
        arity: usize,
    },

    /// The term reference does not hold a bindable variable.
    #[error("term reference is not an unbound variable")]
    NotAVariable,
}
