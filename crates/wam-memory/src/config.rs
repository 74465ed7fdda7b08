// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Engine configuration: stack sizing and collector policy.
//!
//! All sizes are in cells (words), not bytes.

use crate::stacks::StackKind;
use crate::term::MAX_ADDRESS;

/// Initial global stack size (64 Ki cells).
pub const INITIAL_GLOBAL_SIZE: usize = 64 * 1024;

/// Initial local stack size (16 Ki cells).
pub const INITIAL_LOCAL_SIZE: usize = 16 * 1024;

/// Initial trail size (16 Ki entries).
pub const INITIAL_TRAIL_SIZE: usize = 16 * 1024;

/// Default hard limit for each stack (128 Mi cells, 1 GiB of words).
pub const DEFAULT_STACK_LIMIT: usize = 128 * 1024 * 1024;

/// Free cells a stack should keep after a collection before growing.
///
/// The low-room rule of [`crate::Engine::consider_garbage_collect`] compares
/// against this absolute reserve rather than a fraction of the hard limit:
/// any useful fraction of [`DEFAULT_STACK_LIMIT`] is larger than the initial
/// stacks, so every reservation would look short of room.
pub const DEFAULT_MIN_FREE: usize = 4 * 1024;

/// Collect when usage exceeds `factor` times the size after the last collection.
pub const DEFAULT_GC_FACTOR: usize = 3;

/// Below this many cells of growth since the last collection, never collect
/// on the factor rule alone.
pub const SMALL_GC_THRESHOLD: usize = 16 * 1024;

/// Sizing policy of one stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackConfig {
    /// Size the stack starts with.
    pub initial: usize,
    /// Hard limit; growth beyond it raises an overflow.
    pub limit: usize,
    /// Free space to keep before requesting growth or collection. Falling
    /// below it after usage grew requests a collection.
    pub min_free: usize,
    /// Growth factor of the collection heuristic.
    pub factor: usize,
}

impl StackConfig {
    /// A policy with the given initial size and default limits.
    #[must_use]
    pub const fn with_initial(initial: usize) -> Self {
        Self {
            initial,
            limit: DEFAULT_STACK_LIMIT,
            min_free: DEFAULT_MIN_FREE,
            factor: DEFAULT_GC_FACTOR,
        }
    }

    /// The same policy with a different hard limit.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// The same policy with a different free-space reserve.
    #[must_use]
    pub const fn min_free(mut self, min_free: usize) -> Self {
        self.min_free = min_free;
        self
    }

    /// Limit clamped to what a tagged word can address.
    #[must_use]
    pub const fn effective_limit(&self) -> usize {
        if self.limit > MAX_ADDRESS {
            MAX_ADDRESS
        } else {
            self.limit
        }
    }
}

/// Configuration of one engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Global (heap) stack policy.
    pub global: StackConfig,
    /// Local (environment and choice point) stack policy.
    pub local: StackConfig,
    /// Trail policy.
    pub trail: StackConfig,
    /// Allow the collector to run at all.
    pub gc_enabled: bool,
    /// Run the expensive consistency checks in release builds too.
    pub check_consistency: bool,
    /// Growth (cells) below which the factor rule never requests a collection.
    pub small_gc_threshold: usize,
    /// Shrink oversized stacks after each collection.
    pub trim_after_gc: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global: StackConfig::with_initial(INITIAL_GLOBAL_SIZE),
            local: StackConfig::with_initial(INITIAL_LOCAL_SIZE),
            trail: StackConfig::with_initial(INITIAL_TRAIL_SIZE),
            gc_enabled: true,
            check_consistency: false,
            small_gc_threshold: SMALL_GC_THRESHOLD,
            trim_after_gc: false,
        }
    }
}

impl EngineConfig {
    /// A configuration with small stacks, for tests and embedding.
    ///
    /// Every stack starts at `initial` cells with a small free reserve, so
    /// growth and collection trigger after little work.
    #[must_use]
    pub fn small(initial: usize) -> Self {
        let stack = StackConfig::with_initial(initial).min_free(initial / 8);
        Self {
            global: stack,
            local: stack,
            trail: stack,
            small_gc_threshold: initial / 4,
            ..Self::default()
        }
    }

    /// Policy of the given stack.
    #[must_use]
    pub const fn stack(&self, kind: StackKind) -> &StackConfig {
        match kind {
            StackKind::Global => &self.global,
            StackKind::Local => &self.local,
            StackKind::Trail => &self.trail,
        }
    }
}
