// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for engine configuration.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::config::*;
use crate::stacks::StackKind;
use crate::term::MAX_ADDRESS;

#[test]
fn default_sizes() {
    let config = EngineConfig::default();
    assert_eq!(config.global.initial, INITIAL_GLOBAL_SIZE);
    assert_eq!(config.local.initial, INITIAL_LOCAL_SIZE);
    assert_eq!(config.trail.initial, INITIAL_TRAIL_SIZE);
    assert!(config.gc_enabled);
    assert!(!config.trim_after_gc);
}

#[test]
fn small_config_scales_reserve() {
    let config = EngineConfig::small(256);
    assert_eq!(config.stack(StackKind::Global).initial, 256);
    assert_eq!(config.stack(StackKind::Trail).min_free, 32);
    assert_eq!(config.small_gc_threshold, 64);
}

#[test]
fn limit_is_clamped_to_address_space() {
    let config = StackConfig::with_initial(16).limit(usize::MAX);
    assert_eq!(config.effective_limit(), MAX_ADDRESS);
    assert_eq!(StackConfig::with_initial(16).limit(100).effective_limit(), 100);
}
