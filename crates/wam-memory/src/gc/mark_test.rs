// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the mark phase.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::*;
use crate::config::EngineConfig;
use crate::shared::SharedState;

fn engine() -> Engine {
    let config = EngineConfig {
        check_consistency: true,
        ..EngineConfig::small(1024)
    };
    Engine::new(SharedState::new(), config).unwrap()
}

/// Run only the mark phase and report the live global cells.
fn mark(engine: &mut Engine) -> (GcCounters, Vec<usize>) {
    let g_top = engine.stacks.g_top;
    let mut collector = Collector::new(engine);
    collector.mark_phase();
    let marked = (0..g_top).filter(|&p| collector.bits.is_marked(p)).collect();
    (collector.counters, marked)
}

#[test]
fn only_reachable_cells_are_marked() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let t = engine.new_term_ref().unwrap();
    let s = engine.new_term_ref().unwrap();
    let a = engine.new_term_ref().unwrap();
    let junk = engine.intern("junk");
    let keep = engine.intern("keep");

    engine.put_integer(s, 1).unwrap();
    engine.put_compound(s, junk, &[s]).unwrap();
    engine.put_nil(s);
    engine.put_integer(a, 2).unwrap();
    engine.put_compound(t, keep, &[a]).unwrap();

    let (counters, marked) = mark(&mut engine);
    assert_eq!(counters.total_marked, 2);
    assert_eq!(marked, vec![2, 3]);
}

#[test]
fn shared_subterms_are_counted_once() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let a = engine.new_term_ref().unwrap();
    let u = engine.new_term_ref().unwrap();
    let t = engine.new_term_ref().unwrap();
    let x = engine.intern("x");
    let g = engine.intern("g");
    let f = engine.intern("f");

    engine.put_atom(a, x);
    engine.put_compound(u, g, &[a]).unwrap();
    engine.put_compound(t, f, &[u, u]).unwrap();

    let (counters, marked) = mark(&mut engine);
    assert_eq!(marked, vec![0, 1, 2, 3, 4]);
    assert_eq!(counters.total_marked, 5);
    // Both arguments of f/2 point at g/1.
    assert_eq!(counters.needs_relocation, 2);
}

#[test]
fn cyclic_terms_terminate() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let a = engine.new_term_ref().unwrap();
    let t = engine.new_term_ref().unwrap();
    let tail = engine.new_term_ref().unwrap();

    engine.put_integer(a, 1).unwrap();
    engine.put_list(t, a, tail).unwrap();
    assert!(engine.setarg(2, t, t).unwrap());
    engine.put_nil(tail);

    // The globalised tail variable at 3 is no longer reachable.
    let (counters, marked) = mark(&mut engine);
    assert_eq!(marked, vec![0, 1, 2]);
    assert_eq!(counters.total_marked, 3);
}

#[test]
fn indirect_blocks_are_marked_whole() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let a = engine.new_term_ref().unwrap();
    let t = engine.new_term_ref().unwrap();
    let f = engine.intern("f");

    engine.put_float(a, 1.5).unwrap();
    engine.put_compound(t, f, &[a]).unwrap();
    engine.put_nil(a);

    let (counters, marked) = mark(&mut engine);
    assert_eq!(marked, vec![0, 1, 2, 3, 4]);
    assert_eq!(counters.total_marked, 5);
}

#[test]
fn attributed_variables_keep_their_attribute() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let t = engine.new_term_ref().unwrap();
    let attribute = engine.new_term_ref().unwrap();

    engine.put_integer(attribute, 9).unwrap();
    engine.put_attvar(t, attribute).unwrap();

    let (counters, marked) = mark(&mut engine);
    assert_eq!(marked, vec![0, 1]);
    assert_eq!(counters.total_marked, 2);
}

#[test]
fn term_refs_of_every_open_foreign_frame_are_roots() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let outer = engine.new_term_ref().unwrap();
    engine.put_integer(outer, 1).unwrap();
    let one = engine.intern("one");
    engine.put_compound(outer, one, &[outer]).unwrap();

    engine.open_foreign_frame().unwrap();
    let inner = engine.new_term_ref().unwrap();
    engine.put_integer(inner, 2).unwrap();
    let two = engine.intern("two");
    engine.put_compound(inner, two, &[inner]).unwrap();

    let (counters, _) = mark(&mut engine);
    assert_eq!(counters.total_marked, 4);
}

fn popped_frame(engine: &mut Engine, with_choice: bool) {
    engine.open_foreign_frame().unwrap();
    let t = engine.new_term_ref().unwrap();
    let a = engine.new_term_ref().unwrap();
    engine.put_integer(a, 1).unwrap();
    let keep = engine.intern("keep");
    engine.put_compound(t, keep, &[a]).unwrap();

    let frame = engine.push_frame(7, 0, 1).unwrap();
    let slot = engine.frame_slot(frame, 0);
    engine.copy_ref(t, slot).unwrap();
    engine.put_nil(t);
    if with_choice {
        engine.push_choice().unwrap();
    }
    engine.pop_frame();
    assert!(engine.current_frame().is_none());
}

#[test]
fn frames_saved_by_choice_points_are_roots() {
    let mut engine = engine();
    popped_frame(&mut engine, true);
    let (counters, _) = mark(&mut engine);
    assert_eq!(counters.total_marked, 2);
}

#[test]
fn popped_frames_are_not_roots() {
    let mut engine = engine();
    popped_frame(&mut engine, false);
    let (counters, _) = mark(&mut engine);
    assert_eq!(counters.total_marked, 0);
}

#[test]
fn long_lists_mark_without_recursion() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let list = engine.new_term_ref().unwrap();
    let head = engine.new_term_ref().unwrap();
    engine.put_nil(list);
    for i in 0..10_000 {
        engine.put_integer(head, i).unwrap();
        engine.put_list(list, head, list).unwrap();
    }

    let (counters, _) = mark(&mut engine);
    assert_eq!(counters.total_marked, 30_000);
}
