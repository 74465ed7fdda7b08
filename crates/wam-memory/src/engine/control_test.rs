// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for frames, choice points and foreign frames.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::*;

fn engine() -> Engine {
    Engine::new(SharedState::new(), EngineConfig::small(256)).unwrap()
}

#[test]
fn frames_nest_and_pop() {
    let mut engine = engine();
    let base = engine.stacks().local_top();
    let outer = engine.push_frame(1, 10, 2).unwrap();
    let inner = engine.push_frame(2, 20, 1).unwrap();
    assert_eq!(engine.current_frame(), Some(inner));
    assert_eq!(engine.used(StackKind::Local), 4 + 2 + 4 + 1);
    assert!(engine.is_unbound(engine.frame_slot(outer, 1)));

    engine.set_pc(inner, 21);
    let view = engine.stacks.frame(engine.frame.unwrap());
    assert_eq!((view.clause, view.pc, view.nslots), (2, 21, 1));

    engine.pop_frame();
    assert_eq!(engine.current_frame(), Some(outer));
    engine.pop_frame();
    assert_eq!(engine.current_frame(), None);
    assert_eq!(engine.stacks().local_top(), base);
}

#[test]
fn term_refs_need_an_open_foreign_frame_on_top() {
    let mut engine = engine();
    assert_eq!(engine.new_term_ref(), Err(StackError::NoForeignFrame));

    engine.open_foreign_frame().unwrap();
    let refs = engine.new_term_refs(3).unwrap();
    assert_eq!(refs.len(), 3);
    assert!(refs.iter().all(|&t| engine.is_unbound(t)));

    engine.push_frame(0, 0, 0).unwrap();
    assert_eq!(engine.new_term_ref(), Err(StackError::ForeignFrameNotTop));
    engine.pop_frame();
    assert!(engine.new_term_ref().is_ok());
}

#[test]
fn closing_a_foreign_frame_releases_its_term_refs() {
    let mut engine = engine();
    let base = engine.stacks().local_top();
    let outer = engine.open_foreign_frame().unwrap();
    engine.new_term_ref().unwrap();
    engine.open_foreign_frame().unwrap();
    engine.new_term_refs(2).unwrap();

    // Closing the outer frame closes the inner one too.
    engine.close_foreign_frame(outer);
    assert_eq!(engine.stacks().local_top(), base);
    assert_eq!(engine.new_term_ref(), Err(StackError::NoForeignFrame));
}

#[test]
fn closing_keeps_bindings() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let v = engine.new_term_ref().unwrap();
    let inner = engine.open_foreign_frame().unwrap();
    let a = engine.new_term_ref().unwrap();
    engine.put_integer(a, 8).unwrap();
    engine.bind(v, a).unwrap();

    engine.close_foreign_frame(inner);
    assert_eq!(engine.get_term(v), Term::Integer(8));
    assert!(engine.new_term_ref().is_ok());
}

#[test]
fn rewinding_discards_global_cells() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let v = engine.new_term_ref().unwrap();
    let frame = engine.open_foreign_frame().unwrap();
    let a = engine.new_term_ref().unwrap();
    let f = engine.intern("f");
    engine.put_integer(a, 1).unwrap();
    engine.put_compound(a, f, &[a]).unwrap();
    engine.bind(v, a).unwrap();
    assert_eq!(engine.stacks().global_top(), 2);

    engine.rewind_foreign_frame(frame);
    assert_eq!(engine.stacks().global_top(), 0);
    assert!(engine.is_unbound(v));
    assert!(engine.stacks.trail.is_empty());
    // The frame stays open.
    assert!(engine.new_term_ref().is_ok());
}

#[test]
fn backtracking_restores_the_choice_point_state() {
    let mut engine = engine();
    assert!(!engine.backtrack());

    engine.open_foreign_frame().unwrap();
    let v = engine.new_term_ref().unwrap();
    let a = engine.new_term_ref().unwrap();
    let frame = engine.push_frame(1, 0, 0).unwrap();
    let choice = engine.push_choice().unwrap();
    assert_eq!(engine.current_choice(), Some(choice));

    engine.push_frame(2, 0, 0).unwrap();
    engine.put_integer(a, 1).unwrap();
    let f = engine.intern("f");
    engine.put_compound(a, f, &[a]).unwrap();
    engine.bind(v, a).unwrap();

    assert!(engine.backtrack());
    assert_eq!(engine.current_frame(), Some(frame));
    assert_eq!(engine.stacks().global_top(), 0);
    assert!(engine.is_unbound(v));
    // The choice point survives for the next alternative.
    assert_eq!(engine.current_choice(), Some(choice));

    engine.cut();
    assert_eq!(engine.current_choice(), None);
    assert!(!engine.backtrack());
}

#[test]
fn backtracking_closes_newer_foreign_frames() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    engine.new_term_ref().unwrap();
    engine.push_choice().unwrap();
    let base = engine.stacks().local_top();
    engine.open_foreign_frame().unwrap();
    engine.new_term_refs(3).unwrap();

    assert!(engine.backtrack());
    assert_eq!(engine.stacks().local_top(), base);
}

#[test]
fn handles_survive_local_growth() {
    let mut engine = Engine::new(SharedState::new(), EngineConfig::small(64)).unwrap();
    engine.open_foreign_frame().unwrap();
    let t = engine.new_term_ref().unwrap();
    engine.put_integer(t, 99).unwrap();
    let first = engine.push_frame(5, 0, 1).unwrap();
    let slot = engine.frame_slot(first, 0);
    engine.copy_ref(t, slot).unwrap();
    let choice = engine.push_choice().unwrap();

    let size = engine.stacks().info(StackKind::Local).size;
    for i in 0..50 {
        engine.push_frame(6, i, 4).unwrap();
    }
    assert!(engine.stacks().info(StackKind::Local).size > size);

    assert_eq!(engine.get_term(t), Term::Integer(99));
    assert_eq!(engine.get_term(engine.frame_slot(first, 0)), Term::Integer(99));
    assert_eq!(engine.current_choice(), Some(choice));
    assert!(engine.backtrack());
    assert_eq!(engine.current_frame(), Some(first));
}
