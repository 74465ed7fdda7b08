// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for early reset, assignment merging and trail compaction.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::*;
use crate::config::EngineConfig;
use crate::engine::Term;
use crate::shared::SharedState;
use crate::stacks::TrailEntry;
use crate::stacks::frames::{CHOICE_SIZE, FRAME_HEADER};

fn engine() -> Engine {
    let config = EngineConfig {
        check_consistency: true,
        ..EngineConfig::small(1024)
    };
    Engine::new(SharedState::new(), config).unwrap()
}

fn trail(engine: &Engine) -> Vec<TrailEntry> {
    engine.stacks.trail.clone()
}

#[test]
fn bindings_of_unreachable_cells_are_reset() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let t = engine.new_term_ref().unwrap();
    let v = engine.new_term_ref().unwrap();
    let a = engine.new_term_ref().unwrap();
    let x = engine.intern("x");
    let h = engine.intern("h");

    engine.put_atom(a, x);
    engine.put_compound(t, h, &[v]).unwrap();
    engine.push_choice().unwrap();
    engine.bind(v, a).unwrap();
    assert_eq!(trail(&engine), vec![TrailEntry::Bind(2)]);

    engine.put_nil(t);
    engine.put_nil(v);
    let report = engine.garbage_collect().unwrap();
    assert_eq!((report.trail_before, report.trail_after), (1, 0));
    assert_eq!(report.global_after, 0);

    let ch = engine.choice.unwrap();
    assert_eq!(engine.stacks.choice(ch).global_mark, 0);
    assert!(engine.backtrack());
    assert_eq!(engine.stacks().global_top(), 0);
}

#[test]
fn bindings_of_cells_newer_than_the_boundary_are_dropped() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let t = engine.new_term_ref().unwrap();
    let v = engine.new_term_ref().unwrap();
    let a = engine.new_term_ref().unwrap();
    let x = engine.intern("x");
    let h = engine.intern("h");
    engine.put_atom(a, x);

    engine.push_choice().unwrap();
    // Globalising `v` binds a term reference older than the choice point.
    engine.put_compound(t, h, &[v]).unwrap();
    let v_cell = engine.cell_of(v);
    assert_eq!(trail(&engine), vec![TrailEntry::Bind(v_cell)]);

    engine.push_choice().unwrap();
    engine.bind(v, a).unwrap();
    engine.cut();
    assert_eq!(trail(&engine), vec![TrailEntry::Bind(v_cell), TrailEntry::Bind(2)]);

    // Backtracking to the remaining choice point discards cell 2 anyway.
    let report = engine.garbage_collect().unwrap();
    assert_eq!(report.trail_after, 1);
    assert_eq!(trail(&engine), vec![TrailEntry::Bind(engine.cell_of(v))]);
    assert_eq!(engine.get_term(t), Term::compound("h", vec![Term::atom("x")]));

    assert!(engine.backtrack());
    assert!(engine.is_unbound(v));
    assert_eq!(engine.stacks().global_top(), 0);
}

fn assigned_twice(engine: &mut Engine) -> TermRef {
    engine.open_foreign_frame().unwrap();
    let t = engine.new_term_ref().unwrap();
    let a = engine.new_term_ref().unwrap();
    let b = engine.new_term_ref().unwrap();
    let c = engine.new_term_ref().unwrap();
    let x = engine.intern("x");
    let y = engine.intern("y");
    let z = engine.intern("z");
    let h = engine.intern("h");

    engine.put_atom(a, x);
    engine.put_compound(t, h, &[a]).unwrap();
    engine.push_choice().unwrap();
    engine.put_atom(b, y);
    assert!(engine.setarg(1, t, b).unwrap());
    engine.put_atom(c, z);
    assert!(engine.setarg(1, t, c).unwrap());
    assert_eq!(
        trail(engine),
        vec![
            TrailEntry::Bind(1),
            TrailEntry::Value(2),
            TrailEntry::Bind(1),
            TrailEntry::Value(3)
        ]
    );
    t
}

#[test]
fn only_the_oldest_assignment_is_kept() {
    let mut engine = engine();
    let t = assigned_twice(&mut engine);

    let report = engine.garbage_collect().unwrap();
    assert_eq!(trail(&engine), vec![TrailEntry::Bind(1), TrailEntry::Value(2)]);
    // The value saved by the second assignment is garbage now.
    assert_eq!(report.global_after, 3);
    assert_eq!(engine.get_term(t), Term::compound("h", vec![Term::atom("z")]));

    let ch = engine.choice.unwrap();
    assert_eq!(engine.stacks.choice(ch).global_mark, 2);
    assert!(engine.backtrack());
    assert_eq!(engine.get_term(t), Term::compound("h", vec![Term::atom("x")]));
}

#[test]
fn assignments_to_unreachable_cells_are_undone() {
    let mut engine = engine();
    let t = assigned_twice(&mut engine);
    engine.put_nil(t);

    let report = engine.garbage_collect().unwrap();
    assert_eq!(report.trail_after, 0);
    assert_eq!(report.global_after, 0);
}

#[test]
fn frozen_cells_keep_their_trailed_bindings() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let t = engine.new_term_ref().unwrap();
    let v = engine.new_term_ref().unwrap();
    let a = engine.new_term_ref().unwrap();
    let out = engine.new_term_ref().unwrap();
    let x = engine.intern("x");
    let h = engine.intern("h");
    let name = engine.intern("saved");
    engine.put_atom(a, x);

    engine.push_choice().unwrap();
    engine.put_compound(t, h, &[v]).unwrap();
    engine.nb_setval(name, t).unwrap();
    assert_eq!(engine.frozen_bar(), 3);
    engine.bind(v, a).unwrap();
    assert_eq!(trail(&engine).last(), Some(&TrailEntry::Bind(2)));

    let report = engine.garbage_collect().unwrap();
    assert_eq!(report.trail_after, 2);
    assert_eq!(engine.frozen_bar(), 3);

    // Backtracking keeps the frozen cells but undoes the binding.
    assert!(engine.backtrack());
    assert_eq!(engine.stacks().global_top(), 3);
    assert!(engine.nb_getval(name, out));
    assert_eq!(engine.get_term(out), Term::compound("h", vec![Term::Var(0)]));
}

#[test]
fn compaction_rewrites_trail_marks() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let u = engine.new_term_ref().unwrap();
    let v = engine.new_term_ref().unwrap();
    let a = engine.new_term_ref().unwrap();
    let x = engine.intern("x");
    let g = engine.intern("g");
    engine.put_atom(a, x);
    engine.put_compound(u, g, &[v]).unwrap();

    engine.push_choice().unwrap();
    engine.bind(v, a).unwrap();
    engine.push_choice().unwrap();
    let newest = engine.choice.unwrap();
    assert_eq!(engine.stacks.choice(newest).trail_mark, 1);

    engine.put_nil(u);
    engine.put_nil(v);
    engine.garbage_collect().unwrap();
    let newest = engine.choice.unwrap();
    assert_eq!(engine.stacks.choice(newest).trail_mark, 0);
    assert!(engine.stacks.trail.is_empty());
}

#[test]
fn bindings_only_visible_after_backtracking_are_reset_early() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let a = engine.new_term_ref().unwrap();
    let x = engine.intern("x");
    engine.put_atom(a, x);

    let frame = engine.push_frame(3, 0, 1).unwrap();
    engine.push_choice().unwrap();
    engine.pop_frame();
    let slot = engine.frame_slot(frame, 0);
    engine.bind(slot, a).unwrap();
    assert_eq!(trail(&engine).len(), 1);

    // The frame is only reachable by backtracking, which unbinds the slot.
    engine.garbage_collect().unwrap();
    assert!(engine.stacks.trail.is_empty());
    assert!(engine.is_unbound(slot));
}

#[test]
fn bindings_of_released_local_cells_are_dropped_untouched() {
    let mut engine = engine();
    engine.open_foreign_frame().unwrap();
    let keep = engine.new_term_ref().unwrap();
    let a = engine.new_term_ref().unwrap();
    let f = engine.intern("f");
    let x = engine.intern("x");
    engine.put_integer(keep, 7).unwrap();
    engine.put_compound(keep, f, &[keep]).unwrap();
    engine.put_atom(a, x);

    let frame = engine.push_frame(1, 0, 1).unwrap();
    engine.push_choice().unwrap();
    let slot = engine.frame_slot(frame, 0);
    let slot_cell = engine.cell_of(slot);
    engine.bind(slot, a).unwrap();
    assert_eq!(trail(&engine), vec![TrailEntry::Bind(slot_cell)]);

    // The new choice point reuses the cells of the popped frame.
    engine.cut();
    engine.pop_frame();
    engine.push_choice().unwrap();
    let ch = engine.choice.unwrap();
    assert!((ch..ch + CHOICE_SIZE).contains(&slot_cell));

    let report = engine.garbage_collect().unwrap();
    assert_eq!(report.trail_after, 0);
    let ch = engine.choice.unwrap();
    assert_eq!(engine.stacks.choice(ch).global_mark, 2);

    assert!(engine.backtrack());
    assert_eq!(engine.stacks().global_top(), 2);
    assert_eq!(engine.get_term(keep), Term::compound("f", vec![Term::Integer(7)]));
}

#[test]
fn local_bindings_older_than_every_boundary_are_dropped_untouched() {
    let mut engine = engine();
    engine.push_frame(1, 0, 2).unwrap();
    let first = engine.current_frame().unwrap();
    let (slot, value) = (engine.frame_slot(first, 0), engine.frame_slot(first, 1));
    let x = engine.intern("x");
    engine.put_atom(value, x);
    engine.push_choice().unwrap();
    let slot_cell = engine.cell_of(slot);
    engine.bind(slot, value).unwrap();
    assert_eq!(trail(&engine), vec![TrailEntry::Bind(slot_cell)]);

    // Nothing can undo the entry any more; its cell becomes a frame header.
    engine.cut();
    engine.pop_frame();
    engine.push_frame(9, 77, 0).unwrap();
    let fr = engine.frame.unwrap();
    assert!((fr..fr + FRAME_HEADER).contains(&slot_cell));

    let report = engine.garbage_collect().unwrap();
    assert_eq!(report.trail_after, 0);
    let view = engine.stacks.frame(engine.frame.unwrap());
    assert_eq!((view.clause, view.pc, view.nslots), (9, 77, 0));
}
