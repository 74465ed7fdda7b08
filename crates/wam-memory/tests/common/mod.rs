// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared test infrastructure for integration tests.
//!
//! This module provides:
//! - [`TestEngine`] - an engine with consistency checks on and an open
//!   foreign frame, plus helpers to build terms and garbage
//! - [`normalize`] - renumbers variables the way [`Engine::get_term`] does
//!
//! # Design
//!
//! This module is **not** a test file, so it must comply with full clippy rules.
//! Test-specific allowances (like `unwrap_used`) are only permitted in `*_test.rs` files.

#![allow(dead_code, reason = "each test file uses a different subset")]

use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wam_memory::{Engine, EngineConfig, SharedState, StackError, Term, TermRef};

/// Route collector diagnostics to the test output; `RUST_LOG` selects levels.
pub fn init_tracing() {
    // Fails when another test already installed the subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration with small stacks so growth and collection happen early.
#[must_use]
pub fn checked_config(initial: usize) -> EngineConfig {
    EngineConfig {
        check_consistency: true,
        ..EngineConfig::small(initial)
    }
}

/// An engine prepared for scenario tests.
pub struct TestEngine {
    pub engine: Engine,
}

impl TestEngine {
    /// Engine with `initial` cells per stack and one open foreign frame.
    pub fn new(initial: usize) -> Result<Self, StackError> {
        Self::with_config(checked_config(initial))
    }

    /// Engine with the given configuration and one open foreign frame.
    pub fn with_config(config: EngineConfig) -> Result<Self, StackError> {
        Self::with_shared(SharedState::new(), config)
    }

    /// Engine attached to existing shared state, with one open foreign frame.
    pub fn with_shared(shared: Arc<SharedState>, config: EngineConfig) -> Result<Self, StackError> {
        init_tracing();
        let mut engine = Engine::new(shared, config)?;
        engine.open_foreign_frame()?;
        Ok(Self { engine })
    }

    /// Allocate `n` term references in the newest foreign frame.
    pub fn refs(&mut self, n: usize) -> Result<Vec<TermRef>, StackError> {
        self.engine.new_term_refs(n)
    }

    /// Build `term` into `out`.
    ///
    /// Equal variable numbers denote the same variable within one call.
    /// Helper term references live in a temporary foreign frame, so nothing
    /// but `out` keeps the result alive. [`Term::Cycle`] builds `[]`.
    pub fn build(&mut self, term: &Term, out: TermRef) -> Result<(), StackError> {
        let frame = self.engine.open_foreign_frame()?;
        let mut vars = HashMap::new();
        let result = self.build_into(term, out, &mut vars);
        self.engine.close_foreign_frame(frame);
        result
    }

    fn build_into(
        &mut self,
        term: &Term,
        out: TermRef,
        vars: &mut HashMap<usize, TermRef>,
    ) -> Result<(), StackError> {
        match term {
            Term::Var(n) => {
                let var = self.variable(*n, vars)?;
                self.engine.copy_ref(var, out)
            }
            Term::AttVar { var, attribute } => {
                if let Some(&existing) = vars.get(var) {
                    return self.engine.copy_ref(existing, out);
                }
                let value = self.engine.new_term_ref()?;
                self.build_into(attribute, value, vars)?;
                let holder = self.engine.new_term_ref()?;
                self.engine.put_attvar(holder, value)?;
                vars.insert(*var, holder);
                self.engine.copy_ref(holder, out)
            }
            Term::Atom(name) => {
                let atom = self.engine.intern(name);
                self.engine.put_atom(out, atom);
                Ok(())
            }
            Term::Integer(value) => self.engine.put_integer(out, *value),
            Term::Float(value) => self.engine.put_float(out, *value),
            Term::String(text) => self.engine.put_string(out, text),
            Term::Compound { name, args } => {
                let refs = self.engine.new_term_refs(args.len())?;
                for (arg, &r) in args.iter().zip(&refs) {
                    self.build_into(arg, r, vars)?;
                }
                let name = self.engine.intern(name);
                self.engine.put_compound(out, name, &refs)
            }
            Term::Cycle => {
                self.engine.put_nil(out);
                Ok(())
            }
        }
    }

    fn variable(&mut self, n: usize, vars: &mut HashMap<usize, TermRef>) -> Result<TermRef, StackError> {
        if let Some(&var) = vars.get(&n) {
            return Ok(var);
        }
        let var = self.engine.new_term_ref()?;
        vars.insert(n, var);
        Ok(var)
    }

    /// Build `count` throwaway terms through `scratch` and leave it `[]`.
    pub fn garbage(&mut self, scratch: TermRef, count: usize) -> Result<(), StackError> {
        for i in 0..count {
            let value = i64::try_from(i).unwrap_or(i64::MAX);
            let junk = Term::compound(
                "junk",
                vec![
                    Term::Integer(value),
                    Term::list(vec![Term::atom("x"), Term::Var(0)], Term::Var(0)),
                    Term::String("garbage".to_owned()),
                ],
            );
            self.build(&junk, scratch)?;
        }
        self.engine.put_nil(scratch);
        Ok(())
    }
}

/// Renumber variables by first occurrence, depth first, left to right.
#[must_use]
pub fn normalize(term: &Term) -> Term {
    fn walk(term: &Term, seen: &mut HashMap<usize, usize>) -> Term {
        let number = |n: usize, seen: &mut HashMap<usize, usize>| {
            let next = seen.len();
            *seen.entry(n).or_insert(next)
        };
        match term {
            Term::Var(n) => Term::Var(number(*n, seen)),
            Term::AttVar { var, attribute } => Term::AttVar {
                var: number(*var, seen),
                attribute: Box::new(walk(attribute, seen)),
            },
            Term::Compound { name, args } => Term::Compound {
                name: name.clone(),
                args: args.iter().map(|arg| walk(arg, seen)).collect(),
            },
            other => other.clone(),
        }
    }
    walk(term, &mut HashMap::new())
}
