// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Building terms through term references and reading them back.

use super::Engine;
use crate::error::StackError;
use crate::shared::{ATOM_DOT, ATOM_NIL, Atom};
use crate::stacks::TermRef;
use crate::term::{
    MAX_ARITY, Tag, Word, decode_float, decode_integer, decode_string, float_payload, integer_payload,
    string_payload,
};
use std::collections::{HashMap, HashSet};

/// An owned snapshot of a term, independent of stack addresses.
///
/// Variables are numbered in order of first occurrence, so two snapshots of
/// the same term taken before and after a collection compare equal.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    /// Unbound variable.
    Var(usize),
    /// Attributed variable and its attribute value.
    AttVar { var: usize, attribute: Box<Self> },
    /// Atom by name.
    Atom(String),
    /// Integer, small or big.
    Integer(i64),
    /// Float.
    Float(f64),
    /// String.
    String(String),
    /// Compound term.
    Compound { name: String, args: Vec<Self> },
    /// Back reference to an enclosing compound of a cyclic term.
    Cycle,
}

impl Term {
    /// Atom term.
    #[must_use]
    pub fn atom(name: &str) -> Self {
        Self::Atom(name.to_owned())
    }

    /// Compound term.
    #[must_use]
    pub fn compound(name: &str, args: Vec<Self>) -> Self {
        Self::Compound {
            name: name.to_owned(),
            args,
        }
    }

    /// List of `items` ending in `tail`.
    #[must_use]
    pub fn list(items: Vec<Self>, tail: Self) -> Self {
        items
            .into_iter()
            .rev()
            .fold(tail, |tail, head| Self::compound("[|]", vec![head, tail]))
    }

    /// Move the direct subterms of `self` into `out`.
    fn take_children(&mut self, out: &mut Vec<Self>) {
        match self {
            Self::Compound { args, .. } => out.append(args),
            Self::AttVar { attribute, .. } => out.push(core::mem::replace(&mut **attribute, Self::Cycle)),
            _ => {}
        }
    }
}

// Long lists nest as deep as they are long; drop them without recursion.
impl Drop for Term {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut term) = pending.pop() {
            term.take_children(&mut pending);
        }
    }
}

impl Engine {
    /// Make `term` a fresh unbound variable.
    pub fn put_variable(&mut self, term: TermRef) {
        let cell = self.cell_of(term);
        self.stacks.memory[cell] = Word::VAR;
    }

    /// Put an atom into `term`.
    pub fn put_atom(&mut self, term: TermRef, atom: Atom) {
        let cell = self.cell_of(term);
        self.stacks.memory[cell] = Word::atom(atom);
    }

    /// Put `[]` into `term`.
    pub fn put_nil(&mut self, term: TermRef) {
        self.put_atom(term, ATOM_NIL);
    }

    /// Put an integer into `term`; values beyond the inline range are stored
    /// as an indirect bignum.
    pub fn put_integer(&mut self, term: TermRef, value: i64) -> Result<(), StackError> {
        let word = if Word::fits_small_int(value) {
            Word::small_int(value)
        } else {
            self.indirect(Tag::Integer, &integer_payload(value))?
        };
        let cell = self.cell_of(term);
        self.stacks.memory[cell] = word;
        Ok(())
    }

    /// Put a float into `term`.
    pub fn put_float(&mut self, term: TermRef, value: f64) -> Result<(), StackError> {
        let word = self.indirect(Tag::Float, &float_payload(value))?;
        let cell = self.cell_of(term);
        self.stacks.memory[cell] = word;
        Ok(())
    }

    /// Put a string into `term`.
    pub fn put_string(&mut self, term: TermRef, text: &str) -> Result<(), StackError> {
        let word = self.indirect(Tag::String, &string_payload(text))?;
        let cell = self.cell_of(term);
        self.stacks.memory[cell] = word;
        Ok(())
    }

    fn indirect(&mut self, tag: Tag, payload: &[Word]) -> Result<Word, StackError> {
        self.reserve(payload.len() + 2, 0, 0)?;
        let addr = self
            .stacks
            .alloc_indirect(tag, payload)
            .ok_or(StackError::Overflow {
                stack: crate::stacks::StackKind::Global,
                requested: payload.len() + 2,
                limit: self.stacks.global.limit,
            })?;
        Ok(Word::indirect(tag, addr))
    }

    /// Build `name(args...)` in `term`. Unbound local arguments are moved to
    /// the global stack. Zero arguments put the atom.
    pub fn put_compound(&mut self, term: TermRef, name: Atom, args: &[TermRef]) -> Result<(), StackError> {
        let arity = args.len();
        if arity == 0 {
            self.put_atom(term, name);
            return Ok(());
        }
        if arity > MAX_ARITY {
            return Err(StackError::ArityTooLarge { arity });
        }
        self.reserve(1 + 2 * arity, 0, arity)?;
        let functor = self.alloc_global_reserved(1 + arity)?;
        self.stacks.memory[functor] = Word::functor(name, arity);
        for (i, arg) in args.iter().enumerate() {
            let word = self.linkable_word(self.cell_of(*arg))?;
            self.stacks.memory[functor + 1 + i] = word;
        }
        let cell = self.cell_of(term);
        self.stacks.memory[cell] = Word::compound(functor);
        Ok(())
    }

    /// Build the list cell `[head|tail]` in `term`.
    pub fn put_list(&mut self, term: TermRef, head: TermRef, tail: TermRef) -> Result<(), StackError> {
        self.put_compound(term, ATOM_DOT, &[head, tail])
    }

    /// Make `term` a fresh attributed variable whose attribute value is the
    /// term in `attribute`.
    pub fn put_attvar(&mut self, term: TermRef, attribute: TermRef) -> Result<(), StackError> {
        self.reserve(3, 0, 1)?;
        let var = self.alloc_global_reserved(2)?;
        self.stacks.memory[var + 1] = Word::VAR;
        self.stacks.memory[var] = Word::attvar(var + 1);
        let value = self.linkable_word(self.cell_of(attribute))?;
        self.stacks.memory[var + 1] = value;
        let cell = self.cell_of(term);
        self.stacks.memory[cell] = Word::global_ref(var);
        Ok(())
    }

    /// Make `to` refer to the same term as `from`.
    pub fn copy_ref(&mut self, from: TermRef, to: TermRef) -> Result<(), StackError> {
        self.reserve(1, 0, 1)?;
        let word = self.linkable_word(self.cell_of(from))?;
        let cell = self.cell_of(to);
        self.stacks.memory[cell] = word;
        Ok(())
    }

    /// True if `term` holds an unbound (possibly attributed) variable.
    #[must_use]
    pub fn is_unbound(&self, term: TermRef) -> bool {
        self.stacks.deref(self.cell_of(term)).1.can_bind()
    }

    /// Address of the cell `term` dereferences to.
    #[must_use]
    pub fn deref_address(&self, term: TermRef) -> usize {
        self.stacks.deref(self.cell_of(term)).0
    }

    /// Dereferenced word held by `term`.
    #[must_use]
    pub fn word_of(&self, term: TermRef) -> Word {
        self.stacks.deref(self.cell_of(term)).1
    }

    /// Snapshot the term in `term`.
    #[must_use]
    pub fn get_term(&self, term: TermRef) -> Term {
        let mut reader = TermReader {
            engine: self,
            vars: HashMap::new(),
            open: HashSet::new(),
            tasks: Vec::new(),
            values: Vec::new(),
        };
        reader.read(self.cell_of(term))
    }
}

/// Pending step of [`TermReader`].
enum ReadTask {
    /// Read the term in this cell.
    Cell(usize),
    /// Collect the last `arity` values into a compound.
    Compound { functor: usize, name: String, arity: usize },
    /// Wrap the last value as the attribute of the variable in `cell`.
    AttVar { cell: usize, var: usize },
}

/// Reads a term with an explicit task stack; finished subterms wait on
/// `values` until their parent collects them.
struct TermReader<'a> {
    engine: &'a Engine,
    vars: HashMap<usize, usize>,
    /// Functor and attributed variable cells currently being read.
    open: HashSet<usize>,
    tasks: Vec<ReadTask>,
    values: Vec<Term>,
}

impl TermReader<'_> {
    fn var_number(&mut self, cell: usize) -> usize {
        let next = self.vars.len();
        *self.vars.entry(cell).or_insert(next)
    }

    fn atom_name(&self, atom: Atom) -> String {
        self.engine
            .shared
            .atom_name(atom)
            .map_or_else(|| format!("$atom{}", atom.index()), |name| name.to_string())
    }

    fn read(&mut self, cell: usize) -> Term {
        self.tasks.push(ReadTask::Cell(cell));
        while let Some(task) = self.tasks.pop() {
            match task {
                ReadTask::Cell(cell) => self.read_cell(cell),
                ReadTask::Compound { functor, name, arity } => {
                    self.open.remove(&functor);
                    let args = self.values.split_off(self.values.len() - arity);
                    self.values.push(Term::Compound { name, args });
                }
                ReadTask::AttVar { cell, var } => {
                    self.open.remove(&cell);
                    let attribute = Box::new(self.values.pop().unwrap_or(Term::Cycle));
                    self.values.push(Term::AttVar { var, attribute });
                }
            }
        }
        self.values.pop().unwrap_or(Term::Cycle)
    }

    fn read_cell(&mut self, cell: usize) {
        let engine = self.engine;
        let stacks = &engine.stacks;
        let (cell, word) = stacks.deref(cell);
        let term = match word.tag() {
            Tag::Var => Term::Var(self.var_number(cell)),
            Tag::AttVar => {
                let var = self.var_number(cell);
                if !self.open.insert(cell) {
                    self.values.push(Term::Var(var));
                    return;
                }
                self.tasks.push(ReadTask::AttVar { cell, var });
                self.tasks.push(ReadTask::Cell(word.address()));
                return;
            }
            Tag::Atom => Term::Atom(self.atom_name(word.atom_value())),
            Tag::Integer if word.is_small_int() => Term::Integer(word.small_int_value()),
            Tag::Integer => Term::Integer(decode_integer(stacks.indirect_payload(word.address())).unwrap_or_default()),
            Tag::Float => Term::Float(decode_float(stacks.indirect_payload(word.address())).unwrap_or_default()),
            Tag::String => Term::String(decode_string(stacks.indirect_payload(word.address())).unwrap_or_default()),
            Tag::Compound => {
                let functor = word.address();
                if !self.open.insert(functor) {
                    self.values.push(Term::Cycle);
                    return;
                }
                let header = stacks.memory[functor];
                let arity = header.functor_arity();
                let name = self.atom_name(header.functor_name());
                self.tasks.push(ReadTask::Compound { functor, name, arity });
                // First argument on top, so variables number left to right.
                self.tasks.extend((1..=arity).rev().map(|i| ReadTask::Cell(functor + i)));
                return;
            }
            Tag::Reference => Term::Cycle,
        };
        self.values.push(term);
    }
}
