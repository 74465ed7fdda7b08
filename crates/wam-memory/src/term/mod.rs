// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tagged word representation for Prolog terms.
//!
//! Every cell on the global and local stacks is one [`Word`]. A word packs
//! a type tag, a storage class and a payload into 64 bits:
//!
//! ```text
//!  63                                   5 4       3 2     0
//! +--------------------------------------+---------+-------+
//! |              payload (59 bits)       | storage |  tag  |
//! +--------------------------------------+---------+-------+
//! ```
//!
//! The storage class tells where a pointer payload lives:
//! - `Inline`: the payload is the value itself (atoms, small integers)
//! - `Global`: the payload is an address on the global stack
//! - `Local`: the payload is an address on the local stack
//! - `Reserved`: the word is a header on the global stack (functor cells
//!   and indirect headers), never a term value by itself
//!
//! Indirect data (bignums, floats, strings) is stored on the global stack as
//! `[header, payload..., header]`. The doubled header lets a scan walk the
//! stack in both directions without side tables.


mod indirect;

pub use indirect::{
    decode_float, decode_integer, decode_string, float_payload, integer_payload, string_payload,
    string_payload_words,
};

use crate::shared::Atom;
use core::fmt;

/// Number of low bits used by the tag.
pub const TAG_BITS: u32 = 3;

/// Number of bits used by the storage class.
pub const STORAGE_BITS: u32 = 2;

/// Shift of the payload within a word.
pub const PAYLOAD_SHIFT: u32 = TAG_BITS + STORAGE_BITS;

/// Number of payload bits.
pub const PAYLOAD_BITS: u32 = 64 - PAYLOAD_SHIFT;

/// Largest address a tagged word can hold.
///
/// Stack sizes are capped so that every cell stays addressable.
pub const MAX_ADDRESS: usize = (1 << PAYLOAD_BITS) - 1;

/// Largest integer stored inline; larger values become indirect bignums.
pub const MAX_SMALL_INT: i64 = (1 << (PAYLOAD_BITS - 1)) - 1;

/// Smallest integer stored inline.
pub const MIN_SMALL_INT: i64 = -(1 << (PAYLOAD_BITS - 1));

/// Bits of a functor cell payload holding the arity.
const ARITY_BITS: u32 = 24;

/// Largest arity a functor cell can encode.
pub const MAX_ARITY: usize = (1 << ARITY_BITS) - 1;

const TAG_MASK: u64 = (1 << TAG_BITS) - 1;
const STORAGE_MASK: u64 = (1 << STORAGE_BITS) - 1;
const LOW_MASK: u64 = (1 << PAYLOAD_SHIFT) - 1;

/// Type tag of a word.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Unbound variable.
    Var = 0,
    /// Attributed variable; payload points at the attribute value cell.
    AttVar = 1,
    /// Float (always indirect).
    Float = 2,
    /// Integer (inline, or indirect bignum).
    Integer = 3,
    /// Atom (inline atom index).
    Atom = 4,
    /// String (always indirect).
    String = 5,
    /// Compound term; payload points at the functor cell.
    Compound = 6,
    /// Reference to another cell.
    Reference = 7,
}

impl Tag {
    const fn from_bits(bits: u64) -> Self {
        match bits & TAG_MASK {
            0 => Self::Var,
            1 => Self::AttVar,
            2 => Self::Float,
            3 => Self::Integer,
            4 => Self::Atom,
            5 => Self::String,
            6 => Self::Compound,
            _ => Self::Reference,
        }
    }

    /// True for the tags that can head an indirect data block.
    #[must_use]
    pub const fn is_indirect_kind(self) -> bool {
        matches!(self, Self::Float | Self::Integer | Self::String)
    }
}

/// Storage class of a word.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Storage {
    /// Value stored in the payload.
    Inline = 0,
    /// Payload is a global stack address.
    Global = 1,
    /// Payload is a local stack address.
    Local = 2,
    /// Header word (functor cell or indirect header).
    Reserved = 3,
}

impl Storage {
    const fn from_bits(bits: u64) -> Self {
        match bits & STORAGE_MASK {
            0 => Self::Inline,
            1 => Self::Global,
            2 => Self::Local,
            _ => Self::Reserved,
        }
    }
}

/// A tagged machine word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Word(u64);

impl Word {
    /// The unbound variable. Also used as "no link" in local records.
    pub const VAR: Self = Self(0);

    const fn make(tag: Tag, storage: Storage, payload: u64) -> Self {
        Self((payload << PAYLOAD_SHIFT) | ((storage as u64) << TAG_BITS) | tag as u64)
    }

    /// Wrap raw bits (indirect payload words).
    #[inline]
    #[must_use]
    pub const fn from_raw(bits: u64) -> Self {
        Self(bits)
    }

    /// The raw bits of this word.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The type tag.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> Tag {
        Tag::from_bits(self.0)
    }

    /// The storage class.
    #[inline]
    #[must_use]
    pub const fn storage(self) -> Storage {
        Storage::from_bits(self.0 >> TAG_BITS)
    }

    /// The unsigned payload.
    #[inline]
    #[must_use]
    pub const fn payload(self) -> u64 {
        self.0 >> PAYLOAD_SHIFT
    }

    /// The payload interpreted as an address.
    #[inline]
    #[must_use]
    pub const fn address(self) -> usize {
        self.payload() as usize
    }

    // --- Constructors ---

    /// An atom.
    #[inline]
    #[must_use]
    pub const fn atom(atom: Atom) -> Self {
        Self::make(Tag::Atom, Storage::Inline, atom.index() as u64)
    }

    /// True if `value` fits in an inline integer.
    #[inline]
    #[must_use]
    pub const fn fits_small_int(value: i64) -> bool {
        value >= MIN_SMALL_INT && value <= MAX_SMALL_INT
    }

    /// An inline integer. The value must satisfy [`Word::fits_small_int`].
    #[inline]
    #[must_use]
    pub const fn small_int(value: i64) -> Self {
        Self(((value as u64) << PAYLOAD_SHIFT) | ((Storage::Inline as u64) << TAG_BITS) | Tag::Integer as u64)
    }

    /// A reference to a global stack cell.
    #[inline]
    #[must_use]
    pub const fn global_ref(addr: usize) -> Self {
        Self::make(Tag::Reference, Storage::Global, addr as u64)
    }

    /// A reference to a local stack cell.
    #[inline]
    #[must_use]
    pub const fn local_ref(addr: usize) -> Self {
        Self::make(Tag::Reference, Storage::Local, addr as u64)
    }

    /// A compound term whose functor cell is at `functor_addr`.
    #[inline]
    #[must_use]
    pub const fn compound(functor_addr: usize) -> Self {
        Self::make(Tag::Compound, Storage::Global, functor_addr as u64)
    }

    /// A functor cell for `name/arity`.
    #[inline]
    #[must_use]
    pub const fn functor(name: Atom, arity: usize) -> Self {
        let payload = ((name.index() as u64) << ARITY_BITS) | (arity as u64 & MAX_ARITY as u64);
        Self::make(Tag::Compound, Storage::Reserved, payload)
    }

    /// An attributed variable whose attribute value cell is at `attr_addr`.
    #[inline]
    #[must_use]
    pub const fn attvar(attr_addr: usize) -> Self {
        Self::make(Tag::AttVar, Storage::Global, attr_addr as u64)
    }

    /// A pointer to indirect data whose header is at `header_addr`.
    #[inline]
    #[must_use]
    pub const fn indirect(tag: Tag, header_addr: usize) -> Self {
        Self::make(tag, Storage::Global, header_addr as u64)
    }

    /// An indirect header announcing `words` payload words.
    #[inline]
    #[must_use]
    pub const fn indirect_header(tag: Tag, words: usize) -> Self {
        Self::make(tag, Storage::Reserved, words as u64)
    }

    // --- Predicates ---

    /// Unbound plain variable.
    #[inline]
    #[must_use]
    pub const fn is_var(self) -> bool {
        self.0 == 0
    }

    /// Attributed variable cell.
    #[inline]
    #[must_use]
    pub const fn is_attvar(self) -> bool {
        matches!(self.tag(), Tag::AttVar) && matches!(self.storage(), Storage::Global)
    }

    /// True for cells that can still be bound (variables and attributed variables).
    #[inline]
    #[must_use]
    pub const fn can_bind(self) -> bool {
        self.is_var() || self.is_attvar()
    }

    /// Reference to another cell.
    #[inline]
    #[must_use]
    pub const fn is_ref(self) -> bool {
        matches!(self.tag(), Tag::Reference)
    }

    /// Atom.
    #[inline]
    #[must_use]
    pub const fn is_atom(self) -> bool {
        matches!(self.tag(), Tag::Atom)
    }

    /// Inline integer.
    #[inline]
    #[must_use]
    pub const fn is_small_int(self) -> bool {
        matches!(self.tag(), Tag::Integer) && matches!(self.storage(), Storage::Inline)
    }

    /// Compound term pointer.
    #[inline]
    #[must_use]
    pub const fn is_compound(self) -> bool {
        matches!(self.tag(), Tag::Compound) && matches!(self.storage(), Storage::Global)
    }

    /// Functor cell.
    #[inline]
    #[must_use]
    pub const fn is_functor(self) -> bool {
        matches!(self.tag(), Tag::Compound) && matches!(self.storage(), Storage::Reserved)
    }

    /// Pointer to indirect data.
    #[inline]
    #[must_use]
    pub const fn is_indirect(self) -> bool {
        self.tag().is_indirect_kind() && matches!(self.storage(), Storage::Global)
    }

    /// Header of an indirect data block.
    #[inline]
    #[must_use]
    pub const fn is_indirect_header(self) -> bool {
        self.tag().is_indirect_kind() && matches!(self.storage(), Storage::Reserved)
    }

    // --- Accessors ---

    /// Value of an inline integer (sign-extended payload).
    #[inline]
    #[must_use]
    pub const fn small_int_value(self) -> i64 {
        (self.0 as i64) >> PAYLOAD_SHIFT
    }

    /// Atom index of an atom word.
    #[inline]
    #[must_use]
    pub const fn atom_value(self) -> Atom {
        Atom::from_index(self.payload() as u32)
    }

    /// Name of a functor cell.
    #[inline]
    #[must_use]
    pub const fn functor_name(self) -> Atom {
        Atom::from_index((self.payload() >> ARITY_BITS) as u32)
    }

    /// Arity of a functor cell.
    #[inline]
    #[must_use]
    pub const fn functor_arity(self) -> usize {
        (self.payload() & MAX_ARITY as u64) as usize
    }

    /// Total cell count of the block this word heads: `n + 2` for an
    /// indirect header announcing `n` payload words, 1 otherwise.
    #[inline]
    #[must_use]
    pub const fn cell_size(self) -> usize {
        if self.is_indirect_header() {
            self.address() + 2
        } else {
            1
        }
    }

    /// Global address this word points at, if any.
    ///
    /// Covers references, compounds, indirect pointers and attributed
    /// variables: every word the collector must relocate.
    #[inline]
    #[must_use]
    pub const fn global_target(self) -> Option<usize> {
        if matches!(self.storage(), Storage::Global) {
            Some(self.address())
        } else {
            None
        }
    }

    /// Local address this word points at, if any.
    #[inline]
    #[must_use]
    pub const fn local_target(self) -> Option<usize> {
        if matches!(self.storage(), Storage::Local) {
            Some(self.address())
        } else {
            None
        }
    }

    /// The same word pointing at `addr`.
    #[inline]
    #[must_use]
    pub const fn with_address(self, addr: usize) -> Self {
        Self(((addr as u64) << PAYLOAD_SHIFT) | (self.0 & LOW_MASK))
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_var() {
            return write!(f, "Var");
        }
        match self.storage() {
            Storage::Inline if self.is_small_int() => write!(f, "Int({})", self.small_int_value()),
            Storage::Inline => write!(f, "{:?}({})", self.tag(), self.payload()),
            Storage::Global => write!(f, "{:?}(G:{})", self.tag(), self.address()),
            Storage::Local => write!(f, "{:?}(L:{})", self.tag(), self.address()),
            Storage::Reserved if self.is_functor() => write!(
                f,
                "Functor({}/{})",
                self.functor_name().index(),
                self.functor_arity()
            ),
            Storage::Reserved => write!(f, "Header({:?}, {})", self.tag(), self.payload()),
        }
    }
}
