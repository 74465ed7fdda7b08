// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Payload encoding for indirect data blocks.
//!
//! These helpers only produce and consume payload words. Writing the
//! surrounding headers is the allocator's job.

use super::Word;

/// Payload of a bignum block (one word, two's complement).
#[must_use]
pub const fn integer_payload(value: i64) -> [Word; 1] {
    [Word::from_raw(value as u64)]
}

/// Decode a bignum payload.
#[must_use]
pub fn decode_integer(payload: &[Word]) -> Option<i64> {
    payload.first().map(|w| w.raw() as i64)
}

/// Payload of a float block (one word, IEEE-754 bits).
#[must_use]
pub const fn float_payload(value: f64) -> [Word; 1] {
    [Word::from_raw(value.to_bits())]
}

/// Decode a float payload.
#[must_use]
pub fn decode_float(payload: &[Word]) -> Option<f64> {
    payload.first().map(|w| f64::from_bits(w.raw()))
}

/// Number of payload words a string of `len` bytes needs.
#[must_use]
pub const fn string_payload_words(len: usize) -> usize {
    1 + len.div_ceil(8)
}

/// Payload of a string block: byte length, then bytes packed little-endian.
#[must_use]
pub fn string_payload(text: &str) -> Vec<Word> {
    let bytes = text.as_bytes();
    let mut payload = Vec::with_capacity(string_payload_words(bytes.len()));
    payload.push(Word::from_raw(bytes.len() as u64));
    for chunk in bytes.chunks(8) {
        let mut buf = [0u8; 8];
        buf[..chunk.len()].copy_from_slice(chunk);
        payload.push(Word::from_raw(u64::from_le_bytes(buf)));
    }
    payload
}

/// Decode a string payload. Invalid UTF-8 is replaced, a truncated block
/// yields `None`.
#[must_use]
pub fn decode_string(payload: &[Word]) -> Option<String> {
    let (len, words) = payload.split_first()?;
    let len = usize::try_from(len.raw()).ok()?;
    if words.len() < len.div_ceil(8) {
        return None;
    }
    let mut bytes: Vec<u8> = words.iter().flat_map(|w| w.raw().to_le_bytes()).collect();
    bytes.truncate(len);
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
