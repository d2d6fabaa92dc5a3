//-
// Copyright (c) 2017 Jason Lingle
//
// Permission to  use, copy,  modify, and/or distribute  this software  for any
// purpose  with or  without fee  is hereby  granted, provided  that the  above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE  IS PROVIDED "AS  IS" AND  THE AUTHOR DISCLAIMS  ALL WARRANTIES
// WITH  REGARD   TO  THIS  SOFTWARE   INCLUDING  ALL  IMPLIED   WARRANTIES  OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT  SHALL THE AUTHOR BE LIABLE FOR ANY
// SPECIAL,  DIRECT,   INDIRECT,  OR  CONSEQUENTIAL  DAMAGES   OR  ANY  DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN ACTION
// OF  CONTRACT, NEGLIGENCE  OR OTHER  TORTIOUS ACTION,  ARISING OUT  OF OR  IN
// CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.

use std::cell::Cell;
use std::fmt;

/// Remembers the result of a function of time for exactly one time value.
///
/// Asking for the same time again returns the remembered value; asking for
/// any other time recomputes and evicts the old entry. Times are compared
/// bitwise, so `0.0` and `-0.0` are different keys and NaN equals itself.
///
/// The slot is a `Cell` so lookups can fill it through a shared reference.
/// This makes anything holding a `MonoMemory` `!Sync`.
pub struct MonoMemory<V: Copy> {
    slot: Cell<Option<(u64, V)>>,
}

impl<V: Copy> MonoMemory<V> {
    pub fn new() -> Self {
        MonoMemory { slot: Cell::new(None) }
    }

    /// Returns the remembered value for `key`, if that is the key currently
    /// held.
    pub fn get(&self, key: f64) -> Option<V> {
        match self.slot.get() {
            Some((k, v)) if k == key.to_bits() => Some(v),
            _ => None,
        }
    }

    /// Returns the remembered value for `key`, or computes it with `f` and
    /// remembers it if `f` succeeds. A failure leaves the slot as it was.
    pub fn get_or_try_insert_with<E, F>(&self, key: f64, f: F)
                                        -> Result<V, E>
    where F: FnOnce() -> Result<V, E> {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }

        let v = f()?;
        self.slot.set(Some((key.to_bits(), v)));
        Ok(v)
    }

    /// Forgets the remembered value.
    pub fn clear(&self) {
        self.slot.set(None);
    }
}

impl<V: Copy> Default for MonoMemory<V> {
    fn default() -> Self {
        MonoMemory::new()
    }
}

// Cloning a memo yields an empty one; the clone may be evaluated against
// different state.
impl<V: Copy> Clone for MonoMemory<V> {
    fn clone(&self) -> Self {
        MonoMemory::new()
    }
}

impl<V: Copy> fmt::Debug for MonoMemory<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.slot.get() {
            Some((k, _)) => write!(f, "MonoMemory(@{})", f64::from_bits(k)),
            None => write!(f, "MonoMemory(empty)"),
        }
    }
}
