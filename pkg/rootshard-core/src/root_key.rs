/*
 * rootshard: deterministic shamir shares for a 32-byte root key
 * Copyright (C) 2018-2022 Aleksa Sarai <cyphar@cyphar.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::Error;

use std::fmt;

use p256::elliptic_curve::subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length (in bytes) of a [`RootKey`].
pub const ROOT_KEY_LENGTH: usize = 32;

/// The secret from which every share is derived.
///
/// A `RootKey` is usually kept in shared mutable state by the host service.
/// This crate does not lock it: callers must hold their own lock (typically a
/// `Mutex<RootKey>`) for the duration of any call that reads or writes it.
/// The bytes are zeroed when the `RootKey` is dropped.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct RootKey([u8; ROOT_KEY_LENGTH]);

impl RootKey {
    /// Copy a root key out of `bytes`, which must be exactly
    /// [`ROOT_KEY_LENGTH`] bytes long.
    pub fn from_slice<B: AsRef<[u8]>>(bytes: B) -> Result<Self, Error> {
        let bytes = bytes.as_ref();
        if bytes.len() != ROOT_KEY_LENGTH {
            return Err(Error::RootKeyLength {
                expected: ROOT_KEY_LENGTH,
                actual: bytes.len(),
            });
        }
        let mut key = Self::default();
        key.0.copy_from_slice(bytes);
        Ok(key)
    }

    /// Returns whether every byte of the key is zero. A zeroed key is what a
    /// caller ends up with if it never stored a real secret (or already
    /// scrubbed it), and must never be split.
    pub fn is_zero(&self) -> bool {
        self.0[..].ct_eq(&[0u8; ROOT_KEY_LENGTH][..]).into()
    }

    pub fn as_bytes(&self) -> &[u8; ROOT_KEY_LENGTH] {
        &self.0
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8; ROOT_KEY_LENGTH] {
        &mut self.0
    }
}

impl From<[u8; ROOT_KEY_LENGTH]> for RootKey {
    fn from(mut bytes: [u8; ROOT_KEY_LENGTH]) -> Self {
        let key = Self(bytes);
        bytes.zeroize();
        key
    }
}

// We don't want to risk debug-logging the actual key, so implement `Debug`
// manually.
impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootKey").finish_non_exhaustive()
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for RootKey {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let mut key = Self::default();
        key.0.fill_with(|| u8::arbitrary(g));
        key
    }
}
