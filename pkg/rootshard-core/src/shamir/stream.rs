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

use digest::Digest;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

const DIGEST_LENGTH: usize = 32;

/// A reproducible byte stream derived from a seed by repeated hashing.
///
/// The stream starts as `SHA-256(seed)`. Once those bytes have been handed
/// out, the internal block is replaced by `SHA-256(block)` and reading
/// continues. Two streams with the same seed yield byte-for-byte identical
/// output regardless of how the reads are chunked.
///
/// This is **not** a general-purpose CSPRNG. It only exists so that share
/// splitting can be recomputed from the root key alone, and it should never
/// be used where fresh randomness is required.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DeterministicStream {
    block: [u8; DIGEST_LENGTH],
    pos: usize,
}

impl DeterministicStream {
    pub fn new<B: AsRef<[u8]>>(seed: B) -> Self {
        Self {
            block: Sha256::digest(seed.as_ref()).into(),
            pos: 0,
        }
    }

    /// Fill `buf` from the stream, returning the number of bytes written
    /// (which is always `buf.len()`).
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut written = 0;
        while written < buf.len() {
            if self.pos == DIGEST_LENGTH {
                self.block = Sha256::digest(self.block).into();
                self.pos = 0;
            }
            let n = (buf.len() - written).min(DIGEST_LENGTH - self.pos);
            buf[written..written + n].copy_from_slice(&self.block[self.pos..self.pos + n]);
            self.pos += n;
            written += n;
        }
        written
    }
}

impl RngCore for DeterministicStream {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.read(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.read(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.read(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.read(dest);
        Ok(())
    }
}

// The output is a hash chain over secret input, so it is as unpredictable as
// the seed. The marker lets it feed APIs that insist on a CryptoRng.
impl CryptoRng for DeterministicStream {}
