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

use crate::{
    wire::{FromWire, ToWire},
    Error,
};

use std::fmt;

use aead::{generic_array::GenericArray, Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub const SEAL_KEY_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;

/// An AES-256 key used to seal secrets at rest.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SealKey([u8; SEAL_KEY_LENGTH]);

impl SealKey {
    /// Generate a new random key.
    pub fn generate() -> Result<Self, Error> {
        let mut key = Self([0; SEAL_KEY_LENGTH]);
        OsRng.try_fill_bytes(&mut key.0).map_err(Error::Entropy)?;
        Ok(key)
    }

    pub fn from_slice<B: AsRef<[u8]>>(bytes: B) -> Result<Self, Error> {
        let bytes = bytes.as_ref();
        if bytes.len() != SEAL_KEY_LENGTH {
            return Err(Error::InvalidConfiguration(
                "seal key must be exactly 32 bytes",
            ));
        }
        let mut key = Self([0; SEAL_KEY_LENGTH]);
        key.0.copy_from_slice(bytes);
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8; SEAL_KEY_LENGTH] {
        &self.0
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(GenericArray::from_slice(&self.0))
    }
}

impl fmt::Debug for SealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealKey").finish_non_exhaustive()
    }
}

/// AES-256-GCM ciphertext together with the nonce it was sealed under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sealed {
    nonce: [u8; NONCE_LENGTH],
    ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal<B: AsRef<[u8]>>(key: &SealKey, plaintext: B) -> Result<Sealed, Error> {
    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.try_fill_bytes(&mut nonce).map_err(Error::Entropy)?;

    let ciphertext = key
        .cipher()
        .encrypt(GenericArray::from_slice(&nonce), plaintext.as_ref())
        .map_err(Error::Aead)?;

    Ok(Sealed { nonce, ciphertext })
}

/// Decrypt and authenticate `sealed` under `key`.
pub fn open(key: &SealKey, sealed: &Sealed) -> Result<Zeroizing<Vec<u8>>, Error> {
    key.cipher()
        .decrypt(
            GenericArray::from_slice(&sealed.nonce),
            sealed.ciphertext.as_slice(),
        )
        .map(Zeroizing::new)
        .map_err(Error::Aead)
}

impl ToWire for Sealed {
    fn to_wire(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(NONCE_LENGTH + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }
}

impl FromWire for Sealed {
    fn from_wire_partial(input: &[u8]) -> Result<(&[u8], Self), String> {
        use nom::{bytes::complete::take, combinator::rest, sequence::pair, IResult};

        fn parse(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
            pair(take(NONCE_LENGTH), rest)(input)
        }

        let (input, (nonce_bytes, ciphertext)) =
            parse(input).map_err(|err| format!("{:?}", err))?;

        let mut nonce = [0u8; NONCE_LENGTH];
        nonce.copy_from_slice(nonce_bytes);

        Ok((
            input,
            Sealed {
                nonce,
                ciphertext: ciphertext.to_vec(),
            },
        ))
    }
}
