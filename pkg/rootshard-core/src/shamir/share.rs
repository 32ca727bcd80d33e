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
    root_key::{RootKey, ROOT_KEY_LENGTH},
    wire::{FromWire, ToWire},
    Error,
};

use std::fmt;

use p256::{
    elliptic_curve::{ff::PrimeField, subtle::ConstantTimeEq},
    FieldBytes, Scalar,
};
use zeroize::Zeroize;

/// Length (in bytes) of an encoded scalar.
pub(crate) const SCALAR_LENGTH: usize = 32;

/// The root key reinterpreted as a scalar in the NIST P-256 group.
///
/// This only lives for as long as it takes to compute or check shares. It is
/// zeroed on drop, compares in constant time, and is never printed.
pub struct RootSecret(Scalar);

impl RootSecret {
    /// Unmarshal the root key's bytes (big-endian) into a scalar. Keys that
    /// encode a value at or above the group order are rejected rather than
    /// silently reduced, since that can only mean the key has been corrupted.
    pub fn from_root_key(root_key: &RootKey) -> Result<Self, Error> {
        let mut repr = FieldBytes::clone_from_slice(root_key.as_bytes());
        let scalar: Option<Scalar> = Scalar::from_repr(repr).into();
        repr.as_mut_slice().zeroize();
        scalar.map(Self).ok_or(Error::InvalidRootKey)
    }

    pub(crate) fn from_scalar(scalar: Scalar) -> Self {
        Self(scalar)
    }

    pub fn as_scalar(&self) -> &Scalar {
        &self.0
    }

    /// Marshal the secret back into root key bytes.
    pub fn to_root_key(&self) -> RootKey {
        let mut repr = self.0.to_repr();
        let mut bytes = [0u8; ROOT_KEY_LENGTH];
        bytes.copy_from_slice(&repr);
        repr.as_mut_slice().zeroize();
        RootKey::from(bytes)
    }
}

impl PartialEq for RootSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for RootSecret {}

impl Drop for RootSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// This is a secret. Let's not print it.
impl fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSecret").finish_non_exhaustive()
    }
}

/// One point on the splitting polynomial, destined for a single keeper.
///
/// `index` is the x value (starting at 1, never 0) and `value` is the
/// polynomial evaluated there.
#[derive(Clone)]
pub struct Share {
    pub(super) index: u8,
    pub(super) value: Scalar,
}

impl Share {
    /// Size of the wire encoding: a 1-byte index followed by the 32-byte
    /// big-endian scalar value. This is the same layout `vsss-rs` uses for
    /// its byte-vector shares.
    pub const WIRE_LENGTH: usize = 1 + SCALAR_LENGTH;

    pub(super) fn new(index: u8, value: Scalar) -> Self {
        Self { index, value }
    }

    /// Returns the *unique* identifier of this `Share`. Two shares with the
    /// same index cannot be used together for reconstruction.
    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn value(&self) -> &Scalar {
        &self.value
    }
}

impl PartialEq for Share {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && bool::from(self.value.ct_eq(&other.value))
    }
}

impl Eq for Share {}

impl Zeroize for Share {
    fn zeroize(&mut self) {
        self.index.zeroize();
        self.value.zeroize();
    }
}

impl Drop for Share {
    fn drop(&mut self) {
        self.zeroize();
    }
}

// We don't want to risk debug-logging the actual share contents, so only
// the index is printed.
impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl ToWire for Share {
    fn to_wire(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::WIRE_LENGTH);
        bytes.push(self.index);
        bytes.extend_from_slice(&self.value.to_repr());
        bytes
    }
}

impl FromWire for Share {
    fn from_wire_partial(input: &[u8]) -> Result<(&[u8], Self), String> {
        use nom::{
            bytes::complete::take, combinator::complete, number::complete::be_u8,
            sequence::tuple, IResult,
        };

        fn parse(input: &[u8]) -> IResult<&[u8], (u8, &[u8])> {
            tuple((be_u8, take(SCALAR_LENGTH)))(input)
        }
        let mut parse = complete(parse);

        let (input, (index, value)) = parse(input).map_err(|err| format!("{:?}", err))?;

        if index == 0 {
            return Err("share index must be non-zero".into());
        }
        let value: Option<Scalar> = Scalar::from_repr(FieldBytes::clone_from_slice(value)).into();
        let value = value.ok_or_else(|| "share value is not a valid p256 scalar".to_string())?;

        Ok((input, Share { index, value }))
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for Share {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self {
            index: u8::arbitrary(g).max(1),
            value: Scalar::from(u64::arbitrary(g)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use multibase::Base;

    #[quickcheck]
    fn share_wire_roundtrip(share: Share) -> bool {
        let bytes = share.to_wire();
        bytes.len() == Share::WIRE_LENGTH && Share::from_wire(&bytes).unwrap() == share
    }

    #[test]
    fn share_multibase_tolerates_whitespace() {
        let share = Share::new(3, Scalar::from(0xdead_beefu64));
        let encoded = share.to_wire_multibase(Base::Base32Z);
        let (head, tail) = encoded.split_at(encoded.len() / 2);
        let wrapped = format!("  {}\n{} \n", head, tail);
        assert_eq!(Share::from_wire_multibase(wrapped).unwrap(), share);
    }

    #[test]
    fn share_rejects_zero_index() {
        let mut bytes = Share::new(1, Scalar::ONE).to_wire();
        bytes[0] = 0;
        assert!(Share::from_wire(bytes).is_err());
    }

    #[test]
    fn share_rejects_out_of_range_value() {
        let mut bytes = Share::new(1, Scalar::ONE).to_wire();
        bytes[1..].fill(0xff);
        assert!(Share::from_wire(bytes).is_err());
    }

    #[test]
    fn share_rejects_truncated_and_trailing() {
        let bytes = Share::new(1, Scalar::ONE).to_wire();
        assert!(Share::from_wire(&bytes[..Share::WIRE_LENGTH - 1]).is_err());

        let mut long = bytes.clone();
        long.push(0);
        assert!(Share::from_wire(long).is_err());
    }

    #[test]
    fn debug_is_redacted() {
        let secret = RootSecret::from_scalar(Scalar::from(0x1234_5678u64));
        assert_eq!(format!("{:?}", secret), "RootSecret { .. }");

        let share = Share::new(7, Scalar::from(0x1234_5678u64));
        assert_eq!(format!("{:?}", share), "Share { index: 7, .. }");
    }

    #[test]
    fn root_secret_rejects_out_of_range_key() {
        let key = RootKey::from([0xff; ROOT_KEY_LENGTH]);
        assert!(matches!(
            RootSecret::from_root_key(&key),
            Err(Error::InvalidRootKey)
        ));
    }

    #[quickcheck]
    fn root_secret_roundtrip(value: u64) -> bool {
        let secret = RootSecret::from_scalar(Scalar::from(value));
        let key = secret.to_root_key();
        RootSecret::from_root_key(&key).unwrap() == secret
    }

    #[test]
    fn root_secret_big_endian() {
        let mut bytes = [0u8; ROOT_KEY_LENGTH];
        bytes[ROOT_KEY_LENGTH - 1] = 7;
        let secret = RootSecret::from_root_key(&RootKey::from(bytes)).unwrap();
        assert_eq!(*secret.as_scalar(), Scalar::from(7u64));
    }
}
