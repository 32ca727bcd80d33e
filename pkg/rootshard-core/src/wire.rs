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

//! Byte and text encodings for the artifacts that leave this crate (shares
//! handed to keepers, sealed root keys).

// TODO: Switch the errors from String to a proper thiserror error type.

pub trait ToWire {
    fn to_wire(&self) -> Vec<u8>;

    /// Convert a `ToWire`-implementing type to a multibase string.
    fn to_wire_multibase(&self, base: multibase::Base) -> String {
        multibase::encode(base, self.to_wire())
    }
}

pub trait FromWire: Sized {
    fn from_wire_partial(input: &[u8]) -> Result<(&[u8], Self), String>;

    fn from_wire<B: AsRef<[u8]>>(input: B) -> Result<Self, String> {
        match Self::from_wire_partial(input.as_ref())? {
            ([], ret) => Ok(ret),
            _ => Err("trailing bytes left after deserialisation".into()),
        }
    }

    /// Parse a multibase-encoded representation of a `FromWire`-implementing
    /// type as that type. Whitespace is ignored, so a share can be pasted
    /// across multiple lines.
    fn from_wire_multibase<S: AsRef<str>>(input: S) -> Result<Self, String> {
        let input = input
            .as_ref()
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<String>();
        let (_, data) = multibase::decode(input).map_err(|err| format!("{:?}", err))?;
        Self::from_wire(data)
    }
}
