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

//! This package implements deterministic Shamir Secret Sharing of a 32-byte
//! root key over the scalar field of the NIST P-256 curve.
//!
//! The root key is interpreted as a (big-endian) scalar and used as the
//! constant term of a random polynomial of degree `threshold - 1`. Share `i`
//! is the polynomial evaluated at `x = i`, for `i` in `1..=shares`. The
//! polynomial's other coefficients are drawn from a [`DeterministicStream`]
//! seeded with the root key, so the same key and configuration always yield
//! the same shares.
//!
//! ## Security ##
//! Splitting and Lagrange reconstruction are done by the `vsss-rs` crate, and
//! the field arithmetic underneath it by `p256`. This module only converts
//! between our types and theirs, and checks the things `vsss-rs` does not
//! know about (the configured threshold, and share count limits).

mod dealer;
mod share;
mod stream;

pub use dealer::{compute_shares, recover_secret, verify_reconstruction};
pub use share::{RootSecret, Share};
pub use stream::DeterministicStream;
