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

#![forbid(unsafe_code)]

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

/// One-shot generation of a brand-new root key and its shares.
pub mod bootstrap;

/// Host-supplied share count and threshold.
pub mod config;

/// Fail-fast reporting of unrecoverable errors.
pub mod fatal;

/// The 32-byte root key that all shares are derived from.
pub mod root_key;

/// AES-256-GCM sealing of small secrets (such as a freshly minted root key).
pub mod seal;

/// Deterministic Shamir Secret Sharing of the root key over the NIST P-256
/// scalar field.
pub mod shamir;

pub mod wire;

pub use bootstrap::RootShareGenerator;
pub use config::Config;
pub use root_key::{RootKey, ROOT_KEY_LENGTH};
pub use shamir::{
    compute_shares, recover_secret, verify_reconstruction, DeterministicStream, RootSecret, Share,
};
pub use wire::{FromWire, ToWire};

/// Every error in this crate describes an integrity or configuration
/// violation. None of them are transient, and none of them should be retried
/// or silently tolerated: a caller that cannot handle one should pass it to
/// [`fatal::exit`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid shamir configuration: {0}")]
    InvalidConfiguration(&'static str),

    #[error("root key is empty (all bytes are zero)")]
    EmptyRootKey,

    #[error("root key must be {expected} bytes long (got {actual})")]
    RootKeyLength { expected: usize, actual: usize },

    #[error("root key is not a valid p256 scalar")]
    InvalidRootKey,

    #[error("need {needed} shares to reconstruct the secret (got {provided})")]
    NotEnoughShares { needed: usize, provided: usize },

    #[error("share index {0} was given more than once")]
    DuplicateShareIndex(u8),

    #[error("secret sharing failed: {0:?}")]
    Reconstruction(vsss_rs::Error),

    #[error("malformed share: {0}")]
    MalformedShare(String),

    #[error("[critical security issue] reconstructed secret does not match the root secret")]
    VerificationMismatch,

    #[error("root shares have already been generated by this process")]
    AlreadyGenerated,

    #[error("secure random source failed: {0}")]
    Entropy(rand::Error),

    #[error("aead cryptographic error: {0}")]
    Aead(aead::Error),
}

impl Error {
    /// Short machine-readable identifier for this class of error, used as the
    /// `code` field of the structured fatal log event.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::EmptyRootKey => "empty_root_key",
            Self::RootKeyLength { .. } | Self::InvalidRootKey => "invalid_root_key",
            Self::NotEnoughShares { .. }
            | Self::DuplicateShareIndex(_)
            | Self::Reconstruction(_)
            | Self::MalformedShare(_) => "reconstruction_failed",
            Self::VerificationMismatch => "verification_mismatch",
            Self::AlreadyGenerated => "root_shares_already_generated",
            Self::Entropy(_) => "entropy_unavailable",
            Self::Aead(_) => "aead",
        }
    }
}
