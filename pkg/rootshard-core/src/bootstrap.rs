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
    config::Config,
    root_key::RootKey,
    shamir::{self, Share},
    Error,
};

use std::sync::{Mutex, PoisonError};

use rand::{rngs::OsRng, CryptoRng, RngCore};
use zeroize::Zeroize;

/// Mints the system's root key during first-time bootstrap.
///
/// Generating a root key twice would silently produce a second, unrelated
/// secret and orphan every share already handed out from the first one, so a
/// `RootShareGenerator` refuses to run more than once. The host should own a
/// single generator for the lifetime of its bootstrap phase (rather than
/// creating one per request).
#[derive(Debug, Default)]
pub struct RootShareGenerator {
    generated: Mutex<bool>,
}

impl RootShareGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`RootShareGenerator::generate_root_shares`] has already been
    /// called on this generator.
    pub fn has_generated(&self) -> bool {
        *self.generated.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fill `out_seed` with a brand-new root key from the operating system's
    /// secure random source and return its shares.
    ///
    /// `out_seed` is usually the caller's lock-protected root key storage.
    /// The scalar form of the key is dropped (and zeroed) before returning;
    /// callers that need it can rederive it from `out_seed`.
    pub fn generate_root_shares(
        &self,
        config: &Config,
        out_seed: &mut RootKey,
    ) -> Result<Vec<Share>, Error> {
        self.generate_root_shares_with(config, out_seed, &mut OsRng)
    }

    pub(crate) fn generate_root_shares_with<R: CryptoRng + RngCore + ?Sized>(
        &self,
        config: &Config,
        out_seed: &mut RootKey,
        rng: &mut R,
    ) -> Result<Vec<Share>, Error> {
        // Don't burn the one-shot on a configuration that can never work.
        config.validate()?;

        // Only hold the lock for the check-and-set, not for the share
        // computation. The flag stays set even if we fail below: every
        // failure past this point is fatal for the process anyway.
        {
            let mut generated = self.generated.lock().unwrap_or_else(PoisonError::into_inner);
            if *generated {
                return Err(Error::AlreadyGenerated);
            }
            *generated = true;
        }

        if let Err(err) = rng.try_fill_bytes(out_seed.as_mut_bytes()) {
            out_seed.zeroize();
            return Err(Error::Entropy(err));
        }

        // A key at or above the group order cannot be split. Don't leave it
        // behind in the caller's storage looking like a usable root key.
        let shares = match shamir::compute_shares(config, out_seed) {
            Ok((root_secret, shares)) => {
                std::mem::drop(root_secret);
                shares
            }
            Err(err) => {
                out_seed.zeroize();
                return Err(err);
            }
        };

        tracing::info!(
            shares = shares.len(),
            threshold = config.threshold,
            "generated new root key shares"
        );

        Ok(shares)
    }
}
