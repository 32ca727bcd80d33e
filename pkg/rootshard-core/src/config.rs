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

use std::env;

/// Environment variable holding the total number of shares to emit.
pub const SHARES_ENV: &str = "ROOTSHARD_SHAMIR_SHARES";

/// Environment variable holding the number of shares needed to reconstruct
/// the root secret.
pub const THRESHOLD_ENV: &str = "ROOTSHARD_SHAMIR_THRESHOLD";

/// Secret-sharing parameters supplied by the host.
///
/// The fields are deliberately not validated on construction: the host's
/// configuration layer is free to hand us nonsense, and every operation in
/// this crate re-checks [`Config::validate`] before it touches a secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Total number of shares to produce (`N`).
    pub shares: u32,
    /// Minimum number of shares required to reconstruct the secret. The
    /// splitting polynomial has degree `threshold - 1`.
    pub threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shares: Self::DEFAULT_SHARES,
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

impl Config {
    pub const DEFAULT_SHARES: u32 = 3;
    pub const DEFAULT_THRESHOLD: u32 = 2;

    /// Share indices are a single byte on the wire, so this is the most
    /// shares a root key can be split into.
    pub const MAX_SHARES: u32 = u8::MAX as u32;

    /// Construct a validated configuration.
    pub fn new(shares: u32, threshold: u32) -> Result<Self, Error> {
        let config = Self { shares, threshold };
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from [`SHARES_ENV`] and [`THRESHOLD_ENV`].
    ///
    /// Each value falls back to its default if it is unset, not an integer,
    /// or zero. Whether the two values are consistent with each other is not
    /// checked here.
    pub fn from_env() -> Self {
        Self {
            shares: env_or_default(SHARES_ENV, Self::DEFAULT_SHARES),
            threshold: env_or_default(THRESHOLD_ENV, Self::DEFAULT_THRESHOLD),
        }
    }

    /// Check that `threshold >= 1`, `shares >= threshold` and
    /// `shares <= MAX_SHARES`.
    pub fn validate(&self) -> Result<(), Error> {
        if self.threshold < 1 {
            return Err(Error::InvalidConfiguration("threshold must be at least 1"));
        }
        if self.shares < self.threshold {
            return Err(Error::InvalidConfiguration(
                "shares must be at least threshold",
            ));
        }
        if self.shares > Self::MAX_SHARES {
            return Err(Error::InvalidConfiguration("shares must be at most 255"));
        }
        Ok(())
    }
}

fn env_or_default(name: &str, fallback: u32) -> u32 {
    parse_or_default(name, env::var(name).ok().as_deref(), fallback)
}

fn parse_or_default(name: &str, value: Option<&str>, fallback: u32) -> u32 {
    match value.map(|v| v.trim().parse::<u32>()) {
        None => fallback,
        Some(Ok(n)) if n > 0 => n,
        Some(_) => {
            tracing::warn!(
                variable = name,
                fallback,
                "ignoring invalid shamir configuration value"
            );
            fallback
        }
    }
}
