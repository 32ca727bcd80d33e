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
    shamir::{
        share::{RootSecret, Share},
        stream::DeterministicStream,
    },
    wire::{FromWire, ToWire},
    Error,
};

use p256::{elliptic_curve::subtle::ConstantTimeEq, Scalar};
use vsss_rs::shamir;
use zeroize::Zeroize;

/// Split `root_key` into `config.shares` shares, any `config.threshold` of
/// which reconstruct the root secret.
///
/// Splitting is deterministic: the polynomial coefficients are drawn from a
/// [`DeterministicStream`] seeded with the root key itself. Shamir's scheme
/// only relies on the secrecy of the shares (not of the splitting
/// randomness), and determinism means a restarted service can recompute the
/// exact shares it handed out without having persisted them.
///
/// The freshly computed shares are checked with [`verify_reconstruction`]
/// before they are returned. The caller owns (and must drop) both the
/// returned secret and the shares once they have been handed off.
pub fn compute_shares(
    config: &Config,
    root_key: &RootKey,
) -> Result<(RootSecret, Vec<Share>), Error> {
    config.validate()?;
    if root_key.is_zero() {
        return Err(Error::EmptyRootKey);
    }

    let root_secret = RootSecret::from_root_key(root_key)?;

    let mut stream = DeterministicStream::new(root_key.as_bytes());
    let shares = split(config, root_secret.as_scalar(), &mut stream)?;

    verify_reconstruction(config, &root_secret, &shares)?;

    tracing::debug!(
        shares = config.shares,
        threshold = config.threshold,
        "computed and verified root key shares"
    );

    Ok((root_secret, shares))
}

/// Check that the first `config.threshold` of `shares` reconstruct
/// `expected`.
///
/// This is a sanity check for shares we have just produced. It is not how a
/// real recovery works (there the secret is unknown, see [`recover_secret`]).
/// Any failure here means splitting or reconstruction is broken, and the
/// shares must not be distributed.
pub fn verify_reconstruction(
    config: &Config,
    expected: &RootSecret,
    shares: &[Share],
) -> Result<(), Error> {
    let mut reconstructed = reconstruct(config, shares)?;

    let matches = bool::from(reconstructed.ct_eq(expected.as_scalar()));
    reconstructed.zeroize();
    if !matches {
        return Err(Error::VerificationMismatch);
    }

    tracing::debug!(threshold = config.threshold, "verified share reconstruction");
    Ok(())
}

/// Reconstruct the root secret from the first `config.threshold` of
/// `shares`, as done during disaster recovery.
///
/// There is nothing to compare the result against, so a successful
/// reconstruction is all the validation there is. Shares must have distinct
/// indices. Passing fewer than `config.threshold` shares is an error.
///
/// Only `config.threshold` is consulted: the share count used when the
/// shares were produced is irrelevant to recovery.
pub fn recover_secret(config: &Config, shares: &[Share]) -> Result<RootSecret, Error> {
    let secret = RootSecret::from_scalar(reconstruct(config, shares)?);

    tracing::debug!(
        threshold = config.threshold,
        provided = shares.len(),
        "recovered root secret from shares"
    );

    Ok(secret)
}

fn split(
    config: &Config,
    secret: &Scalar,
    rng: &mut DeterministicStream,
) -> Result<Vec<Share>, Error> {
    let shares = 1..=config.shares as u8;

    // A threshold of one is a constant polynomial, which vsss-rs refuses to
    // build. Every share is the secret itself.
    if config.threshold == 1 {
        return Ok(shares.map(|index| Share::new(index, *secret)).collect());
    }

    let mut raw = shamir::split_secret::<Scalar, u8, Vec<u8>>(
        config.threshold as usize,
        config.shares as usize,
        *secret,
        rng,
    )
    .map_err(Error::Reconstruction)?;

    let decoded = raw
        .iter()
        .map(|bytes| Share::from_wire(bytes))
        .collect::<Result<Vec<_>, _>>();
    raw.iter_mut().for_each(Zeroize::zeroize);
    let decoded = decoded.map_err(Error::MalformedShare)?;

    if !decoded.iter().map(Share::index).eq(shares) {
        return Err(Error::MalformedShare(
            "share indices are not 1..=shares".into(),
        ));
    }
    Ok(decoded)
}

fn reconstruct(config: &Config, shares: &[Share]) -> Result<Scalar, Error> {
    let needed = match config.threshold {
        0 => return Err(Error::InvalidConfiguration("threshold must be at least 1")),
        threshold => threshold as usize,
    };
    if shares.len() < needed {
        return Err(Error::NotEnoughShares {
            needed,
            provided: shares.len(),
        });
    }
    let shares = &shares[..needed];

    let mut seen = [false; 256];
    for share in shares {
        let seen = &mut seen[usize::from(share.index())];
        if *seen {
            return Err(Error::DuplicateShareIndex(share.index()));
        }
        *seen = true;
    }

    // Mirror of the constant polynomial in split().
    if let [share] = shares {
        return Ok(*share.value());
    }

    let mut raw = shares.iter().map(ToWire::to_wire).collect::<Vec<_>>();
    let secret: Result<Scalar, vsss_rs::Error> = vsss_rs::combine_shares(raw.as_slice());
    raw.iter_mut().for_each(Zeroize::zeroize);
    secret.map_err(Error::Reconstruction)
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::root_key::ROOT_KEY_LENGTH;

    use itertools::Itertools;
    use quickcheck::TestResult;

    fn config(shares: u32, threshold: u32) -> Config {
        Config { shares, threshold }
    }

    #[test]
    fn default_scenario() {
        let config = Config::default();
        let root_key = RootKey::from([0x01; ROOT_KEY_LENGTH]);
        let expected = RootSecret::from_root_key(&root_key).unwrap();

        let (secret, shares) = compute_shares(&config, &root_key).unwrap();
        assert_eq!(secret, expected);
        assert_eq!(
            shares.iter().map(Share::index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        // Any two shares reconstruct the secret.
        for pair in shares.iter().cloned().combinations(2) {
            assert_eq!(recover_secret(&config, &pair).unwrap(), expected);
        }

        // A single share on its own does not.
        let single = single_share_guesses(&shares);
        assert!(single.iter().all(|s| *s != expected));
    }

    // Interpolating a single point as a constant polynomial is the best an
    // attacker with one share can do.
    fn single_share_guesses(shares: &[Share]) -> Vec<RootSecret> {
        shares
            .iter()
            .map(|s| recover_secret(&config(1, 1), std::slice::from_ref(s)).unwrap())
            .collect()
    }

    #[test]
    fn too_few_shares() {
        let config = config(5, 3);
        let root_key = RootKey::from([0x42; ROOT_KEY_LENGTH]);
        let (_, shares) = compute_shares(&config, &root_key).unwrap();
        match recover_secret(&config, &shares[..2]) {
            Err(err @ Error::NotEnoughShares {
                needed: 3,
                provided: 2,
            }) => assert_eq!(err.code(), "reconstruction_failed"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn recover_ignores_share_count() {
        let root_key = RootKey::from([0x42; ROOT_KEY_LENGTH]);
        let (secret, shares) = compute_shares(&config(5, 4), &root_key).unwrap();
        // A host that only knows the threshold still recovers.
        let recovered = recover_secret(&config(Config::DEFAULT_SHARES, 4), &shares[1..]).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn duplicate_shares() {
        let config = config(5, 3);
        let root_key = RootKey::from([0x42; ROOT_KEY_LENGTH]);
        let (_, shares) = compute_shares(&config, &root_key).unwrap();
        let dup = vec![shares[0].clone(), shares[1].clone(), shares[0].clone()];
        assert!(matches!(
            recover_secret(&config, &dup),
            Err(Error::DuplicateShareIndex(1))
        ));
    }

    #[test]
    fn threshold_one_shares_are_the_secret() {
        let config = config(4, 1);
        let root_key = RootKey::from([0x42; ROOT_KEY_LENGTH]);
        let (secret, shares) = compute_shares(&config, &root_key).unwrap();
        assert_eq!(
            shares.iter().map(Share::index).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(shares.iter().all(|s| s.value() == secret.as_scalar()));
    }

    #[test]
    fn too_many_shares() {
        let root_key = RootKey::from([0x01; ROOT_KEY_LENGTH]);
        assert!(matches!(
            compute_shares(&config(Config::MAX_SHARES + 1, 2), &root_key),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn max_shares() {
        let config = config(Config::MAX_SHARES, 3);
        let root_key = RootKey::from([0x01; ROOT_KEY_LENGTH]);
        let (secret, shares) = compute_shares(&config, &root_key).unwrap();
        assert_eq!(shares.len(), 255);
        assert_eq!(shares.last().map(Share::index), Some(255));
        assert_eq!(recover_secret(&config, &shares[252..]).unwrap(), secret);
    }

    #[test]
    fn empty_root_key() {
        let root_key = RootKey::from([0; ROOT_KEY_LENGTH]);
        let err = compute_shares(&Config::default(), &root_key).unwrap_err();
        assert!(matches!(err, Error::EmptyRootKey));
        assert_eq!(err.code(), "empty_root_key");
    }

    #[test]
    fn out_of_range_root_key() {
        let root_key = RootKey::from([0xff; ROOT_KEY_LENGTH]);
        let err = compute_shares(&Config::default(), &root_key).unwrap_err();
        assert!(matches!(err, Error::InvalidRootKey));
    }

    #[test]
    fn shares_below_threshold() {
        let root_key = RootKey::from([0x01; ROOT_KEY_LENGTH]);
        match compute_shares(&config(2, 3), &root_key) {
            Err(Error::InvalidConfiguration(msg)) => {
                assert_eq!(msg, "shares must be at least threshold")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn zero_threshold() {
        let root_key = RootKey::from([0x01; ROOT_KEY_LENGTH]);
        assert!(matches!(
            compute_shares(&config(3, 0), &root_key),
            Err(Error::InvalidConfiguration(_))
        ));

        let secret = RootSecret::from_root_key(&root_key).unwrap();
        assert!(matches!(
            verify_reconstruction(&config(3, 0), &secret, &[]),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn verification_mismatch() {
        let config = Config::default();
        let root_key = RootKey::from([0x01; ROOT_KEY_LENGTH]);
        let (_, shares) = compute_shares(&config, &root_key).unwrap();

        let other = RootSecret::from_root_key(&RootKey::from([0x02; ROOT_KEY_LENGTH])).unwrap();
        let err = verify_reconstruction(&config, &other, &shares).unwrap_err();
        assert!(matches!(err, Error::VerificationMismatch));
        assert_eq!(err.code(), "verification_mismatch");
    }

    #[test]
    fn verification_of_tampered_share() {
        let config = Config::default();
        let root_key = RootKey::from([0x01; ROOT_KEY_LENGTH]);
        let (secret, mut shares) = compute_shares(&config, &root_key).unwrap();
        shares[1].value += Scalar::ONE;
        assert!(matches!(
            verify_reconstruction(&config, &secret, &shares),
            Err(Error::VerificationMismatch)
        ));
    }

    #[quickcheck]
    fn compute_shares_deterministic(root_key: RootKey, shares: u8, threshold: u8) -> TestResult {
        let config = config(shares.into(), threshold.into());
        if config.validate().is_err() || root_key.is_zero() || shares > 32 {
            return TestResult::discard();
        }

        match (
            compute_shares(&config, &root_key),
            compute_shares(&config, &root_key),
        ) {
            (Ok((secret1, shares1)), Ok((secret2, shares2))) => {
                TestResult::from_bool(secret1 == secret2 && shares1 == shares2)
            }
            // Keys at or above the group order are rejected consistently.
            (Err(Error::InvalidRootKey), Err(Error::InvalidRootKey)) => TestResult::discard(),
            _ => TestResult::failed(),
        }
    }

    #[test]
    fn different_keys_different_shares() {
        let config = Config::default();
        let key1 = RootKey::from([0x01; ROOT_KEY_LENGTH]);
        let key2 = RootKey::from([0x02; ROOT_KEY_LENGTH]);
        let (_, shares1) = compute_shares(&config, &key1).unwrap();
        let (_, shares2) = compute_shares(&config, &key2).unwrap();
        assert!(shares1.iter().zip(&shares2).all(|(a, b)| a != b));
    }

    fn inner_any_subset_reconstructs(shares: u32, threshold: u32) -> bool {
        let config = config(shares, threshold);
        let mut bytes = [0u8; ROOT_KEY_LENGTH];
        bytes[0] = 0x13;
        bytes[1..].fill(shares as u8 ^ (threshold as u8).rotate_left(3));
        let root_key = RootKey::from(bytes);
        let (secret, shares) = compute_shares(&config, &root_key).unwrap();

        // Every subset of exactly `threshold` shares recovers the secret, no
        // matter which shares or in what order.
        let exact = shares
            .iter()
            .cloned()
            .combinations(threshold as usize)
            .all(|subset| {
                let mut subset = subset;
                subset.reverse();
                recover_secret(&config, &subset).unwrap() == secret
            });

        // Subsets smaller than the threshold (treated as if they were enough)
        // yield garbage.
        let short = threshold < 2
            || shares
                .iter()
                .cloned()
                .combinations(threshold as usize - 1)
                .all(|subset| {
                    let short_config = self::config(shares.len() as u32, threshold - 1);
                    recover_secret(&short_config, &subset).unwrap() != secret
                });

        exact && short
    }

    macro_rules! subset_test {
        ($func:ident, $shares:expr, $threshold:expr) => {
            #[test]
            fn $func() {
                assert!(inner_any_subset_reconstructs($shares, $threshold))
            }
        };
    }

    subset_test!(any_subset_reconstructs_1_of_1, 1, 1);
    subset_test!(any_subset_reconstructs_1_of_3, 3, 1);
    subset_test!(any_subset_reconstructs_2_of_3, 3, 2);
    subset_test!(any_subset_reconstructs_3_of_3, 3, 3);
    subset_test!(any_subset_reconstructs_3_of_5, 5, 3);
    subset_test!(any_subset_reconstructs_4_of_7, 7, 4);
    subset_test!(any_subset_reconstructs_5_of_9, 9, 5);
}
