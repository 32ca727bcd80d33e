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

//! Nothing in this crate terminates the process on its own. Every failure is
//! returned as an [`Error`], and it is up to the call site to decide what to
//! do with it. Hosts that cannot do anything sensible with one (which is the
//! normal case for a service that was about to distribute shares) should hand
//! it to [`exit`] rather than logging and carrying on.

use crate::Error;

use std::process;

/// Exit status used when terminating on an unrecoverable error.
pub const EXIT_STATUS: i32 = 1;

/// Emit a structured `error` event describing `err`.
pub fn report(err: &Error) {
    tracing::error!(code = err.code(), "fatal: {}", err);
}

/// Report `err` and terminate the process.
///
/// Destructors of anything still alive on the stack do *not* run after this.
/// Secrets must already have been scrubbed by the code that returned `err`.
pub fn exit(err: Error) -> ! {
    report(&err);
    std::mem::drop(err);
    process::exit(EXIT_STATUS)
}

/// Fail-fast unwrapping of results from this crate.
pub trait OrExit<T> {
    /// Return the success value, or [`exit`] with the error.
    fn or_exit(self) -> T;
}

impl<T> OrExit<T> for Result<T, Error> {
    fn or_exit(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => exit(err),
        }
    }
}
