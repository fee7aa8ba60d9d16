/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Number and byte newtypes that identify views, log positions, and log digests.

use std::{
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
    ops::{Add, AddAssign, Sub},
};

use borsh::{BorshDeserialize, BorshSerialize};

/// View number.
///
/// Starts at 0 and increases by 1 every time a replica group [advances](crate::view::View::advance)
/// into a new view. Zero is reserved to mean "no view", so [`next`](Self::next) never returns it.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ViewNumber(u64);

impl ViewNumber {
    /// Create a new `ViewNumber` wrapping `int`.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the initial `ViewNumber`, which is 0.
    pub const fn init() -> Self {
        Self(0)
    }

    /// Get the inner `u64` of this `ViewNumber`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Get the view number that follows this one. Wrapping around skips 0.
    pub fn next(&self) -> Self {
        match self.0.wrapping_add(1) {
            0 => Self(1),
            int => Self(int),
        }
    }
}

impl Display for ViewNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for ViewNumber {
    type Output = ViewNumber;

    fn add(self, rhs: u64) -> Self::Output {
        ViewNumber(self.0.add(rhs))
    }
}

/// Position of a slot in the replicated log.
///
/// Positions are totally ordered. The absence of a position (for example, a member that has not
/// acknowledged anything yet) is expressed as `Option<LogNumber>::None` rather than with a sentinel.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct LogNumber(u64);

impl LogNumber {
    /// Create a new `LogNumber` wrapping `int`.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the position of the first slot of an empty log, which is 0.
    pub const fn init() -> Self {
        Self(0)
    }

    /// Get the inner `u64` of this `LogNumber`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Get the position directly after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for LogNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for LogNumber {
    type Output = LogNumber;

    fn add(self, rhs: u64) -> Self::Output {
        LogNumber(self.0.add(rhs))
    }
}

impl AddAssign<u64> for LogNumber {
    fn add_assign(&mut self, rhs: u64) {
        self.0.add_assign(rhs)
    }
}

impl Sub<LogNumber> for LogNumber {
    type Output = u64;

    fn sub(self, rhs: LogNumber) -> Self::Output {
        self.0 - rhs.0
    }
}

/// 32-byte SHA-256 hash.
///
/// Replicas compare these instead of shipping whole log ranges when they need to find out how much
/// of their logs agree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
