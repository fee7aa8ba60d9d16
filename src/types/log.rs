/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Log entries and the in-memory window of the replicated log that view accounting operates over.
//!
//! ## Positions
//!
//! A [`Log`] holds the entries at positions `first()..last()`. `last()` is one past the final entry,
//! so an empty log has `first() == last()`. Positions before `first()` have been trimmed away; the
//! replica group only ever trims positions that a quorum has acknowledged.
//!
//! ## Comparing logs
//!
//! [`Log::digest`] folds a range of entries into one [`CryptoHash`], and [`Log::matching_logno`]
//! finds the first position at which a peer's entries diverge from ours. Either result can be fed
//! into [`View::set_matching_logno`](crate::view::View::set_matching_logno).

use std::{
    collections::VecDeque,
    fmt::{self, Display, Formatter},
};

use borsh::{BorshDeserialize, BorshSerialize};
use serde_json::Value;
use sha2::{Digest, Sha256 as CryptoHasher};

use super::data_types::{CryptoHash, LogNumber, ViewNumber};

/// One operation proposed for a specific log slot during a specific view.
///
/// An entry whose request is `null` is [empty](Self::is_empty): it fills a hole in the log that has
/// not been proposed yet.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    request: Value,
    viewno: ViewNumber,
}

impl LogEntry {
    /// Create a new `LogEntry` for `request`, proposed in `viewno`.
    pub fn new(request: Value, viewno: ViewNumber) -> Self {
        Self { request, viewno }
    }

    /// Create a placeholder entry.
    pub fn empty() -> Self {
        Self {
            request: Value::Null,
            viewno: ViewNumber::init(),
        }
    }

    /// Check whether this entry is a placeholder.
    pub fn is_empty(&self) -> bool {
        self.request.is_null()
    }

    /// Get the client request carried by this entry.
    pub fn request(&self) -> &Value {
        &self.request
    }

    /// Get the view in which this entry was proposed.
    pub fn viewno(&self) -> ViewNumber {
        self.viewno
    }

    /// Compute the SHA-256 hash of the borsh encoding of this entry.
    pub fn hash(&self) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(&LogEntryBytes::from(self).try_to_vec().unwrap());
        CryptoHash::new(hasher.finalize().into())
    }
}

impl Default for LogEntry {
    fn default() -> Self {
        LogEntry::empty()
    }
}

impl Display for LogEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "~empty~")
        } else {
            write!(f, "{}@{}", self.request, self.viewno)
        }
    }
}

/// Intermediate representation of [`LogEntry`] for serialization with borsh.
///
/// ## Rationale
///
/// `serde_json::Value` does not implement the borsh traits, so the request is carried as its JSON
/// text. Converting back into a `LogEntry` re-parses that text, and is therefore fallible.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct LogEntryBytes {
    request: String,
    viewno: ViewNumber,
}

impl From<&LogEntry> for LogEntryBytes {
    fn from(entry: &LogEntry) -> Self {
        LogEntryBytes {
            request: entry.request.to_string(),
            viewno: entry.viewno,
        }
    }
}

impl TryFrom<LogEntryBytes> for LogEntry {
    type Error = serde_json::Error;

    fn try_from(value: LogEntryBytes) -> Result<Self, Self::Error> {
        Ok(LogEntry {
            request: serde_json::from_str(&value.request)?,
            viewno: value.viewno,
        })
    }
}

/// In-memory window onto the replicated log.
#[derive(Clone, Debug, PartialEq)]
pub struct Log {
    first: LogNumber,
    entries: VecDeque<LogEntry>,
    trim: bool,
}

impl Log {
    /// Create an empty log whose next entry will be stored at `first`.
    ///
    /// If `trim` is false, [`trim_before`](Self::trim_before) keeps every entry. Replicas pass
    /// [`Constants::trim_log`](crate::config::Constants::trim_log) here.
    pub fn new(first: LogNumber, trim: bool) -> Self {
        Self {
            first,
            entries: VecDeque::new(),
            trim,
        }
    }

    /// Get the position of the oldest entry still held.
    pub fn first(&self) -> LogNumber {
        self.first
    }

    /// Get the position one past the newest entry.
    pub fn last(&self) -> LogNumber {
        self.first + self.entries.len() as u64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether `logno` is held in this log.
    pub fn contains(&self, logno: LogNumber) -> bool {
        self.first <= logno && logno < self.last()
    }

    /// Get the entry at `logno`, if it is held in this log.
    pub fn get(&self, logno: LogNumber) -> Option<&LogEntry> {
        if self.contains(logno) {
            self.entries.get((logno - self.first) as usize)
        } else {
            None
        }
    }

    /// Append `entry` to the end of the log and return its position.
    pub fn append(&mut self, entry: LogEntry) -> LogNumber {
        let logno = self.last();
        self.entries.push_back(entry);
        logno
    }

    /// Store `entry` at `logno`, overwriting what was there.
    ///
    /// If `logno` lies beyond the end of the log, the gap is filled with [empty](LogEntry::empty)
    /// entries.
    ///
    /// # Errors
    ///
    /// [`LogError::Trimmed`] if `logno` was already trimmed away.
    pub fn set(&mut self, logno: LogNumber, entry: LogEntry) -> Result<(), LogError> {
        if logno < self.first {
            return Err(LogError::Trimmed {
                logno,
                first: self.first,
            });
        }
        while self.last() < logno {
            self.entries.push_back(LogEntry::empty());
        }
        let index = (logno - self.first) as usize;
        if index == self.entries.len() {
            self.entries.push_back(entry);
        } else {
            self.entries[index] = entry;
        }
        Ok(())
    }

    /// Remove every entry at or after `logno`.
    pub fn truncate(&mut self, logno: LogNumber) {
        let keep = logno.max(self.first) - self.first;
        self.entries.truncate(keep as usize);
    }

    /// Remove every entry before `logno`, unless trimming is disabled for this log.
    ///
    /// Trimming past the end of the log leaves an empty log whose next entry goes to `logno`.
    pub fn trim_before(&mut self, logno: LogNumber) {
        if !self.trim || logno <= self.first {
            return;
        }
        let drop = (logno - self.first).min(self.entries.len() as u64);
        self.entries.drain(..drop as usize);
        self.first = logno;
    }

    /// Iterate through the entries in this log together with their positions.
    pub fn iter(&self) -> impl Iterator<Item = (LogNumber, &LogEntry)> {
        let first = self.first;
        self.entries
            .iter()
            .enumerate()
            .map(move |(i, entry)| (first + i as u64, entry))
    }

    /// Fold the hashes of the entries at `from..to` into a single chained digest.
    ///
    /// Two replicas whose logs hold identical entries over the range compute identical digests.
    ///
    /// # Errors
    ///
    /// [`LogError::OutOfRange`] if any part of `from..to` is not held in this log.
    pub fn digest(&self, from: LogNumber, to: LogNumber) -> Result<CryptoHash, LogError> {
        if from < self.first || to > self.last() || from > to {
            return Err(LogError::OutOfRange {
                from,
                to,
                first: self.first,
                last: self.last(),
            });
        }

        let mut digest = CryptoHash::new([0u8; 32]);
        let mut logno = from;
        while logno < to {
            let mut hasher = CryptoHasher::new();
            hasher.update(digest.bytes());
            hasher.update(self.entries[(logno - self.first) as usize].hash().bytes());
            digest = CryptoHash::new(hasher.finalize().into());
            logno = logno.next();
        }
        Ok(digest)
    }

    /// Compare `entries`, which a peer holds starting at position `first`, against this log, and
    /// return the position of the first slot at which they differ.
    ///
    /// Every slot below the returned position is known to match. Comparison stops at the end of
    /// either log, and never starts below this log's `first()`. If the peer's entries start past
    /// our `last()`, the slots in between were never compared and the result is our `last()`.
    pub fn matching_logno(&self, first: LogNumber, entries: &[LogEntry]) -> LogNumber {
        let mut logno = first.max(self.first);
        if logno > self.last() {
            return self.last();
        }
        let skip = (logno - first) as usize;
        for theirs in entries.iter().skip(skip) {
            match self.get(logno) {
                Some(ours) if ours == theirs => logno = logno.next(),
                _ => break,
            }
        }
        logno
    }
}

/// Enumerates the ways accessing a [`Log`] by position can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// The requested position was already trimmed away.
    Trimmed { logno: LogNumber, first: LogNumber },

    /// The requested range is not fully held in the log.
    OutOfRange {
        from: LogNumber,
        to: LogNumber,
        first: LogNumber,
        last: LogNumber,
    },
}

impl Display for LogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LogError::Trimmed { logno, first } => {
                write!(f, "log position {} was trimmed (log starts at {})", logno, first)
            }
            LogError::OutOfRange {
                from,
                to,
                first,
                last,
            } => write!(
                f,
                "log range {}..{} is outside the held range {}..{}",
                from, to, first, last
            ),
        }
    }
}

impl std::error::Error for LogError {}
