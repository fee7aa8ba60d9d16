/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The per-member record a [`View`](super::View) keeps for each replica in its membership.

use std::time::Instant;

use serde_json::{Map, Value};

use crate::types::data_types::LogNumber;

/// One replica in a view's membership, together with the voting and acknowledgement state the view
/// has collected about it.
///
/// ## Peer names
///
/// A member may carry a `peer_name`: an object with contact information for the replica. Peer names
/// are kept canonical: a peer name always contains a `uid` field equal to the member's uid, and a
/// peer name that contains nothing else (or nothing at all) is stored as `None`.
///
/// ## Acknowledgements
///
/// `ackno` only moves forward. Every time it actually changes, `ackno_changed_at` is refreshed,
/// which lets a primary notice members that stopped acknowledging.
#[derive(Clone, Debug)]
pub struct Member {
    uid: String,
    peer_name: Option<Map<String, Value>>,
    pub(super) prepared: bool,
    pub(super) confirmed: bool,
    pub(super) ackno: Option<LogNumber>,
    ackno_changed_at: Option<Instant>,
    pub(super) matching_logno: Option<LogNumber>,
}

impl Member {
    /// Create a new `Member` with no voting or acknowledgement state.
    ///
    /// # Panics
    ///
    /// Panics if `peer_name` carries a `uid` field that differs from `uid`. Callers decoding peer
    /// names off the wire must reject such input first.
    pub fn new(uid: String, peer_name: Option<Map<String, Value>>) -> Self {
        let peer_name = clean_peer_name(&uid, peer_name);
        Self {
            uid,
            peer_name,
            prepared: false,
            confirmed: false,
            ackno: None,
            ackno_changed_at: None,
            matching_logno: None,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn peer_name(&self) -> Option<&Map<String, Value>> {
        self.peer_name.as_ref()
    }

    /// Check whether this member has responded to the current prepare round.
    pub fn prepared(&self) -> bool {
        self.prepared
    }

    /// Check whether this member has confirmed the current prepare round.
    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn has_ackno(&self) -> bool {
        self.ackno.is_some()
    }

    /// Get the highest log position this member has acknowledged, if any.
    pub fn ackno(&self) -> Option<LogNumber> {
        self.ackno
    }

    /// Get the time at which [`ackno`](Self::ackno) last changed, if it ever has.
    pub fn ackno_changed_at(&self) -> Option<Instant> {
        self.ackno_changed_at
    }

    /// Record that this member has acknowledged every position up to `ackno`.
    ///
    /// Acknowledgements lower than the one already recorded are ignored. Returns whether the
    /// recorded position changed; only then is `ackno_changed_at` set to `now`.
    pub fn set_ackno(&mut self, ackno: LogNumber, now: Instant) -> bool {
        match self.ackno {
            Some(old_ackno) if ackno <= old_ackno => false,
            _ => {
                self.ackno = Some(ackno);
                self.ackno_changed_at = Some(now);
                true
            }
        }
    }

    pub fn has_matching_logno(&self) -> bool {
        self.matching_logno.is_some()
    }

    /// Get the highest log position known to match the primary's log, if any.
    pub fn matching_logno(&self) -> Option<LogNumber> {
        self.matching_logno
    }

    /// Get the wire representation of this member: its peer name if it has one, else its uid.
    pub fn to_json(&self) -> Value {
        match &self.peer_name {
            Some(peer_name) => Value::Object(peer_name.clone()),
            None => Value::String(self.uid.clone()),
        }
    }
}

/// Bring `peer_name` into canonical form for a member called `uid`.
pub fn clean_peer_name(
    uid: &str,
    peer_name: Option<Map<String, Value>>,
) -> Option<Map<String, Value>> {
    let mut peer_name = peer_name?;
    match peer_name.get("uid") {
        Some(Value::String(named)) => assert!(
            named == uid,
            "Programming error: peer name for {} carries uid {}.",
            uid,
            named
        ),
        Some(other) => panic!(
            "Programming error: peer name for {} carries non-string uid {}.",
            uid, other
        ),
        None => {
            peer_name.insert("uid".to_string(), Value::String(uid.to_string()));
        }
    }

    if peer_name.len() == 1 {
        None
    } else {
        Some(peer_name)
    }
}
