/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The membership and quorum engine of a replica group.
//!
//! Main type: [`View`].

use std::{cmp::Ordering, collections::HashSet, time::Instant};

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::types::data_types::{LogNumber, ViewNumber};

use super::{
    messages::{PreparePayload, PrimaryWire, ViewParseError, ViewWire},
    types::Member,
};

/// The configuration of a replica group at a point in time: a numbered, ordered membership with a
/// designated primary.
///
/// ## Ordering of members
///
/// The order of `members` is significant: the primary of view `v` is always the member at position
/// `v mod size()`. Members added through [`add`](Self::add) are inserted in uid order.
///
/// ## Quorums
///
/// A view of `n` members tolerates `f() = n / 2` simultaneous failures. A decision is certified once
/// strictly more than `f()` members back it.
///
/// ## Cached counts
///
/// [`nprepared`](Self::nprepared) and [`nconfirmed`](Self::nconfirmed) are cached. Every method that
/// touches a member's `prepared` or `confirmed` flag recomputes both before returning, so they always
/// equal the number of members with the flag set.
#[derive(Clone, Debug)]
pub struct View {
    group_name: Option<String>,
    viewno: ViewNumber,
    members: Vec<Member>,
    primary_index: usize,
    my_index: Option<usize>,
    nprepared: usize,
    nconfirmed: usize,
}

impl Default for View {
    fn default() -> Self {
        View::new()
    }
}

impl View {
    /// Create an empty view with no members. An empty view is not valid until it is populated by
    /// [`make_singular`](Self::make_singular) or [`assign_parse`](Self::assign_parse).
    pub fn new() -> View {
        Self {
            group_name: None,
            viewno: ViewNumber::init(),
            members: Vec::new(),
            primary_index: 0,
            my_index: None,
            nprepared: 0,
            nconfirmed: 0,
        }
    }

    /// Create the view of a brand new group whose only member, `uid`, is both the primary and this
    /// replica. The member starts out having acknowledged position 0 of an empty log.
    pub fn make_singular(group_name: &str, uid: &str, now: Instant) -> View {
        let mut view = View::new();
        if !group_name.is_empty() {
            view.group_name = Some(group_name.to_string());
        }
        let mut member = Member::new(uid.to_string(), None);
        member.set_ackno(LogNumber::init(), now);
        view.members.push(member);
        view.primary_index = 0;
        view.my_index = Some(0);
        view
    }

    /// Parse a view description received from the wire.
    ///
    /// `my_uid` is the uid of this replica; if it is a member, [`my_index`](Self::my_index) is set to
    /// its position. If `require_view` is false, `viewno` may be absent (it defaults to 0) and so may
    /// `primary` (it defaults to the position the view number selects, `viewno mod size()`).
    pub fn parse(msg: &Value, require_view: bool, my_uid: &str) -> Result<View, ViewParseError> {
        if !msg.is_object() {
            return Err(ViewParseError::NotAnObject);
        }
        let wire =
            ViewWire::deserialize(msg).map_err(|err| ViewParseError::Malformed(err.to_string()))?;

        let members_wire = wire.members.ok_or(ViewParseError::MissingMembers)?;

        let viewno = match wire.viewno {
            Some(viewno) => ViewNumber::new(viewno),
            None if !require_view => ViewNumber::init(),
            None => return Err(ViewParseError::MissingViewNumber),
        };

        let (primary_index, primary_uid) = match wire.primary {
            Some(PrimaryWire::Index(index)) => (Some(index), None),
            Some(PrimaryWire::Uid(_)) if members_wire.is_map() => {
                return Err(ViewParseError::PrimaryUidWithMembersMap)
            }
            Some(PrimaryWire::Uid(uid)) => (None, Some(uid)),
            None if !require_view => (None, None),
            None => return Err(ViewParseError::MissingPrimary),
        };

        let members = members_wire.into_members()?;

        // Scan for duplicates, for this replica, and for the primary if it was named by uid.
        let (my_index, named_primary_index) = {
            let mut seen_uids = HashSet::new();
            let mut my_index = None;
            let mut named_primary_index = None;
            for (i, member) in members.iter().enumerate() {
                if !seen_uids.insert(member.uid()) {
                    return Err(ViewParseError::DuplicateUid {
                        uid: member.uid().to_string(),
                    });
                }
                if member.uid() == my_uid {
                    my_index = Some(i);
                }
                if primary_uid.as_deref() == Some(member.uid()) {
                    named_primary_index = Some(i);
                }
            }
            (my_index, named_primary_index)
        };

        let primary_index = match (primary_index, primary_uid) {
            (Some(index), _) => index,
            (None, Some(uid)) => named_primary_index.ok_or(ViewParseError::UnknownPrimary { uid })?
                as u64,
            (None, None) if members.is_empty() => 0,
            (None, None) => viewno.int() % members.len() as u64,
        };
        if primary_index >= members.len() as u64 {
            return Err(ViewParseError::PrimaryOutOfRange {
                index: primary_index,
                size: members.len(),
            });
        }

        Ok(View {
            group_name: wire.group_name,
            viewno,
            members,
            primary_index: primary_index as usize,
            my_index,
            nprepared: 0,
            nconfirmed: 0,
        })
    }

    /// Replace this view with the one described by `msg`.
    ///
    /// The view is cleared first. If parsing fails it stays cleared (empty), so callers must treat
    /// an `Err` as "no valid view" and keep using whatever view they held before.
    pub fn assign_parse(
        &mut self,
        msg: &Value,
        require_view: bool,
        my_uid: &str,
    ) -> Result<(), ViewParseError> {
        *self = View::new();
        *self = View::parse(msg, require_view, my_uid)?;
        Ok(())
    }

    /// Get the wire representation of this view.
    pub fn to_json(&self) -> Value {
        let mut j = Map::new();
        if let Some(group_name) = &self.group_name {
            j.insert("group_name".to_string(), Value::String(group_name.clone()));
        }
        j.insert("viewno".to_string(), json!(self.viewno.int()));
        j.insert("primary".to_string(), json!(self.primary_index));
        j.insert("members".to_string(), self.members_json());
        Value::Object(j)
    }

    /// Get the wire representation of the membership, in order.
    pub fn members_json(&self) -> Value {
        Value::Array(self.members.iter().map(Member::to_json).collect())
    }

    /// Get a diagnostic summary of acknowledgements: one `[uid, ackno, nacks, flags]` array per
    /// member, where `nacks` counts members at or beyond `ackno`, and `flags` marks the primary
    /// (`p`) and this replica (`*`). Absent values are omitted.
    pub fn acks_json(&self) -> Value {
        let mut j = Vec::new();
        for (i, member) in self.members.iter().enumerate() {
            let mut x = vec![Value::String(member.uid().to_string())];
            if let Some(ackno) = member.ackno() {
                x.push(json!(ackno.int()));
                x.push(json!(self.count_acks(ackno)));
            }
            let is_primary = i == self.primary_index;
            let is_me = Some(i) == self.my_index;
            if is_primary || is_me {
                let flags = format!(
                    "{}{}",
                    if is_primary { "p" } else { "" },
                    if is_me { "*" } else { "" }
                );
                x.push(Value::String(flags));
            }
            j.push(Value::Array(x));
        }
        Value::Array(j)
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    pub fn viewno(&self) -> ViewNumber {
        self.viewno
    }

    /// Get the members of this view, in order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Get the maximum number of simultaneous failures this view tolerates.
    pub fn f(&self) -> usize {
        self.size() / 2
    }

    pub fn primary_index(&self) -> usize {
        self.primary_index
    }

    /// Get the position of this replica in the view, if it is a member.
    pub fn my_index(&self) -> Option<usize> {
        self.my_index
    }

    /// Get the uid of this replica.
    ///
    /// # Panics
    ///
    /// Panics if this replica is not a member of the view.
    pub fn uid(&self) -> &str {
        let my_index = self
            .my_index
            .expect("Programming error: uid() called on a view this replica is not a member of.");
        self.members[my_index].uid()
    }

    /// Check whether this replica is the primary of the view.
    pub fn me_primary(&self) -> bool {
        self.my_index == Some(self.primary_index)
    }

    /// Get the primary of the view.
    ///
    /// # Panics
    ///
    /// Panics if the view is empty.
    pub fn primary(&self) -> &Member {
        assert!(
            !self.is_empty(),
            "Programming error: primary() called on an empty view."
        );
        &self.members[self.primary_index]
    }

    /// Get the position of the member called `uid`, if it is a member.
    pub fn position(&self, uid: &str) -> Option<usize> {
        self.members.iter().position(|member| member.uid() == uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.position(uid).is_some()
    }

    pub fn find(&self, uid: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.uid() == uid)
    }

    pub fn find_mut(&mut self, uid: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|member| member.uid() == uid)
    }

    /// Compare two views. Views are ordered by view number, then by number of members, then by
    /// primary index, then by the uids of their members in order. The "greater" of two competing
    /// descriptions is the more advanced one.
    ///
    /// Group names and per-member voting state play no part in the comparison.
    pub fn compare(&self, other: &View) -> Ordering {
        self.viewno
            .cmp(&other.viewno)
            .then_with(|| self.size().cmp(&other.size()))
            .then_with(|| self.primary_index.cmp(&other.primary_index))
            .then_with(|| {
                self.members
                    .iter()
                    .map(Member::uid)
                    .cmp(other.members.iter().map(Member::uid))
            })
    }

    /// Check whether a transition between this view and `other` is safe: either one membership
    /// contains the other, or the members they share form a quorum of both.
    pub fn shared_quorum(&self, other: &View) -> bool {
        let nshared = self
            .members
            .iter()
            .filter(|member| other.contains(member.uid()))
            .count();
        nshared == self.size()
            || nshared == other.size()
            || (nshared > self.f() && nshared > other.f())
    }

    /// Record `uid`'s response to a prepare round. Returns whether `uid` is a member.
    ///
    /// The first response marks the member prepared; a payload with `confirm` also marks it
    /// confirmed. The payload's `ackno` is only recorded when `is_next` is true, that is, when this
    /// view is the prospective next view rather than the installed one.
    pub fn prepare(
        &mut self,
        uid: &str,
        payload: &PreparePayload,
        is_next: bool,
        now: Instant,
    ) -> bool {
        let found = match self.find_mut(uid) {
            Some(member) => {
                member.prepared = true;
                if payload.confirm {
                    member.confirmed = true;
                }
                if let (Some(ackno), true) = (payload.ackno, is_next) {
                    member.set_ackno(LogNumber::new(ackno), now);
                }
                true
            }
            None => false,
        };
        self.account_preparation();
        found
    }

    /// Reset the prepare round. If `is_next` is true, this view is about to replace the current one,
    /// so acknowledgement and log-matching evidence is discarded too.
    pub fn clear_preparation(&mut self, is_next: bool) {
        for member in self.members.iter_mut() {
            member.prepared = false;
            member.confirmed = false;
            if is_next {
                member.ackno = None;
                member.matching_logno = None;
            }
        }
        self.account_preparation();
    }

    /// Recompute the cached prepare and confirm counts from the members' flags.
    fn account_preparation(&mut self) {
        self.nprepared = self.members.iter().filter(|member| member.prepared).count();
        self.nconfirmed = self.members.iter().filter(|member| member.confirmed).count();
    }

    /// Get the number of members that have responded to the current prepare round.
    pub fn nprepared(&self) -> usize {
        self.nprepared
    }

    /// Get the number of members that have confirmed the current prepare round.
    pub fn nconfirmed(&self) -> usize {
        self.nconfirmed
    }

    pub fn has_prepare_quorum(&self) -> bool {
        self.nprepared > self.f()
    }

    pub fn has_confirm_quorum(&self) -> bool {
        self.nconfirmed > self.f()
    }

    /// Record that `uid` acknowledged every position up to `ackno`. Returns whether its recorded
    /// position changed.
    pub fn set_ackno(&mut self, uid: &str, ackno: LogNumber, now: Instant) -> bool {
        match self.find_mut(uid) {
            Some(member) => member.set_ackno(ackno, now),
            None => false,
        }
    }

    /// Count the members whose acknowledged position is at or beyond `ackno`.
    pub fn count_acks(&self, ackno: LogNumber) -> usize {
        self.members
            .iter()
            .filter(|member| member.ackno().is_some_and(|acked| acked >= ackno))
            .count()
    }

    /// Check whether a quorum of members has acknowledged `ackno`, i.e., whether it is durable.
    pub fn has_ack_quorum(&self, ackno: LogNumber) -> bool {
        self.count_acks(ackno) > self.f()
    }

    /// Get the highest position a quorum of members has acknowledged, if there is one.
    pub fn quorum_ackno(&self) -> Option<LogNumber> {
        let mut acknos: Vec<LogNumber> = self.members.iter().filter_map(Member::ackno).collect();
        if acknos.len() <= self.f() {
            return None;
        }
        acknos.sort_unstable_by(|a, b| b.cmp(a));
        Some(acknos[self.f()])
    }

    /// Record that `uid`'s log is known to match the primary's up to `logno`. Returns whether `uid`
    /// is a member.
    pub fn set_matching_logno(&mut self, uid: &str, logno: LogNumber) -> bool {
        match self.find_mut(uid) {
            Some(member) => {
                member.matching_logno = Some(logno);
                true
            }
            None => false,
        }
    }

    /// Clamp every member's matching position down to `logno`.
    pub fn reduce_matching_logno(&mut self, logno: LogNumber) {
        for member in self.members.iter_mut() {
            if let Some(matching_logno) = member.matching_logno {
                if logno < matching_logno {
                    member.matching_logno = Some(logno);
                }
            }
        }
    }

    /// Add the member `uid`, keeping uid order, and advance to the next view.
    ///
    /// If `uid` is already a member the membership is unchanged, but the view still advances.
    pub fn add(&mut self, uid: &str, my_uid: &str) {
        let pos = self
            .members
            .iter()
            .position(|member| member.uid() >= uid)
            .unwrap_or(self.members.len());
        if pos == self.members.len() || self.members[pos].uid() != uid {
            self.members.insert(pos, Member::new(uid.to_string(), None));
        }

        self.my_index = self.position(my_uid);
        self.advance();
    }

    /// Move to the next view: clear all voting and acknowledgement state, increment the view number
    /// (never landing on 0), and rotate the primary to `viewno mod size()`.
    ///
    /// # Panics
    ///
    /// Panics if the view is empty.
    pub fn advance(&mut self) {
        assert!(
            !self.is_empty(),
            "Programming error: advance() called on an empty view."
        );
        self.clear_preparation(true);
        self.viewno = self.viewno.next();
        self.primary_index = (self.viewno.int() % self.members.len() as u64) as usize;
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for View {}

impl PartialOrd for View {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for View {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}
