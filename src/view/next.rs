/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The prospective view a replica group is changing into.
//!
//! During a view change a replica holds two views: the installed [`View`] and the one being
//! negotiated. Acknowledgements carried by prepare responses describe the replicas' logs as they
//! will stand in the *new* view, so they must only ever be recorded against the prospective view.
//! [`NextView`] makes that a property of the type: its [`prepare`](NextView::prepare) always records
//! acknowledgements, and the only way to turn it into an installed view is [`install`](NextView::install).

use std::time::Instant;

use serde_json::Value;

use crate::types::data_types::{LogNumber, ViewNumber};

use super::{
    implementation::View,
    messages::{PreparePayload, ViewParseError},
};

/// A view that has been proposed but not yet installed.
#[derive(Clone, Debug, PartialEq)]
pub struct NextView(View);

impl NextView {
    /// Propose the view that directly follows `current`: same membership, next view number, rotated
    /// primary.
    pub fn following(current: &View) -> NextView {
        let mut view = current.clone();
        view.advance();
        NextView(view)
    }

    /// Propose `current` with `uid` added to its membership.
    pub fn with_member(current: &View, uid: &str, my_uid: &str) -> NextView {
        let mut view = current.clone();
        view.add(uid, my_uid);
        NextView(view)
    }

    /// Adopt a view description received from another replica as the proposal.
    pub fn parse(msg: &Value, my_uid: &str) -> Result<NextView, ViewParseError> {
        View::parse(msg, true, my_uid).map(NextView)
    }

    /// Get the proposed view.
    pub fn view(&self) -> &View {
        &self.0
    }

    pub fn viewno(&self) -> ViewNumber {
        self.0.viewno()
    }

    /// Record `uid`'s response to the proposal, including its acknowledged position.
    pub fn prepare(&mut self, uid: &str, payload: &PreparePayload, now: Instant) -> bool {
        self.0.prepare(uid, payload, true, now)
    }

    pub fn set_matching_logno(&mut self, uid: &str, logno: LogNumber) -> bool {
        self.0.set_matching_logno(uid, logno)
    }

    pub fn reduce_matching_logno(&mut self, logno: LogNumber) {
        self.0.reduce_matching_logno(logno)
    }

    /// Restart the vote on this proposal, discarding all evidence collected for it.
    pub fn clear_preparation(&mut self) {
        self.0.clear_preparation(true)
    }

    /// Check whether this proposal may safely replace `current`: it must be more advanced, and the
    /// two memberships must share a quorum.
    pub fn supersedes(&self, current: &View) -> bool {
        self.0 > *current && self.0.shared_quorum(current)
    }

    /// Install the proposal, keeping the acknowledgements and matching positions collected for it.
    pub fn install(self) -> View {
        self.0
    }
}
