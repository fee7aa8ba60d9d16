/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Membership and quorum accounting for a replica group.
//!
//! A [`View`] records which replicas form the group, which of them is primary, and what each has
//! told us during the current prepare round: whether it prepared, whether it confirmed, how far it
//! has acknowledged the log, and how far its log is known to match the primary's.
//!
//! ## Primary rotation
//!
//! Primaries are never elected by vote. The primary of view `v` is the member at position
//! `v mod size()`, so every replica holding the same membership computes the same primary. The only
//! way to rotate the primary is to [`advance`](View::advance) (or [`add`](View::add) a member, which
//! advances).
//!
//! ## Safe transitions
//!
//! Two views may follow one another only if they [share a quorum](View::shared_quorum). Among
//! competing descriptions of the next view, replicas keep the one that [compares](View::compare)
//! greatest.
//!
//! ## Current and next views
//!
//! Prepare responses during a view change carry acknowledgements that only make sense for the view
//! being changed into. These are recorded through [`NextView`], which is then
//! [installed](NextView::install) once a quorum has confirmed.

pub mod implementation;
pub use implementation::View;

pub mod messages;
pub use messages::{PreparePayload, ViewParseError};

pub mod next;
pub use next::NextView;

pub mod types;
pub use types::Member;
