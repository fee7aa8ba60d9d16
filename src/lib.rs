/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Membership, quorum accounting, and channel handshakes for Viewstamped Replication groups.
//!
//! A replica group agrees on a single log of client requests. At any moment the group is
//! configured by a [view](view::View): the list of members, the view number, and the primary, which
//! is always the member at position `viewno mod size`. This crate provides the pieces a replica
//! driver builds on:
//!
//! - [`view`]: parsing and serializing views, voting during view changes, counting
//!   acknowledgements of log positions, and tracking how far each member's log matches.
//! - [`channel`]: connections between replicas that carry the identities of both endpoints and
//!   the uid and version of the logical connection, established by a handshake.
//! - [`types`]: view and log numbers, log entries, and the in-memory log.
//! - [`state_machine`]: the state committed entries are applied to.
//! - [`config`], [`events`], and [`logging`]: timeouts, observable events, and log output.
//!
//! The driver loop that sends requests, commits, and view changes between replicas is left to the
//! user.

pub mod channel;

pub mod config;

pub mod events;

pub mod logging;

pub mod state_machine;

pub mod types;

pub mod view;
