/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events a [`Channel`](crate::channel::Channel) emits.
//!
//! An event for a given action indicates that the action has been completed. Channels publish
//! events to an optional `Sender<Event>` given at construction, and print them through the
//! [logging](crate::logging) module when [`Constants::log_events`](crate::config::Constants) is set.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::channel::HandshakeError;
use crate::types::data_types::ViewNumber;

pub enum Event {
    // Handshake events.
    HandshakeStart(HandshakeStartEvent),
    HandshakeComplete(HandshakeCompleteEvent),
    HandshakeFailed(HandshakeFailedEvent),
    // Transport events.
    Reconnect(ReconnectEvent),
    CloseChannel(CloseChannelEvent),
    // Error debouncing events.
    SuppressViewResponse(SuppressViewResponseEvent),
}

impl Event {
    /// Send `event` to the subscriber, if there is one. A subscriber that has hung up is ignored.
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(event);
        }
    }
}

/// A handshake was started on a channel. `active_end` is true on the side that initiated the
/// connection.
pub struct HandshakeStartEvent {
    pub timestamp: SystemTime,
    pub local_uid: String,
    pub remote_uid: String,
    pub active_end: bool,
}

/// Both ends of a channel agreed on their identities.
pub struct HandshakeCompleteEvent {
    pub timestamp: SystemTime,
    pub local_uid: String,
    pub remote_uid: String,
    pub channel_uid: Option<String>,
    pub connection_version: u32,
}

/// A handshake timed out, was cancelled, or found the peer's identity inconsistent.
pub struct HandshakeFailedEvent {
    pub timestamp: SystemTime,
    pub local_uid: String,
    pub remote_uid: String,
    pub error: HandshakeError,
}

/// The transport under a channel was replaced.
pub struct ReconnectEvent {
    pub timestamp: SystemTime,
    pub remote_uid: String,
    pub channel_uid: Option<String>,
    pub connection_version: u32,
}

/// A channel's transport was closed.
pub struct CloseChannelEvent {
    pub timestamp: SystemTime,
    pub remote_uid: String,
    pub connection_version: u32,
}

/// A repeated error about `viewno` was suppressed.
pub struct SuppressViewResponseEvent {
    pub timestamp: SystemTime,
    pub remote_uid: String,
    pub viewno: ViewNumber,
}
