/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable transports that carry [`Message`]s between two endpoints.
//!
//! This crate does not frame bytes or open sockets. Users provide a [`Connector`] that produces
//! connected [`Transport`]s, and [`Channel`](super::Channel) layers identity and versioning on top.

use std::{fmt, time::Duration};

use serde_json::{Map, Value};

use super::messages::Message;

pub trait Transport: Send {
    /// Send a message to the remote endpoint without waiting for it to be received.
    fn send(&mut self, message: Message) -> Result<(), ChannelError>;

    /// Receive the next message from the remote endpoint, waiting at most `timeout`. Returns
    /// [`ChannelError::Timeout`] if nothing arrived in time.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Message, ChannelError>;

    /// Release the resources held by this transport. Sends and receives after closing fail.
    fn close(&mut self);

    /// Metadata describing the local endpoint, if the transport knows more than its uid.
    fn local_name(&self) -> Option<Map<String, Value>> {
        None
    }

    /// Metadata describing the remote endpoint, if the transport knows more than its uid.
    fn remote_name(&self) -> Option<Map<String, Value>> {
        None
    }
}

pub trait Connector {
    type Transport: Transport;

    /// Open a transport to the peer with `peer_uid`. `peer_name` is the peer's metadata (for
    /// example, its address) as recorded in a view.
    fn connect(
        &mut self,
        peer_uid: &str,
        peer_name: Option<&Map<String, Value>>,
        timeout: Duration,
    ) -> Result<Self::Transport, ChannelError>;

    /// Accept the next inbound transport, waiting at most `timeout`.
    fn receive_connection(&mut self, timeout: Duration) -> Result<Self::Transport, ChannelError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// Nothing happened before the timeout elapsed.
    Timeout,
    /// The remote endpoint went away.
    Disconnected,
    /// The channel was closed locally.
    Closed,
    /// No transport to `peer` could be opened.
    Unreachable { peer: String },
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Timeout => write!(f, "timed out"),
            ChannelError::Disconnected => write!(f, "remote endpoint disconnected"),
            ChannelError::Closed => write!(f, "channel closed"),
            ChannelError::Unreachable { peer } => write!(f, "peer {} unreachable", peer),
        }
    }
}

impl std::error::Error for ChannelError {}
