/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Identity-stamped connections between replicas.
//!
//! A [`Channel`] wraps a pluggable [`Transport`] with the identities of both endpoints, the uid of
//! the logical connection, and a version that changes whenever the transport is replaced. Before
//! application traffic flows, the two ends run a [`handshake`](Channel::handshake) to agree on who
//! they are.

pub mod handshake;
pub use handshake::{Handshake, HandshakeAction, HandshakeError, HandshakeState};

pub mod implementation;
pub use implementation::Channel;

pub mod messages;
pub use messages::{HandshakeMessage, Message, MessageKind};

pub mod transport;
pub use transport::{ChannelError, Connector, Transport};
