/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The handshake as a state machine that performs no I/O.
//!
//! [`Handshake`] decides *when* to send and how long to wait; the caller does the sending and
//! receiving and reports back through [`confirm`](Handshake::confirm), [`fail`](Handshake::fail),
//! or [`cancel`](Handshake::cancel). [`Channel::handshake`](super::Channel::handshake) drives one
//! over a real transport.
//!
//! ```text
//!                      poll (active end)
//! WaitingForFirstMessage ───────────────▶ Retransmitting ──┐ poll at next_send: Send again
//!          │                                   │   ▲───────┘
//!          │ confirm / fail / cancel / deadline│ confirm / fail / cancel / deadline
//!          ▼                                   ▼
//!     Confirmed | Failed | Cancelled | TimedOut (terminal)
//! ```
//!
//! Leaving `Retransmitting` drops the retransmit deadline, so no retransmission is ever requested
//! after the handshake finishes.

use std::{
    fmt,
    time::{Duration, Instant},
};

use super::transport::ChannelError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    WaitingForFirstMessage,
    Retransmitting { next_send: Instant },
    Confirmed,
    TimedOut,
    Failed(HandshakeError),
    Cancelled,
}

/// What the caller of [`Handshake::poll`] should do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Send our handshake message now, then poll again.
    Send,
    /// Wait for a message until the given instant, then poll again.
    Wait(Instant),
    /// The handshake is over.
    Done(Result<(), HandshakeError>),
}

#[derive(Clone, Debug)]
pub struct Handshake {
    active_end: bool,
    message_timeout: Duration,
    deadline: Instant,
    state: HandshakeState,
}

impl Handshake {
    pub fn new(
        active_end: bool,
        message_timeout: Duration,
        overall_timeout: Duration,
        now: Instant,
    ) -> Handshake {
        Handshake {
            active_end,
            message_timeout,
            deadline: now + overall_timeout,
            state: HandshakeState::WaitingForFirstMessage,
        }
    }

    pub fn poll(&mut self, now: Instant) -> HandshakeAction {
        if let Some(result) = self.result() {
            return HandshakeAction::Done(result);
        }

        if now >= self.deadline {
            self.state = HandshakeState::TimedOut;
            return HandshakeAction::Done(Err(HandshakeError::TimedOut));
        }

        match self.state {
            HandshakeState::WaitingForFirstMessage if self.active_end => {
                self.state = HandshakeState::Retransmitting {
                    next_send: now + self.message_timeout,
                };
                HandshakeAction::Send
            }
            HandshakeState::WaitingForFirstMessage => HandshakeAction::Wait(self.deadline),
            HandshakeState::Retransmitting { next_send } if now >= next_send => {
                self.state = HandshakeState::Retransmitting {
                    next_send: now + self.message_timeout,
                };
                HandshakeAction::Send
            }
            HandshakeState::Retransmitting { next_send } => {
                HandshakeAction::Wait(next_send.min(self.deadline))
            }
            _ => unreachable!("terminal states are handled above"),
        }
    }

    /// A consistent handshake was received from the peer.
    pub fn confirm(&mut self) {
        if !self.is_finished() {
            self.state = HandshakeState::Confirmed;
        }
    }

    pub fn fail(&mut self, error: HandshakeError) {
        if !self.is_finished() {
            self.state = HandshakeState::Failed(error);
        }
    }

    /// Abandon the handshake. Has no effect if it has already finished.
    pub fn cancel(&mut self) {
        if !self.is_finished() {
            self.state = HandshakeState::Cancelled;
        }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.result().is_some()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    fn result(&self) -> Option<Result<(), HandshakeError>> {
        match &self.state {
            HandshakeState::Confirmed => Some(Ok(())),
            HandshakeState::TimedOut => Some(Err(HandshakeError::TimedOut)),
            HandshakeState::Failed(error) => Some(Err(error.clone())),
            HandshakeState::Cancelled => Some(Err(HandshakeError::Cancelled)),
            HandshakeState::WaitingForFirstMessage | HandshakeState::Retransmitting { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeError {
    /// No consistent handshake arrived before the overall timeout.
    TimedOut,
    /// The peer announced a different uid from the one this channel connects to.
    IdentityMismatch { expected: String, received: String },
    /// The peer announced a different logical connection. The peer has restarted the connection
    /// and the driver should reconnect.
    ChannelUidMismatch { local: String, remote: String },
    Cancelled,
    Channel(ChannelError),
}

impl From<ChannelError> for HandshakeError {
    fn from(error: ChannelError) -> Self {
        HandshakeError::Channel(error)
    }
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::TimedOut => write!(f, "handshake timed out"),
            HandshakeError::IdentityMismatch { expected, received } => write!(
                f,
                "expected handshake from {}, received one from {}",
                expected, received
            ),
            HandshakeError::ChannelUidMismatch { local, remote } => write!(
                f,
                "channel uid {} conflicts with peer's channel uid {}",
                local, remote
            ),
            HandshakeError::Cancelled => write!(f, "handshake cancelled"),
            HandshakeError::Channel(error) => write!(f, "handshake failed: {}", error),
        }
    }
}

impl std::error::Error for HandshakeError {}
