/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Channel`] type.

use std::{
    sync::mpsc::{Receiver, Sender, TryRecvError},
    time::{Duration, Instant, SystemTime},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use rand_core::{OsRng, RngCore};
use serde_json::{Map, Value};

use crate::{
    config::Constants,
    events::*,
    types::data_types::ViewNumber,
};

use super::{
    handshake::{Handshake, HandshakeAction, HandshakeError},
    messages::{HandshakeMessage, Message},
    transport::{ChannelError, Connector, Transport},
};

/// A logical, identity-stamped connection between a local and a remote endpoint.
///
/// A channel outlives the transports under it: [`replace_transport`](Channel::replace_transport)
/// and [`reconnect`](Channel::reconnect) swap the transport and bump the
/// [`connection_version`](Channel::connection_version), while the
/// [`channel_uid`](Channel::channel_uid) stays the same.
pub struct Channel<T: Transport> {
    local_uid: String,
    remote_uid: String,
    channel_uid: Option<String>,
    connection_version: u32,
    remote_peer_name: Option<Map<String, Value>>,
    transport: Option<T>,
    constants: Constants,

    // Last view number an error was handled for, and when.
    error_viewno: Option<ViewNumber>,
    error_viewno_at: Option<Instant>,

    event_publisher: Option<Sender<Event>>,
}

impl<T: Transport> Channel<T> {
    /// Wrap an already connected `transport`. `remote_uid` may be empty if the peer is not known
    /// yet; it is then learned from the peer's handshake.
    pub fn new(
        local_uid: String,
        remote_uid: String,
        transport: T,
        constants: Constants,
        event_publisher: Option<Sender<Event>>,
    ) -> Channel<T> {
        Channel {
            local_uid,
            remote_uid,
            channel_uid: None,
            connection_version: 0,
            remote_peer_name: None,
            transport: Some(transport),
            constants,
            error_viewno: None,
            error_viewno_at: None,
            event_publisher,
        }
    }

    /// Open a channel to `peer_uid` and mint a fresh channel uid for it. The connect attempt gives
    /// up after [`Constants::handshake_timeout`].
    pub fn connect<C: Connector<Transport = T>>(
        connector: &mut C,
        local_uid: String,
        peer_uid: String,
        peer_name: Option<Map<String, Value>>,
        constants: Constants,
        event_publisher: Option<Sender<Event>>,
    ) -> Result<Channel<T>, ChannelError> {
        let transport =
            connector.connect(&peer_uid, peer_name.as_ref(), constants.handshake_timeout)?;
        let mut channel = Channel::new(local_uid, peer_uid, transport, constants, event_publisher);
        channel.remote_peer_name = peer_name;
        channel.channel_uid = Some(Self::random_uid(&mut OsRng));
        Ok(channel)
    }

    /// Accept the next inbound connection. The remote uid stays empty until a handshake is
    /// processed.
    pub fn receive_connection<C: Connector<Transport = T>>(
        connector: &mut C,
        local_uid: String,
        constants: Constants,
        event_publisher: Option<Sender<Event>>,
    ) -> Result<Channel<T>, ChannelError> {
        let transport = connector.receive_connection(constants.handshake_timeout)?;
        Ok(Channel::new(
            local_uid,
            String::new(),
            transport,
            constants,
            event_publisher,
        ))
    }

    /// Open a new transport to the same peer and put it under this channel.
    pub fn reconnect<C: Connector<Transport = T>>(
        &mut self,
        connector: &mut C,
    ) -> Result<(), ChannelError> {
        let transport = connector.connect(
            &self.remote_uid,
            self.remote_peer_name.as_ref(),
            self.constants.handshake_timeout,
        )?;
        self.replace_transport(transport);
        Ok(())
    }

    /// Put `transport` under this channel, closing the previous one. Messages tied to earlier
    /// transports can be recognized by their older [`connection_version`](Self::connection_version).
    pub fn replace_transport(&mut self, transport: T) {
        if let Some(mut old) = self.transport.replace(transport) {
            old.close();
        }
        self.connection_version += 1;
        self.publish(Event::Reconnect(ReconnectEvent {
            timestamp: SystemTime::now(),
            remote_uid: self.remote_uid.clone(),
            channel_uid: self.channel_uid.clone(),
            connection_version: self.connection_version,
        }));
    }

    pub fn local_uid(&self) -> &str {
        &self.local_uid
    }

    pub fn remote_uid(&self) -> &str {
        &self.remote_uid
    }

    pub fn channel_uid(&self) -> Option<&str> {
        self.channel_uid.as_deref()
    }

    /// Set the uid of the logical connection.
    ///
    /// # Panics
    ///
    /// Panics if a different channel uid has already been set.
    pub fn set_channel_uid(&mut self, channel_uid: String) {
        if let Some(existing) = &self.channel_uid {
            assert!(
                *existing == channel_uid,
                "Programming error: channel uid {} cannot be changed to {}",
                existing,
                channel_uid
            );
        }
        self.channel_uid = Some(channel_uid);
    }

    pub fn connection_version(&self) -> u32 {
        self.connection_version
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Metadata describing the local endpoint. Defaults to `{"uid": local_uid}`.
    pub fn local_name(&self) -> Map<String, Value> {
        self.transport
            .as_ref()
            .and_then(|transport| transport.local_name())
            .unwrap_or_else(|| uid_name(&self.local_uid))
    }

    /// Metadata describing the remote endpoint: what the peer announced in its handshake, else
    /// what the transport knows, else `{"uid": remote_uid}`.
    pub fn remote_name(&self) -> Map<String, Value> {
        self.remote_peer_name
            .clone()
            .or_else(|| {
                self.transport
                    .as_ref()
                    .and_then(|transport| transport.remote_name())
            })
            .unwrap_or_else(|| uid_name(&self.remote_uid))
    }

    pub fn send(&mut self, message: Message) -> Result<(), ChannelError> {
        match &mut self.transport {
            Some(transport) => transport.send(message),
            None => Err(ChannelError::Closed),
        }
    }

    /// Receive the next message for the driver, waiting at most `timeout`.
    ///
    /// Handshake messages never reach the driver. A peer that still asks for a reply is
    /// retransmitting because our earlier answer was lost, so it is answered here.
    pub fn receive(&mut self, timeout: Duration) -> Result<Message, ChannelError> {
        let deadline = Instant::now() + timeout;
        loop {
            let message = self.receive_raw(deadline.saturating_duration_since(Instant::now()))?;
            let received = match self.check_handshake(&message) {
                Some(received) => received,
                None => return Ok(message),
            };
            match self.answer_handshake(&received) {
                Ok(()) => {}
                Err(HandshakeError::Channel(error)) => return Err(error),
                Err(error) => log::warn!(
                    "Dropping handshake from {} on channel {}: {}",
                    received.uid,
                    self.remote_uid,
                    error
                ),
            }
        }
    }

    fn receive_raw(&mut self, timeout: Duration) -> Result<Message, ChannelError> {
        match &mut self.transport {
            Some(transport) => transport.recv_timeout(timeout),
            None => Err(ChannelError::Closed),
        }
    }

    /// Close the transport. Closing a closed channel does nothing.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
            self.publish(Event::CloseChannel(CloseChannelEvent {
                timestamp: SystemTime::now(),
                remote_uid: self.remote_uid.clone(),
                connection_version: self.connection_version,
            }));
        }
    }

    /// Agree on identities with the remote endpoint.
    ///
    /// The active end (the side that connected) sends a handshake requesting a reply every
    /// `message_timeout` until a consistent handshake comes back. The passive end waits for the
    /// peer's handshake and replies if asked to. Messages of other kinds received meanwhile are
    /// dropped.
    ///
    /// Returns `Ok(())` once the peer's identity has been established, or an error on timeout,
    /// transport failure, or identity conflict. Nothing is retried after `overall_timeout`.
    ///
    /// The passive end may return before its reply arrives. Later retransmits from the active end
    /// are answered by [`receive`](Self::receive).
    pub fn handshake(
        &mut self,
        active_end: bool,
        message_timeout: Duration,
        overall_timeout: Duration,
    ) -> Result<(), HandshakeError> {
        self.run_handshake(active_end, message_timeout, overall_timeout, None)
    }

    /// Like [`handshake`](Self::handshake), but gives up with [`HandshakeError::Cancelled`] once
    /// `cancel_signal` fires or its sender is dropped. The signal is checked at least every
    /// `message_timeout`.
    pub fn handshake_cancellable(
        &mut self,
        active_end: bool,
        message_timeout: Duration,
        overall_timeout: Duration,
        cancel_signal: &Receiver<()>,
    ) -> Result<(), HandshakeError> {
        self.run_handshake(active_end, message_timeout, overall_timeout, Some(cancel_signal))
    }

    fn run_handshake(
        &mut self,
        active_end: bool,
        message_timeout: Duration,
        overall_timeout: Duration,
        cancel_signal: Option<&Receiver<()>>,
    ) -> Result<(), HandshakeError> {
        self.publish(Event::HandshakeStart(HandshakeStartEvent {
            timestamp: SystemTime::now(),
            local_uid: self.local_uid.clone(),
            remote_uid: self.remote_uid.clone(),
            active_end,
        }));

        let mut handshake =
            Handshake::new(active_end, message_timeout, overall_timeout, Instant::now());
        let result = loop {
            if let Some(cancel_signal) = cancel_signal {
                match cancel_signal.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => handshake.cancel(),
                    Err(TryRecvError::Empty) => (),
                }
            }

            match handshake.poll(Instant::now()) {
                HandshakeAction::Send => {
                    let message = self.handshake_message(true).to_message();
                    if let Err(error) = self.send(message) {
                        handshake.fail(error.into());
                    }
                }
                HandshakeAction::Wait(until) => {
                    let mut timeout = until.saturating_duration_since(Instant::now());
                    if cancel_signal.is_some() {
                        timeout = timeout.min(message_timeout);
                    }
                    match self.receive_raw(timeout) {
                        Ok(message) => {
                            if let Some(received) = self.check_handshake(&message) {
                                match self.answer_handshake(&received) {
                                    Ok(()) => handshake.confirm(),
                                    Err(error) => handshake.fail(error),
                                }
                            }
                        }
                        Err(ChannelError::Timeout) => {}
                        Err(error) => handshake.fail(error.into()),
                    }
                }
                HandshakeAction::Done(result) => break result,
            }
        };

        match &result {
            Ok(()) => self.publish(Event::HandshakeComplete(HandshakeCompleteEvent {
                timestamp: SystemTime::now(),
                local_uid: self.local_uid.clone(),
                remote_uid: self.remote_uid.clone(),
                channel_uid: self.channel_uid.clone(),
                connection_version: self.connection_version,
            })),
            Err(error) => self.publish(Event::HandshakeFailed(HandshakeFailedEvent {
                timestamp: SystemTime::now(),
                local_uid: self.local_uid.clone(),
                remote_uid: self.remote_uid.clone(),
                error: error.clone(),
            })),
        }
        result
    }

    /// Handshake using [`Constants::message_timeout`] and [`Constants::handshake_timeout`].
    pub fn handshake_with_defaults(&mut self, active_end: bool) -> Result<(), HandshakeError> {
        let message_timeout = self.constants.message_timeout;
        let overall_timeout = self.constants.handshake_timeout;
        self.handshake(active_end, message_timeout, overall_timeout)
    }

    /// Check whether `message` is a well-formed handshake. Has no side effects.
    pub fn check_handshake(&self, message: &Message) -> Option<HandshakeMessage> {
        HandshakeMessage::from_message(message)
    }

    /// Record the identity announced in `handshake`.
    ///
    /// Fails without changing the channel if the peer's uid differs from a known remote uid, or if
    /// the peer's channel uid conflicts with ours. A channel uid is adopted from the peer if we do
    /// not have one yet.
    pub fn process_handshake(&mut self, handshake: &HandshakeMessage) -> Result<(), HandshakeError> {
        if !self.remote_uid.is_empty() && self.remote_uid != handshake.uid {
            return Err(HandshakeError::IdentityMismatch {
                expected: self.remote_uid.clone(),
                received: handshake.uid.clone(),
            });
        }
        if let (Some(local), Some(remote)) = (&self.channel_uid, &handshake.channel_uid) {
            if local != remote {
                return Err(HandshakeError::ChannelUidMismatch {
                    local: local.clone(),
                    remote: remote.clone(),
                });
            }
        }

        self.remote_uid = handshake.uid.clone();
        if let Some(channel_uid) = &handshake.channel_uid {
            self.set_channel_uid(channel_uid.clone());
        }
        if let Some(name) = &handshake.name {
            self.remote_peer_name = Some(name.clone());
        }
        Ok(())
    }

    /// Decide whether an error about `viewno` should be acted on. Returns false if an error about
    /// the same view number was already acted on within [`Constants::view_response_debounce`] of
    /// `now`.
    pub fn check_view_response(&mut self, viewno: ViewNumber, now: Instant) -> bool {
        if let (Some(error_viewno), Some(error_viewno_at)) = (self.error_viewno, self.error_viewno_at)
        {
            if error_viewno == viewno
                && now.saturating_duration_since(error_viewno_at)
                    <= self.constants.view_response_debounce
            {
                self.publish(Event::SuppressViewResponse(SuppressViewResponseEvent {
                    timestamp: SystemTime::now(),
                    remote_uid: self.remote_uid.clone(),
                    viewno,
                }));
                return false;
            }
        }
        self.error_viewno = Some(viewno);
        self.error_viewno_at = Some(now);
        true
    }

    /// A fresh identifier: six random bytes, base64-encoded.
    pub fn random_uid<R: RngCore>(rng: &mut R) -> String {
        let mut bytes = [0u8; 6];
        rng.fill_bytes(&mut bytes);
        STANDARD.encode(bytes)
    }

    fn handshake_message(&self, reply: bool) -> HandshakeMessage {
        HandshakeMessage {
            uid: self.local_uid.clone(),
            channel_uid: self.channel_uid.clone(),
            name: Some(self.local_name()),
            reply,
        }
    }

    // Process a received handshake and send the reply it asks for.
    fn answer_handshake(&mut self, received: &HandshakeMessage) -> Result<(), HandshakeError> {
        self.process_handshake(received)?;
        if received.reply {
            let message = self.handshake_message(false).to_message();
            self.send(message)?;
        }
        Ok(())
    }

    fn publish(&self, event: Event) {
        if self.constants.log_events {
            event.log();
        }
        Event::publish(&self.event_publisher, event);
    }
}

impl<T: Transport> Drop for Channel<T> {
    fn drop(&mut self) {
        self.close()
    }
}

fn uid_name(uid: &str) -> Map<String, Value> {
    let mut name = Map::new();
    name.insert("uid".to_string(), Value::String(uid.to_string()));
    name
}
