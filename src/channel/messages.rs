/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Messages exchanged over a [`Channel`](super::Channel).
//!
//! Every message is a JSON object whose `"t"` field names its [`MessageKind`]. Channels route on
//! the kind and otherwise treat messages as opaque, except for [`HandshakeMessage`]s, which they
//! interpret themselves.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the field that carries a message's kind.
pub const KIND_FIELD: &str = "t";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request,
    Response,
    Commit,
    Ack,
    Handshake,
    Join,
    View,
    Kill,
    Error,
}

impl MessageKind {
    pub const ALL: [MessageKind; 9] = [
        MessageKind::Request,
        MessageKind::Response,
        MessageKind::Commit,
        MessageKind::Ack,
        MessageKind::Handshake,
        MessageKind::Join,
        MessageKind::View,
        MessageKind::Kill,
        MessageKind::Error,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::Commit => "commit",
            MessageKind::Ack => "ack",
            MessageKind::Handshake => "handshake",
            MessageKind::Join => "join",
            MessageKind::View => "view",
            MessageKind::Kill => "kill",
            MessageKind::Error => "error",
        }
    }

    pub fn from_tag(tag: &str) -> Option<MessageKind> {
        MessageKind::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// A structured message. Any JSON value can be carried; only objects with a recognized `"t"`
/// field have a [`kind`](Message::kind).
#[derive(Clone, Debug, PartialEq)]
pub struct Message(Value);

impl Message {
    /// Tag `payload` with `kind` and wrap it. An existing `"t"` field in `payload` is overwritten.
    pub fn new(kind: MessageKind, mut payload: Map<String, Value>) -> Message {
        payload.insert(KIND_FIELD.to_string(), Value::String(kind.tag().to_string()));
        Message(Value::Object(payload))
    }

    pub fn kind(&self) -> Option<MessageKind> {
        self.0
            .get(KIND_FIELD)
            .and_then(Value::as_str)
            .and_then(MessageKind::from_tag)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Message(value)
    }
}

/// The identity an endpoint announces during a handshake.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandshakeMessage {
    /// The sender's uid.
    pub uid: String,

    /// The logical connection this handshake belongs to, if the sender has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_uid: Option<String>,

    /// Metadata describing the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Map<String, Value>>,

    /// Whether the sender wants a handshake back.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reply: bool,
}

impl HandshakeMessage {
    pub fn to_message(&self) -> Message {
        let mut payload = Map::new();
        payload.insert("uid".to_string(), Value::String(self.uid.clone()));
        if let Some(channel_uid) = &self.channel_uid {
            payload.insert(
                "channel_uid".to_string(),
                Value::String(channel_uid.clone()),
            );
        }
        if let Some(name) = &self.name {
            payload.insert("name".to_string(), Value::Object(name.clone()));
        }
        if self.reply {
            payload.insert("reply".to_string(), Value::Bool(true));
        }
        Message::new(MessageKind::Handshake, payload)
    }

    /// Decode a handshake out of `message`. Returns `None` if `message` is not tagged as a
    /// handshake, lacks a non-empty `uid`, or carries fields of the wrong type.
    pub fn from_message(message: &Message) -> Option<HandshakeMessage> {
        if message.kind() != Some(MessageKind::Handshake) {
            return None;
        }
        let handshake: HandshakeMessage = serde_json::from_value(message.value().clone()).ok()?;
        if handshake.uid.is_empty() {
            return None;
        }
        Some(handshake)
    }
}
