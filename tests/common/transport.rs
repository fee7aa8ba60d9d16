use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    time::Duration,
};

use serde_json::{Map, Value};
use viewstamped_rs::channel::{ChannelError, Connector, Message, Transport};

/// One end of an in-memory, bidirectional message pipe.
pub(crate) struct MemoryTransport {
    outbox: Option<Sender<Message>>,
    inbox: Receiver<Message>,
    // Number of upcoming sends to silently discard, to simulate message loss.
    drop_sends: usize,
    local_name: Option<Map<String, Value>>,
}

impl MemoryTransport {
    pub(crate) fn drop_next_sends(&mut self, n: usize) {
        self.drop_sends = n;
    }

    pub(crate) fn with_local_name(mut self, local_name: Map<String, Value>) -> Self {
        self.local_name = Some(local_name);
        self
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, message: Message) -> Result<(), ChannelError> {
        let outbox = self.outbox.as_ref().ok_or(ChannelError::Closed)?;
        if self.drop_sends > 0 {
            self.drop_sends -= 1;
            return Ok(());
        }
        outbox
            .send(message)
            .map_err(|_| ChannelError::Disconnected)
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<Message, ChannelError> {
        if self.outbox.is_none() {
            return Err(ChannelError::Closed);
        }
        self.inbox.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => ChannelError::Timeout,
            RecvTimeoutError::Disconnected => ChannelError::Disconnected,
        })
    }

    fn close(&mut self) {
        self.outbox = None;
    }

    fn local_name(&self) -> Option<Map<String, Value>> {
        self.local_name.clone()
    }
}

/// Create two transports wired to each other.
pub(crate) fn transport_pair() -> (MemoryTransport, MemoryTransport) {
    let (a_to_b, b_inbox) = mpsc::channel();
    let (b_to_a, a_inbox) = mpsc::channel();
    let a = MemoryTransport {
        outbox: Some(a_to_b),
        inbox: a_inbox,
        drop_sends: 0,
        local_name: None,
    };
    let b = MemoryTransport {
        outbox: Some(b_to_a),
        inbox: b_inbox,
        drop_sends: 0,
        local_name: None,
    };
    (a, b)
}

/// Routes connection attempts to the connector registered under the target uid.
#[derive(Clone, Default)]
pub(crate) struct Switchboard(Arc<Mutex<HashMap<String, Sender<MemoryTransport>>>>);

impl Switchboard {
    pub(crate) fn connector(&self, uid: &str) -> MemoryConnector {
        let (listener, incoming) = mpsc::channel();
        self.0.lock().unwrap().insert(uid.to_string(), listener);
        MemoryConnector {
            switchboard: self.clone(),
            incoming,
        }
    }
}

pub(crate) struct MemoryConnector {
    switchboard: Switchboard,
    incoming: Receiver<MemoryTransport>,
}

impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    fn connect(
        &mut self,
        peer_uid: &str,
        _peer_name: Option<&Map<String, Value>>,
        _timeout: Duration,
    ) -> Result<MemoryTransport, ChannelError> {
        let unreachable = || ChannelError::Unreachable {
            peer: peer_uid.to_string(),
        };
        let listener = self
            .switchboard
            .0
            .lock()
            .unwrap()
            .get(peer_uid)
            .cloned()
            .ok_or_else(unreachable)?;
        let (ours, theirs) = transport_pair();
        listener.send(theirs).map_err(|_| unreachable())?;
        Ok(ours)
    }

    fn receive_connection(&mut self, timeout: Duration) -> Result<MemoryTransport, ChannelError> {
        self.incoming.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => ChannelError::Timeout,
            RecvTimeoutError::Disconnected => ChannelError::Disconnected,
        })
    }
}
