//! ---
//! ah_section: "02-messaging-ipc-data-model"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Event envelope and topic vocabulary for the healing bus."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

use crate::message::BusMessage;

/// Receiver of bus messages.
///
/// Handlers run on the publisher's thread after the registry lock has been
/// released. Returned errors and panics are contained by the bus.
pub trait Subscriber: Send + Sync {
    /// Name used in fault logs.
    fn name(&self) -> &str;

    /// Process one message.
    fn handle(&self, message: &BusMessage) -> Result<()>;
}

/// Adapter turning a closure into a [`Subscriber`].
pub struct FnSubscriber<F> {
    name: String,
    handler: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&BusMessage) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&BusMessage) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, message: &BusMessage) -> Result<()> {
        (self.handler)(message)
    }
}

/// Keeps every message it receives, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    name: String,
    received: Mutex<Vec<BusMessage>>,
}

impl RecordingSubscriber {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Copy of every message received so far.
    pub fn messages(&self) -> Vec<BusMessage> {
        self.received.lock().clone()
    }

    /// Messages received for one topic.
    pub fn on_topic(&self, topic: &str) -> Vec<BusMessage> {
        self.received
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.received.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.lock().is_empty()
    }
}

impl Subscriber for RecordingSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, message: &BusMessage) -> Result<()> {
        self.received.lock().push(message.clone());
        Ok(())
    }
}

/// Writes every message to the tracing pipeline.
#[derive(Debug, Clone)]
pub struct LoggingSubscriber {
    name: String,
}

impl LoggingSubscriber {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Subscriber for LoggingSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, message: &BusMessage) -> Result<()> {
        info!(
            target: "autoheal::bus::monitor",
            monitor = %self.name,
            message_id = %message.id,
            topic = %message.topic,
            payload = %message.payload,
            "bus event"
        );
        Ok(())
    }
}

/// Forwards messages into an unbounded tokio channel for async consumers.
#[derive(Debug)]
pub struct ChannelSubscriber {
    name: String,
    sender: UnboundedSender<BusMessage>,
}

impl ChannelSubscriber {
    /// Build a subscriber together with the receiving half of its channel.
    pub fn new(name: impl Into<String>) -> (Self, UnboundedReceiver<BusMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                name: name.into(),
                sender,
            },
            receiver,
        )
    }
}

impl Subscriber for ChannelSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, message: &BusMessage) -> Result<()> {
        self.sender
            .send(message.clone())
            .map_err(|_| anyhow!("receiver for '{}' has been dropped", self.name))
    }
}
