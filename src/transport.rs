//! Pub/sub transport seam.
//!
//! The real delivery substrate (broker connectivity, QoS, reconnection) lives
//! outside this crate. Devices only ever see the narrow capability modeled
//! here: bind a device id to get a command-inbound stream and a publish
//! handle, publish bytes to a topic, unbind. [`LoopbackTransport`] is the
//! in-process implementation used by the driver binary and the test suite.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use uuid::Uuid;

/// Command-inbound topic for a device.
pub fn command_topic(device_id: &Uuid) -> String {
    format!("devices/{device_id}/commands/binary")
}

/// Data-outbound topic for a device.
pub fn data_topic(device_id: &Uuid) -> String {
    format!("devices/{device_id}/binary")
}

/// One delivered message: the topic it arrived on plus the raw frame bytes.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish capability handed to a bound device.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;
}

/// A device's transport binding: inbound command stream plus publish handle.
pub struct Channel {
    pub device_id: Uuid,
    pub inbound: mpsc::UnboundedReceiver<Envelope>,
    pub publisher: Arc<dyn Publisher>,
}

/// The transport capability the simulation driver consumes.
pub trait Transport: Send + Sync {
    /// Subscribe the device's command topic and return its channel.
    fn bind(&self, device_id: Uuid) -> Result<Channel, TransportError>;

    /// Tear down the device's subscription. Idempotent.
    fn unbind(&self, device_id: Uuid);
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("device {0} is already bound")]
    AlreadyBound(Uuid),

    #[error("subscriber channel for {0} is closed")]
    ChannelClosed(String),
}

#[derive(Default)]
struct Routes {
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Envelope>>>,
}

impl Routes {
    fn deliver(&mut self, topic: &str, payload: &[u8]) {
        if let Some(senders) = self.subscribers.get_mut(topic) {
            senders.retain(|tx| {
                tx.send(Envelope {
                    topic: topic.to_string(),
                    payload: payload.to_vec(),
                })
                .is_ok()
            });
        }
    }
}

/// In-process topic router with loopback delivery.
///
/// Messages published to a topic are delivered synchronously to every live
/// subscriber of that topic; topics with no subscribers drop messages, the
/// same as a QoS-0 broker with nobody listening.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    routes: Arc<Mutex<Routes>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to an arbitrary topic. Used by monitors and tests to observe
    /// device data topics or to inject command frames.
    pub fn subscribe(&self, topic: &str) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes
            .lock()
            .expect("transport routes lock poisoned")
            .subscribers
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        rx
    }
}

impl Publisher for LoopbackTransport {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.routes
            .lock()
            .expect("transport routes lock poisoned")
            .deliver(topic, payload);
        Ok(())
    }
}

impl Transport for LoopbackTransport {
    fn bind(&self, device_id: Uuid) -> Result<Channel, TransportError> {
        let topic = command_topic(&device_id);
        let mut routes = self.routes.lock().expect("transport routes lock poisoned");
        if routes
            .subscribers
            .get(&topic)
            .is_some_and(|senders| !senders.is_empty())
        {
            return Err(TransportError::AlreadyBound(device_id));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        routes.subscribers.entry(topic).or_default().push(tx);

        Ok(Channel {
            device_id,
            inbound: rx,
            publisher: Arc::new(self.clone()),
        })
    }

    fn unbind(&self, device_id: Uuid) {
        let topic = command_topic(&device_id);
        self.routes
            .lock()
            .expect("transport routes lock poisoned")
            .subscribers
            .remove(&topic);
    }
}
