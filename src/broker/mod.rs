//! Module defining the seam to the message broker: publish a keyed payload, get a future delivery outcome.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tracing::info;

use crate::config::Properties;
use crate::error::Error;

mod kafka;

pub use kafka::KafkaBroker;

/// Where the broker stored a delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub partition: i32,
    pub offset: i64,
}

/// Resolves once the broker acknowledged or gave up on a message. Never needs to be polled for the
/// message to be delivered.
pub type DeliveryFuture = BoxFuture<'static, Result<DeliveryReport, Error>>;

/// A connection to a publish/subscribe broker.
///
/// Dropping the value releases the connection.
pub trait Broker: Send + 'static {
    /// Enqueues a message for asynchronous delivery without waiting for the broker.
    ///
    /// May block the calling thread while the client's local send queue is full.
    fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<DeliveryFuture, Error>;

    /// Blocks until all enqueued messages were delivered or the timeout elapsed
    fn flush(&self, timeout: Duration) -> Result<(), Error>;
}

/// Broker which only logs what it is given. Used for dry runs.
///
/// Partitions are chosen by hashing the key; offsets count up per partition.
pub struct LogBroker {
    offsets: Mutex<Vec<i64>>,
}

impl LogBroker {
    pub fn new(partitions: usize) -> Self {
        Self {
            offsets: Mutex::new(vec![0; partitions.max(1)]),
        }
    }

    /// Reads the partition count from `dry.run.partitions`, defaulting to a single partition
    pub fn connect(config: &Properties) -> Result<Self, Error> {
        let partitions = config
            .get("dry.run.partitions")
            .and_then(|p| p.parse().ok())
            .unwrap_or(1);
        info!(partitions, "using log broker, nothing will be published");
        Ok(Self::new(partitions))
    }

    fn assign(&self, key: &str) -> DeliveryReport {
        let mut offsets = self
            .offsets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let partition = (hasher.finish() % offsets.len() as u64) as usize;

        let offset = offsets[partition];
        offsets[partition] += 1;
        DeliveryReport {
            partition: partition as i32,
            offset,
        }
    }
}

impl Broker for LogBroker {
    fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<DeliveryFuture, Error> {
        let report = self.assign(key);
        info!(
            topic,
            key,
            bytes = payload.len(),
            payload = %String::from_utf8_lossy(&payload),
            "message"
        );
        Ok(future::ready(Ok(report)).boxed())
    }

    fn flush(&self, _timeout: Duration) -> Result<(), Error> {
        // nothing is buffered
        Ok(())
    }
}
