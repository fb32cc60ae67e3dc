//! In-memory broker recording every published message.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future;
use movie_events_rs::{Broker, DeliveryFuture, DeliveryReport, Error, Properties};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub key: String,
    pub payload: serde_json::Value,
}

/// Shared state of all connections opened through one [`Cluster`]
#[derive(Debug, Default)]
struct State {
    messages: Vec<Message>,
    open: HashSet<String>,
    connections: usize,
}

/// Stand-in for a broker cluster. Only one connection per `bootstrap.servers` value may be open at a time,
/// so a connection which is never released makes the next connect fail.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    state: Arc<Mutex<State>>,
    rejected_keys: Arc<HashSet<String>>,
}

impl Cluster {
    /// A cluster refusing to enqueue messages with any of `keys`
    pub fn rejecting(keys: &[&str]) -> Self {
        Self {
            rejected_keys: Arc::new(keys.iter().map(|k| k.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn connect(&self, config: &Properties) -> Result<RecordingBroker, Error> {
        let address = config.get("bootstrap.servers").unwrap_or("mock:9092").to_string();
        let mut state = self.state.lock().unwrap();
        if !state.open.insert(address.clone()) {
            return Err(Error::Delivery(format!("{address} is still connected")));
        }
        state.connections += 1;
        Ok(RecordingBroker {
            address,
            cluster: self.clone(),
        })
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn messages_on(&self, topic: &str) -> Vec<Message> {
        self.messages().into_iter().filter(|m| m.topic == topic).collect()
    }

    /// Number of connections opened so far
    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().connections
    }

    pub fn open_connections(&self) -> usize {
        self.state.lock().unwrap().open.len()
    }
}

pub struct RecordingBroker {
    address: String,
    cluster: Cluster,
}

impl Drop for RecordingBroker {
    fn drop(&mut self) {
        self.cluster.state.lock().unwrap().open.remove(&self.address);
    }
}

impl Broker for RecordingBroker {
    fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<DeliveryFuture, Error> {
        if self.cluster.rejected_keys.contains(key) {
            return Err(Error::Delivery(format!("message {key} rejected")));
        }
        let payload = serde_json::from_slice(&payload)?;
        let mut state = self.cluster.state.lock().unwrap();
        state.messages.push(Message {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
        });
        let offset = state.messages.len() as i64 - 1;
        Ok(future::ready(Ok(DeliveryReport {
            partition: 0,
            offset,
        }))
        .boxed())
    }

    fn flush(&self, _timeout: Duration) -> Result<(), Error> {
        Ok(())
    }
}

pub const CLIENT_PROPERTIES: &str = "\
bootstrap.servers=mock:9092
topic.movies=movies
topic.ratings=ratings
topic.tags=tags
topic.links=links";

pub const MOVIES_HEADER: &str = "movieId,title,genres";
pub const RATINGS_HEADER: &str = "userId,movieId,rating,timestamp";
pub const TAGS_HEADER: &str = "userId,movieId,tag,timestamp";
pub const LINKS_HEADER: &str = "movieId,imdbId,tmdbId";

/// Writes `content` to `name` inside `dir`
pub fn write_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    std::fs::write(&path, content)
        .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
}
