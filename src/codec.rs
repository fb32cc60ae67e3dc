//! Module defining how records are turned into message payloads

use serde::Serialize;

use crate::error::Error;

/// Encodes a record into the bytes published to `topic`
pub trait PayloadSerializer<T> {
    fn serialize(&self, topic: &str, record: &T) -> Result<Vec<u8>, Error>;
}

/// JSON encoding via the record's `Serialize` implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl<T: Serialize> PayloadSerializer<T> for JsonSerializer {
    fn serialize(&self, _topic: &str, record: &T) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(record)?)
    }
}
