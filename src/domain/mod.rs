//! Module for the types defining the record domain: the four record kinds and the schema describing their columns.

use std::fmt;

use crate::error::Error;
use crate::input::Row;

mod records;

pub use records::{LinkRecord, MovieRecord, RatingRecord, TagRecord};

/// A typed value parsed from one line of a tabular source.
///
/// Implementors are driven by [`TabularReader`](crate::TabularReader) through their `SCHEMA` and
/// `from_row`, and by [`EventDispatcher`](crate::EventDispatcher) through `partition_key`.
pub trait Record: Sized {
    const KIND: RecordKind;

    /// The columns this record is built from
    const SCHEMA: &'static [FieldSpec];

    /// Parse rule: builds the record from one row, failing the whole record on any required-field problem
    fn from_row(row: &Row<'_>) -> Result<Self, Error>;

    /// The key used to route the record to a partition of its topic. Never empty for a parsed record.
    fn partition_key(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Movie,
    Rating,
    Tag,
    Link,
}

impl RecordKind {
    /// All kinds, in the order the pipeline processes them
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Movie,
        RecordKind::Rating,
        RecordKind::Tag,
        RecordKind::Link,
    ];

    /// Plural name, used for file names, topic config keys and log lines
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Movie => "movies",
            RecordKind::Rating => "ratings",
            RecordKind::Tag => "tags",
            RecordKind::Link => "links",
        }
    }

    /// Configuration key holding the topic name for this kind, e.g. `topic.movies`
    pub fn topic_config_key(self) -> String {
        format!("topic.{}", self.name())
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The value types a column can be coerced into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Decimal,
    Integer,
    Long,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Decimal => "decimal",
            FieldType::Integer => "integer",
            FieldType::Long => "long integer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Absent, blank or unparseable content rejects the record
    Required,
    /// Absent, blank or unparseable content degrades to `None`
    Optional,
}

/// Declares one column of a record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub presence: Presence,
}

impl FieldSpec {
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            presence: Presence::Required,
        }
    }

    pub const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            presence: Presence::Optional,
        }
    }

    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }
}
