//! Module defining the generic reader converting a header-delimited file into typed records.

use std::fs::File;
use std::io::{BufReader, Read};
use std::marker::PhantomData;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{Span, debug, info, info_span, warn};

use crate::domain::{FieldType, Record};
use crate::error::{Error, invalid_numeric, source_unavailable};


const PROGRESS_INTERVAL: u64 = 100_000;

/// Counts of one completed read. `read + skipped` is the number of data lines of the source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadStats {
    pub read: u64,
    pub skipped: u64,
}

impl ReadStats {
    pub fn total(&self) -> u64 {
        self.read + self.skipped
    }
}

/// The valid records of a source, in file order, with the counts of the read
#[derive(Debug)]
pub struct ReadOutcome<T> {
    pub records: Vec<T>,
    pub stats: ReadStats,
}

/// Reads a whole tabular source into records of kind `T`.
///
/// Lines failing the parse rule of `T` are skipped, counted and logged; only a source which cannot be
/// opened or streamed fails the read.
pub struct TabularReader<T> {
    span: Span,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Default for TabularReader<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> TabularReader<T> {
    pub fn new() -> Self {
        Self {
            span: info_span!("read", kind = %T::KIND),
            _record: PhantomData,
        }
    }

    /// Replaces the span all log lines of this reader are emitted in
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Result<ReadOutcome<T>, Error> {
        let path = path.as_ref();
        let _entered = self.span.enter();

        info!(path = %path.display(), "reading {} from CSV file", T::KIND);
        let file = File::open(path).map_err(|e| source_unavailable(path, e))?;
        self.read_records(BufReader::new(file))
    }

    /// Same as [`read`](Self::read) for a source which is already open
    pub fn read_from(&self, reader: impl Read) -> Result<ReadOutcome<T>, Error> {
        let _entered = self.span.enter();
        self.read_records(reader)
    }

    fn read_records(&self, reader: impl Read) -> Result<ReadOutcome<T>, Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let header = Header::new(csv_reader.headers()?);
        header.warn_about_missing_columns::<T>();

        let mut records = Vec::new();
        let mut stats = ReadStats::default();

        for result in csv_reader.records() {
            let parsed = match result {
                Ok(line) => {
                    let line_no = line_number(line.position());
                    let row = Row::new(&header, &line, line_no);
                    T::from_row(&row).map_err(|e| (line_no, e))
                }
                Err(e) if is_stream_failure(&e) => return Err(e.into()),
                Err(e) => Err((line_number(e.position()), Error::MalformedLine(e.to_string()))),
            };

            match parsed {
                Ok(record) => {
                    records.push(record);
                    stats.read += 1;
                    if stats.read % PROGRESS_INTERVAL == 0 {
                        debug!(read = stats.read, "processed {} records", stats.read);
                    }
                }
                Err((line, error)) => {
                    stats.skipped += 1;
                    warn!(line, %error, "error parsing CSV record, skipping record");
                }
            }
        }

        info!(
            read = stats.read,
            skipped = stats.skipped,
            "successfully read {} {} from CSV, {} errors encountered",
            stats.read,
            T::KIND,
            stats.skipped
        );
        Ok(ReadOutcome { records, stats })
    }
}

fn line_number(position: Option<&csv::Position>) -> u64 {
    position.map(csv::Position::line).unwrap_or_default()
}

// Only I/O failures end the read. Everything else is confined to the line it was raised for.
fn is_stream_failure(error: &csv::Error) -> bool {
    matches!(error.kind(), csv::ErrorKind::Io(_))
}

/// Column names of a source, matched case-insensitively
#[derive(Debug)]
pub(crate) struct Header {
    names: Vec<String>,
}

impl Header {
    fn new(header: &csv::StringRecord) -> Self {
        Self {
            names: header.iter().map(|name| name.trim().to_string()).collect(),
        }
    }

    fn index_of(&self, column: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
    }

    fn warn_about_missing_columns<T: Record>(&self) {
        for field in T::SCHEMA {
            if self.index_of(field.name).is_none() {
                if field.is_required() {
                    warn!(column = field.name, "required column is missing, every record will be rejected");
                } else {
                    warn!(column = field.name, "optional column is missing, treating it as absent");
                }
            }
        }
    }
}

enum Lookup<'a> {
    Unmapped,
    Blank,
    Value(&'a str),
}

/// Named access to the fields of one data line, handed to [`Record::from_row`].
///
/// `required_*` accessors fail the record; `optional_*` accessors degrade to `None`.
pub struct Row<'a> {
    header: &'a Header,
    line: &'a csv::StringRecord,
    line_number: u64,
}

impl<'a> Row<'a> {
    pub(crate) fn new(header: &'a Header, line: &'a csv::StringRecord, line_number: u64) -> Self {
        Self {
            header,
            line,
            line_number,
        }
    }

    fn lookup(&self, column: &str) -> Lookup<'a> {
        let Some(index) = self.header.index_of(column) else {
            return Lookup::Unmapped;
        };
        // a short row leaves the trailing columns blank
        match self.line.get(index).map(str::trim) {
            Some(value) if !value.is_empty() => Lookup::Value(value),
            _ => Lookup::Blank,
        }
    }

    fn required_str(&self, column: &'static str) -> Result<&'a str, Error> {
        match self.lookup(column) {
            Lookup::Unmapped => Err(Error::MissingField(column)),
            Lookup::Blank => Err(Error::EmptyRequiredField(column)),
            Lookup::Value(value) => Ok(value),
        }
    }

    fn optional_str(&self, column: &'static str) -> Option<&'a str> {
        match self.lookup(column) {
            // already reported once for the whole source
            Lookup::Unmapped => None,
            Lookup::Blank => {
                debug!(
                    line = self.line_number,
                    column, "optional column is empty, treating as absent"
                );
                None
            }
            Lookup::Value(value) => Some(value),
        }
    }

    fn required_number<N: FromStr>(
        &self,
        column: &'static str,
        field_type: FieldType,
    ) -> Result<N, Error> {
        let value = self.required_str(column)?;
        value
            .parse()
            .map_err(|_| invalid_numeric(column, field_type, value))
    }

    fn optional_number<N: FromStr>(&self, column: &'static str, field_type: FieldType) -> Option<N> {
        let value = self.optional_str(column)?;
        match value.parse() {
            Ok(number) => Some(number),
            Err(_) => {
                warn!(
                    line = self.line_number,
                    column,
                    value,
                    "optional column is not a valid {field_type}, treating as absent"
                );
                None
            }
        }
    }

    pub fn required_text(&self, column: &'static str) -> Result<String, Error> {
        self.required_str(column).map(str::to_owned)
    }

    pub fn optional_text(&self, column: &'static str) -> Option<String> {
        self.optional_str(column).map(str::to_owned)
    }

    pub fn required_decimal(&self, column: &'static str) -> Result<Decimal, Error> {
        self.required_number(column, FieldType::Decimal)
    }

    pub fn optional_decimal(&self, column: &'static str) -> Option<Decimal> {
        self.optional_number(column, FieldType::Decimal)
    }

    pub fn required_integer(&self, column: &'static str) -> Result<i32, Error> {
        self.required_number(column, FieldType::Integer)
    }

    pub fn optional_integer(&self, column: &'static str) -> Option<i32> {
        self.optional_number(column, FieldType::Integer)
    }

    pub fn required_long(&self, column: &'static str) -> Result<i64, Error> {
        self.required_number(column, FieldType::Long)
    }

    pub fn optional_long(&self, column: &'static str) -> Option<i64> {
        self.optional_number(column, FieldType::Long)
    }
}
