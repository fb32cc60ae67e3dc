mod broker;
mod codec;
mod config;
mod dispatch;
mod domain;
mod error;
mod input;
mod pipeline;
mod telemetry;

pub use broker::{Broker, DeliveryFuture, DeliveryReport, KafkaBroker, LogBroker};
pub use codec::{JsonSerializer, PayloadSerializer};
pub use config::Properties;
pub use dispatch::{DEFAULT_FLUSH_TIMEOUT, DispatchStats, EventDispatcher, TopicSource};
pub use domain::{
    FieldSpec, FieldType, LinkRecord, MovieRecord, Presence, RatingRecord, Record, RecordKind,
    TagRecord,
};
pub use error::Error;
pub use input::{ReadOutcome, ReadStats, Row, TabularReader};
pub use pipeline::{DataSet, KindSummary, RunSummary, Sources};
pub use telemetry::setup_logging;

/// Reads every record kind of the dataset and publishes it to its configured topic.
///
/// Kinds are handled one after the other (movies, ratings, tags, links). Each file is read in full first;
/// lines which do not parse are logged and skipped. A kind without any valid record is skipped. The
/// records of a kind are then sent through an [`EventDispatcher`] whose topic is taken from the
/// `topic.<kind>` entry of `config` and whose broker connection is opened with `connect`.
///
/// # Errors
///
/// The run aborts on the first source which cannot be read, topic which is not configured, connection
/// which cannot be opened or record which cannot be enqueued. Delivery failures reported by the broker
/// afterwards do not abort the run; they are logged and counted in the returned [`RunSummary`].
///
/// # Example
///
/// ```no_run
/// use movie_events_rs::{DEFAULT_FLUSH_TIMEOUT, DataSet, KafkaBroker, Properties, Sources, publish};
///
/// # async fn run() -> Result<(), movie_events_rs::Error> {
/// let config = Properties::load("client.properties")?;
/// let sources = Sources::in_dir("ml_20m", DataSet::Small);
///
/// let summary = publish(&config, &sources, KafkaBroker::connect, DEFAULT_FLUSH_TIMEOUT).await?;
/// for kind in &summary.kinds {
///     println!("{}: {:?}", kind.kind, kind.dispatch);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn publish<B: Broker>(
    config: &Properties,
    sources: &Sources,
    connect: impl Fn(&Properties) -> Result<B, Error>,
    flush_timeout: std::time::Duration,
) -> Result<RunSummary, Error> {
    pipeline::run(config, sources, connect, flush_timeout).await
}
