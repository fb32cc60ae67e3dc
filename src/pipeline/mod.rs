//! Module orchestrating one run: each record kind is read in full, then published through its own dispatcher.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{Instrument, info, info_span, warn};

use crate::broker::Broker;
use crate::config::Properties;
use crate::dispatch::{DispatchStats, EventDispatcher, TopicSource};
use crate::domain::{LinkRecord, MovieRecord, RatingRecord, Record, RecordKind, TagRecord};
use crate::error::Error;
use crate::input::{ReadOutcome, ReadStats, TabularReader};


/// Which variant of the dataset to read
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DataSet {
    /// `<kind>_small.csv` files
    #[default]
    Small,
    /// `<kind>.csv` files
    Large,
}

impl DataSet {
    pub fn file_name(self, kind: RecordKind) -> String {
        match self {
            DataSet::Small => format!("{}_small.csv", kind.name()),
            DataSet::Large => format!("{}.csv", kind.name()),
        }
    }
}

/// The source file of every record kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sources {
    movies: PathBuf,
    ratings: PathBuf,
    tags: PathBuf,
    links: PathBuf,
}

impl Sources {
    /// The files of `data_set` inside `data_dir`
    pub fn in_dir(data_dir: impl AsRef<Path>, data_set: DataSet) -> Self {
        let dir = data_dir.as_ref();
        Self {
            movies: dir.join(data_set.file_name(RecordKind::Movie)),
            ratings: dir.join(data_set.file_name(RecordKind::Rating)),
            tags: dir.join(data_set.file_name(RecordKind::Tag)),
            links: dir.join(data_set.file_name(RecordKind::Link)),
        }
    }

    pub fn path(&self, kind: RecordKind) -> &Path {
        match kind {
            RecordKind::Movie => &self.movies,
            RecordKind::Rating => &self.ratings,
            RecordKind::Tag => &self.tags,
            RecordKind::Link => &self.links,
        }
    }

    pub fn with_path(mut self, kind: RecordKind, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match kind {
            RecordKind::Movie => self.movies = path,
            RecordKind::Rating => self.ratings = path,
            RecordKind::Tag => self.tags = path,
            RecordKind::Link => self.links = path,
        }
        self
    }
}

/// What happened to one record kind. `dispatch` is `None` when nothing was read and the kind was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSummary {
    pub kind: RecordKind,
    pub read: ReadStats,
    pub dispatch: Option<DispatchStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub kinds: Vec<KindSummary>,
}

impl RunSummary {
    pub fn get(&self, kind: RecordKind) -> Option<&KindSummary> {
        self.kinds.iter().find(|summary| summary.kind == kind)
    }
}

/// Publishes the whole dataset, one kind after the other in [`RecordKind::ALL`] order.
///
/// `connect` opens one broker connection per published kind. The first fatal error aborts the run; any
/// dispatcher open at that point is closed first.
pub async fn run<B, C>(
    config: &Properties,
    sources: &Sources,
    connect: C,
    flush_timeout: Duration,
) -> Result<RunSummary, Error>
where
    B: Broker,
    C: Fn(&Properties) -> Result<B, Error>,
{
    let started = Instant::now();
    info!("starting to publish the dataset");

    let kinds = vec![
        publish_kind::<MovieRecord, B, C>(config, sources, &connect, flush_timeout).await?,
        publish_kind::<RatingRecord, B, C>(config, sources, &connect, flush_timeout).await?,
        publish_kind::<TagRecord, B, C>(config, sources, &connect, flush_timeout).await?,
        publish_kind::<LinkRecord, B, C>(config, sources, &connect, flush_timeout).await?,
    ];

    info!(elapsed = ?started.elapsed(), "finished publishing the dataset");
    Ok(RunSummary { kinds })
}

async fn publish_kind<T, B, C>(
    config: &Properties,
    sources: &Sources,
    connect: &C,
    flush_timeout: Duration,
) -> Result<KindSummary, Error>
where
    T: Record + Serialize,
    B: Broker,
    C: Fn(&Properties) -> Result<B, Error>,
{
    let span = info_span!("publish", kind = %T::KIND);
    let path = sources.path(T::KIND);

    let ReadOutcome { records, stats } = span.in_scope(|| TabularReader::<T>::new().read(path))?;
    if records.is_empty() {
        span.in_scope(|| warn!(path = %path.display(), "no {} read, skipping", T::KIND));
        return Ok(KindSummary {
            kind: T::KIND,
            read: stats,
            dispatch: None,
        });
    }

    let topic = TopicSource::for_kind(T::KIND);
    let mut dispatcher = span
        .in_scope(|| EventDispatcher::<T, B>::from_config(config, &topic, connect))?
        .with_flush_timeout(flush_timeout);

    async move {
        info!(records = records.len(), "sending {} to topic {}", T::KIND, dispatcher.topic());
        let sent = records
            .into_iter()
            .try_for_each(|record| dispatcher.send(record));
        // the connection is released before a send error is propagated
        let closed = dispatcher.close().await;
        sent?;
        let dispatched = closed?;

        info!(
            sent = dispatched.sent,
            delivered = dispatched.delivered,
            failed = dispatched.failed,
            "done with {}",
            T::KIND
        );
        Ok(KindSummary {
            kind: T::KIND,
            read: stats,
            dispatch: Some(dispatched),
        })
    }
    .instrument(span)
    .await
}
