//! Module defining the generic dispatcher publishing records to a broker topic.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{Instrument, Span, error, info, info_span, warn};

use crate::broker::{Broker, DeliveryFuture};
use crate::codec::{JsonSerializer, PayloadSerializer};
use crate::config::Properties;
use crate::domain::{Record, RecordKind};
use crate::error::Error;


pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the name of a dispatcher's topic comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicSource {
    Literal(String),
    /// Looked up in the configuration when the dispatcher is built
    ConfigKey(String),
}

impl TopicSource {
    /// The `topic.<kind>` configuration key of a record kind
    pub fn for_kind(kind: RecordKind) -> Self {
        TopicSource::ConfigKey(kind.topic_config_key())
    }

    pub fn resolve(&self, config: &Properties) -> Result<String, Error> {
        match self {
            TopicSource::Literal(name) => non_blank_topic(name),
            TopicSource::ConfigKey(key) => config
                .non_blank(key)
                .map(str::to_owned)
                .ok_or_else(|| Error::MissingTopicConfig(key.clone())),
        }
    }
}

fn non_blank_topic(name: &str) -> Result<String, Error> {
    let name = name.trim();
    if name.is_empty() {
        Err(Error::MissingTopicConfig("topic".to_string()))
    } else {
        Ok(name.to_string())
    }
}

/// Counts of a dispatcher. `delivered + failed` only reaches `sent` once the dispatcher is closed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Outcomes {
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Publishes records of kind `T` to one topic over a broker connection it owns.
///
/// `send` hands the record to the broker and returns; the delivery outcome is logged by a task on the
/// Tokio runtime the dispatcher was built in. `close` flushes and releases the connection.
#[derive(Debug)]
pub struct EventDispatcher<T, B, S = JsonSerializer> {
    topic: String,
    broker: Option<B>,
    serializer: S,
    runtime: Handle,
    in_flight: JoinSet<()>,
    sent: u64,
    outcomes: Arc<Outcomes>,
    abandon: watch::Sender<bool>,
    flush_timeout: Duration,
    span: Span,
    _record: PhantomData<fn(T)>,
}

impl<T: Record + Serialize, B: Broker> EventDispatcher<T, B> {
    pub fn new(broker: B, topic: impl Into<String>) -> Result<Self, Error> {
        Self::with_serializer(broker, topic, JsonSerializer)
    }

    /// Resolves the topic, then opens the connection with `connect`. No connection is opened when the
    /// topic does not resolve.
    pub fn from_config(
        config: &Properties,
        topic: &TopicSource,
        connect: impl FnOnce(&Properties) -> Result<B, Error>,
    ) -> Result<Self, Error> {
        let topic = topic.resolve(config)?;
        Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let broker = connect(config)?;
        Self::new(broker, topic)
    }
}

impl<T: Record, B: Broker, S: PayloadSerializer<T>> EventDispatcher<T, B, S> {
    pub fn with_serializer(
        broker: B,
        topic: impl Into<String>,
        serializer: S,
    ) -> Result<Self, Error> {
        let topic = non_blank_topic(&topic.into())?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let span = info_span!("dispatch", kind = %T::KIND, topic = %topic);

        Ok(Self {
            topic,
            broker: Some(broker),
            serializer,
            runtime,
            in_flight: JoinSet::new(),
            sent: 0,
            outcomes: Arc::default(),
            abandon: watch::Sender::new(false),
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            span,
            _record: PhantomData,
        })
    }

    /// Replaces the span all log lines of this dispatcher and its delivery reports are emitted in
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_flush_timeout(mut self, flush_timeout: Duration) -> Self {
        self.flush_timeout = flush_timeout;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_closed(&self) -> bool {
        self.broker.is_none()
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            sent: self.sent,
            delivered: self.outcomes.delivered.load(Ordering::Relaxed),
            failed: self.outcomes.failed.load(Ordering::Relaxed),
        }
    }

    /// Enqueues `record` for delivery, keyed by its partition key. Does not wait for the broker.
    ///
    /// Fails only when the record cannot be encoded or the broker refuses to enqueue it.
    pub fn send(&mut self, record: T) -> Result<(), Error> {
        let Some(broker) = &self.broker else {
            return Err(Error::DispatcherClosed(self.topic.clone()));
        };

        let key = record.partition_key().to_owned();
        let payload = self.serializer.serialize(&self.topic, &record)?;
        let delivery = broker.publish(&self.topic, &key, payload).inspect_err(|e| {
            self.span
                .in_scope(|| error!(key = %key, error = %e, "failed to enqueue event {key}"))
        })?;
        self.sent += 1;

        let report = report_delivery(
            key,
            delivery,
            Arc::clone(&self.outcomes),
            self.abandon.subscribe(),
        );
        self.in_flight
            .spawn_on(report.instrument(self.span.clone()), &self.runtime);

        // reap finished reports so long runs do not accumulate them
        while self.in_flight.try_join_next().is_some() {}
        Ok(())
    }

    /// Flushes outstanding messages, releases the connection and waits for every delivery report.
    ///
    /// Reports still missing one flush timeout after the connection was released are counted as failed.
    /// Closing a closed dispatcher does nothing and returns the final stats again.
    pub async fn close(&mut self) -> Result<DispatchStats, Error> {
        let Some(broker) = self.broker.take() else {
            return Ok(self.stats());
        };

        self.span.in_scope(|| info!("closing broker connection"));
        let timeout = self.flush_timeout;
        // the connection is released when the closure returns, whatever the flush outcome
        let flushed = match self.runtime.spawn_blocking(move || broker.flush(timeout)).await {
            Ok(flushed) => flushed,
            Err(e) => Err(Error::FlushInterrupted(e)),
        };
        if let Err(e) = &flushed {
            self.span
                .in_scope(|| warn!(error = %e, "flush failed, waiting for outstanding delivery reports"));
        }

        // a released connection resolves its outstanding deliveries, unless the broker stalls
        if tokio::time::timeout(timeout, self.drain()).await.is_err() {
            self.span.in_scope(|| {
                warn!(
                    outstanding = self.in_flight.len(),
                    "delivery reports still outstanding after {timeout:?}, counting them as failed"
                )
            });
            self.abandon.send_replace(true);
            self.drain().await;
        }

        let stats = self.stats();
        self.span.in_scope(|| {
            info!(
                sent = stats.sent,
                delivered = stats.delivered,
                failed = stats.failed,
                "dispatcher closed"
            )
        });
        flushed.map(|()| stats)
    }
}

impl<T, B, S> EventDispatcher<T, B, S> {
    async fn drain(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(e) = joined {
                self.span
                    .in_scope(|| error!(error = %e, "delivery report task failed"));
            }
        }
    }
}

impl<T, B, S> Drop for EventDispatcher<T, B, S> {
    fn drop(&mut self) {
        if self.broker.take().is_some() {
            self.span.in_scope(|| {
                warn!("dispatcher dropped without being closed, releasing the connection without flushing")
            });
        }
    }
}

async fn report_delivery(
    key: String,
    delivery: DeliveryFuture,
    outcomes: Arc<Outcomes>,
    mut abandon: watch::Receiver<bool>,
) {
    let outcome = tokio::select! {
        biased;
        outcome = delivery => outcome,
        _ = abandon.wait_for(|abandoned| *abandoned) => Err(Error::DeliveryAbandoned),
    };
    match outcome {
        Ok(report) => {
            outcomes.delivered.fetch_add(1, Ordering::Relaxed);
            info!(
                key = %key,
                partition = report.partition,
                offset = report.offset,
                "sent event {key} to partition {} with offset {}",
                report.partition,
                report.offset
            );
        }
        Err(e) => {
            outcomes.failed.fetch_add(1, Ordering::Relaxed);
            error!(key = %key, error = %e, "failed to send event {key}");
        }
    }
}
