use std::time::{Duration, Instant};

use futures::FutureExt;
use rdkafka::ClientConfig;
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info, warn};

use crate::broker::{Broker, DeliveryFuture, DeliveryReport};
use crate::config::Properties;
use crate::error::Error;

struct KafkaContext;

impl rdkafka::ClientContext for KafkaContext {}

/// How long `publish` keeps retrying while the local producer queue is full, unless `max.block.ms` says otherwise
const DEFAULT_MAX_BLOCK: Duration = Duration::from_secs(60);
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(10);

/// Kafka producer connection. Every client setting of the configuration is handed to librdkafka.
pub struct KafkaBroker {
    producer: FutureProducer<KafkaContext>,
    max_block: Duration,
}

impl KafkaBroker {
    pub fn connect(config: &Properties) -> Result<Self, Error> {
        let mut client_config = ClientConfig::new();
        for (key, value) in config.client_settings() {
            client_config.set(key, value);
        }

        info!(
            "connecting to Kafka brokers at {}...",
            config.get("bootstrap.servers").unwrap_or("<unset>")
        );
        debug!(settings = config.client_settings().count(), "creating producer");
        let producer: FutureProducer<KafkaContext> =
            client_config.create_with_context(KafkaContext)?;

        let max_block = config
            .get("max.block.ms")
            .and_then(|ms| ms.trim().parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MAX_BLOCK);

        Ok(Self {
            producer,
            max_block,
        })
    }
}

impl Broker for KafkaBroker {
    fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<DeliveryFuture, Error> {
        let deadline = Instant::now() + self.max_block;
        let mut warned = false;

        let delivery = loop {
            let record = FutureRecord::to(topic).key(key).payload(&payload);
            match self.producer.send_result(record) {
                Ok(delivery) => break delivery,
                Err((e, _))
                    if e.rdkafka_error_code() == Some(RDKafkaErrorCode::QueueFull)
                        && Instant::now() < deadline =>
                {
                    if !warned {
                        warn!("producer queue is full, waiting for deliveries to drain it");
                        warned = true;
                    }
                    wait_for_queue_space();
                }
                Err((e, _)) => return Err(e.into()),
            }
        };

        Ok(async move {
            match delivery.await {
                // the producer went away before reporting
                Err(_) => Err(Error::DeliveryCanceled),
                Ok(Err((e, _))) => Err(e.into()),
                Ok(Ok((partition, offset))) => Ok(DeliveryReport { partition, offset }),
            }
        }
        .boxed())
    }

    fn flush(&self, timeout: Duration) -> Result<(), Error> {
        self.producer.flush(timeout)?;
        Ok(())
    }
}

// `publish` is called from async code; on a multi-threaded runtime the worker hands its other tasks off
// while this thread sleeps. A current-thread runtime cannot do that and is blocked for the backoff.
fn wait_for_queue_space() {
    match Handle::try_current() {
        Ok(runtime) if runtime.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| std::thread::sleep(QUEUE_FULL_BACKOFF))
        }
        _ => std::thread::sleep(QUEUE_FULL_BACKOFF),
    }
}
