//! Kafka consumer backed by librdkafka.
//!
//! [`KafkaSource`] wraps a [`BaseConsumer`] and turns everything it receives into
//! [`InboundEvent`]s. Messages and errors (including all brokers being down) come out of `poll`
//! directly. Rebalances are delivered by librdkafka through the [`SourceContext`] callbacks,
//! which run inside `poll` on the polling thread. The context queues them so that they are
//! returned in the order they happened.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, info, trace, warn};
use rdkafka::client::ClientContext;
use rdkafka::consumer::{BaseConsumer, Consumer, ConsumerContext, Rebalance};
use rdkafka::error::{KafkaError, KafkaResult, RDKafkaErrorCode};
use rdkafka::topic_partition_list::TopicPartitionList;

use crate::config::BrokerConfig;
use crate::error::{ConsumerError, ConsumerResult};
use crate::events::{EventSource, InboundEvent, Polled};
use crate::message::Message;

/// Consumer context that queues the events librdkafka reports through callbacks.
#[derive(Default)]
pub struct SourceContext {
    pending: Mutex<VecDeque<InboundEvent>>,
}

impl SourceContext {
    fn push(&self, event: InboundEvent) {
        match self.pending.lock() {
            Ok(mut pending) => pending.push_back(event),
            Err(poisoned) => poisoned.into_inner().push_back(event),
        }
    }

    fn drain(&self) -> Vec<InboundEvent> {
        match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }
}

impl ClientContext for SourceContext {
    // The same error event is also returned by the consumer poll, which is where it gets reported.
    fn error(&self, error: KafkaError, reason: &str) {
        debug!("librdkafka error: {}: {}", error, reason);
    }
}

impl ConsumerContext for SourceContext {
    fn pre_rebalance<'a>(&self, rebalance: &Rebalance<'a>) {
        info!("Pre rebalance {:?}", rebalance);
    }

    fn post_rebalance<'a>(&self, rebalance: &Rebalance<'a>) {
        info!("Post rebalance {:?}", rebalance);
        self.push(InboundEvent::Other(format!("rebalance {:?}", rebalance)));
    }

    fn commit_callback(&self, result: KafkaResult<()>, _offsets: &TopicPartitionList) {
        match result {
            Ok(_) => debug!("Offsets committed successfully"),
            Err(e) => warn!("Error while committing offsets: {}", e),
        };
    }
}

/// A consumer type with the queuing context.
pub type QueuingConsumer = BaseConsumer<SourceContext>;

/// An [`EventSource`] reading from a Kafka cluster.
pub struct KafkaSource {
    consumer: QueuingConsumer,
    metadata_timeout: Option<Duration>,
    backlog: VecDeque<InboundEvent>,
}

impl KafkaSource {
    /// Creates the consumer described by `config`.
    ///
    /// If the configuration enables the metadata checks, the cluster is queried once so that an
    /// unreachable cluster or rejected credentials fail here rather than inside the poll loop.
    pub fn connect(config: &BrokerConfig) -> ConsumerResult<KafkaSource> {
        let consumer: QueuingConsumer = config
            .client_config()?
            .create_with_context(SourceContext::default())
            .map_err(ConsumerError::Connection)?;

        let metadata_timeout = config.metadata_timeout();
        if let Some(timeout) = metadata_timeout {
            let metadata = consumer
                .fetch_metadata(None, timeout)
                .map_err(ConsumerError::Connection)?;
            info!(
                "Connected to {} broker(s), {} topic(s) visible",
                metadata.brokers().len(),
                metadata.topics().len()
            );
        }

        Ok(KafkaSource {
            consumer,
            metadata_timeout,
            backlog: VecDeque::new(),
        })
    }

    /// Returns the underlying consumer.
    pub fn consumer(&self) -> &QueuingConsumer {
        &self.consumer
    }

    fn check_topic(&self, topic: &str, timeout: Duration) -> ConsumerResult<()> {
        let metadata = self
            .consumer
            .fetch_metadata(Some(topic), timeout)
            .map_err(|e| ConsumerError::Subscription(topic.to_owned(), e))?;
        let Some(found) = metadata.topics().iter().find(|t| t.name() == topic) else {
            return Err(ConsumerError::UnknownTopic(topic.to_owned()));
        };
        match found.error().map(RDKafkaErrorCode::from) {
            None => Ok(()),
            Some(RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::UnknownTopic) => {
                Err(ConsumerError::UnknownTopic(topic.to_owned()))
            }
            Some(code) => Err(ConsumerError::Subscription(
                topic.to_owned(),
                KafkaError::MetadataFetch(code),
            )),
        }
    }
}

impl EventSource for KafkaSource {
    fn subscribe(&mut self, topic: &str) -> ConsumerResult<()> {
        if let Some(timeout) = self.metadata_timeout {
            self.check_topic(topic, timeout)?;
        }
        self.consumer
            .subscribe(&[topic])
            .map_err(|e| ConsumerError::Subscription(topic.to_owned(), e))?;
        info!("Subscribed to topic {}", topic);
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Polled {
        if let Some(event) = self.backlog.pop_front() {
            return Polled::Event(event);
        }

        let polled = self.consumer.poll(timeout).map(|result| match result {
            Ok(message) => InboundEvent::Message(Message::from_kafka(&message)),
            Err(error) => InboundEvent::Error(error),
        });

        // Callbacks served by this poll happened before the message it returned.
        self.backlog.extend(self.consumer.context().drain());
        self.backlog.extend(polled);

        match self.backlog.pop_front() {
            Some(event) => Polled::Event(event),
            None => Polled::Idle,
        }
    }

    fn close(self) {
        trace!("Closing consumer");
        self.consumer.unsubscribe();
        if !self.backlog.is_empty() {
            debug!("Dropping {} undelivered event(s)", self.backlog.len());
        }
        drop(self.consumer);
        trace!("Consumer closed");
    }
}
