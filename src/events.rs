//! Events produced by polling a consumer.

use std::time::Duration;

use rdkafka::error::KafkaError;

use crate::error::ConsumerResult;
use crate::message::Message;

/// An event received while polling.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    /// A message was consumed from the subscribed topic.
    Message(Message),
    /// The client reported an error.
    Error(KafkaError),
    /// Any other notification, e.g. a partition rebalance. These are reported and skipped.
    Other(String),
}

/// Outcome of a single bounded poll.
#[derive(Clone, Debug, PartialEq)]
pub enum Polled {
    /// An event was available.
    Event(InboundEvent),
    /// Nothing arrived before the timeout expired.
    Idle,
    /// The source will never produce another event.
    Exhausted,
}

/// A subscribable source of events, such as a Kafka consumer.
///
/// The consumer loop is written against this trait rather than against a concrete client, so that
/// it can be exercised without a running cluster.
pub trait EventSource {
    /// Registers interest in a single topic.
    fn subscribe(&mut self, topic: &str) -> ConsumerResult<()>;

    /// Waits at most `timeout` for the next event.
    fn poll(&mut self, timeout: Duration) -> Polled;

    /// Releases the source. Being consumed, a source can only be closed once.
    fn close(self)
    where
        Self: Sized;
}

/// Receives what the consumer loop observes.
pub trait EventHandler {
    /// Handles a received message.
    fn message(&mut self, message: Message);

    /// Reports an error. The loop decides by itself whether the error is fatal.
    fn error(&mut self, error: &KafkaError);

    /// Reports an event the loop does not act upon.
    fn ignored(&mut self, description: &str);

    /// Reports the termination signal that stopped the loop.
    fn signal(&mut self, _signal: i32) {}
}
