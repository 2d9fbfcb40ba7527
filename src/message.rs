//! Store and manipulate received Kafka messages.

use std::borrow::Cow;
use std::str;

use rdkafka::message::Message as KafkaMessage;

/// A message received from the cluster.
///
/// Unlike librdkafka's borrowed messages, this type owns its data: it can outlive the consumer
/// that produced it, and it can be built by hand to drive the consumer loop without a broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    topic: String,
    partition: i32,
    offset: i64,
    key: Option<Vec<u8>>,
    value: Option<Vec<u8>>,
}

impl Message {
    /// Creates a new message.
    pub fn new<T: Into<String>>(
        topic: T,
        partition: i32,
        offset: i64,
        key: Option<Vec<u8>>,
        value: Option<Vec<u8>>,
    ) -> Message {
        Message {
            topic: topic.into(),
            partition,
            offset,
            key,
            value,
        }
    }

    /// Copies the content of a librdkafka message.
    pub fn from_kafka<M: KafkaMessage>(message: &M) -> Message {
        Message {
            topic: message.topic().to_owned(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            value: message.payload().map(<[u8]>::to_vec),
        }
    }

    /// Returns the name of the topic the message was received from.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the partition of the message.
    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// Returns the offset of the message within its partition.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Returns the key of the message, or `None` if there is no key.
    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    /// Returns the payload of the message, or `None` if there is no payload.
    pub fn payload(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Returns the payload as UTF-8, if it is valid UTF-8.
    pub fn payload_view(&self) -> Option<Result<&str, str::Utf8Error>> {
        self.payload().map(str::from_utf8)
    }

    /// Returns the key as text, replacing invalid UTF-8 sequences. A missing key is empty.
    pub fn key_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.key().unwrap_or_default())
    }

    /// Returns the payload as text, replacing invalid UTF-8 sequences. A missing payload is
    /// empty.
    pub fn payload_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.payload().unwrap_or_default())
    }
}
