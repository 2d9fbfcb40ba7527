//! Error manipulations.

use std::path::PathBuf;
use std::{error, fmt, io};

use rdkafka::error::{KafkaError, RDKafkaErrorCode};

use crate::session::State;

/// Consumer result.
pub type ConsumerResult<T> = Result<T, ConsumerError>;

/// Represents all the errors that stop the consumer before its poll loop starts.
///
/// Errors received while the loop is running are not represented here: they are delivered as
/// [`InboundEvent::Error`](crate::events::InboundEvent::Error) and reported by the event handler.
#[derive(Debug)]
pub enum ConsumerError {
    /// Invalid consumer configuration.
    Config(String),
    /// The configuration file could not be read or parsed.
    ConfigFile(PathBuf, String),
    /// Client creation failed, or the cluster could not be reached.
    Connection(KafkaError),
    /// Subscribing to the topic failed.
    Subscription(String, KafkaError),
    /// The topic is not known to the cluster.
    UnknownTopic(String),
    /// The termination signal handlers could not be installed.
    SignalSetup(io::Error),
    /// The operation is not valid in the current session state.
    InvalidState {
        /// Name of the rejected operation.
        operation: &'static str,
        /// State of the session when the operation was attempted.
        state: State,
    },
}

impl fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConsumerError::Config(err) => write!(f, "Invalid configuration: {}", err),
            ConsumerError::ConfigFile(path, err) => {
                write!(f, "Cannot load configuration file {}: {}", path.display(), err)
            }
            ConsumerError::Connection(err) => write!(f, "Failed to create consumer: {}", err),
            ConsumerError::Subscription(topic, err) => {
                write!(f, "Failed to subscribe to topic {}: {}", topic, err)
            }
            ConsumerError::UnknownTopic(topic) => {
                write!(f, "Failed to subscribe to topic {}: topic does not exist", topic)
            }
            ConsumerError::SignalSetup(err) => {
                write!(f, "Cannot install signal handlers: {}", err)
            }
            ConsumerError::InvalidState { operation, state } => {
                write!(f, "Cannot {} a session in state {:?}", operation, state)
            }
        }
    }
}

impl error::Error for ConsumerError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ConsumerError::Connection(err) | ConsumerError::Subscription(_, err) => Some(err),
            ConsumerError::SignalSetup(err) => Some(err),
            _ => None,
        }
    }
}

/// Reports whether a broker error means that none of the brokers can be reached anymore.
///
/// librdkafka raises `AllBrokersDown` as a global error once every connection is lost; the
/// consumer loop treats it as the only fatal runtime condition.
pub fn is_all_brokers_down(err: &KafkaError) -> bool {
    matches!(err.rdkafka_error_code(), Some(RDKafkaErrorCode::AllBrokersDown))
}
