//! Consume a Kafka topic and print its JSON messages.
//!
//! The crate connects to a Kafka-compatible cluster through librdkafka (by default over SASL_SSL
//! with SCRAM-SHA-512), subscribes to a single topic, and prints every received message as
//! pretty-printed JSON followed by a one-line log entry.
//!
//! ## Overview
//!
//! - [`BrokerConfig`](config::BrokerConfig) holds the connection options and converts them to a
//!   librdkafka client configuration.
//! - [`Session`](session::Session) owns the consumer, subscribes it, runs the poll loop and
//!   releases the consumer exactly once.
//! - [`Formatter`](formatter::Formatter) prints each message and the events reported by the loop.
//! - [`ShutdownFlag`](signal::ShutdownFlag) records SIGINT and SIGTERM; the loop checks it
//!   between two polls.
//!
//! The loop runs on a single thread. Each poll waits at most
//! [`POLL_TIMEOUT`](session::POLL_TIMEOUT), which bounds how long a termination signal can go
//! unnoticed.
//!
//! ```no_run
//! use json_consumer::config::{BrokerConfig, Secret};
//! use json_consumer::formatter::Formatter;
//! use json_consumer::session::Session;
//! use json_consumer::signal::ShutdownFlag;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BrokerConfig {
//!     sasl_username: Some("user".to_owned()),
//!     sasl_password: Some(Secret::new("password")),
//!     ..BrokerConfig::default()
//! };
//! let shutdown = ShutdownFlag::install()?;
//! let mut session = Session::connect(&config)?;
//! session.subscribe("tron.broadcasted.transactions")?;
//! let reason = session.run(&shutdown, &mut Formatter::stdout())?;
//! println!("Stopped: {:?}", reason);
//! session.shutdown();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod consumer;
pub mod error;
pub mod events;
pub mod formatter;
pub mod logging;
pub mod message;
pub mod session;
pub mod signal;

pub use crate::config::BrokerConfig;
pub use crate::error::{ConsumerError, ConsumerResult};
pub use crate::events::{EventHandler, EventSource, InboundEvent, Polled};
pub use crate::message::Message;
pub use crate::session::{Session, TerminationReason};
