//! Consumer lifecycle and poll loop.
//!
//! A [`Session`] owns an [`EventSource`] from creation to release. It goes through the states
//! `Created`, `Subscribed`, `Running` and `Terminated`; the source is closed exactly once, either
//! by [`Session::shutdown`] or when the session is dropped, whatever made the loop stop.

use std::time::Duration;

use log::{debug, info, trace, warn};
use rdkafka::error::KafkaError;

use crate::config::BrokerConfig;
use crate::consumer::KafkaSource;
use crate::error::{is_all_brokers_down, ConsumerError, ConsumerResult};
use crate::events::{EventHandler, EventSource, InboundEvent, Polled};
use crate::signal::{signal_name, ShutdownFlag};

/// Maximum time spent in a single poll. It bounds the delay between a termination signal and
/// the end of the loop.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Lifecycle state of a [`Session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// The source exists but is not subscribed.
    Created,
    /// The source is subscribed to a topic.
    Subscribed,
    /// The poll loop is running.
    Running,
    /// The loop has stopped. Only shutdown is possible.
    Terminated,
}

/// Why the poll loop stopped.
#[derive(Clone, Debug, PartialEq)]
pub enum TerminationReason {
    /// A termination signal was received.
    SignalReceived(i32),
    /// None of the brokers can be reached.
    FatalBrokerError(KafkaError),
    /// The source has no more events.
    SourceExhausted,
}

/// Owns an event source and drives its poll loop.
pub struct Session<S: EventSource> {
    source: Option<S>,
    state: State,
    poll_timeout: Duration,
}

impl Session<KafkaSource> {
    /// Creates a session reading from the Kafka cluster described by `config`.
    pub fn connect(config: &BrokerConfig) -> ConsumerResult<Session<KafkaSource>> {
        KafkaSource::connect(config).map(Session::new)
    }
}

impl<S: EventSource> Session<S> {
    /// Creates a session owning `source`.
    pub fn new(source: S) -> Session<S> {
        Session {
            source: Some(source),
            state: State::Created,
            poll_timeout: POLL_TIMEOUT,
        }
    }

    /// Changes the maximum time spent in a single poll.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Session<S> {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Returns the current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Subscribes the source to `topic`.
    pub fn subscribe(&mut self, topic: &str) -> ConsumerResult<()> {
        self.source_in(State::Created, "subscribe")?.subscribe(topic)?;
        self.state = State::Subscribed;
        Ok(())
    }

    /// Polls the source until a termination signal is caught, all brokers are down, or the
    /// source is exhausted.
    ///
    /// The shutdown flag is checked before every poll, so no event is handled once a signal has
    /// been received. Messages are handed to `handler` in the order they are polled.
    pub fn run<H: EventHandler>(
        &mut self,
        shutdown: &ShutdownFlag,
        handler: &mut H,
    ) -> ConsumerResult<TerminationReason> {
        let poll_timeout = self.poll_timeout;
        let source = match self.source.as_mut() {
            Some(source) if self.state == State::Subscribed => source,
            _ => {
                return Err(ConsumerError::InvalidState {
                    operation: "run",
                    state: self.state,
                })
            }
        };
        self.state = State::Running;
        debug!("Poll loop started");

        let reason = loop {
            if let Some(signal) = shutdown.caught() {
                info!("Caught signal {}: terminating", signal_name(signal));
                handler.signal(signal);
                break TerminationReason::SignalReceived(signal);
            }

            match source.poll(poll_timeout) {
                Polled::Idle => trace!("No event within {:?}", poll_timeout),
                Polled::Exhausted => break TerminationReason::SourceExhausted,
                Polled::Event(InboundEvent::Message(message)) => handler.message(message),
                Polled::Event(InboundEvent::Error(error)) => {
                    handler.error(&error);
                    if is_all_brokers_down(&error) {
                        warn!("All brokers are down: terminating");
                        break TerminationReason::FatalBrokerError(error);
                    }
                }
                Polled::Event(InboundEvent::Other(description)) => handler.ignored(&description),
            }
        };

        self.state = State::Terminated;
        debug!("Poll loop stopped: {:?}", reason);
        Ok(reason)
    }

    /// Releases the source.
    pub fn shutdown(mut self) {
        self.release();
    }

    fn source_in(&mut self, expected: State, operation: &'static str) -> ConsumerResult<&mut S> {
        match self.source.as_mut() {
            Some(source) if self.state == expected => Ok(source),
            _ => Err(ConsumerError::InvalidState {
                operation,
                state: self.state,
            }),
        }
    }

    fn release(&mut self) {
        if let Some(source) = self.source.take() {
            debug!("Releasing consumer in state {:?}", self.state);
            source.close();
            self.state = State::Terminated;
        }
    }
}

impl<S: EventSource> Drop for Session<S> {
    fn drop(&mut self) {
        self.release();
    }
}
