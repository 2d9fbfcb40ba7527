#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::distr::Alphanumeric;
use rand::Rng;
use rdkafka::error::KafkaError;

use json_consumer::signal::ShutdownFlag;
use json_consumer::{
    ConsumerError, ConsumerResult, EventHandler, EventSource, InboundEvent, Message, Polled,
};

pub fn rand_test_topic() -> String {
    format!("__test_{}", rand_suffix())
}

pub fn rand_test_group() -> String {
    format!("__test_{}", rand_suffix())
}

fn rand_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}

pub fn json_message(offset: i64, value: &str) -> Message {
    Message::new(
        "test_topic",
        0,
        offset,
        Some(format!("key_{}", offset).into_bytes()),
        Some(value.as_bytes().to_vec()),
    )
}

/// One step of a scripted source.
pub enum Step {
    /// Returned by the next poll.
    Event(InboundEvent),
    /// The next poll times out.
    Idle,
    /// Triggers the shutdown flag while polling, then times out.
    Signal(i32),
}

/// Counters shared between a [`ScriptedSource`] and the test observing it.
#[derive(Clone, Default)]
pub struct Probe {
    polls: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }
}

/// An event source replaying a fixed list of steps, then reporting exhaustion.
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    shutdown: ShutdownFlag,
    probe: Probe,
    fail_subscription: bool,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>, shutdown: &ShutdownFlag) -> (ScriptedSource, Probe) {
        let probe = Probe::default();
        let source = ScriptedSource {
            steps: steps.into(),
            shutdown: shutdown.clone(),
            probe: probe.clone(),
            fail_subscription: false,
        };
        (source, probe)
    }

    pub fn failing_subscription(mut self) -> ScriptedSource {
        self.fail_subscription = true;
        self
    }
}

impl EventSource for ScriptedSource {
    fn subscribe(&mut self, topic: &str) -> ConsumerResult<()> {
        if self.fail_subscription {
            return Err(ConsumerError::UnknownTopic(topic.to_owned()));
        }
        self.probe.subscriptions.lock().unwrap().push(topic.to_owned());
        Ok(())
    }

    fn poll(&mut self, _timeout: Duration) -> Polled {
        self.probe.polls.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(Step::Event(event)) => Polled::Event(event),
            Some(Step::Idle) => Polled::Idle,
            Some(Step::Signal(signal)) => {
                self.shutdown.trigger(signal);
                Polled::Idle
            }
            None => Polled::Exhausted,
        }
    }

    fn close(self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a [`Recorder`] observed.
#[derive(Debug, PartialEq)]
pub enum Record {
    Message(Message),
    Error(KafkaError),
    Ignored(String),
    Signal(i32),
}

/// An event handler keeping everything it is given.
#[derive(Default)]
pub struct Recorder {
    pub records: Vec<Record>,
}

impl Recorder {
    pub fn messages(&self) -> Vec<&Message> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }
}

impl EventHandler for Recorder {
    fn message(&mut self, message: Message) {
        self.records.push(Record::Message(message));
    }

    fn error(&mut self, error: &KafkaError) {
        self.records.push(Record::Error(error.clone()));
    }

    fn ignored(&mut self, description: &str) {
        self.records.push(Record::Ignored(description.to_owned()));
    }

    fn signal(&mut self, signal: i32) {
        self.records.push(Record::Signal(signal));
    }
}
