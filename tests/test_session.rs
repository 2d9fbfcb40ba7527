//! Test the consumer lifecycle and poll loop with scripted event sources.

use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use signal_hook::consts::{SIGINT, SIGTERM};

use json_consumer::formatter::Formatter;
use json_consumer::session::{Session, State};
use json_consumer::signal::ShutdownFlag;
use json_consumer::{ConsumerError, InboundEvent, TerminationReason};

use crate::utils::*;

mod utils;

fn message_step(offset: i64) -> Step {
    Step::Event(InboundEvent::Message(json_message(
        offset,
        &format!(r#"{{"id":{}}}"#, offset),
    )))
}

fn all_brokers_down() -> KafkaError {
    KafkaError::Global(RDKafkaErrorCode::AllBrokersDown)
}

// N messages followed by a signal: N messages handled in order, then one release.
#[test]
fn test_messages_then_signal() {
    let _r = env_logger::try_init();

    let shutdown = ShutdownFlag::new();
    let mut steps: Vec<Step> = (0..5).map(message_step).collect();
    steps.push(Step::Signal(SIGTERM));
    steps.push(message_step(5));
    let (source, probe) = ScriptedSource::new(steps, &shutdown);

    let mut session = Session::new(source);
    assert_eq!(session.state(), State::Created);
    session.subscribe("test_topic").unwrap();
    assert_eq!(session.state(), State::Subscribed);
    assert_eq!(probe.subscriptions(), vec!["test_topic".to_owned()]);

    let mut recorder = Recorder::default();
    let reason = session.run(&shutdown, &mut recorder).unwrap();

    assert_eq!(reason, TerminationReason::SignalReceived(SIGTERM));
    assert_eq!(session.state(), State::Terminated);
    let offsets: Vec<i64> = recorder.messages().iter().map(|m| m.offset()).collect();
    assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
    assert_eq!(recorder.records.last(), Some(&Record::Signal(SIGTERM)));
    // Five messages and the signal step; the message after the signal is never polled.
    assert_eq!(probe.polls(), 6);

    assert_eq!(probe.closes(), 0);
    session.shutdown();
    assert_eq!(probe.closes(), 1);
}

// A signal received before the loop starts stops it without polling.
#[test]
fn test_signal_before_run() {
    let shutdown = ShutdownFlag::new();
    let (source, probe) = ScriptedSource::new(vec![message_step(0)], &shutdown);
    let mut session = Session::new(source);
    session.subscribe("test_topic").unwrap();

    shutdown.trigger(SIGINT);
    let mut recorder = Recorder::default();
    let reason = session.run(&shutdown, &mut recorder).unwrap();

    assert_eq!(reason, TerminationReason::SignalReceived(SIGINT));
    assert_eq!(probe.polls(), 0);
    assert_eq!(recorder.records, vec![Record::Signal(SIGINT)]);
    drop(session);
    assert_eq!(probe.closes(), 1);
}

// All brokers down stops the loop after reporting, skipping what is queued after it.
#[test]
fn test_all_brokers_down_is_fatal() {
    let _r = env_logger::try_init();

    let shutdown = ShutdownFlag::new();
    let steps = vec![
        message_step(0),
        message_step(1),
        Step::Event(InboundEvent::Error(all_brokers_down())),
        message_step(2),
        message_step(3),
    ];
    let (source, probe) = ScriptedSource::new(steps, &shutdown);

    {
        let mut session = Session::new(source);
        session.subscribe("test_topic").unwrap();
        let mut recorder = Recorder::default();
        let reason = session.run(&shutdown, &mut recorder).unwrap();

        assert_eq!(reason, TerminationReason::FatalBrokerError(all_brokers_down()));
        assert_eq!(recorder.messages().len(), 2);
        assert_eq!(recorder.records.last(), Some(&Record::Error(all_brokers_down())));
        assert_eq!(probe.polls(), 3);
        // Released by drop, without an explicit shutdown.
    }

    assert_eq!(probe.closes(), 1);
}

// Other errors are reported and the loop carries on.
#[test]
fn test_transient_errors_are_reported() {
    let shutdown = ShutdownFlag::new();
    let transient = KafkaError::MessageConsumption(RDKafkaErrorCode::BrokerTransportFailure);
    let global = KafkaError::Global(RDKafkaErrorCode::BrokerTransportFailure);
    let steps = vec![
        message_step(0),
        Step::Event(InboundEvent::Error(transient.clone())),
        message_step(1),
        Step::Event(InboundEvent::Error(global.clone())),
        message_step(2),
    ];
    let (source, probe) = ScriptedSource::new(steps, &shutdown);
    let mut session = Session::new(source);
    session.subscribe("test_topic").unwrap();

    let mut recorder = Recorder::default();
    let reason = session.run(&shutdown, &mut recorder).unwrap();

    assert_eq!(reason, TerminationReason::SourceExhausted);
    assert_eq!(
        recorder.records,
        vec![
            Record::Message(json_message(0, r#"{"id":0}"#)),
            Record::Error(transient),
            Record::Message(json_message(1, r#"{"id":1}"#)),
            Record::Error(global),
            Record::Message(json_message(2, r#"{"id":2}"#)),
        ]
    );
    session.shutdown();
    assert_eq!(probe.closes(), 1);
}

// Idle polls and unknown events do not disturb the message flow.
#[test]
fn test_idle_and_ignored_events() {
    let shutdown = ShutdownFlag::new();
    let steps = vec![
        Step::Idle,
        message_step(0),
        Step::Event(InboundEvent::Other("rebalance Revoke".to_owned())),
        Step::Idle,
        Step::Idle,
        message_step(1),
    ];
    let (source, probe) = ScriptedSource::new(steps, &shutdown);
    let mut session = Session::new(source);
    session.subscribe("test_topic").unwrap();

    let mut recorder = Recorder::default();
    let reason = session.run(&shutdown, &mut recorder).unwrap();

    assert_eq!(reason, TerminationReason::SourceExhausted);
    assert_eq!(recorder.messages().len(), 2);
    assert!(recorder
        .records
        .contains(&Record::Ignored("rebalance Revoke".to_owned())));
    // Six steps, then the poll reporting exhaustion.
    assert_eq!(probe.polls(), 7);
    drop(session);
    assert_eq!(probe.closes(), 1);
}

#[test]
fn test_invalid_transitions() {
    let shutdown = ShutdownFlag::new();
    let (source, probe) = ScriptedSource::new(vec![], &shutdown);
    let mut session = Session::new(source);
    let mut recorder = Recorder::default();

    match session.run(&shutdown, &mut recorder) {
        Err(ConsumerError::InvalidState { operation, state }) => {
            assert_eq!(operation, "run");
            assert_eq!(state, State::Created);
        }
        other => panic!("unexpected result: {:?}", other),
    }

    session.subscribe("test_topic").unwrap();
    assert!(matches!(
        session.subscribe("other_topic"),
        Err(ConsumerError::InvalidState {
            state: State::Subscribed,
            ..
        })
    ));

    assert_eq!(
        session.run(&shutdown, &mut recorder).unwrap(),
        TerminationReason::SourceExhausted
    );
    assert!(matches!(
        session.run(&shutdown, &mut recorder),
        Err(ConsumerError::InvalidState {
            state: State::Terminated,
            ..
        })
    ));
    assert_eq!(probe.polls(), 1);

    session.shutdown();
    assert_eq!(probe.closes(), 1);
}

// A failed subscription leaves the session unsubscribed and still releases the source.
#[test]
fn test_subscription_failure() {
    let shutdown = ShutdownFlag::new();
    let (source, probe) = ScriptedSource::new(vec![message_step(0)], &shutdown);
    let mut session = Session::new(source.failing_subscription());

    match session.subscribe("missing_topic") {
        Err(ConsumerError::UnknownTopic(topic)) => assert_eq!(topic, "missing_topic"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(session.state(), State::Created);
    assert!(probe.subscriptions().is_empty());

    drop(session);
    assert_eq!(probe.closes(), 1);
    assert_eq!(probe.polls(), 0);
}

// Messages go through the formatter in poll order.
#[test]
fn test_loop_with_formatter() {
    let shutdown = ShutdownFlag::new();
    let steps = vec![
        Step::Event(InboundEvent::Message(json_message(42, r#"{"a":1}"#))),
        Step::Event(InboundEvent::Message(json_message(43, "not-json"))),
        Step::Event(InboundEvent::Other("rebalance Revoke".to_owned())),
        Step::Signal(SIGINT),
    ];
    let (source, probe) = ScriptedSource::new(steps, &shutdown);
    let mut session = Session::new(source);
    session.subscribe("test_topic").unwrap();

    let mut formatter = Formatter::new(Vec::new());
    let reason = session.run(&shutdown, &mut formatter).unwrap();
    session.shutdown();

    assert_eq!(reason, TerminationReason::SignalReceived(SIGINT));
    assert_eq!(probe.closes(), 1);

    let output = String::from_utf8(formatter.into_inner()).unwrap();
    let first = output
        .find("Received message on topic test_topic [0] at offset 42:")
        .unwrap();
    let pretty = output.find("Parsed JSON:\n{\n  \"a\": 1\n}\n").unwrap();
    let second = output
        .find("Received message on topic test_topic [0] at offset 43:")
        .unwrap();
    let raw = output.find("Raw message: not-json\n").unwrap();
    let ignored = output.find("Ignored rebalance Revoke\n").unwrap();
    let signal = output.find("Caught signal SIGINT: terminating\n").unwrap();
    assert!(first < pretty && pretty < second && second < raw);
    assert!(raw < ignored && ignored < signal);
    assert_eq!(output.matches("Parsed JSON:").count(), 1);
}
