//! Human readable rendering of received messages.

use std::io::{self, Write};

use log::{debug, warn};
use rdkafka::error::KafkaError;
use serde::Serialize;
use serde_json::Value;

use crate::events::EventHandler;
use crate::message::Message;
use crate::signal::signal_name;

/// Line printed after every successfully parsed message.
pub const SEPARATOR: &str = "----------------------------------------";

/// Summary of a message, printed as a single JSON line.
#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    /// Topic of the message.
    pub topic: &'a str,
    /// Partition of the message.
    pub partition: i32,
    /// Offset of the message.
    pub offset: i64,
    /// Key, as text.
    pub key: &'a str,
    /// Pretty-printed payload.
    pub value: &'a str,
}

/// Prints messages and loop events to a writer.
pub struct Formatter<W: Write> {
    out: W,
}

impl Formatter<io::Stdout> {
    /// Creates a formatter printing to the standard output.
    pub fn stdout() -> Formatter<io::Stdout> {
        Formatter::new(io::stdout())
    }
}

impl<W: Write> Formatter<W> {
    /// Creates a formatter printing to `out`.
    pub fn new(out: W) -> Formatter<W> {
        Formatter { out }
    }

    /// Returns the writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Consumes the formatter, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Prints a message: a header, then either the pretty-printed JSON payload followed by a log
    /// entry and a separator, or the parse error and the raw payload.
    ///
    /// Never fails. Write errors are logged and the rest of the message is skipped.
    pub fn format(&mut self, message: &Message) {
        if let Err(e) = self.write_message(message) {
            warn!(
                "Cannot print message {}[{}]@{}: {}",
                message.topic(),
                message.partition(),
                message.offset(),
                e
            );
        }
    }

    fn write_message(&mut self, message: &Message) -> io::Result<()> {
        writeln!(
            self.out,
            "Received message on topic {} [{}] at offset {}:",
            message.topic(),
            message.partition(),
            message.offset()
        )?;

        let parsed = match message_json(message) {
            Ok(value) => value,
            Err(e) => {
                debug!(
                    "Payload of {}[{}]@{} is not JSON: {}",
                    message.topic(),
                    message.partition(),
                    message.offset(),
                    e
                );
                writeln!(self.out, "Error parsing JSON: {}", e)?;
                return writeln!(self.out, "Raw message: {}", message.payload_lossy());
            }
        };

        let pretty = match serde_json::to_string_pretty(&parsed) {
            Ok(pretty) => pretty,
            Err(e) => return writeln!(self.out, "Error prettifying JSON: {}", e),
        };
        writeln!(self.out, "Parsed JSON:\n{}", pretty)?;

        let key = message.key_lossy();
        let entry = LogEntry {
            topic: message.topic(),
            partition: message.partition(),
            offset: message.offset(),
            key: &key,
            value: &pretty,
        };
        match serde_json::to_string(&entry) {
            Ok(line) => writeln!(self.out, "Log entry: {}", line)?,
            Err(e) => writeln!(self.out, "Error serializing log entry: {}", e)?,
        }
        writeln!(self.out, "{}", SEPARATOR)?;
        self.out.flush()
    }

    fn report(&mut self, args: std::fmt::Arguments) {
        if let Err(e) = self.out.write_fmt(args).and_then(|_| self.out.flush()) {
            warn!("Cannot print event report: {}", e);
        }
    }
}

/// Decodes the payload of a message as a JSON document. A missing payload is an empty document.
pub fn message_json(message: &Message) -> serde_json::Result<Value> {
    serde_json::from_slice(message.payload().unwrap_or_default())
}

impl<W: Write> EventHandler for Formatter<W> {
    fn message(&mut self, message: Message) {
        self.format(&message);
    }

    fn error(&mut self, error: &KafkaError) {
        self.report(format_args!("Error: {}\n", error));
    }

    fn ignored(&mut self, description: &str) {
        self.report(format_args!("Ignored {}\n", description));
    }

    fn signal(&mut self, signal: i32) {
        self.report(format_args!(
            "Caught signal {}: terminating\n",
            signal_name(signal)
        ));
    }
}
