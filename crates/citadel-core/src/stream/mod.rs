//! The consumption side of a streamed operation.
//!
//! [`OperationStream`] is what a caller iterates. Each step reads one more
//! line from the connection, classifies it, and hands back a [`Classified`]
//! event. There is no buffering beyond the current line and no background
//! reader, so the server can only get as far ahead as the socket buffers let
//! it.
//!
//! # How a stream ends
//!
//! - **Exhausted** - the server closed the body. Success for narration
//!   streams, whatever soft errors were seen
//! - **Fatal** - a narration error was classified fatal. That event is still
//!   delivered (flagged [`Severity::Fatal`]); nothing is read after it
//! - **Failed** - a malformed line or a read failure. The error is delivered
//!   as the last item
//!
//! Dropping the stream at any point closes the connection. There is no need
//! to drain it first.

mod decoder;

use std::marker::PhantomData;

use serde_json::Value;

pub use decoder::LineDecoder;

use crate::error::ApiError;
use crate::logging::WireLog;
use crate::operations::{FatalPolicy, Severity, StreamEvent};
use crate::transport::ByteStream;

/// An event together with what it means for the rest of the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified<E> {
    pub event: E,
    pub severity: Severity,
}

impl<E> Classified<E> {
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    pub fn is_soft_error(&self) -> bool {
        self.severity == Severity::Soft
    }
}

/// Why a stream stopped producing events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Exhausted,
    Fatal { message: String },
    Failed,
}

/// Lazily produced events of one operation.
pub struct OperationStream<E, R = ByteStream> {
    lines: LineDecoder<R>,
    policy: FatalPolicy,
    delivered: usize,
    termination: Option<Termination>,
    _event: PhantomData<fn() -> E>,
}

impl<E: StreamEvent, R: std::io::BufRead> OperationStream<E, R> {
    pub fn new(reader: R, policy: FatalPolicy) -> Self {
        Self::from_decoder(LineDecoder::new(reader), policy)
    }

    pub(crate) fn with_wire_log(reader: R, policy: FatalPolicy, wire_log: WireLog) -> Self {
        Self::from_decoder(LineDecoder::new(reader).with_wire_log(wire_log), policy)
    }

    fn from_decoder(lines: LineDecoder<R>, policy: FatalPolicy) -> Self {
        Self {
            lines,
            policy,
            delivered: 0,
            termination: None,
            _event: PhantomData,
        }
    }

    /// How the stream ended, or `None` while it may still produce events.
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Number of events handed out so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    fn deliver(&mut self, raw: Value) -> Classified<E> {
        let event = E::classify(&raw);
        let severity = event.severity(&raw, &self.policy);
        self.delivered += 1;

        match severity {
            Severity::Fatal => {
                let message = event.error_message().unwrap_or_default().to_string();
                log::error!("fatal error at event {}: {}", self.delivered, message);
                self.termination = Some(Termination::Fatal { message });
            }
            Severity::Soft => {
                log::warn!(
                    "event {} reported an error: {}",
                    self.delivered,
                    event.error_message().unwrap_or("(no message)")
                );
            }
            Severity::Normal => {}
        }

        Classified { event, severity }
    }
}

impl<E: StreamEvent, R: std::io::BufRead> Iterator for OperationStream<E, R> {
    type Item = Result<Classified<E>, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.termination.is_some() {
            return None;
        }

        match self.lines.next() {
            Some(Ok(raw)) => Some(Ok(self.deliver(raw))),
            Some(Err(e)) => {
                log::error!("stream failed after {} events: {}", self.delivered, e);
                self.termination = Some(Termination::Failed);
                Some(Err(e))
            }
            None => {
                log::debug!("stream exhausted after {} events", self.delivered);
                self.termination = Some(Termination::Exhausted);
                None
            }
        }
    }
}
