//! Newline-delimited JSON decoder.
//!
//! Reads the response body incrementally and yields one JSON value per line.
//!
//! # Framing
//!
//! - A line ends at `\n`; a `\r` before it is dropped
//! - Every line is one JSON document; an empty line is malformed like any other
//! - Bytes after the last `\n` at end of stream are discarded
//!
//! # Failure
//!
//! A line that is not valid JSON, or a failed read, ends the sequence with
//! one error. Nothing is read after that.

use std::io::BufRead;

use serde_json::Value;

use crate::error::ApiError;
use crate::logging::WireLog;

/// Lazy, non-restartable sequence of JSON values read from `R`.
pub struct LineDecoder<R> {
    reader: R,
    line: Vec<u8>,
    wire_log: WireLog,
    finished: bool,
    lines_read: usize,
}

impl<R: BufRead> LineDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            wire_log: WireLog::disabled(),
            finished: false,
            lines_read: 0,
        }
    }

    /// Record every raw line in `wire_log`.
    pub fn with_wire_log(mut self, wire_log: WireLog) -> Self {
        self.wire_log = wire_log;
        self
    }

    /// True once the end of stream or an error has been reached.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of complete lines read so far.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Read the next complete line into `self.line`.
    ///
    /// Returns `Ok(false)` at end of stream.
    fn read_line(&mut self) -> Result<bool, ApiError> {
        self.line.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.line)
            .map_err(ApiError::from_io)?;

        if n == 0 {
            return Ok(false);
        }

        if self.line.last() != Some(&b'\n') {
            log::debug!(
                "discarding {} unterminated trailing bytes at end of stream",
                self.line.len()
            );
            return Ok(false);
        }

        self.line.pop();
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }

        self.lines_read += 1;
        self.wire_log.record("RECV", &self.line);
        Ok(true)
    }
}

impl<R: BufRead> Iterator for LineDecoder<R> {
    type Item = Result<Value, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_line() {
            Ok(true) => {}
            Ok(false) => {
                self.finished = true;
                return None;
            }
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        }

        match serde_json::from_slice::<Value>(&self.line) {
            Ok(value) => Some(Ok(value)),
            Err(e) => {
                self.finished = true;
                log::debug!("malformed line {}: {}", self.lines_read, e);
                Some(Err(ApiError::Protocol {
                    malformed_line: std::mem::take(&mut self.line),
                    reason: e.to_string(),
                }))
            }
        }
    }
}
