//! Aggregator: per-direction, time- and length-bounded line emitter.
//!
//! One `Aggregator` per direction consumes [`DataRead`] records from its
//! Port Reader over an SPSC channel and emits canonical hexdump lines to
//! the local sink. It owns its buffer outright — no shared mutable state
//! — and exits cleanly when its channel disconnects (which happens when
//! the Port Reader feeding it returns, itself triggered by shutdown).

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use bytes::BytesMut;

use crate::config::CharEncoding;
use crate::hexfmt;
use crate::io::LocalIO;

/// One timestamped chunk of bytes read from a port, FIFO per direction.
#[derive(Debug)]
pub struct DataRead {
    pub t: Instant,
    pub bytes: Vec<u8>,
}

impl DataRead {
    pub fn new(t: Instant, bytes: Vec<u8>) -> Self {
        Self { t, bytes }
    }
}

/// Direction prefix printed before each emitted line. Empty in
/// single-port mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Single-port mode: no MITM, no prefix.
    Solo,
    /// MITM: DCE -> local.
    DceToLocal,
    /// MITM: DTE -> local.
    DteToLocal,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::Solo => "",
            Direction::DceToLocal => "T <- C",
            Direction::DteToLocal => "T -> C",
        }
    }
}

pub struct AggregatorConfig {
    pub encoding: CharEncoding,
    pub timestamps: bool,
    pub direction: Direction,
    pub start: Instant,
    pub msg_timeout: Duration,
}

/// Per-direction buffer + emission loop. Runs on its own thread; `run`
/// returns once the channel disconnects and any residual bytes flush.
pub struct Aggregator {
    rx: Receiver<DataRead>,
    sink: Arc<dyn LocalIO>,
    cfg: AggregatorConfig,
    buf: BytesMut,
    line_start: Option<Instant>,
}

impl Aggregator {
    pub fn new(rx: Receiver<DataRead>, sink: Arc<dyn LocalIO>, cfg: AggregatorConfig) -> Self {
        Self {
            rx,
            sink,
            cfg,
            buf: BytesMut::new(),
            line_start: None,
        }
    }

    pub fn run(mut self) {
        loop {
            let recv_result = match self.line_start {
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                Some(t0) => {
                    let deadline = t0 + self.cfg.msg_timeout;
                    let wait = deadline.saturating_duration_since(Instant::now());
                    self.rx.recv_timeout(wait)
                }
            };

            match recv_result {
                Ok(record) => {
                    if self.buf.is_empty() {
                        self.line_start = Some(record.t);
                    }
                    self.buf.extend_from_slice(&record.bytes);
                    self.drain_full_lines();
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.flush_one_line_if_due();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.flush_residual();
                    return;
                }
            }
        }
    }

    /// Emit as many complete 16-byte lines as the buffer currently holds.
    /// Leaves any remainder (< 16 bytes) pending for the timeout check.
    fn drain_full_lines(&mut self) {
        while self.buf.len() >= 16 {
            let t0 = self.line_start.expect("buf non-empty implies line_start is set");
            let line = self.buf.split_to(16);
            self.emit(&line, t0);
            self.line_start = if self.buf.is_empty() {
                None
            } else {
                Some(Instant::now())
            };
        }
    }

    /// On a channel-wait timeout, emit the pending partial line if the
    /// aggregation window has actually elapsed (it may have fired early
    /// under scheduler slack; re-check before emitting).
    fn flush_one_line_if_due(&mut self) {
        let Some(t0) = self.line_start else { return };
        if self.buf.is_empty() {
            self.line_start = None;
            return;
        }
        if Instant::now().saturating_duration_since(t0) < self.cfg.msg_timeout {
            return;
        }
        let take = self.buf.len().min(16);
        let line = self.buf.split_to(take);
        self.emit(&line, t0);
        self.line_start = if self.buf.is_empty() {
            None
        } else {
            Some(Instant::now())
        };
    }

    fn flush_residual(&mut self) {
        while !self.buf.is_empty() {
            let t0 = self.line_start.unwrap_or_else(Instant::now);
            let take = self.buf.len().min(16);
            let line = self.buf.split_to(take);
            self.emit(&line, t0);
            self.line_start = if self.buf.is_empty() {
                None
            } else {
                Some(Instant::now())
            };
        }
    }

    /// `line_start` is the captured arrival time of this line's first
    /// byte, not the time of emission — the two can diverge under a
    /// quiet-gap flush, scheduler slack, or a backed-up sink.
    fn emit(&self, bytes: &[u8], line_start: Instant) {
        let hexline = hexfmt::format_line(bytes, self.cfg.encoding);
        let prefix = self.cfg.direction.prefix();
        let mut out = String::new();
        if self.cfg.timestamps {
            let secs = line_start
                .saturating_duration_since(self.cfg.start)
                .as_secs_f64();
            out.push_str(&format!("{secs:012.6} "));
        }
        if !prefix.is_empty() {
            out.push_str(prefix);
            out.push_str(": ");
        }
        out.push_str(&hexline);
        out.push('\n');
        // Best-effort: a write failure on the local sink is not fatal to
        // the pipeline (the byte has already been accounted for), but it
        // is worth surfacing for diagnosis.
        if let Err(e) = self.sink.write(&out) {
            tracing::warn!("local sink write failed: {e}");
        }
    }
}
