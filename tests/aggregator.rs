//! End-to-end integration coverage for the concurrent byte pipeline:
//! Port Reader -> (optional peer write) -> Aggregator -> local sink,
//! and the Dispatcher -> Command Parser -> Port Writer path, wired
//! together the way the Supervisor wires them, but against in-memory
//! test doubles instead of real serial ports.
//!
//! The doubles are defined locally rather than reused from the crate's
//! internal `#[cfg(test)]` fixtures, since those aren't visible across
//! the integration-test boundary.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hexterm::aggregator::{Aggregator, AggregatorConfig, DataRead, Direction};
use hexterm::config::CharEncoding;
use hexterm::dispatcher::Dispatcher;
use hexterm::io::{LocalIO, SerialEndpoint};
use hexterm::reader::PortReader;

/// In-memory `SerialEndpoint`: a scripted queue of (delay, chunk) reads
/// and a record of everything written to it, mirroring how a real
/// `serial2::SerialPort` times out with an empty chunk rather than an
/// error.
struct MemorySerial {
    name: String,
    reads: Mutex<VecDeque<(Duration, Vec<u8>)>>,
    written: Mutex<Vec<u8>>,
}

impl MemorySerial {
    fn new(name: &str, reads: Vec<(Duration, Vec<u8>)>) -> Self {
        Self {
            name: name.to_string(),
            reads: Mutex::new(reads.into()),
            written: Mutex::new(Vec::new()),
        }
    }

    fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }
}

impl SerialEndpoint for MemorySerial {
    fn read(&self, _max_bytes: usize) -> io::Result<Vec<u8>> {
        let mut reads = self.reads.lock().unwrap();
        match reads.pop_front() {
            Some((delay, chunk)) => {
                drop(reads);
                std::thread::sleep(delay);
                Ok(chunk)
            }
            None => {
                drop(reads);
                std::thread::sleep(Duration::from_millis(15));
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        self.written.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// In-memory `LocalIO`: a scripted queue of operator input lines and a
/// record of everything written to the sink (hexdump lines, diagnostics,
/// the help menu, etc), in send order.
struct MemoryLocalIO {
    lines: Mutex<VecDeque<String>>,
    written: Mutex<Vec<String>>,
}

impl MemoryLocalIO {
    fn new(lines: Vec<&str>) -> Self {
        Self {
            lines: Mutex::new(lines.into_iter().map(String::from).collect()),
            written: Mutex::new(Vec::new()),
        }
    }

    fn sink_only() -> Self {
        Self::new(vec![])
    }

    fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

impl LocalIO for MemoryLocalIO {
    fn readline(&self) -> io::Result<String> {
        Ok(self.lines.lock().unwrap().pop_front().unwrap_or_default())
    }
    fn write(&self, text: &str) -> io::Result<()> {
        self.written.lock().unwrap().push(text.to_string());
        Ok(())
    }
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Bytes delivered to a single (non-MITM) port yield exactly one
/// untimestamped, unprefixed line.
#[test]
fn single_port_hexdump_line_has_no_prefix_or_timestamp() {
    let sink = Arc::new(MemoryLocalIO::sink_only());
    let (tx, rx) = sync_channel(8);
    tx.send(DataRead::new(Instant::now(), vec![0x48, 0x69, 0x0A]))
        .unwrap();
    drop(tx);

    let agg = Aggregator::new(
        rx,
        sink.clone() as Arc<dyn LocalIO>,
        AggregatorConfig {
            encoding: CharEncoding::Cp437,
            timestamps: false,
            direction: Direction::Solo,
            start: Instant::now(),
            msg_timeout: Duration::from_millis(20),
        },
    );
    agg.run();

    let lines = sink.written();
    assert_eq!(lines.len(), 1);
    assert_eq!(
        lines[0],
        "48 69 0A                                           |Hi.             |\n"
    );
}

/// Driven through the real `Dispatcher`: an operator line mixing hex
/// pairs and a quoted run is parsed and written to DCE verbatim.
#[test]
fn dispatcher_parses_mixed_hex_and_quoted_line_onto_dce() {
    let local = Arc::new(MemoryLocalIO::new(vec![r#"48 "AB" 0a"#, "q"]));
    let dce = Arc::new(MemorySerial::new("dce", vec![]));
    let shutdown = Arc::new(AtomicBool::new(false));

    let dispatcher = Dispatcher::new(
        local.clone() as Arc<dyn LocalIO>,
        dce.clone() as Arc<dyn SerialEndpoint>,
        None,
        CharEncoding::Cp437,
        shutdown.clone(),
    );
    dispatcher.run();

    assert_eq!(dce.written(), vec![0x48, 0x41, 0x42, 0x0A]);
    assert!(shutdown.load(Ordering::Acquire));
}

/// A byte read from DCE is forwarded to DTE before it is observable at
/// the local sink, and each direction's aggregator gets its own
/// correctly prefixed, timestamped line.
#[test]
fn mitm_forwards_both_directions_and_aggregates_with_prefixes() {
    let dce = Arc::new(MemorySerial::new(
        "dce",
        vec![(Duration::from_millis(1), vec![0x41])],
    ));
    let dte = Arc::new(MemorySerial::new(
        "dte",
        vec![(Duration::from_millis(2), vec![0x42])],
    ));
    let sink = Arc::new(MemoryLocalIO::sink_only());
    let shutdown = Arc::new(AtomicBool::new(false));
    let start = Instant::now();
    let msg_timeout = Duration::from_millis(30);

    let (dce_tx, dce_rx) = sync_channel(8);
    let (dte_tx, dte_rx) = sync_channel(8);

    let dce_reader = PortReader::new(
        dce.clone() as Arc<dyn SerialEndpoint>,
        Some(dte.clone() as Arc<dyn SerialEndpoint>),
        dce_tx,
        shutdown.clone(),
    );
    let dte_reader = PortReader::new(
        dte.clone() as Arc<dyn SerialEndpoint>,
        Some(dce.clone() as Arc<dyn SerialEndpoint>),
        dte_tx,
        shutdown.clone(),
    );

    let dce_agg = Aggregator::new(
        dce_rx,
        sink.clone() as Arc<dyn LocalIO>,
        AggregatorConfig {
            encoding: CharEncoding::Cp437,
            timestamps: true,
            direction: Direction::DceToLocal,
            start,
            msg_timeout,
        },
    );
    let dte_agg = Aggregator::new(
        dte_rx,
        sink.clone() as Arc<dyn LocalIO>,
        AggregatorConfig {
            encoding: CharEncoding::Cp437,
            timestamps: true,
            direction: Direction::DteToLocal,
            start,
            msg_timeout,
        },
    );

    let dce_agg_handle = std::thread::spawn(move || dce_agg.run());
    let dte_agg_handle = std::thread::spawn(move || dte_agg.run());
    let dce_reader_handle = std::thread::spawn(move || dce_reader.run());
    let dte_reader_handle = std::thread::spawn(move || dte_reader.run());

    std::thread::sleep(Duration::from_millis(120));
    shutdown.store(true, Ordering::Release);
    dce_reader_handle.join().unwrap();
    dte_reader_handle.join().unwrap();
    dce_agg_handle.join().unwrap();
    dte_agg_handle.join().unwrap();

    // Causality: each byte was written to its peer endpoint.
    assert_eq!(dce.written(), vec![0x42]);
    assert_eq!(dte.written(), vec![0x41]);

    let lines = sink.written();
    assert!(lines.iter().any(|l| l.contains("T <- C:") && l.contains("41")));
    assert!(lines.iter().any(|l| l.contains("T -> C:") && l.contains("42")));
    // Timestamps requested: every emitted line starts with a numeric prefix.
    for l in &lines {
        let first_token = l.split_whitespace().next().unwrap();
        assert!(first_token.parse::<f64>().is_ok(), "missing timestamp in {l:?}");
    }
}

/// With forwarding disabled, DCE traffic is still aggregated even
/// though the peer endpoint never sees it.
#[test]
fn no_forwarding_still_aggregates_but_peer_is_untouched() {
    let dce = Arc::new(MemorySerial::new(
        "dce",
        vec![(Duration::from_millis(1), vec![0x55])],
    ));
    let dte = Arc::new(MemorySerial::new("dte", vec![]));
    let sink = Arc::new(MemoryLocalIO::sink_only());
    let shutdown = Arc::new(AtomicBool::new(false));

    let (tx, rx) = sync_channel(8);
    // Peer is `None` here: this is what `Config::forward == false` wires
    // up in the Supervisor even though a DTE endpoint exists.
    let reader = PortReader::new(dce.clone() as Arc<dyn SerialEndpoint>, None, tx, shutdown.clone());
    let agg = Aggregator::new(
        rx,
        sink.clone() as Arc<dyn LocalIO>,
        AggregatorConfig {
            encoding: CharEncoding::Cp437,
            timestamps: false,
            direction: Direction::DceToLocal,
            start: Instant::now(),
            msg_timeout: Duration::from_millis(20),
        },
    );
    let agg_handle = std::thread::spawn(move || agg.run());
    let reader_handle = std::thread::spawn(move || reader.run());

    std::thread::sleep(Duration::from_millis(60));
    shutdown.store(true, Ordering::Release);
    reader_handle.join().unwrap();
    agg_handle.join().unwrap();

    assert!(dte.written().is_empty());
    let lines = sink.written();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("55"));
}

/// A single byte followed by several `msg_timeout`s of silence produces
/// exactly one 1-byte line, not a fragment plus an eventual second
/// empty one.
#[test]
fn single_byte_then_long_silence_emits_exactly_one_line() {
    let sink = Arc::new(MemoryLocalIO::sink_only());
    let msg_timeout = Duration::from_millis(20);
    let (tx, rx) = sync_channel(8);
    tx.send(DataRead::new(Instant::now(), vec![0xAB])).unwrap();

    let agg = Aggregator::new(
        rx,
        sink.clone() as Arc<dyn LocalIO>,
        AggregatorConfig {
            encoding: CharEncoding::Cp437,
            timestamps: false,
            direction: Direction::Solo,
            start: Instant::now(),
            msg_timeout,
        },
    );
    let handle = std::thread::spawn(move || agg.run());
    std::thread::sleep(msg_timeout * 5);
    drop(tx);
    handle.join().unwrap();

    let lines = sink.written();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("AB"));
}

/// 17 bytes arriving in one chunk produce one immediate 16-byte line,
/// then a second 1-byte line once the quiet gap elapses (or, as here,
/// once shutdown flushes the residual byte).
#[test]
fn seventeen_bytes_split_into_full_line_then_residual() {
    let sink = Arc::new(MemoryLocalIO::sink_only());
    let (tx, rx) = sync_channel(8);
    let bytes: Vec<u8> = (0u8..17).collect();
    tx.send(DataRead::new(Instant::now(), bytes)).unwrap();
    drop(tx);

    let agg = Aggregator::new(
        rx,
        sink.clone() as Arc<dyn LocalIO>,
        AggregatorConfig {
            encoding: CharEncoding::Cp437,
            timestamps: false,
            direction: Direction::Solo,
            start: Instant::now(),
            msg_timeout: Duration::from_millis(20),
        },
    );
    agg.run();

    let lines = sink.written();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("00 01 02 03 04 05 06 07   08 09 0A 0B 0C 0D 0E 0F  |"));
    assert!(lines[1].starts_with("10 "));
}
