//! Serial-endpoint and local-I/O abstractions.
//!
//! `SerialEndpoint` and `LocalIO` are the two capabilities the core
//! engine consumes; everything in this module is the external
//! collaborator layer the engine only ever reaches through these
//! interfaces. Concrete implementations: [`Serial2Endpoint`] wraps a `serial2::SerialPort`
//! behind an `Arc` so the Port Reader can hold its own handle for reading
//! while a peer's forwarder thread writes through a clone; [`SplitIo`]
//! composes a stdio or file input with a stdio or file output to back the
//! Local Dispatcher.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{Framing, FlowControl};

/// A serial endpoint: DCE or DTE. Reads time out and return an empty
/// chunk rather than erroring; writes fully drain their argument and
/// flush before returning.
pub trait SerialEndpoint: Send + Sync {
    /// Read up to `max_bytes`. Blocks until at least one byte arrives or
    /// the endpoint's configured read timeout elapses, in which case an
    /// empty `Vec` is returned — never an error.
    fn read(&self, max_bytes: usize) -> io::Result<Vec<u8>>;

    /// Write all of `bytes`, then flush.
    fn write(&self, bytes: &[u8]) -> io::Result<()>;

    /// Human-readable identity for logging (port name or similar).
    fn name(&self) -> &str;
}

/// Production `SerialEndpoint` backed by `serial2::SerialPort`.
///
/// Cloning shares the underlying handle (`serial2::SerialPort` is safe
/// for concurrent reads on one side and writes on the other), which is
/// exactly what MITM forwarding needs: the DCE Port Reader owns one
/// clone to read from DCE, and the DTE Port Reader holds a second clone
/// of the *same* endpoint so it can forward onto DCE from its own
/// thread, and vice versa.
#[derive(Clone)]
pub struct Serial2Endpoint {
    port: Arc<serial2::SerialPort>,
    name: String,
}

impl Serial2Endpoint {
    pub fn open(
        name: &str,
        baud: u32,
        framing: Framing,
        flow_control: FlowControl,
        read_timeout: Duration,
    ) -> io::Result<Self> {
        let parity = match framing.parity {
            crate::config::Parity::None => serial2::Parity::None,
            crate::config::Parity::Even => serial2::Parity::Even,
            crate::config::Parity::Odd => serial2::Parity::Odd,
            // serial2 has no mark/space parity; fold into even as the
            // closest hardware-supported approximation (the framing
            // string itself still reports what was asked for).
            crate::config::Parity::Mark | crate::config::Parity::Space => serial2::Parity::Even,
        };
        // serial2 has no DSR/DTR flow-control line, only XON/XOFF and
        // RTS/CTS; `flow_control.dsrdtr` is accepted by the CLI (it still
        // validates and prints in the banner) but has no wire effect here.
        let line_control = if flow_control.rtscts {
            serial2::FlowControl::RtsCts
        } else if flow_control.xonxoff {
            serial2::FlowControl::XonXoff
        } else {
            serial2::FlowControl::None
        };

        let port = serial2::SerialPort::open(name, move |mut settings: serial2::Settings| {
            settings.set_raw();
            settings.set_baud_rate(baud)?;
            settings.set_char_size(framing.data_bits.into());
            settings.set_parity(parity);
            settings.set_stop_bits(framing.stop_bits.into());
            settings.set_flow_control(line_control);
            Ok(settings)
        })?;
        port.set_read_timeout(read_timeout)?;
        Ok(Self {
            port: Arc::new(port),
            name: name.to_string(),
        })
    }
}

impl SerialEndpoint for Serial2Endpoint {
    fn read(&self, max_bytes: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max_bytes];
        match (&*self.port).read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        (&*self.port).write_all(bytes)?;
        (&*self.port).flush()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Local operator input/output: a blocking readline source and a sink
/// that serializes writes across concurrent aggregators.
pub trait LocalIO: Send + Sync {
    /// Read one line, without its trailing newline. An empty string
    /// signals EOF.
    fn readline(&self) -> io::Result<String>;

    /// Write `text` verbatim (the caller supplies its own newline).
    fn write(&self, text: &str) -> io::Result<()>;

    fn flush(&self) -> io::Result<()>;
}

/// Reads an operator command script from a file, line by line.
pub struct FileReader {
    inner: Mutex<BufReader<File>>,
}

impl FileReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            inner: Mutex::new(BufReader::new(file)),
        })
    }

    fn readline(&self) -> io::Result<String> {
        let mut line = String::new();
        let mut f = self.inner.lock().expect("file reader mutex poisoned");
        let n = f.read_line(&mut line)?;
        if n == 0 {
            return Ok(String::new());
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// Appends hexdump/diagnostic lines to a file (never truncates).
pub struct FileWriter {
    inner: Mutex<File>,
}

impl FileWriter {
    pub fn open_append(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner: Mutex::new(file),
        })
    }

    fn write(&self, text: &str) -> io::Result<()> {
        self.inner
            .lock()
            .expect("file writer mutex poisoned")
            .write_all(text.as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        self.inner.lock().expect("file writer mutex poisoned").flush()
    }
}

/// Composes an input source and an output sink, each independently
/// either stdio or a file, into one [`LocalIO`].
pub enum InputSide {
    Stdin(Mutex<BufReader<io::Stdin>>),
    File(FileReader),
}

pub enum OutputSide {
    Stdout(Mutex<io::Stdout>),
    File(FileWriter),
}

pub struct SplitIo {
    input: InputSide,
    output: OutputSide,
}

impl SplitIo {
    pub fn new(input: InputSide, output: OutputSide) -> Self {
        Self { input, output }
    }
}

impl LocalIO for SplitIo {
    fn readline(&self) -> io::Result<String> {
        match &self.input {
            InputSide::Stdin(stdin) => {
                let mut line = String::new();
                let mut stdin = stdin.lock().expect("stdin mutex poisoned");
                let n = stdin.read_line(&mut line)?;
                if n == 0 {
                    return Ok(String::new());
                }
                Ok(line.trim_end_matches(['\n', '\r']).to_string())
            }
            InputSide::File(f) => f.readline(),
        }
    }

    fn write(&self, text: &str) -> io::Result<()> {
        match &self.output {
            OutputSide::Stdout(stdout) => {
                stdout.lock().expect("stdout mutex poisoned").write_all(text.as_bytes())
            }
            OutputSide::File(f) => f.write(text),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match &self.output {
            OutputSide::Stdout(stdout) => stdout.lock().expect("stdout mutex poisoned").flush(),
            OutputSide::File(f) => f.flush(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory `SerialEndpoint` double: a scripted sequence of reads
    /// (each with its own delay-before-ready, so tests can model bursts
    /// and quiet gaps) and a record of everything written to it.
    pub struct FakeEndpoint {
        name: String,
        reads: Mutex<VecDeque<(Duration, Vec<u8>)>>,
        written: Mutex<Vec<u8>>,
    }

    impl FakeEndpoint {
        pub fn new(name: &str, reads: Vec<(Duration, Vec<u8>)>) -> Self {
            Self {
                name: name.to_string(),
                reads: Mutex::new(reads.into()),
                written: Mutex::new(Vec::new()),
            }
        }

        pub fn written(&self) -> Vec<u8> {
            self.written.lock().unwrap().clone()
        }
    }

    impl SerialEndpoint for FakeEndpoint {
        fn read(&self, _max_bytes: usize) -> io::Result<Vec<u8>> {
            let mut reads = self.reads.lock().unwrap();
            match reads.pop_front() {
                Some((delay, chunk)) => {
                    drop(reads);
                    std::thread::sleep(delay);
                    Ok(chunk)
                }
                None => {
                    // Scripted reads exhausted: behave like an idle port
                    // that keeps timing out so the reader thread can be
                    // shut down by the test without a real error.
                    drop(reads);
                    std::thread::sleep(Duration::from_millis(20));
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
}
