//! Local Dispatcher: reads operator lines and routes them.
//!
//! Runs on the supervising thread rather than a spawned one. Each line
//! is either a control verb (`Q`, `H`/`?`, `W`, `T`) handled here
//! directly, or ordinary input that is parsed with the command parser
//! and written to DCE.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::CharEncoding;
use crate::io::{LocalIO, SerialEndpoint};
use crate::parser::{self, ParseError};

const HELP_TEXT: &str = "\
Commands:
  <hex/quoted text>   write bytes to DCE, e.g. 48 65 6C 6C 6F or \"hi\"
  t <hex/quoted text> write bytes to DTE (MITM mode only)
  w [seconds]         sleep, default 1 second
  h, ?                show this help
  q, <empty line>     quit
";

pub struct Dispatcher {
    local: Arc<dyn LocalIO>,
    dce: Arc<dyn SerialEndpoint>,
    dte: Option<Arc<dyn SerialEndpoint>>,
    encoding: CharEncoding,
    shutdown: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(
        local: Arc<dyn LocalIO>,
        dce: Arc<dyn SerialEndpoint>,
        dte: Option<Arc<dyn SerialEndpoint>>,
        encoding: CharEncoding,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            local,
            dce,
            dte,
            encoding,
            shutdown,
        }
    }

    /// Blocks until EOF, `quit`, or a fatal local error. Always leaves
    /// `shutdown` set on return.
    pub fn run(&self) {
        loop {
            let line = match self.local.readline() {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "local input read failed");
                    break;
                }
            };

            let trimmed = line.trim_start();
            let Some(verb) = trimmed.chars().next() else {
                break; // EOF or an empty line: both mean quit.
            };

            match verb.to_ascii_uppercase() {
                'Q' => break,
                'H' | '?' => self.print(HELP_TEXT),
                'W' => self.handle_wait(&trimmed[verb.len_utf8()..]),
                'T' => self.handle_dte(&trimmed[verb.len_utf8()..]),
                _ => self.handle_dce(&line),
            }
        }
        self.shutdown.store(true, Ordering::Release);
    }

    fn handle_wait(&self, rest: &str) {
        let secs: f64 = rest.trim().parse().unwrap_or(1.0);
        std::thread::sleep(Duration::from_secs_f64(secs.max(0.0)));
        self.print("done.\n");
    }

    fn handle_dte(&self, rest: &str) {
        let Some(dte) = &self.dte else {
            self.print("DTE not available (not running in MITM mode)\n");
            return;
        };
        self.parse_and_write(rest, dte.clone());
    }

    fn handle_dce(&self, line: &str) {
        self.parse_and_write(line, self.dce.clone());
    }

    fn parse_and_write(&self, text: &str, target: Arc<dyn SerialEndpoint>) {
        let bytes = match parser::parse(text, self.encoding) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.report_parse_error(&e);
                return;
            }
        };
        if bytes.is_empty() {
            return;
        }
        if let Err(e) = target.write(&bytes) {
            tracing::error!(port = target.name(), error = %e, "write failed, shutting down");
            self.shutdown.store(true, Ordering::Release);
        }
    }

    fn report_parse_error(&self, e: &ParseError) {
        self.print(&format!("parse error: {e}\n"));
    }

    fn print(&self, text: &str) {
        if let Err(e) = self.local.write(text) {
            tracing::error!(error = %e, "local sink write failed");
        }
        let _ = self.local.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::test_support::FakeEndpoint;
    use std::sync::Mutex;

    struct ScriptedIo {
        lines: Mutex<Vec<String>>,
        written: Mutex<Vec<String>>,
    }

    impl ScriptedIo {
        fn new(lines: Vec<&str>) -> Self {
            Self {
                lines: Mutex::new(lines.into_iter().rev().map(String::from).collect()),
                written: Mutex::new(Vec::new()),
            }
        }
    }

    impl LocalIO for ScriptedIo {
        fn readline(&self) -> std::io::Result<String> {
            Ok(self.lines.lock().unwrap().pop().unwrap_or_default())
        }
        fn write(&self, text: &str) -> std::io::Result<()> {
            self.written.lock().unwrap().push(text.to_string());
            Ok(())
        }
        fn flush(&self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn dce_only(lines: Vec<&str>) -> (Arc<ScriptedIo>, Arc<FakeEndpoint>, Dispatcher) {
        let io = Arc::new(ScriptedIo::new(lines));
        let dce = Arc::new(FakeEndpoint::new("dce", vec![]));
        let shutdown = Arc::new(AtomicBool::new(false));
        let disp = Dispatcher::new(
            io.clone() as Arc<dyn LocalIO>,
            dce.clone() as Arc<dyn SerialEndpoint>,
            None,
            CharEncoding::Cp437,
            shutdown,
        );
        (io, dce, disp)
    }

    #[test]
    fn empty_line_quits() {
        let (_, _, disp) = dce_only(vec![""]);
        disp.run();
        assert!(disp.shutdown.load(Ordering::Acquire));
    }

    #[test]
    fn quit_command_quits() {
        let (_, _, disp) = dce_only(vec!["quit"]);
        disp.run();
        assert!(disp.shutdown.load(Ordering::Acquire));
    }

    #[test]
    fn mixed_hex_and_quote_writes_to_dce() {
        let (_, dce, disp) = dce_only(vec![r#"48 "AB" 0a"#, "q"]);
        disp.run();
        assert_eq!(dce.written(), vec![0x48, 0x41, 0x42, 0x0A]);
    }

    #[test]
    fn parse_error_is_reported_and_nothing_written() {
        let (io, dce, disp) = dce_only(vec!["zzz", "q"]);
        disp.run();
        assert!(dce.written().is_empty());
        let written = io.written.lock().unwrap();
        assert!(written.iter().any(|l| l.starts_with("parse error:")));
    }

    #[test]
    fn wait_sleeps_and_prints_done() {
        let (io, _, disp) = dce_only(vec!["w 0.01", "q"]);
        disp.run();
        let written = io.written.lock().unwrap();
        assert!(written.iter().any(|l| l == "done.\n"));
    }

    #[test]
    fn t_without_mitm_reports_dte_unavailable() {
        let (io, _, disp) = dce_only(vec!["t 41", "q"]);
        disp.run();
        let written = io.written.lock().unwrap();
        assert!(written.iter().any(|l| l.contains("DTE not available")));
    }

    #[test]
    fn t_with_mitm_writes_to_dte() {
        let local_io = Arc::new(ScriptedIo::new(vec!["t 41", "q"]));
        let dce = Arc::new(FakeEndpoint::new("dce", vec![]));
        let dte = Arc::new(FakeEndpoint::new("dte", vec![]));
        let shutdown = Arc::new(AtomicBool::new(false));
        let disp = Dispatcher::new(
            local_io.clone() as Arc<dyn LocalIO>,
            dce.clone() as Arc<dyn SerialEndpoint>,
            Some(dte.clone() as Arc<dyn SerialEndpoint>),
            CharEncoding::Cp437,
            shutdown,
        );
        disp.run();
        assert_eq!(dte.written(), vec![0x41]);
        assert!(dce.written().is_empty());
    }

    #[test]
    fn help_verb_prints_help_text() {
        let (io, _, disp) = dce_only(vec!["h", "q"]);
        disp.run();
        let written = io.written.lock().unwrap();
        assert!(written.iter().any(|l| l.starts_with("Commands:")));
    }
}
