//! Configuration types: framing, flow control, and the immutable [`Config`]
//! the rest of the crate is built from. `Cli` is the `clap` surface;
//! `Config` is what the Supervisor actually consumes.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use derive_more::Display;

use crate::error::Error;

pub(crate) const BAUD_BOUNDS: std::ops::RangeInclusive<u32> = 50..=4_000_000;

/// Number of data bits per character on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DataBits {
    #[display("5")]
    Five,
    #[display("6")]
    Six,
    #[display("7")]
    Seven,
    #[display("8")]
    Eight,
}
impl From<DataBits> for serial2::CharSize {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serial2::CharSize::Bits5,
            DataBits::Six => serial2::CharSize::Bits6,
            DataBits::Seven => serial2::CharSize::Bits7,
            DataBits::Eight => serial2::CharSize::Bits8,
        }
    }
}

/// Parity bit scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Parity {
    #[display("N")]
    None,
    #[display("E")]
    Even,
    #[display("O")]
    Odd,
    #[display("M")]
    Mark,
    #[display("S")]
    Space,
}

/// Number of stop bits per character on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StopBits {
    #[display("1")]
    One,
    #[display("1.5")]
    OnePointFive,
    #[display("2")]
    Two,
}
impl From<StopBits> for serial2::StopBits {
    fn from(bits: StopBits) -> Self {
        // serial2 has no 1.5 stop-bit setting; fold it into Two, the closest
        // hardware-supported approximation. The framing string itself still
        // prints "1.5" so the operator sees what was asked for.
        match bits {
            StopBits::One => serial2::StopBits::One,
            StopBits::OnePointFive | StopBits::Two => serial2::StopBits::Two,
        }
    }
}

/// `DPS` data-bits/parity/stop-bits triple, e.g. `8N1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("{data_bits}{parity}{stop_bits}")]
pub struct Framing {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}
impl FromStr for Framing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let d = chars.next().ok_or_else(|| {
            Error::Config(format!(
                "invalid framing '{s}', expected <DATABITS><PARITY><STOPBITS> e.g. 8N1"
            ))
        })?;
        let p = chars.next().ok_or_else(|| {
            Error::Config(format!(
                "invalid framing '{s}', expected <DATABITS><PARITY><STOPBITS> e.g. 8N1"
            ))
        })?;
        let stop_rest: String = chars.collect();
        if stop_rest.is_empty() {
            return Err(Error::Config(format!(
                "invalid framing '{s}', expected <DATABITS><PARITY><STOPBITS> e.g. 8N1"
            )));
        }

        let data_bits = match d {
            '5' => DataBits::Five,
            '6' => DataBits::Six,
            '7' => DataBits::Seven,
            '8' => DataBits::Eight,
            _ => {
                return Err(Error::Config(format!(
                    "invalid data bits '{d}' in framing '{s}', expected one of 5,6,7,8"
                )));
            }
        };
        let parity = match p.to_ascii_uppercase() {
            'N' => Parity::None,
            'E' => Parity::Even,
            'O' => Parity::Odd,
            'M' => Parity::Mark,
            'S' => Parity::Space,
            _ => {
                return Err(Error::Config(format!(
                    "invalid parity '{p}' in framing '{s}', expected one of N,E,O,M,S"
                )));
            }
        };
        let stop_bits = match stop_rest.as_str() {
            "1" => StopBits::One,
            "1.5" => StopBits::OnePointFive,
            "2" => StopBits::Two,
            _ => {
                return Err(Error::Config(format!(
                    "invalid stop bits '{stop_rest}' in framing '{s}', expected one of 1,1.5,2"
                )));
            }
        };

        Ok(Framing {
            data_bits,
            parity,
            stop_bits,
        })
    }
}

/// Hardware/software flow-control lines enabled for a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowControl {
    pub xonxoff: bool,
    pub rtscts: bool,
    pub dsrdtr: bool,
}
impl FromStr for FlowControl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_uppercase();
        let fc = match normalized.as_str() {
            "NONE" => FlowControl {
                xonxoff: false,
                rtscts: false,
                dsrdtr: false,
            },
            "SW" => FlowControl {
                xonxoff: true,
                rtscts: false,
                dsrdtr: false,
            },
            "HW" | "RTS" | "CTS" => FlowControl {
                xonxoff: false,
                rtscts: true,
                dsrdtr: false,
            },
            "DTR" | "DSR" => FlowControl {
                xonxoff: false,
                rtscts: false,
                dsrdtr: true,
            },
            "SW/HW" | "SW/RTS" | "SW/CTS" => FlowControl {
                xonxoff: true,
                rtscts: true,
                dsrdtr: false,
            },
            "SW/DTR" | "SW/DSR" => FlowControl {
                xonxoff: true,
                rtscts: false,
                dsrdtr: true,
            },
            "ALL" => FlowControl {
                xonxoff: true,
                rtscts: true,
                dsrdtr: true,
            },
            _ => {
                return Err(Error::Config(format!(
                    "invalid flow control '{s}', expected one of NONE,SW,HW,DTR,SW/HW,SW/DTR,ALL"
                )));
            }
        };
        Ok(fc)
    }
}
impl std::fmt::Display for FlowControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match (self.xonxoff, self.rtscts, self.dsrdtr) {
            (false, false, false) => "NONE",
            (true, false, false) => "SW",
            (false, true, false) => "HW",
            (false, false, true) => "DTR",
            (true, true, false) => "SW/HW",
            (true, false, true) => "SW/DTR",
            (false, true, true) => "HW/DTR",
            (true, true, true) => "ALL",
        };
        write!(f, "{s}")
    }
}

/// Tri-state flag: an option whose default depends on other configuration
/// (whether MITM mode is active) unless the operator pins it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    #[default]
    Unset,
    On,
    Off,
}
impl TriState {
    pub fn resolve(self, default_on: bool) -> bool {
        match self {
            TriState::Unset => default_on,
            TriState::On => true,
            TriState::Off => false,
        }
    }
}

/// The character encoding used for the hexdump sidebar and quoted text.
/// `encoding_rs` covers the WHATWG set; CP437 is hand-tabulated in
/// [`crate::cp437`] since it falls outside that set but is this crate's
/// default (matching legacy serial-terminal convention).
#[derive(Debug, Clone, Copy)]
pub enum CharEncoding {
    Cp437,
    Web(&'static encoding_rs::Encoding),
}
impl CharEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            CharEncoding::Cp437 => "cp437",
            CharEncoding::Web(enc) => enc.name(),
        }
    }

    fn lookup(label: &str) -> Option<Self> {
        if crate::cp437::is_cp437_label(label) {
            return Some(CharEncoding::Cp437);
        }
        encoding_rs::Encoding::for_label(label.as_bytes()).map(CharEncoding::Web)
    }
}

/// A local text source: standard input, or an append/read file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalSource {
    Stdio,
    File(PathBuf),
}

/// Command-line surface, parsed with `clap`.
#[derive(Debug, Parser)]
#[command(
    name = "hexterm",
    about = "Raw hexadecimal terminal for observing and driving binary serial links",
    long_about = None
)]
pub struct Cli {
    /// Serial port identifier to open as DCE, e.g. /dev/ttyUSB0 or COM3
    #[arg(value_name = "PORT")]
    pub port: String,

    /// Baud rate
    #[arg(short = 'b', long = "baud", visible_alias = "speed", default_value_t = 9600)]
    pub baud: u32,

    /// Flow control method: NONE, SW, HW, DTR, SW/HW, SW/DTR, ALL
    #[arg(
        short = 'c',
        long = "flow-control",
        visible_alias = "control",
        default_value = "NONE"
    )]
    pub flow_control: String,

    /// Character encoding used for the hexdump sidebar and quoted text
    #[arg(short = 'e', long = "encoding", default_value = "cp437")]
    pub encoding: String,

    /// Framing as <DATABITS><PARITY><STOPBITS>, e.g. 8N1
    #[arg(short = 'f', long = "framing", default_value = "8N1")]
    pub framing: String,

    /// Command source: `-` for stdin, or a file path
    #[arg(short = 'i', long = "input", default_value = "-")]
    pub input: String,

    /// Hexdump/diagnostic sink: `-` for stdout, or a file path (append)
    #[arg(short = 'o', long = "output", default_value = "-")]
    pub output: String,

    /// Second serial port to monitor in man-in-the-middle mode
    #[arg(short = 'm', long = "mitm", visible_alias = "monitor")]
    pub mitm: Option<String>,

    /// Disable byte forwarding between DCE and DTE in MITM mode
    #[arg(long = "no-forwarding", visible_alias = "nf")]
    pub no_forwarding: bool,

    /// Force the timestamp prefix on
    #[arg(long = "ts", conflicts_with = "no_ts")]
    pub ts: bool,

    /// Force the timestamp prefix off
    #[arg(long = "no-ts")]
    pub no_ts: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Immutable configuration, validated and resolved from [`Cli`].
#[derive(Debug, Clone)]
pub struct Config {
    pub port: String,
    pub mitm_port: Option<String>,
    pub baud: u32,
    pub framing: Framing,
    pub flow_control: FlowControl,
    pub encoding: CharEncoding,
    pub input: LocalSource,
    pub output: LocalSource,
    pub forward: bool,
    pub timestamps: bool,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self, Error> {
        if !BAUD_BOUNDS.contains(&cli.baud) {
            return Err(Error::Config(format!(
                "baud {} out of supported range {}..={}",
                cli.baud,
                BAUD_BOUNDS.start(),
                BAUD_BOUNDS.end()
            )));
        }

        let framing = Framing::from_str(&cli.framing)?;
        let flow_control = FlowControl::from_str(&cli.flow_control)?;

        let mitm_port = cli.mitm.clone();
        if cli.no_forwarding && mitm_port.is_none() {
            return Err(Error::Config(
                "--no-forwarding requires -m/--mitm to be set".to_string(),
            ));
        }

        let encoding = CharEncoding::lookup(&cli.encoding).ok_or_else(|| {
            Error::Config(format!("unknown character encoding '{}'", cli.encoding))
        })?;

        let input = if cli.input == "-" {
            LocalSource::Stdio
        } else {
            LocalSource::File(PathBuf::from(&cli.input))
        };
        let output = if cli.output == "-" {
            LocalSource::Stdio
        } else {
            LocalSource::File(PathBuf::from(&cli.output))
        };

        let is_mitm = mitm_port.is_some();
        let forward = if is_mitm { !cli.no_forwarding } else { false };
        let ts_state = match (cli.ts, cli.no_ts) {
            (true, _) => TriState::On,
            (_, true) => TriState::Off,
            (false, false) => TriState::Unset,
        };
        let timestamps = ts_state.resolve(is_mitm);

        Ok(Config {
            port: cli.port.clone(),
            mitm_port,
            baud: cli.baud,
            framing,
            flow_control,
            encoding,
            input,
            output,
            forward,
            timestamps,
        })
    }

    pub fn is_mitm(&self) -> bool {
        self.mitm_port.is_some()
    }

    /// The aggregation window: time to transmit 16 characters at 12
    /// bit-times each, at the configured baud.
    pub fn msg_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64((16.0 * 12.0) / self.baud as f64)
    }
}
