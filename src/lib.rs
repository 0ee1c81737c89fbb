//! Hexterm: an interactive terminal for observing and driving binary
//! serial links.
//!
//! Hexterm attaches to one serial endpoint (DCE) or two (DCE+DTE,
//! man-in-the-middle), continuously renders bytes flowing in each
//! direction as time-grouped canonical hex+ASCII lines, and lets an
//! operator inject bytes by typing hex or quoted text.
//!
//! The crate is organized leaf-first, mirroring the dataflow:
//! [`codec`]/[`cp437`] decode bytes for display, [`hexfmt`] turns a byte
//! chunk into one hexdump line, [`parser`] turns an operator line into
//! wire bytes, [`aggregator`] buffers and times line emission per
//! direction, [`reader`] and [`dispatcher`] are the two sides of the
//! concurrent pipeline, and [`supervisor`] wires it all together.
//!
//! # Example
//! Parsing an operator command line into wire bytes, the same way the
//! Local Dispatcher does before writing to DCE:
//! ```
//! use hexterm::config::CharEncoding;
//! use hexterm::parser;
//!
//! let bytes = parser::parse(r#"48 "AB" 0a"#, CharEncoding::Cp437).unwrap();
//! assert_eq!(bytes, vec![0x48, 0x41, 0x42, 0x0A]);
//! ```

pub mod aggregator;
pub mod codec;
pub mod config;
pub mod cp437;
pub mod dispatcher;
pub mod error;
pub mod hexfmt;
pub mod io;
pub mod parser;
pub mod reader;
pub mod supervisor;

pub use config::{CharEncoding, Cli, Config};
pub use error::{Error, HexResult};
