//! Command parser: turns one operator line into wire bytes.
//!
//! A line is a left-to-right stream of tokens: hex-digit pairs become
//! bytes directly; `'`/`"`-quoted runs are encoded with the configured
//! character encoding and appended; anything else is a [`ParseError`].
//! A dangling odd hex digit at end of input is rejected rather than
//! zero-padded — see [`ParseError::DanglingHexDigit`].

use crate::codec::{self, EncodingError};
use crate::config::CharEncoding;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("dangling hex digit '{0}' with no pair at end of input")]
    DanglingHexDigit(char),
    #[error("unterminated quoted string starting at column {0}")]
    UnterminatedQuote(usize),
    #[error("unexpected character '{0}' at column {1}, expected hex digit or quote")]
    UnexpectedChar(char, usize),
    #[error("cannot encode quoted text: {0}")]
    Encoding(String),
}

impl From<EncodingError> for ParseError {
    fn from(e: EncodingError) -> Self {
        ParseError::Encoding(e.to_string())
    }
}

/// Parse `line` into the bytes it describes, mixing hex pairs and quoted
/// text under `encoding`. Trailing newline, if present, is ignored.
pub fn parse(line: &str, encoding: CharEncoding) -> Result<Vec<u8>, ParseError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let chars: Vec<char> = line.chars().collect();
    let mut out = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_hexdigit() {
            let (byte, consumed) = parse_hex_pair(&chars, i)?;
            out.push(byte);
            i += consumed;
            continue;
        }
        if c == '\'' || c == '"' {
            let (text, consumed) = parse_quoted(&chars, i)?;
            let mut encoded = codec::encode(&text, encoding)?;
            out.append(&mut encoded);
            i += consumed;
            continue;
        }
        return Err(ParseError::UnexpectedChar(c, i));
    }

    Ok(out)
}

/// Consume exactly two hex digits starting at `start`. A single trailing
/// digit followed by whitespace or end-of-line is a [`ParseError`] rather
/// than being zero-padded.
fn parse_hex_pair(chars: &[char], start: usize) -> Result<(u8, usize), ParseError> {
    let hi = chars[start];
    match chars.get(start + 1) {
        Some(&lo) if lo.is_ascii_hexdigit() => {
            let byte = (hex_val(hi) << 4) | hex_val(lo);
            Ok((byte, 2))
        }
        _ => Err(ParseError::DanglingHexDigit(hi)),
    }
}

fn hex_val(c: char) -> u8 {
    c.to_digit(16).expect("caller checked is_ascii_hexdigit") as u8
}

/// Consume a `'...'` or `"..."` run starting at `start` (which points at
/// the opening quote). Returns the enclosed text and the number of
/// characters consumed, including both quote characters.
fn parse_quoted(chars: &[char], start: usize) -> Result<(String, usize), ParseError> {
    let quote = chars[start];
    let mut i = start + 1;
    let mut text = String::new();
    while i < chars.len() {
        if chars[i] == quote {
            return Ok((text, i - start + 1));
        }
        text.push(chars[i]);
        i += 1;
    }
    Err(ParseError::UnterminatedQuote(start))
}
