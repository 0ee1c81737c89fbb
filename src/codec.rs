//! Codec and printable-character filter.
//!
//! `decode` never fails: undecodable bytes come back as the encoding's
//! replacement character. `encode` does fail, since silently dropping bytes
//! the operator asked to send is worse than reporting a [`ParseError`](crate::parser::ParseError).

use crate::config::CharEncoding;

/// Decode `bytes` with the named encoding, replacing anything undecodable
/// with the encoding's own replacement character.
pub fn decode(bytes: &[u8], encoding: CharEncoding) -> String {
    match encoding {
        CharEncoding::Cp437 => crate::cp437::decode(bytes),
        CharEncoding::Web(enc) => {
            let (text, _had_errors) = enc.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

/// Encode `text` with the named encoding. Fails if the encoding cannot
/// represent every character.
pub fn encode(text: &str, encoding: CharEncoding) -> Result<Vec<u8>, EncodingError> {
    match encoding {
        CharEncoding::Cp437 => crate::cp437::encode(text).ok_or_else(|| EncodingError {
            encoding: "cp437",
            text: text.to_string(),
        }),
        CharEncoding::Web(enc) => {
            let (bytes, _, had_unmappable) = enc.encode(text);
            if had_unmappable {
                return Err(EncodingError {
                    encoding: enc.name(),
                    text: text.to_string(),
                });
            }
            Ok(bytes.into_owned())
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("cannot encode '{text}' as {encoding}")]
pub struct EncodingError {
    encoding: &'static str,
    text: String,
}

/// True for glyph-bearing characters: excludes control characters, tabs,
/// and any whitespace that moves the cursor (newline, carriage return, form
/// feed, etc). Plain ASCII space is printable.
pub fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !c.is_control() && !c.is_whitespace()
}

/// Replace every non-printable character in `text` with a single ASCII
/// period. Idempotent: re-running it on its own output is a no-op.
pub fn make_printable(text: &str) -> String {
    text.chars()
        .map(|c| if is_printable(c) { c } else { '.' })
        .collect()
}
