//! Hexdump line formatter.
//!
//! Turns up to 16 bytes into one canonical line: two 8-byte hex halves,
//! each right-padded to exactly 24 visible columns, a two-space
//! separator, a further single space, a `|`-delimited 16-column decoded
//! sidebar, and a closing `|`. Never emits more or fewer than the bytes
//! it was given; callers (the aggregator) are responsible for splitting
//! input into ≤16-byte chunks.
//!
//! Each hex half is padded to a fixed 24-column width regardless of how
//! many bytes it holds, rather than shrinking the separator when the
//! second half is empty — a content-independent width keeps every line
//! the same shape and is simpler to align visually; see `DESIGN.md` for
//! the reasoning.

use crate::codec;
use crate::config::CharEncoding;

const HALF_WIDTH: usize = 24;
const SIDEBAR_WIDTH: usize = 16;

/// Format `bytes` (1..=16 of them) as one hexdump line, without the
/// direction prefix or timestamp that the aggregator adds on top.
///
/// # Panics
/// Panics if `bytes` is empty or longer than 16 — both are aggregator
/// bugs, not operator-triggerable conditions.
pub fn format_line(bytes: &[u8], encoding: CharEncoding) -> String {
    assert!(
        !bytes.is_empty() && bytes.len() <= 16,
        "hexdump line must carry 1..=16 bytes, got {}",
        bytes.len()
    );

    let (first, second) = bytes.split_at(bytes.len().min(8));

    let mut line = String::with_capacity(24 + 2 + 24 + 1 + 16 + 1);
    push_half(&mut line, first);
    line.push_str("  ");
    push_half(&mut line, second);
    line.push(' ');
    line.push('|');
    push_sidebar(&mut line, bytes, encoding);
    line.push('|');
    line
}

fn push_half(out: &mut String, half: &[u8]) {
    let start = out.len();
    for (i, b) in half.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{b:02X}"));
    }
    pad_to(out, start, HALF_WIDTH);
}

fn push_sidebar(out: &mut String, bytes: &[u8], encoding: CharEncoding) {
    let decoded = codec::decode(bytes, encoding);
    let printable = codec::make_printable(&decoded);
    let start = out.len();
    out.push_str(&printable);
    pad_to(out, start, SIDEBAR_WIDTH);
}

fn pad_to(out: &mut String, start: usize, width: usize) {
    let visible = out[start..].chars().count();
    for _ in visible..width {
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_bytes_formats_one_short_line_with_fixed_width_halves() {
        let line = format_line(&[0x48, 0x69, 0x0A], CharEncoding::Cp437);
        assert_eq!(
            line,
            "48 69 0A                                           |Hi.             |"
        );
    }

    #[test]
    fn sixteen_bytes_fills_both_halves() {
        let bytes: Vec<u8> = (0u8..16).collect();
        let line = format_line(&bytes, CharEncoding::Cp437);
        assert!(line.starts_with("00 01 02 03 04 05 06 07   08 09 0A 0B 0C 0D 0E 0F  |"));
        assert_eq!(line.chars().filter(|&c| c == '|').count(), 2);
    }

    #[test]
    fn single_byte_only_fills_left_half() {
        let line = format_line(&[0xFF], CharEncoding::Cp437);
        let bar = line.find('|').unwrap();
        let left = &line[..bar - 1];
        assert_eq!(left.trim_end(), "FF");
    }

    #[test]
    fn non_printable_bytes_become_periods() {
        let line = format_line(&[0x00, 0x01, 0x7F], CharEncoding::Cp437);
        let sidebar = line.rsplit('|').nth(1).unwrap();
        assert_eq!(sidebar, "...             ");
    }

    #[test]
    #[should_panic]
    fn rejects_more_than_sixteen_bytes() {
        let bytes = vec![0u8; 17];
        format_line(&bytes, CharEncoding::Cp437);
    }

    #[test]
    #[should_panic]
    fn rejects_empty_slice() {
        format_line(&[], CharEncoding::Cp437);
    }
}
