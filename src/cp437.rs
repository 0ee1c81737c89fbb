//! Code page 437 (IBM PC / MS-DOS) table.
//!
//! `encoding_rs` only implements the WHATWG encoding set, which does not
//! include CP437 — so it is hand-tabulated here instead, following the
//! standard IBM PC character set. Bytes 0x00-0x7F are ASCII; 0x80-0xFF map
//! through [`HIGH_HALF`].

/// Unicode scalar values for bytes 0x80..=0xFF, in order.
const HIGH_HALF: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', 'É', 'æ', 'Æ',
    'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', 'á', 'í', 'ó', 'ú', 'ñ', 'Ñ',
    'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕',
    '╣', '║', '╗', '╝', '╜', '╛', '┐', '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦',
    '╠', '═', '╬', '╧', '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐',
    '▀', 'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', '≡', '±',
    '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{00A0}',
];

pub fn decode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b < 0x80 {
                b as char
            } else {
                HIGH_HALF[(b - 0x80) as usize]
            }
        })
        .collect()
}

/// Returns `None` if `text` contains a character with no CP437 codepoint.
pub fn encode(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        if (c as u32) < 0x80 {
            out.push(c as u8);
        } else if let Some(idx) = HIGH_HALF.iter().position(|&h| h == c) {
            out.push(0x80 + idx as u8);
        } else {
            return None;
        }
    }
    Some(out)
}

pub(crate) fn is_cp437_label(label: &str) -> bool {
    matches!(
        label.to_ascii_lowercase().as_str(),
        "cp437" | "ibm437" | "cspc8codepage437" | "437" | "oem-437" | "dos-437"
    )
}
