//! Incremental hex -> UTF-8 decoder for log chunks.
//!
//! The log endpoint ships raw bytes as hex digit pairs and may cut a
//! multi-byte character at a chunk boundary, so the decoder keeps the
//! unfinished sequence between `feed` calls.

use derive_more::Display;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum DecodeError {
    #[display("hex input has to have even length, got {len}")]
    OddLength { len: usize },
    #[display("invalid hex digit pair at byte {position}")]
    InvalidDigit { position: usize },
}

impl std::error::Error for DecodeError {}

/// `pending` is the number of continuation bytes still expected (0..=3),
/// `value` holds the bits folded in so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexUtf8Decoder {
    pending: u8,
    value: u32,
}

impl HexUtf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> u8 {
        self.pending
    }

    /// Decode the next run of hex digit pairs.
    ///
    /// Malformed byte sequences are dropped; only a malformed hex string is
    /// an error, since that means the caller broke the wire contract.
    pub fn feed(&mut self, hex: &str) -> Result<String, DecodeError> {
        let digits = hex.as_bytes();
        if digits.len() % 2 != 0 {
            return Err(DecodeError::OddLength { len: digits.len() });
        }

        let mut out = String::with_capacity(digits.len() / 2);
        for (idx, pair) in digits.chunks_exact(2).enumerate() {
            let byte = match (nibble(pair[0]), nibble(pair[1])) {
                (Some(hi), Some(lo)) => (hi << 4) | lo,
                _ => return Err(DecodeError::InvalidDigit { position: idx * 2 }),
            };
            self.push_byte(byte, &mut out);
        }
        Ok(out)
    }

    fn push_byte(&mut self, byte: u8, out: &mut String) {
        if self.pending > 0 {
            if (0x80..0xC0).contains(&byte) {
                self.value = (self.value << 6) | u32::from(byte & 0x3F);
                self.pending -= 1;
                if self.pending == 0 {
                    if let Some(ch) = char::from_u32(self.value) {
                        out.push(ch);
                    }
                }
                return;
            }
            // The pending sequence is broken; start over with this byte.
            self.pending = 0;
        }

        match byte {
            0x00..=0x7F => out.push(char::from(byte)),
            0xC0..=0xDF => self.start(1, byte & 0x1F),
            0xE0..=0xEF => self.start(2, byte & 0x0F),
            0xF0..=0xF7 => self.start(3, byte & 0x07),
            // stray continuation byte or 0xF8..=0xFF
            _ => {}
        }
    }

    fn start(&mut self, pending: u8, lead_bits: u8) {
        self.pending = pending;
        self.value = u32::from(lead_bits);
    }
}

fn nibble(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_of(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn decodes_ascii_and_multibyte() {
        let text = "zażółć ✓ 🦀";
        let mut decoder = HexUtf8Decoder::new();
        assert_eq!(decoder.feed(&hex_of(text.as_bytes())).unwrap(), text);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn split_points_do_not_change_output() {
        let text = "log: ✓ done — 🦀\n\u{1b}[1;32mOK\u{1b}[m";
        let hex = hex_of(text.as_bytes());
        let whole = HexUtf8Decoder::new().feed(&hex).unwrap();

        for split in (0..=hex.len()).step_by(2) {
            let mut decoder = HexUtf8Decoder::new();
            let mut joined = decoder.feed(&hex[..split]).unwrap();
            joined.push_str(&decoder.feed(&hex[split..]).unwrap());
            assert_eq!(joined, whole, "split at {split}");
        }

        // one byte per call
        let mut decoder = HexUtf8Decoder::new();
        let mut joined = String::new();
        for pair in hex.as_bytes().chunks(2) {
            joined.push_str(&decoder.feed(std::str::from_utf8(pair).unwrap()).unwrap());
        }
        assert_eq!(joined, whole);
    }

    #[test]
    fn multibyte_char_straddling_feeds_waits_for_continuation() {
        let mut decoder = HexUtf8Decoder::new();
        assert_eq!(decoder.feed("e2").unwrap(), "");
        assert_eq!(decoder.pending(), 2);
        assert_eq!(decoder.feed("9c").unwrap(), "");
        assert_eq!(decoder.feed("93").unwrap(), "✓");
    }

    #[test]
    fn invalid_bytes_are_dropped() {
        let mut decoder = HexUtf8Decoder::new();
        // stray continuation, 0xff, then 'a'
        assert_eq!(decoder.feed("80ff61").unwrap(), "a");
        // broken sequence: lead byte followed by ascii
        assert_eq!(decoder.feed("e262").unwrap(), "b");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn odd_length_is_an_error() {
        let mut decoder = HexUtf8Decoder::new();
        assert_eq!(decoder.feed("616"), Err(DecodeError::OddLength { len: 3 }));
        assert_eq!(
            decoder.feed("6g"),
            Err(DecodeError::InvalidDigit { position: 0 })
        );
    }
}
