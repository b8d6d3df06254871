use std::char::DecodeUtf16;
use std::iter::{FusedIterator, Map};
use std::slice::{self, ChunksExact};
use std::str::{Chars, Utf8Chunks};

/// Text encodings understood by
/// [`StringPool::get_or_add_bytes()`][crate::StringPool::get_or_add_bytes].
///
/// Malformed input never fails: each invalid sequence decodes as U+FFFD.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum TextEncoding {
    /// UTF-8.
    #[default]
    Utf8,

    /// UTF-16, little-endian code units. A dangling final byte decodes as U+FFFD.
    Utf16Le,

    /// UTF-16, big-endian code units. A dangling final byte decodes as U+FFFD.
    Utf16Be,

    /// ISO-8859-1, where every byte is the code point of the same value.
    Latin1,
}

type CodeUnits<'a> = Map<ChunksExact<'a, u8>, fn(&[u8]) -> u16>;

/// Lazily decoded characters of a byte sequence.
///
/// Cloning is cheap, so the same bytes can be walked once to fingerprint them and again to
/// compare or materialize them without an intermediate buffer.
#[derive(Clone, Debug)]
pub(crate) enum DecodedChars<'a> {
    Utf8 {
        chunks: Utf8Chunks<'a>,
        current: Chars<'a>,

        /// The chunk being walked ended in an invalid sequence.
        replacement_pending: bool,
    },
    Utf16 {
        units: DecodeUtf16<CodeUnits<'a>>,

        /// The input had an odd length.
        dangling_byte: bool,
    },
    Latin1(slice::Iter<'a, u8>),
}

impl<'a> DecodedChars<'a> {
    pub(crate) fn new(bytes: &'a [u8], encoding: TextEncoding) -> Self {
        match encoding {
            TextEncoding::Utf8 => Self::Utf8 {
                chunks: bytes.utf8_chunks(),
                current: "".chars(),
                replacement_pending: false,
            },
            TextEncoding::Utf16Le => Self::utf16(bytes, |pair| u16::from_le_bytes(to_pair(pair))),
            TextEncoding::Utf16Be => Self::utf16(bytes, |pair| u16::from_be_bytes(to_pair(pair))),
            TextEncoding::Latin1 => Self::Latin1(bytes.iter()),
        }
    }

    fn utf16(bytes: &'a [u8], to_unit: fn(&[u8]) -> u16) -> Self {
        let pairs = bytes.chunks_exact(2);
        let dangling_byte = !pairs.remainder().is_empty();

        Self::Utf16 {
            units: char::decode_utf16(pairs.map(to_unit)),
            dangling_byte,
        }
    }
}

/// `chunks_exact(2)` only yields two-byte chunks.
fn to_pair(chunk: &[u8]) -> [u8; 2] {
    <[u8; 2]>::try_from(chunk).unwrap_or_default()
}

impl Iterator for DecodedChars<'_> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        match self {
            Self::Utf8 {
                chunks,
                current,
                replacement_pending,
            } => loop {
                if let Some(c) = current.next() {
                    return Some(c);
                }

                if *replacement_pending {
                    *replacement_pending = false;
                    return Some(char::REPLACEMENT_CHARACTER);
                }

                let chunk = chunks.next()?;
                *current = chunk.valid().chars();
                *replacement_pending = !chunk.invalid().is_empty();
            },
            Self::Utf16 {
                units,
                dangling_byte,
            } => match units.next() {
                Some(decoded) => Some(decoded.unwrap_or(char::REPLACEMENT_CHARACTER)),
                None if *dangling_byte => {
                    *dangling_byte = false;
                    Some(char::REPLACEMENT_CHARACTER)
                }
                None => None,
            },
            Self::Latin1(bytes) => bytes.next().map(|b| char::from(*b)),
        }
    }
}

impl FusedIterator for DecodedChars<'_> {}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn decode(bytes: &[u8], encoding: TextEncoding) -> String {
        DecodedChars::new(bytes, encoding).collect()
    }

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn utf16be(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_be_bytes).collect()
    }

    #[test]
    fn valid_input_round_trips() {
        let text = "plain ascii, Grüße, 日本語, 🦀";

        assert_eq!(decode(text.as_bytes(), TextEncoding::Utf8), text);
        assert_eq!(decode(&utf16le(text), TextEncoding::Utf16Le), text);
        assert_eq!(decode(&utf16be(text), TextEncoding::Utf16Be), text);
    }

    #[test]
    fn latin1_maps_bytes_to_code_points() {
        assert_eq!(decode(&[0x41, 0xE9, 0xFF], TextEncoding::Latin1), "Aéÿ");
    }

    #[test]
    fn malformed_utf8_is_replaced() {
        assert_eq!(decode(b"a\xFFb", TextEncoding::Utf8), "a\u{FFFD}b");
        assert_eq!(decode(b"\xF0\x9F", TextEncoding::Utf8), "\u{FFFD}");
        assert_eq!(decode(b"\xC3", TextEncoding::Utf8), "\u{FFFD}");
        assert_eq!(decode(b"\xFF\xFE", TextEncoding::Utf8), "\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn malformed_utf16_is_replaced() {
        // Lone high surrogate followed by 'A'.
        assert_eq!(
            decode(&[0x00, 0xD8, 0x41, 0x00], TextEncoding::Utf16Le),
            "\u{FFFD}A"
        );

        // Dangling byte.
        assert_eq!(decode(&[0x41, 0x00, 0x42], TextEncoding::Utf16Le), "A\u{FFFD}");
        assert_eq!(decode(&[0x00, 0x41, 0x00], TextEncoding::Utf16Be), "A\u{FFFD}");
    }

    #[test]
    fn empty_input_decodes_to_nothing() {
        for encoding in [
            TextEncoding::Utf8,
            TextEncoding::Utf16Le,
            TextEncoding::Utf16Be,
            TextEncoding::Latin1,
        ] {
            assert_eq!(DecodedChars::new(&[], encoding).next(), None);
        }
    }

    #[test]
    fn clones_walk_independently() {
        let mut chars = DecodedChars::new(b"xy\xFFz", TextEncoding::Utf8);
        assert_eq!(chars.next(), Some('x'));

        let copy = chars.clone();

        assert_eq!(chars.collect::<String>(), "y\u{FFFD}z");
        assert_eq!(copy.collect::<String>(), "y\u{FFFD}z");
    }
}
