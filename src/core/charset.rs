use std::borrow::Cow;

use encoding_rs::{EncoderResult, Encoding, UTF_8};
use log::warn;

use crate::error::{CsvError, Result};

/// Label meaning "no transcoding".
pub const CHARSET_DEFAULT: &str = "utf-8";

/// Cyrillic Windows code page, as expected by spreadsheet software.
pub const CHARSET_EXCEL: &str = "cp1251";

/// Byte written in place of a character the target charset cannot represent.
const UNMAPPABLE: u8 = b'?';

/// A non-UTF-8, ASCII-compatible charset that values are transcoded through.
///
/// Transcoding is best effort in both directions: characters without a
/// mapping are written as `?` and malformed input decodes to U+FFFD. Both
/// cases are logged and never reported as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charset {
    encoding: &'static Encoding,
}

impl Charset {
    /// Resolves a charset label.
    ///
    /// Returns `Ok(None)` for an empty label or any spelling of UTF-8, which
    /// means data passes through untouched.
    ///
    /// # Errors
    ///
    /// `CsvError::Config` for unknown labels and for charsets that are not
    /// ASCII-compatible, since delimiters and quotes must stay single bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use csv_stream_rs::core::charset::Charset;
    ///
    /// assert!(Charset::resolve(" UTF8 ").unwrap().is_none());
    /// assert_eq!(Charset::resolve("cp1251").unwrap().unwrap().name(), "windows-1251");
    /// assert!(Charset::resolve("klingon").is_err());
    /// ```
    pub fn resolve(label: &str) -> Result<Option<Charset>> {
        let label = label.trim();
        if label.is_empty() {
            return Ok(None);
        }

        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| CsvError::Config(format!("unknown charset `{}`", label)))?;

        if encoding == UTF_8 {
            return Ok(None);
        }

        if !encoding.is_ascii_compatible() {
            return Err(CsvError::Config(format!(
                "charset `{}` is not ASCII-compatible",
                label
            )));
        }

        Ok(Some(Charset { encoding }))
    }

    /// Canonical name of the charset (`windows-1251` for `cp1251`).
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Encodes UTF-8 text into this charset.
    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        if text.is_ascii() {
            return Cow::Borrowed(text.as_bytes());
        }

        let mut encoder = self.encoding.new_encoder();
        let mut out = Vec::with_capacity(text.len());
        let mut rest = text;
        let mut lost = 0usize;

        loop {
            let (result, read) =
                encoder.encode_from_utf8_to_vec_without_replacement(rest, &mut out, true);
            rest = &rest[read..];

            match result {
                EncoderResult::InputEmpty => break,
                EncoderResult::OutputFull => out.reserve(rest.len() + 16),
                EncoderResult::Unmappable(_) => {
                    lost += 1;
                    out.push(UNMAPPABLE);
                }
            }
        }

        if lost > 0 {
            warn!(
                "{} character(s) not representable in {}, replaced",
                lost,
                self.name()
            );
        }

        Cow::Owned(out)
    }

    /// Decodes bytes of this charset into UTF-8 text.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, had_errors) = self.encoding.decode_without_bom_handling(bytes);
        if had_errors {
            warn!("malformed {} input, replaced", self.name());
        }
        text.into_owned()
    }
}

/// Encodes `text` through `charset`, or passes it through when there is none.
pub fn encode_with<'a>(charset: Option<&Charset>, text: &'a str) -> Cow<'a, [u8]> {
    match charset {
        Some(charset) => charset.encode(text),
        None => Cow::Borrowed(text.as_bytes()),
    }
}

/// Decodes `bytes` through `charset`, or as lossy UTF-8 when there is none.
pub fn decode_with(charset: Option<&Charset>, bytes: &[u8]) -> String {
    match charset {
        Some(charset) => charset.decode(bytes),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_labels_mean_passthrough() {
        for label in ["", "  ", "utf-8", "UTF-8", "utf8", "Utf8 "] {
            assert!(Charset::resolve(label).unwrap().is_none(), "{label:?}");
        }
    }

    #[test]
    fn cyrillic_round_trip() {
        let charset = Charset::resolve(CHARSET_EXCEL).unwrap().unwrap();

        let bytes = charset.encode("Иван Иванович");
        assert_eq!(bytes.len(), "Иван Иванович".chars().count());
        assert_eq!(charset.decode(&bytes), "Иван Иванович");
    }

    #[test]
    fn unmappable_characters_are_replaced() {
        let charset = Charset::resolve("windows-1251").unwrap().unwrap();

        let bytes = charset.encode("Ж中Ж");
        assert_eq!(charset.decode(&bytes), "Ж?Ж");
    }

    #[test]
    fn rejects_unknown_and_wide_charsets() {
        assert!(matches!(
            Charset::resolve("no-such-charset"),
            Err(CsvError::Config(_))
        ));
        assert!(matches!(Charset::resolve("utf-16le"), Err(CsvError::Config(_))));
    }

    #[test]
    fn passthrough_without_charset() {
        assert_eq!(encode_with(None, "é").as_ref(), "é".as_bytes());
        assert_eq!(decode_with(None, &[0x66, 0xff]), "f\u{fffd}");
    }
}
