use std::io;

use csv::{ByteRecord, QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

use super::csv_file::CsvFileConfig;

/// Line terminator written after every row.
pub const LINE_TERMINATOR: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    FieldStart,
    Unquoted,
    Quoted,
    QuotedEscape,
    QuoteInQuoted,
}

/// Tracks quoting across physical lines so a record whose quoted field spans
/// several `\n` is only handed to the tokenizer once it is complete.
///
/// The transitions mirror the tokenizer's: a quote only opens a quoted field
/// at the start of a field, a doubled quote stays inside it and the escape
/// byte takes the following byte literally.
#[derive(Debug)]
pub(crate) struct LineScanner {
    delimiter: u8,
    quote: u8,
    escape: Option<u8>,
    state: ScanState,
}

impl LineScanner {
    pub(crate) fn new(config: &CsvFileConfig) -> Self {
        Self {
            delimiter: config.delimiter,
            quote: config.quote,
            escape: config.escape_byte(),
            state: ScanState::FieldStart,
        }
    }

    /// Feeds the next physical line (terminator included).
    ///
    /// Returns `true` when the bytes fed so far form a complete record.
    pub(crate) fn feed(&mut self, line: &[u8]) -> bool {
        for &byte in line {
            self.state = match self.state {
                ScanState::FieldStart if byte == self.quote => ScanState::Quoted,
                ScanState::FieldStart | ScanState::Unquoted if byte == self.delimiter => {
                    ScanState::FieldStart
                }
                ScanState::FieldStart | ScanState::Unquoted => ScanState::Unquoted,
                ScanState::Quoted if byte == self.quote => ScanState::QuoteInQuoted,
                ScanState::Quoted if Some(byte) == self.escape => ScanState::QuotedEscape,
                ScanState::Quoted | ScanState::QuotedEscape => ScanState::Quoted,
                ScanState::QuoteInQuoted if byte == self.quote => ScanState::Quoted,
                ScanState::QuoteInQuoted if byte == self.delimiter => ScanState::FieldStart,
                ScanState::QuoteInQuoted => ScanState::Unquoted,
            };

            if byte == LINE_TERMINATOR
                && !matches!(self.state, ScanState::Quoted | ScanState::QuotedEscape)
            {
                self.state = ScanState::FieldStart;
                return true;
            }
        }

        false
    }
}

/// Splits one complete logical line into raw field bytes.
///
/// The trailing `\n` or `\r\n` is dropped before tokenizing, so a `\r`
/// anywhere else stays field content. A line holding nothing but its
/// terminator is an empty record.
pub(crate) fn parse_record(config: &CsvFileConfig, line: &[u8]) -> csv::Result<Vec<Vec<u8>>> {
    let line = strip_terminator(line);
    if line.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(config.delimiter)
        .quote(config.quote)
        .escape(config.escape_byte())
        .double_quote(true)
        .terminator(Terminator::Any(LINE_TERMINATOR))
        .from_reader(line);

    let mut record = ByteRecord::new();
    if !reader.read_byte_record(&mut record)? {
        return Ok(Vec::new());
    }

    let fields = record.iter().map(<[u8]>::to_vec).collect();

    if reader.read_byte_record(&mut record)? {
        return Err(csv::Error::from(io::Error::new(
            io::ErrorKind::InvalidData,
            "logical line holds more than one record",
        )));
    }

    Ok(fields)
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(&[LINE_TERMINATOR]).unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Serializes already-encoded field bytes into one terminated line.
///
/// When any field carries the escape byte the row is quoted in full and the
/// escape bytes doubled, since the tokenizer only honours escapes inside
/// quoted fields.
pub(crate) fn serialize_record(
    config: &CsvFileConfig,
    fields: &[Vec<u8>],
) -> csv::Result<Vec<u8>> {
    if fields.is_empty() {
        return Ok(vec![LINE_TERMINATOR]);
    }

    let escape = config.escape_byte();
    let needs_escaping =
        escape.is_some_and(|escape| fields.iter().any(|field| field.contains(&escape)));

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(config.delimiter)
        .quote(config.quote)
        .double_quote(true)
        .quote_style(if needs_escaping {
            QuoteStyle::Always
        } else {
            QuoteStyle::Necessary
        })
        .terminator(Terminator::Any(LINE_TERMINATOR))
        .from_writer(Vec::new());

    match escape {
        Some(escape) if needs_escaping => {
            writer.write_record(fields.iter().map(|field| double_byte(field, escape)))?
        }
        _ => writer.write_record(fields)?,
    }

    writer
        .into_inner()
        .map_err(|error| csv::Error::from(error.into_error()))
}

fn double_byte(field: &[u8], byte: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len() + 2);
    for &b in field {
        out.push(b);
        if b == byte {
            out.push(b);
        }
    }
    out
}
