use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Cursor, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, trace};

use crate::{
    core::{
        charset::{self, Charset},
        item::{ItemReader, ItemReaderResult, ItemWriter, ItemWriterResult},
    },
    error::{CsvError, Result},
};

use super::csv_line::{LINE_TERMINATOR, LineScanner, parse_record, serialize_record};

/// One decoded CSV record, one string per field.
pub type Row = Vec<String>;

/// Default field delimiter.
pub const DELIMITER_DEFAULT: u8 = b',';

/// Field delimiter expected by spreadsheet software.
pub const DELIMITER_EXCEL: u8 = b';';

/// Default quote character.
pub const QUOTE_DEFAULT: u8 = b'"';

/// Default escape character.
pub const ESCAPE_DEFAULT: u8 = b'\\';

const ANONYMOUS: &str = "<anonymous stream>";
const EXPLICIT: &str = "<stream>";

/// Tokenizer and transcoding settings of a [`CsvFile`].
///
/// The settings are fixed once the file is built; [`CsvFileConfig::validate`]
/// runs at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFileConfig {
    /// Field delimiter (default `,`)
    pub delimiter: u8,
    /// Quote enclosing fields that need it (default `"`)
    pub quote: u8,
    /// Escape inside quoted fields (default `\`); equal to `quote` disables it
    pub escape: u8,
    /// Charset label values are transcoded through (default none, UTF-8)
    pub charset: Option<String>,
}

impl Default for CsvFileConfig {
    fn default() -> Self {
        Self {
            delimiter: DELIMITER_DEFAULT,
            quote: QUOTE_DEFAULT,
            escape: ESCAPE_DEFAULT,
            charset: None,
        }
    }
}

impl CsvFileConfig {
    /// Semicolon-delimited, `cp1251` encoded settings for spreadsheet imports.
    pub fn excel() -> Self {
        Self {
            delimiter: DELIMITER_EXCEL,
            charset: Some(charset::CHARSET_EXCEL.to_string()),
            ..Self::default()
        }
    }

    /// Checks the settings and resolves the charset label.
    pub fn validate(&self) -> Result<Option<Charset>> {
        if self.delimiter == self.quote {
            return Err(CsvError::Config(
                "delimiter and quote must differ".to_string(),
            ));
        }

        for (name, byte) in [("delimiter", self.delimiter), ("quote", self.quote)] {
            if byte == b'\n' || byte == b'\r' {
                return Err(CsvError::Config(format!("{} cannot be a line break", name)));
            }
        }

        match self.charset.as_deref() {
            Some(label) => Charset::resolve(label),
            None => Ok(None),
        }
    }

    pub(crate) fn escape_byte(&self) -> Option<u8> {
        (self.escape != self.quote).then_some(self.escape)
    }
}

/// How a [`CsvStream`] is opened from a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, never created. Opened writable too when permitted.
    Read,
    /// Created if missing and truncated.
    Write,
}

/// A seekable byte channel a [`CsvFile`] can sit on.
///
/// The default constructors refuse, so any `Read + Write + Seek` type can be
/// used as an explicit stream with an empty impl.
pub trait CsvStream: Read + Write + Seek + Sized {
    fn open(path: &Path, _mode: OpenMode) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("cannot open {} on this stream type", path.display()),
        ))
    }

    fn anonymous() -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "no anonymous stream for this stream type",
        ))
    }
}

impl CsvStream for File {
    fn open(path: &Path, mode: OpenMode) -> io::Result<Self> {
        match mode {
            OpenMode::Read => match OpenOptions::new().read(true).write(true).open(path) {
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem
                    ) =>
                {
                    OpenOptions::new().read(true).open(path)
                }
                opened => opened,
            },
            OpenMode::Write => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path),
        }
    }

    fn anonymous() -> io::Result<Self> {
        tempfile::tempfile()
    }
}

impl CsvStream for Cursor<Vec<u8>> {
    fn anonymous() -> io::Result<Self> {
        Ok(Cursor::new(Vec::new()))
    }
}

/// A CSV reader and writer over a lazily opened stream.
///
/// The stream is opened on the first [`read_line`](CsvFile::read_line) or
/// [`write_line`](CsvFile::write_line): from the configured path when there is
/// one, otherwise a write opens an anonymous temporary stream and a read fails
/// with `CsvError::Config`.
///
/// Reads follow a pre-fetch cursor: [`rewind`](CsvFile::rewind) and
/// [`advance`](CsvFile::advance) decode the next row into
/// [`current`](CsvFile::current), which is `None` once the data is exhausted.
/// `line_no` is `None` before the first row and counts rows from 0 after.
///
/// Dropping a `CsvFile` closes its stream. To hand a written stream to
/// someone else use [`into_stream`](CsvFile::into_stream).
///
/// # Examples
///
/// ```
/// use csv_stream_rs::item::csv::csv_file::CsvFileBuilder;
///
/// let mut csv = CsvFileBuilder::new().delimiter(b';').in_memory().unwrap();
///
/// csv.write_line(["name", "phone"]).unwrap();
/// csv.write_line(["Ivan; Jr.", "+7(099)332-43-56"]).unwrap();
/// assert_eq!(csv.line_no(), Some(1));
///
/// let rows: Vec<_> = csv.rows().collect::<Result<_, _>>().unwrap();
/// assert_eq!(rows[1], vec!["Ivan; Jr.", "+7(099)332-43-56"]);
/// ```
pub struct CsvFile<S = File> {
    config: CsvFileConfig,
    charset: Option<Charset>,
    path: Option<PathBuf>,
    explicit: bool,
    handle: Option<BufReader<S>>,
    line_no: Option<usize>,
    current: Option<Row>,
}

impl<S: CsvStream> CsvFile<S> {
    fn new(
        config: CsvFileConfig,
        charset: Option<Charset>,
        path: Option<PathBuf>,
        stream: Option<S>,
    ) -> Self {
        Self {
            config,
            charset,
            path,
            explicit: stream.is_some(),
            handle: stream.map(BufReader::new),
            line_no: None,
            current: None,
        }
    }

    pub fn config(&self) -> &CsvFileConfig {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Index of the last row read or written, `None` before the first one.
    pub fn line_no(&self) -> Option<usize> {
        self.line_no
    }

    /// The open stream, if it has been opened yet.
    pub fn handle(&self) -> Option<&S> {
        self.handle.as_ref().map(BufReader::get_ref)
    }

    /// Reads and decodes the next row.
    ///
    /// # Returns
    /// - `Ok(Some(row))` for the next row; an empty physical line is an empty row
    /// - `Ok(None)` at end of data
    /// - `Err(CsvError::Config)` when there is neither a path nor a stream
    /// - `Err(CsvError::Io)` when opening or reading fails
    pub fn read_line(&mut self) -> Result<Option<Row>> {
        self.ensure_open(OpenMode::Read)?;
        let Some(handle) = self.handle.as_mut() else {
            return Err(CsvError::Config("stream is not open".to_string()));
        };

        let mut scanner = LineScanner::new(&self.config);
        let mut line = Vec::new();
        loop {
            let start = line.len();
            let read = handle
                .read_until(LINE_TERMINATOR, &mut line)
                .map_err(|error| CsvError::io("reading", describe(&self.path, self.explicit), error))?;

            if read == 0 || scanner.feed(&line[start..]) {
                break;
            }
        }

        if line.is_empty() {
            trace!("end of data after line {:?}", self.line_no);
            self.current = None;
            return Ok(None);
        }

        let fields = parse_record(&self.config, &line).map_err(|error| {
            CsvError::io("reading", describe(&self.path, self.explicit), error.into())
        })?;

        let row: Row = fields
            .iter()
            .map(|field| charset::decode_with(self.charset.as_ref(), field))
            .collect();

        self.line_no = Some(self.line_no.map_or(0, |line_no| line_no + 1));
        trace!("read line {:?}: {} field(s)", self.line_no, row.len());
        self.current = Some(row.clone());

        Ok(Some(row))
    }

    /// Encodes and appends one row, returning the number of bytes written.
    ///
    /// Without a path or stream the first write opens an anonymous temporary
    /// stream.
    pub fn write_line<I, T>(&mut self, row: I) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let row: Row = row.into_iter().map(|value| value.as_ref().to_owned()).collect();

        self.ensure_open(OpenMode::Write)?;
        let Some(handle) = self.handle.as_mut() else {
            return Err(CsvError::Config("stream is not open".to_string()));
        };

        let fields: Vec<Vec<u8>> = row
            .iter()
            .map(|value| charset::encode_with(self.charset.as_ref(), value).into_owned())
            .collect();

        let bytes = serialize_record(&self.config, &fields).map_err(|error| {
            CsvError::io("writing", describe(&self.path, self.explicit), error.into())
        })?;

        // Bytes still buffered for reading sit before the logical position.
        if !handle.buffer().is_empty() {
            handle
                .seek(SeekFrom::Current(0))
                .map_err(|error| CsvError::io("seeking", describe(&self.path, self.explicit), error))?;
        }

        handle
            .get_mut()
            .write_all(&bytes)
            .map_err(|error| CsvError::io("writing", describe(&self.path, self.explicit), error))?;

        self.line_no = Some(self.line_no.map_or(0, |line_no| line_no + 1));
        trace!("wrote line {:?}: {} byte(s)", self.line_no, bytes.len());
        self.current = Some(row);

        Ok(bytes.len())
    }

    /// Rewinds the stream and forgets the current row and line number.
    ///
    /// Does not touch anything when the stream was never opened.
    pub fn reset(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.as_mut() {
            handle
                .rewind()
                .map_err(|error| CsvError::io("rewinding", describe(&self.path, self.explicit), error))?;
            debug!("rewound {}", describe(&self.path, self.explicit));
        }

        self.line_no = None;
        self.current = None;

        Ok(())
    }

    /// Resets, then pre-fetches the first row.
    pub fn rewind(&mut self) -> Result<()> {
        self.reset()?;
        self.read_line()?;
        Ok(())
    }

    /// Pre-fetches the next row. Safe to call past the end.
    pub fn advance(&mut self) -> Result<()> {
        self.read_line()?;
        Ok(())
    }

    /// The last row read or written, `None` at end of data or after a reset.
    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    /// Same as [`line_no`](CsvFile::line_no).
    pub fn key(&self) -> Option<usize> {
        self.line_no
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Iterates over all rows from the start of the stream.
    pub fn rows(&mut self) -> Rows<'_, S> {
        Rows {
            file: self,
            started: false,
            failed: false,
        }
    }

    /// Hands over the stream, opening an anonymous one if nothing was written.
    ///
    /// The stream is positioned right after the data read or written so far;
    /// rewinding it before reading is up to the caller.
    pub fn into_stream(mut self) -> Result<S> {
        let mode = if self.path.is_some() {
            OpenMode::Read
        } else {
            OpenMode::Write
        };
        self.ensure_open(mode)?;

        let Some(mut handle) = self.handle.take() else {
            return Err(CsvError::Config("stream is not open".to_string()));
        };

        if handle.buffer().is_empty() {
            return Ok(handle.into_inner());
        }

        let position = handle
            .stream_position()
            .map_err(|error| CsvError::io("seeking", describe(&self.path, self.explicit), error))?;
        let mut stream = handle.into_inner();
        stream
            .seek(SeekFrom::Start(position))
            .map_err(|error| CsvError::io("seeking", describe(&self.path, self.explicit), error))?;

        Ok(stream)
    }

    fn ensure_open(&mut self, mode: OpenMode) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let stream = match &self.path {
            Some(path) => S::open(path, mode)
                .map_err(|error| CsvError::io("opening", path.display().to_string(), error))?,
            None if mode == OpenMode::Write => {
                S::anonymous().map_err(|error| CsvError::io("opening", ANONYMOUS, error))?
            }
            None => {
                return Err(CsvError::Config(
                    "a path or an open stream is required to read".to_string(),
                ));
            }
        };

        debug!(
            "opened {} for {:?}",
            describe(&self.path, self.explicit),
            mode
        );
        self.handle = Some(BufReader::new(stream));
        if mode == OpenMode::Read {
            self.line_no = None;
        }

        Ok(())
    }
}

fn describe(path: &Option<PathBuf>, explicit: bool) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None if explicit => EXPLICIT.to_string(),
        None => ANONYMOUS.to_string(),
    }
}

impl<S: CsvStream> ItemReader<Row> for CsvFile<S> {
    fn read(&mut self) -> ItemReaderResult<Row> {
        self.read_line()
    }
}

impl<S: CsvStream> ItemWriter<Row> for CsvFile<S> {
    fn write(&mut self, item: &Row) -> ItemWriterResult {
        self.write_line(item)
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.as_mut() {
            handle
                .get_mut()
                .flush()
                .map_err(|error| CsvError::io("flushing", describe(&self.path, self.explicit), error))?;
        }
        Ok(())
    }
}

/// Iterator returned by [`CsvFile::rows`].
///
/// Rewinds on its first step and stops after yielding an error.
pub struct Rows<'a, S> {
    file: &'a mut CsvFile<S>,
    started: bool,
    failed: bool,
}

impl<S: CsvStream> Iterator for Rows<'_, S> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = if self.started {
            self.file.read_line()
        } else {
            self.started = true;
            self.file.reset().and_then(|()| self.file.read_line())
        };

        match result {
            Ok(row) => row.map(Ok),
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}

/// A builder for configuring a [`CsvFile`].
///
/// # Default Configuration
///
/// - Delimiter: comma (,)
/// - Quote: double quote (")
/// - Escape: backslash (\\)
/// - Charset: none, values are UTF-8
///
/// Nothing is opened by the terminal methods; the stream opens on first use.
#[derive(Default)]
pub struct CsvFileBuilder {
    config: CsvFileConfig,
}

impl CsvFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: CsvFileConfig) -> Self {
        Self { config }
    }

    /// Switches to the spreadsheet preset (`;`, `cp1251`).
    pub fn excel(mut self) -> Self {
        self.config = CsvFileConfig {
            quote: self.config.quote,
            escape: self.config.escape,
            ..CsvFileConfig::excel()
        };
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    pub fn quote(mut self, quote: u8) -> Self {
        self.config.quote = quote;
        self
    }

    pub fn escape(mut self, escape: u8) -> Self {
        self.config.escape = escape;
        self
    }

    /// Sets the charset label values are transcoded through.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.config.charset = Some(charset.into());
        self
    }

    /// A file at `path`, opened for reading or writing on first use.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvFile<File>> {
        let charset = self.config.validate()?;
        Ok(CsvFile::new(
            self.config,
            charset,
            Some(path.as_ref().to_path_buf()),
            None,
        ))
    }

    /// A file over an already open stream.
    pub fn from_stream<S: CsvStream>(self, stream: S) -> Result<CsvFile<S>> {
        let charset = self.config.validate()?;
        Ok(CsvFile::new(self.config, charset, None, Some(stream)))
    }

    /// A file whose first write opens an anonymous temporary file.
    pub fn temporary(self) -> Result<CsvFile<File>> {
        let charset = self.config.validate()?;
        Ok(CsvFile::new(self.config, charset, None, None))
    }

    /// A file whose first write opens an in-memory buffer.
    pub fn in_memory(self) -> Result<CsvFile<Cursor<Vec<u8>>>> {
        let charset = self.config.validate()?;
        Ok(CsvFile::new(self.config, charset, None, None))
    }
}
