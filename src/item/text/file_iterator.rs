use std::{
    fs::File,
    io::{BufRead, BufReader, Seek},
    path::{Path, PathBuf},
};

use log::{debug, trace};

use crate::{
    core::{
        charset::{self, Charset},
        item::{ItemReader, ItemReaderResult},
    },
    error::{CsvError, Result},
};

/// Forward iterator over the raw lines of a text file.
///
/// Unlike [`CsvFile`](crate::item::csv::csv_file::CsvFile) the file is opened
/// for reading as soon as the iterator is built, and closed when it is
/// dropped. Lines keep their terminator and are decoded through the optional
/// charset.
///
/// # Examples
///
/// ```no_run
/// use csv_stream_rs::item::text::file_iterator::FileIterator;
///
/// let mut lines = FileIterator::with_charset("import.txt", "cp1251").unwrap();
/// for line in lines.lines() {
///     print!("{}", line.unwrap());
/// }
/// ```
#[derive(Debug)]
pub struct FileIterator {
    path: PathBuf,
    charset: Option<Charset>,
    reader: BufReader<File>,
    line_no: Option<usize>,
    line: Option<String>,
}

impl FileIterator {
    /// Opens a UTF-8 text file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), None)
    }

    /// Opens a text file whose lines are decoded from `charset`.
    pub fn with_charset<P: AsRef<Path>>(path: P, charset: &str) -> Result<Self> {
        let charset = Charset::resolve(charset)?;
        Self::build(path.as_ref(), charset)
    }

    fn build(path: &Path, charset: Option<Charset>) -> Result<Self> {
        if path.as_os_str().is_empty() {
            return Err(CsvError::Config("a file path is required".to_string()));
        }

        let file = File::open(path)
            .map_err(|error| CsvError::io("opening", path.display().to_string(), error))?;
        debug!("opened {} for line iteration", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            charset,
            reader: BufReader::new(file),
            line_no: None,
            line: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes the next line, `None` at end of file.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut bytes = Vec::new();
        let read = self
            .reader
            .read_until(b'\n', &mut bytes)
            .map_err(|error| CsvError::io("reading", self.path.display().to_string(), error))?;

        if read == 0 {
            self.line = None;
            return Ok(None);
        }

        let line = charset::decode_with(self.charset.as_ref(), &bytes);
        self.line_no = Some(self.line_no.map_or(0, |line_no| line_no + 1));
        trace!("read line {:?} of {}", self.line_no, self.path.display());
        self.line = Some(line.clone());

        Ok(Some(line))
    }

    /// Seeks back to the start and pre-fetches the first line.
    pub fn rewind(&mut self) -> Result<()> {
        self.reader
            .rewind()
            .map_err(|error| CsvError::io("rewinding", self.path.display().to_string(), error))?;

        self.line_no = None;
        self.line = None;
        self.read_line()?;

        Ok(())
    }

    /// Pre-fetches the next line. Safe to call past the end.
    pub fn advance(&mut self) -> Result<()> {
        self.read_line()?;
        Ok(())
    }

    /// The current line with its terminator, `None` before start or at the end.
    pub fn current(&self) -> Option<&str> {
        self.line.as_deref()
    }

    /// Zero-based index of the current line.
    pub fn key(&self) -> Option<usize> {
        self.line_no
    }

    pub fn valid(&self) -> bool {
        self.line.is_some()
    }

    /// Iterates over all lines from the start of the file.
    pub fn lines(&mut self) -> Lines<'_> {
        Lines {
            iterator: self,
            started: false,
            failed: false,
        }
    }
}

impl ItemReader<String> for FileIterator {
    fn read(&mut self) -> ItemReaderResult<String> {
        self.read_line()
    }
}

/// Iterator returned by [`FileIterator::lines`].
pub struct Lines<'a> {
    iterator: &'a mut FileIterator,
    started: bool,
    failed: bool,
}

impl Iterator for Lines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = if self.started {
            self.iterator.advance()
        } else {
            self.started = true;
            self.iterator.rewind()
        };

        match result {
            Ok(()) => self.iterator.current().map(|line| Ok(line.to_owned())),
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, fs};

    use super::*;

    type TestResult = std::result::Result<(), Box<dyn Error>>;

    #[test]
    fn walks_lines_with_terminators() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("lines.txt");
        fs::write(&path, "first\r\nsecond\n\nlast")?;

        let mut lines = FileIterator::open(&path)?;
        assert_eq!(lines.key(), None);
        assert!(!lines.valid());

        lines.rewind()?;
        assert_eq!(lines.current(), Some("first\r\n"));
        assert_eq!(lines.key(), Some(0));

        lines.advance()?;
        lines.advance()?;
        assert_eq!(lines.current(), Some("\n"));

        lines.advance()?;
        assert_eq!(lines.current(), Some("last"));
        assert_eq!(lines.key(), Some(3));

        lines.advance()?;
        lines.advance()?;
        assert_eq!(lines.current(), None);
        assert_eq!(lines.key(), Some(3));

        let all = lines.lines().collect::<Result<Vec<_>>>()?;
        assert_eq!(all, vec!["first\r\n", "second\n", "\n", "last"]);

        Ok(())
    }

    #[test]
    fn decodes_through_charset() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cp1251.txt");
        fs::write(&path, [0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2, b'\n'])?;

        let mut lines = FileIterator::with_charset(&path, "cp1251")?;
        assert_eq!(ItemReader::read(&mut lines)?, Some("Привет\n".to_string()));
        assert_eq!(ItemReader::read(&mut lines)?, None);

        Ok(())
    }

    #[test]
    fn opening_fails_immediately() -> TestResult {
        let dir = tempfile::tempdir()?;

        assert!(matches!(
            FileIterator::open(dir.path().join("missing.txt")),
            Err(CsvError::Io { action: "opening", .. })
        ));
        assert!(matches!(FileIterator::open(""), Err(CsvError::Config(_))));

        Ok(())
    }
}
