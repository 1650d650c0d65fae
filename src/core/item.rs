use crate::error::CsvError;

/// Outcome of a single read: an item, `None` at end of data, or an error.
pub type ItemReaderResult<R> = Result<Option<R>, CsvError>;

/// Number of bytes a writer put on its stream for one item.
pub type ItemWriterResult = Result<usize, CsvError>;

/// Pulls items one at a time from an underlying source.
///
/// End of data is reported as `Ok(None)` and is never an error, so callers can
/// loop with `while let Some(item) = reader.read()? { .. }`.
pub trait ItemReader<R> {
    fn read(&mut self) -> ItemReaderResult<R>;
}

/// Pushes items one at a time to an underlying sink.
pub trait ItemWriter<W: ?Sized> {
    fn write(&mut self, item: &W) -> ItemWriterResult;

    fn flush(&mut self) -> Result<(), CsvError> {
        Ok(())
    }
}
