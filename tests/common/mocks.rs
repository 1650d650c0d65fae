//! Mock versions of a CSV stream and of the web response.
use mockall::mock;

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom, Write},
};

use csv_stream_rs::item::csv::{
    csv_file::CsvStream,
    response::{DownloadHeaders, DownloadResponse},
};

mock! {
    pub Stream {}
    impl Read for Stream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    }
    impl Write for Stream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
        fn flush(&mut self) -> io::Result<()>;
    }
    impl Seek for Stream {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;
    }
}

impl CsvStream for MockStream {}

mock! {
    pub Response {}
    impl DownloadResponse for Response {
        fn set_download_headers(&mut self, headers: &DownloadHeaders);
        fn set_stream(&mut self, stream: File);
    }
}
