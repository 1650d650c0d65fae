//! CSV support for streaming rows to and from files and for CSV downloads.
//!
//! # Module Architecture
//!
//! 1. **CsvFile**: a reader and writer over a lazily opened stream with
//!    configurable delimiter, quote and escape characters and optional
//!    charset transcoding. Reading follows a pre-fetch cursor that can be
//!    restarted with `reset`/`rewind`.
//!
//! 2. **CsvFormatter**: turns a [`Dataset`](dataset::Dataset) (plain values,
//!    serializable structs, queries, paginated providers, models) into CSV
//!    rows written through a `CsvFile` into a temporary file, and hands that
//!    file over together with its length, mime type and download headers.
//!
//! Both components are configured through builders.
//!
//! # Ownership
//!
//! A `CsvFile` owns its stream and closes it when dropped. The formatter
//! never keeps its output: `format_data` returns the open temporary file and
//! the caller decides when to rewind, read and drop it.
//!
//! # Examples
//!
//! ## Writing and reading back
//!
//! ```
//! use csv_stream_rs::item::csv::csv_file::CsvFileBuilder;
//!
//! let mut csv = CsvFileBuilder::new().charset("cp1251").in_memory().unwrap();
//!
//! csv.write_line(["Иван\r\nИванович", "+7(099)332-43-56", "-1.1"]).unwrap();
//! csv.write_line(["Александр Васильевич", "0", "\";,"]).unwrap();
//!
//! csv.rewind().unwrap();
//! let mut rows = Vec::new();
//! while csv.valid() {
//!     rows.push(csv.current().unwrap().clone());
//!     csv.advance().unwrap();
//! }
//!
//! assert_eq!(rows.len(), 2);
//! assert_eq!(rows[0][0], "Иван\r\nИванович");
//! assert_eq!(rows[1][2], "\";,");
//! assert_eq!(csv.line_no(), Some(1));
//! ```
//!
//! ## Formatting a download
//!
//! ```
//! use std::fs::File;
//!
//! use csv_stream_rs::item::csv::{
//!     csv_formatter::CsvFormatterBuilder,
//!     dataset::Dataset,
//!     response::{DownloadHeaders, DownloadResponse},
//! };
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Contact {
//!     name: &'static str,
//!     phone: &'static str,
//! }
//!
//! #[derive(Default)]
//! struct Response {
//!     headers: Option<DownloadHeaders>,
//!     body: Option<File>,
//! }
//!
//! impl DownloadResponse for Response {
//!     fn set_download_headers(&mut self, headers: &DownloadHeaders) {
//!         self.headers = Some(headers.clone());
//!     }
//!
//!     fn set_stream(&mut self, stream: File) {
//!         self.body = Some(stream);
//!     }
//! }
//!
//! let formatter = CsvFormatterBuilder::excel().filename("contacts.csv").build().unwrap();
//! let contacts = [Contact { name: "Ivan", phone: "+79996341261" }];
//!
//! let mut response = Response::default();
//! formatter
//!     .format(Dataset::from_serialize(&contacts).unwrap(), &mut response)
//!     .unwrap();
//!
//! let headers = response.headers.unwrap();
//! assert_eq!(headers.content_disposition(), "attachment; filename=\"contacts.csv\"");
//! assert_eq!(
//!     headers.mime_type.as_deref(),
//!     Some("application/vnd.ms-excel; charset=windows-1251")
//! );
//! assert_eq!(headers.content_length, "name;phone\nIvan;+79996341261\n".len() as u64);
//! ```

/// A module providing the lazily opened CSV stream reader/writer.
pub mod csv_file;

/// A module providing logical line scanning and single row serialization.
mod csv_line;

/// A module providing the normalization of formatter input.
pub mod dataset;

/// A module providing the dataset to CSV download formatter.
pub mod csv_formatter;

/// A module providing the download headers handed to the web layer.
pub mod response;
