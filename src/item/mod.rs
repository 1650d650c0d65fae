#[cfg(feature = "csv")]
/// This module provides the CSV stream reader/writer and the CSV download formatter.
pub mod csv;

#[cfg(feature = "text")]
/// This module provides a line iterator over plain text files.
pub mod text;
