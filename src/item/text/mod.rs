/// Line-by-line reading of plain text files with optional charset decoding.
pub mod file_iterator;
