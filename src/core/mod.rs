/// Reader and writer seams shared by the CSV stream and the text iterator.
pub mod item;

/// Charset resolution and best-effort transcoding.
pub mod charset;
