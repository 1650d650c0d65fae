use std::fs::File;

/// Headers describing a CSV download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadHeaders {
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub inline: bool,
    pub content_length: u64,
}

impl DownloadHeaders {
    pub fn new(
        filename: Option<&str>,
        mime_type: Option<String>,
        inline: bool,
        content_length: u64,
    ) -> Self {
        Self {
            filename: filename.map(str::to_owned),
            mime_type,
            inline,
            content_length,
        }
    }

    /// Value of the `Content-Disposition` header.
    ///
    /// ```
    /// use csv_stream_rs::item::csv::response::DownloadHeaders;
    ///
    /// let headers = DownloadHeaders::new(Some("test.csv"), None, false, 93);
    /// assert_eq!(headers.content_disposition(), "attachment; filename=\"test.csv\"");
    /// ```
    pub fn content_disposition(&self) -> String {
        let disposition = if self.inline { "inline" } else { "attachment" };
        match &self.filename {
            Some(filename) => format!(
                "{}; filename=\"{}\"",
                disposition,
                filename.replace('\\', "\\\\").replace('"', "\\\"")
            ),
            None => disposition.to_string(),
        }
    }

    /// Header name/value pairs, `Content-Type` only when a mime type is known.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("Content-Disposition", self.content_disposition())];
        if let Some(mime_type) = &self.mime_type {
            pairs.push(("Content-Type", mime_type.clone()));
        }
        pairs.push(("Content-Length", self.content_length.to_string()));
        pairs
    }
}

/// The web layer receiving a formatted CSV download.
///
/// Headers are always set before the stream, and only once the whole body
/// has been written successfully.
pub trait DownloadResponse {
    fn set_download_headers(&mut self, headers: &DownloadHeaders);

    /// Takes ownership of the body, rewound to its start.
    fn set_stream(&mut self, stream: File);
}
