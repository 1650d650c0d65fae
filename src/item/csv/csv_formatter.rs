use std::{
    fs::File,
    io::Seek,
};

use log::{debug, info};

use crate::error::{CsvError, Result};

use super::{
    csv_file::{CsvFileBuilder, CsvFileConfig},
    dataset::{Dataset, Fields, Record, field_to_string},
    response::{DownloadHeaders, DownloadResponse},
};

/// Plain CSV content type.
pub const CONTENT_TYPE_TEXT: &str = "text/csv";

/// Content type spreadsheet software opens directly.
pub const CONTENT_TYPE_EXCEL: &str = "application/vnd.ms-excel";

const FORMATTED: &str = "<formatted csv>";

/// Ordered `field => title` pairs selecting the output columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    fields: Vec<(String, String)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column.
    pub fn field(mut self, key: impl Into<String>, title: impl Into<String>) -> Self {
        self.fields.push((key.into(), title.into()));
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, title)| title.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, T: Into<String>> FromIterator<(K, T)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, title)| (key.into(), title.into()))
                .collect(),
        }
    }
}

/// Header row policy of a [`CsvFormatter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Header {
    /// No header row, every field of every record.
    Disabled,
    /// Header from the keys of the first record, if it is keyed.
    #[default]
    Auto,
    /// Header from the titles, rows from the mapped fields only.
    Mapping(FieldMapping),
}

/// Callback replacing each record before it is written.
pub type RowFormat = dyn Fn(Record, &CsvFormatter) -> Record;

/// A finished CSV body.
///
/// `stream` is left at its end; `length` is its size in bytes.
#[derive(Debug)]
pub struct FormattedCsv {
    pub stream: File,
    pub length: u64,
}

/// Formats arbitrary data as a CSV download.
///
/// Records go through the optional [`RowFormat`] callback, are normalized to
/// fields and written through a [`CsvFile`](super::csv_file::CsvFile) into an
/// anonymous temporary file, which is handed to the caller.
///
/// # Examples
///
/// ```
/// use std::io::{Read, Seek};
///
/// use csv_stream_rs::item::csv::{
///     csv_formatter::{CsvFormatterBuilder, FieldMapping},
///     dataset::Dataset,
/// };
/// use serde_json::json;
///
/// let formatter = CsvFormatterBuilder::new()
///     .fields(FieldMapping::new().field("name", "Name").field("phone", "Phone"))
///     .build()
///     .unwrap();
///
/// let data = json!([{ "name": "Ivan", "phone": "+79996341261", "age": 30 }]);
/// let mut csv = formatter.format_data(Dataset::from(data)).unwrap();
///
/// let mut body = String::new();
/// csv.stream.rewind().unwrap();
/// csv.stream.read_to_string(&mut body).unwrap();
///
/// assert_eq!(body, "Name,Phone\nIvan,+79996341261\n");
/// assert_eq!(csv.length, body.len() as u64);
/// assert_eq!(formatter.mime_type().as_deref(), Some("text/csv"));
/// ```
pub struct CsvFormatter {
    filename: Option<String>,
    content_type: Option<String>,
    csv: CsvFileConfig,
    header: Header,
    format: Option<Box<RowFormat>>,
}

impl CsvFormatter {
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn csv_config(&self) -> &CsvFileConfig {
        &self.csv
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Content type with the charset appended, see [`mime_type`].
    pub fn mime_type(&self) -> Option<String> {
        mime_type(self.content_type.as_deref(), self.csv.charset.as_deref())
    }

    /// Writes the header and every record into a temporary file.
    ///
    /// # Errors
    ///
    /// - `CsvError::UnsupportedDataShape` when the data yields no records
    /// - `CsvError::IncompatibleRowShape` when a record has no fields
    /// - `CsvError::Io` when the temporary file cannot be written
    pub fn format_data(&self, data: Dataset<'_>) -> Result<FormattedCsv> {
        let mut csv = CsvFileBuilder::from_config(self.csv.clone()).temporary()?;

        let mapping = match &self.header {
            Header::Mapping(mapping) if !mapping.is_empty() => Some(mapping),
            _ => None,
        };
        let mut auto_header = self.header == Header::Auto;

        if let Some(mapping) = mapping {
            csv.write_line(mapping.titles())?;
        }

        let mut rows = 0usize;
        for record in data.records()? {
            let record = match &self.format {
                Some(format) => format(record, self),
                None => record,
            };
            let fields = record.into_fields()?;

            if auto_header {
                auto_header = false;
                if let Some(keys) = fields.keys() {
                    csv.write_line(keys)?;
                }
            }

            csv.write_line(build_line(fields, mapping))?;
            rows += 1;
        }

        let mut stream = csv.into_stream()?;
        let length = stream
            .stream_position()
            .map_err(|error| CsvError::io("measuring", FORMATTED, error))?;

        info!("formatted {} record(s) into {} byte(s)", rows, length);

        Ok(FormattedCsv { stream, length })
    }

    /// Formats the data and hands it to `response` as a download.
    ///
    /// Nothing reaches the response when formatting fails.
    pub fn format<R>(&self, data: Dataset<'_>, response: &mut R) -> Result<()>
    where
        R: DownloadResponse + ?Sized,
    {
        let FormattedCsv { mut stream, length } = self.format_data(data)?;
        stream
            .rewind()
            .map_err(|error| CsvError::io("rewinding", FORMATTED, error))?;

        let headers = DownloadHeaders::new(self.filename(), self.mime_type(), false, length);
        debug!("sending download headers {:?}", headers);

        response.set_download_headers(&headers);
        response.set_stream(stream);

        Ok(())
    }
}

fn build_line(fields: Fields, mapping: Option<&FieldMapping>) -> Vec<String> {
    match mapping {
        Some(mapping) => mapping
            .keys()
            .map(|key| fields.get(key).map(field_to_string).unwrap_or_default())
            .collect(),
        None => fields.into_values().iter().map(field_to_string).collect(),
    }
}

/// Appends `; charset=<name>` to the content type.
///
/// Nothing is appended without a charset or when the content type already
/// names one. `cp1251` is announced as `windows-1251`.
///
/// ```
/// use csv_stream_rs::item::csv::csv_formatter::mime_type;
///
/// assert_eq!(
///     mime_type(Some("text/csv"), Some("cp1251")).as_deref(),
///     Some("text/csv; charset=windows-1251")
/// );
/// assert_eq!(
///     mime_type(Some("text/csv; charset=koi8-r"), Some("cp1251")).as_deref(),
///     Some("text/csv; charset=koi8-r")
/// );
/// assert_eq!(mime_type(None, Some("cp1251")), None);
/// ```
pub fn mime_type(content_type: Option<&str>, charset: Option<&str>) -> Option<String> {
    let content_type = content_type.filter(|content_type| !content_type.is_empty())?;

    let charset = match charset.map(str::trim) {
        Some(charset) if !charset.is_empty() => charset,
        _ => return Some(content_type.to_string()),
    };

    if content_type.to_ascii_lowercase().contains("charset") {
        return Some(content_type.to_string());
    }

    let charset = if charset.to_ascii_lowercase().contains("cp1251") {
        "windows-1251"
    } else {
        charset
    };

    Some(format!("{}; charset={}", content_type, charset))
}

/// A builder for configuring a [`CsvFormatter`].
///
/// # Default Configuration
///
/// - Content type: `text/csv`
/// - CSV settings: [`CsvFileConfig::default`] (`,`, UTF-8)
/// - Header: [`Header::Auto`]
/// - No filename, no row callback
pub struct CsvFormatterBuilder {
    filename: Option<String>,
    content_type: Option<String>,
    csv: CsvFileConfig,
    header: Header,
    format: Option<Box<RowFormat>>,
}

impl Default for CsvFormatterBuilder {
    fn default() -> Self {
        Self {
            filename: None,
            content_type: Some(CONTENT_TYPE_TEXT.to_string()),
            csv: CsvFileConfig::default(),
            header: Header::Auto,
            format: None,
        }
    }
}

impl CsvFormatterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spreadsheet preset: `;`, `cp1251` and the Excel content type.
    pub fn excel() -> Self {
        Self {
            content_type: Some(CONTENT_TYPE_EXCEL.to_string()),
            csv: CsvFileConfig::excel(),
            ..Self::default()
        }
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn csv_config(mut self, csv: CsvFileConfig) -> Self {
        self.csv = csv;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.csv.delimiter = delimiter;
        self
    }

    pub fn quote(mut self, quote: u8) -> Self {
        self.csv.quote = quote;
        self
    }

    pub fn escape(mut self, escape: u8) -> Self {
        self.csv.escape = escape;
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.csv.charset = Some(charset.into());
        self
    }

    pub fn header(mut self, header: Header) -> Self {
        self.header = header;
        self
    }

    /// Shortcut for `header(Header::Mapping(fields))`.
    pub fn fields(self, fields: FieldMapping) -> Self {
        self.header(Header::Mapping(fields))
    }

    pub fn format<F>(mut self, format: F) -> Self
    where
        F: Fn(Record, &CsvFormatter) -> Record + 'static,
    {
        self.format = Some(Box::new(format));
        self
    }

    /// Validates the CSV settings and builds the formatter.
    pub fn build(self) -> Result<CsvFormatter> {
        self.csv.validate()?;

        Ok(CsvFormatter {
            filename: self.filename,
            content_type: self.content_type,
            csv: self.csv,
            header: self.header,
            format: self.format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        error::Error,
        io::{Read, Seek},
    };

    use serde::Serialize;
    use serde_json::json;

    use super::*;
    use crate::item::csv::csv_file::{CsvFileBuilder, Row};

    type TestResult = std::result::Result<(), Box<dyn Error>>;

    #[derive(Serialize)]
    struct Contact {
        name: String,
        phone: String,
        comment: String,
    }

    fn contacts() -> Vec<Contact> {
        vec![
            Contact {
                name: "Иванов Иван Иванович".to_string(),
                phone: "+79996341261".to_string(),
                comment: "Проверка".to_string(),
            },
            Contact {
                name: "Имя\n".to_string(),
                phone: "\\;,-<>'".to_string(),
                comment: "\r\n\n ".to_string(),
            },
        ]
    }

    fn read_back(formatter: &CsvFormatter, formatted: FormattedCsv) -> Result<Vec<Row>> {
        let mut stream = formatted.stream;
        stream
            .rewind()
            .map_err(|error| CsvError::io("rewinding", "test", error))?;
        let mut csv = CsvFileBuilder::from_config(formatter.csv_config().clone()).from_stream(stream)?;
        csv.rows().collect()
    }

    #[test]
    fn mapping_selects_and_orders_fields() -> TestResult {
        let formatter = CsvFormatterBuilder::excel()
            .fields(
                FieldMapping::new()
                    .field("phone", "Телефон")
                    .field("name", "Имя")
                    .field("email", "Почта"),
            )
            .build()?;

        let formatted = formatter.format_data(Dataset::from_serialize(&contacts())?)?;
        let rows = read_back(&formatter, formatted)?;

        assert_eq!(
            rows,
            vec![
                vec!["Телефон", "Имя", "Почта"],
                vec!["+79996341261", "Иванов Иван Иванович", ""],
                vec!["\\;,-<>'", "Имя\n", ""],
            ]
        );

        Ok(())
    }

    #[test]
    fn auto_header_uses_first_record_keys() -> TestResult {
        let formatter = CsvFormatterBuilder::new().build()?;

        let formatted = formatter.format_data(Dataset::from_serialize(&contacts())?)?;
        let rows = read_back(&formatter, formatted)?;

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["name", "phone", "comment"]);
        assert_eq!(rows[2], vec!["Имя\n", "\\;,-<>'", "\r\n\n "]);

        Ok(())
    }

    #[test]
    fn empty_dataset_yields_header_only_or_nothing() -> TestResult {
        let mapped = CsvFormatterBuilder::new()
            .fields(FieldMapping::from_iter([("a", "A"), ("b", "B")]))
            .build()?;
        let formatted = mapped.format_data(Dataset::Empty)?;
        assert_eq!(formatted.length, 4);
        assert_eq!(read_back(&mapped, formatted)?, vec![vec!["A", "B"]]);

        for header in [Header::Disabled, Header::Auto] {
            let formatter = CsvFormatterBuilder::new().header(header).build()?;
            let formatted = formatter.format_data(Dataset::from(json!([])))?;
            assert_eq!(formatted.length, 0);
        }

        Ok(())
    }

    #[test]
    fn callback_replaces_records() -> TestResult {
        let formatter = CsvFormatterBuilder::new()
            .header(Header::Disabled)
            .delimiter(b';')
            .format(|record, formatter| match record {
                Record::Value(value) => {
                    let name = value["name"].clone();
                    let delimiter = char::from(formatter.csv_config().delimiter).to_string();
                    Record::Value(json!([name, delimiter]))
                }
                other => other,
            })
            .build()?;

        let formatted = formatter.format_data(Dataset::from_serialize(&contacts())?)?;
        let mut body = String::new();
        let mut stream = formatted.stream;
        stream.rewind()?;
        stream.read_to_string(&mut body)?;

        assert_eq!(body, "Иванов Иван Иванович;\";\"\n\"Имя\n\";\";\"\n");

        Ok(())
    }

    #[test]
    fn scalar_records_are_rejected() -> TestResult {
        let formatter = CsvFormatterBuilder::new().build()?;

        assert!(matches!(
            formatter.format_data(Dataset::from(json!([1, 2]))),
            Err(CsvError::IncompatibleRowShape(_))
        ));
        assert!(matches!(
            formatter.format_data(Dataset::from(json!("text"))),
            Err(CsvError::UnsupportedDataShape(_))
        ));

        Ok(())
    }

    #[test]
    fn cyrillic_record_round_trips_through_cp1251() -> TestResult {
        let formatter = CsvFormatterBuilder::new()
            .header(Header::Disabled)
            .delimiter(b';')
            .charset("cp1251")
            .build()?;

        let data = json!([{ "name": "Иван\r\nИванович", "phone": "+7(099)332-43-56" }]);
        let formatted = formatter.format_data(Dataset::from(data))?;
        let rows = read_back(&formatter, formatted)?;

        assert_eq!(rows, vec![vec!["Иван\r\nИванович", "+7(099)332-43-56"]]);

        Ok(())
    }

    #[test]
    fn mime_type_follows_content_type_and_charset() -> TestResult {
        assert_eq!(
            CsvFormatterBuilder::excel().build()?.mime_type().as_deref(),
            Some("application/vnd.ms-excel; charset=windows-1251")
        );
        assert_eq!(
            mime_type(Some("text/csv"), Some("koi8-r")).as_deref(),
            Some("text/csv; charset=koi8-r")
        );
        assert_eq!(
            mime_type(Some("text/csv; Charset=utf-8"), Some("cp1251")).as_deref(),
            Some("text/csv; Charset=utf-8")
        );
        assert_eq!(mime_type(Some("text/csv"), None).as_deref(), Some("text/csv"));
        assert_eq!(mime_type(Some(""), Some("cp1251")), None);

        Ok(())
    }
}
