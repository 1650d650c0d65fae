#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # CSV stream for Rust

 A small CSV file layer: it streams rows to and from a file-like resource with
 configurable delimiter, quote and escape characters and optional charset
 transcoding, and formats arbitrary application data into a CSV body ready to be
 sent as an HTTP download.

 ## Core Concepts

- **CsvFile:** a lazily opened CSV stream. Reading walks the rows with a
  restartable pre-fetch cursor; writing to a file without a path opens an
  anonymous temporary file.
- **CsvFormatter:** normalizes a `Dataset` (plain values, serializable structs,
  queries, paginated providers, models) into rows, optionally re-keyed through a
  `FieldMapping`, and hands the finished temporary file to the caller.
- **FileIterator:** the same cursor over the raw lines of a text file.
- **ItemReader / ItemWriter:** the seams every reader and writer implements.

 ## Features

| **Feature** | **Description**                                       |
|-------------|-------------------------------------------------------|
| csv         | Enables `CsvFile` and `CsvFormatter`                  |
| text        | Enables the plain text `FileIterator`                 |
| full        | Enables all available features (default)              |

 ## Getting Started

```rust
# use csv_stream_rs::{
#     item::csv::{
#         csv_file::CsvFileBuilder,
#         csv_formatter::{CsvFormatterBuilder, FieldMapping},
#         dataset::Dataset,
#     },
# };
# use serde_json::json;
# use std::{error::Error, io::Seek};
fn main() -> Result<(), Box<dyn Error>> {
    let formatter = CsvFormatterBuilder::excel()
        .fields(FieldMapping::new().field("name", "Имя").field("phone", "Телефон"))
        .build()?;

    let data = json!([
        { "name": "Иванов Иван Иванович", "phone": "+79996341261" },
        { "name": "Имя\n", "comment": "no phone" },
    ]);

    let mut csv = formatter.format_data(Dataset::from(data))?;
    assert!(csv.length > 0);

    // read the body back with the same settings
    csv.stream.rewind()?;
    let mut reader = CsvFileBuilder::from_config(formatter.csv_config().clone())
        .from_stream(csv.stream)?;
    let rows = reader.rows().collect::<Result<Vec<_>, _>>()?;

    assert_eq!(rows[0], vec!["Имя", "Телефон"]);
    assert_eq!(rows[2], vec!["Имя\n", ""]);

    Ok(())
}
```

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
 */

/// Core module for readers, writers and charsets
pub mod core;

/// Error types for CSV operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Set of readers / writers (csv file, csv formatter, text iterator)
pub mod item;
