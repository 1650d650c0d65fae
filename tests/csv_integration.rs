pub mod common;

use std::{
    fs,
    io::{self, SeekFrom},
};

use common::{init_logger, mocks::MockStream};
use csv_stream_rs::{
    CsvError,
    core::item::{ItemReader, ItemWriter},
    item::{
        csv::csv_file::{CsvFileBuilder, CsvFileConfig, Row},
        text::file_iterator::FileIterator,
    },
};

fn contacts() -> Vec<Row> {
    vec![
        vec!["Имя".to_string(), "Телефон".to_string(), "Комментарий".to_string()],
        vec![
            "Иванов Иван Иванович".to_string(),
            "+79996341261".to_string(),
            "Проверка".to_string(),
        ],
        vec!["Имя\n".to_string(), "\\;,-<>'".to_string(), "\r\n\n ".to_string()],
    ]
}

#[test]
fn excel_file_round_trips_through_a_path() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contacts.csv");

    let mut writer = CsvFileBuilder::new().excel().from_path(&path).unwrap();
    for row in contacts() {
        writer.write(&row).unwrap();
    }
    writer.flush().unwrap();
    assert_eq!(writer.line_no(), Some(2));
    drop(writer);

    let bytes = fs::read(&path).unwrap();
    assert!(std::str::from_utf8(&bytes).is_err(), "body must be cp1251, not UTF-8");

    let mut reader = CsvFileBuilder::from_config(CsvFileConfig::excel())
        .from_path(&path)
        .unwrap();

    let mut rows = Vec::new();
    while let Some(row) = reader.read().unwrap() {
        rows.push(row);
    }

    assert_eq!(rows, contacts());
    assert_eq!(reader.line_no(), Some(2));
}

#[test]
fn cursor_restarts_after_reading_to_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("numbers.csv");
    fs::write(&path, "1,one\n2,two\n").unwrap();

    let mut csv = CsvFileBuilder::new().from_path(&path).unwrap();

    let first: Vec<Row> = csv.rows().collect::<Result<_, _>>().unwrap();
    let second: Vec<Row> = csv.rows().collect::<Result<_, _>>().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);

    csv.rewind().unwrap();
    assert_eq!(csv.key(), Some(0));
    assert_eq!(csv.current().map(|row| row[1].as_str()), Some("one"));
}

#[test]
fn multi_line_record_spans_physical_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("multi.csv");

    let mut csv = CsvFileBuilder::new().from_path(&path).unwrap();
    csv.write_line(["a\nb", "c"]).unwrap();
    csv.write_line(["d"]).unwrap();
    csv.flush().unwrap();
    drop(csv);

    let lines = FileIterator::open(&path)
        .unwrap()
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(lines, vec!["\"a\n", "b\",c\n", "d\n"]);

    let mut csv = CsvFileBuilder::new().from_path(&path).unwrap();
    let rows = csv.rows().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(rows, vec![vec!["a\nb", "c"], vec!["d"]]);
}

#[test]
fn written_stream_is_handed_over_open() {
    let mut csv = CsvFileBuilder::new().temporary().unwrap();
    csv.write_line(["x"]).unwrap();
    assert!(csv.path().is_none());

    let mut stream = csv.into_stream().unwrap();
    let position = io::Seek::stream_position(&mut stream).unwrap();
    assert_eq!(position, 2);

    io::Seek::rewind(&mut stream).unwrap();
    let mut reread = CsvFileBuilder::new().from_stream(stream).unwrap();
    assert_eq!(reread.read_line().unwrap(), Some(vec!["x".to_string()]));
}

#[test]
fn failing_write_is_reported_with_its_action() {
    let mut stream = MockStream::new();
    stream
        .expect_write()
        .returning(|_| Err(io::Error::other("disk full")));

    let mut csv = CsvFileBuilder::new().from_stream(stream).unwrap();
    let result = csv.write_line(["a", "b"]);

    match result {
        Err(CsvError::Io { action, path, source }) => {
            assert_eq!(action, "writing");
            assert_eq!(path, "<stream>");
            assert_eq!(source.to_string(), "disk full");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(csv.line_no(), None);
    assert!(csv.current().is_none());
}

#[test]
fn failing_read_stops_the_row_iterator() {
    let mut stream = MockStream::new();
    stream
        .expect_seek()
        .withf(|position| *position == SeekFrom::Start(0))
        .returning(|_| Ok(0));
    stream
        .expect_read()
        .times(1)
        .returning(|_| Err(io::Error::from(io::ErrorKind::PermissionDenied)));

    let mut csv = CsvFileBuilder::new().from_stream(stream).unwrap();
    let mut rows = csv.rows();

    assert!(matches!(
        rows.next(),
        Some(Err(CsvError::Io { action: "reading", .. }))
    ));
    assert!(rows.next().is_none());
}

#[test]
fn failing_rewind_keeps_the_cursor_untouched() {
    let mut stream = MockStream::new();
    stream
        .expect_seek()
        .returning(|_| Err(io::Error::from(io::ErrorKind::Unsupported)));

    let mut csv = CsvFileBuilder::new().from_stream(stream).unwrap();

    assert!(matches!(
        csv.reset(),
        Err(CsvError::Io { action: "rewinding", .. })
    ));
    assert!(matches!(csv.rewind(), Err(CsvError::Io { .. })));
}
