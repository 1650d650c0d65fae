//! Normalization of the data handed to the CSV formatter.
//!
//! A [`Dataset`] is turned into a stream of [`Record`]s, and every record into
//! [`Fields`]: either a plain list of values or a keyed map whose insertion
//! order is kept.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CsvError, Result};

/// Something that can convert itself to plain data.
///
/// As a dataset the result must be an array or an object whose values are the
/// records; as a record it must be an array or an object of field values.
pub trait Arrayable {
    fn to_array(&self) -> Value;
}

/// A lazily evaluated source of records, walked once.
pub trait Query {
    fn each(&self) -> Box<dyn Iterator<Item = Record> + '_>;
}

/// A paginated source exposing the records of its current page.
pub trait DataProvider {
    fn models(&self) -> Vec<Record>;
}

/// A model whose attributes become the fields of its record.
pub trait Model {
    fn attributes(&self) -> Map<String, Value>;
}

/// One input record, before normalization.
pub enum Record {
    Value(Value),
    Arrayable(Box<dyn Arrayable>),
    Model(Box<dyn Model>),
}

impl Record {
    /// Serializes any `Serialize` value (a struct's fields become keys).
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Record> {
        serde_json::to_value(value)
            .map(Record::Value)
            .map_err(|error| CsvError::IncompatibleRowShape(error.to_string()))
    }

    pub fn arrayable(arrayable: impl Arrayable + 'static) -> Record {
        Record::Arrayable(Box::new(arrayable))
    }

    pub fn model(model: impl Model + 'static) -> Record {
        Record::Model(Box::new(model))
    }

    /// Resolves the record into its fields.
    ///
    /// `null`, `false`, zero and empty strings are an empty record; any other
    /// scalar cannot be split into fields and is rejected with
    /// `CsvError::IncompatibleRowShape`.
    pub fn into_fields(self) -> Result<Fields> {
        match self {
            Record::Value(value) => Fields::from_value(value),
            Record::Arrayable(arrayable) => Fields::from_value(arrayable.to_array()),
            Record::Model(model) => Ok(Fields::Keyed(model.attributes())),
        }
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Record::Value(value)
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Record::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Record::Arrayable(_) => f.write_str("Arrayable(..)"),
            Record::Model(_) => f.write_str("Model(..)"),
        }
    }
}

/// Field values of one normalized record.
#[derive(Debug, Clone, PartialEq)]
pub enum Fields {
    List(Vec<Value>),
    Keyed(Map<String, Value>),
}

impl Fields {
    fn from_value(value: Value) -> Result<Fields> {
        match value {
            Value::Array(values) => Ok(Fields::List(values)),
            Value::Object(map) => Ok(Fields::Keyed(map)),
            blank if is_blank(&blank) => Ok(Fields::List(Vec::new())),
            scalar => Err(CsvError::IncompatibleRowShape(format!(
                "cannot split {} into fields",
                scalar
            ))),
        }
    }

    /// Looks up a field; list positions are addressed by decimal keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Fields::Keyed(map) => map.get(key),
            Fields::List(values) => key
                .parse::<usize>()
                .ok()
                .and_then(|index| values.get(index)),
        }
    }

    /// Field names in order, only for keyed records.
    pub fn keys(&self) -> Option<Vec<String>> {
        match self {
            Fields::Keyed(map) => Some(map.keys().cloned().collect()),
            Fields::List(_) => None,
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            Fields::List(values) => values,
            Fields::Keyed(map) => map.into_iter().map(|(_, value)| value).collect(),
        }
    }
}

/// `null`, `false`, zero, `""` and `"0"` stand for an empty record.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty() || text == "0",
        _ => false,
    }
}

/// Renders one field value as CSV text.
///
/// Strings are kept verbatim, numbers use their shortest round-trip form,
/// `true` is `1`, `false` and `null` are empty and nested values become
/// compact JSON.
pub fn field_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) | Value::Null => String::new(),
        nested => nested.to_string(),
    }
}

/// Data handed to the formatter.
///
/// Shapes are tried in a fixed order when built from a plain value: `null` is
/// empty, an array yields its elements, an object yields its values, and
/// anything else is `CsvError::UnsupportedDataShape`.
pub enum Dataset<'a> {
    Empty,
    Sequence(Box<dyn Iterator<Item = Record> + 'a>),
    Value(Value),
    Arrayable(&'a dyn Arrayable),
    Query(&'a dyn Query),
    Provider(&'a dyn DataProvider),
}

impl<'a> Dataset<'a> {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: 'a,
    {
        Dataset::Sequence(Box::new(records.into_iter()))
    }

    /// Serializes the data; a slice of structs yields one record per struct.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        serde_json::to_value(data)
            .map(Dataset::Value)
            .map_err(|error| CsvError::UnsupportedDataShape(error.to_string()))
    }

    /// Resolves the dataset into its records.
    pub fn records(self) -> Result<Box<dyn Iterator<Item = Record> + 'a>> {
        match self {
            Dataset::Empty => Ok(Box::new(std::iter::empty())),
            Dataset::Sequence(records) => Ok(records),
            Dataset::Value(value) => value_records(value),
            Dataset::Arrayable(arrayable) => value_records(arrayable.to_array()),
            Dataset::Query(query) => Ok(query.each()),
            Dataset::Provider(provider) => Ok(Box::new(provider.models().into_iter())),
        }
    }
}

impl From<Value> for Dataset<'_> {
    fn from(value: Value) -> Self {
        Dataset::Value(value)
    }
}

fn value_records<'a>(value: Value) -> Result<Box<dyn Iterator<Item = Record> + 'a>> {
    match value {
        Value::Null => Ok(Box::new(std::iter::empty())),
        Value::Array(values) => Ok(Box::new(values.into_iter().map(Record::Value))),
        Value::Object(map) => Ok(Box::new(
            map.into_iter().map(|(_, value)| Record::Value(value)),
        )),
        scalar => Err(CsvError::UnsupportedDataShape(format!(
            "cannot iterate records of {}",
            scalar
        ))),
    }
}
