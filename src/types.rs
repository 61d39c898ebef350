use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};

use crate::error::GpkgError;

/// GeoPackage-side storage type of a property column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColumnType {
    Boolean,
    Varchar,
    Double,
    Integer,
    Date,
    DateTime,
    Geometry,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Clone, Debug)]
pub(crate) struct ColumnSpecs {
    pub(crate) primary_key: String,
    pub(crate) other_columns: Vec<ColumnSpec>,
}

/// Descriptive metadata of one entry in `gpkg_contents`.
#[derive(Clone, Debug, PartialEq)]
pub struct GpkgLayerMetadata {
    pub table_name: String,
    pub data_type: String,
    pub identifier: String,
    pub description: String,
    /// `(min_x, min_y, max_x, max_y)`; `None` until an extent has been recorded.
    pub bounds: Option<(f64, f64, f64, f64)>,
    /// `"{organization}:{srs_id}"`, e.g. `"EPSG:4326"`.
    pub srs: String,
}

/// Owned dynamic value of a feature property.
///
/// Values read back from SQLite only use the storage classes (`Null`,
/// `Integer`, `Real`, `Text`, `Blob`); `Boolean`, `Date` and `DateTime` are
/// produced by CSV coercion and stored as `INTEGER` and ISO-8601 `TEXT`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Blob(Vec<u8>),
}

// cf. https://www.geopackage.org/spec140/index.html#_data_types
pub(crate) const GPKG_DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const GPKG_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Blob(_) => "blob",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Real(v),
            ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => Value::Blob(v.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as SqlValue;

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Boolean(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
            Value::Date(v) => {
                ToSqlOutput::Owned(SqlValue::Text(v.format(GPKG_DATE_FORMAT).to_string()))
            }
            Value::DateTime(v) => {
                ToSqlOutput::Owned(SqlValue::Text(v.format(GPKG_DATETIME_FORMAT).to_string()))
            }
            Value::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

fn mismatch(expected: &'static str, value: &Value) -> GpkgError {
    GpkgError::ValueTypeMismatch {
        expected,
        actual: value.type_name(),
    }
}

impl TryFrom<Value> for String {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Integer(v) => Ok(v),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            other => Err(mismatch("real", &other)),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Boolean(v) => Ok(v),
            Value::Integer(v) => Ok(v != 0),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl TryFrom<Value> for NaiveDate {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Date(v) => Ok(v),
            Value::Text(ref text) => NaiveDate::parse_from_str(text, GPKG_DATE_FORMAT)
                .map_err(|_| mismatch("date", &value)),
            other => Err(mismatch("date", &other)),
        }
    }
}

impl TryFrom<Value> for NaiveDateTime {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::DateTime(v) => Ok(v),
            Value::Text(ref text) => NaiveDateTime::parse_from_str(text, GPKG_DATETIME_FORMAT)
                .map_err(|_| mismatch("datetime", &value)),
            other => Err(mismatch("datetime", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Value;
    use chrono::{NaiveDate, NaiveDateTime};
    use rusqlite::Connection;

    #[test]
    fn stores_coerced_values_with_gpkg_encodings() -> crate::Result<()> {
        let conn = Connection::open_in_memory()?;
        let date = NaiveDate::from_ymd_opt(2023, 1, 15).expect("date");
        let datetime = date.and_hms_opt(8, 30, 0).expect("datetime");

        let (flag, date_text, datetime_text): (i64, String, String) = conn.query_row(
            "SELECT ?1, ?2, ?3",
            [Value::from(true), Value::from(date), Value::from(datetime)],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        assert_eq!(flag, 1);
        assert_eq!(date_text, "2023-01-15");
        assert_eq!(datetime_text, "2023-01-15T08:30:00.000Z");
        Ok(())
    }

    #[test]
    fn converts_stored_text_back_to_dates() -> crate::Result<()> {
        let date: NaiveDate = Value::Text("2023-01-15".to_string()).try_into()?;
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 1, 15).expect("date"));

        let datetime: NaiveDateTime =
            Value::Text("2023-01-15T08:30:00.000Z".to_string()).try_into()?;
        assert_eq!(datetime.to_string(), "2023-01-15 08:30:00");
        Ok(())
    }

    #[test]
    fn rejects_mismatched_conversion() {
        let result: crate::Result<i64> = Value::Text("seven".to_string()).try_into();
        match result {
            Err(crate::GpkgError::ValueTypeMismatch { expected, actual }) => {
                assert_eq!(expected, "integer");
                assert_eq!(actual, "text");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
