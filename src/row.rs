//! Raw result rows and typed value extraction
//!
//! A `RawRow` is what the execution boundary hands back: an ordered
//! column-name → value mapping, decoupled from the driver's own row type so
//! the rest of the crate (and the test suite) never touches sqlx directly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{OrmError, OrmResult};
use crate::value::SqlValue;

/// One result row: ordered columns with their decoded values
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    columns: Vec<(String, SqlValue)>,
    index: HashMap<String, usize>,
}

impl RawRow {
    /// Build a row from (column, value) pairs in result order
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
        Self { columns, index }
    }

    /// Look up a column by name
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.index.get(column).map(|&i| &self.columns[i].1)
    }

    /// True if the row carries the named column
    pub fn contains(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Columns in result order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Extract a column value, coerced to the requested type
    ///
    /// Missing columns and uncoercible values are both `Decode` errors; a
    /// nullable field asks for `Option<T>` instead.
    pub fn try_get<T: FromSqlValue>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| OrmError::decode(column, "column missing from result row"))?;
        T::from_sql(value).map_err(|message| OrmError::decode(column, message))
    }

    /// Decode a column holding a serialized structured value
    ///
    /// Accepts both native json columns and their text representation.
    pub fn try_get_json<T: DeserializeOwned>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| OrmError::decode(column, "column missing from result row"))?;
        match value {
            SqlValue::Json(json) => serde_json::from_value(json.clone())
                .map_err(|e| OrmError::decode(column, e.to_string())),
            SqlValue::Text(text) => serde_json::from_str(text)
                .map_err(|e| OrmError::decode(column, e.to_string())),
            other => Err(OrmError::decode(
                column,
                format!("expected a json value, found {}", other.type_name()),
            )),
        }
    }

    /// Coerce a raw scalar column into an enumeration member
    ///
    /// Works through serde, so a union of enumerations is expressed as an
    /// untagged enum and each member is tried in declaration order, first
    /// match winning.
    pub fn try_get_enum<T: DeserializeOwned>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| OrmError::decode(column, "column missing from result row"))?;
        let json = match value {
            SqlValue::Text(text) => serde_json::Value::String(text.clone()),
            SqlValue::Int(i) => serde_json::Value::from(*i),
            SqlValue::Json(json) => json.clone(),
            other => {
                return Err(OrmError::decode(
                    column,
                    format!("cannot coerce {} into an enum member", other.type_name()),
                ))
            }
        };
        serde_json::from_value(json).map_err(|e| OrmError::decode(column, e.to_string()))
    }
}

/// Conversion from a decoded SQL value into a field type
pub trait FromSqlValue: Sized {
    /// Coerce the value, describing the mismatch on failure
    fn from_sql(value: &SqlValue) -> Result<Self, String>;
}

fn mismatch(expected: &str, found: &SqlValue) -> String {
    format!("expected {expected}, found {}", found.type_name())
}

impl FromSqlValue for bool {
    fn from_sql(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromSqlValue for i64 {
    fn from_sql(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Int(i) => Ok(*i),
            other => Err(mismatch("int", other)),
        }
    }
}

impl FromSqlValue for i32 {
    fn from_sql(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Int(i) => i32::try_from(*i).map_err(|_| format!("{i} overflows i32")),
            other => Err(mismatch("int", other)),
        }
    }
}

impl FromSqlValue for i16 {
    fn from_sql(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Int(i) => i16::try_from(*i).map_err(|_| format!("{i} overflows i16")),
            other => Err(mismatch("int", other)),
        }
    }
}

impl FromSqlValue for f64 {
    fn from_sql(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Float(f) => Ok(*f),
            SqlValue::Int(i) => Ok(*i as f64),
            other => Err(mismatch("float", other)),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Text(s) => Ok(s.clone()),
            other => Err(mismatch("text", other)),
        }
    }
}

impl FromSqlValue for Uuid {
    fn from_sql(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Uuid(u) => Ok(*u),
            SqlValue::Text(s) => Uuid::parse_str(s).map_err(|e| e.to_string()),
            other => Err(mismatch("uuid", other)),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::DateTime(t) => Ok(*t),
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl FromSqlValue for serde_json::Value {
    fn from_sql(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Json(json) => Ok(json.clone()),
            other => Err(mismatch("json", other)),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn row() -> RawRow {
        RawRow::new(vec![
            ("id".to_string(), SqlValue::Int(7)),
            ("name".to_string(), SqlValue::Text("acme".to_string())),
            ("parent_id".to_string(), SqlValue::Null),
            (
                "meta".to_string(),
                SqlValue::Json(serde_json::json!({"region": "emea"})),
            ),
            ("status".to_string(), SqlValue::Text("active".to_string())),
        ])
    }

    #[test]
    fn typed_extraction_and_nullability() {
        let row = row();
        assert_eq!(row.try_get::<i64>("id").unwrap(), 7);
        assert_eq!(row.try_get::<String>("name").unwrap(), "acme");
        assert_eq!(row.try_get::<Option<i64>>("parent_id").unwrap(), None);
        assert_eq!(row.try_get::<Option<i64>>("id").unwrap(), Some(7));
    }

    #[test]
    fn coercion_failures_are_decode_errors() {
        let row = row();
        assert!(matches!(
            row.try_get::<i64>("name"),
            Err(OrmError::Decode { .. })
        ));
        assert!(matches!(
            row.try_get::<i64>("no_such_column"),
            Err(OrmError::Decode { .. })
        ));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Meta {
        region: String,
    }

    #[test]
    fn embedded_json_values_deserialize() {
        let row = row();
        let meta: Meta = row.try_get_json("meta").unwrap();
        assert_eq!(meta.region, "emea");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Status {
        Active,
        Retired,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(untagged)]
    enum StatusOrCode {
        Status(Status),
        Code(i64),
    }

    #[test]
    fn enum_coercion_takes_the_first_matching_member() {
        let row = row();
        assert_eq!(row.try_get_enum::<Status>("status").unwrap(), Status::Active);
        assert_eq!(
            row.try_get_enum::<StatusOrCode>("status").unwrap(),
            StatusOrCode::Status(Status::Active)
        );
        assert_eq!(
            row.try_get_enum::<StatusOrCode>("id").unwrap(),
            StatusOrCode::Code(7)
        );
        assert!(row.try_get_enum::<Status>("id").is_err());
    }
}
