//! Log record type

use crate::error::{Error, Result};
use crate::finite;
use crate::level::Level;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Field written by [`Record::with_error`]
pub const ERROR_KEY: &str = "error";
/// Key carrying the rendered level
pub const LEVEL_KEY: &str = "level";
/// Key carrying the message
pub const MESSAGE_KEY: &str = "msg";
/// Key carrying the timestamp
pub const TIME_KEY: &str = "time";

#[derive(Debug, Clone)]
enum FieldValue {
    Json(Value),
    /// Conversion failed when the field was attached; reported on serialization
    Unrepresentable(String),
}

/// A structured log record: fields, message, level and timestamp.
///
/// Fields are attached with the builder methods; [`Record::finalize`] stamps
/// the level, message and creation time. Serialization renders one JSON line.
#[derive(Debug, Clone)]
pub struct Record {
    level: Level,
    message: String,
    timestamp: DateTime<Utc>,
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an empty, not yet finalized record
    #[must_use]
    pub fn new() -> Self {
        Self {
            level: Level::new(0),
            message: String::new(),
            timestamp: Utc::now(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style method for attaching a field.
    ///
    /// Values that serialize to `null` (`None`, `()`) are ignored. A later value
    /// under the same name replaces the earlier one.
    #[must_use]
    pub fn with_field<V: Serialize>(mut self, key: impl Into<String>, value: V) -> Self {
        self.insert_field(key, value);
        self
    }

    /// Builder-style method for attaching an error as the `error` field
    #[must_use]
    pub fn with_error<E: fmt::Display + ?Sized>(self, err: &E) -> Self {
        self.with_field(ERROR_KEY, err.to_string())
    }

    /// Attach a field in place, see [`Record::with_field`]
    pub(crate) fn insert_field<V: Serialize>(&mut self, key: impl Into<String>, value: V) {
        let field = match serde_json::to_value(&value) {
            Err(e) => FieldValue::Unrepresentable(e.to_string()),
            // serde_json writes NaN and the infinities as null
            Ok(json) if contains_null(&json) => match finite::check(&value) {
                Err(e) => FieldValue::Unrepresentable(e.to_string()),
                Ok(()) if json.is_null() => return,
                Ok(()) => FieldValue::Json(json),
            },
            Ok(json) => FieldValue::Json(json),
        };

        self.fields.insert(key.into(), field);
    }

    /// Stamp level, message and creation time.
    ///
    /// A `Record` is a plain value: the logger finalizes it once when `log` is
    /// called and never touches it again, but a caller holding its own record
    /// may finalize it as often as it likes.
    #[must_use]
    pub fn finalize(mut self, level: Level, message: impl Into<String>) -> Self {
        self.level = level;
        self.message = message.into();
        self.timestamp = Utc::now();
        self
    }

    /// Level of the record
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    /// Message of the record
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Creation time of the record
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Value of an attached field, if it is present and representable
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        match self.fields.get(key)? {
            FieldValue::Json(value) => Some(value),
            FieldValue::Unrepresentable(_) => None,
        }
    }

    /// Render the record as a JSON object.
    ///
    /// `level`, `msg` and `time` take precedence over fields of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if an attached field could not be represented.
    pub fn to_json(&self) -> Result<Map<String, Value>> {
        let mut data = Map::new();

        for (key, value) in &self.fields {
            match value {
                FieldValue::Json(json) => {
                    data.insert(key.clone(), json.clone());
                }
                FieldValue::Unrepresentable(reason) => {
                    return Err(Error::Serialization {
                        field: key.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }

        data.insert(LEVEL_KEY.to_string(), Value::String(self.level.to_string()));
        data.insert(MESSAGE_KEY.to_string(), Value::String(self.message.clone()));
        data.insert(
            TIME_KEY.to_string(),
            Value::String(format_timestamp(&self.timestamp)),
        );

        Ok(data)
    }

    /// Render the record as a single newline-terminated JSON line
    ///
    /// # Errors
    ///
    /// Returns an error if a field could not be represented or encoding failed.
    pub fn to_json_string(&self) -> Result<String> {
        let mut line = serde_json::to_string(&Value::Object(self.to_json()?))?;
        line.push('\n');
        Ok(line)
    }

    /// Same as [`Record::to_json_string`], as bytes ready for a sink
    ///
    /// # Errors
    ///
    /// Returns an error if a field could not be represented or encoding failed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_json_string().map(String::into_bytes)
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.iter().any(contains_null),
        Value::Object(map) => map.values().any(contains_null),
        _ => false,
    }
}

/// RFC 3339, UTC, millisecond precision: fixed width and sortable
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
