//! Schema capability used by the catalog.
//!
//! The mediation layer never interprets schemas itself. It only asks a
//! [`Schema`] to validate, deserialize (coerce raw input), serialize (format
//! outgoing values) and produce random conforming values for mocks.
//!
//! [`JsonSchema`] is the reference implementation used by [`Contract`].
//! It covers the JSON Schema subset needed for request/response enforcement.
//!
//! # Example
//!
//! ```
//! use enforcer_core::schema::{JsonSchema, Schema};
//!
//! let person = JsonSchema::object(vec![
//!     ("id", JsonSchema::integer().minimum_int(1).required()),
//!     ("name", JsonSchema::string().min_length(1).required()),
//!     ("nickname", JsonSchema::string()),
//! ]);
//!
//! assert!(person.validate(&serde_json::json!({"id": 1, "name": "Ada"})).is_ok());
//! assert!(person.validate(&serde_json::json!({"id": 0, "name": ""})).is_err());
//! ```
//!
//! [`Contract`]: crate::Contract

use crate::report::ErrorReport;
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use indexmap::IndexMap;
use rand::distr::{Alphanumeric, SampleString, Uniform};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased schema handle.
pub type SchemaRef = Arc<dyn Schema>;

/// A random value produced by [`Schema::random_value`].
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    /// The generated value.
    pub value: Value,
    /// Constraints the generator could not honour.
    pub warnings: Vec<String>,
}

/// Validate/serialize/random-value capability for one schema.
pub trait Schema: Send + Sync + fmt::Debug {
    /// Checks a value against the schema.
    fn validate(&self, value: &Value) -> Result<(), ErrorReport>;

    /// Coerces raw input (for example string parameters) and validates it.
    fn deserialize(&self, value: Value) -> Result<Value, ErrorReport>;

    /// Formats an outgoing value and validates the result.
    fn serialize(&self, value: Value) -> Result<Value, ErrorReport>;

    /// Produces a random value conforming to the schema.
    fn random_value(&self) -> Result<Generated, ErrorReport>;
}

/// Known string formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringFormat {
    /// Full date, `YYYY-MM-DD`.
    #[serde(rename = "date")]
    Date,
    /// RFC 3339 timestamp.
    #[serde(rename = "date-time")]
    DateTime,
}

/// Reference JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonSchema {
    /// String type.
    String {
        /// Whether this field is required.
        #[serde(default)]
        required: bool,
        /// Minimum length in characters.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        /// Maximum length in characters.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        /// Regular expression the value must match.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        /// Semantic format.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<StringFormat>,
        /// Allowed values.
        #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
        allowed: Vec<String>,
    },
    /// Integer type.
    Integer {
        /// Whether this field is required.
        #[serde(default)]
        required: bool,
        /// Minimum value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        /// Maximum value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    /// Number (float) type.
    Number {
        /// Whether this field is required.
        #[serde(default)]
        required: bool,
        /// Minimum value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        /// Maximum value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    /// Boolean type.
    Boolean {
        /// Whether this field is required.
        #[serde(default)]
        required: bool,
    },
    /// Array type.
    Array {
        /// Whether this field is required.
        #[serde(default)]
        required: bool,
        /// Schema for array items.
        items: Box<JsonSchema>,
        /// Minimum number of items.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        /// Maximum number of items.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
    /// Object type.
    Object {
        /// Whether this field is required.
        #[serde(default)]
        required: bool,
        /// Properties and their schemas, in declaration order.
        #[serde(default)]
        properties: IndexMap<String, JsonSchema>,
        /// Names of required properties.
        #[serde(default)]
        required_properties: Vec<String>,
        /// Whether undeclared properties are allowed.
        #[serde(default = "default_true")]
        additional_properties: bool,
    },
    /// Any type (accepts anything).
    Any {
        /// Whether this field is required.
        #[serde(default)]
        required: bool,
    },
    /// Null type.
    Null,
}

fn default_true() -> bool {
    true
}

impl JsonSchema {
    /// Creates a string schema.
    #[must_use]
    pub fn string() -> Self {
        Self::String {
            required: false,
            min_length: None,
            max_length: None,
            pattern: None,
            format: None,
            allowed: Vec::new(),
        }
    }

    /// Creates a `date` formatted string schema.
    #[must_use]
    pub fn date() -> Self {
        Self::string().format(StringFormat::Date)
    }

    /// Creates a `date-time` formatted string schema.
    #[must_use]
    pub fn date_time() -> Self {
        Self::string().format(StringFormat::DateTime)
    }

    /// Creates an integer schema.
    #[must_use]
    pub fn integer() -> Self {
        Self::Integer {
            required: false,
            minimum: None,
            maximum: None,
        }
    }

    /// Creates a number schema.
    #[must_use]
    pub fn number() -> Self {
        Self::Number {
            required: false,
            minimum: None,
            maximum: None,
        }
    }

    /// Creates a boolean schema.
    #[must_use]
    pub fn boolean() -> Self {
        Self::Boolean { required: false }
    }

    /// Creates an array schema.
    #[must_use]
    pub fn array(items: JsonSchema) -> Self {
        Self::Array {
            required: false,
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    /// Creates an object schema from `(name, schema)` pairs.
    ///
    /// Properties marked with [`required`](Self::required) become required
    /// properties of the object.
    #[must_use]
    pub fn object(properties: Vec<(&str, JsonSchema)>) -> Self {
        let required_properties = properties
            .iter()
            .filter(|(_, schema)| schema.is_required())
            .map(|(name, _)| (*name).to_string())
            .collect();

        Self::Object {
            required: false,
            properties: properties
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema))
                .collect(),
            required_properties,
            additional_properties: true,
        }
    }

    /// Creates an "any" schema.
    #[must_use]
    pub fn any() -> Self {
        Self::Any { required: false }
    }

    /// Creates a null schema.
    #[must_use]
    pub fn null() -> Self {
        Self::Null
    }

    fn required_flag(&mut self) -> Option<&mut bool> {
        match self {
            Self::String { required, .. }
            | Self::Integer { required, .. }
            | Self::Number { required, .. }
            | Self::Boolean { required }
            | Self::Array { required, .. }
            | Self::Object { required, .. }
            | Self::Any { required } => Some(required),
            Self::Null => None,
        }
    }

    /// Marks this schema as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        if let Some(flag) = self.required_flag() {
            *flag = true;
        }
        self
    }

    /// Returns whether this schema is marked as required.
    #[must_use]
    pub fn is_required(&self) -> bool {
        match self {
            Self::String { required, .. }
            | Self::Integer { required, .. }
            | Self::Number { required, .. }
            | Self::Boolean { required }
            | Self::Array { required, .. }
            | Self::Object { required, .. }
            | Self::Any { required } => *required,
            Self::Null => false,
        }
    }

    /// Sets the minimum length for string schemas.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        if let Self::String { min_length, .. } = &mut self {
            *min_length = Some(len);
        }
        self
    }

    /// Sets the maximum length for string schemas.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        if let Self::String { max_length, .. } = &mut self {
            *max_length = Some(len);
        }
        self
    }

    /// Sets the pattern for string schemas.
    #[must_use]
    pub fn pattern(mut self, regex: impl Into<String>) -> Self {
        if let Self::String { pattern, .. } = &mut self {
            *pattern = Some(regex.into());
        }
        self
    }

    /// Sets the format for string schemas.
    #[must_use]
    pub fn format(mut self, value: StringFormat) -> Self {
        if let Self::String { format, .. } = &mut self {
            *format = Some(value);
        }
        self
    }

    /// Restricts string schemas to a set of values.
    #[must_use]
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Self::String { allowed, .. } = &mut self {
            *allowed = values.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Sets the minimum value for integer schemas.
    #[must_use]
    pub fn minimum_int(mut self, min: i64) -> Self {
        if let Self::Integer { minimum, .. } = &mut self {
            *minimum = Some(min);
        }
        self
    }

    /// Sets the maximum value for integer schemas.
    #[must_use]
    pub fn maximum_int(mut self, max: i64) -> Self {
        if let Self::Integer { maximum, .. } = &mut self {
            *maximum = Some(max);
        }
        self
    }

    /// Sets the bounds for number schemas.
    #[must_use]
    pub fn range(mut self, min: f64, max: f64) -> Self {
        if let Self::Number {
            minimum, maximum, ..
        } = &mut self
        {
            *minimum = Some(min);
            *maximum = Some(max);
        }
        self
    }

    /// Sets the minimum items for array schemas.
    #[must_use]
    pub fn min_items(mut self, min: usize) -> Self {
        if let Self::Array { min_items, .. } = &mut self {
            *min_items = Some(min);
        }
        self
    }

    /// Sets the maximum items for array schemas.
    #[must_use]
    pub fn max_items(mut self, max: usize) -> Self {
        if let Self::Array { max_items, .. } = &mut self {
            *max_items = Some(max);
        }
        self
    }

    /// Rejects undeclared properties on object schemas.
    #[must_use]
    pub fn deny_additional_properties(mut self) -> Self {
        if let Self::Object {
            additional_properties,
            ..
        } = &mut self
        {
            *additional_properties = false;
        }
        self
    }

    /// Wraps this schema in an [`Arc`] for use in operations.
    #[must_use]
    pub fn shared(self) -> SchemaRef {
        Arc::new(self)
    }

    fn check(&self, value: &Value, path: &str, errors: &mut Vec<String>) {
        if value.is_null() {
            if self.is_required() {
                errors.push(format!("{path}: required value is null"));
            }
            return;
        }

        match self {
            Self::String {
                min_length,
                max_length,
                pattern,
                format,
                allowed,
                ..
            } => {
                let Some(s) = value.as_str() else {
                    errors.push(mismatch(path, "string", value));
                    return;
                };
                let len = s.chars().count();
                if let Some(min) = min_length.filter(|min| len < *min) {
                    errors.push(format!(
                        "{path}: string length {len} is less than minimum {min}"
                    ));
                }
                if let Some(max) = max_length.filter(|max| len > *max) {
                    errors.push(format!(
                        "{path}: string length {len} is greater than maximum {max}"
                    ));
                }
                if let Some(pattern) = pattern {
                    match regex::Regex::new(pattern) {
                        Ok(re) if !re.is_match(s) => {
                            errors.push(format!("{path}: value does not match pattern {pattern}"));
                        }
                        Err(e) => errors.push(format!("{path}: invalid pattern {pattern}: {e}")),
                        Ok(_) => {}
                    }
                }
                match format {
                    Some(StringFormat::Date) if parse_date(s).is_none() => {
                        errors.push(format!("{path}: expected a date (YYYY-MM-DD), got {s:?}"));
                    }
                    Some(StringFormat::DateTime) if parse_date_time(s).is_none() => {
                        errors.push(format!("{path}: expected an RFC 3339 date-time, got {s:?}"));
                    }
                    _ => {}
                }
                if !allowed.is_empty() && !allowed.iter().any(|a| a == s) {
                    errors.push(format!(
                        "{path}: value {s:?} is not one of: {}",
                        allowed.join(", ")
                    ));
                }
            }

            Self::Integer {
                minimum, maximum, ..
            } => {
                let Some(n) = value.as_i64() else {
                    errors.push(mismatch(path, "integer", value));
                    return;
                };
                if let Some(min) = minimum.filter(|min| n < *min) {
                    errors.push(format!("{path}: value {n} is less than minimum {min}"));
                }
                if let Some(max) = maximum.filter(|max| n > *max) {
                    errors.push(format!("{path}: value {n} is greater than maximum {max}"));
                }
            }

            Self::Number {
                minimum, maximum, ..
            } => {
                let Some(n) = value.as_f64() else {
                    errors.push(mismatch(path, "number", value));
                    return;
                };
                if let Some(min) = minimum.filter(|min| n < *min) {
                    errors.push(format!("{path}: value {n} is less than minimum {min}"));
                }
                if let Some(max) = maximum.filter(|max| n > *max) {
                    errors.push(format!("{path}: value {n} is greater than maximum {max}"));
                }
            }

            Self::Boolean { .. } => {
                if !value.is_boolean() {
                    errors.push(mismatch(path, "boolean", value));
                }
            }

            Self::Array {
                items,
                min_items,
                max_items,
                ..
            } => {
                let Some(array) = value.as_array() else {
                    errors.push(mismatch(path, "array", value));
                    return;
                };
                if let Some(min) = min_items.filter(|min| array.len() < *min) {
                    errors.push(format!(
                        "{path}: array has {} items, minimum is {min}",
                        array.len()
                    ));
                }
                if let Some(max) = max_items.filter(|max| array.len() > *max) {
                    errors.push(format!(
                        "{path}: array has {} items, maximum is {max}",
                        array.len()
                    ));
                }
                for (idx, item) in array.iter().enumerate() {
                    items.check(item, &format!("{path}[{idx}]"), errors);
                }
            }

            Self::Object {
                properties,
                required_properties,
                additional_properties,
                ..
            } => {
                let Some(object) = value.as_object() else {
                    errors.push(mismatch(path, "object", value));
                    return;
                };
                for name in required_properties {
                    if !object.contains_key(name) {
                        errors.push(format!("{path}.{name}: missing required property"));
                    }
                }
                for (name, prop) in object {
                    match properties.get(name) {
                        Some(schema) => schema.check(prop, &format!("{path}.{name}"), errors),
                        None if !additional_properties => {
                            errors.push(format!("{path}.{name}: property is not allowed"));
                        }
                        None => {}
                    }
                }
            }

            Self::Any { .. } => {}

            Self::Null => errors.push(mismatch(path, "null", value)),
        }
    }

    fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (Self::Integer { .. }, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => Value::String(s),
            },
            (Self::Number { .. }, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => json!(n),
                _ => Value::String(s),
            },
            (Self::Boolean { .. }, Value::String(s)) => match s.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(s),
            },
            (Self::Array { items, .. }, Value::String(s)) => Value::Array(
                s.split(',')
                    .map(|part| items.coerce(Value::String(part.to_string())))
                    .collect(),
            ),
            (Self::Array { items, .. }, Value::Array(values)) => {
                Value::Array(values.into_iter().map(|v| items.coerce(v)).collect())
            }
            (Self::Object { properties, .. }, Value::Object(map)) => Value::Object(
                map.into_iter()
                    .map(|(name, v)| {
                        let v = match properties.get(&name) {
                            Some(schema) => schema.coerce(v),
                            None => v,
                        };
                        (name, v)
                    })
                    .collect(),
            ),
            (_, value) => value,
        }
    }

    fn format_value(&self, value: Value) -> Value {
        match (self, value) {
            (
                Self::String {
                    format: Some(format),
                    ..
                },
                value,
            ) => format_temporal(*format, value),
            (Self::Array { items, .. }, Value::Array(values)) => {
                Value::Array(values.into_iter().map(|v| items.format_value(v)).collect())
            }
            (Self::Object { properties, .. }, Value::Object(map)) => Value::Object(
                map.into_iter()
                    .map(|(name, v)| {
                        let v = match properties.get(&name) {
                            Some(schema) => schema.format_value(v),
                            None => v,
                        };
                        (name, v)
                    })
                    .collect(),
            ),
            (_, value) => value,
        }
    }

    fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        path: &str,
        warnings: &mut Vec<String>,
    ) -> Result<Value, String> {
        match self {
            Self::String {
                min_length,
                max_length,
                pattern,
                format,
                allowed,
                ..
            } => {
                if let Some(choice) = allowed.choose(rng) {
                    return Ok(Value::String(choice.clone()));
                }
                match format {
                    Some(StringFormat::Date) => {
                        let days = rng.random_range(0..=22_000);
                        let date = NaiveDate::from_ymd_opt(1970, 1, 1)
                            .and_then(|epoch| epoch.checked_add_days(chrono::Days::new(days)))
                            .ok_or_else(|| format!("{path}: unable to generate a date"))?;
                        return Ok(Value::String(date.format("%Y-%m-%d").to_string()));
                    }
                    Some(StringFormat::DateTime) => {
                        let seconds = rng.random_range(0..=1_900_000_000_i64);
                        let instant = Utc
                            .timestamp_opt(seconds, 0)
                            .single()
                            .ok_or_else(|| format!("{path}: unable to generate a date-time"))?;
                        return Ok(Value::String(
                            instant.to_rfc3339_opts(SecondsFormat::Millis, true),
                        ));
                    }
                    None => {}
                }
                if let Some(pattern) = pattern {
                    warnings.push(format!(
                        "{path}: cannot generate a value for pattern {pattern}"
                    ));
                }
                let min = min_length.unwrap_or(1);
                let max = max_length.unwrap_or(min.max(1) + 11);
                if min > max {
                    return Err(format!(
                        "{path}: minimum length {min} exceeds maximum length {max}"
                    ));
                }
                let len = rng.random_range(min..=max);
                Ok(Value::String(Alphanumeric.sample_string(rng, len)))
            }

            Self::Integer {
                minimum, maximum, ..
            } => {
                let (lo, hi) = match (minimum, maximum) {
                    (Some(lo), Some(hi)) => (*lo, *hi),
                    (Some(lo), None) => (*lo, lo.saturating_add(1000)),
                    (None, Some(hi)) => (hi.saturating_sub(1000), *hi),
                    (None, None) => (0, 1000),
                };
                if lo > hi {
                    return Err(format!("{path}: minimum {lo} exceeds maximum {hi}"));
                }
                Ok(Value::from(rng.random_range(lo..=hi)))
            }

            Self::Number {
                minimum, maximum, ..
            } => {
                let lo = minimum.unwrap_or_else(|| maximum.map_or(0.0, |hi| hi - 1000.0));
                let hi = maximum.unwrap_or(lo + 1000.0);
                if lo > hi {
                    return Err(format!("{path}: minimum {lo} exceeds maximum {hi}"));
                }
                let span = Uniform::new_inclusive(lo, hi)
                    .map_err(|err| format!("{path}: cannot sample between {lo} and {hi}: {err}"))?;
                Ok(json!(rng.sample(span)))
            }

            Self::Boolean { .. } => Ok(Value::Bool(rng.random_bool(0.5))),

            Self::Array {
                items,
                min_items,
                max_items,
                ..
            } => {
                let min = min_items.unwrap_or(1);
                let max = max_items.unwrap_or(min.max(3));
                if min > max {
                    return Err(format!(
                        "{path}: minimum items {min} exceeds maximum items {max}"
                    ));
                }
                let len = rng.random_range(min..=max);
                (0..len)
                    .map(|idx| items.generate(rng, &format!("{path}[{idx}]"), warnings))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }

            Self::Object { properties, .. } => {
                let mut object = serde_json::Map::new();
                for (name, schema) in properties {
                    let value = schema.generate(rng, &format!("{path}.{name}"), warnings)?;
                    object.insert(name.clone(), value);
                }
                Ok(Value::Object(object))
            }

            Self::Any { .. } => Ok(Value::String(Alphanumeric.sample_string(rng, 8))),

            Self::Null => Ok(Value::Null),
        }
    }

    fn report(header: &str, errors: Vec<String>) -> Result<(), ErrorReport> {
        if errors.is_empty() {
            return Ok(());
        }
        Err(errors
            .into_iter()
            .fold(ErrorReport::new(header), ErrorReport::with_message))
    }
}

impl Schema for JsonSchema {
    fn validate(&self, value: &Value) -> Result<(), ErrorReport> {
        let mut errors = Vec::new();
        self.check(value, "$", &mut errors);
        Self::report("Value does not match schema", errors)
    }

    fn deserialize(&self, value: Value) -> Result<Value, ErrorReport> {
        let value = self.coerce(value);
        self.validate(&value)?;
        Ok(value)
    }

    fn serialize(&self, value: Value) -> Result<Value, ErrorReport> {
        let value = self.format_value(value);
        self.validate(&value)?;
        Ok(value)
    }

    fn random_value(&self) -> Result<Generated, ErrorReport> {
        let mut rng = rand::rng();
        let mut warnings = Vec::new();
        let value = self
            .generate(&mut rng, "$", &mut warnings)
            .map_err(|e| ErrorReport::new("Unable to generate value").with_message(e))?;
        Ok(Generated { value, warnings })
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_date_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Rewrites temporal values into their canonical wire form.
///
/// Date-times become UTC RFC 3339 with millisecond precision; dates become
/// `YYYY-MM-DD`. Integers are read as milliseconds since the Unix epoch.
/// Anything unparseable is returned unchanged so validation can report it.
fn format_temporal(format: StringFormat, value: Value) -> Value {
    let instant = match &value {
        Value::String(s) => parse_date_time(s).or_else(|| {
            parse_date(s)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        }),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    };

    match (format, instant) {
        (StringFormat::DateTime, Some(dt)) => {
            Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        (StringFormat::Date, Some(dt)) => {
            Value::String(dt.date_naive().format("%Y-%m-%d").to_string())
        }
        (_, None) => value,
    }
}

fn mismatch(path: &str, expected: &str, value: &Value) -> String {
    format!("{path}: expected {expected}, got {}", value_type_name(value))
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> JsonSchema {
        JsonSchema::object(vec![
            ("id", JsonSchema::integer().minimum_int(1).required()),
            ("name", JsonSchema::string().min_length(1).required()),
            ("birthday", JsonSchema::date()),
        ])
    }

    #[test]
    fn test_string_schema_validation() {
        let schema = JsonSchema::string().min_length(2).max_length(4);
        assert!(schema.validate(&json!("abc")).is_ok());
        assert!(schema.validate(&json!("a")).is_err());
        assert!(schema.validate(&json!("abcde")).is_err());
        assert!(schema.validate(&json!(12)).is_err());
    }

    #[test]
    fn test_required_null() {
        assert!(JsonSchema::string().validate(&Value::Null).is_ok());
        assert!(JsonSchema::string().required().validate(&Value::Null).is_err());
        assert!(!JsonSchema::null().required().is_required());
    }

    #[test]
    fn test_pattern_and_enum() {
        let code = JsonSchema::string().pattern("^[A-Z]{3}$");
        assert!(code.validate(&json!("ABC")).is_ok());
        assert!(code.validate(&json!("abc")).is_err());

        let color = JsonSchema::string().one_of(["red", "green"]);
        assert!(color.validate(&json!("red")).is_ok());
        assert!(color.validate(&json!("blue")).is_err());
    }

    #[test]
    fn test_object_collects_every_error() {
        let report = person()
            .validate(&json!({"id": 0, "name": "", "birthday": "nope"}))
            .unwrap_err();
        assert_eq!(report.children().len(), 3);
        assert!(report.to_string().contains("$.id: value 0 is less than minimum 1"));
    }

    #[test]
    fn test_missing_and_extra_properties() {
        let strict = person().deny_additional_properties();
        let report = strict.validate(&json!({"id": 1, "extra": true})).unwrap_err();
        let text = report.to_string();
        assert!(text.contains("$.name: missing required property"));
        assert!(text.contains("$.extra: property is not allowed"));
    }

    #[test]
    fn test_array_validation() {
        let schema = JsonSchema::array(JsonSchema::integer()).min_items(1).max_items(2);
        assert!(schema.validate(&json!([1, 2])).is_ok());
        assert!(schema.validate(&json!([])).is_err());
        assert!(schema.validate(&json!([1, 2, 3])).is_err());
        let report = schema.validate(&json!(["x"])).unwrap_err();
        assert!(report.to_string().contains("$[0]: expected integer, got string"));
    }

    #[test]
    fn test_deserialize_coerces_strings() {
        assert_eq!(JsonSchema::integer().deserialize(json!("42")).unwrap(), json!(42));
        assert_eq!(JsonSchema::number().deserialize(json!("1.5")).unwrap(), json!(1.5));
        assert_eq!(JsonSchema::boolean().deserialize(json!("true")).unwrap(), json!(true));
        assert_eq!(
            JsonSchema::array(JsonSchema::integer())
                .deserialize(json!("1,2,3"))
                .unwrap(),
            json!([1, 2, 3])
        );
        assert!(JsonSchema::integer().deserialize(json!("abc")).is_err());
    }

    #[test]
    fn test_serialize_reformats_dates() {
        let schema = JsonSchema::date_time();
        assert_eq!(
            Schema::serialize(&schema, json!("2024-03-01T10:00:00+02:00")).unwrap(),
            json!("2024-03-01T08:00:00.000Z")
        );
        assert_eq!(
            Schema::serialize(&schema, json!(0)).unwrap(),
            json!("1970-01-01T00:00:00.000Z")
        );
        assert_eq!(
            Schema::serialize(&JsonSchema::date(), json!("2024-03-01T23:30:00Z"))
                .unwrap(),
            json!("2024-03-01")
        );
        assert!(Schema::serialize(&schema, json!("not a date")).is_err());
    }

    #[test]
    fn test_serialize_nested() {
        let serialized = Schema::serialize(&person(), json!({"id": 7, "name": "Ada", "birthday": "1815-12-10T00:00:00Z"}))
            .unwrap();
        assert_eq!(serialized["birthday"], "1815-12-10");
    }

    #[test]
    fn test_random_value_conforms() {
        let schema = JsonSchema::array(person()).min_items(2).max_items(5);
        for _ in 0..20 {
            let generated = schema.random_value().unwrap();
            assert!(generated.warnings.is_empty());
            assert!(schema.validate(&generated.value).is_ok(), "{}", generated.value);
        }
    }

    #[test]
    fn test_random_value_pattern_warns() {
        let generated = JsonSchema::string().pattern("^x+$").random_value().unwrap();
        assert_eq!(generated.warnings.len(), 1);
        assert!(generated.warnings[0].contains("pattern"));
    }

    #[test]
    fn test_random_value_impossible_bounds() {
        let schema = JsonSchema::integer().minimum_int(10).maximum_int(1);
        let report = schema.random_value().unwrap_err();
        assert!(report.to_string().contains("minimum 10 exceeds maximum 1"));
    }

    #[test]
    fn test_random_value_unsampleable_number_range() {
        let schema = JsonSchema::number().range(-1e308, 1e308);
        let report = schema.random_value().unwrap_err();
        assert!(report.to_string().contains("cannot sample between"));
    }

    #[test]
    fn test_random_value_wide_number_range() {
        let value = JsonSchema::number()
            .range(-1e300, 1e300)
            .random_value()
            .unwrap()
            .value;
        let n = value.as_f64().unwrap();
        assert!((-1e300..=1e300).contains(&n));
    }

    #[test]
    fn test_schema_serde() {
        let schema: JsonSchema = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "when": {"type": "string", "format": "date-time", "required": true}
            },
            "required_properties": ["when"]
        }))
        .unwrap();

        assert!(schema.validate(&json!({"when": "2024-01-01T00:00:00Z"})).is_ok());
        assert!(schema.validate(&json!({})).is_err());

        let back = serde_json::to_value(&schema).unwrap();
        assert_eq!(back["properties"]["when"]["format"], "date-time");
    }
}
