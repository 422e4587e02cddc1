//! Typed values.
//!
//! This module defines the values constraints compare: literals from the
//! document after `dataType` coercion, and operand values supplied by the
//! evaluation context.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

use crate::vocab::odrl::XSD_NS;
use crate::vocab::{Iri, TermDictionary};

lazy_static! {
    static ref DURATION: Regex = Regex::new(
        r"^(-)?P(?:(\d+(?:\.\d+)?)Y)?(?:(\d+(?:\.\d+)?)M)?(?:(\d+(?:\.\d+)?)W)?(?:(\d+(?:\.\d+)?)D)?(?:T(?:(\d+(?:\.\d+)?)H)?(?:(\d+(?:\.\d+)?)M)?(?:(\d+(?:\.\d+)?)S)?)?$"
    )
    .expect("duration pattern is valid");
}

/// Seconds per unit of an ISO-8601 duration, in `Y M W D H M S` order.
const DURATION_UNITS: [f64; 7] = [
    365.25 * 86_400.0,
    30.44 * 86_400.0,
    7.0 * 86_400.0,
    86_400.0,
    3_600.0,
    60.0,
    1.0,
];

/// The datatype of a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// `xsd:string`
    String,

    /// `xsd:integer` and its derived integer types
    Integer,

    /// `xsd:decimal`, `xsd:double` and `xsd:float`
    Decimal,

    /// `xsd:boolean`
    Boolean,

    /// `xsd:date`
    Date,

    /// `xsd:time`
    Time,

    /// `xsd:dateTime`
    DateTime,

    /// `xsd:duration`
    Duration,

    /// `xsd:anyURI`
    AnyUri,

    /// Any other datatype, carried as-is.
    Other(Iri),
}

impl DataType {
    /// Parse a datatype name.
    ///
    /// Accepts bare names (`integer`), compact IRIs (`xsd:integer`) and full
    /// XSD IRIs.
    ///
    /// # Arguments
    ///
    /// * `name` - The datatype as written in the document.
    /// * `dictionary` - The document's term dictionary.
    ///
    /// # Returns
    ///
    /// The datatype. Unrecognized names become [`DataType::Other`].
    pub fn parse(name: &str, dictionary: &TermDictionary) -> Self {
        let local = match dictionary.expand(name) {
            Some(iri) => match iri.as_str().strip_prefix(XSD_NS) {
                Some(local) => local.to_string(),
                None if iri.odrl_local_name().is_some() || !name.contains(':') => {
                    iri.local_name().to_string()
                }
                None => return Self::Other(iri),
            },
            None => name.to_string(),
        };

        match local.as_str() {
            "string" | "normalizedString" | "token" | "language" => Self::String,
            "integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
            | "positiveInteger" | "negativeInteger" | "nonPositiveInteger" | "unsignedInt"
            | "unsignedLong" | "unsignedShort" => Self::Integer,
            "decimal" | "double" | "float" => Self::Decimal,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "time" => Self::Time,
            "dateTime" | "dateTimeStamp" => Self::DateTime,
            "duration" | "dayTimeDuration" | "yearMonthDuration" => Self::Duration,
            "anyURI" => Self::AnyUri,
            _ => Self::Other(Iri::new(name)),
        }
    }

    /// Get the full IRI of this datatype.
    pub fn iri(&self) -> Iri {
        let local = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "dateTime",
            Self::Duration => "duration",
            Self::AnyUri => "anyURI",
            Self::Other(iri) => return iri.clone(),
        };
        Iri::new(format!("{}{}", XSD_NS, local))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(iri) => write!(f, "{}", iri),
            other => write!(f, "xsd:{}", other.iri().local_name()),
        }
    }
}

/// A failed coercion or comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    /// What was expected.
    pub expected: String,

    /// The offending value.
    pub found: String,
}

impl TypeMismatch {
    fn new(expected: impl fmt::Display, found: &Value) -> Self {
        Self {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, found '{}'", self.expected, self.found)
    }
}

/// A typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A whole number.
    Integer(i64),

    /// A decimal number.
    Decimal(f64),

    /// A boolean.
    Boolean(bool),

    /// A string, IRI or other untyped text.
    String(String),

    /// A point in time. Dates are represented as midnight.
    DateTime(DateTime<FixedOffset>),

    /// A time of day.
    Time(NaiveTime),

    /// A duration.
    Duration(Duration),

    /// A sequence of values.
    List(Vec<Value>),
}

impl Value {
    /// Convert a JSON literal to a value.
    ///
    /// Strings stay strings until coerced; JSON-LD value objects
    /// (`{"@value": .., "@type": ..}`) are coerced to their declared type.
    ///
    /// # Returns
    ///
    /// `None` for `null`, for objects that are not value objects, and for
    /// lists holding either of those.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Boolean(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Integer(i)),
                None => n.as_f64().map(Value::Decimal),
            },
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Array(items) => {
                // A list with a non-literal member is not a literal
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<Option<Vec<_>>>()
                    .map(Value::List)
            }
            serde_json::Value::Object(map) => {
                if let Some(serde_json::Value::String(iri)) = map.get("@id") {
                    return Some(Value::String(iri.clone()));
                }
                let value = Value::from_json(map.get("@value")?)?;
                match map.get("@type").and_then(serde_json::Value::as_str) {
                    Some(data_type) => value
                        .coerce(&DataType::parse(data_type, TermDictionary::builtin()))
                        .ok(),
                    None => Some(value),
                }
            }
        }
    }

    /// Get the datatype of this value.
    ///
    /// Lists report the type of their first member.
    pub fn kind(&self) -> Option<DataType> {
        match self {
            Value::Integer(_) => Some(DataType::Integer),
            Value::Decimal(_) => Some(DataType::Decimal),
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::String(_) => Some(DataType::String),
            Value::DateTime(_) => Some(DataType::DateTime),
            Value::Time(_) => Some(DataType::Time),
            Value::Duration(_) => Some(DataType::Duration),
            Value::List(items) => items.first().and_then(Value::kind),
        }
    }

    /// Get the members of this value: the items of a list, or the value itself.
    pub fn members(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    /// Coerce this value to a datatype.
    ///
    /// Lists are coerced member by member.
    ///
    /// # Arguments
    ///
    /// * `target` - The datatype to coerce to.
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The coerced value.
    /// * `Err(TypeMismatch)` - If the value cannot represent `target`.
    pub fn coerce(&self, target: &DataType) -> Result<Value, TypeMismatch> {
        if let Value::List(items) = self {
            return items
                .iter()
                .map(|item| item.coerce(target))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List);
        }

        let coerced = match (target, self) {
            (DataType::Other(_), value) => Some(value.clone()),
            (DataType::String | DataType::AnyUri, Value::String(s)) => Some(Value::String(s.clone())),
            (DataType::String, value) => Some(Value::String(value.to_string())),

            (DataType::Integer, Value::Integer(i)) => Some(Value::Integer(*i)),
            (DataType::Integer, Value::Decimal(d)) => integral(*d).map(Value::Integer),
            (DataType::Integer, Value::String(s)) => s.trim().parse().ok().map(Value::Integer),

            (DataType::Decimal, Value::Integer(i)) => Some(Value::Decimal(*i as f64)),
            (DataType::Decimal, Value::Decimal(d)) => Some(Value::Decimal(*d)),
            (DataType::Decimal, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(Value::Decimal),

            (DataType::Boolean, Value::Boolean(b)) => Some(Value::Boolean(*b)),
            (DataType::Boolean, Value::String(s)) => match s.trim() {
                "true" | "1" => Some(Value::Boolean(true)),
                "false" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },

            (DataType::DateTime, Value::DateTime(dt)) => Some(Value::DateTime(*dt)),
            (DataType::DateTime, Value::String(s)) => parse_datetime(s).map(Value::DateTime),
            (DataType::Date, Value::DateTime(dt)) => Some(Value::DateTime(start_of_day(dt))),
            (DataType::Date, Value::String(s)) => {
                parse_datetime(s).map(|dt| Value::DateTime(start_of_day(&dt)))
            }

            (DataType::Time, Value::Time(t)) => Some(Value::Time(*t)),
            (DataType::Time, Value::DateTime(dt)) => Some(Value::Time(dt.time())),
            (DataType::Time, Value::String(s)) => parse_time(s).map(Value::Time),

            (DataType::Duration, Value::Duration(d)) => Some(Value::Duration(*d)),
            (DataType::Duration, Value::String(s)) => parse_duration(s).map(Value::Duration),

            _ => None,
        };

        coerced.ok_or_else(|| TypeMismatch::new(target, self))
    }

    /// Compare two scalar values.
    ///
    /// Integers and decimals compare numerically; date-times compare as
    /// instants regardless of offset.
    ///
    /// # Returns
    ///
    /// * `Ok(Ordering)` - The ordering of `self` relative to `other`.
    /// * `Err(TypeMismatch)` - If the values are not comparable.
    pub fn compare(&self, other: &Value) -> Result<Ordering, TypeMismatch> {
        let ordering = match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Decimal(b)) => (*a as f64).partial_cmp(b),
            (Value::Decimal(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Decimal(a), Value::Decimal(b)) => a.partial_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
            _ => None,
        };

        ordering.ok_or_else(|| match self.kind() {
            Some(kind) => TypeMismatch::new(kind, other),
            None => TypeMismatch::new("a comparable value", other),
        })
    }

    /// Check two values for equality under [`Value::compare`].
    ///
    /// Incomparable values are unequal.
    pub fn matches(&self, other: &Value) -> bool {
        matches!(self.compare(other), Ok(Ordering::Equal))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Time(t) => write!(f, "{}", t),
            Value::Duration(d) => write!(f, "PT{}S", d.num_seconds()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Decimal(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::DateTime(value)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Value::Duration(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

fn start_of_day(dt: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let midnight = dt.date_naive().and_time(NaiveTime::MIN);
    dt.offset()
        .from_local_datetime(&midnight)
        .single()
        .unwrap_or(*dt)
}

/// Parse a date or date-time.
///
/// Accepts RFC 3339 / ISO-8601 date-times, `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DDTHH:MM:SS` without offset (taken as UTC), and plain dates
/// (taken as midnight UTC).
pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc().fixed_offset());
    }

    // Dates with an offset, e.g. 2025-12-31Z or 2025-12-31+02:00
    if value.len() > 10 && value.is_char_boundary(10) {
        let (date, offset) = value.split_at(10);
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        let rfc3339 = format!("{}T00:00:00{}", date, offset);
        return DateTime::parse_from_rfc3339(&rfc3339).ok();
    }

    None
}

/// Parse a time of day, `HH:MM:SS` with optional fraction.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M:%S%.f").ok()
}

/// Parse an ISO-8601 duration such as `P1Y2M3DT4H5M6S` or `PT30M`.
///
/// Years count as 365.25 days and months as 30.44 days.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let captures = DURATION.captures(value.trim())?;

    let mut seconds = 0.0;
    let mut any = false;
    for (i, unit) in DURATION_UNITS.iter().enumerate() {
        if let Some(amount) = captures.get(i + 2) {
            seconds += amount.as_str().parse::<f64>().ok()? * unit;
            any = true;
        }
    }
    if !any {
        return None;
    }
    if captures.get(1).is_some() {
        seconds = -seconds;
    }

    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

/// Convert an integral decimal to an integer, if it fits.
fn integral(d: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    let in_range = d >= i64::MIN as f64 && d < i64::MAX as f64;
    (d.is_finite() && d.fract() == 0.0 && in_range).then_some(d as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_parse() {
        let dict = TermDictionary::builtin();

        assert_eq!(DataType::parse("integer", dict), DataType::Integer);
        assert_eq!(DataType::parse("xsd:dateTime", dict), DataType::DateTime);
        assert_eq!(
            DataType::parse("http://www.w3.org/2001/XMLSchema#decimal", dict),
            DataType::Decimal
        );
        assert_eq!(
            DataType::parse("http://example.com/currency", dict),
            DataType::Other(Iri::new("http://example.com/currency"))
        );
    }

    #[test]
    fn test_coerce_scalars() {
        let five = Value::from("5");
        assert_eq!(five.coerce(&DataType::Integer), Ok(Value::Integer(5)));
        assert_eq!(five.coerce(&DataType::Decimal), Ok(Value::Decimal(5.0)));

        // Non-numeric text is a mismatch, not a panic
        let err = Value::from("abc").coerce(&DataType::Integer).unwrap_err();
        assert_eq!(err.found, "abc");

        assert_eq!(
            Value::from("true").coerce(&DataType::Boolean),
            Ok(Value::Boolean(true))
        );
        assert!(Value::Boolean(true).coerce(&DataType::Integer).is_err());
    }

    #[test]
    fn test_coerce_dates() {
        let date = Value::from("2025-12-31").coerce(&DataType::DateTime).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(date, Value::from(expected));

        let truncated = Value::from("2025-12-31T15:30:00Z")
            .coerce(&DataType::Date)
            .unwrap();
        assert_eq!(truncated, Value::from(expected));

        assert!(Value::from("abc").coerce(&DataType::DateTime).is_err());
    }

    #[test]
    fn test_compare_across_offsets() {
        let a = Value::DateTime(parse_datetime("2025-01-01T12:00:00+02:00").unwrap());
        let b = Value::DateTime(parse_datetime("2025-01-01T10:00:00Z").unwrap());
        assert_eq!(a.compare(&b), Ok(Ordering::Equal));

        let c = Value::DateTime(parse_datetime("2025-01-01 10:00:01").unwrap());
        assert_eq!(b.compare(&c), Ok(Ordering::Less));
    }

    #[test]
    fn test_compare_numeric_and_mismatch() {
        assert_eq!(
            Value::Integer(3).compare(&Value::Decimal(3.5)),
            Ok(Ordering::Less)
        );
        assert!(Value::Integer(3).compare(&Value::from("3")).is_err());
        assert!(!Value::Integer(3).matches(&Value::Boolean(true)));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("PT30M"), Some(Duration::minutes(30)));
        assert_eq!(parse_duration("P1D"), Some(Duration::days(1)));
        assert_eq!(parse_duration("P1W"), Some(Duration::days(7)));
        assert_eq!(
            parse_duration("P1Y"),
            Some(Duration::milliseconds((365.25 * 86_400_000.0) as i64))
        );
        assert_eq!(parse_duration("-PT1S"), Some(Duration::seconds(-1)));
        assert_eq!(parse_duration("P"), None);
        assert_eq!(parse_duration("1 hour"), None);
    }

    #[test]
    fn test_parse_duration_out_of_range() {
        assert_eq!(parse_duration("P99999999999999999999999Y"), None);
        assert_eq!(parse_duration("-P99999999999999999999999Y"), None);

        // Out of range literals are a mismatch, not a panic
        let huge = Value::from("-P99999999999999999999999Y");
        assert!(huge.coerce(&DataType::Duration).is_err());
    }

    #[test]
    fn test_coerce_decimal_to_integer_range() {
        assert_eq!(Value::Decimal(42.0).coerce(&DataType::Integer), Ok(Value::Integer(42)));
        assert!(Value::Decimal(1e30).coerce(&DataType::Integer).is_err());
        assert!(Value::Decimal(-1e30).coerce(&DataType::Integer).is_err());
        assert!(Value::Decimal(2.5).coerce(&DataType::Integer).is_err());
    }

    #[test]
    fn test_value_objects() {
        let json = serde_json::json!({"@value": "2", "@type": "xsd:integer"});
        assert_eq!(Value::from_json(&json), Some(Value::Integer(2)));

        let json = serde_json::json!(["a", "b"]);
        assert_eq!(
            Value::from_json(&json),
            Some(Value::from(vec!["a", "b"]))
        );

        assert_eq!(Value::from_json(&serde_json::Value::Null), None);

        // Null members are not dropped silently
        let json = serde_json::json!([null, "x"]);
        assert_eq!(Value::from_json(&json), None);
    }
}
