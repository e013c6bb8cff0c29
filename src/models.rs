// src/models.rs

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// The cumulative settings map: resolved key/value pairs in insertion order.
/// It is both the output of a resolution pass and the read-context for
/// variable substitution and `insert` directives during that same pass.
pub type SettingsMap = IndexMap<String, Value>;

// --- RESOLVED VALUES ---

/// A fully resolved setting value.
///
/// Raw TOML values (`toml::Value`) are the *input* of the evaluator; `Value`
/// is what ends up in the settings map after directives, substitution, and
/// coercion have run.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null (`$none` directive, or a missing env var without default).
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// Fixed-point decimal, produced only by the `decimal` coercion target.
    Decimal(Decimal),
    String(String),
    /// Filesystem path (`$path` directive, `path` coercion, or path-promoting
    /// variable substitution).
    Path(PathBuf),
    /// Canonical instant. Local TOML datetimes are normalized assuming UTC.
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    Duration(Duration),
    Url(Url),
    List(Vec<Value>),
    Table(SettingsMap),
    /// Host-supplied reference carried by identity, never introspected.
    Opaque(OpaqueRef),
}

impl Value {
    /// Converts a raw TOML value into a resolved value *literally*: no
    /// directive evaluation, no variable substitution. Datetimes are
    /// normalized; arrays and tables convert recursively.
    pub fn from_raw(raw: &toml::Value) -> Self {
        match raw {
            toml::Value::String(s) => Self::String(s.clone()),
            toml::Value::Integer(i) => Self::Integer(*i),
            toml::Value::Float(f) => Self::Float(*f),
            toml::Value::Boolean(b) => Self::Bool(*b),
            toml::Value::Datetime(dt) => Self::from_datetime(dt),
            toml::Value::Array(items) => Self::List(items.iter().map(Self::from_raw).collect()),
            toml::Value::Table(table) => Self::Table(
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_raw(v)))
                    .collect(),
            ),
        }
    }

    /// Normalizes a TOML datetime into a single canonical representation by
    /// re-parsing its ISO-8601 text through chrono, so that every datetime in
    /// the settings map has the same shape regardless of how the source
    /// parser modeled it.
    pub fn from_datetime(dt: &toml::value::Datetime) -> Self {
        let text = dt.to_string().replace(' ', "T");

        if dt.date.is_some() && dt.time.is_some() {
            if dt.offset.is_some() {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(&text) {
                    return Self::DateTime(parsed);
                }
            } else if let Ok(parsed) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
            {
                return Self::DateTime(parsed.and_utc().fixed_offset());
            }
        } else if dt.date.is_some() {
            if let Ok(parsed) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
                return Self::Date(parsed);
            }
        } else if let Ok(parsed) = NaiveTime::parse_from_str(&text, "%H:%M:%S%.f") {
            return Self::Time(parsed);
        }

        // A datetime the calendar-aware parser rejects (e.g. a leap second)
        // survives as its literal text rather than aborting resolution.
        Self::String(text)
    }

    /// Stable name of this value's kind, used in error messages and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "str",
            Self::Path(_) => "path",
            Self::DateTime(_) => "datetime",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Duration(_) => "duration",
            Self::Url(_) => "url",
            Self::List(_) => "list",
            Self::Table(_) => "table",
            Self::Opaque(_) => "opaque",
        }
    }
}

impl fmt::Display for Value {
    /// The textual form used by `str` coercion and by textual variable
    /// substitution.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::String(s) => write!(f, "{}", s),
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::Date(d) => write!(f, "{}", d),
            Self::Time(t) => write!(f, "{}", t),
            Self::Duration(d) => write!(f, "{}s", d.as_secs_f64()),
            Self::Url(u) => write!(f, "{}", u),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Table(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", key, value)?;
                }
                write!(f, "}}")
            }
            Self::Opaque(o) => write!(f, "{}", o.label()),
        }
    }
}

impl Serialize for Value {
    /// Settings maps are handed back to a host application; this lets the
    /// caller persist them with any serde format. Opaque references
    /// serialize as their label, null as a unit.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Decimal(d) => serializer.serialize_str(&d.to_string()),
            Self::String(s) => serializer.serialize_str(s),
            Self::Path(p) => serializer.serialize_str(&p.display().to_string()),
            Self::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Self::Date(d) => serializer.serialize_str(&d.to_string()),
            Self::Time(t) => serializer.serialize_str(&t.to_string()),
            Self::Duration(d) => serializer.serialize_f64(d.as_secs_f64()),
            Self::Url(u) => serializer.serialize_str(u.as_str()),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Table(map) => {
                let mut entries = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    entries.serialize_entry(key, value)?;
                }
                entries.end()
            }
            Self::Opaque(o) => serializer.serialize_str(o.label()),
        }
    }
}

/// Truthiness of a *raw* TOML value, matching the conventions the `none`
/// directive relies on: false, zero, empty strings and empty collections are
/// falsy; datetimes are always truthy.
pub(crate) fn raw_truthy(raw: &toml::Value) -> bool {
    match raw {
        toml::Value::Boolean(b) => *b,
        toml::Value::Integer(i) => *i != 0,
        toml::Value::Float(f) => *f != 0.0,
        toml::Value::String(s) => !s.is_empty(),
        toml::Value::Array(items) => !items.is_empty(),
        toml::Value::Table(table) => !table.is_empty(),
        toml::Value::Datetime(_) => true,
    }
}

// --- OPAQUE REFERENCES ---

/// An opaque, identity-compared handle to something owned by the host
/// application (typically a callable). The engine only stores it, substitutes
/// it by reference, and stringifies it as its label.
#[derive(Clone)]
pub struct OpaqueRef {
    label: String,
    handle: Arc<dyn Any + Send + Sync>,
}

impl OpaqueRef {
    pub fn new(label: impl Into<String>, handle: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            label: label.into(),
            handle,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Two references are the same iff they point at the same host object.
    pub fn same_identity(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }
}

impl PartialEq for OpaqueRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueRef")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

// --- DIAGNOSTICS ---

/// Classification of a recoverable resolution problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// The settings document does not exist or could not be read.
    DocumentNotFound,
    /// The settings document is not valid TOML.
    DocumentParse,
    /// A `${NAME}` token referenced a key not yet in the settings map.
    MissingSubstitution,
    /// An `env` directive named an unset variable and carried no default.
    MissingEnvVar,
}

/// A recoverable problem recorded during resolution. Fatal conditions are
/// `ResolveError`s instead; diagnostics never abort a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str) -> toml::Value {
        let table: toml::Table = toml::from_str(text).unwrap();
        table.get("v").unwrap().clone()
    }

    #[test]
    fn test_from_raw_scalars() {
        assert_eq!(Value::from_raw(&raw("v = 3")), Value::Integer(3));
        assert_eq!(Value::from_raw(&raw("v = 1.5")), Value::Float(1.5));
        assert_eq!(Value::from_raw(&raw("v = true")), Value::Bool(true));
        assert_eq!(
            Value::from_raw(&raw("v = 'x'")),
            Value::String("x".to_string())
        );
    }

    #[test]
    fn test_from_raw_datetime_is_normalized() {
        let value = Value::from_raw(&raw("v = 1979-05-27T07:32:00Z"));
        match value {
            Value::DateTime(dt) => assert_eq!(dt.to_rfc3339(), "1979-05-27T07:32:00+00:00"),
            other => panic!("expected datetime, got {:?}", other),
        }
    }

    #[test]
    fn test_from_raw_local_date_and_time() {
        assert!(matches!(
            Value::from_raw(&raw("v = 1979-05-27")),
            Value::Date(_)
        ));
        assert!(matches!(
            Value::from_raw(&raw("v = 07:32:00")),
            Value::Time(_)
        ));
        // Local datetime gets an assumed UTC offset.
        match Value::from_raw(&raw("v = 1979-05-27T07:32:00")) {
            Value::DateTime(dt) => assert_eq!(dt.offset().local_minus_utc(), 0),
            other => panic!("expected datetime, got {:?}", other),
        }
    }

    #[test]
    fn test_from_raw_nested_table() {
        let value = Value::from_raw(&raw("v = { a = 1, b = [true, 'x'] }"));
        let Value::Table(map) = value else {
            panic!("expected table");
        };
        assert_eq!(map.get("a"), Some(&Value::Integer(1)));
        assert_eq!(
            map.get("b"),
            Some(&Value::List(vec![
                Value::Bool(true),
                Value::String("x".to_string())
            ]))
        );
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Value::None.to_string(), "none");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(
            Value::List(vec![Value::Integer(1), Value::String("a".to_string())]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn test_raw_truthiness() {
        assert!(!raw_truthy(&raw("v = false")));
        assert!(!raw_truthy(&raw("v = 0")));
        assert!(!raw_truthy(&raw("v = ''")));
        assert!(!raw_truthy(&raw("v = []")));
        assert!(raw_truthy(&raw("v = 1")));
        assert!(raw_truthy(&raw("v = 'x'")));
        assert!(raw_truthy(&raw("v = 1979-05-27")));
    }

    #[test]
    fn test_opaque_identity() {
        let shared: Arc<dyn Any + Send + Sync> = Arc::new(());
        let a = OpaqueRef::new("handler", shared.clone());
        let b = OpaqueRef::new("other_label", shared);
        let c = OpaqueRef::new("handler", Arc::new(()));

        assert_eq!(a, b); // same host object, labels do not matter
        assert_ne!(a, c);
    }
}
