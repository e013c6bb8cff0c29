// src/core/directives.rs

//! Directive matching and application.
//!
//! A directive is a table-shaped raw value carrying one marker key (`$env`,
//! `$path`, `$value`, `$insert`, `$none`) that selects a built-in operation
//! instead of being stored as a literal nested table. The `$type` marker is
//! not a primary directive; the resolver applies it after the primary pass.

use crate::constants::{
    DEFAULT_MARKER, DEFAULT_SPECIAL_PREFIX, DEFAULT_SPECIAL_SUFFIX, ENV_MARKER, INDEX_MARKER,
    INSERT_MARKER, NONE_MARKER, PATH_MARKER, SPECIAL_PREFIX_KEY, SPECIAL_SUFFIX_KEY, VALUE_MARKER,
};
use crate::core::paths;
use crate::core::resolver::ResolveError;
use crate::models::{Diagnostic, DiagnosticKind, SettingsMap, Value, raw_truthy};
use std::path::Path;

/// How marker keys are spelled: `prefix + name + suffix`.
///
/// The prefix and suffix are themselves ordinary settings
/// (`TOML_SETTINGS_SPECIAL_PREFIX` / `TOML_SETTINGS_SPECIAL_SUFFIX`), so the
/// spec must be re-read from the cumulative map for every key it qualifies:
/// assigning them mid-document changes the spelling for all later keys.
#[derive(Debug, Clone)]
pub struct MarkerSpec {
    prefix: String,
    suffix: String,
}

impl MarkerSpec {
    /// Reads the marker spelling currently in effect.
    pub fn current(settings: &SettingsMap) -> Self {
        Self {
            prefix: spec_part(settings, SPECIAL_PREFIX_KEY, DEFAULT_SPECIAL_PREFIX),
            suffix: spec_part(settings, SPECIAL_SUFFIX_KEY, DEFAULT_SPECIAL_SUFFIX),
        }
    }

    /// Fully-qualified marker key for an operation name, e.g. `env` -> `$env`.
    pub fn marker(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, name, self.suffix)
    }
}

fn spec_part(settings: &SettingsMap, key: &str, default: &str) -> String {
    match settings.get(key) {
        None => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Mutable state a directive may touch while it runs: the in-progress
/// settings map (read for env defaults, mutated by `insert`), the diagnostic
/// sink, and the location of the source document (base for `path`).
pub(crate) struct EvalContext<'a> {
    pub settings: &'a mut SettingsMap,
    pub diagnostics: &'a mut Vec<Diagnostic>,
    pub source: &'a Path,
}

/// A matched primary directive, borrowed from the raw table it came from.
#[derive(Debug)]
pub(crate) enum Directive<'a> {
    Env {
        variable: &'a str,
        default: Option<&'a toml::Value>,
    },
    Path {
        file_name: &'a str,
    },
    Literal {
        raw: &'a toml::Value,
    },
    Insert {
        item: &'a toml::Value,
        index: Option<i64>,
    },
    Null,
}

/// Scans the table for primary directive markers in fixed priority order
/// (env, path, value, insert, none) and parses the first match. A `none`
/// marker with a falsy value does not match; malformed marker payloads are
/// fatal.
pub(crate) fn match_primary<'a>(
    table: &'a toml::Table,
    spec: &MarkerSpec,
) -> Result<Option<Directive<'a>>, ResolveError> {
    if let Some(raw) = table.get(&spec.marker(ENV_MARKER)) {
        let variable = raw.as_str().ok_or_else(|| ResolveError::InvalidDirective {
            marker: ENV_MARKER,
            reason: format!("expected a string variable name, found {}", raw.type_str()),
        })?;
        return Ok(Some(Directive::Env {
            variable,
            default: table.get(&spec.marker(DEFAULT_MARKER)),
        }));
    }

    if let Some(raw) = table.get(&spec.marker(PATH_MARKER)) {
        let file_name = raw.as_str().ok_or_else(|| ResolveError::InvalidDirective {
            marker: PATH_MARKER,
            reason: format!("expected a path string, found {}", raw.type_str()),
        })?;
        return Ok(Some(Directive::Path { file_name }));
    }

    if let Some(raw) = table.get(&spec.marker(VALUE_MARKER)) {
        return Ok(Some(Directive::Literal { raw }));
    }

    if let Some(item) = table.get(&spec.marker(INSERT_MARKER)) {
        let index = match table.get(&spec.marker(INDEX_MARKER)) {
            None => None,
            Some(raw) => Some(raw.as_integer().ok_or_else(|| {
                ResolveError::InvalidDirective {
                    marker: INSERT_MARKER,
                    reason: format!("'index' must be an integer, found {}", raw.type_str()),
                }
            })?),
        };
        return Ok(Some(Directive::Insert { item, index }));
    }

    if let Some(raw) = table.get(&spec.marker(NONE_MARKER)) {
        if raw_truthy(raw) {
            return Ok(Some(Directive::Null));
        }
    }

    Ok(None)
}

impl Directive<'_> {
    /// Resolves the directive to a concrete value. `key` is the setting being
    /// assigned (the `insert` target).
    pub(crate) fn apply(
        self,
        key: &str,
        ctx: &mut EvalContext<'_>,
    ) -> Result<Value, ResolveError> {
        match self {
            Self::Env { variable, default } => Ok(resolve_env(variable, default, ctx)),
            Self::Path { file_name } => Ok(Value::Path(paths::resolve_relative_to_source(
                ctx.source, file_name,
            ))),
            Self::Literal { raw } => Ok(Value::from_raw(raw)),
            Self::Insert { item, index } => insert_into_existing(key, item, index, ctx),
            Self::Null => Ok(Value::None),
        }
    }
}

fn resolve_env(
    variable: &str,
    default: Option<&toml::Value>,
    ctx: &mut EvalContext<'_>,
) -> Value {
    match std::env::var(variable) {
        Ok(found) => Value::String(found),
        Err(_) => match default {
            Some(raw) => Value::from_raw(raw),
            None => {
                log::warn!("Environment variable '{}' is not set.", variable);
                ctx.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::MissingEnvVar,
                    format!("Environment variable '{}' is not set and no default was given.", variable),
                ));
                Value::None
            }
        },
    }
}

/// Inserts the literal item into the list already stored at `key`. An absent
/// value counts as an empty list; any other kind is fatal. Index semantics
/// match `list.insert`: negative counts from the end, out-of-range clamps.
fn insert_into_existing(
    key: &str,
    item: &toml::Value,
    index: Option<i64>,
    ctx: &mut EvalContext<'_>,
) -> Result<Value, ResolveError> {
    let item_value = Value::from_raw(item);

    let items = match ctx.settings.get_mut(key) {
        None => return Ok(Value::List(vec![item_value])),
        Some(Value::List(items)) => items,
        Some(other) => {
            return Err(ResolveError::InsertIntoNonList {
                key: key.to_string(),
                actual: other.type_name(),
            });
        }
    };

    let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
    let requested = index.unwrap_or(len);
    let clamped = if requested < 0 {
        (len + requested).max(0)
    } else {
        requested.min(len)
    };
    let position = usize::try_from(clamped).unwrap_or(0);

    items.insert(position, item_value);
    Ok(Value::List(items.clone()))
}

// MARK: --- UNIT TESTS ---
