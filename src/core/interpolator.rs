// src/core/interpolator.rs

//! `${NAME}` variable substitution inside string scalars.
//!
//! Tokens are resolved left-to-right in a single pass against the cumulative
//! settings map; replaced text is never re-scanned, and there is no
//! fixed-point iteration. A token may *promote* the result to a non-string
//! kind depending on what the referenced setting holds.

use crate::models::{Diagnostic, DiagnosticKind, SettingsMap, Value};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::PathBuf;

lazy_static! {
    static ref VARIABLE_RE: Regex = Regex::new(r"\$\{(\w+)\}").unwrap();
}

/// Substitutes every `${NAME}` token in `input`.
///
/// Promotion rules, per token, decided by the referenced value's kind:
/// - path: textual concatenation, then the whole result re-derives as a path;
/// - opaque reference, list, table, datetime/date/time: the referenced value
///   replaces the whole result, surrounding text is discarded;
/// - integer/float: textual concatenation, then an attempted re-parse of the
///   concatenated text back into that numeric kind;
/// - anything else: plain textual replacement.
///
/// A reference to a key that is not (yet) in the map is non-fatal: the token
/// text stays as-is and one diagnostic is recorded.
pub(crate) fn substitute(
    input: &str,
    settings: &SettingsMap,
    diagnostics: &mut Vec<Diagnostic>,
) -> Value {
    let mut text = input.to_string();
    let mut cursor = 0usize;

    while let Some((start, end, name)) = next_token(&text, cursor) {
        let Some(referenced) = settings.get(&name) else {
            log::warn!("Missing variable substitution {}", text);
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::MissingSubstitution,
                format!("No setting '{}' for substitution in '{}'.", name, input),
            ));
            cursor = end;
            continue;
        };

        match referenced {
            Value::Path(path) => {
                let spliced = splice(&text, start, end, &path.display().to_string());
                return Value::Path(PathBuf::from(spliced));
            }
            Value::Opaque(_)
            | Value::List(_)
            | Value::Table(_)
            | Value::DateTime(_)
            | Value::Date(_)
            | Value::Time(_) => return referenced.clone(),
            Value::Integer(_) => {
                let middle = referenced.to_string();
                text = splice(&text, start, end, &middle);
                if let Ok(reparsed) = text.parse::<i64>() {
                    return Value::Integer(reparsed);
                }
                cursor = start + middle.len();
            }
            Value::Float(_) => {
                let middle = referenced.to_string();
                text = splice(&text, start, end, &middle);
                if let Ok(reparsed) = text.parse::<f64>() {
                    return Value::Float(reparsed);
                }
                cursor = start + middle.len();
            }
            other => {
                let middle = other.to_string();
                text = splice(&text, start, end, &middle);
                cursor = start + middle.len();
            }
        }
    }

    Value::String(text)
}

/// Finds the next `${NAME}` token at or after `cursor`.
fn next_token(text: &str, cursor: usize) -> Option<(usize, usize, String)> {
    let caps = VARIABLE_RE.captures_at(text, cursor)?;
    let whole = caps.get(0)?;
    let name = caps.get(1)?.as_str().to_string();
    Some((whole.start(), whole.end(), name))
}

#[allow(clippy::indexing_slicing)]
fn splice(original: &str, start: usize, end: usize, middle: &str) -> String {
    format!("{}{}{}", &original[..start], middle, &original[end..])
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OpaqueRef;
    use chrono::DateTime;
    use std::sync::Arc;

    fn settings(entries: &[(&str, Value)]) -> SettingsMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_plain_text_passes_through() {
        let mut diags = Vec::new();
        let result = substitute("no tokens here", &SettingsMap::new(), &mut diags);
        assert_eq!(result, Value::String("no tokens here".to_string()));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_missing_reference_keeps_token_and_diagnoses() {
        let mut diags = Vec::new();
        let result = substitute("${MISSING}", &SettingsMap::new(), &mut diags);
        assert_eq!(result, Value::String("${MISSING}".to_string()));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.first().unwrap().kind, DiagnosticKind::MissingSubstitution);
    }

    #[test]
    fn test_string_reference_replaces_inline() {
        let map = settings(&[("NAME", Value::String("world".to_string()))]);
        let mut diags = Vec::new();
        let result = substitute("hello ${NAME}!", &map, &mut diags);
        assert_eq!(result, Value::String("hello world!".to_string()));
    }

    #[test]
    fn test_integer_concatenation_reparses() {
        let map = settings(&[("INT", Value::Integer(123))]);
        let mut diags = Vec::new();
        assert_eq!(
            substitute("${INT}4", &map, &mut diags),
            Value::Integer(1234)
        );
    }

    #[test]
    fn test_integer_in_text_stays_string() {
        let map = settings(&[("PORT", Value::Integer(8080))]);
        let mut diags = Vec::new();
        assert_eq!(
            substitute("localhost:${PORT}", &map, &mut diags),
            Value::String("localhost:8080".to_string())
        );
    }

    #[test]
    fn test_float_concatenation_reparses() {
        let map = settings(&[("F", Value::Float(1.5))]);
        let mut diags = Vec::new();
        assert_eq!(substitute("${F}2", &map, &mut diags), Value::Float(1.52));
    }

    #[test]
    fn test_path_reference_promotes_whole_result() {
        let map = settings(&[("ROOT", Value::Path(PathBuf::from("/srv/app")))]);
        let mut diags = Vec::new();
        assert_eq!(
            substitute("${ROOT}/static", &map, &mut diags),
            Value::Path(PathBuf::from("/srv/app/static"))
        );
    }

    #[test]
    fn test_collection_reference_discards_surrounding_text() {
        let list = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
        let map = settings(&[("HOSTS", list.clone())]);
        let mut diags = Vec::new();
        assert_eq!(substitute("ignored ${HOSTS} ignored", &map, &mut diags), list);
    }

    #[test]
    fn test_opaque_reference_substitutes_by_identity() {
        let opaque = OpaqueRef::new("handler", Arc::new(()));
        let map = settings(&[("FN", Value::Opaque(opaque.clone()))]);
        let mut diags = Vec::new();
        assert_eq!(substitute("${FN}", &map, &mut diags), Value::Opaque(opaque));
    }

    #[test]
    fn test_datetime_reference_becomes_whole_result() {
        let instant = DateTime::parse_from_rfc3339("2024-01-02T03:04:05+00:00").unwrap();
        let map = settings(&[("AT", Value::DateTime(instant))]);
        let mut diags = Vec::new();
        assert_eq!(
            substitute("${AT}", &map, &mut diags),
            Value::DateTime(instant)
        );
    }

    #[test]
    fn test_null_reference_substitutes_textually() {
        // Present-but-null is not "missing": it substitutes as text.
        let map = settings(&[("NOTHING", Value::None)]);
        let mut diags = Vec::new();
        assert_eq!(
            substitute("x${NOTHING}y", &map, &mut diags),
            Value::String("xnoney".to_string())
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_multiple_tokens_left_to_right() {
        let map = settings(&[
            ("A", Value::String("1".to_string())),
            ("B", Value::String("2".to_string())),
        ]);
        let mut diags = Vec::new();
        assert_eq!(
            substitute("${A}-${B}", &map, &mut diags),
            Value::String("1-2".to_string())
        );
    }

    #[test]
    fn test_replaced_text_is_not_rescanned() {
        // A substitution that *produces* token syntax must not recurse.
        let map = settings(&[
            ("A", Value::String("${B}".to_string())),
            ("B", Value::String("boom".to_string())),
        ]);
        let mut diags = Vec::new();
        assert_eq!(
            substitute("${A}", &map, &mut diags),
            Value::String("${B}".to_string())
        );
        assert!(diags.is_empty());
    }
}
