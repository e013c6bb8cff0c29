// src/core/resolver.rs

//! The resolution engine: walks a raw settings document section by section,
//! evaluates every key/value pair (directives, substitution, coercion), and
//! folds the results into one cumulative settings map.
//!
//! Sections apply in a strict total order, later assignments overwriting
//! earlier ones:
//! 1. the base section (all root keys outside the two collections),
//! 2. every subgroup of `apps`, in document order, unconditionally,
//! 3. the single subgroup of `environments` whose name equals the active
//!    profile, if any.

use crate::constants::{APPS_TABLE_KEY, ENVIRONMENTS_TABLE_KEY, TYPE_MARKER};
use crate::core::coerce::{self, CoerceError};
use crate::core::directives::{self, EvalContext, MarkerSpec};
use crate::core::interpolator;
use crate::models::{Diagnostic, SettingsMap, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal resolution failures. Recoverable problems are recorded as
/// [`Diagnostic`]s instead and never abort a pass.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("'insert' cannot be used for key '{key}': existing value has type '{actual}', expected a list.")]
    InsertIntoNonList { key: String, actual: &'static str },
    #[error("Invalid '{marker}' directive: {reason}")]
    InvalidDirective {
        marker: &'static str,
        reason: String,
    },
    #[error("Type specifier for key '{key}' must be a string, found {actual}.")]
    TypeSpecifierNotString {
        key: String,
        actual: &'static str,
    },
    #[error(transparent)]
    Coerce(#[from] CoerceError),
}

/// The outcome of one resolution pass: the settings map (ownership passes to
/// the caller) plus every recoverable diagnostic recorded along the way.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub settings: SettingsMap,
    pub diagnostics: Vec<Diagnostic>,
}

/// One single-threaded resolution pass over a settings document.
///
/// The resolver owns the cumulative map for the duration of the pass;
/// directive handlers and the interpolator receive explicit access to it, so
/// later keys can observe (and `insert` can mutate) what earlier keys
/// produced.
#[derive(Debug)]
pub struct Resolver {
    settings: SettingsMap,
    diagnostics: Vec<Diagnostic>,
    source: PathBuf,
    profile: Option<String>,
}

impl Resolver {
    /// `source` is where the document lives (base for `$path` resolution),
    /// `profile` the externally supplied active-profile name, and `seed` a
    /// caller-supplied starting map (host defaults, opaque references, ...).
    pub fn new(source: impl Into<PathBuf>, profile: Option<&str>, seed: SettingsMap) -> Self {
        Self {
            settings: seed,
            diagnostics: Vec::new(),
            source: source.into(),
            profile: profile.map(str::to_string),
        }
    }

    /// Resolves a full document root (already trimmed to the settings
    /// namespace) into the cumulative map.
    pub fn resolve_table(&mut self, root: &toml::Table) -> Result<(), ResolveError> {
        for (key, raw) in root {
            if key == APPS_TABLE_KEY || key == ENVIRONMENTS_TABLE_KEY {
                continue;
            }
            self.assign(key, raw, "base")?;
        }

        if let Some(collection) = root.get(APPS_TABLE_KEY) {
            let Some(groups) = collection.as_table() else {
                log::warn!("'{}' is not a table; skipping.", APPS_TABLE_KEY);
                return self.resolve_profile_section(root);
            };
            for (group_name, group_raw) in groups {
                let Some(group) = group_raw.as_table() else {
                    log::warn!(
                        "'{}.{}' is not a table; skipping.",
                        APPS_TABLE_KEY,
                        group_name
                    );
                    continue;
                };
                let section = format!("{}.{}", APPS_TABLE_KEY, group_name);
                for (key, raw) in group {
                    self.assign(key, raw, &section)?;
                }
            }
        }

        self.resolve_profile_section(root)
    }

    /// Applies the one `environments` subgroup matching the active profile.
    /// Every other subgroup is skipped entirely, as is everything when no
    /// profile is set or no subgroup matches.
    fn resolve_profile_section(&mut self, root: &toml::Table) -> Result<(), ResolveError> {
        let Some(profile) = self.profile.clone() else {
            return Ok(());
        };
        let Some(groups) = root
            .get(ENVIRONMENTS_TABLE_KEY)
            .and_then(toml::Value::as_table)
        else {
            return Ok(());
        };
        let Some(group_raw) = groups.get(&profile) else {
            return Ok(());
        };
        let Some(group) = group_raw.as_table() else {
            log::warn!(
                "'{}.{}' is not a table; skipping.",
                ENVIRONMENTS_TABLE_KEY,
                profile
            );
            return Ok(());
        };

        let section = format!("{}.{}", ENVIRONMENTS_TABLE_KEY, profile);
        for (key, raw) in group {
            self.assign(key, raw, &section)?;
        }
        Ok(())
    }

    fn assign(&mut self, key: &str, raw: &toml::Value, section: &str) -> Result<(), ResolveError> {
        log::debug!("[{}]: update '{}'", section, key);
        let value = self.evaluate(key, raw)?;
        self.settings.insert(key.to_string(), value);
        Ok(())
    }

    /// The key-value evaluator: dispatches one raw value by kind.
    ///
    /// Tables go through the directive scan; strings through variable
    /// substitution; datetimes are normalized; everything else passes through
    /// literally. Sequences are *not* directive-evaluated element-wise.
    pub(crate) fn evaluate(
        &mut self,
        key: &str,
        raw: &toml::Value,
    ) -> Result<Value, ResolveError> {
        match raw {
            toml::Value::Table(table) => {
                // The marker spelling is re-read per key: the prefix/suffix
                // settings may have been assigned earlier in this same pass.
                let spec = MarkerSpec::current(&self.settings);
                let primary = directives::match_primary(table, &spec)?;

                let mut resolved = match primary {
                    Some(directive) => {
                        let mut ctx = EvalContext {
                            settings: &mut self.settings,
                            diagnostics: &mut self.diagnostics,
                            source: &self.source,
                        };
                        directive.apply(key, &mut ctx)?
                    }
                    // No primary directive: a literal nested table. Marker
                    // keys are kept as-is; nested datetimes still normalize.
                    None => Value::from_raw(raw),
                };

                // `$type` composes last, on whatever the primary pass (or the
                // literal fallback) produced.
                if let Some(type_raw) = table.get(&spec.marker(TYPE_MARKER)) {
                    let target =
                        type_raw
                            .as_str()
                            .ok_or_else(|| ResolveError::TypeSpecifierNotString {
                                key: key.to_string(),
                                actual: type_raw.type_str(),
                            })?;
                    resolved = coerce::coerce(&resolved, target)?;
                }

                Ok(resolved)
            }
            toml::Value::String(s) => Ok(interpolator::substitute(
                s,
                &self.settings,
                &mut self.diagnostics,
            )),
            toml::Value::Datetime(dt) => Ok(Value::from_datetime(dt)),
            other => Ok(Value::from_raw(other)),
        }
    }

    pub fn settings(&self) -> &SettingsMap {
        &self.settings
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Ends the pass, handing the cumulative map (and diagnostics) to the
    /// caller.
    pub fn finish(self) -> Resolution {
        Resolution {
            settings: self.settings,
            diagnostics: self.diagnostics,
        }
    }
}

// MARK: --- UNIT TESTS ---
