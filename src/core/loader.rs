// src/core/loader.rs

//! # Settings Loader
//!
//! Glue between the filesystem and the resolution engine: reads candidate
//! settings documents, trims them to the `[tool.settings]` namespace, and
//! runs a resolution pass per document. Load and parse failures are
//! deliberately non-fatal here — a missing or malformed document resolves to
//! an empty map with a diagnostic, and the host keeps its defaults.

use crate::constants::{ACTIVE_PROFILE_VAR, NAMESPACE_KEYS, SETTINGS_FILES};
use crate::core::resolver::{Resolution, Resolver};
use crate::models::{Diagnostic, DiagnosticKind, SettingsMap};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Reads the active profile from the `ENVIRONMENT` process variable.
/// An empty value counts as unset.
pub fn active_profile() -> Option<String> {
    std::env::var(ACTIVE_PROFILE_VAR)
        .ok()
        .filter(|name| !name.is_empty())
}

/// Resolves a single settings document.
///
/// A document that cannot be read or parsed contributes nothing beyond a
/// diagnostic; only resolution itself (directive misuse, coercion failure)
/// errors out.
pub fn resolve_file(path: &Path, profile: Option<&str>, seed: SettingsMap) -> Result<Resolution> {
    let mut diagnostics = Vec::new();
    let root = read_document(path, &mut diagnostics);

    let mut resolver = Resolver::new(path, profile, seed);
    resolver
        .resolve_table(&root)
        .with_context(|| format!("Failed to resolve settings document '{}'", path.display()))?;

    let resolution = resolver.finish();
    diagnostics.extend(resolution.diagnostics);
    Ok(Resolution {
        settings: resolution.settings,
        diagnostics,
    })
}

/// Resolves every candidate settings file found in `base_dir`
/// (`pyproject.toml`, then `settings.toml`). Each document is resolved with
/// the accumulated map as its seed, so later files override earlier ones and
/// may reference their keys.
pub fn load_settings(
    base_dir: &Path,
    profile: Option<&str>,
    seed: SettingsMap,
) -> Result<Resolution> {
    let mut settings = seed;
    let mut diagnostics = Vec::new();

    for file_name in SETTINGS_FILES {
        let path = base_dir.join(file_name);
        if !path.exists() {
            continue;
        }
        let resolution = resolve_file(&path, profile, settings.clone())?;
        settings = resolution.settings;
        diagnostics.extend(resolution.diagnostics);
    }

    Ok(Resolution {
        settings,
        diagnostics,
    })
}

/// Loads and parses one document, trimmed to the settings namespace.
/// Both failure modes degrade to an empty root, with one diagnostic each.
fn read_document(path: &Path, diagnostics: &mut Vec<Diagnostic>) -> toml::Table {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(source) => {
            log::warn!("Cannot find file at: {}", path.display());
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DocumentNotFound,
                format!("Cannot read settings file '{}': {}", path.display(), source),
            ));
            return toml::Table::new();
        }
    };

    let document: toml::Table = match toml::from_str(&text) {
        Ok(document) => document,
        Err(source) => {
            log::error!("Cannot parse TOML at: {}", path.display());
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DocumentParse,
                format!("Cannot parse TOML at '{}': {}", path.display(), source),
            ));
            return toml::Table::new();
        }
    };

    extract_namespace(&document)
}

/// Descends into `[tool.settings]`; anything else in the document belongs to
/// other tools and is ignored. A missing namespace is an empty root, not an
/// error.
fn extract_namespace(document: &toml::Table) -> toml::Table {
    let mut current = document;
    for key in NAMESPACE_KEYS {
        match current.get(key).and_then(toml::Value::as_table) {
            Some(inner) => current = inner,
            None => return toml::Table::new(),
        }
    }
    current.clone()
}

// MARK: --- UNIT TESTS ---
