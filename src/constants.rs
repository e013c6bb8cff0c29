// src/constants.rs

/// Candidate settings files, probed in order inside the caller's base directory.
pub const SETTINGS_FILES: [&str; 2] = ["pyproject.toml", "settings.toml"];

/// Namespace inside a settings document that belongs to this crate
/// (`[tool.settings]`); everything outside it is ignored.
pub const NAMESPACE_KEYS: [&str; 2] = ["tool", "settings"];

/// Environment variable naming the active profile.
pub const ACTIVE_PROFILE_VAR: &str = "ENVIRONMENT";

/// Collection of unconditionally applied subgroups.
pub const APPS_TABLE_KEY: &str = "apps";

/// Collection of profile-gated subgroups; only the subgroup matching the
/// active profile applies.
pub const ENVIRONMENTS_TABLE_KEY: &str = "environments";

/// Settings keys controlling how directive marker keys are spelled.
/// They are ordinary settings: assigning them only affects keys evaluated later.
pub const SPECIAL_PREFIX_KEY: &str = "TOML_SETTINGS_SPECIAL_PREFIX";
pub const SPECIAL_SUFFIX_KEY: &str = "TOML_SETTINGS_SPECIAL_SUFFIX";

/// Default marker spelling: `$env`, `$path`, ...
pub const DEFAULT_SPECIAL_PREFIX: &str = "$";
pub const DEFAULT_SPECIAL_SUFFIX: &str = "";

// Directive marker names (unqualified; prefix/suffix are applied at match time).
pub const ENV_MARKER: &str = "env";
pub const PATH_MARKER: &str = "path";
pub const VALUE_MARKER: &str = "value";
pub const INSERT_MARKER: &str = "insert";
pub const NONE_MARKER: &str = "none";
pub const TYPE_MARKER: &str = "type";
pub const DEFAULT_MARKER: &str = "default";
pub const INDEX_MARKER: &str = "index";
