//! Layered TOML settings resolution: directives (`$env`, `$path`, `$value`,
//! `$insert`, `$none`, `$type`), `${NAME}` variable interpolation, and typed
//! coercion, applied over base / apps / active-environment sections in a
//! single document-ordered pass.

pub mod constants;
pub mod core;
pub mod models;

pub use crate::core::coerce::{CoerceError, coerce};
pub use crate::core::directives::MarkerSpec;
pub use crate::core::loader::{active_profile, load_settings, resolve_file};
pub use crate::core::resolver::{Resolution, ResolveError, Resolver};
pub use crate::models::{Diagnostic, DiagnosticKind, OpaqueRef, SettingsMap, Value};
