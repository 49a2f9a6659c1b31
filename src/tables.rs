//! Reference tables
//!
//! The vocabulary the generators emit into: which platforms exist and how
//! each abstract default token (`true`, `false`, `debug`, ...) is spelled in
//! generated code. Tables are owned by value and never mutated after the
//! compiler is constructed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CompilerError, Result};

/// Token a rollout resolves to when the experiment has requirements
pub const DEBUG_TOKEN: &str = "debug";

/// Platform covered by the trailing `#else` arm of every platform chain
pub const FALLBACK_PLATFORM: &str = "posix";

/// Default expression that must be backed by a debug/release constant
pub const DEBUG_ONLY_SENTINEL: &str = "kDefaultForDebugOnly";

/// Placeholder replaced by the macro name in `final_define` templates
pub const MACRO_PLACEHOLDER: &str = "%s";

/// Lookup tables supplied to the compiler at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTables {
    /// Default token -> expression used in the metadata table
    #[serde(default = "default_defaults")]
    pub defaults: BTreeMap<String, String>,

    /// Platform name -> preprocessor guard
    #[serde(default = "default_platforms_define")]
    pub platforms_define: BTreeMap<String, String>,

    /// Default token -> accessor body for final builds
    #[serde(default = "default_final_return")]
    pub final_return: BTreeMap<String, String>,

    /// Default token -> `GRPC_EXPERIMENT_IS_INCLUDED_*` template for final builds
    #[serde(default = "default_final_define")]
    pub final_define: BTreeMap<String, String>,

    /// Default token -> list name in the generated bzl dictionary
    #[serde(default = "default_bzl_list_for_defaults")]
    pub bzl_list_for_defaults: BTreeMap<String, String>,
}

fn table(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_defaults() -> BTreeMap<String, String> {
    table(&[
        ("broken", "false"),
        ("false", "false"),
        ("true", "true"),
        (DEBUG_TOKEN, DEBUG_ONLY_SENTINEL),
    ])
}

fn default_platforms_define() -> BTreeMap<String, String> {
    table(&[
        ("windows", "GPR_WINDOWS"),
        ("ios", "GRPC_CFSTREAM"),
        (FALLBACK_PLATFORM, ""),
    ])
}

fn default_final_return() -> BTreeMap<String, String> {
    table(&[
        ("broken", "return false;"),
        ("false", "return false;"),
        ("true", "return true;"),
        (
            DEBUG_TOKEN,
            "\n#ifdef NDEBUG\nreturn false;\n#else\nreturn true;\n#endif\n",
        ),
    ])
}

fn default_final_define() -> BTreeMap<String, String> {
    table(&[
        ("broken", ""),
        ("false", ""),
        ("true", "#define %s"),
        (DEBUG_TOKEN, "#ifndef NDEBUG\n#define %s\n#endif"),
    ])
}

fn default_bzl_list_for_defaults() -> BTreeMap<String, String> {
    table(&[
        ("broken", ""),
        ("false", "off"),
        ("true", "on"),
        (DEBUG_TOKEN, "dbg"),
    ])
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self {
            defaults: default_defaults(),
            platforms_define: default_platforms_define(),
            final_return: default_final_return(),
            final_define: default_final_define(),
            bzl_list_for_defaults: default_bzl_list_for_defaults(),
        }
    }
}

impl ReferenceTables {
    /// Metadata-table expression for a default token
    pub fn default_expr(&self, token: &str) -> Result<&str> {
        lookup(&self.defaults, token, "defaults")
    }

    /// Accessor body for a default token in final builds
    pub fn final_return(&self, token: &str) -> Result<&str> {
        lookup(&self.final_return, token, "final_return")
    }

    /// Render the inclusion macro for a token, or `None` if the token never
    /// includes the experiment.
    pub fn final_define(&self, token: &str, macro_name: &str) -> Result<Option<String>> {
        let template = lookup(&self.final_define, token, "final_define")?;
        if template.is_empty() {
            return Ok(None);
        }
        if template.contains(MACRO_PLACEHOLDER) {
            Ok(Some(template.replace(MACRO_PLACEHOLDER, macro_name)))
        } else {
            Ok(Some(format!("{}{}", template, macro_name)))
        }
    }

    /// Platforms that get their own `#if defined(...)` arm, in table order
    pub fn guarded_platforms(&self) -> impl Iterator<Item = (&str, &str)> {
        self.platforms_define
            .iter()
            .filter(|(name, _)| name.as_str() != FALLBACK_PLATFORM)
            .map(|(name, guard)| (name.as_str(), guard.as_str()))
    }

    /// All platform names, in table order
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.platforms_define.keys().map(String::as_str)
    }
}

fn lookup<'a>(
    table: &'a BTreeMap<String, String>,
    token: &str,
    name: &'static str,
) -> Result<&'a str> {
    table
        .get(token)
        .map(String::as_str)
        .ok_or_else(|| CompilerError::UnknownDefault {
            token: token.to_string(),
            table: name,
        })
}
