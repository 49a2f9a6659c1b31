//! Code Generation
//!
//! Renders the compiled experiment model into generated text.
//!
//! Architecture:
//! - Mode: the three supported output modes, parsed from their fixed names
//! - Dialect: the small descriptor in which output families differ
//!   (banner, include guard, namespace, production/test variant)
//! - OutputGenerator: the shared rendering core, parameterized by a Dialect
//!
//! Generators only append to the supplied buffer; writing files is the
//! compiler's job.

pub mod banner;
pub mod bzl;
pub mod header;
pub mod names;
pub mod source;
pub mod test_file;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compiler::ExperimentsCompiler;
use crate::error::{CompilerError, Result};
use crate::tables::{ReferenceTables, FALLBACK_PLATFORM};

// =============================================================================
// Mode
// =============================================================================

/// Output mode selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "grpc_google3")]
    Google3,
    #[serde(rename = "grpc_oss_production")]
    OssProduction,
    #[serde(rename = "grpc_oss_test")]
    OssTest,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Google3, Mode::OssProduction, Mode::OssTest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Google3 => "grpc_google3",
            Mode::OssProduction => "grpc_oss_production",
            Mode::OssTest => "grpc_oss_test",
        }
    }

    /// Rendering conventions for this mode
    pub fn dialect(&self) -> Dialect {
        match self {
            Mode::Google3 => Dialect::GOOGLE3,
            Mode::OssProduction => Dialect::oss(Variant::Production),
            Mode::OssTest => Dialect::oss(Variant::Test),
        }
    }
}

impl FromStr for Mode {
    type Err = CompilerError;

    fn from_str(s: &str) -> Result<Self> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| CompilerError::UnsupportedMode(s.to_string()))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Dialect
// =============================================================================

/// Which metadata table a mode-aware family links against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Production,
    Test,
}

/// Conventions that distinguish one output family from another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Tool named in the "Auto generated by" banner
    pub generator: &'static str,
    pub include_guard: &'static str,
    pub namespace: &'static str,
    /// Runtime support header included by the generated header
    pub config_include: &'static str,
    /// `None` for families that ignore production/test variants
    pub variant: Option<Variant>,
    /// Whether bzl output carries a copyright block
    pub bzl_copyright: bool,
}

impl Dialect {
    pub const GOOGLE3: Dialect = Dialect {
        generator: "tools/codegen/core/gen_experiments_grpc_google3.cc",
        include_guard: "GRPC_SRC_CORE_LIB_EXPERIMENTS_EXPERIMENTS_H",
        namespace: "grpc_core",
        config_include: "src/core/lib/experiments/config.h",
        variant: None,
        bzl_copyright: false,
    };

    pub const fn oss(variant: Variant) -> Dialect {
        Dialect {
            generator: "tools/codegen/core/gen_experiments_grpc_oss.cc",
            include_guard: "GRPC_SRC_CORE_LIB_EXPERIMENTS_EXPERIMENTS_H",
            namespace: "grpc_core",
            config_include: "src/core/lib/experiments/config.h",
            variant: Some(variant),
            bzl_copyright: true,
        }
    }

    /// Symbol of the metadata table defined by generated sources
    pub fn metadata_symbol(&self) -> &'static str {
        match self.variant {
            Some(Variant::Test) => "g_test_experiment_metadata",
            _ => "g_experiment_metadata",
        }
    }
}

// =============================================================================
// Output Generator
// =============================================================================

/// Shared rendering core for all output families
pub struct OutputGenerator<'a> {
    compiler: &'a ExperimentsCompiler,
    dialect: Dialect,
    header_file_path: String,
    year: i32,
}

impl<'a> OutputGenerator<'a> {
    pub fn new(compiler: &'a ExperimentsCompiler, dialect: Dialect) -> Self {
        Self {
            compiler,
            dialect,
            header_file_path: String::new(),
            year: compiler.copyright_year(),
        }
    }

    /// Path of the generated header, as included by generated sources
    pub fn with_header_file_path(mut self, path: impl Into<String>) -> Self {
        self.header_file_path = path.into();
        self
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn generate_header(&self, output: &mut String) -> Result<()> {
        header::generate(self, output)
    }

    pub fn generate_source(&self, output: &mut String) -> Result<()> {
        source::generate(self, output)
    }

    pub fn generate_test(&self, output: &mut String) -> Result<()> {
        test_file::generate(self, output)
    }

    pub fn generate_bzl(&self, output: &mut String) -> Result<()> {
        bzl::generate(self, output)
    }

    pub(crate) fn compiler(&self) -> &ExperimentsCompiler {
        self.compiler
    }

    pub(crate) fn tables(&self) -> &ReferenceTables {
        self.compiler.tables()
    }

    /// `header_file_path` with any `.github` fragment removed, so hosted
    /// mirrors and internal layouts include the same header.
    pub(crate) fn include_path(&self) -> String {
        self.header_file_path.replacen(".github", "", 1)
    }

    pub(crate) fn put_preamble(&self, output: &mut String, prefix: &str) {
        banner::put_copyright(output, prefix, self.year);
        banner::put_generated_by(output, prefix, self.generator_label());
    }

    /// Generator named in the banner; a configured label overrides the dialect's
    pub(crate) fn generator_label(&self) -> &str {
        self.compiler
            .generator_label()
            .unwrap_or(self.dialect.generator)
    }

    /// Emit an `#if defined / #elif defined / #else` chain with one arm per
    /// guarded platform and the fallback platform last.
    pub(crate) fn platform_chain<F>(&self, output: &mut String, mut arm: F) -> Result<()>
    where
        F: FnMut(&mut String, &str) -> Result<()>,
    {
        let mut first = true;
        for (platform, guard) in self.tables().guarded_platforms() {
            if first {
                output.push_str(&format!("#if defined({})\n", guard));
                first = false;
            } else {
                output.push_str(&format!("#elif defined({})\n", guard));
            }
            arm(output, platform)?;
        }
        if first {
            return arm(output, FALLBACK_PLATFORM);
        }
        output.push_str("\n#else\n");
        arm(output, FALLBACK_PLATFORM)?;
        output.push_str("#endif\n");
        Ok(())
    }
}
