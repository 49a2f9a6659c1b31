//! Experiments Compiler
//!
//! Turns an experiment catalogue and a rollout document into the C++ sources
//! that gate features behind experiments.
//!
//! ## Features
//!
//! - **Validated Catalogue**: every experiment is checked for a description,
//!   owner and a sensible expiry before it can be rolled out
//! - **Per-Platform Rollouts**: defaults may differ between ios, posix and
//!   windows, and may depend on other experiments
//! - **Three Dialects**: google3, OSS production and OSS test output
//! - **Drift Detection**: SHA256 checksums and line diffs against files on disk
//!
//! ## Pipeline
//!
//! ```text
//! experiments.yaml ──► add_experiment_definition ─┐
//!                                                  ├─► ExperimentsCompiler ──► experiments.h
//! rollouts.yaml ─────► add_rollout_specification ─┘           │              ├─► experiments.cc
//!                                                              │              ├─► experiments_test.cc
//!                                                              └─ validate    └─► experiments.bzl
//! ```

pub mod checksum;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod document;
pub mod error;
pub mod experiment;
pub mod output;
pub mod rollout;
pub mod tables;

pub use checksum::Checksum;
pub use codegen::{Dialect, Mode, OutputGenerator};
pub use compiler::{Artifact, CompilerOptions, ExperimentsCompiler};
pub use config::CompilerConfig;
pub use error::{CompilerError, Result};
pub use experiment::{Experiment, ExperimentAttributes, ExperimentDefinition, ValidationIssue, ValidationReport};
pub use output::{Drift, WriteOutcome};
pub use rollout::{MergeRejection, RolloutSpecification};
pub use tables::ReferenceTables;
