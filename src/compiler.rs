//! Experiments compiler
//!
//! Owns the experiment map and the reference tables, drives parsing of the
//! catalogue and rollout documents, and hands the completed model to an
//! [`OutputGenerator`] for each artifact.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate, Utc};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{error, info, warn};

use crate::codegen::{Mode, OutputGenerator};
use crate::config::CompilerConfig;
use crate::document::{load_mappings, Entry};
use crate::error::{CompilerError, Result};
use crate::experiment::{Experiment, ExperimentAttributes, ExperimentDefinition};
use crate::output::{check_file, write_file, Drift, WriteOutcome};
use crate::rollout::{MergeRejection, RolloutSpecification};
use crate::tables::{ReferenceTables, DEBUG_TOKEN};

/// A file the compiler can generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Header,
    /// Source including the header at this path
    Source { header_file_path: String },
    /// Final-value test including the header at this path
    Test { header_file_path: String },
    Bzl,
}

/// Behaviour switches beyond the reference tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Refuse a catalogue entry whose name is already defined
    pub reject_duplicates: bool,
    /// Year in generated copyright lines; the current year when unset
    pub copyright_year: Option<i32>,
    /// Replaces the generator path in "Auto generated by" banners
    pub generator_label: Option<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            reject_duplicates: true,
            copyright_year: None,
            generator_label: None,
        }
    }
}

/// Compiles experiment definitions and rollouts into generated code
#[derive(Debug, Clone)]
pub struct ExperimentsCompiler {
    tables: ReferenceTables,
    options: CompilerOptions,
    experiments: BTreeMap<String, Experiment>,
}

impl ExperimentsCompiler {
    pub fn new(tables: ReferenceTables) -> Self {
        Self::with_options(tables, CompilerOptions::default())
    }

    pub fn with_options(tables: ReferenceTables, options: CompilerOptions) -> Self {
        Self {
            tables,
            options,
            experiments: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::with_options(
            config.tables.clone(),
            CompilerOptions {
                reject_duplicates: config.validation.reject_duplicates,
                copyright_year: config.output.copyright_year,
                generator_label: config.output.generator_label.clone(),
            },
        )
    }

    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    pub fn experiments(&self) -> &BTreeMap<String, Experiment> {
        &self.experiments
    }

    pub fn experiment(&self, name: &str) -> Option<&Experiment> {
        self.experiments.get(name)
    }

    /// Definitions in name order
    pub fn definitions(&self) -> impl Iterator<Item = &ExperimentDefinition> {
        self.experiments.values().map(Experiment::definition)
    }

    pub fn set_copyright_year(&mut self, year: i32) {
        self.options.copyright_year = Some(year);
    }

    pub fn generator_label(&self) -> Option<&str> {
        self.options.generator_label.as_deref()
    }

    pub fn copyright_year(&self) -> i32 {
        self.options
            .copyright_year
            .unwrap_or_else(|| Utc::now().year())
    }

    // -------------------------------------------------------------------------
    // Input documents
    // -------------------------------------------------------------------------

    /// Parse an experiment catalogue and add every entry.
    ///
    /// Entries that break a validation rule are still added; they report
    /// themselves invalid and refuse rollouts. Missing keys fail the call.
    pub fn add_experiment_definition(&mut self, yaml: &str) -> Result<()> {
        for mapping in load_mappings(yaml)? {
            let entry = Entry::new(&mapping, "experiment");
            let attrs = ExperimentAttributes {
                name: entry.string("name")?,
                description: entry.string("description")?,
                owner: entry.string("owner")?,
                expiry: entry.string("expiry")?,
                uses_polling: entry.boolean("uses_polling")?,
                allow_in_fuzzing_config: entry.boolean("allow_in_fuzzing_config")?,
                test_tags: entry.string_list("test_tags")?,
                requirements: entry.optional_string_list("requirements")?,
            };
            let experiment = Experiment::new(attrs);
            let definition = experiment.definition();
            info!(
                "Experiment definition: {} {} {} {} {} {}",
                definition.name(),
                definition.description(),
                definition.owner(),
                definition.expiry(),
                definition.uses_polling(),
                definition.allow_in_fuzzing_config()
            );

            let name = definition.name().to_string();
            if self.experiments.contains_key(&name) {
                if self.options.reject_duplicates {
                    error!("ERROR: Duplicate experiment definition: {}", name);
                    return Err(CompilerError::DuplicateExperiment(name));
                }
                warn!("WARNING: experiment {} redefined; keeping the later entry", name);
            }
            self.experiments.insert(name, experiment);
        }
        Ok(())
    }

    /// Parse a rollout document and merge each entry into its experiment.
    pub fn add_rollout_specification(&mut self, yaml: &str) -> Result<()> {
        for mapping in load_mappings(yaml)? {
            let rollout = RolloutSpecification::from_entry(&Entry::new(&mapping, "rollout"))?;
            let suggestion = self.suggest(&rollout.name);
            let experiment = self.experiments.get_mut(&rollout.name).ok_or_else(|| {
                error!("ERROR: rollout for unknown experiment {}", rollout.name);
                CompilerError::UnknownExperiment {
                    name: rollout.name.clone(),
                    suggestion,
                }
            })?;
            if let Err(rejection) = experiment.add_rollout_specification(&self.tables, &rollout) {
                if rejection == MergeRejection::Poisoned {
                    error!("ERROR: experiment {} is invalid; rollout refused", rollout.name);
                }
                return Err(CompilerError::Rollout(rollout.name));
            }
        }
        Ok(())
    }

    /// Closest known experiment name, for error messages
    fn suggest(&self, name: &str) -> Option<String> {
        if self.experiments.contains_key(name) {
            return None;
        }
        let matcher = SkimMatcherV2::default();
        self.experiments
            .keys()
            .filter_map(|candidate| {
                // Typos can add or drop letters, so try both directions
                let forward = matcher.fuzzy_match(candidate, name);
                let backward = matcher.fuzzy_match(name, candidate);
                forward.max(backward).map(|score| (score, candidate))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, candidate)| candidate.clone())
    }

    // -------------------------------------------------------------------------
    // Whole-model checks
    // -------------------------------------------------------------------------

    /// Run `IsValid` on every experiment as of today.
    pub fn validate(&self, check_expiry: bool) -> Result<()> {
        self.validate_on(check_expiry, Utc::now().date_naive())
    }

    pub fn validate_on(&self, check_expiry: bool, today: NaiveDate) -> Result<()> {
        let invalid: Vec<String> = self
            .experiments
            .iter()
            .filter(|(_, experiment)| !experiment.is_valid_on(check_expiry, today))
            .map(|(name, _)| name.clone())
            .collect();
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(CompilerError::InvalidExperiments(invalid))
        }
    }

    /// Every requirement must name a known experiment, and requirements
    /// must not form a cycle.
    pub fn check_requirements(&self) -> Result<()> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let nodes: BTreeMap<&str, NodeIndex> = self
            .experiments
            .keys()
            .map(|name| (name.as_str(), graph.add_node(name.as_str())))
            .collect();

        let mut unknown = Vec::new();
        for definition in self.definitions() {
            for requirement in definition.requirements() {
                match nodes.get(requirement.as_str()) {
                    Some(&target) => {
                        graph.add_edge(nodes[definition.name()], target, ());
                    }
                    None => unknown.push(format!("{} requires {}", definition.name(), requirement)),
                }
            }
        }
        if !unknown.is_empty() {
            return Err(CompilerError::Requirements(format!(
                "unknown experiments: {}",
                unknown.join(", ")
            )));
        }

        for component in kosaraju_scc(&graph) {
            let cyclic = component.len() > 1
                || graph.contains_edge(component[0], component[0]);
            if cyclic {
                let mut members: Vec<&str> = component.iter().map(|idx| graph[*idx]).collect();
                members.sort_unstable();
                return Err(CompilerError::Requirements(format!(
                    "requirement cycle between {}",
                    members.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Fail if any experiment resolves to `debug` on any platform.
    pub fn ensure_no_debug_experiments(&self) -> Result<()> {
        for definition in self.definitions() {
            for (platform, token) in definition.defaults() {
                if token == DEBUG_TOKEN {
                    error!(
                        "ERROR: Debug experiments are prohibited. {} is configured with debug on {}",
                        definition.name(),
                        platform
                    );
                    return Err(CompilerError::DebugExperiment {
                        experiment: definition.name().to_string(),
                        platform: platform.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Generation
    // -------------------------------------------------------------------------

    /// Render an artifact to text without touching the filesystem.
    pub fn render(&self, artifact: &Artifact, mode: Mode) -> Result<String> {
        let mut output = String::new();
        let generator = OutputGenerator::new(self, mode.dialect());
        match artifact {
            Artifact::Header => generator.generate_header(&mut output)?,
            Artifact::Source { header_file_path } => generator
                .with_header_file_path(header_file_path.as_str())
                .generate_source(&mut output)?,
            Artifact::Test { header_file_path } => generator
                .with_header_file_path(header_file_path.as_str())
                .generate_test(&mut output)?,
            Artifact::Bzl => generator.generate_bzl(&mut output)?,
        }
        Ok(output)
    }

    fn generate(&self, output_file: &Path, artifact: &Artifact, mode: &str) -> Result<WriteOutcome> {
        let mode: Mode = mode.parse().map_err(|e| {
            error!("Unsupported mode: {}", mode);
            e
        })?;
        let contents = self.render(artifact, mode)?;
        write_file(output_file, &contents).map_err(|e| {
            error!(
                "Failed to write to file: {} with error: {}",
                output_file.display(),
                e
            );
            e
        })
    }

    pub fn generate_experiments_hdr(
        &self,
        output_file: impl AsRef<Path>,
        mode: &str,
    ) -> Result<WriteOutcome> {
        self.generate(output_file.as_ref(), &Artifact::Header, mode)
    }

    pub fn generate_experiments_src(
        &self,
        output_file: impl AsRef<Path>,
        header_file_path: &str,
        mode: &str,
    ) -> Result<WriteOutcome> {
        let artifact = Artifact::Source {
            header_file_path: header_file_path.to_string(),
        };
        self.generate(output_file.as_ref(), &artifact, mode)
    }

    pub fn generate_test(
        &self,
        output_file: impl AsRef<Path>,
        header_file_path: &str,
        mode: &str,
    ) -> Result<WriteOutcome> {
        let artifact = Artifact::Test {
            header_file_path: header_file_path.to_string(),
        };
        self.generate(output_file.as_ref(), &artifact, mode)
    }

    pub fn gen_experiments_bzl(
        &self,
        output_file: impl AsRef<Path>,
        mode: &str,
    ) -> Result<WriteOutcome> {
        self.generate(output_file.as_ref(), &Artifact::Bzl, mode)
    }

    /// Compare an existing file with what `artifact` would render to.
    pub fn check(&self, path: impl AsRef<Path>, artifact: &Artifact, mode: Mode) -> Result<Option<Drift>> {
        let expected = self.render(artifact, mode)?;
        check_file(path.as_ref(), &expected)
    }
}
