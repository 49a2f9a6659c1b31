//! Rollout merging
//!
//! Attaches a [`RolloutSpecification`] to an [`Experiment`], resolving one
//! default token and one constraint string per known platform.

use std::collections::BTreeMap;

use tracing::{error, warn};

use crate::document::Entry;
use crate::error::{CompilerError, Result};
use crate::experiment::{Experiment, ValidationIssue};
use crate::tables::{ReferenceTables, DEBUG_TOKEN};

/// Desired enablement of one experiment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloutSpecification {
    pub name: String,
    /// Applied to every platform when non-empty
    pub default_value: String,
    /// Per-platform values, consulted only without a `default_value`
    pub platform_value: BTreeMap<String, String>,
    pub requirements: Vec<String>,
}

impl RolloutSpecification {
    /// Decode one rollout mapping.
    ///
    /// `default_value` wins when present; otherwise `platform_value` is
    /// required.
    pub fn from_entry(entry: &Entry<'_>) -> Result<Self> {
        let name = entry.string("name")?;
        let requirements = entry.optional_string_list("requirements")?;
        if entry.has("default_value") {
            if entry.has("platform_value") {
                warn!("WARNING: rollout {} sets default_value; ignoring platform_value", name);
            }
            Ok(Self {
                name,
                default_value: entry.string("default_value")?,
                platform_value: BTreeMap::new(),
                requirements,
            })
        } else if entry.has("platform_value") {
            Ok(Self {
                name,
                default_value: String::new(),
                platform_value: entry.string_map("platform_value")?,
                requirements,
            })
        } else {
            Err(CompilerError::MissingRolloutValue(name))
        }
    }
}

/// Why a merge was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeRejection {
    /// The experiment already failed validation
    Poisoned,
    /// The rollout names a different experiment
    NameMismatch { rollout: String },
    /// A rule failed during this merge; the experiment is now poisoned
    Invalid(ValidationIssue),
}

impl Experiment {
    /// Merge a rollout into this experiment.
    ///
    /// Requirements accumulate across merges. Once the experiment has any
    /// requirement, every platform resolves to `debug` and its constraint
    /// lists the requirements.
    pub fn add_rollout_specification(
        &mut self,
        tables: &ReferenceTables,
        rollout: &RolloutSpecification,
    ) -> std::result::Result<(), MergeRejection> {
        if self.is_poisoned() {
            return Err(MergeRejection::Poisoned);
        }
        let name = self.definition.name().to_string();
        if rollout.name != name {
            error!(
                "ERROR: Rollout specification {} does not apply to this experiment: {}",
                rollout.name, name
            );
            return Err(MergeRejection::NameMismatch {
                rollout: rollout.name.clone(),
            });
        }

        let requires = &mut self.definition.requires;
        for requirement in &rollout.requirements {
            if !requires.contains(requirement) {
                requires.push(requirement.clone());
            }
        }

        if rollout.default_value.is_empty() && rollout.platform_value.is_empty() {
            return Err(self.reject(ValidationIssue::NoRolloutDefault));
        }

        let mut defaults = BTreeMap::new();
        let mut constraints = BTreeMap::new();
        for platform in tables.platforms() {
            let value = if !rollout.default_value.is_empty() {
                rollout.default_value.as_str()
            } else {
                match rollout.platform_value.get(platform) {
                    Some(value) => value.as_str(),
                    None => {
                        return Err(self.reject(ValidationIssue::MissingPlatformValue {
                            platform: platform.to_string(),
                        }))
                    }
                }
            };

            let requires = self.definition.requirements();
            let (token, constraint) = if requires.is_empty() {
                (value.to_string(), String::new())
            } else {
                (DEBUG_TOKEN.to_string(), requires.join(", "))
            };
            if tables.default_expr(&token).is_err() {
                return Err(self.reject(ValidationIssue::UnknownDefault {
                    platform: platform.to_string(),
                    token,
                }));
            }
            defaults.insert(platform.to_string(), token);
            constraints.insert(platform.to_string(), constraint);
        }

        self.definition.defaults = defaults;
        self.definition.additional_constraints = constraints;
        Ok(())
    }

    fn reject(&mut self, issue: ValidationIssue) -> MergeRejection {
        self.report.record(self.definition.name(), issue.clone());
        MergeRejection::Invalid(issue)
    }
}
