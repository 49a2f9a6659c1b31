//! Experiment model
//!
//! An [`ExperimentDefinition`] is the declared metadata of one experiment.
//! Construction never fails: problems are returned in a separate
//! [`ValidationReport`], and the compiler keeps both side by side in an
//! [`Experiment`] record. A record whose report carries an error is
//! poisoned; it reports itself invalid and refuses rollout merges.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use regex::Regex;
use tracing::{error, warn};

/// Expiry sentinel reserved for `monitoring_experiment`
pub const NEVER_EXPIRES: &str = "never-ever";

/// The one experiment allowed (and required) to never expire
pub const MONITORING_EXPERIMENT: &str = "monitoring_experiment";

/// Expiry format accepted in catalogues
pub const EXPIRY_FORMAT: &str = "%Y-%m-%d";

/// How far ahead an expiry may be before a warning is logged
pub const MAX_EXPIRY_HORIZON_DAYS: i64 = 180;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("name pattern is valid"))
}

// =============================================================================
// Attributes
// =============================================================================

/// Raw fields of one catalogue entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentAttributes {
    pub name: String,
    pub description: String,
    pub owner: String,
    pub expiry: String,
    pub uses_polling: bool,
    pub allow_in_fuzzing_config: bool,
    pub test_tags: Vec<String>,
    pub requirements: Vec<String>,
}

// =============================================================================
// Validation Report
// =============================================================================

/// A rule an experiment broke
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingName,
    MissingDescription,
    MissingOwner,
    MissingExpiry,
    MonitoringExpires,
    NoRolloutDefault,
    MissingPlatformValue { platform: String },
    UnknownDefault { platform: String, token: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingName => write!(f, "experiment with no name"),
            Self::MissingDescription => write!(f, "no description"),
            Self::MissingOwner => write!(f, "no owner"),
            Self::MissingExpiry => write!(f, "no expiry"),
            Self::MonitoringExpires => {
                write!(f, "{} should never expire", MONITORING_EXPERIMENT)
            }
            Self::NoRolloutDefault => write!(f, "no default in rollout specification"),
            Self::MissingPlatformValue { platform } => {
                write!(f, "no value set on platform {}", platform)
            }
            Self::UnknownDefault { platform, token } => {
                write!(f, "unknown default `{}` on platform {}", token, platform)
            }
        }
    }
}

/// Errors recorded against one experiment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub(crate) fn record(&mut self, name: &str, issue: ValidationIssue) {
        error!("ERROR: {} for experiment {}", issue, name);
        self.issues.push(issue);
    }
}

// =============================================================================
// Experiment Definition
// =============================================================================

/// Declared metadata of one experiment plus its merged rollout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentDefinition {
    name: String,
    description: String,
    owner: String,
    expiry: String,
    uses_polling: bool,
    allow_in_fuzzing_config: bool,
    test_tags: Vec<String>,
    pub(crate) requires: Vec<String>,
    pub(crate) defaults: BTreeMap<String, String>,
    pub(crate) additional_constraints: BTreeMap<String, String>,
}

impl ExperimentDefinition {
    /// Build a definition and check its required fields.
    pub fn new(attrs: ExperimentAttributes) -> (Self, ValidationReport) {
        let mut report = ValidationReport::default();
        let name = attrs.name.as_str();

        if attrs.name.is_empty() {
            report.record(name, ValidationIssue::MissingName);
        } else if !name_pattern().is_match(name) {
            warn!("WARNING: experiment name {} is not lower_snake_case", name);
        }
        if attrs.description.is_empty() {
            report.record(name, ValidationIssue::MissingDescription);
        }
        if attrs.owner.is_empty() {
            report.record(name, ValidationIssue::MissingOwner);
        }
        if attrs.expiry.is_empty() {
            report.record(name, ValidationIssue::MissingExpiry);
        }
        if attrs.name == MONITORING_EXPERIMENT && attrs.expiry != NEVER_EXPIRES {
            report.record(name, ValidationIssue::MonitoringExpires);
        }
        if !report.is_clean() {
            error!("Failed to create experiment definition {}", name);
        }

        let mut requires = Vec::new();
        for requirement in attrs.requirements {
            if !requires.contains(&requirement) {
                requires.push(requirement);
            }
        }

        let definition = Self {
            name: attrs.name,
            description: attrs.description,
            owner: attrs.owner,
            expiry: attrs.expiry,
            uses_polling: attrs.uses_polling,
            allow_in_fuzzing_config: attrs.allow_in_fuzzing_config,
            test_tags: attrs.test_tags,
            requires,
            defaults: BTreeMap::new(),
            additional_constraints: BTreeMap::new(),
        };
        (definition, report)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn expiry(&self) -> &str {
        &self.expiry
    }

    pub fn uses_polling(&self) -> bool {
        self.uses_polling
    }

    pub fn allow_in_fuzzing_config(&self) -> bool {
        self.allow_in_fuzzing_config
    }

    pub fn test_tags(&self) -> &[String] {
        &self.test_tags
    }

    pub fn requirements(&self) -> &[String] {
        &self.requires
    }

    /// Resolved default token on a platform; `false` until a rollout is merged
    pub fn default_value(&self, platform: &str) -> &str {
        self.defaults.get(platform).map(String::as_str).unwrap_or("false")
    }

    /// Human-readable constraints on a platform; empty when there are none
    pub fn additional_constraints(&self, platform: &str) -> &str {
        self.additional_constraints
            .get(platform)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Every (platform, token) pair resolved by merged rollouts
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defaults.iter().map(|(p, t)| (p.as_str(), t.as_str()))
    }

    /// Date rules on `expiry`; logs and returns false on violation
    fn expiry_is_acceptable(&self, check_expiry: bool, today: NaiveDate) -> bool {
        if self.name == MONITORING_EXPERIMENT && self.expiry == NEVER_EXPIRES {
            return true;
        }
        let expiry = match NaiveDate::parse_from_str(&self.expiry, EXPIRY_FORMAT) {
            Ok(date) => date,
            Err(_) => {
                error!(
                    "ERROR: Invalid date format in expiry: {} for experiment {}",
                    self.expiry, self.name
                );
                return false;
            }
        };
        if in_freeze_window(expiry) {
            error!(
                "For experiment {}: Experiment expiration is not allowed between Nov 1 and Jan 15 (experiment lists {}).",
                self.name, self.expiry
            );
            return false;
        }
        if !check_expiry {
            return true;
        }
        if has_expired(expiry, today) {
            warn!("WARNING: experiment {} expired on {}", self.name, self.expiry);
        }
        if expiry > today + Duration::days(MAX_EXPIRY_HORIZON_DAYS) {
            warn!(
                "WARNING: experiment {} expires far in the future on {}",
                self.name, self.expiry
            );
            warn!("expiry should be no more than two quarters from now");
        }
        true
    }
}

/// An experiment expiring today counts as expired
pub(crate) fn has_expired(expiry: NaiveDate, today: NaiveDate) -> bool {
    expiry <= today
}

/// Nov 1 through Jan 14 inclusive
pub fn in_freeze_window(date: NaiveDate) -> bool {
    matches!(date.month(), 11 | 12) || (date.month() == 1 && date.day() < 15)
}

// =============================================================================
// Experiment Record
// =============================================================================

/// A definition together with its validation state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    pub(crate) definition: ExperimentDefinition,
    pub(crate) report: ValidationReport,
}

impl Experiment {
    pub fn new(attrs: ExperimentAttributes) -> Self {
        let (definition, report) = ExperimentDefinition::new(attrs);
        Self { definition, report }
    }

    pub fn definition(&self) -> &ExperimentDefinition {
        &self.definition
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    /// True once any rule has failed; poisoned records refuse mutation
    pub fn is_poisoned(&self) -> bool {
        !self.report.is_clean()
    }

    /// Validate against today's date (UTC)
    pub fn is_valid(&self, check_expiry: bool) -> bool {
        self.is_valid_on(check_expiry, Utc::now().date_naive())
    }

    /// Validate as of `today`.
    ///
    /// The freeze window is enforced regardless of `check_expiry`. With
    /// `check_expiry`, past and far-future dates only log warnings.
    pub fn is_valid_on(&self, check_expiry: bool, today: NaiveDate) -> bool {
        if self.is_poisoned() {
            return false;
        }
        self.definition.expiry_is_acceptable(check_expiry, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(name: &str, expiry: &str) -> ExperimentAttributes {
        ExperimentAttributes {
            name: name.to_string(),
            description: "a test experiment".to_string(),
            owner: "someone@example.com".to_string(),
            expiry: expiry.to_string(),
            ..Default::default()
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, EXPIRY_FORMAT).unwrap()
    }

    #[test]
    fn test_empty_fields_are_invalid() {
        for field in ["name", "description", "owner", "expiry"] {
            let mut a = attrs("foo", "2025-03-01");
            match field {
                "name" => a.name.clear(),
                "description" => a.description.clear(),
                "owner" => a.owner.clear(),
                _ => a.expiry.clear(),
            }
            let experiment = Experiment::new(a);
            assert!(experiment.is_poisoned(), "{} empty should poison", field);
            assert!(!experiment.is_valid_on(false, day("2025-02-01")));
        }
    }

    #[test]
    fn test_monitoring_experiment_never_expires() {
        let ok = Experiment::new(attrs(MONITORING_EXPERIMENT, NEVER_EXPIRES));
        assert!(ok.is_valid_on(true, day("2025-02-01")));

        let bad = Experiment::new(attrs(MONITORING_EXPERIMENT, "2025-03-01"));
        assert_eq!(bad.report().issues(), &[ValidationIssue::MonitoringExpires]);
        assert!(!bad.is_valid_on(false, day("2025-02-01")));
    }

    #[test]
    fn test_freeze_window() {
        let today = day("2024-06-01");
        for expiry in ["2024-12-01", "2025-01-10", "2024-11-01", "2025-01-14"] {
            for check in [false, true] {
                let experiment = Experiment::new(attrs("foo", expiry));
                assert!(!experiment.is_valid_on(check, today), "{} accepted", expiry);
            }
        }
        assert!(Experiment::new(attrs("foo", "2025-03-01")).is_valid_on(false, today));
        assert!(Experiment::new(attrs("foo", "2025-01-15")).is_valid_on(false, today));
    }

    #[test]
    fn test_malformed_expiry() {
        let experiment = Experiment::new(attrs("foo", "March 1st"));
        assert!(!experiment.is_poisoned());
        assert!(!experiment.is_valid_on(false, day("2025-02-01")));
    }

    #[test]
    fn test_expiring_today_counts_as_expired() {
        assert!(has_expired(day("2025-03-01"), day("2025-03-01")));
        assert!(has_expired(day("2025-02-28"), day("2025-03-01")));
        assert!(!has_expired(day("2025-03-02"), day("2025-03-01")));
        assert!(Experiment::new(attrs("foo", "2025-03-01")).is_valid_on(true, day("2025-03-01")));
    }

    #[test]
    fn test_expiry_warnings_do_not_invalidate() {
        let today = day("2025-06-01");
        assert!(Experiment::new(attrs("foo", "2025-03-01")).is_valid_on(true, today));
        assert!(Experiment::new(attrs("foo", "2027-03-01")).is_valid_on(true, today));
    }

    #[test]
    fn test_requirements_are_deduplicated() {
        let mut a = attrs("foo", "2025-03-01");
        a.requirements = vec!["bar".into(), "baz".into(), "bar".into()];
        let (definition, report) = ExperimentDefinition::new(a);
        assert!(report.is_clean());
        assert_eq!(definition.requirements(), &["bar".to_string(), "baz".to_string()]);
    }

    #[test]
    fn test_unmerged_defaults() {
        let (definition, _) = ExperimentDefinition::new(attrs("foo", "2025-03-01"));
        assert_eq!(definition.default_value("posix"), "false");
        assert_eq!(definition.additional_constraints("posix"), "");
    }
}
