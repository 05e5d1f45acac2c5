//! Suite configuration.
//!
//! Timings for every convergence step, the teardown policy and the namespace
//! prefix, loaded from TOML and validated before any scenario runs.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::converge::PollConfig;
use crate::error::{Error, Result};

/// Timeout and poll interval of one convergence step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTiming {
    pub timeout_secs: u64,
    pub interval_millis: u64,
}

impl StepTiming {
    pub const fn new(timeout_secs: u64, interval_millis: u64) -> Self {
        Self {
            timeout_secs,
            interval_millis,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_millis)
    }

    pub fn poll(&self) -> PollConfig {
        PollConfig::new(self.timeout(), self.interval())
    }
}

/// Per-step timings. Missing entries fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub build_started: StepTiming,
    pub build_finished: StepTiming,
    pub build_signed: StepTiming,
    pub snapshot_created: StepTiming,
    pub snapshot_annotated: StepTiming,
    pub ephemeral_environment_created: StepTiming,
    pub test_pipeline_started: StepTiming,
    pub test_pipeline_finished: StepTiming,
    pub binding_deleted: StepTiming,
    pub ephemeral_environment_deleted: StepTiming,
    /// Deleting every Environment of a namespace during cleanup.
    pub environments_deleted: StepTiming,
    /// Reading a snapshot's test result once its test runs finished.
    pub test_result_checked: StepTiming,
    /// Deleting one tracked resource during cleanup.
    pub resource_deleted: StepTiming,
    pub release_pipeline_started: StepTiming,
    pub release_pipeline_finished: StepTiming,
    pub release_succeeded: StepTiming,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            build_started: StepTiming::new(300, 2_000),
            build_finished: StepTiming::new(900, 2_000),
            build_signed: StepTiming::new(300, 2_000),
            snapshot_created: StepTiming::new(300, 2_000),
            snapshot_annotated: StepTiming::new(300, 2_000),
            ephemeral_environment_created: StepTiming::new(180, 1_000),
            test_pipeline_started: StepTiming::new(300, 2_000),
            test_pipeline_finished: StepTiming::new(600, 2_000),
            binding_deleted: StepTiming::new(180, 2_000),
            ephemeral_environment_deleted: StepTiming::new(180, 1_000),
            environments_deleted: StepTiming::new(30, 1_000),
            test_result_checked: StepTiming::new(30, 1_000),
            resource_deleted: StepTiming::new(60, 1_000),
            release_pipeline_started: StepTiming::new(600, 100),
            release_pipeline_finished: StepTiming::new(600, 100),
            release_succeeded: StepTiming::new(600, 100),
        }
    }
}

impl TimingConfig {
    /// All timings with their config keys.
    pub fn entries(&self) -> [(&'static str, StepTiming); 16] {
        [
            ("build_started", self.build_started),
            ("build_finished", self.build_finished),
            ("build_signed", self.build_signed),
            ("snapshot_created", self.snapshot_created),
            ("snapshot_annotated", self.snapshot_annotated),
            ("ephemeral_environment_created", self.ephemeral_environment_created),
            ("test_pipeline_started", self.test_pipeline_started),
            ("test_pipeline_finished", self.test_pipeline_finished),
            ("binding_deleted", self.binding_deleted),
            ("ephemeral_environment_deleted", self.ephemeral_environment_deleted),
            ("environments_deleted", self.environments_deleted),
            ("test_result_checked", self.test_result_checked),
            ("resource_deleted", self.resource_deleted),
            ("release_pipeline_started", self.release_pipeline_started),
            ("release_pipeline_finished", self.release_pipeline_finished),
            ("release_succeeded", self.release_succeeded),
        ]
    }

    /// The same timing for every step. Used for rehearsals.
    pub fn uniform(timeout_secs: u64, interval_millis: u64) -> Self {
        let t = StepTiming::new(timeout_secs, interval_millis);
        Self {
            build_started: t,
            build_finished: t,
            build_signed: t,
            snapshot_created: t,
            snapshot_annotated: t,
            ephemeral_environment_created: t,
            test_pipeline_started: t,
            test_pipeline_finished: t,
            binding_deleted: t,
            ephemeral_environment_deleted: t,
            environments_deleted: t,
            test_result_checked: t,
            resource_deleted: t,
            release_pipeline_started: t,
            release_pipeline_finished: t,
            release_succeeded: t,
        }
    }
}

/// When scenario resources get deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeardownPolicy {
    /// Delete namespaced resources after a passing scenario.
    pub on_success: bool,
    /// Delete namespaced resources after a failing scenario. Off by default so
    /// the evidence stays around for diagnosis.
    pub on_failure: bool,
}

impl Default for TeardownPolicy {
    fn default() -> Self {
        Self {
            on_success: true,
            on_failure: false,
        }
    }
}

impl TeardownPolicy {
    pub fn applies(&self, failed: bool) -> bool {
        if failed {
            self.on_failure
        } else {
            self.on_success
        }
    }
}

/// Top-level suite configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Prefix of generated namespace names.
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,
    /// Namespace release pipelines run in; generated when unset.
    #[serde(default)]
    pub managed_namespace: Option<String>,
    #[serde(default)]
    pub teardown: TeardownPolicy,
    #[serde(default)]
    pub timing: TimingConfig,
}

fn default_namespace_prefix() -> String {
    "e2e".to_string()
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            namespace_prefix: default_namespace_prefix(),
            managed_namespace: None,
            teardown: TeardownPolicy::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl SuiteConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        for warning in config.validate().into_result()? {
            tracing::warn!(path = %path.display(), "{}", warning);
        }
        Ok(config)
    }

    /// Parses a configuration without validating it.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse suite config: {}", e)))
    }
}

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    fn validate(&self) -> ValidationResult;
}

/// Timeouts beyond this are almost certainly a typo.
const LONG_TIMEOUT: Duration = Duration::from_secs(3600);

fn validate_timing(name: &str, timing: &StepTiming) -> ValidationResult {
    let mut result = ValidationResult::default();

    if timing.interval_millis == 0 {
        result.add_error(format!("{}: interval_millis must be greater than zero", name));
    } else if timing.interval() >= timing.timeout() {
        result.add_error(format!(
            "{}: interval ({:?}) must be shorter than timeout ({:?})",
            name,
            timing.interval(),
            timing.timeout()
        ));
    }

    if timing.timeout() > LONG_TIMEOUT {
        result.add_warning(format!(
            "{}: timeout over an hour may indicate a misconfiguration",
            name
        ));
    }

    result
}

impl Validate for TimingConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        for (name, timing) in self.entries() {
            result.merge(validate_timing(name, &timing));
        }
        result
    }
}

impl Validate for SuiteConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = self.timing.validate();

        if self.namespace_prefix.trim().is_empty() {
            result.add_error("namespace_prefix cannot be empty");
        } else if !self
            .namespace_prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            result.add_error(format!(
                "namespace_prefix '{}' must be lowercase alphanumerics and dashes",
                self.namespace_prefix
            ));
        }

        if !self.teardown.on_success && !self.teardown.on_failure {
            result.add_warning("teardown is disabled; scenario namespaces will accumulate");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_follow_suite_timings() {
        let timing = TimingConfig::default();
        assert_eq!(timing.ephemeral_environment_created.timeout(), Duration::from_secs(180));
        assert_eq!(timing.ephemeral_environment_created.interval(), Duration::from_secs(1));
        assert_eq!(timing.binding_deleted.interval(), Duration::from_secs(2));
        assert_eq!(timing.release_pipeline_finished.timeout(), Duration::from_secs(600));
        assert_eq!(timing.release_pipeline_finished.interval(), Duration::from_millis(100));
        assert_eq!(timing.environments_deleted.timeout(), Duration::from_secs(30));
        assert_eq!(timing.test_result_checked.timeout(), Duration::from_secs(30));
        assert_eq!(timing.resource_deleted.interval(), Duration::from_secs(1));
    }

    #[test]
    fn default_config_is_valid() {
        let result = SuiteConfig::default().validate();
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn zero_interval_is_an_error() {
        let mut config = SuiteConfig::default();
        config.timing.build_signed = StepTiming::new(60, 0);
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors[0].starts_with("build_signed"));
    }

    #[test]
    fn interval_not_shorter_than_timeout_is_an_error() {
        let mut config = SuiteConfig::default();
        config.timing.binding_deleted = StepTiming::new(2, 2_000);
        assert!(config.validate().into_result().is_err());
    }

    #[test]
    fn long_timeout_warns() {
        let mut config = SuiteConfig::default();
        config.timing.test_pipeline_finished = StepTiming::new(7200, 2_000);
        let result = config.validate();
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn bad_namespace_prefix_is_an_error() {
        let config = SuiteConfig {
            namespace_prefix: "NBE_e2e".to_string(),
            ..Default::default()
        };
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SuiteConfig::from_toml(
            r#"
            namespace_prefix = "nbe-e2e"

            [teardown]
            on_failure = true

            [timing.build_finished]
            timeout_secs = 60
            interval_millis = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.namespace_prefix, "nbe-e2e");
        assert!(config.teardown.on_success);
        assert!(config.teardown.on_failure);
        assert_eq!(config.timing.build_finished, StepTiming::new(60, 500));
        assert_eq!(config.timing.binding_deleted, TimingConfig::default().binding_deleted);
    }

    #[test]
    fn load_reads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "namespace_prefix = \"rehearsal\"").unwrap();

        let config = SuiteConfig::load(file.path()).unwrap();
        assert_eq!(config.namespace_prefix, "rehearsal");
    }

    #[test]
    fn load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing.build_signed]\ntimeout_secs = 10\ninterval_millis = 0").unwrap();

        let err = SuiteConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SuiteConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn teardown_policy_applies_by_outcome() {
        let policy = TeardownPolicy::default();
        assert!(policy.applies(false));
        assert!(!policy.applies(true));
    }
}
