use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Minimum acceptable average coverage when nothing else is configured
pub const DEFAULT_THRESHOLD: f64 = 50.0;

const DEFAULT_MODULE_PATH: &str = "common/artifact-manager/";
const DEFAULT_SOURCE_ROOT: &str = "src/main/java/";
const DEFAULT_REPORT_FILE: &str = "target/site/jacoco/jacoco.xml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base branch ref, the merge target of the pull request
    pub base: Option<String>,
    /// Head branch ref, the branch under review
    pub head: Option<String>,
    /// `owner/repo` slug used to build file links in the results table
    pub repository: Option<String>,
    /// Minimum acceptable average coverage, in percent
    pub threshold: f64,
    /// Path prefix of the module the coverage report belongs to
    pub module_path: String,
    /// Segment between the module path and the package directories
    pub source_root: String,
    /// Location of the JaCoCo XML report; defaults to the standard
    /// target/site/jacoco/jacoco.xml under the module path
    pub report: Option<PathBuf>,
    /// How changed files are discovered: "cli" spawns the git binary,
    /// "libgit2" diffs in-process without one
    pub diff_backend: DiffBackend,
    /// Exit non-zero when the average coverage is below the threshold
    pub fail_below_threshold: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffBackend {
    #[default]
    Cli,
    Libgit2,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base: None,
            head: None,
            repository: None,
            threshold: DEFAULT_THRESHOLD,
            module_path: DEFAULT_MODULE_PATH.to_string(),
            source_root: DEFAULT_SOURCE_ROOT.to_string(),
            report: None,
            diff_backend: DiffBackend::Cli,
            fail_below_threshold: true,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse covdiff.toml")?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.threshold) {
            anyhow::bail!(
                "Threshold must be between 0 and 100, got {}",
                self.threshold
            );
        }

        Ok(())
    }

    /// Layer the GitHub Actions environment over file values. CLI flags are
    /// applied after this and win over both.
    pub fn apply_env(&mut self) {
        if let Some(base) = non_empty_var("GITHUB_BASE_REF") {
            self.base = Some(base);
        }
        if let Some(head) = non_empty_var("GITHUB_HEAD_REF") {
            self.head = Some(head);
        }
        if let Some(repo) = non_empty_var("GITHUB_REPOSITORY") {
            self.repository = Some(repo);
        }
    }

    /// Branch refs to diff, or an error naming the missing one
    pub fn refs(&self) -> Result<(String, String)> {
        let base = self.base.clone().ok_or_else(|| {
            anyhow::anyhow!("No base branch: set --base, GITHUB_BASE_REF or `base` in covdiff.toml")
        })?;
        let head = self.head.clone().ok_or_else(|| {
            anyhow::anyhow!("No head branch: set --head, GITHUB_HEAD_REF or `head` in covdiff.toml")
        })?;

        Ok((base, head))
    }

    pub fn report_path(&self) -> PathBuf {
        self.report
            .clone()
            .unwrap_or_else(|| Path::new(&self.module_path).join(DEFAULT_REPORT_FILE))
    }
}

/// GitHub Actions sets GITHUB_BASE_REF to an empty string outside pull
/// requests; treat that the same as unset
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
base = "main"
head = "feature/coverage"
repository = "acme/widgets"
threshold = 65.0
module_path = "services/billing/"
diff_backend = "libgit2"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.base.as_deref(), Some("main"));
        assert_eq!(config.head.as_deref(), Some("feature/coverage"));
        assert_eq!(config.repository.as_deref(), Some("acme/widgets"));
        assert_eq!(config.threshold, 65.0);
        assert_eq!(config.module_path, "services/billing/");
        assert_eq!(config.diff_backend, DiffBackend::Libgit2);
        // Unset fields keep their defaults
        assert_eq!(config.source_root, "src/main/java/");
        assert!(config.fail_below_threshold);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.module_path, "common/artifact-manager/");
        assert_eq!(config.diff_backend, DiffBackend::Cli);
        assert!(config.base.is_none());
        assert!(config.repository.is_none());
    }

    #[test]
    fn test_default_report_path() {
        let config = Config::default();
        assert_eq!(
            config.report_path(),
            PathBuf::from("common/artifact-manager/target/site/jacoco/jacoco.xml")
        );

        let explicit = Config {
            report: Some(PathBuf::from("build/jacoco.xml")),
            ..Config::default()
        };
        assert_eq!(explicit.report_path(), PathBuf::from("build/jacoco.xml"));
    }

    #[test]
    fn test_threshold_validation() {
        let config = Config {
            threshold: 120.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            threshold: -1.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_refs_is_an_error() {
        let config = Config::default();
        let err = config.refs().unwrap_err().to_string();
        assert!(err.contains("base branch"));

        let config = Config {
            base: Some("main".to_string()),
            ..Config::default()
        };
        let err = config.refs().unwrap_err().to_string();
        assert!(err.contains("head branch"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covdiff.toml");
        fs::write(&path, "threshold = 80.0\nbase = \"develop\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.threshold, 80.0);
        assert_eq!(config.base.as_deref(), Some("develop"));
    }

    #[test]
    fn test_load_rejects_invalid_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covdiff.toml");
        fs::write(&path, "threshold = 101.0\n").unwrap();

        assert!(Config::load(&path).is_err());
    }
}
