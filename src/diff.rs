//! Changed-file discovery
//!
//! Answers one question: which files changed on `head` since it diverged
//! from `base`? The answer comes from either the git binary or libgit2,
//! behind a trait so tests can drive the pipeline without a repository.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Source of the changed-file list for a pair of refs
pub trait DiffSource {
    /// List the paths changed on `head` since the common ancestor with
    /// `base`, in the order the diff emits them
    fn changed_files(&self, base: &str, head: &str) -> Result<Vec<String>>;
}

/// Spawns `git diff --name-only <base>...<head>` and captures its output
pub struct GitCliDiff {
    work_dir: PathBuf,
}

impl GitCliDiff {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

impl DiffSource for GitCliDiff {
    fn changed_files(&self, base: &str, head: &str) -> Result<Vec<String>> {
        let range = format!("{}...{}", base, head);

        let output = Command::new("git")
            .args(["diff", "--name-only", &range])
            .current_dir(&self.work_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .context("Failed to execute git diff")?;

        // git diagnostics are kept in the capture, matching a merged
        // stdout+stderr stream
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(split_lines(&combined))
    }
}

/// Diffs merge-base(base, head) against head in-process, for hosts
/// without a git binary on PATH
pub struct LibGitDiff {
    repo_dir: PathBuf,
}

impl LibGitDiff {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    fn resolve_commit<'r>(repo: &'r git2::Repository, name: &str) -> Result<git2::Commit<'r>> {
        let obj = repo
            .revparse_single(name)
            .with_context(|| format!("Failed to resolve reference: {}", name))?;

        Ok(obj.peel_to_commit()?)
    }
}

impl DiffSource for LibGitDiff {
    fn changed_files(&self, base: &str, head: &str) -> Result<Vec<String>> {
        let repo = git2::Repository::discover(&self.repo_dir).with_context(|| {
            format!("Failed to find git repository at {}", self.repo_dir.display())
        })?;

        let base_commit = Self::resolve_commit(&repo, base)?;
        let head_commit = Self::resolve_commit(&repo, head)?;

        // Three-dot semantics: diff from the merge base, not from base itself
        let ancestor = repo
            .merge_base(base_commit.id(), head_commit.id())
            .with_context(|| format!("No common ancestor between {} and {}", base, head))?;
        let ancestor_tree = repo.find_commit(ancestor)?.tree()?;
        let head_tree = head_commit.tree()?;

        let mut diff_opts = git2::DiffOptions::new();
        let diff =
            repo.diff_tree_to_tree(Some(&ancestor_tree), Some(&head_tree), Some(&mut diff_opts))?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut files = Vec::new();

        diff.foreach(
            &mut |delta, _| {
                if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
                    let path = path.to_string_lossy().to_string();
                    if seen.insert(path.clone()) {
                        files.push(path);
                    }
                }
                true
            },
            None,
            None,
            None,
        )?;

        Ok(files)
    }
}

/// Build the configured diff source for a working directory
pub fn diff_source(backend: crate::config::DiffBackend, work_dir: &Path) -> Box<dyn DiffSource> {
    match backend {
        crate::config::DiffBackend::Cli => Box::new(GitCliDiff::new(work_dir)),
        crate::config::DiffBackend::Libgit2 => Box::new(LibGitDiff::new(work_dir)),
    }
}

/// Split captured diff output into non-empty trimmed lines
fn split_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDiff(Vec<String>);

    impl DiffSource for FixedDiff {
        fn changed_files(&self, _base: &str, _head: &str) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_split_lines() {
        let output = "src/main/java/com/acme/Foo.java\n\n  src/main/java/com/acme/Bar.java  \n";
        assert_eq!(
            split_lines(output),
            vec![
                "src/main/java/com/acme/Foo.java".to_string(),
                "src/main/java/com/acme/Bar.java".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_lines_empty_output() {
        assert!(split_lines("").is_empty());
        assert!(split_lines("\n\n").is_empty());
    }

    #[test]
    fn test_fake_source_drives_the_trait() {
        let source = FixedDiff(vec!["a.java".to_string(), "b.java".to_string()]);
        let files = source.changed_files("main", "feature").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0], "a.java");
    }
}
