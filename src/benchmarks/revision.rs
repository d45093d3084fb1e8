use anyhow::{Context, Result};
use log::debug;

use crate::command::CommandExecutor;
use crate::config::Variant;

/// Resolves the source revision of a variant's toolchain
pub trait RevisionSource {
    fn revision(&self, variant: &Variant) -> Result<String>;
}

/// Uses the most recent `git log` entry of the toolchain root
#[derive(Debug, Default, Clone, Copy)]
pub struct GitRevision;

impl RevisionSource for GitRevision {
    fn revision(&self, variant: &Variant) -> Result<String> {
        let root = variant.toolchain_root.to_string_lossy();
        let output = CommandExecutor::new()
            .execute_command_with_args("git", &["-C", &root, "log", "-1", "--oneline"])
            .with_context(|| format!("git log failed in {root}"))?
            .with_context(|| format!("git log did not run in {root}"))?;

        let text = String::from_utf8_lossy(&output.stdout);
        let revision = parse_revision(&text).with_context(|| {
            format!(
                "Can't run git log in repo {}: bad output {:?}",
                variant.toolchain_root.display(),
                text
            )
        })?;
        debug!("Variant {} is at revision {}", variant.tag, revision);
        Ok(revision)
    }
}

/// A revision known in advance, for toolchains outside version control
#[derive(Debug, Clone)]
pub struct FixedRevision(pub String);

impl RevisionSource for FixedRevision {
    fn revision(&self, _variant: &Variant) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// First whitespace-delimited token of a one-line log entry
fn parse_revision(log_line: &str) -> Option<String> {
    log_line.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::tempdir;

    #[test]
    fn test_parse_revision() {
        assert_eq!(
            parse_revision("1a2b3c4d cmd/link: speed up dwarf gen\n"),
            Some("1a2b3c4d".to_string())
        );
        assert_eq!(parse_revision(""), None);
        assert_eq!(parse_revision("   \n"), None);
    }

    #[test]
    fn test_fixed_revision() {
        let variant = Variant::new("master", "/nowhere");
        assert_eq!(
            FixedRevision("abc123".to_string()).revision(&variant).unwrap(),
            "abc123"
        );
    }

    #[test]
    fn test_git_revision_of_missing_root() {
        let dir = tempdir().unwrap();
        let variant = Variant::new("gone", dir.path().join("missing"));
        let message = format!("{:#}", GitRevision.revision(&variant).unwrap_err());
        assert!(message.starts_with("git log failed in "), "{message}");
        assert!(message.contains("missing"), "{message}");
        assert!(!message.contains('\n'), "{message}");
    }

    #[test]
    fn test_git_revision_of_repository() {
        let dir = tempdir().unwrap();
        let git = |args: &[&str]| {
            let status = Command::new("git")
                .arg("-C")
                .arg(dir.path())
                .args(["-c", "user.name=bench", "-c", "user.email=bench@example.com"])
                .args(["-c", "commit.gpgsign=false"])
                .args(args)
                .status()
                .unwrap();
            assert!(status.success());
        };
        git(&["init", "-q"]);
        std::fs::write(dir.path().join("VERSION"), "devel\n").unwrap();
        git(&["add", "VERSION"]);
        git(&["commit", "-q", "-m", "initial import"]);

        let variant = Variant::new("repo", dir.path());
        let revision = GitRevision.revision(&variant).unwrap();
        assert!(!revision.is_empty());
        assert!(revision.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
