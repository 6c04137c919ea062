//! Built-in regex pattern analyzer.
//!
//! Line-oriented scanning for comment markers, hardcoded credentials, and
//! dynamic evaluation. Deliberately simple; it exists so a default engine
//! produces findings without external plugins, and it exercises the same
//! contract every external plugin implements.

use super::{AnalyzerPlugin, PluginMetadata};
use crate::core::{Issue, IssueLocation, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static TODO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(TODO|FIXME|HACK|XXX|BUG)\b[:\s]").unwrap());

static SECRET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(password|passwd|api[_-]?key|secret|token)\s*[:=]\s*["'][^"']{4,}["']"#)
        .unwrap()
});

static EVAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\beval\s*\(").unwrap());

/// Regex-driven analyzer over raw file contents.
#[derive(Debug, Default)]
pub struct PatternAnalyzer;

impl PatternAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn scan_file(&self, path: &Path, content: &str) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line_number = index + 1;

            if let Some(found) = TODO_RE.find(line) {
                issues.push(
                    Issue::new(
                        Severity::Warning,
                        format!("Unresolved marker: {}", line.trim()),
                        "no-todo",
                        "maintainability",
                        IssueLocation::new(path, line_number, found.start() + 1),
                    )
                    .with_tags(vec!["maintainability".into(), "debt".into()]),
                );
            }

            if let Some(found) = SECRET_RE.find(line) {
                issues.push(
                    Issue::new(
                        Severity::Error,
                        "Possible hardcoded credential",
                        "no-hardcoded-secret",
                        "security",
                        IssueLocation::new(path, line_number, found.start() + 1),
                    )
                    .with_tags(vec!["security".into(), "credentials".into()])
                    .with_cwe("CWE-798")
                    .with_suggestion("Move the credential to a secret store or env var"),
                );
            }

            if let Some(found) = EVAL_RE.find(line) {
                issues.push(
                    Issue::new(
                        Severity::Error,
                        "Dynamic evaluation of code",
                        "no-eval",
                        "security",
                        IssueLocation::new(path, line_number, found.start() + 1),
                    )
                    .with_tags(vec!["security".into(), "injection".into()])
                    .with_cwe("CWE-95"),
                );
            }
        }
        issues
    }
}

impl AnalyzerPlugin for PatternAnalyzer {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new("patterns", "1.0.0", "Regex pattern scanning")
    }

    fn analyze(&self, files: &[PathBuf]) -> anyhow::Result<Vec<Issue>> {
        let mut issues = Vec::new();
        for path in files {
            // Binary or unreadable files are skipped, not fatal.
            match std::fs::read_to_string(path) {
                Ok(content) => issues.extend(self.scan_file(path, &content)),
                Err(e) => log::debug!("skipping {}: {}", path.display(), e),
            }
        }
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_finds_todo_markers() {
        let analyzer = PatternAnalyzer::new();
        let content = indoc! {r#"
            fn main() {
                // TODO: handle errors
                println!("hi");
            }
        "#};
        let issues = analyzer.scan_file(Path::new("src/main.rs"), content);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "no-todo");
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].location.line, 2);
    }

    #[test]
    fn test_finds_hardcoded_secret() {
        let analyzer = PatternAnalyzer::new();
        let content = "const API_KEY = \"sk-1234567890\";\n";
        let issues = analyzer.scan_file(Path::new("config.js"), content);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "no-hardcoded-secret");
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].cwe.as_deref(), Some("CWE-798"));
    }

    #[test]
    fn test_finds_eval() {
        let analyzer = PatternAnalyzer::new();
        let issues = analyzer.scan_file(Path::new("app.py"), "eval(user_input)\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "no-eval");
        assert!(issues[0].has_tag("security"));
    }

    #[test]
    fn test_clean_file_has_no_issues() {
        let analyzer = PatternAnalyzer::new();
        let issues = analyzer.scan_file(Path::new("lib.rs"), "pub fn add(a: i32, b: i32) -> i32 { a + b }\n");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_analyze_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.ts");
        std::fs::write(&file, "// FIXME: flaky\neval(input)\n").unwrap();
        let analyzer = PatternAnalyzer::new();
        let issues = analyzer.analyze(&[file]).unwrap();
        assert_eq!(issues.len(), 2);
    }
}
