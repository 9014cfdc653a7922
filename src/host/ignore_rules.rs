//! Determines whether a project-relative path is part of the project as
//! far as the language-server host is concerned.
//!
//! Three independent checks, any of which is sufficient to ignore a path:
//! a git-wildmatch pattern match, a "language-hidden" directory component,
//! or (for files, when requested) a filename the active language's source
//! matcher doesn't recognize.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::language;

/// Directory names considered build/artifact/hidden output for a language,
/// beyond the universal "starts with a dot" rule. Grounded in the per-
/// language ignored-directory tables of the system this was ported from,
/// which go further than a single generic list.
fn language_hidden_dirs(language_id: &str) -> &'static [&'static str] {
    match language_id {
        "java" | "kotlin" | "scala" => &["target", "build", "bin", "out", "classes"],
        "javascript" | "typescript" => &["node_modules", "dist", "build", "coverage"],
        "python" => &[".venv", "venv", "__pycache__", ".mypy_cache", ".pytest_cache", ".tox"],
        "swift" => &[".build", ".swiftpm"],
        "terraform" => &[".terraform", "terraform.tfstate.d"],
        "rust" => &["target"],
        "go" => &["vendor"],
        _ => &["node_modules", "dist", "build", "target", "vendor"],
    }
}

pub fn is_language_hidden_dirname(dirname: &str, language_id: &str) -> bool {
    if dirname.starts_with('.') {
        return true;
    }
    language_hidden_dirs(language_id).contains(&dirname)
}

pub struct IgnoreSpec {
    matcher: Gitignore,
    language_id: String,
}

impl IgnoreSpec {
    /// Builds the matcher from an explicit pattern list plus, when present,
    /// the project root's own `.gitignore` file — honoring the host
    /// project's existing ignore file in addition to configured patterns.
    pub fn build(project_root: &Path, patterns: &[String], language_id: &str) -> Self {
        let mut builder = GitignoreBuilder::new(project_root);
        for pattern in patterns {
            let _ = builder.add_line(None, pattern);
        }
        let gitignore_path = project_root.join(".gitignore");
        if gitignore_path.exists() {
            let _ = builder.add(gitignore_path);
        }
        let matcher = builder.build().unwrap_or_else(|_| Gitignore::empty());
        Self {
            matcher,
            language_id: language_id.to_string(),
        }
    }

    /// True if `relative_path` should be treated as outside the project for
    /// language-server purposes.
    pub fn is_ignored(&self, project_root: &Path, relative_path: &str, ignore_unsupported_files: bool) -> bool {
        let abs_path = project_root.join(relative_path);
        let is_file = abs_path.is_file();

        if is_file && ignore_unsupported_files && !language::matches_language(relative_path, &self.language_id) {
            return true;
        }

        let rel = Path::new(relative_path);
        let dir_parts: Vec<&str> = if is_file {
            rel.parent()
                .map(|p| p.components().filter_map(|c| c.as_os_str().to_str()).collect())
                .unwrap_or_default()
        } else {
            rel.components().filter_map(|c| c.as_os_str().to_str()).collect()
        };
        for part in dir_parts {
            if part.is_empty() {
                continue;
            }
            if is_language_hidden_dirname(part, &self.language_id) {
                return true;
            }
        }

        self.matcher.matched(relative_path, is_file).is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn dotdirs_are_always_hidden() {
        assert!(is_language_hidden_dirname(".git", "rust"));
        assert!(is_language_hidden_dirname("target", "rust"));
        assert!(!is_language_hidden_dirname("src", "rust"));
    }

    #[test]
    fn explicit_pattern_ignores_matching_path() {
        let root = PathBuf::from("/tmp/nonexistent-project-root-for-test");
        let spec = IgnoreSpec::build(&root, &["*.generated.rs".to_string()], "rust");
        assert!(spec.matcher.matched("foo.generated.rs", false).is_ignore());
    }
}
