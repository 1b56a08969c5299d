//! Ignore-rule configuration.
//!
//! Exclusion rules are loaded from a JSON file named `repo2pdf.ignore` (the
//! canonical name) or `ignore.json` (a legacy alias, consulted only when the
//! canonical file is absent). A missing or malformed file is never fatal: the
//! built-in defaults apply and the run continues.
//!
//! Keys the file supplies replace the corresponding defaults; keys it omits
//! keep their defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Canonical name of the ignore configuration file.
pub const IGNORE_FILE: &str = "repo2pdf.ignore";

/// Legacy alias, kept for configs written against older releases.
pub const LEGACY_IGNORE_FILE: &str = "ignore.json";

/// Why a file was excluded from rendering.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExcludeReason {
    IgnoredName,
    IgnoredExtension,
    IgnoredPath,
    TooLarge,
}

impl std::fmt::Display for ExcludeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExcludeReason::IgnoredName => write!(f, "ignored file name"),
            ExcludeReason::IgnoredExtension => write!(f, "ignored extension"),
            ExcludeReason::IgnoredPath => write!(f, "ignored path"),
            ExcludeReason::TooLarge => write!(f, "exceeds size limit"),
        }
    }
}

/// Exclusion rules and batching limits for one run. Loaded once, immutable
/// thereafter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreConfig {
    /// Exact file names to exclude (e.g. `package-lock.json`)
    #[serde(default = "default_ignored_files")]
    pub ignored_files: Vec<String>,

    /// Extensions to exclude, with or without the leading dot
    #[serde(default = "default_ignored_extensions")]
    pub ignored_extensions: Vec<String>,

    /// Path fragments to exclude; a file is excluded when any of its ancestor
    /// path components equals a fragment, or its repository-relative path
    /// starts with one
    #[serde(default = "default_ignored_paths")]
    pub ignored_paths: Vec<String>,

    /// Largest file that will be rendered, in kilobytes
    #[serde(rename = "maxFileSizeKB", default = "default_max_file_size_kb")]
    pub max_file_size_kb: u64,

    /// Most files rendered into a single partial document
    #[serde(default = "default_max_files_per_batch")]
    pub max_files_per_batch: usize,
}

fn default_ignored_files() -> Vec<String> {
    [
        ".DS_Store",
        "package-lock.json",
        "yarn.lock",
        "pnpm-lock.yaml",
        "Cargo.lock",
        IGNORE_FILE,
        LEGACY_IGNORE_FILE,
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_ignored_extensions() -> Vec<String> {
    [
        ".png", ".jpg", ".jpeg", ".gif", ".ico", ".svg", ".pdf", ".zip", ".gz", ".tar", ".woff",
        ".woff2", ".ttf", ".otf", ".eot", ".so", ".dylib", ".dll", ".exe", ".min.js", ".map",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_ignored_paths() -> Vec<String> {
    [
        ".git",
        "node_modules",
        "target",
        "dist",
        "build",
        "vendor",
        "__pycache__",
        ".idea",
        ".vscode",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_max_file_size_kb() -> u64 {
    500
}

fn default_max_files_per_batch() -> usize {
    50
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        IgnoreConfig {
            ignored_files: default_ignored_files(),
            ignored_extensions: default_ignored_extensions(),
            ignored_paths: default_ignored_paths(),
            max_file_size_kb: default_max_file_size_kb(),
            max_files_per_batch: default_max_files_per_batch(),
        }
    }
}

impl IgnoreConfig {
    /// Load the ignore configuration for a run.
    ///
    /// `explicit` is the `--ignore-file` override; when given, a missing or
    /// malformed file is still only a warning. Otherwise the repository root is
    /// probed for `repo2pdf.ignore` then `ignore.json`, and the defaults apply
    /// when neither exists.
    pub fn load(explicit: Option<&Path>, repo_root: &Path) -> IgnoreConfig {
        let candidate = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => [IGNORE_FILE, LEGACY_IGNORE_FILE]
                .iter()
                .map(|name| repo_root.join(name))
                .find(|path| path.is_file()),
        };

        let Some(path) = candidate else {
            log::debug!("no ignore file found, using built-in defaults");
            return IgnoreConfig::default();
        };

        match IgnoreConfig::load_from(&path) {
            Ok(config) => {
                log::info!("loaded ignore rules from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!(
                    "failed to load ignore file {}, using built-in defaults: {e:#}",
                    path.display()
                );
                IgnoreConfig::default()
            }
        }
    }

    fn load_from(path: &Path) -> Result<IgnoreConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ignore file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse ignore file {} as JSON", path.display()))
    }

    /// The configured size limit, in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_kb * 1024
    }

    /// Decide whether a file is excluded by these rules.
    ///
    /// `rel_path` is the file's path relative to the repository root; `size` is
    /// its length in bytes. Returns `None` when the file passes. Binary
    /// detection is content-based and handled by the classifier, not here.
    pub fn exclude_reason(&self, rel_path: &Path, size: u64) -> Option<ExcludeReason> {
        let file_name = rel_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.ignored_files.iter().any(|f| f == file_name.as_ref()) {
            return Some(ExcludeReason::IgnoredName);
        }

        if self
            .ignored_extensions
            .iter()
            .any(|ext| matches_extension(&file_name, ext))
        {
            return Some(ExcludeReason::IgnoredExtension);
        }

        for fragment in &self.ignored_paths {
            let component_match = rel_path
                .components()
                .any(|c| c.as_os_str().to_string_lossy() == *fragment);
            if component_match || rel_path.starts_with(fragment) {
                return Some(ExcludeReason::IgnoredPath);
            }
        }

        if size > self.max_file_size_bytes() {
            return Some(ExcludeReason::TooLarge);
        }

        None
    }
}

/// Match a configured extension against a file name.
///
/// Extensions are suffix matches against the full name, so compound suffixes
/// like `.min.js` work. A missing leading dot is tolerated.
fn matches_extension(file_name: &str, ext: &str) -> bool {
    if ext.is_empty() {
        return false;
    }
    if ext.starts_with('.') {
        file_name.ends_with(ext)
    } else {
        file_name.ends_with(&format!(".{ext}"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_exclude_common_noise() {
        let config = IgnoreConfig::default();
        assert_eq!(
            config.exclude_reason(Path::new("package-lock.json"), 10),
            Some(ExcludeReason::IgnoredName)
        );
        assert_eq!(
            config.exclude_reason(Path::new("assets/logo.png"), 10),
            Some(ExcludeReason::IgnoredExtension)
        );
        assert_eq!(
            config.exclude_reason(Path::new("node_modules/left-pad/index.js"), 10),
            Some(ExcludeReason::IgnoredPath)
        );
        assert_eq!(config.exclude_reason(Path::new("src/main.rs"), 10), None);
    }

    #[test]
    fn size_limit_is_in_kilobytes() {
        let config = IgnoreConfig {
            max_file_size_kb: 500,
            ..IgnoreConfig::default()
        };
        assert_eq!(config.exclude_reason(Path::new("a.rs"), 500 * 1024), None);
        assert_eq!(
            config.exclude_reason(Path::new("a.rs"), 600 * 1024),
            Some(ExcludeReason::TooLarge)
        );
    }

    #[test]
    fn extensions_match_with_or_without_dot() {
        assert!(matches_extension("app.log", ".log"));
        assert!(matches_extension("app.log", "log"));
        assert!(matches_extension("app.min.js", ".min.js"));
        assert!(!matches_extension("app.js", ".min.js"));
        assert!(!matches_extension("catalog", ".log"));
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_keys() {
        let config: IgnoreConfig =
            serde_json::from_str(r#"{ "ignoredExtensions": [".log"] }"#).expect("can parse");
        assert_eq!(config.ignored_extensions, vec![".log".to_string()]);
        // untouched keys keep their defaults
        assert_eq!(config.max_file_size_kb, 500);
        assert!(config.ignored_paths.contains(&".git".to_string()));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        std::fs::write(dir.path().join(IGNORE_FILE), "{ not json").expect("can write");
        let config = IgnoreConfig::load(None, dir.path());
        assert_eq!(config.max_file_size_kb, 500);
    }

    #[test]
    fn legacy_alias_is_consulted_when_canonical_is_absent() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        std::fs::write(
            dir.path().join(LEGACY_IGNORE_FILE),
            r#"{ "maxFileSizeKB": 42 }"#,
        )
        .expect("can write");
        let config = IgnoreConfig::load(None, dir.path());
        assert_eq!(config.max_file_size_kb, 42);
    }

    #[test]
    fn canonical_file_wins_over_legacy_alias() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        std::fs::write(dir.path().join(IGNORE_FILE), r#"{ "maxFileSizeKB": 1 }"#)
            .expect("can write");
        std::fs::write(
            dir.path().join(LEGACY_IGNORE_FILE),
            r#"{ "maxFileSizeKB": 2 }"#,
        )
        .expect("can write");
        let config = IgnoreConfig::load(None, dir.path());
        assert_eq!(config.max_file_size_kb, 1);
    }
}
