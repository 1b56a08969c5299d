//! File classification: decide which files get rendered.
//!
//! Walks the source tree in deterministic (lexicographic) order, applying the
//! ignore rules plus a content-based binary check. The walk respects
//! `.gitignore` files and skips hidden entries, matching what a reader would
//! consider "the source code" of a repository.

use crate::acquire::SourceTree;
use crate::config::IgnoreConfig;
use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use ignore::WalkBuilder;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Number of prefix bytes sampled when sniffing for binary content.
const BINARY_SNIFF_LEN: usize = 8192;

/// One file that passed classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the source tree root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Collect the ordered list of files to render.
///
/// Files are returned in sorted path order so repeated runs over an unchanged
/// tree enumerate identically. Exclusions (ignore rules, size, binary content)
/// are logged with their reason and never abort the walk.
pub fn collect_files(tree: &SourceTree, config: &IgnoreConfig) -> Result<Vec<FileRecord>> {
    let mut records = Vec::new();

    let walker = WalkBuilder::new(&tree.root)
        .sort_by_file_path(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        // per-entry errors (unreadable directories, broken links) are
        // isolated: report and keep walking
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(&tree.root)
            .with_context(|| {
                format!(
                    "Failed to relativize {} against {}",
                    entry.path().display(),
                    tree.root.display()
                )
            })?
            .to_path_buf();

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                log::warn!("skipping {} (metadata unreadable: {e})", rel.display());
                continue;
            }
        };

        if let Some(reason) = config.exclude_reason(&rel, size) {
            log::debug!(
                "skipping {} ({reason}, {:.1})",
                rel.display(),
                Byte::from_u64(size).get_appropriate_unit(UnitType::Binary)
            );
            continue;
        }

        match is_binary(entry.path()) {
            Ok(true) => {
                log::debug!("skipping {} (binary content)", rel.display());
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                log::warn!("skipping {}: {e:#}", rel.display());
                continue;
            }
        }

        records.push(FileRecord { path: rel, size });
    }

    Ok(records)
}

/// Sniff a file's prefix for binary content.
///
/// A null byte in the first 8 KiB marks the file as binary, the same heuristic
/// git uses for diff generation.
fn is_binary(path: &Path) -> Result<bool> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {} for sniffing", path.display()))?;
    let mut buf = [0u8; BINARY_SNIFF_LEN];
    let n = file
        .read(&mut buf)
        .with_context(|| format!("Failed to read prefix of {}", path.display()))?;
    Ok(buf[..n].contains(&0))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::IgnoreConfig;

    fn tree_from(dir: &tempfile::TempDir) -> SourceTree {
        SourceTree {
            root: dir.path().to_path_buf(),
            name: "fixture".to_string(),
        }
    }

    #[test]
    fn ignored_extensions_are_excluded() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").expect("can write");
        std::fs::write(dir.path().join("b.rs"), "fn b() {}").expect("can write");
        std::fs::write(dir.path().join("c.rs"), "fn c() {}").expect("can write");
        std::fs::write(dir.path().join("debug.log"), "noise").expect("can write");

        let config: IgnoreConfig =
            serde_json::from_str(r#"{ "ignoredExtensions": [".log"] }"#).expect("can parse");

        let records = collect_files(&tree_from(&dir), &config).expect("can collect");
        let names: Vec<_> = records.iter().map(|r| r.path.clone()).collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.rs"),
                PathBuf::from("b.rs"),
                PathBuf::from("c.rs")
            ]
        );
    }

    #[test]
    fn oversized_files_are_excluded_without_failing_the_walk() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        std::fs::write(dir.path().join("big.txt"), vec![b'x'; 600 * 1024]).expect("can write");
        std::fs::write(dir.path().join("small.txt"), "ok").expect("can write");

        let config: IgnoreConfig =
            serde_json::from_str(r#"{ "maxFileSizeKB": 500 }"#).expect("can parse");

        let records = collect_files(&tree_from(&dir), &config).expect("can collect");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, PathBuf::from("small.txt"));
    }

    #[test]
    fn binary_files_are_excluded_by_content() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        std::fs::write(dir.path().join("blob.dat"), b"\x00\x01\x02binary").expect("can write");
        std::fs::write(dir.path().join("text.dat"), "plain text").expect("can write");

        let records =
            collect_files(&tree_from(&dir), &IgnoreConfig::default()).expect("can collect");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, PathBuf::from("text.dat"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_entries_are_skipped_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("can create temp dir");
        std::fs::write(dir.path().join("ok.txt"), "fine").expect("can write");

        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).expect("can create dir");
        std::fs::write(locked.join("secret.txt"), "hidden away").expect("can write");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000))
            .expect("can lock dir");

        // when running as root the permission bits don't bite; nothing to
        // verify in that case
        if std::fs::read_dir(&locked).is_ok() {
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))
                .expect("can unlock dir");
            return;
        }

        let records = collect_files(&tree_from(&dir), &IgnoreConfig::default())
            .expect("walk survives unreadable entries");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, PathBuf::from("ok.txt"));

        // restore permissions so the fixture can be removed
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))
            .expect("can unlock dir");
    }

    #[test]
    fn enumeration_is_deterministic_across_runs() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        std::fs::create_dir_all(dir.path().join("src")).expect("can create dir");
        std::fs::write(dir.path().join("zeta.txt"), "z").expect("can write");
        std::fs::write(dir.path().join("alpha.txt"), "a").expect("can write");
        std::fs::write(dir.path().join("src/mid.rs"), "m").expect("can write");

        let config = IgnoreConfig::default();
        let first = collect_files(&tree_from(&dir), &config).expect("can collect");
        let second = collect_files(&tree_from(&dir), &config).expect("can collect");
        assert_eq!(first, second);
        // sorted path order
        let mut sorted = first.clone();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(first, sorted);
    }
}
