//! Source acquisition: turn the user's input string into a local directory
//! tree.
//!
//! The input is classified by form: a git URL is cloned (optionally shallow)
//! into the run's temporary directory, a ZIP archive is extracted there, and a
//! local directory is used in place with no copy. Acquisition failures are
//! fatal; temporary state is owned by the [`RunContext`](crate::context) and
//! cleaned up regardless of outcome.

use crate::context::RunContext;
use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};

/// What kind of source the input string names.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SourceKind {
    /// A remote git repository URL (https, ssh, or git protocol)
    GitUrl(String),
    /// An existing local directory
    LocalDir(PathBuf),
    /// An existing local ZIP archive
    ZipArchive(PathBuf),
}

/// A resolved local tree of candidate files.
pub struct SourceTree {
    /// Root directory containing the files to process
    pub root: PathBuf,
    /// Display name, used to derive the default output file name
    pub name: String,
}

/// Classify the source input by form.
///
/// URLs are recognised by scheme (`https://`, `http://`, `git://`, `ssh://`)
/// or the scp-like `git@host:` form; everything else must exist locally as a
/// directory or a `.zip` file.
pub fn classify(input: &str) -> Result<SourceKind> {
    let looks_like_url = input.starts_with("https://")
        || input.starts_with("http://")
        || input.starts_with("git://")
        || input.starts_with("ssh://")
        || (input.starts_with("git@") && input.contains(':'));

    if looks_like_url {
        return Ok(SourceKind::GitUrl(input.to_string()));
    }

    let path = Path::new(input);
    if path.is_dir() {
        return Ok(SourceKind::LocalDir(path.to_path_buf()));
    }
    if path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    {
        return Ok(SourceKind::ZipArchive(path.to_path_buf()));
    }

    Err(anyhow!(
        "`{input}` is not a git URL, an existing directory, or a ZIP archive"
    ))
}

/// Classify the input and resolve it to a local [`SourceTree`].
pub fn resolve(input: &str, ctx: &RunContext, shallow: bool) -> Result<SourceTree> {
    let kind = classify(input)?;
    acquire(&kind, ctx, shallow)
}

/// Resolve a classified source to a local [`SourceTree`].
pub fn acquire(kind: &SourceKind, ctx: &RunContext, shallow: bool) -> Result<SourceTree> {
    match kind {
        SourceKind::GitUrl(url) => clone_repository(url, ctx, shallow),
        SourceKind::LocalDir(path) => local_tree(path),
        SourceKind::ZipArchive(path) => extract_archive(path, ctx),
    }
}

fn clone_repository(url: &str, ctx: &RunContext, shallow: bool) -> Result<SourceTree> {
    let name = repository_name(url);
    let dest = ctx.subdir("clone")?.join(&name);

    log::info!(
        "cloning {url} into {} ({})",
        dest.display(),
        if shallow { "shallow" } else { "full history" }
    );

    let mut fetch = git2::FetchOptions::new();
    if shallow {
        fetch.depth(1);
    }
    git2::build::RepoBuilder::new()
        .fetch_options(fetch)
        .clone(url, &dest)
        .with_context(|| format!("Failed to clone {url}"))?;

    Ok(SourceTree { root: dest, name })
}

fn local_tree(path: &Path) -> Result<SourceTree> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize {}", path.display()))?;
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("Directory {} doesn't have a name?", root.display()))?;
    Ok(SourceTree { root, name })
}

fn extract_archive(path: &Path, ctx: &RunContext) -> Result<SourceTree> {
    let name = path
        .file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("Archive {} doesn't have a name?", path.display()))?;
    let dest = ctx.subdir("extract")?;

    log::info!("extracting {} into {}", path.display(), dest.display());

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open archive {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read {} as a ZIP archive", path.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read archive entry {i}"))?;

        // entries that escape the extraction root are rejected outright
        let Some(rel) = entry.enclosed_name() else {
            bail!(
                "archive entry `{}` escapes the extraction directory",
                entry.name()
            );
        };

        let out = dest.join(rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&out)
                .with_context(|| format!("Failed to create directory {}", out.display()))?;
        } else {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
            let mut writer = std::fs::File::create(&out)
                .with_context(|| format!("Failed to create {}", out.display()))?;
            std::io::copy(&mut entry, &mut writer)
                .with_context(|| format!("Failed to extract {}", out.display()))?;
        }
    }

    Ok(SourceTree {
        root: strip_wrapper_dir(dest),
        name,
    })
}

/// GitHub archives wrap everything in a single `repo-ref/` directory; when the
/// extraction root contains exactly one directory and nothing else, descend
/// into it.
fn strip_wrapper_dir(root: PathBuf) -> PathBuf {
    let entries: Vec<_> = match std::fs::read_dir(&root) {
        Ok(iter) => iter.flatten().collect(),
        Err(_) => return root,
    };

    match entries.as_slice() {
        [only] if only.path().is_dir() => only.path(),
        _ => root,
    }
}

/// Derive a repository name from its clone URL.
fn repository_name(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed)
        .trim_end_matches(".git");
    if last.is_empty() {
        "repository".to_string()
    } else {
        last.to_string()
    }
}
