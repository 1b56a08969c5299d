//! Batch partitioning, parallel rendering, and final PDF assembly.
//!
//! The included file list is split into contiguous batches, each batch is
//! rendered to a partial PDF on a bounded worker pool (completion order is
//! free, assembly order is fixed by batch index), and the partials are merged
//! with the best available backend: the lopdf library first, then the `pdftk`
//! command-line tool, then `qpdf`. A batch that fails is skipped and reported;
//! having no merge backend at all is fatal.

use crate::acquire::SourceTree;
use crate::classify::FileRecord;
use crate::context::RunContext;
use crate::convert;
use crate::error::FatalError;
use crate::highlight::Highlighter;
use crate::render::{self, RenderMode};
use anyhow::{anyhow, Context, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// One contiguous group of files rendered together.
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    pub files: Vec<FileRecord>,
}

/// A rendered partial PDF covering one batch.
#[derive(Debug)]
pub struct PartialDocument {
    pub index: usize,
    pub path: PathBuf,
    pub rendered_files: usize,
    pub skipped_files: Vec<PathBuf>,
}

/// Partition the ordered file list into contiguous batches of at most
/// `max_files` files.
///
/// Concatenating the batches in index order reproduces the input exactly.
pub fn partition_batches(records: &[FileRecord], max_files: usize) -> Vec<Batch> {
    let max_files = max_files.max(1);
    records
        .chunks(max_files)
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            files: chunk.to_vec(),
        })
        .collect()
}

/// Everything the pipeline produced, in batch order.
pub struct RenderOutcome {
    pub partials: Vec<PartialDocument>,
    pub failed_batches: usize,
}

/// Render every batch to a partial PDF on a bounded worker pool.
///
/// Batches run in parallel with no ordering requirement on completion; the
/// returned partials are in batch-index order regardless. A batch whose
/// rendering fails entirely is skipped and reported. Fails only when nothing
/// at all rendered.
pub fn render_batches(
    tree: &SourceTree,
    batches: &[Batch],
    mode: RenderMode,
    highlighter: &Highlighter,
    converter: &Path,
    ctx: &RunContext,
    jobs: usize,
    progress: &ProgressBar,
) -> Result<RenderOutcome> {
    let work_dir = ctx.subdir("batches")?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .with_context(|| "Failed to build render worker pool")?;

    // par_iter + collect keeps input order even though completion order is free
    let results: Vec<Result<PartialDocument>> = pool.install(|| {
        batches
            .par_iter()
            .map(|batch| {
                let result =
                    render_one_batch(tree, batch, mode, highlighter, converter, &work_dir);
                progress.inc(batch.files.len() as u64);
                result
            })
            .collect()
    });

    let mut partials = Vec::new();
    let mut failed_batches = 0;
    for (batch, result) in batches.iter().zip(results) {
        match result {
            Ok(partial) => partials.push(partial),
            Err(e) => {
                failed_batches += 1;
                log::error!(
                    "batch {} ({} file(s)) failed and was skipped: {e:#}",
                    batch.index,
                    batch.files.len()
                );
            }
        }
    }

    if partials.is_empty() {
        return Err(FatalError::NothingRendered {
            batches: batches.len(),
        }
        .into());
    }

    Ok(RenderOutcome {
        partials,
        failed_batches,
    })
}

fn render_one_batch(
    tree: &SourceTree,
    batch: &Batch,
    mode: RenderMode,
    highlighter: &Highlighter,
    converter: &Path,
    work_dir: &Path,
) -> Result<PartialDocument> {
    let rendered = render::render_batch_html(tree, &batch.files, mode, highlighter);
    if rendered.rendered == 0 {
        return Err(anyhow!("no file in the batch could be rendered"));
    }

    let html_path = work_dir.join(format!("batch-{:04}.html", batch.index));
    std::fs::write(&html_path, &rendered.html)
        .with_context(|| format!("Failed to write {}", html_path.display()))?;

    let pdf_path = work_dir.join(format!("batch-{:04}.pdf", batch.index));
    convert::html_to_pdf(converter, &html_path, &pdf_path)
        .with_context(|| format!("Failed to convert batch {} to PDF", batch.index))?;

    Ok(PartialDocument {
        index: batch.index,
        path: pdf_path,
        rendered_files: rendered.rendered,
        skipped_files: rendered.skipped,
    })
}

/// A way to merge partial PDFs into the final document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeBackend {
    /// In-process merging via lopdf
    #[cfg(feature = "merge-lopdf")]
    Library,
    /// The `pdftk` command-line tool
    Pdftk(PathBuf),
    /// The `qpdf` command-line tool
    Qpdf(PathBuf),
}

impl std::fmt::Display for MergeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "merge-lopdf")]
            MergeBackend::Library => write!(f, "lopdf library"),
            MergeBackend::Pdftk(path) => write!(f, "pdftk ({})", path.display()),
            MergeBackend::Qpdf(path) => write!(f, "qpdf ({})", path.display()),
        }
    }
}

/// Probe for usable merge backends, in preference order.
pub fn available_backends() -> Vec<MergeBackend> {
    let mut backends = Vec::new();
    #[cfg(feature = "merge-lopdf")]
    backends.push(MergeBackend::Library);
    if let Some(path) = convert::find_in_path("pdftk") {
        backends.push(MergeBackend::Pdftk(path));
    }
    if let Some(path) = convert::find_in_path("qpdf") {
        backends.push(MergeBackend::Qpdf(path));
    }
    backends
}

/// Human-readable list of every merge option, for the fatal error when none
/// is available.
pub fn merge_options_hint() -> String {
    "the lopdf library (rebuild with the `merge-lopdf` feature), the `pdftk` command-line tool, \
     or the `qpdf` command-line tool"
        .to_string()
}

/// Merge the partial documents, in batch order, into the final PDF.
///
/// Backends are tried in preference order; a backend that fails at runtime
/// degrades to the next one.
pub fn merge_documents(partials: &[PartialDocument], output: &Path) -> Result<()> {
    let mut inputs: Vec<&PartialDocument> = partials.iter().collect();
    inputs.sort_by_key(|p| p.index);
    let inputs: Vec<PathBuf> = inputs.into_iter().map(|p| p.path.clone()).collect();

    // a single partial needs no backend at all, so copy it before probing
    if let [only] = inputs.as_slice() {
        std::fs::copy(only, output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        return Ok(());
    }

    let backends = available_backends();
    if backends.is_empty() {
        return Err(FatalError::MergeUnavailable {
            missing: merge_options_hint(),
        }
        .into());
    }

    let mut last_error = None;
    for backend in &backends {
        let result = match backend {
            #[cfg(feature = "merge-lopdf")]
            MergeBackend::Library => merge_with_library(&inputs, output),
            MergeBackend::Pdftk(program) => merge_with_pdftk(program, &inputs, output),
            MergeBackend::Qpdf(program) => merge_with_qpdf(program, &inputs, output),
        };
        match result {
            Ok(()) => {
                log::debug!("merged {} partial document(s) via {backend}", inputs.len());
                return Ok(());
            }
            Err(e) => {
                log::warn!("merge via {backend} failed, trying the next backend: {e:#}");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.expect("at least one backend was tried"))
        .with_context(|| "Every available merge backend failed")
}

/// Merge PDFs in-process with lopdf: renumber each document's objects into a
/// shared id space, collect the pages in input order, and rebuild a single
/// catalog and page tree.
#[cfg(feature = "merge-lopdf")]
fn merge_with_library(inputs: &[PathBuf], output: &Path) -> Result<()> {
    use lopdf::{Document, Object, ObjectId};
    use std::collections::BTreeMap;

    let mut max_id = 1;
    let mut pages: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for path in inputs {
        let mut doc = Document::load(path)
            .with_context(|| format!("Failed to load partial PDF {}", path.display()))?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_page_number, object_id) in doc.get_pages() {
            let object = doc
                .get_object(object_id)
                .with_context(|| format!("Failed to read page object in {}", path.display()))?
                .to_owned();
            pages.insert(object_id, object);
        }
        objects.append(&mut doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, lopdf::Dictionary)> = None;
    let mut pages_root: Option<(ObjectId, lopdf::Dictionary)> = None;

    for (object_id, object) in objects {
        match object.type_name().unwrap_or("") {
            "Catalog" => {
                if catalog.is_none() {
                    let dict = object
                        .as_dict()
                        .with_context(|| "Catalog object is not a dictionary")?
                        .clone();
                    catalog = Some((object_id, dict));
                }
            }
            "Pages" => {
                if let Ok(dict) = object.as_dict() {
                    match pages_root.as_mut() {
                        Some((_, existing)) => existing.extend(dict),
                        None => pages_root = Some((object_id, dict.clone())),
                    }
                }
            }
            // page objects are re-parented below; outlines are dropped
            "Page" | "Outlines" | "Outline" => {}
            _ => {
                merged.objects.insert(object_id, object);
            }
        }
    }

    let (pages_id, mut pages_dict) =
        pages_root.ok_or_else(|| anyhow!("no Pages object found in any partial document"))?;
    let (catalog_id, mut catalog_dict) =
        catalog.ok_or_else(|| anyhow!("no Catalog object found in any partial document"))?;

    for (object_id, object) in &pages {
        if let Ok(dict) = object.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", pages_id);
            merged.objects.insert(*object_id, Object::Dictionary(dict));
        }
    }

    pages_dict.set("Count", pages.len() as i64);
    pages_dict.set(
        "Kids",
        pages
            .keys()
            .map(|id| Object::Reference(*id))
            .collect::<Vec<Object>>(),
    );
    merged.objects.insert(pages_id, Object::Dictionary(pages_dict));

    catalog_dict.set("Pages", pages_id);
    catalog_dict.remove(b"Outlines");
    merged
        .objects
        .insert(catalog_id, Object::Dictionary(catalog_dict));

    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.compress();
    merged
        .save(output)
        .with_context(|| format!("Failed to save merged PDF to {}", output.display()))?;

    Ok(())
}

/// `pdftk a.pdf b.pdf cat output merged.pdf`
fn merge_with_pdftk(program: &Path, inputs: &[PathBuf], output: &Path) -> Result<()> {
    let run = Command::new(program)
        .args(inputs)
        .arg("cat")
        .arg("output")
        .arg(output)
        .output()
        .with_context(|| format!("Failed to launch {}", program.display()))?;
    if run.status.success() {
        Ok(())
    } else {
        Err(anyhow!(
            "pdftk exited with {}: {}",
            run.status,
            String::from_utf8_lossy(&run.stderr).trim()
        ))
    }
}

/// `qpdf --empty --pages a.pdf b.pdf -- merged.pdf`
fn merge_with_qpdf(program: &Path, inputs: &[PathBuf], output: &Path) -> Result<()> {
    let run = Command::new(program)
        .arg("--empty")
        .arg("--pages")
        .args(inputs)
        .arg("--")
        .arg(output)
        .output()
        .with_context(|| format!("Failed to launch {}", program.display()))?;
    if run.status.success() {
        Ok(())
    } else {
        Err(anyhow!(
            "qpdf exited with {}: {}",
            run.status,
            String::from_utf8_lossy(&run.stderr).trim()
        ))
    }
}
