//! Run-level error taxonomy.
//!
//! Only errors that end the run live here; recoverable conditions (a malformed
//! ignore file, a file that fails to render, a temp directory that resists
//! deletion) are logged where they happen and never propagate.

use thiserror::Error;

/// Errors that abort the run with a non-zero exit code.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The source could not be cloned, extracted, or resolved.
    #[error("failed to acquire source `{input}`: {reason}")]
    Acquisition { input: String, reason: String },

    /// Every candidate file was excluded by ignore rules or classified out.
    #[error("no files to render: every candidate file was excluded")]
    NoFilesIncluded,

    /// The HTML-to-PDF converter is missing and installation failed.
    #[error("HTML-to-PDF converter `{binary}` is not available: {detail}")]
    ConverterUnavailable { binary: String, detail: String },

    /// Every batch failed to render, so there is nothing to merge.
    #[error("no pages could be rendered: all {batches} batch(es) failed")]
    NothingRendered { batches: usize },

    /// No way to merge partial documents into the final PDF.
    #[error("no PDF merge backend available; install one of: {missing}")]
    MergeUnavailable { missing: String },
}
