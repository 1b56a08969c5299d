//! HTML page rendering for source files.
//!
//! Each file becomes a header div plus a `<pre><code>` block; a batch of files
//! becomes one standalone HTML document handed to the external converter. In
//! prettify mode every line is wrapped in a `<span>` so the stylesheet can
//! draw line numbers with CSS counters, and the contents are syntax
//! highlighted by extension. Plain mode just escapes the text.

use crate::acquire::SourceTree;
use crate::classify::FileRecord;
use crate::highlight::Highlighter;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// How file contents are rendered onto pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Escaped text only
    Plain,
    /// Line numbers and extension-keyed syntax highlighting
    Prettify,
}

/// Stylesheet for rendered pages: tight spacing, monospace code, CSS-counter
/// line numbers for prettified spans, and a light header bar per file.
const PAGE_CSS: &str = r#"
pre {
    white-space: pre-wrap;
    word-wrap: break-word;
    margin: 0;
    font-family: 'Courier New', monospace;
    counter-reset: line;
    line-height: 1.4;
    font-size: 11px;
    background-color: #f8f8f8;
    padding: 5px 0;
}
code {
    display: block;
    position: relative;
}
pre.numbered code {
    padding-left: 50px;
}
pre.numbered code > span {
    display: block;
    padding: 0 5px 0 0;
    min-height: 1.4em;
}
pre.numbered code > span:before {
    counter-increment: line;
    content: counter(line);
    position: absolute;
    left: 0;
    width: 35px;
    text-align: right;
    color: #666;
    border-right: 1px solid #ddd;
    padding-right: 8px;
    font-size: 11px;
}
.file-header {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    padding: 5px 8px;
    margin: 0;
    background-color: #f1f1f1;
    font-size: 14px;
    color: #333;
}
hr {
    margin: 10px 0;
    border: none;
    border-top: 1px solid #ddd;
}
"#;

/// A batch's HTML document plus the files that failed to render into it.
pub struct BatchHtml {
    pub html: String,
    pub rendered: usize,
    pub skipped: Vec<PathBuf>,
}

/// Render a batch of files into one standalone HTML document.
///
/// Files that cannot be read or highlighted are skipped and reported; the
/// batch fails only if it produced an empty document.
pub fn render_batch_html(
    tree: &SourceTree,
    files: &[FileRecord],
    mode: RenderMode,
    highlighter: &Highlighter,
) -> BatchHtml {
    let mut body = String::new();
    let mut rendered = 0;
    let mut skipped = Vec::new();

    for record in files {
        match render_file_section(tree, record, mode, highlighter) {
            Ok(section) => {
                body.push_str(&section);
                rendered += 1;
            }
            Err(e) => {
                log::warn!("skipping {}: {e:#}", record.path.display());
                skipped.push(record.path.clone());
            }
        }
    }

    let html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <style>{PAGE_CSS}</style>\n</head>\n<body style=\"margin:0;padding:0;\">\n\
         {body}</body>\n</html>\n"
    );

    BatchHtml {
        html,
        rendered,
        skipped,
    }
}

/// Render one file as a header plus code block.
fn render_file_section(
    tree: &SourceTree,
    record: &FileRecord,
    mode: RenderMode,
    highlighter: &Highlighter,
) -> Result<String> {
    let full_path = tree.root.join(&record.path);
    let contents = std::fs::read_to_string(&full_path)
        .with_context(|| format!("Failed to read {}", full_path.display()))?;

    let header = html_escape::encode_text(&record.path.display().to_string()).to_string();

    let code = match mode {
        RenderMode::Plain => format!(
            "<pre><code>{}</code></pre>",
            html_escape::encode_text(&contents)
        ),
        RenderMode::Prettify => {
            let extension = record
                .path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default();
            let lines = highlighter
                .highlight_lines(&contents, &extension)
                .with_context(|| format!("Failed to highlight {}", record.path.display()))?;

            let mut code = String::from("<pre class=\"numbered\"><code>");
            for line in lines {
                code.push_str("<span>");
                code.push_str(&line);
                code.push_str("</span>");
            }
            code.push_str("</code></pre>");
            code
        }
    };

    Ok(format!(
        "<div class=\"file-header\">{header}</div>\n{code}\n<hr>\n"
    ))
}
