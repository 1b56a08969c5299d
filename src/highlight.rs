//! Syntax highlighting for rendered pages.
//!
//! Wraps syntect's default syntax and theme sets behind a small API: a pure
//! extension-to-syntax lookup and a per-line HTML highlighter. Files with no
//! matching syntax fall back to escaped plain text.

use anyhow::{Context, Result};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Theme used for highlighted output. Light backgrounds print better.
const THEME: &str = "InspiredGitHub";

pub struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    pub fn new() -> Highlighter {
        let syntaxes = SyntaxSet::load_defaults_newlines();
        let theme = ThemeSet::load_defaults()
            .themes
            .remove(THEME)
            .expect("syntect ships the default themes");
        Highlighter { syntaxes, theme }
    }

    /// Look up a syntax definition by file extension. Pure lookup, no probing.
    pub fn syntax_for_extension(&self, extension: &str) -> Option<&SyntaxReference> {
        self.syntaxes.find_syntax_by_extension(extension)
    }

    /// Highlight file contents into one HTML fragment per line.
    ///
    /// Lines keep their order; each fragment contains inline-styled `<span>`s.
    /// When the extension has no registered syntax, lines are HTML-escaped
    /// without colouring.
    pub fn highlight_lines(&self, contents: &str, extension: &str) -> Result<Vec<String>> {
        let Some(syntax) = self.syntax_for_extension(extension) else {
            return Ok(contents
                .lines()
                .map(|line| html_escape::encode_text(line).to_string())
                .collect());
        };

        let mut highlighter = HighlightLines::new(syntax, &self.theme);
        let mut lines = Vec::new();
        for line in LinesWithEndings::from(contents) {
            let ranges = highlighter
                .highlight_line(line, &self.syntaxes)
                .with_context(|| format!("Failed to highlight line `{}`", line.trim_end()))?;
            let html = styled_line_to_highlighted_html(&ranges, IncludeBackground::No)
                .with_context(|| "Failed to convert highlighted line to HTML")?;
            lines.push(html.trim_end_matches('\n').to_string());
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_extensions_resolve_to_a_syntax() {
        let hl = Highlighter::new();
        assert!(hl.syntax_for_extension("rs").is_some());
        assert!(hl.syntax_for_extension("py").is_some());
        assert!(hl.syntax_for_extension("zzz-no-such-ext").is_none());
    }

    #[test]
    fn highlighting_produces_styled_spans() {
        let hl = Highlighter::new();
        let lines = hl
            .highlight_lines("fn main() {}\n", "rs")
            .expect("can highlight");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("<span"));
    }

    #[test]
    fn unknown_extensions_fall_back_to_escaped_text() {
        let hl = Highlighter::new();
        let lines = hl
            .highlight_lines("a < b && c > d\n", "zzz-no-such-ext")
            .expect("can highlight");
        assert_eq!(lines, vec!["a &lt; b &amp;&amp; c &gt; d".to_string()]);
    }

    #[test]
    fn line_count_is_preserved() {
        let hl = Highlighter::new();
        let contents = "let a = 1;\nlet b = 2;\nlet c = 3;\n";
        let lines = hl.highlight_lines(contents, "rs").expect("can highlight");
        assert_eq!(lines.len(), 3);
    }
}
