use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Cli {
    /// GitHub repository URL, local directory, or ZIP archive to render
    pub source: String,

    /// Add line numbers and syntax highlighting to each page
    #[clap(long)]
    pub prettify: bool,

    /// Output PDF file name (defaults to the repository name plus `.pdf`)
    #[clap(long, short = 'o', value_name = "NAME")]
    pub output: Option<PathBuf>,

    /// Largest file to render, in kilobytes (overrides the ignore file)
    #[clap(long, value_name = "KB")]
    pub max_size: Option<u64>,

    /// Most files per rendered batch (overrides the ignore file)
    #[clap(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Clone remote repositories with depth 1, omitting history
    #[clap(long)]
    pub shallow_clone: bool,

    /// Number of parallel render workers (defaults to the number of CPUs)
    #[clap(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Path to an ignore configuration file (defaults to `repo2pdf.ignore`
    /// in the repository root, with `ignore.json` as a legacy alias)
    #[clap(long, value_name = "PATH")]
    pub ignore_file: Option<PathBuf>,

    /// Enable debug logging
    #[clap(long, short = 'v')]
    pub verbose: bool,
}
