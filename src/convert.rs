//! External HTML-to-PDF conversion.
//!
//! Rendering is delegated to the `wkhtmltopdf` binary. Discovery is a PATH
//! probe (plus the stock Windows install location); when the binary is absent
//! the tool attempts one capability-checked installation step for the current
//! platform, re-probes, and otherwise fails with an error naming the binary
//! and what was attempted.

use crate::error::FatalError;
use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Name of the HTML-to-PDF converter binary.
pub const CONVERTER_BINARY: &str = "wkhtmltopdf";

/// Find the converter, installing it if necessary.
pub fn ensure_converter() -> Result<PathBuf> {
    if let Some(path) = locate_converter() {
        log::debug!("found {CONVERTER_BINARY} at {}", path.display());
        return Ok(path);
    }

    log::warn!("{CONVERTER_BINARY} not found, attempting installation");
    match attempt_install() {
        Ok(()) => {
            if let Some(path) = locate_converter() {
                log::info!("installed {CONVERTER_BINARY} at {}", path.display());
                return Ok(path);
            }
            Err(FatalError::ConverterUnavailable {
                binary: CONVERTER_BINARY.to_string(),
                detail: "installation reported success but the binary is still not on PATH"
                    .to_string(),
            }
            .into())
        }
        Err(e) => Err(FatalError::ConverterUnavailable {
            binary: CONVERTER_BINARY.to_string(),
            detail: format!("{e:#}"),
        }
        .into()),
    }
}

/// Locate the converter on PATH, falling back to the stock Windows install
/// location.
pub fn locate_converter() -> Option<PathBuf> {
    if let Some(path) = find_in_path(CONVERTER_BINARY) {
        return Some(path);
    }

    #[cfg(windows)]
    {
        let default = PathBuf::from(r"C:\Program Files\wkhtmltopdf\bin\wkhtmltopdf.exe");
        if default.is_file() {
            return Some(default);
        }
    }

    None
}

/// Find a binary by scanning the directories in `PATH`.
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    let exe = format!("{binary}{}", std::env::consts::EXE_SUFFIX);
    find_in_dirs(&exe, std::env::split_paths(&paths))
}

fn find_in_dirs(exe: &str, dirs: impl Iterator<Item = PathBuf>) -> Option<PathBuf> {
    for dir in dirs {
        let candidate = dir.join(exe);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Attempt one platform-appropriate installation step.
///
/// The step itself is capability-checked: if the package manager it relies on
/// is missing, this fails descriptively instead of blindly shelling out.
fn attempt_install() -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        if find_in_path("apt-get").is_none() {
            return Err(anyhow!(
                "no supported package manager (apt-get) found; install {CONVERTER_BINARY} with your distribution's package manager"
            ));
        }
        let (program, args) = apt_install_command(find_in_path("sudo").is_some());
        run_install_step(program, &args)
    }

    #[cfg(target_os = "macos")]
    {
        if find_in_path("brew").is_none() {
            return Err(anyhow!(
                "Homebrew not found; install {CONVERTER_BINARY} from https://wkhtmltopdf.org/downloads.html"
            ));
        }
        run_install_step("brew", &["install", CONVERTER_BINARY])
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Err(anyhow!(
            "no automatic installation step on this platform; download {CONVERTER_BINARY} from https://wkhtmltopdf.org/downloads.html"
        ))
    }
}

/// Build the apt-get invocation, going through sudo only when it actually
/// exists (containers routinely run as root with no sudo installed).
#[cfg(target_os = "linux")]
fn apt_install_command(use_sudo: bool) -> (&'static str, Vec<&'static str>) {
    if use_sudo {
        ("sudo", vec!["apt-get", "install", "-y", CONVERTER_BINARY])
    } else {
        ("apt-get", vec!["install", "-y", CONVERTER_BINARY])
    }
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn run_install_step(program: &str, args: &[&str]) -> Result<()> {
    log::info!("running `{program} {}`", args.join(" "));
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("Failed to launch `{program}`"))?;
    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("`{program} {}` exited with {status}", args.join(" ")))
    }
}

/// Convert one HTML document to a PDF.
pub fn html_to_pdf(converter: &Path, html: &Path, pdf: &Path) -> Result<()> {
    let output = Command::new(converter)
        .args(converter_args(html, pdf))
        .output()
        .with_context(|| format!("Failed to launch {}", converter.display()))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(anyhow!(
            "{CONVERTER_BINARY} exited with {}: {}",
            output.status,
            stderr.trim()
        ))
    }
}

/// Fixed converter arguments: UTF-8, quiet, minimal margins, A4.
fn converter_args(html: &Path, pdf: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "--encoding",
        "UTF-8",
        "--quiet",
        "--margin-top",
        "2mm",
        "--margin-right",
        "2mm",
        "--margin-bottom",
        "2mm",
        "--margin-left",
        "2mm",
        "--page-size",
        "A4",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(html.as_os_str().to_os_string());
    args.push(pdf.as_os_str().to_os_string());
    args
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn converter_args_are_order_stable() {
        let args = converter_args(Path::new("in.html"), Path::new("out.pdf"));
        let rendered: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            rendered,
            vec![
                "--encoding",
                "UTF-8",
                "--quiet",
                "--margin-top",
                "2mm",
                "--margin-right",
                "2mm",
                "--margin-bottom",
                "2mm",
                "--margin-left",
                "2mm",
                "--page-size",
                "A4",
                "in.html",
                "out.pdf",
            ]
        );
    }

    #[test]
    fn find_in_dirs_returns_the_first_hit() {
        let first = tempfile::tempdir().expect("can create temp dir");
        let second = tempfile::tempdir().expect("can create temp dir");
        std::fs::write(second.path().join("tool"), "#!/bin/sh\n").expect("can write");

        let found = find_in_dirs(
            "tool",
            vec![first.path().to_path_buf(), second.path().to_path_buf()].into_iter(),
        );
        assert_eq!(found, Some(second.path().join("tool")));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn apt_install_only_uses_sudo_when_present() {
        let (program, args) = apt_install_command(true);
        assert_eq!(program, "sudo");
        assert_eq!(args, vec!["apt-get", "install", "-y", CONVERTER_BINARY]);

        let (program, args) = apt_install_command(false);
        assert_eq!(program, "apt-get");
        assert_eq!(args, vec!["install", "-y", CONVERTER_BINARY]);
    }

    #[test]
    fn find_in_dirs_misses_cleanly() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        assert_eq!(
            find_in_dirs("nope", vec![dir.path().to_path_buf()].into_iter()),
            None
        );
    }
}
