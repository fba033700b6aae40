//! Locating a Chromium-compatible browser binary (Chromium, Chrome or Edge).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Well-known install locations on Linux and macOS, checked in order.
pub const UNIX_CANDIDATES: &[&str] = &[
    "/snap/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/chromium",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/usr/bin/microsoft-edge",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

/// Executable names searched on `PATH` when no well-known location exists.
#[cfg(not(windows))]
const PATH_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome-stable",
    "google-chrome",
    "chrome",
    "microsoft-edge",
];

#[cfg(windows)]
const PATH_NAMES: &[&str] = &["chrome.exe", "msedge.exe"];

/// Chrome and Edge install locations on Windows, in lookup order, given the
/// `ProgramFiles`, `ProgramFiles(x86)` and `LOCALAPPDATA` directories.
pub fn windows_candidates(
    program_files: Option<OsString>,
    program_files_x86: Option<OsString>,
    local_app_data: Option<OsString>,
) -> Vec<PathBuf> {
    let program_files = program_files
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\Program Files"));
    let program_files_x86 = program_files_x86
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\Program Files (x86)"));

    let chrome = ["Google", "Chrome", "Application", "chrome.exe"];
    let edge = ["Microsoft", "Edge", "Application", "msedge.exe"];
    let under = |root: &Path, parts: &[&str]| parts.iter().fold(root.to_path_buf(), |p, part| p.join(part));

    let mut candidates = vec![
        under(&program_files, &chrome),
        under(&program_files_x86, &chrome),
        under(&program_files_x86, &edge),
        under(&program_files, &edge),
    ];
    if let Some(local) = local_app_data {
        candidates.push(under(Path::new(&local), &chrome));
    }
    candidates
}

/// Install locations for the current platform.
pub fn browser_candidates() -> Vec<PathBuf> {
    if cfg!(windows) {
        windows_candidates(
            std::env::var_os("ProgramFiles"),
            std::env::var_os("ProgramFiles(x86)"),
            std::env::var_os("LOCALAPPDATA"),
        )
    } else {
        UNIX_CANDIDATES.iter().map(PathBuf::from).collect()
    }
}

/// Find a browser: the explicit path when given, else the first existing
/// candidate, else the first match on `PATH`.
pub fn detect_browser(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }

    let found = browser_candidates()
        .into_iter()
        .find(|p| p.is_file())
        .or_else(|| search_path(PATH_NAMES));
    if let Some(ref p) = found {
        log::debug!("Browser detected: {}", p.display());
    }
    found
}

fn search_path(names: &[&str]) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| {
        names
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}
