use std::path::Path;

/// File names a Chromium profile leaves behind when its process dies abruptly.
const LOCK_MARKERS: &[&str] = &[
    "SingletonLock",
    "SingletonCookie",
    "SingletonSocket",
    ".org.chromium.Chromium.lock",
];

fn is_lock_file(name: &str) -> bool {
    LOCK_MARKERS.iter().any(|m| name.contains(m))
}

/// Remove stale browser lock files anywhere under `dir`. Returns how many
/// were removed. A missing directory is not an error.
pub fn cleanup_lock_files(dir: &Path) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Cannot scan {} for lock files: {}", dir.display(), e);
            }
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        // symlink_metadata: SingletonLock is usually a dangling symlink
        let Ok(meta) = std::fs::symlink_metadata(&path) else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if meta.is_dir() {
            removed += cleanup_lock_files(&path);
        } else if is_lock_file(&name) {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    log::debug!("Removed stale lock file {}", path.display());
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to remove lock file {}: {}", path.display(), e),
            }
        }
    }
    removed
}
