//! Raw payload dumps.

use std::path::Path;

/// Write raw fetch output to a file.
///
/// Failures are logged and returned; callers usually treat them as non-fatal.
pub fn write_dump(path: &Path, data: &str, module: &str) -> std::io::Result<()> {
    tracing::info!(module, "writing output to {}", path.display());
    std::fs::write(path, data).map_err(|e| {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                tracing::error!(module, "permission denied to output file {}", path.display())
            }
            _ => tracing::error!(module, "failed to write {}: {}", path.display(), e),
        }
        e
    })
}

/// Read a previously written dump
pub fn read_dump(path: &Path) -> std::io::Result<String> {
    tracing::info!("reading from local file: {}", path.display());
    std::fs::read_to_string(path)
}
