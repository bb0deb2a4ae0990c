//! Host label resolution.

use tracing::warn;

/// Resolve the local hostname for the `host` label.
///
/// Returns an empty string when the name cannot be read or is not UTF-8;
/// a missing hostname never fails an observation.
pub fn resolve_hostname() -> String {
    match hostname::get() {
        Ok(name) => match name.into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(hostname = ?raw, "hostname is not valid UTF-8, using empty host label");
                String::new()
            }
        },
        Err(e) => {
            warn!(error = %e, "failed to resolve hostname, using empty host label");
            String::new()
        }
    }
}
