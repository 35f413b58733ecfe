//! Well-known endpoint naming.
//!
//! Both processes agree on a short name (`cslink` by default). The name is
//! resolved to a socket path under `$XDG_RUNTIME_DIR`, falling back to the
//! system temp directory. Anything that already looks like a path is used
//! verbatim so tests and operators can point at explicit locations.

use std::path::{Path, PathBuf};

/// Endpoint name used when the caller does not supply one.
pub const DEFAULT_ENDPOINT_NAME: &str = "cslink";

const RUNTIME_DIR_ENV: &str = "XDG_RUNTIME_DIR";

/// Resolve an endpoint name (or explicit path) to a socket path.
pub fn endpoint_path(name: &str) -> PathBuf {
    resolve(name, std::env::var_os(RUNTIME_DIR_ENV).map(PathBuf::from))
}

fn resolve(name: &str, runtime_dir: Option<PathBuf>) -> PathBuf {
    if looks_like_path(name) {
        return PathBuf::from(name);
    }

    let base = runtime_dir
        .filter(|dir| dir.is_absolute())
        .unwrap_or_else(std::env::temp_dir);
    base.join(format!("{name}.sock"))
}

fn looks_like_path(name: &str) -> bool {
    name.contains(std::path::MAIN_SEPARATOR)
        || name.contains('/')
        || Path::new(name).extension().is_some_and(|ext| ext == "sock")
}
