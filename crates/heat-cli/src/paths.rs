use std::path::{Path, PathBuf};

const DB_FILE: &str = "heat.redb";

/// Resolve the competition database path.
///
/// Priority:
/// 1. `--db` flag / `HEAT_DB` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for an existing `heat.redb`
/// 3. Fall back to `cwd/heat.redb`
pub fn resolve_db(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut dir = cwd.clone();
    loop {
        let candidate = dir.join(DB_FILE);
        if candidate.is_file() {
            return candidate;
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => break,
        }
    }

    cwd.join(DB_FILE)
}
