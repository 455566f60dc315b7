use poppy_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the directory whose `.poppyrc` holds the CLI settings.
///
/// Priority:
/// 1. `--rc` flag / `POPPY_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.poppyrc`
/// 3. The home directory, when `~/.poppyrc` exists
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if let Some(dir) = paths::find_rc_root(&cwd) {
        return dir;
    }

    if let Ok(rc) = paths::home_rc_path() {
        if rc.is_file() {
            if let Some(home) = rc.parent() {
                return home.to_path_buf();
            }
        }
    }

    cwd
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn nearest_rc_file_is_found() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".poppyrc"), "").unwrap();
        let deep = dir.path().join("scripts/wave");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(paths::find_rc_root(&deep), Some(dir.path().to_path_buf()));
    }
}
