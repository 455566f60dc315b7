use crate::error::{PoppyError, Result};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File names
// ---------------------------------------------------------------------------

pub const RC_FILE: &str = ".poppyrc";

// ---------------------------------------------------------------------------
// REST endpoints (pypot http server)
// ---------------------------------------------------------------------------

pub const ALIASES_ENDPOINT: &str = "/motors/aliases/list.json";
pub const GOTO_ENDPOINT: &str = "/motors/goto.json";

pub fn register_url(motor: &str, register: &str) -> String {
    format!("/motors/{motor}/registers/{register}/value.json")
}

pub fn alias_url(alias: &str) -> String {
    format!("/motors/{alias}/list.json")
}

pub fn motor_goto_url(motor: &str) -> String {
    format!("/motors/{motor}/goto.json")
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn rc_path(root: &Path) -> PathBuf {
    root.join(RC_FILE)
}

pub fn home_rc_path() -> Result<PathBuf> {
    home::home_dir()
        .map(|h| h.join(RC_FILE))
        .ok_or(PoppyError::HomeNotFound)
}

/// Walk upward from `start` looking for a directory holding a `.poppyrc`.
pub fn find_rc_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if rc_path(&dir).is_file() {
            return Some(dir);
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => return None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
