use std::path::{Path, PathBuf};

pub const OS_RELEASE_PATH: &str = "/etc/os-release";
pub const CUDA_PROFILE_SCRIPT: &str = "/etc/profile.d/cuda.sh";
pub const APT_KEYRINGS_DIR: &str = "/etc/apt/keyrings";
pub const APT_SOURCES_DIR: &str = "/etc/apt/sources.list.d";
pub const DEPS_STAMP_FILE: &str = ".miner-bootstrap-deps";

/// Probe binary that marks the GPU toolkit as installed.
pub const TOOLKIT_PROBE: &str = "nvcc";

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && (m.permissions().mode() & 0o111 != 0))
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Look `name` up on PATH first, then in `extra_dirs`.
pub fn find_executable(name: &str, extra_dirs: &[PathBuf]) -> Option<PathBuf> {
    let mut dirs = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();
    dirs.extend(extra_dirs.iter().cloned());
    find_executable_in_dirs(name, &dirs)
}

pub fn find_executable_in_dirs(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    if name.trim().is_empty() {
        return None;
    }
    dirs.iter()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// Absolute paths are kept; relative ones are taken from the operator's home.
pub fn home_path(home: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        home.join(path)
    }
}
