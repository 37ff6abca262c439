//! Local platform and process queries. These never go through the bridge.

use std::path::{Path, PathBuf};

/// Whether something exists at `path`
pub fn process_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Process id of the current process, read locally
pub fn current_pid() -> u32 {
    std::process::id()
}

/// Path of the running executable
pub fn executable_path() -> std::io::Result<PathBuf> {
    std::env::current_exe()
}

/// Operating system name, e.g. "linux", "macos", "windows"
pub fn platform_name() -> &'static str {
    std::env::consts::OS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_exists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.exe");
        assert!(!process_exists(&file));
        std::fs::write(&file, b"").unwrap();
        assert!(process_exists(&file));
    }

    #[test]
    fn test_local_queries() {
        assert!(current_pid() > 0);
        assert!(!platform_name().is_empty());
        assert!(executable_path().unwrap().exists());
    }
}
