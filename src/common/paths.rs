//! Platform configuration paths

use std::path::PathBuf;

/// Application name used for platform directories
const APP_NAME: &str = "slcd-tester";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/slcd-tester/`
/// - macOS: `~/Library/Application Support/slcd-tester/`
/// - Windows: `%APPDATA%\slcd-tester\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_app_name() {
        if let Some(dir) = config_dir() {
            assert!(dir.to_string_lossy().contains(APP_NAME));
        }
    }
}
