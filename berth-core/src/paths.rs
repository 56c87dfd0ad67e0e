//! Centralized path configuration for berth.

use std::path::PathBuf;

/// Get the berth configuration directory.
///
/// Resolution order:
/// 1. `BERTH_CONFIG_DIR` environment variable
/// 2. `<user config dir>/berth` (e.g. `~/.config/berth`)
/// 3. `~/.berth` when no config dir is known
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("BERTH_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(dir) = dirs::config_dir() {
        return dir.join("berth");
    }

    dirs::home_dir().map(|h| h.join(".berth")).unwrap_or_else(|| PathBuf::from(".berth"))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~"), home);
            assert_eq!(expand_home("~/data"), home.join("data"));
        }
        assert_eq!(expand_home("~other/data"), PathBuf::from("~other/data"));
        assert_eq!(expand_home("/abs"), PathBuf::from("/abs"));
    }
}
