//! On-disk locations.
//!
//! The config file and the photo store share one directory,
//! `~/.config/contact-photos/`, regardless of platform.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "contact-photos";

/// Directory holding `config.toml` and `photos.sqlite`, created on first use.
pub fn data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    app_dir_in(&home)
}

/// Where [`Config::load`](crate::Config::load) reads from
pub fn config_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("config.toml"))
}

/// Fallback photo store location when the config names none
pub fn database_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("photos.sqlite"))
}

fn app_dir_in(home: &Path) -> Result<PathBuf> {
    let dir = home.join(".config").join(APP_DIR);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_app_dir_created_under_home() {
        let home = tempdir().unwrap();
        let dir = app_dir_in(home.path()).unwrap();
        assert_eq!(dir, home.path().join(".config/contact-photos"));
        assert!(dir.is_dir());

        // Existing directory is fine.
        assert_eq!(app_dir_in(home.path()).unwrap(), dir);
    }
}
