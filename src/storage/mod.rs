//! Storage Layer
//!
//! Persists annotation records in a SQLite label database kept next to the
//! images, and locates the per-user configuration directory.

pub mod database;

pub use database::{AnnotationRecord, AnnotationStore};

use anyhow::Result;
use std::path::PathBuf;

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "quadmark", "Quadmark")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}
