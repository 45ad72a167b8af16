//! Application Configuration
//!
//! View geometry, label database naming, and image discovery settings stored
//! in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::geometry::{Border, Size};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Display surface settings
    pub view: ViewConfig,
    /// Label database settings
    pub storage: StorageConfig,
    /// Image discovery settings
    pub images: ImageConfig,
}

/// Display surface and drag-handle geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Surface width in display pixels
    pub surface_width: u32,
    /// Surface height in display pixels
    pub surface_height: u32,
    /// Horizontal padding around the scaled image
    pub border_x: u32,
    /// Vertical padding around the scaled image
    pub border_y: u32,
    /// Diameter of a corner drag handle
    pub handle_size: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            surface_width: 900,
            surface_height: 750,
            border_x: 50,
            border_y: 50,
            handle_size: 10,
        }
    }
}

impl ViewConfig {
    pub fn surface(&self) -> Size {
        Size::new(self.surface_width, self.surface_height)
    }

    pub fn border(&self) -> Border {
        Border::new(self.border_x, self.border_y)
    }

    /// Offset from a handle's position to its center
    pub fn handle_radius(&self) -> i32 {
        (self.handle_size / 2) as i32
    }
}

/// Label database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// File name of the label database inside the image directory
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: "label.sqllite3".to_string(),
        }
    }
}

/// Which files count as images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Accepted extensions, matched case-insensitively
    pub extensions: Vec<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            extensions: ["jpg", "jpeg", "bmp", "png"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.view.surface(), Size::new(900, 750));
        assert_eq!(config.view.border(), Border::new(50, 50));
        assert_eq!(config.view.handle_size, 10);
        assert_eq!(config.view.handle_radius(), 5);

        assert_eq!(config.storage.database_file, "label.sqllite3");
        assert_eq!(config.images.extensions, vec!["jpg", "jpeg", "bmp", "png"]);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.view.surface_width = 1280;
        config.view.handle_size = 14;
        config.storage.database_file = "labels.db".to_string();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.view, config.view);
        assert_eq!(parsed.storage, config.storage);
        assert_eq!(parsed.images, config.images);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str("[view]\nborder_x = 20\n").unwrap();

        assert_eq!(parsed.view.border_x, 20);
        assert_eq!(parsed.view.border_y, 50);
        assert_eq!(parsed.view.surface_width, 900);
        assert_eq!(parsed.storage.database_file, "label.sqllite3");
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.view, loaded.view);
        assert_eq!(config.images, loaded.images);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
