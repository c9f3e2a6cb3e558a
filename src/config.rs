//! Configuration
//!
//! [`PaintConfig`] is loaded from a JSON file. Every field has a default, so
//! a partial file (or none at all) is valid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::Rgba;
use crate::error::{PaintError, Result};

/// Longest thumbnail side stored in an archive
pub const DEFAULT_THUMBNAIL_MAX: u32 = 256;

/// Default canvas size when none is configured
pub const DEFAULT_CANVAS_SIZE: u32 = 512;

/// Background used when flattening a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Background {
    /// Opaque white, for a single flattened image
    #[default]
    White,
    /// Fully transparent, for strokes-only or per-layer output
    Transparent,
}

impl Background {
    pub fn color(self) -> Rgba {
        match self {
            Background::White => Rgba::WHITE,
            Background::Transparent => Rgba::TRANSPARENT,
        }
    }
}

/// Canvas geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    /// Device pixels per logical unit used for on-screen compositing
    pub pixel_ratio: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_SIZE,
            height: DEFAULT_CANVAS_SIZE,
            pixel_ratio: 1.0,
        }
    }
}

/// Initial brush settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    pub color: Rgba,
    pub size: f32,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            color: Rgba::BLACK,
            size: 5.0,
        }
    }
}

/// Undo settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Operations kept per layer; `None` keeps everything
    pub max_undo_levels: Option<usize>,
}

/// Archive and flatten settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub include_thumbnail: bool,
    pub thumbnail_max_dimension: u32,
    pub background: Background,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            include_thumbnail: true,
            thumbnail_max_dimension: DEFAULT_THUMBNAIL_MAX,
            background: Background::White,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaintConfig {
    pub canvas: CanvasConfig,
    pub brush: BrushConfig,
    pub history: HistoryConfig,
    pub export: ExportConfig,
}

impl PaintConfig {
    /// Load and validate a JSON config file
    ///
    /// # Errors
    /// `FileNotFound`/`FileReadError` when the file cannot be read,
    /// `Serialization` for malformed JSON, and any `validate` failure.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PaintError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| PaintError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: PaintConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| PaintError::FileWriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Reject settings no document could use
    pub fn validate(&self) -> Result<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(PaintError::InvalidDimensions {
                width: self.canvas.width,
                height: self.canvas.height,
            });
        }
        if !(self.canvas.pixel_ratio.is_finite() && self.canvas.pixel_ratio > 0.0) {
            return Err(PaintError::InvalidDimensions {
                width: self.canvas.width,
                height: self.canvas.height,
            });
        }
        if !(self.brush.size.is_finite() && self.brush.size > 0.0) {
            return Err(PaintError::InvalidBrushSize {
                size: self.brush.size,
            });
        }
        if self.export.thumbnail_max_dimension == 0 {
            return Err(PaintError::InvalidDimensions {
                width: 0,
                height: 0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PaintConfig::default();
        assert_eq!(config.export.thumbnail_max_dimension, 256);
        assert_eq!(config.export.background, Background::White);
        assert!(config.history.max_undo_levels.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"canvas": {"width": 64}, "history": {"max_undo_levels": 10}}"#).unwrap();

        let config = PaintConfig::load(&path).unwrap();
        assert_eq!(config.canvas.width, 64);
        assert_eq!(config.canvas.height, DEFAULT_CANVAS_SIZE);
        assert_eq!(config.history.max_undo_levels, Some(10));
        assert_eq!(config.brush, BrushConfig::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut config = PaintConfig::default();
        config.export.background = Background::Transparent;
        config.brush.color = Rgba::opaque(1, 2, 3);
        config.save(&path).unwrap();
        assert_eq!(PaintConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PaintConfig::default();
        config.canvas.height = 0;
        assert!(config.validate().is_err());

        let mut config = PaintConfig::default();
        config.brush.size = -1.0;
        assert_eq!(config.validate().unwrap_err().error_code(), "INVALID_BRUSH_SIZE");
    }

    #[test]
    fn test_missing_file() {
        let err = PaintConfig::load(Path::new("/nonexistent/orapaint.json")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }
}
