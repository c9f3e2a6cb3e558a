//! Saving and opening a [`LayerStack`] as OpenRaster

use std::path::Path;

use log::info;

use super::ora::{read_document, save_document, OraDocument, OraLayer};
use crate::compositor::{export_flattened, export_layer};
use crate::config::{ExportConfig, PaintConfig};
use crate::engine::Raster;
use crate::error::{PaintError, Result};
use crate::layers::{Layer, LayerStack};

impl LayerStack {
    /// Per-layer images at canvas size, top-most first
    pub fn to_ora_layers(&self) -> Vec<OraLayer> {
        self.layers()
            .iter()
            .rev()
            .map(|layer| OraLayer {
                name: layer.name().to_string(),
                visible: layer.is_visible(),
                opacity: 1.0,
                x: 0,
                y: 0,
                raster: export_layer(layer, self.width(), self.height()),
            })
            .collect()
    }

    /// Save as `.ora`. The base image, resampled to the canvas, becomes the
    /// bottom `Background` layer.
    pub fn save_ora(&self, path: &Path, export: &ExportConfig) -> Result<()> {
        let (width, height) = (self.width(), self.height());
        let base = self.base_image().map(|b| b.resized(width, height));
        let thumbnail = export.include_thumbnail.then(|| {
            export_flattened(self, width, height, export.background).thumbnail(export.thumbnail_max_dimension)
        });
        save_document(path, &self.to_ora_layers(), base.as_ref(), thumbnail.as_ref())
    }

    /// Rebuild a stack from a decoded document.
    ///
    /// Layers are stacked bottom to top (the reverse of the archive order),
    /// placed at their offsets on a canvas-size raster with their opacity
    /// applied. The top-most layer becomes active.
    pub fn from_document(doc: &OraDocument, max_undo_levels: Option<usize>) -> Result<Self> {
        if doc.layers.is_empty() {
            return Err(PaintError::NoLayers);
        }
        let (width, height) = (doc.width, doc.height);
        let mut stack = LayerStack::new(width, height)?;
        stack.set_max_undo_levels(max_undo_levels);

        for entry in doc.layers.iter().rev() {
            let mut raster = if entry.raster.size() == (width, height) && entry.x == 0 && entry.y == 0 {
                entry.raster.clone()
            } else {
                let mut placed = Raster::new(width, height);
                placed.draw_at(&entry.raster, entry.x as i64, entry.y as i64);
                placed
            };
            raster.multiply_alpha(entry.opacity);

            let mut layer = Layer::with_history_limit(entry.name.as_str(), max_undo_levels);
            layer.set_raster(Some(raster));
            layer.set_visible(entry.visible);
            stack.push_layer(layer);
        }
        Ok(stack)
    }

    /// Open a `.ora` file using the canvas-independent parts of `config`
    pub fn open_ora(path: &Path, config: &PaintConfig) -> Result<Self> {
        let doc = read_document(path)?;
        let stack = Self::from_document(&doc, config.history.max_undo_levels)?;
        info!(
            "Opened {} as {}x{} with {} layers",
            path.display(),
            stack.width(),
            stack.height(),
            stack.len()
        );
        Ok(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Background;
    use crate::engine::{Point, Rgba, StrokeMode};
    use tempfile::TempDir;

    #[test]
    fn test_from_document_order_offset_opacity() {
        let mut top = OraLayer::new("top", Raster::filled(2, 2, Rgba::BLACK));
        top.x = 3;
        top.y = 1;
        top.opacity = 0.5;
        let mut bottom = OraLayer::new("bottom", Raster::filled(8, 8, Rgba::WHITE));
        bottom.visible = false;
        let doc = OraDocument {
            width: 8,
            height: 8,
            layers: vec![top, bottom],
            thumbnail: None,
        };

        let stack = LayerStack::from_document(&doc, Some(4)).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.layers()[0].name(), "bottom");
        assert!(!stack.layers()[0].is_visible());
        assert_eq!(stack.active_index(), Some(1));

        let top = stack.layers()[1].raster().unwrap();
        assert_eq!(top.get(0, 0), Rgba::TRANSPARENT);
        assert_eq!(top.get(3, 1), Rgba::new(0, 0, 0, 128));
        assert_eq!(top.get(4, 2).a, 128);
        assert_eq!(stack.max_undo_levels(), Some(4));
    }

    #[test]
    fn test_empty_document_rejected() {
        let doc = OraDocument {
            width: 4,
            height: 4,
            layers: Vec::new(),
            thumbnail: None,
        };
        assert_eq!(LayerStack::from_document(&doc, None).unwrap_err().error_code(), "NO_LAYERS");
    }

    #[test]
    fn test_save_open_keeps_pixels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.ora");
        let mut config = PaintConfig::default();
        config.canvas.width = 24;
        config.canvas.height = 24;

        let mut stack = LayerStack::with_config(&config).unwrap();
        stack
            .begin_stroke(Point::new(2.0, 12.0), Rgba::BLACK, 4.0, StrokeMode::Draw)
            .unwrap();
        stack.add_point(Point::new(22.0, 12.0));
        stack.end_stroke();
        stack.add_layer(Some("empty"));
        stack.save_ora(&path, &config.export).unwrap();

        let opened = LayerStack::open_ora(&path, &config).unwrap();
        assert_eq!(opened.len(), 2);
        assert_eq!(opened.layers()[1].name(), "empty");
        assert_eq!(
            opened.export_flattened(Background::White),
            stack.export_flattened(Background::White)
        );
    }

    #[test]
    fn test_base_image_saved_as_background_layer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("based.ora");
        let mut stack = LayerStack::with_config(&PaintConfig {
            canvas: crate::config::CanvasConfig {
                width: 10,
                height: 10,
                pixel_ratio: 1.0,
            },
            ..PaintConfig::default()
        })
        .unwrap();
        stack
            .set_base_image(Some(Raster::filled(5, 5, Rgba::opaque(0, 128, 0))))
            .unwrap();
        stack.save_ora(&path, &ExportConfig::default()).unwrap();

        let doc = read_document(&path).unwrap();
        assert_eq!(doc.layers.len(), 2);
        let background = doc.layers.last().unwrap();
        assert_eq!(background.name, "Background");
        assert_eq!(background.raster.size(), (10, 10));
        assert!(doc.thumbnail.is_some());
    }
}
