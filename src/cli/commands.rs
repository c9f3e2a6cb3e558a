//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::Path;

use log::info;

use crate::archive::{create_blank_document, load_document, read_document};
use crate::compositor::Compositor;
use crate::config::{Background, PaintConfig};
use crate::engine::{encode_png, Raster};
use crate::error::{PaintError, Result};
use crate::layers::LayerStack;

use super::script::PaintScript;

fn write_png(path: &Path, raster: &Raster) -> Result<()> {
    let bytes = encode_png(raster)?;
    fs::write(path, bytes).map_err(|e| PaintError::FileWriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Create a blank document.
pub fn new_document(path: &Path, width: Option<u32>, height: Option<u32>, config: &PaintConfig) -> Result<()> {
    let width = width.unwrap_or(config.canvas.width);
    let height = height.unwrap_or(config.canvas.height);
    info!("Creating {}x{} document at: {}", width, height, path.display());

    create_blank_document(path, width, height)?;

    println!("Document created: {} ({}x{})", path.display(), width, height);
    Ok(())
}

/// Show canvas size and layers, top-most first.
pub fn show_info(path: &Path) -> Result<()> {
    info!("Reading document: {}", path.display());

    let doc = read_document(path)?;

    println!("Document: {}", path.display());
    println!("Canvas: {}x{}", doc.width, doc.height);
    match &doc.thumbnail {
        Some(thumb) => println!("Thumbnail: {}x{}", thumb.width(), thumb.height()),
        None => println!("Thumbnail: none"),
    }
    println!("Layers ({}):", doc.layers.len());
    println!("{:-<60}", "");
    for (i, layer) in doc.layers.iter().enumerate() {
        let marker = if layer.visible { " " } else { "H" };
        println!(
            "{} [{:>2}] {:<24} {:>4}x{:<4} @({}, {}) opacity {:.2}",
            marker,
            i,
            layer.name,
            layer.raster.width(),
            layer.raster.height(),
            layer.x,
            layer.y,
            layer.opacity
        );
    }
    Ok(())
}

/// Flatten a document into a PNG.
pub fn flatten(path: &Path, output: &Path, transparent: bool, config: &PaintConfig) -> Result<()> {
    info!("Flattening {} -> {}", path.display(), output.display());

    let stack = LayerStack::open_ora(path, config)?;
    let background = if transparent {
        Background::Transparent
    } else {
        Background::White
    };
    let image = stack.export_flattened(background);
    write_png(output, &image)?;

    println!(
        "Flattened {} layers into {} ({}x{})",
        stack.len(),
        output.display(),
        image.width(),
        image.height()
    );
    Ok(())
}

/// Unpack a document into `output`.
pub fn extract(path: &Path, output: &Path) -> Result<()> {
    info!("Extracting {} into {}", path.display(), output.display());

    let loaded = load_document(path, output)?;

    println!("Extracted to: {}", loaded.root.display());
    println!(
        "Canvas: {}x{}, {} layers",
        loaded.manifest.width,
        loaded.manifest.height,
        loaded.layer_paths.len()
    );
    for layer_path in &loaded.layer_paths {
        println!("  {}", layer_path.display());
    }
    Ok(())
}

/// Replay a paint script, save the document and optionally a preview.
pub fn paint(script_path: &Path, output: &Path, preview: Option<&Path>, config: &PaintConfig) -> Result<()> {
    info!("Running paint script: {}", script_path.display());

    let script = PaintScript::load(script_path)?;
    let base_dir = script_path.parent().unwrap_or_else(|| Path::new("."));
    let stack = script.run(config, base_dir)?;

    stack.save_ora(output, &config.export)?;
    println!(
        "Saved {} ({}x{}, {} layers)",
        output.display(),
        stack.width(),
        stack.height(),
        stack.len()
    );

    if let Some(preview) = preview {
        let mut compositor = Compositor::new(stack.width(), stack.height(), config.canvas.pixel_ratio)?;
        let frame = compositor.render(&stack.snapshot());
        write_png(preview, frame)?;
        println!("Preview: {} ({}x{})", preview.display(), frame.width(), frame.height());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_then_flatten() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("blank.ora");
        let png = dir.path().join("blank.png");
        let config = PaintConfig::default();

        new_document(&doc, Some(12), Some(7), &config).unwrap();
        show_info(&doc).unwrap();
        flatten(&doc, &png, false, &config).unwrap();

        let image = crate::engine::decode_png(&fs::read(&png).unwrap()).unwrap();
        assert_eq!(image.size(), (12, 7));
        assert_eq!(image.count_color(crate::engine::Rgba::WHITE), 12 * 7);
    }

    #[test]
    fn test_paint_writes_document_and_preview() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("script.json");
        fs::write(
            &script,
            r##"{"width": 20, "height": 20, "ops": [
                {"op": "stroke", "color": "#000000", "size": 4, "points": [[2, 10], [18, 10]]}
            ]}"##,
        )
        .unwrap();
        let doc = dir.path().join("out.ora");
        let preview = dir.path().join("out.png");

        paint(&script, &doc, Some(&preview), &PaintConfig::default()).unwrap();

        assert!(read_document(&doc).is_ok());
        let image = crate::engine::decode_png(&fs::read(&preview).unwrap()).unwrap();
        assert_eq!(image.size(), (20, 20));
        assert_eq!(image.get(10, 10), crate::engine::Rgba::BLACK);
    }

    #[test]
    fn test_extract_lists_layers() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("x.ora");
        create_blank_document(&doc, 4, 4).unwrap();
        extract(&doc, &dir.path().join("out")).unwrap();
        assert!(dir.path().join("out").join("stack.xml").exists());
    }
}
