//! OpenRaster documents
//!
//! Layout of a saved `.ora`:
//!
//! ```text
//! mimetype                  "image/openraster", stored, always first
//! stack.xml                 layer manifest, top-most layer first
//! data/layer0.png ...       one RGBA PNG per layer, layer0 = top-most
//! Thumbnails/thumbnail.png  optional, longest side <= 256
//! ```
//!
//! Saves build every byte in memory, then write a temporary file beside
//! the destination and rename it into place.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use super::manifest::{ManifestLayer, StackManifest};
use super::zip::{ZipReader, ZipWriter};
use crate::config::DEFAULT_THUMBNAIL_MAX;
use crate::engine::{decode_png, encode_png, Raster};
use crate::error::{PaintError, Result};

pub const MIMETYPE: &str = "image/openraster";
pub const MIMETYPE_ENTRY: &str = "mimetype";
pub const STACK_ENTRY: &str = "stack.xml";
pub const THUMBNAIL_ENTRY: &str = "Thumbnails/thumbnail.png";
/// Name given to the base image when it is saved as a layer
pub const BACKGROUND_LAYER_NAME: &str = "Background";

/// One layer image with its stacking attributes
#[derive(Debug, Clone, PartialEq)]
pub struct OraLayer {
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub x: i32,
    pub y: i32,
    pub raster: Raster,
}

impl OraLayer {
    pub fn new(name: impl Into<String>, raster: Raster) -> Self {
        Self {
            name: name.into(),
            visible: true,
            opacity: 1.0,
            x: 0,
            y: 0,
            raster,
        }
    }
}

/// A decoded document
#[derive(Debug, Clone)]
pub struct OraDocument {
    pub width: u32,
    pub height: u32,
    /// Top-most first
    pub layers: Vec<OraLayer>,
    pub thumbnail: Option<Raster>,
}

/// A document unpacked onto disk
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Absolute extraction directory
    pub root: PathBuf,
    pub manifest: StackManifest,
    /// Absolute layer image paths, top-most first
    pub layer_paths: Vec<PathBuf>,
}

fn layer_entry_name(index: usize) -> String {
    format!("data/layer{index}.png")
}

/// Reject anything that is not a `*.ora` path
fn check_ora_path(path: &Path) -> Result<()> {
    let is_ora = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ora"));
    if is_ora {
        Ok(())
    } else {
        warn!("Rejected non-.ora path {}", path.display());
        Err(PaintError::InvalidDestination {
            path: path.to_path_buf(),
            reason: "expected a .ora file".to_string(),
        })
    }
}

fn check_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(PaintError::FileNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Write a layered document.
///
/// `layers` are top-most first. The base image, if any, is stored as the
/// bottom layer named `Background`. The thumbnail is downscaled to fit
/// 256 pixels when larger.
///
/// # Errors
/// Validation errors (`InvalidDestination`, `NoLayers`,
/// `InvalidDimensions`, `LayerSizeMismatch`) are raised before anything is
/// written. I/O failures leave any existing file at `path` untouched.
pub fn save_document(
    path: &Path,
    layers: &[OraLayer],
    base_image: Option<&Raster>,
    thumbnail: Option<&Raster>,
) -> Result<()> {
    check_ora_path(path)?;
    let first = layers.first().ok_or(PaintError::NoLayers)?;
    let (width, height) = first.raster.size();
    if width == 0 || height == 0 {
        return Err(PaintError::InvalidDimensions { width, height });
    }
    let base_layer = base_image.map(|raster| OraLayer::new(BACKGROUND_LAYER_NAME, raster.clone()));
    let all: Vec<&OraLayer> = layers.iter().chain(base_layer.as_ref()).collect();
    for layer in &all {
        let (actual_width, actual_height) = layer.raster.size();
        if (actual_width, actual_height) != (width, height) {
            return Err(PaintError::LayerSizeMismatch {
                name: layer.name.clone(),
                width,
                height,
                actual_width,
                actual_height,
            });
        }
    }

    let bytes = build_archive(width, height, &all, thumbnail)?;
    write_atomically(path, &bytes)?;
    info!(
        "Saved {} ({} layers, {}x{}, {} bytes)",
        path.display(),
        all.len(),
        width,
        height,
        bytes.len()
    );
    Ok(())
}

fn build_archive(width: u32, height: u32, layers: &[&OraLayer], thumbnail: Option<&Raster>) -> Result<Vec<u8>> {
    let mut manifest = StackManifest::new(width, height);
    let mut images = Vec::with_capacity(layers.len());
    for (index, layer) in layers.iter().enumerate() {
        let src = layer_entry_name(index);
        images.push((src.clone(), encode_png(&layer.raster)?));
        manifest.layers.push(ManifestLayer {
            name: layer.name.clone(),
            src,
            x: layer.x,
            y: layer.y,
            opacity: layer.opacity,
            visible: layer.visible,
        });
    }
    let thumbnail_png = thumbnail
        .filter(|t| !t.is_empty())
        .map(|t| encode_png(&t.thumbnail(DEFAULT_THUMBNAIL_MAX)))
        .transpose()?;

    let mut zip = ZipWriter::new();
    zip.add(MIMETYPE_ENTRY, MIMETYPE.as_bytes())?;
    zip.add(STACK_ENTRY, manifest.to_xml().as_bytes())?;
    for (name, png) in &images {
        zip.add(name, png)?;
    }
    if let Some(png) = &thumbnail_png {
        zip.add(THUMBNAIL_ENTRY, png)?;
    }
    zip.finish()
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| PaintError::DirectoryCreateError {
        path: parent.clone(),
        source: e,
    })?;

    let write_error = |e: std::io::Error| PaintError::FileWriteError {
        path: path.to_path_buf(),
        source: e,
    };
    let mut tmp = NamedTempFile::new_in(&parent).map_err(write_error)?;
    tmp.write_all(bytes).map_err(write_error)?;
    tmp.as_file().sync_all().map_err(write_error)?;
    tmp.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}

/// Write a one-layer transparent document of the given size
pub fn create_blank_document(path: &Path, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(PaintError::InvalidDimensions { width, height });
    }
    let raster = Raster::new(width, height);
    let layer = OraLayer::new(BACKGROUND_LAYER_NAME, raster.clone());
    save_document(path, &[layer], None, Some(&raster))
}

/// Cheap check for an OpenRaster archive: the first entry must be a stored
/// `mimetype` holding `image/openraster`
pub fn is_openraster(bytes: &[u8]) -> bool {
    const NAME_AT: usize = 30;
    let u16_at = |at: usize| bytes.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]));
    if bytes.get(..4) != Some(&[0x50, 0x4B, 0x03, 0x04][..]) || u16_at(8) != Some(0) {
        return false;
    }
    let (Some(name_len), Some(extra_len)) = (u16_at(26), u16_at(28)) else {
        return false;
    };
    let name_len = name_len as usize;
    if bytes.get(NAME_AT..NAME_AT + name_len) != Some(MIMETYPE_ENTRY.as_bytes()) {
        return false;
    }
    let data_at = NAME_AT + name_len + extra_len as usize;
    bytes
        .get(data_at..data_at + MIMETYPE.len())
        .is_some_and(|d| d == MIMETYPE.as_bytes())
}

fn read_archive_bytes(path: &Path) -> Result<Vec<u8>> {
    check_ora_path(path)?;
    check_exists(path)?;
    fs::read(path).map_err(|e| PaintError::FileReadError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn check_mimetype(zip: &ZipReader<'_>) -> Result<()> {
    if zip.find(MIMETYPE_ENTRY).is_none() {
        return Ok(());
    }
    let bytes = zip.read_by_name(MIMETYPE_ENTRY)?;
    let mimetype = String::from_utf8_lossy(&bytes);
    if mimetype.trim() != MIMETYPE {
        return Err(PaintError::ArchiveFormat {
            reason: format!("unexpected mimetype '{mimetype}'"),
        });
    }
    Ok(())
}

fn read_manifest(zip: &ZipReader<'_>) -> Result<StackManifest> {
    let xml = zip.read_by_name(STACK_ENTRY)?;
    let text = String::from_utf8(xml).map_err(|_| PaintError::ManifestFormat {
        reason: "stack.xml is not UTF-8".to_string(),
    })?;
    StackManifest::parse(&text)
}

/// Decode a document fully in memory
pub fn read_document(path: &Path) -> Result<OraDocument> {
    let bytes = read_archive_bytes(path)?;
    let zip = ZipReader::new(&bytes)?;
    check_mimetype(&zip)?;
    let manifest = read_manifest(&zip)?;

    let mut layers = Vec::with_capacity(manifest.layers.len());
    for entry in &manifest.layers {
        let raster = decode_png(&zip.read_by_name(&entry.src)?)?;
        debug!("Read layer '{}' from {} ({}x{})", entry.name, entry.src, raster.width(), raster.height());
        layers.push(OraLayer {
            name: entry.name.clone(),
            visible: entry.visible,
            opacity: entry.opacity,
            x: entry.x,
            y: entry.y,
            raster,
        });
    }
    let thumbnail = match zip.find(THUMBNAIL_ENTRY) {
        Some(entry) => Some(decode_png(&zip.read(entry)?)?),
        None => None,
    };

    info!("Read {} ({} layers)", path.display(), layers.len());
    Ok(OraDocument {
        width: manifest.width,
        height: manifest.height,
        layers,
        thumbnail,
    })
}

/// Extract a document under `extract_root` and resolve its layer images
pub fn load_document(path: &Path, extract_root: &Path) -> Result<LoadedDocument> {
    let bytes = read_archive_bytes(path)?;
    let zip = ZipReader::new(&bytes)?;
    check_mimetype(&zip)?;

    fs::create_dir_all(extract_root).map_err(|e| PaintError::DirectoryCreateError {
        path: extract_root.to_path_buf(),
        source: e,
    })?;
    let root = extract_root.canonicalize()?;

    for entry in zip.entries() {
        let target = safe_join(&root, &entry.name)?;
        if entry.name.ends_with('/') {
            fs::create_dir_all(&target).map_err(|e| PaintError::DirectoryCreateError {
                path: target.clone(),
                source: e,
            })?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| PaintError::DirectoryCreateError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let data = zip.read(entry)?;
        fs::write(&target, data).map_err(|e| PaintError::FileWriteError {
            path: target.clone(),
            source: e,
        })?;
        debug!("Extracted {}", entry.name);
    }

    let manifest = read_manifest(&zip)?;
    let layer_paths = manifest
        .layers
        .iter()
        .map(|layer| safe_join(&root, &layer.src))
        .collect::<Result<Vec<_>>>()?;

    info!("Extracted {} into {}", path.display(), root.display());
    Ok(LoadedDocument {
        root,
        manifest,
        layer_paths,
    })
}

/// Join an archive entry name onto `root`, refusing names that would land
/// outside it
fn safe_join(root: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    let safe = !relative.is_absolute()
        && !name.starts_with('/')
        && !name.starts_with('\\')
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe || name.trim_matches('/').is_empty() {
        return Err(PaintError::ArchiveFormat {
            reason: format!("unsafe entry name '{name}'"),
        });
    }
    Ok(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::zip::ZipReader;
    use crate::engine::Rgba;
    use tempfile::TempDir;

    fn solid(color: Rgba) -> Raster {
        Raster::filled(8, 6, color)
    }

    #[test]
    fn test_rejects_bad_destinations() {
        let dir = TempDir::new().unwrap();
        let layer = OraLayer::new("a", solid(Rgba::BLACK));

        let err = save_document(&dir.path().join("out.png"), &[layer.clone()], None, None).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DESTINATION");

        let err = save_document(&dir.path().join("out.ora"), &[], None, None).unwrap_err();
        assert_eq!(err.error_code(), "NO_LAYERS");

        let odd = OraLayer::new("odd", Raster::new(3, 3));
        let err = save_document(&dir.path().join("out.ora"), &[layer, odd], None, None).unwrap_err();
        assert_eq!(err.error_code(), "LAYER_SIZE_MISMATCH");
        assert!(!dir.path().join("out.ora").exists());
    }

    #[test]
    fn test_entry_order_and_mimetype() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/pic.ORA");
        let layers = [OraLayer::new("top", solid(Rgba::BLACK)), OraLayer::new("bottom", solid(Rgba::WHITE))];
        save_document(&path, &layers, Some(&solid(Rgba::WHITE)), Some(&solid(Rgba::BLACK))).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(is_openraster(&bytes));
        let zip = ZipReader::new(&bytes).unwrap();
        let names: Vec<_> = zip.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "mimetype",
                "stack.xml",
                "data/layer0.png",
                "data/layer1.png",
                "data/layer2.png",
                "Thumbnails/thumbnail.png"
            ]
        );
        let manifest = read_manifest(&zip).unwrap();
        assert_eq!(manifest.layers[2].name, BACKGROUND_LAYER_NAME);
    }

    #[test]
    fn test_read_document_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.ora");
        let mut hidden = OraLayer::new("hidden", solid(Rgba::opaque(10, 20, 30)));
        hidden.visible = false;
        let layers = [OraLayer::new("top", solid(Rgba::new(255, 0, 0, 128))), hidden];
        save_document(&path, &layers, None, None).unwrap();

        let doc = read_document(&path).unwrap();
        assert_eq!((doc.width, doc.height), (8, 6));
        assert_eq!(doc.layers, layers.to_vec());
        assert!(doc.thumbnail.is_none());
    }

    #[test]
    fn test_thumbnail_is_bounded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.ora");
        let big = Raster::new(600, 300);
        save_document(&path, &[OraLayer::new("a", big.clone())], None, Some(&big)).unwrap();
        let thumb = read_document(&path).unwrap().thumbnail.unwrap();
        assert_eq!(thumb.size(), (256, 128));
    }

    #[test]
    fn test_blank_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.ora");
        create_blank_document(&path, 32, 16).unwrap();
        let doc = read_document(&path).unwrap();
        assert_eq!(doc.layers.len(), 1);
        assert_eq!(doc.layers[0].name, BACKGROUND_LAYER_NAME);
        assert_eq!(doc.layers[0].raster.count_color(Rgba::TRANSPARENT), 32 * 16);
        assert!(doc.thumbnail.is_some());
        assert!(create_blank_document(&path, 0, 16).is_err());
    }

    #[test]
    fn test_load_document_extracts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.ora");
        let layers = [OraLayer::new("one", solid(Rgba::BLACK)), OraLayer::new("two", solid(Rgba::WHITE))];
        save_document(&path, &layers, None, None).unwrap();

        let loaded = load_document(&path, &dir.path().join("unpacked")).unwrap();
        assert!(loaded.root.is_absolute());
        assert_eq!(loaded.layer_paths.len(), 2);
        assert_eq!(loaded.layer_paths[0], loaded.root.join("data/layer0.png"));
        for p in &loaded.layer_paths {
            assert!(p.is_file());
        }
        assert_eq!(fs::read(loaded.root.join("mimetype")).unwrap(), MIMETYPE.as_bytes());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_document(&dir.path().join("nope.ora")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_unsafe_entry_names() {
        let root = Path::new("/tmp/root");
        assert!(safe_join(root, "../evil.png").is_err());
        assert!(safe_join(root, "/etc/passwd").is_err());
        assert!(safe_join(root, "data/../../x").is_err());
        assert_eq!(safe_join(root, "data/layer0.png").unwrap(), root.join("data/layer0.png"));
    }

    #[test]
    fn test_is_openraster_negative() {
        assert!(!is_openraster(b""));
        assert!(!is_openraster(b"PK\x03\x04 nope"));
        let mut zip = ZipWriter::new();
        zip.add("stack.xml", b"<image/>").unwrap();
        assert!(!is_openraster(&zip.finish().unwrap()));
    }
}
