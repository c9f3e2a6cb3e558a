//! Archive Module
//!
//! OpenRaster persistence built on a small in-house ZIP codec:
//! - CRC-32
//! - ZIP writer (stored) and reader (stored and deflated)
//! - `stack.xml` manifest
//! - Document save/load and stack conversion

pub mod crc32;
mod document;
pub mod manifest;
mod ora;
pub mod zip;

pub use crc32::crc32;
pub use manifest::{ManifestLayer, StackManifest};
pub use ora::{
    create_blank_document, is_openraster, load_document, read_document, save_document, LoadedDocument,
    OraDocument, OraLayer, BACKGROUND_LAYER_NAME, MIMETYPE, STACK_ENTRY, THUMBNAIL_ENTRY,
};
pub use zip::{ZipReader, ZipWriter};
