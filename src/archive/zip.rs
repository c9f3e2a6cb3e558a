//! Minimal ZIP container
//!
//! The writer produces single-disk archives of stored entries with UTF-8
//! names. The reader walks the central directory and accepts stored and
//! deflated entries, verifying each entry's CRC-32.

use std::io::Read;

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use flate2::read::DeflateDecoder;
use log::debug;

use super::crc32::crc32;
use crate::error::{PaintError, Result};

const LOCAL_HEADER_SIG: u32 = 0x0403_4B50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4B50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4B50;

const LOCAL_HEADER_LEN: usize = 30;
const CENTRAL_HEADER_LEN: usize = 46;
const END_OF_CENTRAL_DIR_LEN: usize = 22;
const MAX_COMMENT_LEN: usize = 0xFFFF;
/// Upper bound on buffer space reserved from an entry's declared size
const MAX_PREALLOC: usize = 1 << 20;

const VERSION: u16 = 20;
/// General purpose flag bit 11: names are UTF-8
pub const FLAG_UTF8: u16 = 0x0800;

/// Entry compression method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Stored,
    Deflated,
}

impl Method {
    fn code(self) -> u16 {
        match self {
            Method::Stored => 0,
            Method::Deflated => 8,
        }
    }

    fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(Method::Stored),
            8 => Ok(Method::Deflated),
            other => Err(format_error(format!("unsupported compression method {other}"))),
        }
    }
}

fn format_error(reason: impl Into<String>) -> PaintError {
    PaintError::ArchiveFormat { reason: reason.into() }
}

/// MS-DOS `(time, date)` words for a timestamp; years before 1980 clamp
pub fn dos_date_time(when: NaiveDateTime) -> (u16, u16) {
    let year = (when.year().max(1980) - 1980) as u16;
    let date = (year << 9) | ((when.month() as u16) << 5) | when.day() as u16;
    let time = ((when.hour() as u16) << 11) | ((when.minute() as u16) << 5) | (when.second() as u16 / 2);
    (time, date)
}

#[derive(Debug, Clone)]
struct EntryMeta {
    name: Vec<u8>,
    method: u16,
    crc: u32,
    compressed_size: u32,
    size: u32,
    offset: u32,
}

/// In-memory ZIP writer
#[derive(Debug)]
pub struct ZipWriter {
    buf: Vec<u8>,
    entries: Vec<EntryMeta>,
    dos_time: u16,
    dos_date: u16,
}

impl Default for ZipWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipWriter {
    /// Writer stamping every entry with the current local time
    pub fn new() -> Self {
        Self::with_timestamp(Local::now().naive_local())
    }

    pub fn with_timestamp(when: NaiveDateTime) -> Self {
        let (dos_time, dos_date) = dos_date_time(when);
        Self {
            buf: Vec::new(),
            entries: Vec::new(),
            dos_time,
            dos_date,
        }
    }

    /// Append a stored entry
    pub fn add(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let size = to_u32(data.len(), name)?;
        self.add_raw(name, Method::Stored, data, crc32(data), size)
    }

    /// Append an entry whose payload is already encoded with `method`
    fn add_raw(&mut self, name: &str, method: Method, payload: &[u8], crc: u32, size: u32) -> Result<()> {
        let name_bytes = name.as_bytes().to_vec();
        if name_bytes.len() > u16::MAX as usize {
            return Err(format_error(format!("entry name too long: {name}")));
        }
        let meta = EntryMeta {
            method: method.code(),
            crc,
            compressed_size: to_u32(payload.len(), name)?,
            size,
            offset: to_u32(self.buf.len(), name)?,
            name: name_bytes,
        };

        let b = &mut self.buf;
        put_u32(b, LOCAL_HEADER_SIG);
        put_u16(b, VERSION);
        put_u16(b, FLAG_UTF8);
        put_u16(b, meta.method);
        put_u16(b, self.dos_time);
        put_u16(b, self.dos_date);
        put_u32(b, meta.crc);
        put_u32(b, meta.compressed_size);
        put_u32(b, meta.size);
        put_u16(b, meta.name.len() as u16);
        put_u16(b, 0);
        b.extend_from_slice(&meta.name);
        b.extend_from_slice(payload);

        debug!("zip: {} ({} bytes, crc {:08x})", name, meta.size, meta.crc);
        self.entries.push(meta);
        Ok(())
    }

    /// Write the central directory and return the archive bytes
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if self.entries.len() > u16::MAX as usize {
            return Err(format_error("too many entries"));
        }
        let cd_offset = to_u32(self.buf.len(), "central directory")?;
        let b = &mut self.buf;
        for e in &self.entries {
            put_u32(b, CENTRAL_HEADER_SIG);
            put_u16(b, VERSION); // made by
            put_u16(b, VERSION); // needed
            put_u16(b, FLAG_UTF8);
            put_u16(b, e.method);
            put_u16(b, self.dos_time);
            put_u16(b, self.dos_date);
            put_u32(b, e.crc);
            put_u32(b, e.compressed_size);
            put_u32(b, e.size);
            put_u16(b, e.name.len() as u16);
            put_u16(b, 0); // extra
            put_u16(b, 0); // comment
            put_u16(b, 0); // disk
            put_u16(b, 0); // internal attrs
            put_u32(b, 0); // external attrs
            put_u32(b, e.offset);
            b.extend_from_slice(&e.name);
        }
        let cd_size = to_u32(b.len(), "central directory")? - cd_offset;

        put_u32(b, END_OF_CENTRAL_DIR_SIG);
        put_u16(b, 0);
        put_u16(b, 0);
        put_u16(b, self.entries.len() as u16);
        put_u16(b, self.entries.len() as u16);
        put_u32(b, cd_size);
        put_u32(b, cd_offset);
        put_u16(b, 0);
        Ok(self.buf)
    }
}

fn to_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| format_error(format!("{what} exceeds 4 GiB")))
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn get_u16(data: &[u8], at: usize) -> Result<u16> {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| format_error("truncated archive"))
}

fn get_u32(data: &[u8], at: usize) -> Result<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| format_error("truncated archive"))
}

/// One central directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub name: String,
    pub method: Method,
    pub flags: u16,
    pub crc: u32,
    pub compressed_size: u32,
    pub size: u32,
    pub local_header_offset: u32,
}

/// Read-only view of a ZIP archive in memory
#[derive(Debug)]
pub struct ZipReader<'a> {
    data: &'a [u8],
    entries: Vec<ZipEntry>,
}

impl<'a> ZipReader<'a> {
    /// Parse the central directory
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let eocd = find_end_of_central_dir(data)?;
        let count = get_u16(data, eocd + 10)? as usize;
        let cd_offset = get_u32(data, eocd + 16)? as usize;

        let mut entries = Vec::with_capacity(count);
        let mut at = cd_offset;
        for _ in 0..count {
            if get_u32(data, at)? != CENTRAL_HEADER_SIG {
                return Err(format_error(format!("bad central directory header at {at}")));
            }
            let flags = get_u16(data, at + 8)?;
            let method = Method::from_code(get_u16(data, at + 10)?)?;
            let crc = get_u32(data, at + 16)?;
            let compressed_size = get_u32(data, at + 20)?;
            let size = get_u32(data, at + 24)?;
            let name_len = get_u16(data, at + 28)? as usize;
            let extra_len = get_u16(data, at + 30)? as usize;
            let comment_len = get_u16(data, at + 32)? as usize;
            let local_header_offset = get_u32(data, at + 42)?;

            let name_start = at + CENTRAL_HEADER_LEN;
            let name_bytes = data
                .get(name_start..name_start + name_len)
                .ok_or_else(|| format_error("truncated entry name"))?;
            let name = String::from_utf8_lossy(name_bytes).into_owned();

            entries.push(ZipEntry {
                name,
                method,
                flags,
                crc,
                compressed_size,
                size,
                local_header_offset,
            });
            at = name_start + name_len + extra_len + comment_len;
        }
        Ok(Self { data, entries })
    }

    /// Entries in central directory order
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn find(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Raw bytes of an entry as stored (possibly compressed)
    pub fn raw_data(&self, entry: &ZipEntry) -> Result<&'a [u8]> {
        let at = entry.local_header_offset as usize;
        if get_u32(self.data, at)? != LOCAL_HEADER_SIG {
            return Err(format_error(format!("bad local header for {}", entry.name)));
        }
        let name_len = get_u16(self.data, at + 26)? as usize;
        let extra_len = get_u16(self.data, at + 28)? as usize;
        let start = at + LOCAL_HEADER_LEN + name_len + extra_len;
        let end = start + entry.compressed_size as usize;
        self.data
            .get(start..end)
            .ok_or_else(|| format_error(format!("truncated data for {}", entry.name)))
    }

    /// Decompressed, CRC-checked contents of an entry
    pub fn read(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
        let raw = self.raw_data(entry)?;
        let bytes = match entry.method {
            Method::Stored => raw.to_vec(),
            Method::Deflated => {
                // Read at most one byte past the declared size
                let mut out = Vec::with_capacity((entry.size as usize).min(MAX_PREALLOC));
                DeflateDecoder::new(raw)
                    .take(u64::from(entry.size) + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| format_error(format!("inflate {}: {e}", entry.name)))?;
                out
            }
        };
        if bytes.len() != entry.size as usize {
            return Err(format_error(format!(
                "{}: expected {} bytes, got {}",
                entry.name,
                entry.size,
                bytes.len()
            )));
        }
        let actual = crc32(&bytes);
        if actual != entry.crc {
            return Err(format_error(format!(
                "{}: crc mismatch ({actual:08x} != {:08x})",
                entry.name, entry.crc
            )));
        }
        Ok(bytes)
    }

    /// Contents of the entry called `name`
    pub fn read_by_name(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .find(name)
            .ok_or_else(|| format_error(format!("missing entry {name}")))?;
        self.read(entry)
    }
}

fn find_end_of_central_dir(data: &[u8]) -> Result<usize> {
    if data.len() < END_OF_CENTRAL_DIR_LEN {
        return Err(format_error("file too small to be a zip archive"));
    }
    let last = data.len() - END_OF_CENTRAL_DIR_LEN;
    let first = last.saturating_sub(MAX_COMMENT_LEN);
    (first..=last)
        .rev()
        .find(|&at| data[at..at + 4] == END_OF_CENTRAL_DIR_SIG.to_le_bytes())
        .ok_or_else(|| format_error("end of central directory not found"))
}
