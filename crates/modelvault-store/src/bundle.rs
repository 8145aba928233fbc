//! Streaming parser for the native Git bundle container format.
//!
//! A bundle is a header (signature, optional v3 capabilities, prerequisite
//! and reference lines, blank-line separator) followed by a packfile. The
//! packfile starts with a `PACK` header and ends with a checksum trailer
//! covering everything before it, SHA-1 or SHA-256 depending on the
//! repository's object format.
//!
//! The parser never materializes the pack in memory; the payload is hashed
//! in fixed-size chunks while a tail buffer isolates the trailer.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};

const SIGNATURE_V2: &str = "# v2 git bundle";
const SIGNATURE_V3: &str = "# v3 git bundle";
const PACK_MAGIC: &[u8; 4] = b"PACK";
const READ_CHUNK: usize = 64 * 1024;

/// Hash function used for object ids and the pack trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFormat {
    Sha1,
    Sha256,
}

impl ObjectFormat {
    pub fn hex_len(self) -> usize {
        match self {
            ObjectFormat::Sha1 => 40,
            ObjectFormat::Sha256 => 64,
        }
    }

    pub fn trailer_len(self) -> usize {
        match self {
            ObjectFormat::Sha1 => 20,
            ObjectFormat::Sha256 => 32,
        }
    }
}

/// Structural facts about a parsed bundle.
#[derive(Debug, Clone)]
pub struct BundleSummary {
    /// Bundle format version (2 or 3).
    pub version: u8,
    pub object_format: ObjectFormat,
    /// `(object id, ref name)` pairs listed in the header.
    pub refs: Vec<(String, String)>,
    /// Objects the bundle assumes exist on the receiving side. A
    /// self-contained snapshot has none.
    pub prerequisites: Vec<String>,
    /// Object count from the pack header.
    pub pack_objects: u32,
    /// Object filter recorded in a v3 capability, if any.
    pub filter: Option<String>,
}

enum TrailerHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl TrailerHasher {
    fn new(format: ObjectFormat) -> Self {
        match format {
            ObjectFormat::Sha1 => TrailerHasher::Sha1(Sha1::new()),
            ObjectFormat::Sha256 => TrailerHasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            TrailerHasher::Sha1(h) => h.update(data),
            TrailerHasher::Sha256(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            TrailerHasher::Sha1(h) => h.finalize().to_vec(),
            TrailerHasher::Sha256(h) => h.finalize().to_vec(),
        }
    }
}

fn corrupt(detail: impl Into<String>) -> StoreError {
    StoreError::CorruptBundle(detail.into())
}

fn read_header_line(reader: &mut impl BufRead) -> StoreResult<Option<String>> {
    let mut raw = Vec::new();
    let n = reader.read_until(b'\n', &mut raw)?;
    if n == 0 {
        return Ok(None);
    }
    if raw.last() == Some(&b'\n') {
        raw.pop();
    }
    let line = String::from_utf8(raw).map_err(|_| corrupt("non-UTF-8 header line"))?;
    Ok(Some(line))
}

fn validate_oid(oid: &str, format: ObjectFormat) -> StoreResult<()> {
    if oid.len() != format.hex_len() || !oid.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(corrupt(format!("malformed object id '{oid}'")));
    }
    Ok(())
}

/// Parse and structurally validate the bundle at `path`.
///
/// Returns a [`BundleSummary`] on success. Any malformation (unrecognized
/// signature, bad object id, truncated pack, checksum mismatch) yields
/// [`StoreError::CorruptBundle`] naming the problem.
pub fn inspect_bundle(path: &Path) -> StoreResult<BundleSummary> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let signature = read_header_line(&mut reader)?.ok_or_else(|| corrupt("empty file"))?;
    let version: u8 = match signature.as_str() {
        SIGNATURE_V2 => 2,
        SIGNATURE_V3 => 3,
        _ => return Err(corrupt("unrecognized bundle signature")),
    };

    let mut object_format = ObjectFormat::Sha1;
    let mut filter = None;
    let mut refs = Vec::new();
    let mut prerequisites = Vec::new();
    let mut in_capabilities = version == 3;

    loop {
        let line = read_header_line(&mut reader)?
            .ok_or_else(|| corrupt("truncated header: no pack section"))?;
        if line.is_empty() {
            break;
        }

        if in_capabilities && line.starts_with('@') {
            match line.split_once('=') {
                Some(("@object-format", "sha1")) => object_format = ObjectFormat::Sha1,
                Some(("@object-format", "sha256")) => object_format = ObjectFormat::Sha256,
                Some(("@filter", expr)) => filter = Some(expr.to_string()),
                _ => return Err(corrupt(format!("unknown capability '{line}'"))),
            }
            continue;
        }
        in_capabilities = false;

        if let Some(rest) = line.strip_prefix('-') {
            // Prerequisite: "<oid>" optionally followed by a comment.
            let oid = rest.split_whitespace().next().unwrap_or("");
            validate_oid(oid, object_format)?;
            prerequisites.push(oid.to_string());
        } else {
            let (oid, refname) = line
                .split_once(' ')
                .ok_or_else(|| corrupt(format!("malformed reference line '{line}'")))?;
            validate_oid(oid, object_format)?;
            if refname.is_empty() {
                return Err(corrupt("reference line with empty ref name"));
            }
            refs.push((oid.to_string(), refname.to_string()));
        }
    }

    if refs.is_empty() {
        return Err(corrupt("bundle lists no references"));
    }

    // ── Pack section ──────────────────────────────────────────────────────
    let mut header = [0u8; 12];
    reader
        .read_exact(&mut header)
        .map_err(|_| corrupt("truncated pack header"))?;
    if &header[0..4] != PACK_MAGIC {
        return Err(corrupt("bad pack signature"));
    }
    let pack_version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    if pack_version != 2 && pack_version != 3 {
        return Err(corrupt(format!("unsupported pack version {pack_version}")));
    }
    let pack_objects = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);

    // The trailer covers the pack from its magic bytes to just before the
    // trailer itself. Keep the last `trailer_len` bytes out of the hash.
    let trailer_len = object_format.trailer_len();
    let mut hasher = TrailerHasher::new(object_format);
    hasher.update(&header);

    let mut tail: Vec<u8> = Vec::with_capacity(trailer_len + READ_CHUNK);
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        tail.extend_from_slice(&buf[..n]);
        if tail.len() > trailer_len {
            let cut = tail.len() - trailer_len;
            hasher.update(&tail[..cut]);
            tail.drain(..cut);
        }
    }

    if tail.len() < trailer_len {
        return Err(corrupt("truncated pack trailer"));
    }
    if hasher.finalize() != tail {
        return Err(corrupt("pack checksum mismatch"));
    }

    Ok(BundleSummary {
        version,
        object_format,
        refs,
        prerequisites,
        pack_objects,
        filter,
    })
}

/// SHA-256 hex digest of a file, streamed in fixed-size chunks.
pub fn sha256_file(path: &Path) -> StoreResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
