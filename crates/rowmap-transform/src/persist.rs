//! Saved transform layout and version checks.
//!
//! Layout (little-endian):
//! [ signature: 8 bytes ][ written: u32 ][ readable: u32 ][ read_back: u32 ]
//! [ schema fingerprint: 32 bytes ][ loader len: u16 ][ loader utf8 … ]
//! [ state len: u64 ][ state bytes … ][ checksum: 32 bytes ]
//!
//! The checksum is blake3 over everything before it. The state bytes belong
//! to the mapper named by `loader`; nothing here interprets them.

use rowmap_core::error::{Error, Result};
use rowmap_core::hash::{hash_bytes, Hash256};

pub const SIGNATURE: [u8; 8] = *b"RMAPXFRM";

/// Format version this build writes.
pub const VERSION_CURRENT: u32 = 2;
/// Oldest reader that can read what this build writes.
pub const VERSION_READABLE: u32 = 1;
/// Oldest written version this build can read.
pub const VERSION_READ_BACK: u32 = 1;

const CHECKSUM_LEN: usize = 32;
const FIXED_LEN: usize = 8 + 4 + 4 + 4 + 32 + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub written: u32,
    pub readable: u32,
    pub read_back: u32,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            written: VERSION_CURRENT,
            readable: VERSION_READABLE,
            read_back: VERSION_READ_BACK,
        }
    }

    /// Fails when the file needs a newer reader, or predates what this build
    /// still reads.
    pub fn check_readable(&self) -> Result<()> {
        if self.readable > VERSION_CURRENT || self.written < VERSION_READ_BACK {
            return Err(Error::Version {
                written: self.written,
                readable: self.readable,
                read_back: VERSION_READ_BACK,
                current: VERSION_CURRENT,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformHeader {
    pub versions: VersionInfo,
    pub schema_fingerprint: Hash256,
    /// Registry signature of the mapper that owns the state bytes.
    pub loader: String,
}

impl TransformHeader {
    pub fn new(schema_fingerprint: Hash256, loader: impl Into<String>) -> Self {
        Self {
            versions: VersionInfo::current(),
            schema_fingerprint,
            loader: loader.into(),
        }
    }
}

pub fn encode(header: &TransformHeader, state: &[u8]) -> Result<Vec<u8>> {
    let loader = header.loader.as_bytes();
    let loader_len = u16::try_from(loader.len())
        .map_err(|_| Error::Codec(format!("loader signature too long: {}", loader.len())))?;

    let mut out = Vec::with_capacity(FIXED_LEN + loader.len() + 8 + state.len() + CHECKSUM_LEN);
    out.extend_from_slice(&SIGNATURE);
    out.extend_from_slice(&header.versions.written.to_le_bytes());
    out.extend_from_slice(&header.versions.readable.to_le_bytes());
    out.extend_from_slice(&header.versions.read_back.to_le_bytes());
    out.extend_from_slice(&header.schema_fingerprint.0);
    out.extend_from_slice(&loader_len.to_le_bytes());
    out.extend_from_slice(loader);
    out.extend_from_slice(&(state.len() as u64).to_le_bytes());
    out.extend_from_slice(state);

    let checksum = hash_bytes(&out);
    out.extend_from_slice(&checksum.0);
    Ok(out)
}

/// Parse and validate `bytes`, returning the header and the state bytes.
/// Versions are checked before anything past them is trusted.
pub fn decode(bytes: &[u8]) -> Result<(TransformHeader, &[u8])> {
    let mut r = Reader { bytes, pos: 0 };

    if r.take(8)? != SIGNATURE {
        return Err(Error::Codec("not a saved row-mapper transform".into()));
    }
    let versions = VersionInfo {
        written: r.u32()?,
        readable: r.u32()?,
        read_back: r.u32()?,
    };
    versions.check_readable()?;

    let mut fingerprint = [0u8; 32];
    fingerprint.copy_from_slice(r.take(32)?);
    let loader_len = usize::from(r.u16()?);
    let loader = std::str::from_utf8(r.take(loader_len)?)
        .map_err(|e| Error::Codec(format!("loader signature is not utf8: {e}")))?
        .to_string();
    let state_len = usize::try_from(r.u64()?)
        .map_err(|_| Error::Codec("state length overflows".into()))?;
    let state = r.take(state_len)?;

    let body_len = r.pos;
    let stored = r.take(CHECKSUM_LEN)?;
    if hash_bytes(&bytes[..body_len]).0 != stored {
        return Err(Error::Codec("checksum mismatch".into()));
    }
    if r.pos != bytes.len() {
        return Err(Error::Codec(format!(
            "{} trailing bytes after checksum",
            bytes.len() - r.pos
        )));
    }

    Ok((
        TransformHeader {
            versions,
            schema_fingerprint: Hash256(fingerprint),
            loader,
        },
        state,
    ))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| Error::Codec(format!("truncated at byte {}", self.pos)))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}
