//! Exact nearest-neighbour index over squared L2 distance.
//!
//! File layout (little endian):
//!
//! ```text
//! magic    8 bytes  "GEVFLAT1"
//! version  u32
//! dim      u32
//! count    u64
//! sha256   32 bytes over the payload
//! payload  count * dim f32
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::mem::size_of;
use std::path::Path;

use memmap2::Mmap;
use rayon::prelude::*;
use sha2::{Digest, Sha256};

use crate::config::Number;
use crate::error::{Error, Result};
use crate::vector_ops::squared_l2_simd;

const MAGIC: &[u8; 8] = b"GEVFLAT1";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 4 + 8 + 32;

/// Label reported for result slots beyond the number of stored vectors.
pub const NO_LABEL: i64 = -1;

pub struct FlatL2Index {
    dimension: usize,
    data: Vec<Number>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vector(&self, position: usize) -> Option<&[Number]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Appends vectors at positions `len()..len() + vectors.len()`. Nothing
    /// is added if any vector has the wrong dimension.
    pub fn add(&mut self, vectors: &[Vec<Number>]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got: bad.len(),
            });
        }
        self.data.reserve(vectors.len() * self.dimension);
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    /// Returns exactly `k` `(label, distance)` pairs in ascending distance.
    /// When fewer than `k` vectors are stored the tail is padded with
    /// [`NO_LABEL`] and infinite distance.
    pub fn search(&self, query: &[Number], k: usize) -> Result<Vec<(i64, Number)>> {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, Number)> = self
            .data
            .par_chunks_exact(self.dimension.max(1))
            .enumerate()
            .map(|(i, v)| (i, squared_l2_simd(query, v)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        let mut hits: Vec<(i64, Number)> = scored.into_iter().map(|(i, d)| (i as i64, d)).collect();
        hits.resize(k, (NO_LABEL, Number::INFINITY));
        Ok(hits)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let payload: Vec<u8> = self.data.iter().flat_map(|x| x.to_le_bytes()).collect();
        let checksum = Sha256::digest(&payload);

        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer, &checksum, &payload)
            .map_err(|e| Error::io(path, e))
    }

    fn write_to(&self, writer: &mut BufWriter<File>, checksum: &[u8], payload: &[u8]) -> std::io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;
        writer.write_all(checksum)?;
        writer.write_all(payload)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let file_len = file.metadata().map_err(|e| Error::io(path, e))?.len() as usize;
        if file_len < HEADER_LEN {
            return Err(Error::corrupt(path, "file shorter than header"));
        }

        let mmap = unsafe { Mmap::map(&file).map_err(|e| Error::io(path, e))? };

        if &mmap[..8] != MAGIC {
            return Err(Error::corrupt(path, "bad magic"));
        }
        let version = read_u32(&mmap[8..12]);
        if version != VERSION {
            return Err(Error::corrupt(path, format!("unsupported version {}", version)));
        }
        let dimension = read_u32(&mmap[12..16]) as usize;
        let count = read_u64(&mmap[16..24]) as usize;
        let checksum = &mmap[24..HEADER_LEN];

        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(size_of::<Number>()))
            .ok_or_else(|| Error::corrupt(path, "header size overflow"))?;
        let payload = &mmap[HEADER_LEN..];
        if payload.len() != expected {
            return Err(Error::corrupt(
                path,
                format!("payload is {} bytes, header implies {}", payload.len(), expected),
            ));
        }
        if Sha256::digest(payload).as_slice() != checksum {
            return Err(Error::corrupt(path, "checksum mismatch"));
        }

        let data = payload
            .chunks_exact(size_of::<Number>())
            .map(|b| Number::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self { dimension, data })
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
