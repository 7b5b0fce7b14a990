//! Binary wire format for a single `DDSketch`, plus length-prefixed framing
//! for a slice of them (the shape a `TopNBatch`'s tail aggregate travels
//! in). Each field is little-endian; nothing here depends on the host's
//! native endianness.
//!
//! ```text
//! magic       4 bytes   b"DDSK"
//! version     1 byte    SKETCH_WIRE_VERSION
//! flags       1 byte    bit0 sparse-active, bit1 has-min, bit2 has-max, bit3 has-sum
//! gamma       8 bytes   f64
//! v_min       8 bytes   f64
//! v_max       8 bytes   f64
//! count       8 bytes   u64
//! min         8 bytes   f64   (present iff flags bit1)
//! max         8 bytes   f64   (present iff flags bit2)
//! sum         8 bytes   f64   (present iff flags bit3)
//! num_buckets 4 bytes   u32
//! buckets     num_buckets * (index: i32, count: u64)
//! ```

use pp_common::schema::SKETCH_WIRE_VERSION;

use crate::error::{Result, SketchError};
use crate::sketch::{DDSketch, SketchTuning};
use crate::store::{Store, StoreShape};

const MAGIC: &[u8; 4] = b"DDSK";

const FLAG_SPARSE_ACTIVE: u8 = 0b0001;
const FLAG_HAS_MIN: u8 = 0b0010;
const FLAG_HAS_MAX: u8 = 0b0100;
const FLAG_HAS_SUM: u8 = 0b1000;

impl DDSketch {
    pub fn to_bytes(&self) -> Vec<u8> {
        let entries: Vec<(i32, u64)> = self.active_store().ascending_entries().collect();

        let mut flags = 0u8;
        if self.active_shape() == StoreShape::Sparse {
            flags |= FLAG_SPARSE_ACTIVE;
        }
        if self.min().is_some() {
            flags |= FLAG_HAS_MIN;
        }
        if self.max().is_some() {
            flags |= FLAG_HAS_MAX;
        }
        if self.count() > 0 {
            flags |= FLAG_HAS_SUM;
        }

        let mut out = Vec::with_capacity(35 + entries.len() * 12);
        out.extend_from_slice(MAGIC);
        out.push(SKETCH_WIRE_VERSION);
        out.push(flags);
        out.extend_from_slice(&self.gamma().to_le_bytes());
        out.extend_from_slice(&self.v_min().to_le_bytes());
        out.extend_from_slice(&self.v_max().to_le_bytes());
        out.extend_from_slice(&self.count().to_le_bytes());
        if let Some(min) = self.min() {
            out.extend_from_slice(&min.to_le_bytes());
        }
        if let Some(max) = self.max() {
            out.extend_from_slice(&max.to_le_bytes());
        }
        if self.count() > 0 {
            out.extend_from_slice(&self.sum().to_le_bytes());
        }
        out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for (idx, count) in entries {
            out.extend_from_slice(&idx.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_tuning(bytes, SketchTuning::default())
    }

    pub fn from_bytes_with_tuning(bytes: &[u8], tuning: SketchTuning) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let magic = cur.take(4)?;
        if magic != MAGIC {
            return Err(SketchError::BadMagic);
        }
        let version = cur.take_u8()?;
        if version != SKETCH_WIRE_VERSION {
            return Err(SketchError::UnsupportedVersion(version));
        }
        let flags = cur.take_u8()?;
        let gamma = cur.take_f64()?;
        let v_min = cur.take_f64()?;
        let v_max = cur.take_f64()?;
        let count = cur.take_u64()?;

        let min = if flags & FLAG_HAS_MIN != 0 {
            Some(cur.take_f64()?)
        } else {
            None
        };
        let max = if flags & FLAG_HAS_MAX != 0 {
            Some(cur.take_f64()?)
        } else {
            None
        };
        let sum = if flags & FLAG_HAS_SUM != 0 {
            cur.take_f64()?
        } else {
            0.0
        };

        let num_buckets = cur.take_u32()? as usize;
        let mut entries = Vec::with_capacity(num_buckets);
        for _ in 0..num_buckets {
            let idx = cur.take_i32()?;
            let cnt = cur.take_u64()?;
            entries.push((idx, cnt));
        }

        let shape = if flags & FLAG_SPARSE_ACTIVE != 0 {
            StoreShape::Sparse
        } else {
            StoreShape::Dense
        };
        let active = match shape {
            StoreShape::Sparse => {
                Store::Sparse(crate::store::SparseStore::from_entries(entries))
            }
            StoreShape::Dense => Store::Dense(crate::store::DenseStore::from_entries(entries)),
        };
        debug_assert_eq!(active.total_count(), count);

        Ok(DDSketch::from_parts(
            gamma, v_min, v_max, active, min, max, sum, tuning,
        ))
    }
}

/// Encode a slice of sketches as `u32` count followed by each sketch
/// framed with its own `u32` length prefix.
pub fn encode_slice(sketches: &[DDSketch]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(sketches.len() as u32).to_le_bytes());
    for s in sketches {
        let bytes = s.to_bytes();
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&bytes);
    }
    out
}

pub fn decode_slice(bytes: &[u8]) -> Result<Vec<DDSketch>> {
    let mut cur = Cursor::new(bytes);
    let count = cur.take_u32()? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let len = cur.take_u32()? as usize;
        let chunk = cur.take(len)?;
        out.push(DDSketch::from_bytes(chunk)?);
    }
    Ok(out)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(SketchError::Truncated("unexpected end of buffer"));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes(b.try_into().unwrap()))
    }

    fn take_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes(b.try_into().unwrap()))
    }

    fn take_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().unwrap()))
    }

    fn take_f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes(b.try_into().unwrap()))
    }
}
