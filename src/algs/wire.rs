//! Fixed, versioned, little-endian wire types for collective steps.

use crate::geometry::{IndexBox, MAX_DIM};
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// All multi-byte integers in these structs are **little-endian** on the wire.
/// We store them pre-LE with `.to_le()` and decode with `.from_le()`.

// ===== Collective header ===================================================

/// Status carried by a header sent from the root back to the workers.
pub const STATUS_OK: u16 = 0;
pub const STATUS_ABORT: u16 = 1;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct WireHeader {
    pub version_le: u16,
    pub op_le: u16,
    pub status_le: u16,
    pub reserved_le: u16, // keep zero
    pub epoch_le: u64,
    pub len_le: u64, // payload bytes following this header
}

const_assert_eq!(size_of::<WireHeader>(), 24);

impl WireHeader {
    pub fn new(op: u16, epoch: u64, len: usize, status: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            op_le: op.to_le(),
            status_le: status.to_le(),
            reserved_le: 0,
            epoch_le: epoch.to_le(),
            len_le: (len as u64).to_le(),
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn op(&self) -> u16 {
        u16::from_le(self.op_le)
    }
    pub fn status(&self) -> u16 {
        u16::from_le(self.status_le)
    }
    pub fn epoch(&self) -> u64 {
        u64::from_le(self.epoch_le)
    }
    pub fn len(&self) -> usize {
        u64::from_le(self.len_le) as usize
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        expect_exact_len(bytes.len(), size_of::<Self>())?;
        let h: WireHeader = bytemuck::pod_read_unaligned(bytes);
        if h.version() != WIRE_VERSION {
            return Err(format!(
                "wire version {} does not match {WIRE_VERSION}",
                h.version()
            ));
        }
        Ok(h)
    }
}

// ===== Payload records =====================================================

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct WireCount {
    pub n_le: u64,
}

const_assert_eq!(size_of::<WireCount>(), 8);

impl WireCount {
    pub fn new(n: u64) -> Self {
        Self { n_le: n.to_le() }
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.n_le)
    }
}

/// A cell index carried on the wire (unused axes zero).
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct WireCell {
    pub idx_le: [i64; MAX_DIM],
}

const_assert_eq!(size_of::<WireCell>(), 24);

impl WireCell {
    pub fn new(cell: [i64; MAX_DIM]) -> Self {
        Self {
            idx_le: cell.map(i64::to_le),
        }
    }
    pub fn get(&self) -> [i64; MAX_DIM] {
        self.idx_le.map(i64::from_le)
    }
}

/// An [`IndexBox`] carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct WireBox {
    pub dim_le: u64,
    pub lower_le: [i64; MAX_DIM],
    pub upper_le: [i64; MAX_DIM],
}

const_assert_eq!(size_of::<WireBox>(), 56);

impl WireBox {
    pub fn new(b: &IndexBox) -> Self {
        Self {
            dim_le: (b.dim() as u64).to_le(),
            lower_le: b.lower_array().map(i64::to_le),
            upper_le: b.upper_array().map(i64::to_le),
        }
    }
    pub fn get(&self) -> IndexBox {
        IndexBox::from_arrays(
            (u64::from_le(self.dim_le) as usize).min(MAX_DIM),
            self.lower_le.map(i64::from_le),
            self.upper_le.map(i64::from_le),
        )
    }
}

/// Decode a payload made of whole `T` records.
pub fn decode_records<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, String> {
    let rec = size_of::<T>();
    if bytes.len() % rec != 0 {
        return Err(format!(
            "payload of {} bytes is not a multiple of the {rec}-byte record",
            bytes.len()
        ));
    }
    Ok(bytes
        .chunks_exact(rec)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

pub fn encode_boxes(boxes: &[IndexBox]) -> Vec<u8> {
    let recs: Vec<WireBox> = boxes.iter().map(WireBox::new).collect();
    cast_slice(&recs).to_vec()
}

pub fn decode_boxes(bytes: &[u8]) -> Result<Vec<IndexBox>, String> {
    Ok(decode_records::<WireBox>(bytes)?
        .iter()
        .map(WireBox::get)
        .collect())
}

pub fn encode_cells(cells: &[[i64; MAX_DIM]]) -> Vec<u8> {
    let recs: Vec<WireCell> = cells.iter().copied().map(WireCell::new).collect();
    cast_slice(&recs).to_vec()
}

pub fn decode_cells(bytes: &[u8]) -> Result<Vec<[i64; MAX_DIM]>, String> {
    Ok(decode_records::<WireCell>(bytes)?
        .iter()
        .map(WireCell::get)
        .collect())
}
