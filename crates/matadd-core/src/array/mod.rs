//! Uploaded array decoding (`.npy` / `.npz`) and `f32` normalization.
//!
//! Decoding only validates headers and byte lengths; element conversion is
//! deferred to [`UploadedArray::to_f32`] so callers can reject mismatched
//! shapes before touching the data.

pub mod npy;
pub mod npz;

use bytes::{Buf, Bytes};

use crate::error::{MatAddError, Result};

/// Byte order of multi-byte elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Element kind of a NumPy dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    UInt,
    Float,
}

/// Supported element type (`descr` in NumPy terms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DType {
    pub kind: Kind,
    pub size: usize,
    pub endian: Endian,
}

impl DType {
    /// Parse a NumPy `descr` string such as `<f4`, `|b1`, `>i8`.
    pub fn parse(descr: &str) -> Result<Self> {
        let bad = || MatAddError::InvalidUpload(format!("unsupported dtype '{descr}'"));

        let mut chars = descr.chars();
        let (endian, rest) = match chars.next() {
            Some('<') | Some('|') => (Endian::Little, chars.as_str()),
            Some('>') => (Endian::Big, chars.as_str()),
            Some('=') if cfg!(target_endian = "big") => (Endian::Big, chars.as_str()),
            Some('=') => (Endian::Little, chars.as_str()),
            _ => (Endian::Little, descr),
        };

        let mut rest_chars = rest.chars();
        let kind = match rest_chars.next() {
            Some('?') => return Ok(Self { kind: Kind::Bool, size: 1, endian }),
            Some('b') => Kind::Bool,
            Some('i') => Kind::Int,
            Some('u') => Kind::UInt,
            Some('f') => Kind::Float,
            _ => return Err(bad()),
        };
        let size: usize = rest_chars.as_str().parse().map_err(|_| bad())?;

        let ok = match kind {
            Kind::Bool => size == 1,
            Kind::Int | Kind::UInt => matches!(size, 1 | 2 | 4 | 8),
            Kind::Float => matches!(size, 2 | 4 | 8),
        };
        if !ok {
            return Err(bad());
        }
        Ok(Self { kind, size, endian })
    }

    /// Read one element and widen/narrow it to `f32` (float cast semantics).
    fn read_f32(&self, mut b: &[u8]) -> f32 {
        let le = self.endian == Endian::Little;
        match (self.kind, self.size) {
            (Kind::Bool, _) => {
                if b.get_u8() != 0 { 1.0 } else { 0.0 }
            }
            (Kind::Int, 1) => b.get_i8() as f32,
            (Kind::Int, 2) => (if le { b.get_i16_le() } else { b.get_i16() }) as f32,
            (Kind::Int, 4) => (if le { b.get_i32_le() } else { b.get_i32() }) as f32,
            (Kind::Int, _) => (if le { b.get_i64_le() } else { b.get_i64() }) as f32,
            (Kind::UInt, 1) => b.get_u8() as f32,
            (Kind::UInt, 2) => (if le { b.get_u16_le() } else { b.get_u16() }) as f32,
            (Kind::UInt, 4) => (if le { b.get_u32_le() } else { b.get_u32() }) as f32,
            (Kind::UInt, _) => (if le { b.get_u64_le() } else { b.get_u64() }) as f32,
            (Kind::Float, 2) => {
                half::f16::from_bits(if le { b.get_u16_le() } else { b.get_u16() }).to_f32()
            }
            (Kind::Float, 4) => if le { b.get_f32_le() } else { b.get_f32() },
            (Kind::Float, _) => (if le { b.get_f64_le() } else { b.get_f64() }) as f32,
        }
    }
}

/// A decoded upload: header metadata plus the raw element bytes.
#[derive(Debug, Clone)]
pub struct UploadedArray {
    pub(crate) dtype: DType,
    pub(crate) shape: Vec<usize>,
    pub(crate) fortran_order: bool,
    pub(crate) data: Bytes,
}

impl UploadedArray {
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Normalize to a C-ordered `f32` buffer. NaN and infinities pass through;
    /// out-of-range values saturate to infinity.
    ///
    /// The result holds `4 / dtype.size` times as many bytes as the raw data
    /// (four times for `u1`/`b1`, half for `f8`).
    pub fn to_f32(&self) -> Vec<f32> {
        let values: Vec<f32> = self
            .data
            .chunks_exact(self.dtype.size)
            .map(|chunk| self.dtype.read_f32(chunk))
            .collect();

        if self.fortran_order && self.shape.len() > 1 {
            fortran_to_c(&values, &self.shape)
        } else {
            values
        }
    }
}

/// Reorder a column-major buffer into row-major order.
fn fortran_to_c(values: &[f32], shape: &[usize]) -> Vec<f32> {
    let rank = shape.len();

    // Row-major strides for the destination.
    let mut c_strides = vec![1usize; rank];
    for i in (0..rank.saturating_sub(1)).rev() {
        c_strides[i] = c_strides[i + 1] * shape[i + 1];
    }

    let mut out = vec![0.0f32; values.len()];
    let mut index = vec![0usize; rank];
    for &v in values {
        let dst: usize = index.iter().zip(&c_strides).map(|(i, s)| i * s).sum();
        if let Some(slot) = out.get_mut(dst) {
            *slot = v;
        }
        // Column-major: the first axis varies fastest.
        for (axis, i) in index.iter_mut().enumerate() {
            *i += 1;
            if *i < shape[axis] {
                break;
            }
            *i = 0;
        }
    }
    out
}

/// Decode an uploaded payload, accepting either an `.npz` container or a bare
/// `.npy` file.
///
/// `max_member_bytes` caps the decompressed size of the selected `.npz`
/// member. A bare `.npy` is already bounded by the upload itself.
pub fn decode_upload(bytes: Bytes, max_member_bytes: u64) -> Result<UploadedArray> {
    if bytes.starts_with(npy::NPY_MAGIC) {
        return npy::parse_npy(bytes);
    }
    if bytes.starts_with(npz::ZIP_MAGIC) || bytes.starts_with(npz::ZIP_EMPTY_MAGIC) {
        return npz::parse_npz(bytes, max_member_bytes);
    }
    if bytes.is_empty() {
        return Err(MatAddError::InvalidUpload("empty upload".into()));
    }
    Err(MatAddError::InvalidUpload(
        "payload is neither a .npz archive nor a .npy file".into(),
    ))
}
