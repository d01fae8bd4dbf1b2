//! `.npz` containers: ZIP archives whose members are `.npy` payloads.
//!
//! Selection rule: the first member in central-directory order is used. That
//! is the order `numpy.savez` writes its arguments, so `savez(f, a, b)` yields
//! `a`. Remaining members are ignored.

use std::io::{Cursor, Read};

use bytes::Bytes;

use crate::array::{npy, UploadedArray};
use crate::error::{MatAddError, Result};

/// Local file header signature.
pub const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";
/// End-of-central-directory signature (an archive with no members).
pub const ZIP_EMPTY_MAGIC: &[u8; 4] = b"PK\x05\x06";

/// Decode the first member, refusing to inflate it past `max_member_bytes`.
pub fn parse_npz(bytes: Bytes, max_member_bytes: u64) -> Result<UploadedArray> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| MatAddError::InvalidUpload(e.to_string()))?;

    let members = archive.len();
    if members == 0 {
        return Err(MatAddError::InvalidUpload("archive contains no arrays".into()));
    }

    let mut file = archive
        .by_index(0)
        .map_err(|e| MatAddError::InvalidUpload(e.to_string()))?;
    let name = file.name().to_string();

    if file.size() > max_member_bytes {
        return Err(too_large(&name, max_member_bytes));
    }

    // The declared size is untrusted; the read itself is capped as well.
    let mut raw = Vec::with_capacity(file.size() as usize);
    (&mut file)
        .take(max_member_bytes.saturating_add(1))
        .read_to_end(&mut raw)
        .map_err(|e| MatAddError::InvalidUpload(format!("failed to read member {name}: {e}")))?;
    if raw.len() as u64 > max_member_bytes {
        return Err(too_large(&name, max_member_bytes));
    }

    tracing::debug!(member = %name, ignored = members - 1, "selected first npz member");

    npy::parse_npy(Bytes::from(raw)).map_err(|e| match e {
        MatAddError::InvalidUpload(msg) => MatAddError::InvalidUpload(format!("{name}: {msg}")),
        other => other,
    })
}

fn too_large(name: &str, limit: u64) -> MatAddError {
    MatAddError::InvalidUpload(format!("member {name} is too large (limit {limit} bytes)"))
}
