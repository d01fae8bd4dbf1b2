//! Upload decoding vector tests (`.npy` and `.npz`).

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use bytes::Bytes;

use matadd_core::array::{decode_upload, DType};

const MAX_MEMBER_BYTES: u64 = 1 << 20;

mod vector_loader;
use vector_loader::TestVector;

fn load(name: &str) -> TestVector {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

#[test]
fn upload_vectors() {
    let files = [
        "npy_f4_2x2.json",
        "npy_f8_fortran.json",
        "npy_i8_big_endian.json",
        "npy_v2_header.json",
        "npy_truncated.json",
        "npy_bad_version.json",
        "npy_object_dtype.json",
        "npz_two_members.json",
        "npz_compressed.json",
        "npz_empty.json",
        "not_numpy.json",
    ];

    for f in files {
        let v = load(f);
        let res = decode_upload(Bytes::from(v.upload.decode()), MAX_MEMBER_BYTES);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.client_code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let arr = res.expect("expected decoded array");
        let ex = v.expect.expect("missing expect block");

        assert_eq!(arr.shape(), ex.shape.as_slice(), "vector={}", v.description);
        assert_eq!(arr.dtype(), DType::parse(&ex.dtype).unwrap(), "vector={}", v.description);
        assert_eq!(arr.to_f32(), ex.values, "vector={}", v.description);
    }
}

#[test]
fn truncated_error_mentions_sizes() {
    let v = load("npy_truncated.json");
    let err = decode_upload(Bytes::from(v.upload.decode()), MAX_MEMBER_BYTES).unwrap_err();
    assert!(err.to_string().contains("expected 16 bytes, found 12"), "{err}");
}
