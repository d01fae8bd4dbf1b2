//! `.npy` parsing (panic-free).
//!
//! Layout: `\x93NUMPY`, major, minor, header length (u16 for v1, u32 for
//! v2/v3), a Python dict literal padded with spaces and a newline, then the
//! raw element bytes.
//!
//! Parsing rules:
//! - Never index raw buffers; use `Buf` with `remaining()` checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, Bytes};

use crate::array::{DType, UploadedArray};
use crate::error::{MatAddError, Result};

/// Magic prefix of every `.npy` payload.
pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

fn invalid(msg: impl Into<String>) -> MatAddError {
    MatAddError::InvalidUpload(msg.into())
}

/// Decode a `.npy` payload. The element bytes are kept as a zero-copy slice.
pub fn parse_npy(mut buf: Bytes) -> Result<UploadedArray> {
    if buf.remaining() < NPY_MAGIC.len() + 2 || !buf.starts_with(NPY_MAGIC) {
        return Err(invalid("missing .npy magic"));
    }
    buf.advance(NPY_MAGIC.len());

    let major = buf.get_u8();
    let _minor = buf.get_u8();

    let header_len = match major {
        1 => {
            if buf.remaining() < 2 {
                return Err(invalid("truncated .npy header length"));
            }
            buf.get_u16_le() as usize
        }
        2 | 3 => {
            if buf.remaining() < 4 {
                return Err(invalid("truncated .npy header length"));
            }
            buf.get_u32_le() as usize
        }
        v => return Err(invalid(format!("unsupported .npy format version {v}"))),
    };

    if buf.remaining() < header_len {
        return Err(invalid("truncated .npy header"));
    }
    let header_bytes = buf.split_to(header_len);
    let header = std::str::from_utf8(&header_bytes)
        .map_err(|_| invalid(".npy header is not valid text"))?;
    let header = parse_header(header)?;

    let count = element_count(&header.shape)?;
    let needed = count
        .checked_mul(header.dtype.size)
        .ok_or_else(|| invalid("array is too large"))?;
    if buf.remaining() < needed {
        return Err(invalid(format!(
            "array data is truncated: expected {needed} bytes, found {}",
            buf.remaining()
        )));
    }
    // Trailing bytes past the declared element count are ignored.
    let data = buf.split_to(needed);

    Ok(UploadedArray {
        dtype: header.dtype,
        shape: header.shape,
        fortran_order: header.fortran_order,
        data,
    })
}

fn element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| invalid("array is too large"))
}

#[derive(Debug)]
struct Header {
    dtype: DType,
    fortran_order: bool,
    shape: Vec<usize>,
}

/// Parsed Python literal values that can appear in a `.npy` header.
#[derive(Debug)]
enum Literal {
    Str(String),
    Bool(bool),
    Tuple(Vec<usize>),
    List,
}

fn parse_header(s: &str) -> Result<Header> {
    let mut p = LiteralParser { rest: s.trim() };
    p.expect('{')?;

    let mut descr = None;
    let mut fortran_order = None;
    let mut shape = None;

    loop {
        p.skip_ws();
        if p.eat('}') {
            break;
        }
        let key = p.string()?;
        p.skip_ws();
        p.expect(':')?;
        p.skip_ws();
        let value = p.value()?;
        match (key.as_str(), value) {
            ("descr", Literal::Str(d)) => descr = Some(d),
            ("descr", Literal::List) => {
                return Err(invalid("structured dtypes are not supported"))
            }
            ("fortran_order", Literal::Bool(b)) => fortran_order = Some(b),
            ("shape", Literal::Tuple(t)) => shape = Some(t),
            (k, v) => return Err(invalid(format!("unexpected header entry {k}: {v:?}"))),
        }
        p.skip_ws();
        if !p.eat(',') {
            p.skip_ws();
            p.expect('}')?;
            break;
        }
    }

    let descr = descr.ok_or_else(|| invalid("header is missing 'descr'"))?;
    Ok(Header {
        dtype: DType::parse(&descr)?,
        fortran_order: fortran_order.ok_or_else(|| invalid("header is missing 'fortran_order'"))?,
        shape: shape.ok_or_else(|| invalid("header is missing 'shape'"))?,
    })
}

/// Tiny scanner for the subset of Python literal syntax NumPy writes.
struct LiteralParser<'a> {
    rest: &'a str,
}

impl<'a> LiteralParser<'a> {
    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, c: char) -> bool {
        match self.rest.strip_prefix(c) {
            Some(r) => {
                self.rest = r;
                true
            }
            None => false,
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(invalid(format!("malformed .npy header: expected '{c}'")))
        }
    }

    fn string(&mut self) -> Result<String> {
        let quote = match self.rest.chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(invalid("malformed .npy header: expected string")),
        };
        let body = &self.rest[1..];
        let end = body
            .find(quote)
            .ok_or_else(|| invalid("malformed .npy header: unterminated string"))?;
        let out = body[..end].to_string();
        self.rest = &body[end + 1..];
        Ok(out)
    }

    fn value(&mut self) -> Result<Literal> {
        if self.rest.starts_with('\'') || self.rest.starts_with('"') {
            return Ok(Literal::Str(self.string()?));
        }
        if let Some(r) = self.rest.strip_prefix("True") {
            self.rest = r;
            return Ok(Literal::Bool(true));
        }
        if let Some(r) = self.rest.strip_prefix("False") {
            self.rest = r;
            return Ok(Literal::Bool(false));
        }
        if self.rest.starts_with('[') {
            return Ok(Literal::List);
        }
        if self.eat('(') {
            return self.tuple().map(Literal::Tuple);
        }
        Err(invalid("malformed .npy header: unexpected value"))
    }

    fn tuple(&mut self) -> Result<Vec<usize>> {
        let mut dims = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(')') {
                return Ok(dims);
            }
            let digits = self
                .rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(self.rest.len());
            if digits == 0 {
                return Err(invalid("malformed .npy header: bad shape"));
            }
            // NumPy may write `3L` on very old Python 2 writers.
            let dim: usize = self.rest[..digits]
                .parse()
                .map_err(|_| invalid("malformed .npy header: bad shape"))?;
            self.rest = self.rest[digits..].trim_start_matches('L');
            dims.push(dim);
            self.skip_ws();
            if !self.eat(',') {
                self.skip_ws();
                self.expect(')')?;
                return Ok(dims);
            }
        }
    }
}
