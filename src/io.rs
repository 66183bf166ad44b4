//! Little-endian read/write helpers for the persistence layer.
//!
//! All persisted state is sequential little-endian with explicit length
//! prefixes; these helpers keep the engine and store blobs honest about it.

use crate::error::{IndexError, Result};
use std::io::{Read, Write};

/// Writes a `u8`.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

/// Writes a `u32` little-endian.
pub fn write_u32(w: &mut dyn Write, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Writes an `i32` little-endian.
pub fn write_i32(w: &mut dyn Write, v: i32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Writes a `u64` little-endian.
pub fn write_u64(w: &mut dyn Write, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Reads a `u8`.
pub fn read_u8(r: &mut dyn Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Reads a `u32` little-endian.
pub fn read_u32(r: &mut dyn Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads an `i32` little-endian.
pub fn read_i32(r: &mut dyn Read) -> Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Reads a `u64` little-endian.
pub fn read_u64(r: &mut dyn Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads a `u64` and checks it fits in `usize`.
pub fn read_len(r: &mut dyn Read) -> Result<usize> {
    let v = read_u64(r)?;
    usize::try_from(v).map_err(|_| IndexError::FormatMismatch(format!("length {v} overflows usize")))
}

/// Writes a `u32` slice with a `u64` element-count prefix.
pub fn write_u32_vec(w: &mut dyn Write, values: &[u32]) -> Result<()> {
    write_u64(w, values.len() as u64)?;
    for &v in values {
        write_u32(w, v)?;
    }
    Ok(())
}

/// Reads a length-prefixed `u32` vector.
pub fn read_u32_vec(r: &mut dyn Read) -> Result<Vec<u32>> {
    let len = read_len(r)?;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_u32(r)?);
    }
    Ok(out)
}

/// Writes a `u64` slice with a `u64` element-count prefix.
pub fn write_u64_vec(w: &mut dyn Write, values: &[u64]) -> Result<()> {
    write_u64(w, values.len() as u64)?;
    for &v in values {
        write_u64(w, v)?;
    }
    Ok(())
}

/// Reads a length-prefixed `u64` vector.
pub fn read_u64_vec(r: &mut dyn Read) -> Result<Vec<u64>> {
    let len = read_len(r)?;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_u64(r)?);
    }
    Ok(out)
}

/// Writes raw bytes without a prefix.
pub fn write_bytes(w: &mut dyn Write, bytes: &[u8]) -> Result<()> {
    w.write_all(bytes)?;
    Ok(())
}

/// Reads exactly `len` raw bytes.
pub fn read_bytes(r: &mut dyn Read, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}
