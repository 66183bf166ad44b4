//! xvec binary dialect: a little-endian stream of
//! `(dim: u32, dim * sizeof(T) bytes)` records.
//!
//! The reader takes the dimension from the first record and trusts it for
//! the rest of the stream; per-record prefixes are consumed but not
//! re-validated.

use super::{VectorSetReader, VectorSetWriter};
use crate::error::{IndexError, Result};
use crate::io;
use crate::types::DataType;
use std::io::{Read, Write};

/// Streaming xvec reader.
pub struct FvecVectorReader<R: Read> {
    inner: R,
    data_type: DataType,
    dimension: Option<usize>,
}

impl<R: Read> FvecVectorReader<R> {
    /// Reader over raw xvec records of `data_type` elements.
    pub fn new(inner: R, data_type: DataType) -> Self {
        Self {
            inner,
            data_type,
            dimension: None,
        }
    }

    /// The stream dimension, known after the first record.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

impl<R: Read> VectorSetReader for FvecVectorReader<R> {
    fn read_vector(&mut self) -> Result<Option<Vec<u8>>> {
        let mut prefix = [0u8; 4];
        match self.inner.read_exact(&mut prefix) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let dim = match self.dimension {
            Some(d) => d,
            None => {
                let d = u32::from_le_bytes(prefix) as usize;
                if d == 0 {
                    return Err(IndexError::FormatMismatch(
                        "xvec record with zero dimension".into(),
                    ));
                }
                self.dimension = Some(d);
                d
            }
        };
        let payload = io::read_bytes(&mut self.inner, dim * self.data_type.size())?;
        Ok(Some(payload))
    }
}

/// Streaming xvec writer.
pub struct FvecVectorWriter<W: Write> {
    inner: W,
    data_type: DataType,
    dimension: usize,
}

impl<W: Write> FvecVectorWriter<W> {
    /// Writer for `dimension`-element records of `data_type`.
    pub fn new(inner: W, data_type: DataType, dimension: usize) -> Self {
        Self {
            inner,
            data_type,
            dimension,
        }
    }
}

impl<W: Write> VectorSetWriter for FvecVectorWriter<W> {
    fn write_vector(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.dimension * self.data_type.size() {
            return Err(IndexError::InvalidArgument(format!(
                "vector is {} bytes, dialect wants {}",
                bytes.len(),
                self.dimension * self.data_type.size()
            )));
        }
        self.inner
            .write_all(&(self.dimension as u32).to_le_bytes())?;
        self.inner.write_all(bytes)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn f32_roundtrip() {
        let mut buf = Vec::new();
        {
            let mut w = FvecVectorWriter::new(&mut buf, DataType::F32, 2);
            w.write_vector(bytemuck::cast_slice(&[1.0f32, 2.0])).unwrap();
            w.write_vector(bytemuck::cast_slice(&[3.0f32, 4.0])).unwrap();
            w.finish().unwrap();
        }
        // Each record: 4-byte dim + 8 payload bytes.
        assert_eq!(buf.len(), 24);

        let mut r = FvecVectorReader::new(Cursor::new(buf), DataType::F32);
        let all = r.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(r.dimension(), Some(2));
        let second: &[f32] = bytemuck::cast_slice(&all[1]);
        assert_eq!(second, &[3.0, 4.0]);
    }

    #[test]
    fn u8_records() {
        let mut buf = Vec::new();
        {
            let mut w = FvecVectorWriter::new(&mut buf, DataType::U8, 3);
            w.write_vector(&[7, 8, 9]).unwrap();
            w.finish().unwrap();
        }
        let mut r = FvecVectorReader::new(Cursor::new(buf), DataType::U8);
        assert_eq!(r.read_vector().unwrap().unwrap(), vec![7, 8, 9]);
        assert!(r.read_vector().unwrap().is_none());
    }

    #[test]
    fn truncated_payload_is_io_error() {
        // Prefix promises 4 floats, payload holds one byte.
        let mut buf = 4u32.to_le_bytes().to_vec();
        buf.push(0);
        let mut r = FvecVectorReader::new(Cursor::new(buf), DataType::F32);
        assert!(matches!(r.read_vector(), Err(IndexError::Io(_))));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let buf = 0u32.to_le_bytes().to_vec();
        let mut r = FvecVectorReader::new(Cursor::new(buf), DataType::F32);
        assert!(matches!(
            r.read_vector(),
            Err(IndexError::FormatMismatch(_))
        ));
    }
}
