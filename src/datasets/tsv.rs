//! Tab-separated vector dialect: one vector per line, numeric parse per
//! element type, terminating newline.

use super::{VectorSetReader, VectorSetWriter};
use crate::error::{IndexError, Result};
use crate::types::DataType;
use half::f16;
use std::io::{BufRead, Write};

/// Streaming TSV reader.
pub struct TsvVectorReader<R: BufRead> {
    inner: R,
    data_type: DataType,
    dimension: usize,
    line: String,
    line_no: usize,
}

impl<R: BufRead> TsvVectorReader<R> {
    /// Reader for `dimension`-element vectors of `data_type`.
    pub fn new(inner: R, data_type: DataType, dimension: usize) -> Self {
        Self {
            inner,
            data_type,
            dimension,
            line: String::new(),
            line_no: 0,
        }
    }

    fn parse_element(&self, field: &str, out: &mut Vec<u8>) -> Result<()> {
        let bad = |e: String| {
            IndexError::FormatMismatch(format!("line {}: bad element {field:?}: {e}", self.line_no))
        };
        match self.data_type {
            DataType::U8 => {
                let v: u8 = field.trim().parse().map_err(|e: std::num::ParseIntError| bad(e.to_string()))?;
                out.push(v);
            }
            DataType::F16 => {
                let v: f32 = field.trim().parse().map_err(|e: std::num::ParseFloatError| bad(e.to_string()))?;
                out.extend_from_slice(&f16::from_f32(v).to_le_bytes());
            }
            DataType::F32 => {
                let v: f32 = field.trim().parse().map_err(|e: std::num::ParseFloatError| bad(e.to_string()))?;
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        Ok(())
    }
}

impl<R: BufRead> VectorSetReader for TsvVectorReader<R> {
    fn read_vector(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            self.line.clear();
            if self.inner.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let trimmed = self.line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                continue;
            }
            let mut out = Vec::with_capacity(self.dimension * self.data_type.size());
            let mut count = 0usize;
            for field in trimmed.split('\t') {
                self.parse_element(field, &mut out)?;
                count += 1;
            }
            if count != self.dimension {
                return Err(IndexError::FormatMismatch(format!(
                    "line {}: {count} elements, expected {}",
                    self.line_no, self.dimension
                )));
            }
            return Ok(Some(out));
        }
    }
}

/// Streaming TSV writer.
pub struct TsvVectorWriter<W: Write> {
    inner: W,
    data_type: DataType,
    dimension: usize,
}

impl<W: Write> TsvVectorWriter<W> {
    /// Writer for `dimension`-element vectors of `data_type`.
    pub fn new(inner: W, data_type: DataType, dimension: usize) -> Self {
        Self {
            inner,
            data_type,
            dimension,
        }
    }
}

impl<W: Write> VectorSetWriter for TsvVectorWriter<W> {
    fn write_vector(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.dimension * self.data_type.size() {
            return Err(IndexError::InvalidArgument(format!(
                "vector is {} bytes, dialect wants {}",
                bytes.len(),
                self.dimension * self.data_type.size()
            )));
        }
        let mut first = true;
        let mut sep = |w: &mut W| -> Result<()> {
            if !first {
                w.write_all(b"\t")?;
            }
            first = false;
            Ok(())
        };
        match self.data_type {
            DataType::U8 => {
                for &b in bytes {
                    sep(&mut self.inner)?;
                    write!(self.inner, "{b}").map_err(IndexError::from)?;
                }
            }
            DataType::F16 => {
                for chunk in bytes.chunks_exact(2) {
                    sep(&mut self.inner)?;
                    let v = f16::from_le_bytes(chunk.try_into().expect("2-byte chunk"));
                    write!(self.inner, "{}", v.to_f32()).map_err(IndexError::from)?;
                }
            }
            DataType::F32 => {
                for chunk in bytes.chunks_exact(4) {
                    sep(&mut self.inner)?;
                    let v = f32::from_le_bytes(chunk.try_into().expect("4-byte chunk"));
                    write!(self.inner, "{v}").map_err(IndexError::from)?;
                }
            }
        }
        self.inner.write_all(b"\n")?;
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
            let mut w = TsvVectorWriter::new(&mut buf, DataType::F32, 3);
            w.write_vector(bytemuck::cast_slice(&[1.0f32, -2.5, 3.25])).unwrap();
            w.write_vector(bytemuck::cast_slice(&[0.0f32, 0.5, 9.0])).unwrap();
            w.finish().unwrap();
        }
        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(text, "1\t-2.5\t3.25\n0\t0.5\t9\n");

        let mut r = TsvVectorReader::new(Cursor::new(buf), DataType::F32, 3);
        let all = r.read_all().unwrap();
        assert_eq!(all.len(), 2);
        let first: &[f32] = bytemuck::cast_slice(&all[0]);
        assert_eq!(first, &[1.0, -2.5, 3.25]);
    }

    #[test]
    fn u8_roundtrip() {
        let mut buf = Vec::new();
        {
            let mut w = TsvVectorWriter::new(&mut buf, DataType::U8, 4);
            w.write_vector(&[0, 127, 255, 3]).unwrap();
            w.finish().unwrap();
        }
        let mut r = TsvVectorReader::new(Cursor::new(buf), DataType::U8, 4);
        assert_eq!(r.read_vector().unwrap().unwrap(), vec![0, 127, 255, 3]);
        assert!(r.read_vector().unwrap().is_none());
    }

    #[test]
    fn wrong_arity_is_reported_with_line() {
        let mut r = TsvVectorReader::new(Cursor::new("1\t2\n1\t2\t3\n"), DataType::F32, 2);
        assert!(r.read_vector().unwrap().is_some());
        let err = r.read_vector().unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut r = TsvVectorReader::new(Cursor::new("\n1\t2\n\n"), DataType::U8, 2);
        assert_eq!(r.read_vector().unwrap().unwrap(), vec![1, 2]);
        assert!(r.read_vector().unwrap().is_none());
    }

    #[test]
    fn f16_survives_the_text_trip() {
        let mut buf = Vec::new();
        let v = f16::from_f32(1.5);
        {
            let mut w = TsvVectorWriter::new(&mut buf, DataType::F16, 1);
            w.write_vector(&v.to_le_bytes()).unwrap();
            w.finish().unwrap();
        }
        let mut r = TsvVectorReader::new(Cursor::new(buf), DataType::F16, 1);
        let got = r.read_vector().unwrap().unwrap();
        assert_eq!(got, v.to_le_bytes());
    }
}
