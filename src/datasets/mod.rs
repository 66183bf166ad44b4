//! Bulk vector import/export in external wire dialects.
//!
//! These readers and writers feed byte-aligned vectors into the live index
//! API; they are not part of the index's own persistence format. Two
//! dialects are supported: tab-separated text ([`tsv`]) and the
//! length-prefixed binary xvec family ([`fvec`]).

pub mod fvec;
pub mod tsv;

use crate::error::Result;

/// Pull-based vector source.
pub trait VectorSetReader {
    /// Reads the next vector as raw little-endian bytes, or `None` at end of
    /// input.
    fn read_vector(&mut self) -> Result<Option<Vec<u8>>>;

    /// Drains the source.
    fn read_all(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        while let Some(v) = self.read_vector()? {
            out.push(v);
        }
        Ok(out)
    }
}

/// Push-based vector sink.
pub trait VectorSetWriter {
    /// Appends one vector from raw little-endian bytes.
    fn write_vector(&mut self, bytes: &[u8]) -> Result<()>;

    /// Flushes buffered output.
    fn finish(&mut self) -> Result<()>;
}
