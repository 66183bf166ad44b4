//! Vector space configuration.
//!
//! A [`VectorSpace`] is the immutable description every other component works
//! against: dimension, scalar width, per-vector byte size, allocation
//! alignment, and the distance kernel handle. It is built once at index
//! creation and shared behind an `Arc`.

use crate::alloc::{AlignedBytes, ALIGNMENT};
use crate::distance::DistanceKernel;
use crate::error::{IndexError, Result};
use crate::types::{DataType, Metric};

/// Immutable description of the vector universe an index operates on.
#[derive(Debug)]
pub struct VectorSpace {
    dimension: usize,
    data_type: DataType,
    metric: Metric,
    type_size: usize,
    vector_byte_size: usize,
    alignment_dim: usize,
    kernel: DistanceKernel,
}

impl VectorSpace {
    /// Builds a space and its distance kernel.
    ///
    /// # Errors
    ///
    /// - [`IndexError::InvalidArgument`] for a zero dimension, or for
    ///   bit-set metrics whose vectors are not a whole number of 64-bit
    ///   lanes.
    /// - [`IndexError::Unavailable`] for rejected (metric, type) pairings,
    ///   propagated from the kernel factory.
    pub fn new(dimension: usize, metric: Metric, data_type: DataType) -> Result<Self> {
        if dimension == 0 {
            return Err(IndexError::InvalidArgument("dimension must be > 0".into()));
        }
        let kernel = DistanceKernel::new(metric, data_type)?;
        let type_size = data_type.size();
        let vector_byte_size = dimension * type_size;
        if matches!(metric, Metric::Hamming | Metric::Jaccard) && vector_byte_size % 8 != 0 {
            return Err(IndexError::InvalidArgument(format!(
                "{metric:?} requires vector byte size divisible by 8, got {vector_byte_size}"
            )));
        }
        Ok(Self {
            dimension,
            data_type,
            metric,
            type_size,
            vector_byte_size,
            alignment_dim: ALIGNMENT / type_size,
            kernel,
        })
    }

    /// Number of scalar elements per vector.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Scalar element type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Configured metric.
    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Byte width of one scalar element.
    #[must_use]
    pub fn type_size(&self) -> usize {
        self.type_size
    }

    /// Byte width of one vector.
    #[must_use]
    pub fn vector_byte_size(&self) -> usize {
        self.vector_byte_size
    }

    /// Elements per allocation-alignment window.
    #[must_use]
    pub fn alignment_dim(&self) -> usize {
        self.alignment_dim
    }

    /// The distance kernel handle.
    #[must_use]
    pub fn kernel(&self) -> &DistanceKernel {
        &self.kernel
    }

    /// Allocates a zeroed aligned block holding `n` vectors.
    #[must_use]
    pub fn alloc_vectors(&self, n: usize) -> AlignedBytes {
        AlignedBytes::zeroed(n * self.vector_byte_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_sizes() {
        let space = VectorSpace::new(128, Metric::L2, DataType::F32).unwrap();
        assert_eq!(space.type_size(), 4);
        assert_eq!(space.vector_byte_size(), 512);
        assert_eq!(space.alignment_dim(), 16);
    }

    #[test]
    fn rejects_zero_dimension() {
        assert!(matches!(
            VectorSpace::new(0, Metric::L2, DataType::F32),
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn hamming_requires_whole_lanes() {
        // 16 u8 elements = 16 bytes = two 64-bit lanes: fine.
        assert!(VectorSpace::new(16, Metric::Hamming, DataType::U8).is_ok());
        // 12 bytes is not a whole number of lanes.
        assert!(matches!(
            VectorSpace::new(12, Metric::Hamming, DataType::U8),
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn invalid_kernel_pairs_propagate() {
        assert!(matches!(
            VectorSpace::new(8, Metric::Jaccard, DataType::F16),
            Err(IndexError::Unavailable(_))
        ));
    }

    #[test]
    fn allocation_covers_requested_vectors() {
        let space = VectorSpace::new(4, Metric::L2, DataType::F32).unwrap();
        let block = space.alloc_vectors(10);
        assert_eq!(block.len(), 160);
    }
}
