//! Distance kernels.
//!
//! A [`DistanceKernel`] binds one metric to one scalar type and exposes the
//! four operations every engine relies on: `compare`, the preprocessing
//! predicate, base-point preprocessing, and query preprocessing. The set of
//! kernels is closed; construction statically dispatches to the typed
//! comparators in [`primitive`] and rejects combinations the scalar type
//! cannot carry.

pub mod primitive;
pub mod utility;

use crate::error::{IndexError, Result};
use crate::types::{DataType, Distance, Metric};
use half::f16;
use log::warn;

use primitive::Scalar;

/// A (metric, scalar type) pair with its comparator wiring.
///
/// Kernels are plain values: cheap to copy, deterministic, side-effect free,
/// and safe to share across threads.
#[derive(Clone, Copy, Debug)]
pub struct DistanceKernel {
    metric: Metric,
    data_type: DataType,
}

impl DistanceKernel {
    /// Builds the kernel for `metric` over `data_type`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Unavailable`] for combinations that cannot be
    /// represented: bit-set metrics (Hamming, Jaccard) on float lanes, and
    /// Normalized* metrics on integer lanes, whose elements cannot hold
    /// unit-norm components.
    pub fn new(metric: Metric, data_type: DataType) -> Result<Self> {
        match metric {
            Metric::Hamming | Metric::Jaccard => {
                if data_type != DataType::U8 {
                    return Err(IndexError::Unavailable(format!(
                        "{metric:?} requires u8 data, got {data_type:?}"
                    )));
                }
            }
            Metric::NormalizedCosine | Metric::NormalizedAngle | Metric::NormalizedL2 => {
                if data_type == DataType::U8 {
                    return Err(IndexError::Unavailable(format!(
                        "{metric:?} requires float data, got {data_type:?}"
                    )));
                }
            }
            Metric::Cosine | Metric::Angle => {
                if data_type == DataType::U8 {
                    warn!(
                        "{metric:?} over u8 lanes loses precision; \
                         prefer a float data type for angular metrics"
                    );
                }
            }
            _ => {}
        }
        Ok(Self { metric, data_type })
    }

    /// The bound metric.
    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// The bound scalar type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Computes the smaller-is-nearer distance between two vectors of equal
    /// byte length.
    ///
    /// # Panics
    ///
    /// Panics (via `bytemuck`) if the byte spans are not aligned for the
    /// scalar type. Vectors from the store and query scratch buffers always
    /// are; caller-supplied spans must come from typed slices.
    #[must_use]
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Distance {
        debug_assert_eq!(a.len(), b.len(), "compare byte length mismatch");
        match self.data_type {
            DataType::U8 => match self.metric {
                Metric::Hamming => primitive::compare_hamming(a, b),
                Metric::Jaccard => primitive::compare_jaccard(a, b),
                _ => compare_typed::<u8>(self.metric, a, b),
            },
            DataType::F16 => compare_typed::<f16>(self.metric, a, b),
            DataType::F32 => compare_typed::<f32>(self.metric, a, b),
        }
    }

    /// True iff base vectors must be transformed at insert time.
    #[must_use]
    pub fn preprocessing_required(&self) -> bool {
        self.metric.requires_normalization()
    }

    /// L2-normalizes each `dim`-element vector in `points` in place.
    ///
    /// No-op unless [`DistanceKernel::preprocessing_required`] holds. The
    /// factory guarantees the scalar type is a float when it does.
    pub fn preprocess_base(&self, points: &mut [u8], dim: usize) {
        if !self.preprocessing_required() {
            return;
        }
        match self.data_type {
            DataType::F32 => {
                let lanes: &mut [f32] = bytemuck::cast_slice_mut(points);
                for vector in lanes.chunks_exact_mut(dim) {
                    utility::l2_normalize_f32(vector);
                }
            }
            DataType::F16 => {
                let lanes: &mut [f16] = bytemuck::cast_slice_mut(points);
                for vector in lanes.chunks_exact_mut(dim) {
                    utility::l2_normalize_f16(vector);
                }
            }
            DataType::U8 => debug_assert!(false, "normalization on integer lanes"),
        }
    }

    /// Writes `query` into `scratch`, normalized when the metric requires it.
    ///
    /// # Panics
    ///
    /// Panics if `scratch` is shorter than `query`.
    pub fn preprocess_query(&self, query: &[u8], scratch: &mut [u8]) {
        assert!(
            query.len() <= scratch.len(),
            "query scratch too small: {} > {}",
            query.len(),
            scratch.len()
        );
        let scratch = &mut scratch[..query.len()];
        scratch.copy_from_slice(query);
        if self.preprocessing_required() {
            let dim = query.len() / self.data_type.size();
            self.preprocess_base(scratch, dim);
        }
    }
}

fn compare_typed<T: Scalar + bytemuck::Pod>(metric: Metric, a: &[u8], b: &[u8]) -> Distance {
    let a: &[T] = bytemuck::cast_slice(a);
    let b: &[T] = bytemuck::cast_slice(b);
    match metric {
        Metric::L1 => primitive::compare_l1(a, b),
        Metric::L2 => primitive::compare_l2(a, b),
        Metric::InnerProduct => primitive::compare_inner_product(a, b),
        Metric::Cosine => primitive::compare_cosine(a, b),
        Metric::Angle => primitive::compare_angle(a, b),
        Metric::NormalizedCosine => primitive::compare_normalized_cosine(a, b),
        Metric::NormalizedAngle => primitive::compare_normalized_angle(a, b),
        Metric::NormalizedL2 => primitive::compare_normalized_l2(a, b),
        Metric::Poincare => primitive::compare_poincare(a, b),
        Metric::Lorentz => primitive::compare_lorentz(a, b),
        // Bit-set metrics never reach the typed path; the factory pins them
        // to u8 and `compare` routes them first.
        Metric::Hamming | Metric::Jaccard => unreachable!("bit metrics are u8-only"),
    }
}
