//! Core identifiers, enums, and crate-wide constants.

use serde::{Deserialize, Serialize};

/// Logical index of a vector inside the store. Stable until the slot is
/// reused through the vacant pool.
pub type Location = u32;

/// Caller-supplied external identifier for a vector. Unique while alive.
pub type Label = u64;

/// Distance value; smaller is nearer under every metric's convention.
pub type Distance = f64;

/// Sentinel for "no location".
pub const UNKNOWN_LOCATION: Location = Location::MAX;

/// Sentinel for "no label".
pub const UNKNOWN_LABEL: Label = Label::MAX;

/// Crate-wide defaults shared by the store and the engines.
pub mod constants {
    /// Vectors per batch unless overridden.
    pub const BATCH_SIZE: usize = 256;
    /// Default soft ceiling on live + deleted elements.
    pub const MAX_ELEMENTS: usize = 100_000;
    /// Stripe count of the label lock table.
    pub const LOCK_SLOTS: usize = 65_536;
    /// Default HNSW out-degree at levels >= 1.
    pub const HNSW_M: usize = 16;
    /// Default HNSW search list size.
    pub const HNSW_EF: usize = 50;
    /// Default HNSW construction list size.
    pub const HNSW_EF_CONSTRUCTION: usize = 200;
    /// Default HNSW level-generator seed.
    pub const HNSW_RANDOM_SEED: u64 = 100;
    /// Vamana pruning relaxation.
    pub const VAMANA_ALPHA: f64 = 1.2;
    /// Vamana candidate cap before occlusion.
    pub const VAMANA_MAX_CANDIDATES: u32 = 750;
    /// Vamana adjacency slack factor before a forced re-prune.
    pub const VAMANA_SLACK: f64 = 1.3;
}

/// Scalar element type of the stored vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Unsigned 8-bit integer lanes.
    U8,
    /// IEEE 754 half-precision lanes.
    F16,
    /// IEEE 754 single-precision lanes.
    F32,
}

impl DataType {
    /// Byte width of one element.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::F16 => 2,
            DataType::F32 => 4,
        }
    }

    /// Stable on-disk code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            DataType::U8 => 1,
            DataType::F16 => 2,
            DataType::F32 => 3,
        }
    }

    /// Inverse of [`DataType::code`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(DataType::U8),
            2 => Some(DataType::F16),
            3 => Some(DataType::F32),
            _ => None,
        }
    }
}

/// Distance metric selector.
///
/// Normalized variants assume unit-norm inputs and require base/query
/// preprocessing; the kernel factory rejects combinations the scalar type
/// cannot represent (e.g. Hamming on floats, normalization on integers).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Sum of absolute differences.
    L1,
    /// Euclidean distance (square root of the summed squares).
    L2,
    /// Negated inner product.
    InnerProduct,
    /// Bit-wise population count of XOR over 64-bit lanes.
    Hamming,
    /// `1 - |a & b| / |a | b|` over 64-bit lanes.
    Jaccard,
    /// `1 - dot / (|a| * |b|)`.
    Cosine,
    /// Angle between the two vectors, in radians.
    Angle,
    /// Cosine distance over pre-normalized inputs.
    NormalizedCosine,
    /// Angle over pre-normalized inputs.
    NormalizedAngle,
    /// Euclidean distance over pre-normalized inputs.
    NormalizedL2,
    /// Poincare-ball hyperbolic distance.
    Poincare,
    /// Hyperboloid-model hyperbolic distance.
    Lorentz,
}

impl Metric {
    /// Stable on-disk code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Metric::L1 => 1,
            Metric::L2 => 2,
            Metric::InnerProduct => 3,
            Metric::Hamming => 4,
            Metric::Jaccard => 5,
            Metric::Cosine => 6,
            Metric::Angle => 7,
            Metric::NormalizedCosine => 8,
            Metric::NormalizedAngle => 9,
            Metric::NormalizedL2 => 10,
            Metric::Poincare => 11,
            Metric::Lorentz => 12,
        }
    }

    /// Inverse of [`Metric::code`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Metric::L1),
            2 => Some(Metric::L2),
            3 => Some(Metric::InnerProduct),
            4 => Some(Metric::Hamming),
            5 => Some(Metric::Jaccard),
            6 => Some(Metric::Cosine),
            7 => Some(Metric::Angle),
            8 => Some(Metric::NormalizedCosine),
            9 => Some(Metric::NormalizedAngle),
            10 => Some(Metric::NormalizedL2),
            11 => Some(Metric::Poincare),
            12 => Some(Metric::Lorentz),
            _ => None,
        }
    }

    /// True for the metrics that require unit-norm base and query vectors.
    #[must_use]
    pub const fn requires_normalization(self) -> bool {
        matches!(
            self,
            Metric::NormalizedCosine | Metric::NormalizedAngle | Metric::NormalizedL2
        )
    }
}

/// Index family selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineType {
    /// Exhaustive scan over the store.
    Flat,
    /// Hierarchical navigable small-world graph.
    Hnsw,
    /// Vamana graph (only the shared pruning primitives are built in-core).
    Vamana,
    /// Product-quantization engine (external).
    Pq,
    /// SPTAG engine (external).
    Sptag,
}

impl EngineType {
    /// Stable on-disk code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            EngineType::Flat => 1,
            EngineType::Hnsw => 2,
            EngineType::Vamana => 3,
            EngineType::Pq => 4,
            EngineType::Sptag => 5,
        }
    }

    /// Inverse of [`EngineType::code`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(EngineType::Flat),
            2 => Some(EngineType::Hnsw),
            3 => Some(EngineType::Vamana),
            4 => Some(EngineType::Pq),
            5 => Some(EngineType::Sptag),
            _ => None,
        }
    }
}

/// Label predicate applied during filtered searches.
///
/// Returning `false` drops the candidate from the result set; graph engines
/// still traverse through rejected nodes so connectivity is preserved.
pub type FilterFn<'a> = dyn Fn(Label) -> bool + Sync + 'a;
