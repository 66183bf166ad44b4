//! Store construction options.

use crate::types::constants;
use serde::{Deserialize, Serialize};

/// Tunables fixed at store initialization.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VectorStoreOption {
    /// Vectors per batch.
    pub batch_size: usize,
    /// Soft ceiling on assigned locations; exceeding it fails with a
    /// resource-exhausted error.
    pub max_elements: usize,
    /// Whether lazily deleted locations may be handed back out by
    /// `get_vacant`.
    pub enable_replace_vacant: bool,
}

impl Default for VectorStoreOption {
    fn default() -> Self {
        Self {
            batch_size: constants::BATCH_SIZE,
            max_elements: constants::MAX_ELEMENTS,
            enable_replace_vacant: true,
        }
    }
}
