//! Index façade: composes the vector space, the store, one engine, and the
//! work-space pool, and coordinates the locks around them.

use crate::engine::{create_engine, Engine};
use crate::error::{IndexError, Result};
use crate::io;
use crate::space::VectorSpace;
use crate::store::option::VectorStoreOption;
use crate::store::VectorStore;
use crate::types::{constants, DataType, Distance, EngineType, FilterFn, Label, Metric};
use crate::workspace::WorkSpacePool;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Magic bytes opening every index file.
const INDEX_MAGIC: [u8; 4] = *b"MVEC";
/// On-disk format version.
const INDEX_VERSION: u32 = 1;

/// Construction options common to every engine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct IndexOption {
    /// Scalar element type of all vectors.
    pub data_type: DataType,
    /// Distance metric.
    pub metric: Metric,
    /// Engine family.
    pub engine: EngineType,
    /// Elements per vector.
    pub dimension: u32,
    /// Vectors per storage batch.
    pub batch_size: u32,
    /// Soft ceiling on assigned locations.
    pub max_elements: u64,
    /// Work-spaces to pool; effectively the concurrent-operation budget.
    pub n_threads: u32,
    /// Whether deleted slots may be reused on insert.
    pub enable_replace_vacant: bool,
}

impl Default for IndexOption {
    fn default() -> Self {
        Self {
            data_type: DataType::F32,
            metric: Metric::L2,
            engine: EngineType::Hnsw,
            dimension: 0,
            batch_size: constants::BATCH_SIZE as u32,
            max_elements: constants::MAX_ELEMENTS as u64,
            n_threads: 4,
            enable_replace_vacant: true,
        }
    }
}

/// HNSW-specific construction options.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HnswIndexOption {
    /// Out-degree at levels >= 1; level 0 carries `2 * m`.
    pub m: usize,
    /// Construction-time search list size.
    pub ef_construction: usize,
    /// Default runtime search list size.
    pub ef: usize,
    /// Seed for the level generator.
    pub random_seed: u64,
}

impl Default for HnswIndexOption {
    fn default() -> Self {
        Self {
            m: constants::HNSW_M,
            ef_construction: constants::HNSW_EF_CONSTRUCTION,
            ef: constants::HNSW_EF,
            random_seed: constants::HNSW_RANDOM_SEED,
        }
    }
}

/// Engine-specific construction options.
#[derive(Clone, Copy, Debug, Default)]
pub enum EngineOption {
    /// Engine defaults.
    #[default]
    None,
    /// HNSW tunables.
    Hnsw(HnswIndexOption),
}

/// Per-write options.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct WriteOption {
    /// The caller already normalized the vector; skip preprocessing.
    pub is_normalized: bool,
    /// Prefer reusing a vacant slot over extending the store.
    pub replace_deleted: bool,
}

/// One search request.
pub struct SearchContext<'a> {
    /// Raw query bytes; must match the space's vector byte size.
    pub query: &'a [u8],
    /// Number of hits to return.
    pub k: usize,
    /// Runtime search list size (`ef`/`L`); 0 selects the engine default.
    pub search_list: usize,
    /// Label predicate; rejected candidates are routed through but never
    /// emitted.
    pub filter: Option<&'a FilterFn<'a>>,
    /// Also copy each hit's vector bytes into the result.
    pub get_raw_vector: bool,
    /// The caller already normalized the query; skip preprocessing.
    pub is_normalized: bool,
    /// Emit hits in descending distance order.
    pub desc: bool,
}

impl<'a> SearchContext<'a> {
    /// Request over raw bytes with engine-default list size.
    #[must_use]
    pub fn new(query: &'a [u8], k: usize) -> Self {
        Self {
            query,
            k,
            search_list: 0,
            filter: None,
            get_raw_vector: false,
            is_normalized: false,
            desc: false,
        }
    }

    /// Request over an `f32` slice.
    #[must_use]
    pub fn from_f32(query: &'a [f32], k: usize) -> Self {
        Self::new(bytemuck::cast_slice(query), k)
    }
}

/// Ranked hits plus optional raw payloads.
#[derive(Clone, Debug, Default)]
pub struct SearchResult {
    /// `(distance, label)` pairs, ascending unless `desc` was set.
    pub results: Vec<(Distance, Label)>,
    /// Raw vector bytes per hit when `get_raw_vector` was set.
    pub vectors: Vec<Vec<u8>>,
    /// Wall-clock cost of the engine call, in nanoseconds.
    pub cost_ns: i64,
}

/// Insert accounting.
#[derive(Clone, Copy, Debug, Default)]
pub struct InsertResult {
    /// Wall-clock cost of the insert, in nanoseconds.
    pub cost_ns: i64,
}

/// Expected file facts for save/load cross-checking. `None` fields are not
/// checked.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerializeOption {
    /// Expected scalar type.
    pub data_type: Option<DataType>,
    /// Expected vector count.
    pub n_vectors: Option<u64>,
    /// Expected dimension.
    pub dimension: Option<u32>,
}

/// The composed index.
pub struct IndexCore {
    option: IndexOption,
    space: Arc<VectorSpace>,
    store: Arc<VectorStore>,
    engine: Box<dyn Engine>,
    pool: WorkSpacePool,
}

impl IndexCore {
    /// Builds the space, store, engine, and work-space pool.
    ///
    /// # Errors
    ///
    /// Propagates space construction failures ([`IndexError::InvalidArgument`]
    /// or [`IndexError::Unavailable`]) and unknown engine selections.
    pub fn create(option: IndexOption, engine_option: EngineOption) -> Result<Self> {
        let space = Arc::new(VectorSpace::new(
            option.dimension as usize,
            option.metric,
            option.data_type,
        )?);
        let store = Arc::new(VectorStore::new(
            Arc::clone(&space),
            VectorStoreOption {
                batch_size: option.batch_size.max(1) as usize,
                max_elements: option.max_elements as usize,
                enable_replace_vacant: option.enable_replace_vacant,
            },
        ));
        let hnsw_option = match engine_option {
            EngineOption::Hnsw(o) => o,
            EngineOption::None => HnswIndexOption::default(),
        };
        let engine = create_engine(&option, &hnsw_option, Arc::clone(&store))?;

        let pool = WorkSpacePool::new();
        for _ in 0..option.n_threads.max(1) {
            let mut ws = engine.make_workspace();
            engine.setup_workspace(&mut ws);
            pool.push(ws);
        }

        Ok(Self {
            option,
            space,
            store,
            engine,
            pool,
        })
    }

    /// Inserts or overwrites the vector for `label`.
    ///
    /// A fresh label reserves (or, with `replace_deleted`, reuses) a
    /// location under the shared update lock; an existing label is
    /// overwritten in place under the exclusive update lock and the engine
    /// repairs its connections.
    ///
    /// # Errors
    ///
    /// - [`IndexError::InvalidArgument`] on a byte-size mismatch.
    /// - [`IndexError::ResourceExhausted`] at the element ceiling.
    /// - Engine wiring failures; the vector is removed again so the store
    ///   stays consistent.
    pub fn add_vector(
        &self,
        option: &WriteOption,
        data: &[u8],
        label: Label,
    ) -> Result<InsertResult> {
        let start = Instant::now();
        if data.len() != self.space.vector_byte_size() {
            return Err(IndexError::InvalidArgument(format!(
                "vector is {} bytes, space wants {}",
                data.len(),
                self.space.vector_byte_size()
            )));
        }

        let mut ws = self.pool.acquire();
        let _label_guard = self.store.label_lock(label).lock();
        ws.prepare_query(&self.space, data, option.is_normalized);

        if let Some(loc) = self.store.location_of(label) {
            // In-place overwrite of a published slot: exclusive so no search
            // reads the bytes mid-copy.
            let _update_guard = self.store.update_lock().write();
            self.store.set_vector(loc, ws.query());
            self.engine.update_vector(&mut ws, loc)?;
            return Ok(InsertResult {
                cost_ns: start.elapsed().as_nanos() as i64,
            });
        }

        let _update_guard = self.store.update_lock().read();
        let loc = if option.replace_deleted {
            match self.store.get_vacant(label) {
                Ok(loc) => loc,
                Err(IndexError::Unavailable(_)) => self.store.add_vector_at(label)?,
                Err(e) => return Err(e),
            }
        } else {
            self.store.add_vector_at(label)?
        };
        self.store.set_vector(loc, ws.query());

        if let Err(e) = self.engine.add_vector(&mut ws, loc) {
            // Keep the store consistent: an unwired vector must not stay
            // visible.
            let _ = self.store.remove_vector(label);
            return Err(e);
        }
        Ok(InsertResult {
            cost_ns: start.elapsed().as_nanos() as i64,
        })
    }

    /// Lazily deletes `label`.
    ///
    /// # Errors
    ///
    /// [`IndexError::NotFound`] when the label has no live mapping; repeated
    /// removes report the same and change nothing.
    pub fn remove_vector(&self, label: Label) -> Result<()> {
        let _label_guard = self.store.label_lock(label).lock();
        let loc = self.store.remove_vector(label)?;
        self.engine.remove_vector(loc)
    }

    /// Runs one k-NN query.
    ///
    /// # Errors
    ///
    /// [`IndexError::InvalidArgument`] for `k == 0` or a byte-size mismatch.
    pub fn search_vector(&self, ctx: &SearchContext<'_>) -> Result<SearchResult> {
        let start = Instant::now();
        if ctx.k == 0 {
            return Err(IndexError::InvalidArgument("k must be > 0".into()));
        }
        if ctx.query.len() != self.space.vector_byte_size() {
            return Err(IndexError::InvalidArgument(format!(
                "query is {} bytes, space wants {}",
                ctx.query.len(),
                self.space.vector_byte_size()
            )));
        }

        let mut ws = self.pool.acquire();
        let _update_guard = self.store.update_lock().read();
        ws.prepare_query(&self.space, ctx.query, ctx.is_normalized);
        self.engine.search_vector(&mut ws, ctx)?;

        let hits = ctx.k.min(ws.best_l_nodes.len());
        let mut result = SearchResult {
            results: Vec::with_capacity(hits),
            vectors: Vec::new(),
            cost_ns: 0,
        };
        for i in 0..hits {
            let e = ws.best_l_nodes.get(i);
            result.results.push((e.distance, e.label));
            if ctx.get_raw_vector {
                result.vectors.push(self.store.get_vector(e.loc).to_vec());
            }
        }
        if ctx.desc {
            result.results.reverse();
            result.vectors.reverse();
        }
        result.cost_ns = start.elapsed().as_nanos() as i64;
        Ok(result)
    }

    fn header_bytes(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(19);
        header.extend_from_slice(&INDEX_MAGIC);
        header.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        header.push(self.option.data_type.code());
        header.push(self.option.metric.code());
        header.push(self.option.engine.code());
        header.extend_from_slice(&u64::from(self.option.dimension).to_le_bytes());
        header
    }

    /// Writes the checksummed header, the engine blob, then the store blob.
    ///
    /// # Errors
    ///
    /// [`IndexError::Io`] from the filesystem.
    pub fn save_index(&self, path: impl AsRef<Path>, _option: &SerializeOption) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        let header = self.header_bytes();
        io::write_bytes(&mut w, &header)?;
        io::write_u32(&mut w, crc32fast::hash(&header))?;
        self.engine.save(&mut w)?;
        self.store.save(&mut w)?;
        w.flush()?;
        Ok(())
    }

    /// Restores an index file produced by [`IndexCore::save_index`] into this
    /// index. The header must match the live configuration and any facts
    /// pinned in `option`.
    ///
    /// # Errors
    ///
    /// - [`IndexError::FormatMismatch`] for magic, version, checksum, type,
    ///   metric, engine, or dimension disagreement.
    /// - [`IndexError::Io`] from the filesystem.
    pub fn load_index(&mut self, path: impl AsRef<Path>, option: &SerializeOption) -> Result<()> {
        let mut r = BufReader::new(File::open(path)?);
        let header = read_header(&mut r)?;

        if header.data_type != self.option.data_type {
            return Err(IndexError::FormatMismatch(format!(
                "file data type {:?} != index {:?}",
                header.data_type, self.option.data_type
            )));
        }
        if header.metric != self.option.metric {
            return Err(IndexError::FormatMismatch(format!(
                "file metric {:?} != index {:?}",
                header.metric, self.option.metric
            )));
        }
        if header.engine != self.option.engine {
            return Err(IndexError::FormatMismatch(format!(
                "file engine {:?} != index {:?}",
                header.engine, self.option.engine
            )));
        }
        if header.dimension != u64::from(self.option.dimension) {
            return Err(IndexError::FormatMismatch(format!(
                "file dimension {} != index {}",
                header.dimension, self.option.dimension
            )));
        }
        if let Some(dt) = option.data_type {
            if dt != header.data_type {
                return Err(IndexError::FormatMismatch(format!(
                    "expected data type {dt:?}, file has {:?}",
                    header.data_type
                )));
            }
        }
        if let Some(dim) = option.dimension {
            if u64::from(dim) != header.dimension {
                return Err(IndexError::FormatMismatch(format!(
                    "expected dimension {dim}, file has {}",
                    header.dimension
                )));
            }
        }

        self.engine.load(&mut r)?;
        self.store.load(&mut r)?;

        if let Some(n) = option.n_vectors {
            let actual = self.store.size() as u64;
            if n != actual {
                return Err(IndexError::FormatMismatch(format!(
                    "expected {n} vectors, file holds {actual}"
                )));
            }
        }
        Ok(())
    }

    /// Live element count.
    #[must_use]
    pub fn size(&self) -> usize {
        self.store.size()
    }

    /// Lazily deleted element count.
    #[must_use]
    pub fn remove_size(&self) -> usize {
        self.store.deleted_size()
    }

    /// Configured dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.space.dimension()
    }

    /// Selected engine family.
    #[must_use]
    pub fn engine_type(&self) -> EngineType {
        self.option.engine
    }

    /// Whether the engine accepts incremental adds and removes.
    #[must_use]
    pub fn support_dynamic(&self) -> bool {
        self.engine.support_dynamic()
    }

    /// Whether the engine needs offline model training.
    #[must_use]
    pub fn need_model(&self) -> bool {
        self.engine.need_model()
    }

    /// The underlying store, for introspection and tests.
    #[must_use]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }
}

struct FileHeader {
    data_type: DataType,
    metric: Metric,
    engine: EngineType,
    dimension: u64,
}

fn read_header(r: &mut dyn Read) -> Result<FileHeader> {
    let bytes = io::read_bytes(r, 19)?;
    let stored_crc = io::read_u32(r)?;
    if bytes[0..4] != INDEX_MAGIC {
        return Err(IndexError::FormatMismatch("bad magic".into()));
    }
    if crc32fast::hash(&bytes) != stored_crc {
        return Err(IndexError::FormatMismatch("header checksum mismatch".into()));
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().expect("4-byte field"));
    if version != INDEX_VERSION {
        return Err(IndexError::FormatMismatch(format!(
            "unsupported format version {version}"
        )));
    }
    let data_type = DataType::from_code(bytes[8])
        .ok_or_else(|| IndexError::FormatMismatch(format!("unknown data type {}", bytes[8])))?;
    let metric = Metric::from_code(bytes[9])
        .ok_or_else(|| IndexError::FormatMismatch(format!("unknown metric {}", bytes[9])))?;
    let engine = EngineType::from_code(bytes[10])
        .ok_or_else(|| IndexError::FormatMismatch(format!("unknown engine {}", bytes[10])))?;
    let dimension = u64::from_le_bytes(bytes[11..19].try_into().expect("8-byte field"));
    Ok(FileHeader {
        data_type,
        metric,
        engine,
        dimension,
    })
}
