//! Save/load round-trips and header validation.

use multivec::{
    DataType, EngineOption, EngineType, HnswIndexOption, IndexCore, IndexError, IndexOption,
    Metric, SearchContext, SerializeOption, WriteOption,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const DIM: usize = 8;

fn option(engine: EngineType, dimension: u32) -> IndexOption {
    IndexOption {
        data_type: DataType::F32,
        metric: Metric::L2,
        engine,
        dimension,
        batch_size: 64,
        max_elements: 2_000,
        n_threads: 2,
        enable_replace_vacant: true,
    }
}

fn build(engine: EngineType) -> IndexCore {
    let hnsw = HnswIndexOption {
        random_seed: 100,
        ..HnswIndexOption::default()
    };
    IndexCore::create(option(engine, DIM as u32), EngineOption::Hnsw(hnsw)).expect("create index")
}

fn random_vectors(n: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..DIM).map(|_| rng.gen::<f32>()).collect())
        .collect()
}

fn populate(index: &IndexCore, vectors: &[Vec<f32>]) {
    for (i, v) in vectors.iter().enumerate() {
        index
            .add_vector(&WriteOption::default(), bytemuck::cast_slice(v), i as u64)
            .unwrap();
    }
}

fn roundtrip_queries_match(engine: EngineType) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.mvec");

    let index = build(engine);
    let vectors = random_vectors(1_000, 3);
    populate(&index, &vectors);
    // A couple of deletions so the bitmap and vacant pool are non-trivial.
    index.remove_vector(17).unwrap();
    index.remove_vector(400).unwrap();

    index.save_index(&path, &SerializeOption::default()).unwrap();

    let mut loaded = build(engine);
    loaded.load_index(&path, &SerializeOption::default()).unwrap();

    assert_eq!(loaded.size(), index.size());
    assert_eq!(loaded.remove_size(), index.remove_size());

    let queries = random_vectors(100, 99);
    for q in &queries {
        let mut ctx = SearchContext::from_f32(q, 10);
        ctx.search_list = 100;
        let before = index.search_vector(&ctx).unwrap();
        let after = loaded.search_vector(&ctx).unwrap();
        assert_eq!(before.results, after.results, "{engine:?}");
    }
}

#[test]
fn hnsw_roundtrip_is_query_identical() {
    roundtrip_queries_match(EngineType::Hnsw);
}

#[test]
fn flat_roundtrip_is_query_identical() {
    roundtrip_queries_match(EngineType::Flat);
}

#[test]
fn loaded_index_stays_mutable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.mvec");

    let index = build(EngineType::Hnsw);
    let vectors = random_vectors(64, 5);
    populate(&index, &vectors);
    index.save_index(&path, &SerializeOption::default()).unwrap();

    let mut loaded = build(EngineType::Hnsw);
    loaded.load_index(&path, &SerializeOption::default()).unwrap();

    // Writes keep working against the restored state.
    loaded.remove_vector(3).unwrap();
    let v = vec![9.0f32; DIM];
    loaded
        .add_vector(
            &WriteOption {
                is_normalized: false,
                replace_deleted: true,
            },
            bytemuck::cast_slice(&v),
            1_000,
        )
        .unwrap();
    let out = loaded.search_vector(&SearchContext::from_f32(&v, 1)).unwrap();
    assert_eq!(out.results[0].1, 1_000);
}

#[test]
fn dimension_mismatch_is_rejected_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.mvec");

    let index = IndexCore::create(option(EngineType::Flat, 8), EngineOption::None).unwrap();
    let v = vec![1.0f32; 8];
    index
        .add_vector(&WriteOption::default(), bytemuck::cast_slice(&v), 1)
        .unwrap();
    index.save_index(&path, &SerializeOption::default()).unwrap();

    let mut other = IndexCore::create(option(EngineType::Flat, 4), EngineOption::None).unwrap();
    assert!(matches!(
        other.load_index(&path, &SerializeOption::default()),
        Err(IndexError::FormatMismatch(_))
    ));
}

#[test]
fn engine_mismatch_is_rejected_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.mvec");

    let index = IndexCore::create(option(EngineType::Flat, 8), EngineOption::None).unwrap();
    index.save_index(&path, &SerializeOption::default()).unwrap();

    let mut other = build(EngineType::Hnsw);
    assert!(matches!(
        other.load_index(&path, &SerializeOption::default()),
        Err(IndexError::FormatMismatch(_))
    ));
}

#[test]
fn serialize_option_pins_are_checked() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.mvec");

    let index = build(EngineType::Flat);
    let vectors = random_vectors(10, 1);
    populate(&index, &vectors);
    index.save_index(&path, &SerializeOption::default()).unwrap();

    let mut loaded = build(EngineType::Flat);
    let bad_count = SerializeOption {
        n_vectors: Some(99),
        ..SerializeOption::default()
    };
    assert!(matches!(
        loaded.load_index(&path, &bad_count),
        Err(IndexError::FormatMismatch(_))
    ));

    let good = SerializeOption {
        data_type: Some(DataType::F32),
        n_vectors: Some(10),
        dimension: Some(DIM as u32),
    };
    loaded.load_index(&path, &good).unwrap();
    assert_eq!(loaded.size(), 10);
}

#[test]
fn corrupted_header_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.mvec");

    let index = build(EngineType::Flat);
    index.save_index(&path, &SerializeOption::default()).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[1] ^= 0xFF; // break the magic
    std::fs::write(&path, &bytes).unwrap();

    let mut loaded = build(EngineType::Flat);
    assert!(matches!(
        loaded.load_index(&path, &SerializeOption::default()),
        Err(IndexError::FormatMismatch(_))
    ));
}
