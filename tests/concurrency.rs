//! Threaded add/search/remove exercises over a single index.

use multivec::{
    DataType, EngineOption, EngineType, IndexCore, IndexOption, Metric, SearchContext, WriteOption,
};
use std::sync::Arc;
use std::thread;

const DIM: usize = 8;

fn build(engine: EngineType, n_threads: u32) -> Arc<IndexCore> {
    let option = IndexOption {
        data_type: DataType::F32,
        metric: Metric::L2,
        engine,
        dimension: DIM as u32,
        batch_size: 64,
        max_elements: 10_000,
        n_threads,
        enable_replace_vacant: true,
    };
    Arc::new(IndexCore::create(option, EngineOption::None).expect("create index"))
}

fn vector_for(label: u64) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[(label % DIM as u64) as usize] = label as f32;
    v[0] += 1.0;
    v
}

#[test]
fn concurrent_adds_land_every_label() {
    for engine in [EngineType::Flat, EngineType::Hnsw] {
        let index = build(engine, 4);
        let writers: u64 = 4;
        let per_writer = 100u64;

        let handles: Vec<_> = (0..writers)
            .map(|w| {
                let index = Arc::clone(&index);
                thread::spawn(move || {
                    for i in 0..per_writer {
                        let label = u64::from(w) * per_writer + i;
                        let v = vector_for(label);
                        index
                            .add_vector(&WriteOption::default(), bytemuck::cast_slice(&v), label)
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(index.size(), writers as usize * per_writer as usize);
        for label in 0..u64::from(writers) * per_writer {
            assert!(
                index.store().exists_label(label),
                "{engine:?}: label {label} missing"
            );
        }
    }
}

#[test]
fn searches_run_alongside_writes() {
    let index = build(EngineType::Hnsw, 4);
    for label in 0..200u64 {
        let v = vector_for(label);
        index
            .add_vector(&WriteOption::default(), bytemuck::cast_slice(&v), label)
            .unwrap();
    }

    let writer = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for label in 200..400u64 {
                let v = vector_for(label);
                index
                    .add_vector(&WriteOption::default(), bytemuck::cast_slice(&v), label)
                    .unwrap();
            }
        })
    };
    let searchers: Vec<_> = (0..2)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for label in (0..200u64).cycle().take(400) {
                    let v = vector_for(label);
                    let out = index
                        .search_vector(&SearchContext::from_f32(&v, 5))
                        .unwrap();
                    assert!(!out.results.is_empty());
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for s in searchers {
        s.join().unwrap();
    }
    assert_eq!(index.size(), 400);
}

#[test]
fn removes_interleave_with_adds() {
    let index = build(EngineType::Flat, 4);
    for label in 0..300u64 {
        let v = vector_for(label);
        index
            .add_vector(&WriteOption::default(), bytemuck::cast_slice(&v), label)
            .unwrap();
    }

    let remover = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for label in 0..150u64 {
                index.remove_vector(label).unwrap();
            }
        })
    };
    let adder = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for label in 300..450u64 {
                let v = vector_for(label);
                let option = WriteOption {
                    is_normalized: false,
                    replace_deleted: true,
                };
                index
                    .add_vector(&option, bytemuck::cast_slice(&v), label)
                    .unwrap();
            }
        })
    };

    remover.join().unwrap();
    adder.join().unwrap();

    assert_eq!(index.size(), 300);
    assert_eq!(index.remove_size() + index.size(), index.store().current_index());
    // Every surviving label is still searchable.
    let v = vector_for(449);
    let out = index.search_vector(&SearchContext::from_f32(&v, 1)).unwrap();
    assert_eq!(out.results[0].1, 449);
}
