//! End-to-end smoke scenarios over both in-core engines.

use multivec::{
    DataType, EngineOption, EngineType, IndexCore, IndexOption, Metric, SearchContext, WriteOption,
};

fn build(engine: EngineType, metric: Metric, dimension: u32) -> IndexCore {
    let option = IndexOption {
        data_type: DataType::F32,
        metric,
        engine,
        dimension,
        batch_size: 16,
        max_elements: 1_000,
        n_threads: 2,
        enable_replace_vacant: true,
    };
    IndexCore::create(option, EngineOption::None).expect("create index")
}

fn add_f32(index: &IndexCore, label: u64, v: &[f32]) {
    index
        .add_vector(&WriteOption::default(), bytemuck::cast_slice(v), label)
        .expect("insert");
}

#[test]
fn smoke_two_vectors_l2() {
    for engine in [EngineType::Flat, EngineType::Hnsw] {
        let index = build(engine, Metric::L2, 4);
        add_f32(&index, 1, &[1.0, 0.0, 0.0, 0.0]);
        add_f32(&index, 2, &[0.0, 1.0, 0.0, 0.0]);

        let q = [1.0f32, 0.0, 0.0, 0.0];
        let out = index.search_vector(&SearchContext::from_f32(&q, 2)).unwrap();

        assert_eq!(out.results.len(), 2, "{engine:?}");
        assert_eq!(out.results[0].1, 1);
        assert!(out.results[0].0.abs() < 1e-9);
        assert_eq!(out.results[1].1, 2);
        assert!((out.results[1].0 - 2.0f64.sqrt()).abs() < 1e-9);
        assert!(out.cost_ns > 0);
    }
}

#[test]
fn filtered_search_returns_even_labels_in_order() {
    for engine in [EngineType::Flat, EngineType::Hnsw] {
        let index = build(engine, Metric::L2, 4);
        for i in 1..=10u64 {
            add_f32(&index, i, &[i as f32, 0.0, 0.0, 0.0]);
        }

        let q = [0.0f32; 4];
        let filter = |label: u64| label % 2 == 0;
        let mut ctx = SearchContext::from_f32(&q, 3);
        ctx.filter = Some(&filter);
        let out = index.search_vector(&ctx).unwrap();

        let labels: Vec<u64> = out.results.iter().map(|&(_, l)| l).collect();
        assert_eq!(labels, vec![2, 4, 6], "{engine:?}");
    }
}

#[test]
fn normalized_cosine_orders_by_angle() {
    for engine in [EngineType::Flat, EngineType::Hnsw] {
        let index = build(engine, Metric::NormalizedCosine, 2);
        add_f32(&index, 1, &[3.0, 0.0]);
        add_f32(&index, 2, &[0.0, 5.0]);

        let q = [1.0f32, 0.0];
        let out = index.search_vector(&SearchContext::from_f32(&q, 2)).unwrap();

        assert_eq!(out.results[0].1, 1, "{engine:?}");
        assert!(out.results[0].0.abs() < 1e-6);
        assert_eq!(out.results[1].1, 2);
        assert!((out.results[1].0 - 1.0).abs() < 1e-6);
    }
}

#[test]
fn descending_order_flag_reverses_results() {
    let index = build(EngineType::Flat, Metric::L2, 4);
    for i in 1..=5u64 {
        add_f32(&index, i, &[i as f32, 0.0, 0.0, 0.0]);
    }
    let q = [0.0f32; 4];
    let mut ctx = SearchContext::from_f32(&q, 3);
    ctx.desc = true;
    let out = index.search_vector(&ctx).unwrap();
    let labels: Vec<u64> = out.results.iter().map(|&(_, l)| l).collect();
    assert_eq!(labels, vec![3, 2, 1]);
}

#[test]
fn raw_vectors_are_copied_out_on_request() {
    let index = build(EngineType::Flat, Metric::L2, 4);
    add_f32(&index, 7, &[1.0, 2.0, 3.0, 4.0]);

    let q = [1.0f32, 2.0, 3.0, 4.0];
    let mut ctx = SearchContext::from_f32(&q, 1);
    ctx.get_raw_vector = true;
    let out = index.search_vector(&ctx).unwrap();

    assert_eq!(out.vectors.len(), 1);
    let v: &[f32] = bytemuck::cast_slice(&out.vectors[0]);
    assert_eq!(v, &q);
}

#[test]
fn self_query_is_exact_under_each_metric() {
    for metric in [Metric::L1, Metric::L2, Metric::Cosine, Metric::Angle] {
        let index = build(EngineType::Flat, metric, 4);
        add_f32(&index, 1, &[0.3, 0.1, 0.5, 0.2]);
        add_f32(&index, 2, &[0.9, 0.7, 0.1, 0.4]);
        let q = [0.3f32, 0.1, 0.5, 0.2];
        let out = index.search_vector(&SearchContext::from_f32(&q, 1)).unwrap();
        assert_eq!(out.results[0].1, 1, "{metric:?}");
        assert!(out.results[0].0.abs() < 1e-6, "{metric:?}");
    }
}

#[test]
fn hamming_engine_over_u8_lanes() {
    let option = IndexOption {
        data_type: DataType::U8,
        metric: Metric::Hamming,
        engine: EngineType::Flat,
        dimension: 16,
        batch_size: 8,
        max_elements: 100,
        n_threads: 1,
        enable_replace_vacant: false,
    };
    let index = IndexCore::create(option, EngineOption::None).unwrap();

    let a = [0u8; 16];
    let mut b = [0u8; 16];
    b[0] = 0b1111; // four bits away
    index.add_vector(&WriteOption::default(), &a, 1).unwrap();
    index.add_vector(&WriteOption::default(), &b, 2).unwrap();

    let out = index.search_vector(&SearchContext::new(&a, 2)).unwrap();
    assert_eq!(out.results[0].1, 1);
    assert!(out.results[0].0.abs() < 1e-9);
    assert!((out.results[1].0 - 4.0).abs() < 1e-9);
}
