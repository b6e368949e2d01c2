use kmeans_scalable::{
    generate_clustered_frame, generate_frame, train_model, train_model_with_job, Column, Frame,
    Initialization, Job, KMeansError, KMeansParams,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn params(k: usize, init: Initialization, seed: u64) -> KMeansParams {
    KMeansParams {
        k,
        max_iters: 50,
        init,
        standardize: false,
        seed,
    }
}

#[test]
fn single_cluster_recovers_the_column_mean() {
    let mut frame =
        Frame::new(vec![Column::numeric("x", vec![1.0, 2.0, 3.0, 4.0])]).unwrap();
    let model = train_model(&params(1, Initialization::None, 0), &mut frame).unwrap();

    assert_eq!(model.output.centroids, vec![vec![2.5]]);
    assert_eq!(model.output.rows, vec![4]);
    assert!((model.output.avgwithinss - 1.25).abs() < 1e-12);
    assert!((model.output.avgss - 1.25).abs() < 1e-12);
    assert!(model.output.avgbetweenss.abs() < 1e-12);
}

#[test]
fn two_separated_blobs_split_cleanly() {
    let mut frame = Frame::new(vec![
        Column::numeric("x", vec![0.0, 0.0, 10.0, 10.0]),
        Column::numeric("y", vec![0.0, 1.0, 10.0, 11.0]),
    ])
    .unwrap();
    let model = train_model(&params(2, Initialization::Furthest, 42), &mut frame).unwrap();

    let mut centroids = model.output.centroids.clone();
    centroids.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap());
    assert!((centroids[0][0]).abs() < 1e-9);
    assert!((centroids[0][1] - 0.5).abs() < 1e-9);
    assert!((centroids[1][0] - 10.0).abs() < 1e-9);
    assert!((centroids[1][1] - 10.5).abs() < 1e-9);

    let mut rows = model.output.rows.clone();
    rows.sort_unstable();
    assert_eq!(rows, vec![2, 2]);
    assert!((model.output.avgwithinss - 0.25).abs() < 1e-9);
    assert!(
        (model.output.avgbetweenss - (model.output.avgss - model.output.avgwithinss)).abs()
            < 1e-12
    );
}

#[test]
fn categorical_only_clusters_land_on_the_levels() {
    let codes = vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 2.0];
    let mut frame =
        Frame::new(vec![Column::categorical_coded("level", codes, 3).unwrap()]).unwrap();
    let model = train_model(&params(3, Initialization::Furthest, 1), &mut frame).unwrap();

    let mut centroids: Vec<f64> = model.output.centroids.iter().map(|c| c[0]).collect();
    centroids.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(centroids, vec![0.0, 1.0, 2.0]);

    let mut rows = model.output.rows.clone();
    rows.sort_unstable();
    assert_eq!(rows, vec![2, 2, 3]);
    assert_eq!(model.output.avgwithinss, 0.0);
}

#[test]
fn identical_rows_trigger_empty_cluster_rescue() {
    let mut frame = Frame::new(vec![Column::numeric("x", vec![7.0; 5])]).unwrap();
    let model = train_model(&params(3, Initialization::None, 5), &mut frame).unwrap();

    assert_eq!(model.output.centroids.len(), 3);
    assert_eq!(model.output.centroids[0], vec![7.0]);
    // One cluster holds every row, one is reseeded with a synthetic row,
    // and the remaining empties are eventually accepted.
    assert_eq!(model.output.rows[0], 5);
    assert_eq!(model.output.rows.iter().sum::<u64>(), 6);
}

#[test]
fn centroid_shapes_and_categorical_ranges_hold() {
    let cat = Column::categorical_coded(
        "c",
        vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 1.0],
        3,
    )
    .unwrap();
    let num_a = Column::numeric("a", vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    let num_b = Column::numeric("b", vec![5.0, 5.0, 5.0, 5.0, 9.0, 9.0, 9.0, 9.0]);
    let mut frame = Frame::new(vec![num_a, cat, num_b]).unwrap();
    let mut p = params(3, Initialization::PlusPlus, 11);
    p.standardize = true;
    let model = train_model(&p, &mut frame).unwrap();

    assert_eq!(model.output.centroids.len(), 3);
    assert_eq!(model.output.ncats, 1);
    for centroid in &model.output.centroids {
        assert_eq!(centroid.len(), 3);
        let level = centroid[0];
        assert_eq!(level.fract(), 0.0);
        assert!((0.0..3.0).contains(&level));
    }
    // every row accounted for, plus at most one synthetic rescue row
    let total: u64 = model.output.rows.iter().sum();
    assert!(total == 8 || total == 9);
    // column order in the output follows the categorical-first permutation
    assert_eq!(
        model.output.names,
        vec!["c".to_string(), "a".to_string(), "b".to_string()]
    );
}

#[test]
fn destandardization_recovers_raw_coordinates() {
    let mut frame =
        Frame::new(vec![Column::numeric("x", vec![2.0, 4.0, 6.0, 8.0])]).unwrap();
    let mut p = params(1, Initialization::None, 9);
    p.standardize = true;
    let model = train_model(&p, &mut frame).unwrap();
    assert!((model.output.centroids[0][0] - 5.0).abs() < 1e-9);
}

#[test]
fn gaussian_blobs_are_recovered() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let true_centers = vec![
        vec![0.0, 0.0],
        vec![20.0, 0.0],
        vec![0.0, 20.0],
        vec![20.0, 20.0],
    ];
    let mut frame = generate_clustered_frame(50, &true_centers, 0.5, &mut rng).unwrap();

    let model = train_model(&params(4, Initialization::Furthest, 13), &mut frame).unwrap();

    let mut rows = model.output.rows.clone();
    rows.sort_unstable();
    assert_eq!(rows, vec![50, 50, 50, 50]);
    for truth in &true_centers {
        let found = model.output.centroids.iter().any(|c| {
            (c[0] - truth[0]).abs() < 0.5 && (c[1] - truth[1]).abs() < 0.5
        });
        assert!(found, "no centroid near ({}, {})", truth[0], truth[1]);
    }
}

#[test]
fn identical_seeds_reproduce_identical_models() {
    let run = || {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut frame = generate_frame(200, 2, &mut rng)
            .unwrap()
            .with_chunk_rows(64);
        train_model(&params(5, Initialization::PlusPlus, 123), &mut frame).unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.output.centroids, b.output.centroids);
    assert_eq!(a.output.rows, b.output.rows);
    assert_eq!(a.output.avgwithinss, b.output.avgwithinss);
    assert_eq!(a.output.iterations, b.output.iterations);
}

#[test]
fn missing_values_do_not_derail_training() {
    let mut frame = Frame::new(vec![
        Column::numeric("x", vec![0.0, f64::NAN, 0.5, 10.0, 10.5, f64::NAN]),
        Column::numeric("y", vec![0.0, 0.5, f64::NAN, 10.0, f64::NAN, 10.5]),
    ])
    .unwrap();
    let model = train_model(&params(2, Initialization::Furthest, 21), &mut frame).unwrap();
    assert_eq!(model.output.rows.iter().sum::<u64>(), 6);
    for centroid in &model.output.centroids {
        assert!(centroid.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn training_terminates_within_the_iteration_budget() {
    let mut frame =
        Frame::new(vec![Column::numeric("x", vec![1.0, 1.0, 2.0, 2.0])]).unwrap();
    let mut p = params(2, Initialization::Furthest, 3);
    p.max_iters = 3;
    let model = train_model(&p, &mut frame).unwrap();
    assert!(model.output.iterations <= 3);
}

#[test]
fn cancelled_jobs_stop_before_publishing() {
    let mut frame =
        Frame::new(vec![Column::numeric("x", vec![1.0, 2.0, 3.0, 4.0])]).unwrap();
    let job = Job::new();
    job.cancel();
    let err = train_model_with_job(&params(2, Initialization::Furthest, 0), &mut frame, &job)
        .unwrap_err();
    assert!(matches!(err, KMeansError::Cancelled));
    assert!(job.snapshot().is_none());
    assert!(job.is_done());
}

#[test]
fn finished_jobs_carry_the_final_snapshot() {
    let mut frame = Frame::new(vec![
        Column::numeric("x", vec![0.0, 0.0, 10.0, 10.0]),
        Column::numeric("y", vec![0.0, 1.0, 10.0, 11.0]),
    ])
    .unwrap();
    let job = Job::new();
    let model =
        train_model_with_job(&params(2, Initialization::Furthest, 42), &mut frame, &job).unwrap();
    let snapshot = job.snapshot().expect("final snapshot published");
    assert_eq!(snapshot.centroids, model.output.centroids);
    assert_eq!(snapshot.iterations, model.output.iterations);
    assert!(job.is_done());
    assert!(job.worked() >= 1);
}

#[test]
fn oversized_k_is_rejected_up_front() {
    let mut frame = Frame::new(vec![Column::numeric("x", vec![1.0, 2.0])]).unwrap();
    let err = train_model(&params(3, Initialization::PlusPlus, 0), &mut frame).unwrap_err();
    assert!(matches!(err, KMeansError::InvalidConfig(_)));
}
