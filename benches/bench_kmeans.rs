use criterion::{criterion_group, criterion_main, Criterion};
use kmeans_scalable::{generate_frame, train_model, Initialization, KMeansParams};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn bench_kmeans(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let frame = generate_frame(20_000, 8, &mut rng).expect("bench frame");
    let params = KMeansParams {
        k: 8,
        max_iters: 100,
        init: Initialization::PlusPlus,
        standardize: false,
        seed: 42,
    };
    c.bench_function("kmeans_20k_8d", |b| {
        b.iter(|| {
            let mut frame = frame.clone();
            let _model = train_model(&params, &mut frame).expect("bench run");
        });
    });
}

criterion_group!(benches, bench_kmeans);
criterion_main!(benches);
