use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::{Array1, Array2};
use quasinewton::{DirectionOptions, gradient, rank_two_update, solve_spd};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_spd(size: usize, rng: &mut StdRng) -> Array2<f64> {
    let m = Array2::from_shape_fn((size, size), |_| rng.gen_range(-1.0..1.0));
    let mut b = m.dot(&m.t()) + Array2::<f64>::eye(size) * size as f64;
    let transposed = b.t().to_owned();
    b = (b + transposed) * 0.5;
    b
}

fn random_vector(size: usize, rng: &mut StdRng) -> Array1<f64> {
    Array1::from_shape_fn(size, |_| rng.gen_range(-1.0..1.0))
}

fn benchmark_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("central_difference_gradient");
    for size in [10_usize, 50, 100] {
        let mut rng = StdRng::seed_from_u64(0x5EED_F64 + size as u64);
        let a = random_spd(size, &mut rng);
        let x = random_vector(size, &mut rng);
        let f = |x: &Array1<f64>| 0.5 * x.dot(&a.dot(x));

        group.throughput(Throughput::Elements(2 * size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &x, |b, input| {
            b.iter(|| black_box(gradient(&f, black_box(input))));
        });
    }
    group.finish();
}

fn benchmark_direction(c: &mut Criterion) {
    let options = DirectionOptions::default();
    let mut group = c.benchmark_group("conjugate_gradient_direction");
    for size in [10_usize, 50, 100, 200] {
        let mut rng = StdRng::seed_from_u64(0xC6 + size as u64);
        let b = random_spd(size, &mut rng);
        let g = random_vector(size, &mut rng);

        group.bench_with_input(BenchmarkId::from_parameter(size), &(b, g), |bench, (b, g)| {
            bench.iter(|| {
                let solution = solve_spd(black_box(b), black_box(g), &options)
                    .expect("benchmark matrix is well conditioned");
                black_box(solution.direction);
            });
        });
    }
    group.finish();
}

fn benchmark_rank_two_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_two_update");
    for size in [10_usize, 50, 100, 200] {
        let mut rng = StdRng::seed_from_u64(0xB0 + size as u64);
        let b = random_spd(size, &mut rng);
        let s = random_vector(size, &mut rng);
        // y = A·s keeps sᵀy positive
        let y = random_spd(size, &mut rng).dot(&s);

        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &(b, s, y),
            |bench, (b, s, y)| {
                bench.iter(|| {
                    let updated = rank_two_update(black_box(b), s, y, f64::EPSILON)
                        .expect("benchmark pair has positive curvature");
                    black_box(updated);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    step_primitives,
    benchmark_gradient,
    benchmark_direction,
    benchmark_rank_two_update
);
criterion_main!(step_primitives);
