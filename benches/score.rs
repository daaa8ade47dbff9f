use std::hint::black_box;

use conjugate::models::{DirichletDiscrete, GammaPoisson, NormalInvChiSquared};
use conjugate::traits::Model;
use criterion::BatchSize;
use criterion::Criterion;
use criterion::{criterion_group, criterion_main};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn filled_group<M: Model>(model: &M, n: usize, rng: &mut Xoshiro256Plus) -> M::Group {
    let mut group = model.group();
    for x in model.sample_group(n, rng) {
        model.group_add_value(&mut group, &x).unwrap();
    }
    group
}

fn bench_nich_score_value(c: &mut Criterion) {
    let mut group = c.benchmark_group("nich score_value");
    let model = NormalInvChiSquared::new_unchecked(0.1, 1.2, 2.3, 3.4);
    let mut rng = Xoshiro256Plus::seed_from_u64(0x5C0);
    let stats = filled_group(&model, 10, &mut rng);

    group.bench_function("No cache", |b| {
        b.iter_batched(
            || model.sample_value(&stats, &mut rng),
            |y| black_box(model.score_value(&stats, &y)),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("With cache", |b| {
        let scorer = model.scorer_init(&stats);
        b.iter_batched(
            || model.sample_value(&stats, &mut rng),
            |y| black_box(model.scorer_eval(&scorer, &y)),
            BatchSize::SmallInput,
        );
    });
}

fn bench_dd_score_group(c: &mut Criterion) {
    let mut group = c.benchmark_group("dd score_group");
    let mut rng = Xoshiro256Plus::seed_from_u64(0x5C1);
    for dim in [2, 10, 100] {
        let model = DirichletDiscrete::symmetric(0.5, dim).unwrap();
        let stats = filled_group(&model, 1000, &mut rng);
        group.bench_function(format!("dim = {}", dim), |b| {
            b.iter(|| black_box(model.score_group(&stats)))
        });
    }
}

fn bench_gp_add_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("gp add/remove");
    let model = GammaPoisson::new_unchecked(2.5, 0.5);
    let mut rng = Xoshiro256Plus::seed_from_u64(0x5C2);

    group.bench_function("add then remove", |b| {
        b.iter_batched_ref(
            || (filled_group(&model, 100, &mut rng), model.sample_value(&model.group(), &mut rng)),
            |(stats, x)| {
                model.group_add_value(stats, x).unwrap();
                model.group_remove_value(stats, x).unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    score_benches,
    bench_nich_score_value,
    bench_dd_score_group,
    bench_gp_add_remove
);
criterion_main!(score_benches);
