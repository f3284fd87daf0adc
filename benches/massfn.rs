use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use massfn::{
    prodef::{ContinuousDistribution, MassFunction1D},
    symbolic::Expr,
};
use nalgebra::DVector;
use std::{hint::black_box, time::Duration};

const ENSEMBLE_SIZE: usize = 2_usize.pow(16);

fn benchmark_salpeter_f64(c: &mut Criterion) {
    let formula = Expr::parse("m**-2.35").unwrap();
    let range = (0.5, 100.0);

    let massfn = MassFunction1D::<f64>::new(formula.clone(), range).unwrap();

    let masses = DVector::from_iterator(
        ENSEMBLE_SIZE,
        (0..ENSEMBLE_SIZE).map(|i| 0.5 + 99.5 * i as f64 / ENSEMBLE_SIZE as f64),
    );

    let mut group = c.benchmark_group("massfn_salpeter_bench");

    group
        .significance_level(0.05)
        .sample_size(50)
        .measurement_time(Duration::from_secs(5));

    group.bench_function("massfn_salpeter_construct", |b| {
        b.iter(|| MassFunction1D::<f64>::new(black_box(formula.clone()), black_box(range)).unwrap());
    });

    group.throughput(Throughput::Elements(ENSEMBLE_SIZE as u64));
    group.bench_function("massfn_salpeter_pdf", |b| {
        b.iter(|| massfn.pdf_array(black_box(&masses)));
    });

    group.throughput(Throughput::Elements(ENSEMBLE_SIZE as u64));
    group.bench_function("massfn_salpeter_sample", |b| {
        b.iter(|| massfn.sample_ensbl(ENSEMBLE_SIZE, black_box(42)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, benchmark_salpeter_f64);
criterion_main!(benches);
