//! Benchmarks of the time steppers
//!
//! Run with: `cargo bench --bench benchmark_navier`
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use stratiform::navier_stokes::Navier3D;
use stratiform::navier_stokes_lnse::{Direction, SnapshotStore, Trajectory};
use stratiform::Params;

fn navier(n1: usize, n3: usize) -> Navier3D {
    let params = Params {
        n1,
        n2: 1,
        n3,
        dt: 1e-3,
        ..Params::default()
    };
    let mut navier = Navier3D::new(params).unwrap();
    navier.set_background(|z| z.tanh(), |z| (2. * z).tanh());
    navier.random_disturbance(1e-3).unwrap();
    navier
}

fn bench_time_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("time_step");
    group.sample_size(10);
    for (n1, n3) in [(64, 65), (128, 129)] {
        let mut navier = navier(n1, n3);
        group.bench_with_input(BenchmarkId::new("nonlinear", n1), &n1, |b, _| {
            b.iter(|| navier.time_step().unwrap())
        });
    }
    group.finish();
}

fn bench_adjoint_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("adjoint_step");
    group.sample_size(10);
    let mut direct = navier(64, 65);
    let mut store = SnapshotStore::memory();
    direct.store_snapshot(&mut store).unwrap();
    direct.time_step().unwrap();
    direct.store_snapshot(&mut store).unwrap();
    let end = direct.time;

    let mut adjoint = navier(64, 65);
    group.bench_function("adjoint", |b| {
        b.iter(|| {
            let mut trajectory = Trajectory::open(&store, Direction::Backward).unwrap();
            adjoint.time = end;
            adjoint.time_step_adjoint(&mut trajectory, false).unwrap();
        })
    });
    group.finish();
}

criterion_group!(benches, bench_time_step, bench_adjoint_step);
criterion_main!(benches);
