use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{Point3, Vector3};
use rustfem::mesh::generator::channel;
use rustfem::mpi::SerialComm;
use rustfem::navier_stokes::{AssemblyMode, NavierStokes3D, Params};

const SIZES: [usize; 2] = [2, 4];

fn swirl(p: &Point3<f64>, _t: f64) -> Vector3<f64> {
    Vector3::new(p.y * (1. - p.y), p.z * p.x, 0.3 * p.x * p.y)
}

fn setup(n: usize) -> NavierStokes3D<SerialComm> {
    let params = Params {
        wall_ids: vec![2],
        ..Params::default()
    };
    let mesh = channel([2 * n, n, n], [2., 1., 1.]).unwrap();
    let mut navier = NavierStokes3D::new(mesh, params, SerialComm).unwrap();
    navier.set_initial_condition(&swirl);
    navier
}

pub fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("Assembly");
    group.significance_level(0.1).sample_size(10);
    for n in SIZES.iter() {
        let mut navier = setup(*n);
        let name = format!("Full n = {}", n);
        group.bench_function(&name, |b| {
            b.iter(|| navier.assemble(AssemblyMode::FullAssembly).unwrap())
        });
        navier.time_step = 3;
        group.bench_with_input(BenchmarkId::new("Incremental", n), n, |b, _| {
            b.iter(|| navier.assemble(AssemblyMode::IncrementalStep).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_assembly);
criterion_main!(benches);
