//! Benchmarks for quadric error metric decimation.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use nalgebra::Point3;
use whittle::prelude::*;

fn create_grid_mesh(n: usize) -> HalfEdgeMesh {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    let mut faces = Vec::with_capacity(n * n * 2);

    // Grid vertices with a gentle height field so collapses have real cost.
    for j in 0..=n {
        for i in 0..=n {
            let z = ((i as f64) * 0.35).sin() * ((j as f64) * 0.35).cos();
            vertices.push(Point3::new(i as f64, j as f64, z));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    build_from_triangles(&vertices, &faces).unwrap()
}

fn bench_vertex_quadrics(c: &mut Criterion) {
    let mesh = create_grid_mesh(30);

    c.bench_function("vertex_quadrics_grid_30", |b| {
        b.iter(|| VertexQuadricModel::new(&mesh, mesh.num_vertices()));
    });
}

fn bench_decimate(c: &mut Criterion) {
    let mesh = create_grid_mesh(30);
    let options = DecimateOptions::with_target_ratio(0.5);

    c.bench_function("qem_decimate_grid_30_half", |b| {
        b.iter_batched(
            || mesh.clone(),
            |mut m| {
                qem_decimate(&mut m, &options);
                m
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_vertex_quadrics, bench_decimate);
criterion_main!(benches);
