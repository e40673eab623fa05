use criterion::{criterion_group, criterion_main};
use rand::{rngs::StdRng, Rng, SeedableRng};

use trioctree_rs::convert::{MeshData, MeshShape, MeshTransform};
use trioctree_rs::octree::{Octree, OctreeConfig, V3c};
use trioctree_rs::raytracing::{fire_ray, Ray, Viewport};

/// A cloud of small randomly placed triangles inside the unit cube, plus its hull
fn scene() -> MeshData {
    let mut rng = StdRng::seed_from_u64(42);
    let mut positions = Vec::new();
    for _ in 0..5000 {
        let corner = V3c::new(
            rng.gen_range(0.05..0.9),
            rng.gen_range(0.05..0.9),
            rng.gen_range(0.05..0.9),
        );
        for vertex in [
            corner,
            corner + V3c::new(rng.gen_range(0.01..0.05), 0., 0.),
            corner + V3c::new(0., rng.gen_range(0.01..0.05), rng.gen_range(0.0..0.05)),
        ] {
            positions.extend_from_slice(&[vertex.x, vertex.y, vertex.z]);
        }
    }
    let mut mesh = MeshData::cube(V3c::unit(0.), 1.);
    mesh.shapes.push(MeshShape {
        name: "cloud".to_string(),
        indices: (0..(positions.len() / 3) as u32).collect(),
        positions,
        face_arities: vec![],
    });
    mesh
}

fn criterion_benchmark(c: &mut criterion::Criterion) {
    let mesh = scene();
    c.bench_function("octree build", |b| {
        b.iter(|| {
            Octree::from_mesh(&mesh, &MeshTransform::default(), OctreeConfig::default())
                .ok()
                .unwrap()
        })
    });

    let octrees = vec![
        Octree::from_mesh(&mesh, &MeshTransform::default(), OctreeConfig::default())
            .ok()
            .unwrap(),
        Octree::from_mesh(
            &mesh,
            &MeshTransform::new(V3c::new(1.5, 0., 0.), 1.),
            OctreeConfig::default(),
        )
        .ok()
        .unwrap(),
    ];
    let viewport = Viewport::looking_at(V3c::new(1.2, 2., 3.), V3c::new(1.2, 0.5, 0.5));
    let width = 64;
    let height = 64;
    let rays: Vec<Ray> = (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| {
                viewport.ray_for(
                    (x as f32 + 0.5) / width as f32,
                    (y as f32 + 0.5) / height as f32,
                )
            })
        })
        .collect();

    c.bench_function("cpu fire_ray single octree", |b| {
        b.iter(|| {
            for ray in rays.iter() {
                fire_ray(&octrees[..1], ray);
            }
        })
    });

    c.bench_function("cpu fire_ray two octrees", |b| {
        b.iter(|| {
            for ray in rays.iter() {
                fire_ray(&octrees, ray);
            }
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
