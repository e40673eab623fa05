#[cfg(test)]
mod descent_tests {
    use crate::convert::{MeshData, MeshTransform};
    use crate::octree::{Octree, OctreeConfig, Triangle, V3c};
    use crate::raytracing::{Descent, MarchState, Ray};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn cube_octree(min_position: V3c<f32>, size: f32) -> Octree {
        Octree::from_mesh(
            &MeshData::cube(min_position, size),
            &MeshTransform::default(),
            OctreeConfig::default(),
        )
        .ok()
        .unwrap()
    }

    /// Fires the ray until it concludes, returning with the hit if any
    fn march(octree: &Octree, ray: &Ray) -> Option<crate::raytracing::TriangleHit> {
        let mut state = MarchState::new();
        let mut position = ray.origin;
        loop {
            let step = octree.propagate_ray(&position, ray, &mut state);
            if step.hit.is_some() || step.missed {
                return step.hit;
            }
            position = step.position;
        }
    }

    #[test]
    fn test_point_outside_of_root() {
        let octree = cube_octree(V3c::unit(0.), 1.);
        let ray = Ray::new(V3c::new(5., 0.5, 0.5), V3c::new(-1., 0., 0.));
        let mut state = MarchState::new();
        assert!(
            Descent::Outside
                == octree.find_largest_non_container(&V3c::new(5., 0.5, 0.5), &ray, &mut state)
        );
        assert!(state.checked().is_empty());
    }

    #[test]
    fn test_descent_checks_nodes_once() {
        let octree = cube_octree(V3c::unit(0.), 1.);
        let ray = Ray::new(V3c::new(0.6, 0.6, -2.), V3c::new(0., 0., 1.));
        let mut state = MarchState::new();
        let entry = V3c::new(0.6, 0.6, 0.001);
        let first = octree.find_largest_non_container(&entry, &ray, &mut state);
        let checked_after_first = state.checked().len();
        assert!(0 < checked_after_first);
        let second = octree.find_largest_non_container(&entry, &ray, &mut state);
        assert!(first == second);
        assert!(checked_after_first == state.checked().len());
    }

    #[test]
    fn test_hit_cube_face() {
        let octree = cube_octree(V3c::new(0.1, 0.1, 0.1), 0.8);
        let ray = Ray::new(V3c::new(0.4, 0.6, 5.), V3c::new(0., 0., -1.));
        let hit = march(&octree, &ray).unwrap();
        assert!((hit.distance - 4.1).abs() < 0.001, "{:?}", hit);
        assert!((hit.point - V3c::new(0.4, 0.6, 0.9)).length() < 0.001);
        assert!((hit.normal - V3c::new(0., 0., 1.)).length() < 0.001);
    }

    #[test]
    fn test_hit_cube_diagonally() {
        let octree = cube_octree(V3c::unit(-0.5), 1.);
        let ray = Ray::towards(V3c::unit(5.), V3c::new(0.05, -0.02, 0.));
        let hit = march(&octree, &ray).unwrap();
        let mut from_center = hit.point;
        from_center.abs();
        assert!((from_center.max_component() - 0.5).abs() < 0.001, "{:?}", hit);
        assert!(hit.normal.dot(&ray.direction) < 0.);
    }

    #[test]
    fn test_miss_beside_the_cube() {
        let octree = cube_octree(V3c::new(0.1, 0.1, 0.1), 0.8);
        let ray = Ray::new(V3c::new(0.05, 0.05, 5.), V3c::new(0., 0., -1.));
        assert!(march(&octree, &ray).is_none());
    }

    #[test]
    fn test_miss_away_from_the_octree() {
        let octree = cube_octree(V3c::unit(0.), 1.);
        let ray = Ray::new(V3c::unit(5.), V3c::new(1., 0., 0.));
        assert!(march(&octree, &ray).is_none());
        let ray = Ray::new(V3c::unit(5.), V3c::unit(1.).normalized());
        assert!(march(&octree, &ray).is_none());
    }

    #[test]
    fn test_hit_from_inside() {
        let octree = cube_octree(V3c::unit(0.), 1.);
        let ray = Ray::new(V3c::new(0.5, 0.4, 0.3), V3c::new(1., 0., 0.));
        let hit = march(&octree, &ray).unwrap();
        assert!((hit.distance - 0.5).abs() < 0.001, "{:?}", hit);
        assert!((hit.normal - V3c::new(1., 0., 0.)).length() < 0.001);
    }

    #[test]
    fn test_nearest_of_stacked_triangles() {
        let mut octree = Octree::new(V3c::unit(0.), 8., OctreeConfig::default())
            .ok()
            .unwrap();
        for z in [1., 3., 6.] {
            let triangle = Triangle::new(
                V3c::new(0.5, 0.5, z),
                V3c::new(7.5, 0.5, z),
                V3c::new(0.5, 7.5, z),
            );
            octree
                .add_triangle(&triangle, &V3c::new(0., 0., z))
                .ok()
                .unwrap();
        }
        let ray = Ray::new(V3c::new(2., 2., 10.), V3c::new(0., 0., -1.));
        let hit = march(&octree, &ray).unwrap();
        assert!((hit.point.z - 6.).abs() < 0.001);
        assert!(hit.normal == V3c::new(0., 0., 6.));

        let ray = Ray::new(V3c::new(2., 2., -10.), V3c::new(0., 0., 1.));
        let hit = march(&octree, &ray).unwrap();
        assert!((hit.point.z - 1.).abs() < 0.001);
    }

    #[test]
    fn test_triangle_behind_origin_is_ignored() {
        let mut octree = Octree::new(V3c::unit(0.), 4., OctreeConfig::default())
            .ok()
            .unwrap();
        let triangle = Triangle::new(
            V3c::new(0.5, 0.5, 1.),
            V3c::new(3.5, 0.5, 1.),
            V3c::new(0.5, 3.5, 1.),
        );
        octree
            .add_triangle(&triangle, &V3c::new(0., 0., 1.))
            .ok()
            .unwrap();
        let ray = Ray::new(V3c::new(1., 1., 2.), V3c::new(0., 0., 1.));
        assert!(march(&octree, &ray).is_none());
    }

    #[test]
    fn test_march_step_limit() {
        let octree = Octree::from_mesh(
            &MeshData::cube(V3c::new(0.1, 0.1, 0.1), 0.8),
            &MeshTransform::default(),
            OctreeConfig::default().with_max_march_steps(1),
        )
        .ok()
        .unwrap();
        let ray = Ray::new(V3c::new(0.5, 0.5, 5.), V3c::new(0., 0., -1.));
        let mut state = MarchState::new();
        let first = octree.propagate_ray(&ray.origin, &ray, &mut state);
        assert!(!first.missed);
        let second = octree.propagate_ray(&first.position, &ray, &mut state);
        assert!(second.missed || second.hit.is_some());
        assert!(2 == state.steps());
    }

    #[test]
    fn test_random_rays_hit_the_cube_surface() {
        let octree = cube_octree(V3c::unit(-1.), 2.);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let origin = V3c::new(
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
                rng.gen_range(3.0..5.0),
            );
            let target = V3c::new(
                rng.gen_range(-0.9..0.9),
                rng.gen_range(-0.9..0.9),
                rng.gen_range(-0.9..0.9),
            );
            let ray = Ray::towards(origin, target);
            let hit = march(&octree, &ray);
            assert!(hit.is_some(), "{:?} missed the cube", ray);
            let hit = hit.unwrap();
            let mut from_center = hit.point;
            from_center.abs();
            assert!(
                (from_center.max_component() - 1.).abs() < 0.05,
                "{:?} hit at {:?}",
                ray,
                hit
            );
            assert!(hit.normal.dot(&ray.direction) < 0.);
        }
    }
}

#[cfg(test)]
mod router_tests {
    use crate::convert::{MeshData, MeshShape, MeshTransform};
    use crate::octree::{Octree, OctreeConfig, V3c};
    use crate::raytracing::{fire_ray, Ray};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn octree_of(mesh: &MeshData, offset: V3c<f32>) -> Octree {
        Octree::from_mesh(
            mesh,
            &MeshTransform::new(offset, 1.),
            OctreeConfig::default(),
        )
        .ok()
        .unwrap()
    }

    /// A square in the plane z = `height`, facing up
    fn floor(min_x: f32, min_y: f32, size: f32, height: f32) -> MeshData {
        MeshData {
            shapes: vec![MeshShape {
                name: "floor".to_string(),
                positions: vec![
                    min_x, min_y, height, //
                    min_x + size, min_y, height, //
                    min_x + size, min_y + size, height, //
                    min_x, min_y + size, height, //
                ],
                indices: vec![0, 1, 2, 3],
                face_arities: vec![4],
            }],
        }
    }

    #[test]
    fn test_nearest_of_two_octrees() {
        let octrees = vec![
            octree_of(&floor(0., 0., 4., 0.), V3c::default()),
            octree_of(&floor(0., 0., 4., 0.), V3c::new(0., 0., 2.)),
        ];
        let ray = Ray::new(V3c::new(1., 1., 5.), V3c::new(0., 0., -1.));
        let hit = fire_ray(&octrees, &ray).unwrap();
        assert!(1 == hit.octree);
        assert!((hit.distance - 3.).abs() < 0.001);
        assert!((hit.point - V3c::new(1., 1., 2.)).length() < 0.001);

        let ray = Ray::new(V3c::new(1., 1., -5.), V3c::new(0., 0., 1.));
        let hit = fire_ray(&octrees, &ray).unwrap();
        assert!(0 == hit.octree);
    }

    #[test]
    fn test_only_farther_octree_hit() {
        let octrees = vec![
            octree_of(&floor(10., 10., 2., 3.), V3c::default()),
            octree_of(&floor(0., 0., 4., 0.), V3c::default()),
        ];
        let ray = Ray::new(V3c::new(1., 1., 5.), V3c::new(0., 0., -1.));
        let hit = fire_ray(&octrees, &ray).unwrap();
        assert!(1 == hit.octree);
        assert!((hit.distance - 5.).abs() < 0.001);
    }

    #[test]
    fn test_no_octrees() {
        let ray = Ray::new(V3c::default(), V3c::new(0., 0., 1.));
        assert!(fire_ray(&[], &ray).is_none());
    }

    #[test]
    fn test_offset_octree() {
        let octrees = vec![octree_of(
            &MeshData::cube(V3c::unit(0.), 1.),
            V3c::new(10., 0., 0.),
        )];
        let ray = Ray::new(V3c::new(10.3, 0.6, 5.), V3c::new(0., 0., -1.));
        let hit = fire_ray(&octrees, &ray).unwrap();
        assert!((hit.point - V3c::new(10.3, 0.6, 1.)).length() < 0.001);
        assert!((hit.normal - V3c::new(0., 0., 1.)).length() < 0.001);

        let ray = Ray::new(V3c::new(0.5, 0.5, 5.), V3c::new(0., 0., -1.));
        assert!(fire_ray(&octrees, &ray).is_none());
    }

    #[test]
    fn test_routing_matches_merged_octree() {
        let first = MeshData::cube(V3c::unit(0.), 1.);
        let second = MeshData::cube(V3c::new(0.6, 0.3, -0.4), 1.2);
        let merged = MeshData {
            shapes: first
                .shapes
                .iter()
                .chain(second.shapes.iter())
                .cloned()
                .collect(),
        };
        let separate = vec![
            octree_of(&first, V3c::default()),
            octree_of(&second, V3c::default()),
        ];
        let merged = vec![octree_of(&merged, V3c::default())];

        let mut rng = StdRng::seed_from_u64(3);
        let mut hits = 0;
        for _ in 0..200 {
            let origin = V3c::new(
                rng.gen_range(-4.0..4.0),
                rng.gen_range(-4.0..4.0),
                rng.gen_range(-4.0..4.0),
            ) * 2.;
            let target = if rng.gen_bool(0.5) {
                V3c::new(
                    rng.gen_range(0.1..0.9),
                    rng.gen_range(0.1..0.9),
                    rng.gen_range(0.1..0.9),
                )
            } else {
                V3c::new(
                    rng.gen_range(0.7..1.7),
                    rng.gen_range(0.4..1.4),
                    rng.gen_range(-0.3..0.7),
                )
            };
            let ray = Ray::towards(origin, target);
            let routed = fire_ray(&separate, &ray);
            let reference = fire_ray(&merged, &ray);
            assert!(routed.is_some() && reference.is_some(), "{:?}", ray);
            if let (Some(routed), Some(reference)) = (routed, reference) {
                hits += 1;
                // rays grazing a cube edge may hit within the barycentric margin
                assert!(
                    (routed.distance - reference.distance).abs() < 0.05,
                    "{:?}: {:?} vs {:?}",
                    ray,
                    routed,
                    reference
                );
            }
        }
        assert!(0 < hits);
    }
}

#[cfg(test)]
mod stream_tests {
    use crate::convert::{MeshData, MeshTransform};
    use crate::octree::{Octree, OctreeConfig, V3c};
    use crate::raytracing::{
        weave_surface, Frame, FrameStreamer, PixelSample, PublishedFrame, StreamConfig,
        SurfaceHit, Viewport,
    };

    fn cube_octree() -> Octree {
        Octree::from_mesh(
            &MeshData::cube(V3c::unit(-1.), 2.),
            &MeshTransform::default(),
            OctreeConfig::default(),
        )
        .ok()
        .unwrap()
    }

    #[test]
    fn test_center_ray_follows_direction() {
        let viewport = Viewport::looking_at(V3c::new(0., 0., 5.), V3c::default());
        let ray = viewport.ray_for(0.5, 0.5);
        assert!((ray.direction - V3c::new(0., 0., -1.)).length() < 0.0001);
        assert!(ray.is_valid());

        // top left of the image is up and to the left of the camera
        let corner = viewport.ray_for(0., 0.);
        assert!(corner.direction.x < 0.);
        assert!(corner.direction.y > 0.);
    }

    #[test]
    fn test_refresh_publishes_whole_frame() {
        let config = StreamConfig::default()
            .with_resolution(16, 12)
            .with_divisions(3, 2)
            .with_threads(2);
        let streamer = FrameStreamer::new(
            vec![cube_octree()],
            Viewport::looking_at(V3c::new(0., 0., 5.), V3c::default()),
            config,
        );
        let published = streamer.published();
        assert!(!published.is_available());

        streamer.refresh();
        assert!(published.is_available());
        let frame = published.take().unwrap();
        assert!(!published.is_available());
        assert!(published.take().is_none());

        assert!(16 == frame.width && 12 == frame.height);
        assert!(16 * 12 == frame.samples.len());
        let center = frame.sample(8, 6).unwrap();
        let hit = center.hit.unwrap();
        assert!((hit.point.z - 1.).abs() < 0.001);
        // the default light shines sideways, so the front face is dark
        assert!(center.light.abs() < 0.0001);
        // the corners look past the cube
        assert!(frame.sample(0, 0).unwrap().hit.is_none());
    }

    #[test]
    fn test_lit_face() {
        let config = StreamConfig::default()
            .with_resolution(4, 4)
            .with_threads(1)
            .with_light_direction(V3c::new(0., 0., 1.));
        let streamer = FrameStreamer::new(
            vec![cube_octree()],
            Viewport::looking_at(V3c::new(0., 0., 5.), V3c::default()),
            config,
        );
        streamer.refresh();
        let frame = streamer.published().take().unwrap();
        let center = frame.sample(2, 2).unwrap();
        assert!((center.light - 1.).abs() < 0.001);
    }

    #[test]
    fn test_publish_overwrites_untaken_frame() {
        let published = PublishedFrame::default();
        published.publish(Frame {
            width: 1,
            height: 1,
            samples: vec![PixelSample::default()],
        });
        published.publish(Frame {
            width: 2,
            height: 1,
            samples: vec![PixelSample::default(); 2],
        });
        assert!(2 == published.take().unwrap().width);
    }

    #[test]
    fn test_weave_surface() {
        let hit = SurfaceHit {
            point: V3c::default(),
            normal: V3c::new(0., 0., 1.),
            distance: 1.,
            octree: 0,
        };
        let full = PixelSample {
            hit: Some(hit),
            light: 0.5,
        };
        let mut frame = Frame {
            width: 3,
            height: 3,
            samples: vec![full; 9],
        };
        let mesh = weave_surface(&frame);
        assert!(8 == mesh.triangle_count());
        assert!(mesh.positions.len() == mesh.normals.len());
        assert!(mesh.positions.len() == mesh.light.len());

        // the bottom right pixel takes part in one triangle only
        frame.samples[8] = PixelSample::default();
        assert!(7 == weave_surface(&frame).triangle_count());

        // the center pixel is a corner of 6 triangles
        frame.samples[4] = PixelSample::default();
        assert!(1 == weave_surface(&frame).triangle_count());
    }
}

#[cfg(test)]
mod dense_mesh_tests {
    use crate::convert::{MeshData, MeshShape, MeshTransform};
    use crate::octree::{Octree, OctreeConfig, V3c};
    use crate::raytracing::{fire_ray, Ray};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashMap;

    /// A unit sphere around the origin, made by subdividing an icosahedron
    /// * `subdivisions` - every subdivision splits each face into 4
    fn icosphere(subdivisions: u32) -> MeshData {
        let t = (1. + 5f32.sqrt()) / 2.;
        let mut vertices: Vec<V3c<f32>> = [
            (-1., t, 0.),
            (1., t, 0.),
            (-1., -t, 0.),
            (1., -t, 0.),
            (0., -1., t),
            (0., 1., t),
            (0., -1., -t),
            (0., 1., -t),
            (t, 0., -1.),
            (t, 0., 1.),
            (-t, 0., -1.),
            (-t, 0., 1.),
        ]
        .iter()
        .map(|(x, y, z)| V3c::new(*x, *y, *z).normalized())
        .collect();
        #[rustfmt::skip]
        let mut faces: Vec<[u32; 3]> = vec![
            [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
            [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
            [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
            [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
        ];
        for _ in 0..subdivisions {
            let mut midpoints = HashMap::new();
            let mut midpoint = |a: u32, b: u32, vertices: &mut Vec<V3c<f32>>| -> u32 {
                *midpoints.entry((a.min(b), a.max(b))).or_insert_with(|| {
                    let position = (vertices[a as usize] + vertices[b as usize]) * 0.5;
                    vertices.push(position.normalized());
                    vertices.len() as u32 - 1
                })
            };
            let mut next_faces = Vec::with_capacity(faces.len() * 4);
            for [a, b, c] in faces.iter().copied() {
                let ab = midpoint(a, b, &mut vertices);
                let bc = midpoint(b, c, &mut vertices);
                let ca = midpoint(c, a, &mut vertices);
                next_faces.extend_from_slice(&[[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
            }
            faces = next_faces;
        }
        MeshData {
            shapes: vec![MeshShape {
                name: "icosphere".to_string(),
                positions: vertices.iter().flat_map(|v| [v.x, v.y, v.z]).collect(),
                indices: faces.iter().flatten().copied().collect(),
                face_arities: Vec::new(),
            }],
        }
    }

    fn random_direction(rng: &mut StdRng) -> V3c<f32> {
        loop {
            let candidate = V3c::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            let length = candidate.length();
            if 0.1 < length && length <= 1. {
                return candidate * (1. / length);
            }
        }
    }

    #[test]
    fn test_dense_sphere_keeps_every_triangle() {
        let mesh = icosphere(4);
        assert!(5120 == mesh.triangles().len());
        for config in [
            OctreeConfig::default(),
            OctreeConfig::default().with_max_split_depth(0),
        ] {
            let octree = Octree::from_mesh(&mesh, &MeshTransform::default(), config)
                .ok()
                .unwrap();
            let stats = octree.build_stats();
            assert!(5120 == stats.inserted);
            assert!(0 == stats.dropped, "{:?} with {:?}", stats, config);
            assert!(stats.inserted <= stats.stored);
            // some node below the root was filled up
            assert!(0 < stats.fragments);
        }
    }

    #[test]
    fn test_dense_sphere_nearest_hit() {
        let mesh = icosphere(4);
        let triangles = mesh.triangles();
        let octrees: Vec<Vec<Octree>> = [
            OctreeConfig::default(),
            OctreeConfig::default().with_max_split_depth(0),
        ]
        .iter()
        .map(|config| {
            vec![Octree::from_mesh(&mesh, &MeshTransform::default(), *config)
                .ok()
                .unwrap()]
        })
        .collect();

        let mut rng = StdRng::seed_from_u64(57);
        for _ in 0..300 {
            let origin = random_direction(&mut rng) * 4.;
            let target = random_direction(&mut rng) * rng.gen_range(0.0..0.5);
            let ray = Ray::towards(origin, target);

            // nearest hit over every triangle of the mesh
            let expected = triangles
                .iter()
                .filter_map(|triangle| ray.triangle_distance(triangle))
                .filter(|distance| 0. < *distance)
                .fold(f32::INFINITY, f32::min);
            assert!(expected.is_finite());
            // the mesh is inscribed into the unit sphere
            assert!(2.99 < expected && expected < 3.2, "{}", expected);

            for single in octrees.iter() {
                let hit = fire_ray(single, &ray).unwrap();
                assert!(
                    (hit.distance - expected).abs() < 0.005,
                    "{:?} expected {} for {:?}",
                    hit,
                    expected,
                    ray
                );
                assert!(hit.normal.dot(&ray.direction) < 0.);
            }
        }
    }
}
