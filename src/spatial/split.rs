
use crate::spatial::{
    math::{plane_line_intersection_distance, V3c},
    Cube, Triangle,
};

/// Distance from a splitting plane under which a vertex is considered to lie on it
pub(crate) const PLANE_EPSILON: f32 = 0.000001;

/// The normals of the splitting planes, in the order they are applied
pub(crate) const SPLIT_PLANE_NORMALS: [V3c<f32>; 3] = [
    V3c {
        x: 0.,
        y: 1.,
        z: 0.,
    },
    V3c {
        x: -1.,
        y: 0.,
        z: 0.,
    },
    V3c {
        x: 0.,
        y: 0.,
        z: 1.,
    },
];

/// Which side of the plane the given signed distance is on: -1, 0 (on the plane) or 1
fn side_of(signed_distance: f32) -> i8 {
    if signed_distance > PLANE_EPSILON {
        1
    } else if signed_distance < -PLANE_EPSILON {
        -1
    } else {
        0
    }
}

/// Clips the triangle against the plane given by its normal and a point on it.
/// If the plane separates the vertices, the triangle on the isolated side
/// and two triangles covering the remaining quad are pushed into `out`;
/// otherwise the triangle is pushed unchanged.
/// Fragments which degenerated into a line are not emitted.
/// Winding order of the fragments follows the input triangle.
/// * `tri` - The triangle to split
/// * `normal` - The normal of the splitting plane
/// * `point` - Any point on the splitting plane
/// * `out` - Fragments are appended to this list
pub fn split_triangle_on_plane(
    tri: &Triangle,
    normal: &V3c<f32>,
    point: &V3c<f32>,
    out: &mut Vec<Triangle>,
) {
    let distances = tri.vertices.map(|v| (v - *point).dot(normal));
    let sides = distances.map(side_of);

    // The isolated vertex is on one side of the plane, while no other vertex is
    let isolated = (0..3).find(|&k| {
        sides[k] != 0
            && sides[(k + 1) % 3] != sides[k]
            && sides[(k + 2) % 3] != sides[k]
            && (sides[(k + 1) % 3] == -sides[k] || sides[(k + 2) % 3] == -sides[k])
    });

    let Some(k) = isolated else {
        // parallel to the plane or not crossing it
        out.push(*tri);
        return;
    };

    let a = (k + 1) % 3;
    let b = (k + 2) % 3;
    let v_k = tri.vertices[k];
    let v_a = tri.vertices[a];
    let v_b = tri.vertices[b];

    // crossing points of the edges leaving the isolated vertex; a vertex on the plane
    // is its own crossing point
    let crossing = |other: usize| {
        if sides[other] == 0 {
            tri.vertices[other]
        } else {
            let edge = tri.vertices[other] - v_k;
            plane_line_intersection_distance(point, normal, &v_k, &edge)
                .map_or(v_k, |t| v_k + edge * t)
        }
    };
    let p_a = crossing(a);
    let p_b = crossing(b);

    for fragment in [
        Triangle::new(v_k, p_a, p_b),
        Triangle::new(v_a, v_b, p_b),
        Triangle::new(v_a, p_b, p_a),
    ] {
        if !fragment.is_degenerate() {
            out.push(fragment);
        }
    }
}

/// Splits the triangle by the three mid-planes of the given cell, so every
/// resulting fragment lies inside a single octant of it.
/// The planes are applied in a fixed order: y, x then z.
/// Degenerate fragments are dropped from the output.
pub fn split_triangle(tri: &Triangle, cell: &Cube, out: &mut Vec<Triangle>) {
    let center = cell.midpoint();
    let mut fragments = vec![*tri];
    for normal in SPLIT_PLANE_NORMALS.iter() {
        let mut next_fragments = Vec::with_capacity(fragments.len() * 3);
        for fragment in fragments.iter() {
            split_triangle_on_plane(fragment, normal, &center, &mut next_fragments);
        }
        fragments = next_fragments;
    }
    out.extend(fragments.into_iter().filter(|f| !f.is_degenerate()));
}
