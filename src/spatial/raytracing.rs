
use crate::spatial::{
    math::{V3c, FLOAT_ERROR_TOLERANCE},
    Cube, Triangle,
};

/// Determinant magnitude under which a ray is considered parallel to a triangle
pub(crate) const PARALLEL_EPSILON: f32 = 0.00000001;

/// Barycentric coordinates are accepted within this margin outside of the triangle,
/// so rays don't slip through the shared edges of neighbouring triangles
pub(crate) const BARYCENTRIC_MARGIN: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Ray {
    pub origin: V3c<f32>,
    pub direction: V3c<f32>,
}

impl Ray {
    pub fn new(origin: V3c<f32>, direction: V3c<f32>) -> Self {
        Self { origin, direction }
    }

    /// Creates a ray starting at `origin`, pointing towards `target`
    pub fn towards(origin: V3c<f32>, target: V3c<f32>) -> Self {
        Self {
            origin,
            direction: (target - origin).normalized(),
        }
    }

    pub fn is_valid(&self) -> bool {
        (1. - self.direction.length()).abs() < 0.000001
    }

    pub fn point_at(&self, d: f32) -> V3c<f32> {
        self.origin + self.direction * d
    }

    /// The same ray, with exactly zero direction components replaced by a tiny value,
    /// so slab tests never divide zero by zero
    pub fn sanitized(&self) -> Ray {
        let fix = |c: f32| if c == 0. { FLOAT_ERROR_TOLERANCE } else { c };
        Ray {
            origin: self.origin,
            direction: V3c::new(
                fix(self.direction.x),
                fix(self.direction.y),
                fix(self.direction.z),
            ),
        }
    }

    /// Ray parameter of the intersection with the given triangle, if any.
    /// The returned distance may be negative for triangles behind the origin.
    pub fn triangle_distance(&self, triangle: &Triangle) -> Option<f32> {
        let [vertex0, vertex1, vertex2] = triangle.vertices;
        let edge1 = vertex1 - vertex0;
        let edge2 = vertex2 - vertex0;
        let h = self.direction.cross(edge2);
        let a = edge1.dot(&h);
        if a.abs() < PARALLEL_EPSILON {
            // ray is parallel to the triangle
            return None;
        }
        let f = 1. / a;
        let s = self.origin - vertex0;
        let u = f * s.dot(&h);
        if !(-BARYCENTRIC_MARGIN..=1. + BARYCENTRIC_MARGIN).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = f * self.direction.dot(&q);
        if v < -BARYCENTRIC_MARGIN || u + v > 1. + BARYCENTRIC_MARGIN {
            return None;
        }
        let t = f * edge2.dot(&q);
        t.is_finite().then_some(t)
    }
}

/// Intersection point of the line of the ray with the triangle.
/// Hits behind the origin are also reported; they are only usable
/// if `dot(point - origin, direction) > 0`.
/// * `origin` - the origin of the ray
/// * `direction` - the direction of the ray
/// * `triangle` - the triangle to test against
pub fn ray_intersects_triangle(
    origin: &V3c<f32>,
    direction: &V3c<f32>,
    triangle: &Triangle,
) -> Option<V3c<f32>> {
    let ray = Ray::new(*origin, *direction);
    ray.triangle_distance(triangle).map(|t| ray.point_at(t))
}

/// Slab test of the line against an axis aligned box.
/// Returns the ray parameters `(t_near, t_far)` of entering and leaving the box;
/// the line misses the box if `t_near > t_far`.
/// Direction components must not be exactly zero, see [`Ray::sanitized`]
pub fn intersect_box(
    origin: &V3c<f32>,
    direction: &V3c<f32>,
    box_min: &V3c<f32>,
    box_size: f32,
) -> (f32, f32) {
    let box_max = *box_min + V3c::unit(box_size);
    let inverse = V3c::new(1. / direction.x, 1. / direction.y, 1. / direction.z);
    let t_min = (*box_min - *origin) * inverse;
    let t_max = (box_max - *origin) * inverse;
    let t1 = t_min.min(&t_max);
    let t2 = t_min.max(&t_max);
    let t_near = t1.x.max(t1.y).max(t1.z);
    let t_far = t2.x.min(t2.y).min(t2.z);
    (t_near, t_far)
}

/// Normal of the face of the cell closest to the given point, which is expected to be on its boundary.
/// The axis with the largest offset from the cell center wins, ties are resolved in x, y, z order.
pub fn exit_face_normal(cell: &Cube, point: &V3c<f32>) -> V3c<f32> {
    let to_center = *point - cell.midpoint();
    let mut magnitude = to_center;
    magnitude.abs();
    if magnitude.x >= magnitude.y && magnitude.x >= magnitude.z {
        V3c::new(to_center.x.signum(), 0., 0.)
    } else if magnitude.y >= magnitude.z {
        V3c::new(0., to_center.y.signum(), 0.)
    } else {
        V3c::new(0., 0., to_center.z.signum())
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct CubeHit {
    /// None if the origin of the ray is inside the cube
    pub impact_distance: Option<f32>,
    pub exit_distance: f32,
}

impl Cube {
    /// Tells the intersection with the cube of the given ray, if the cube is ahead of it
    pub fn intersect_ray(&self, ray: &Ray) -> Option<CubeHit> {
        let ray = ray.sanitized();
        let (t_near, t_far) = intersect_box(&ray.origin, &ray.direction, &self.min_position, self.size);
        if !(t_near <= t_far) || t_far < 0. {
            return None;
        }
        Some(CubeHit {
            impact_distance: (t_near > 0.).then_some(t_near),
            exit_distance: t_far,
        })
    }
}
