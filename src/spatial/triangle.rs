use crate::spatial::math::V3c;
use bytemuck::{Pod, Zeroable};

/// Cosine threshold above which two edges of a triangle are considered collinear
pub(crate) const COLLINEARITY_TOLERANCE: f32 = 0.000001;

/// Three points in space, stored as one fixed size record in the triangle file
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
#[repr(C)]
pub struct Triangle {
    pub vertices: [V3c<f32>; 3],
}

impl From<[V3c<f32>; 3]> for Triangle {
    fn from(vertices: [V3c<f32>; 3]) -> Self {
        Self { vertices }
    }
}

impl Triangle {
    pub fn new(v0: V3c<f32>, v1: V3c<f32>, v2: V3c<f32>) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    pub fn largest_side(&self) -> f32 {
        let [v0, v1, v2] = self.vertices;
        (v2 - v0)
            .length()
            .max((v1 - v0).length())
            .max((v2 - v1).length())
    }

    pub fn area(&self) -> f32 {
        let [v0, v1, v2] = self.vertices;
        (v1 - v0).cross(v2 - v0).length() / 2.
    }

    /// Unit normal of the triangle, following counter-clockwise winding
    pub fn face_normal(&self) -> V3c<f32> {
        let [v0, v1, v2] = self.vertices;
        (v1 - v0).cross(v2 - v0).normalized()
    }

    /// True if the triangle collapsed into a line or a point.
    /// Non-finite vertices are considered degenerate too.
    pub fn is_degenerate(&self) -> bool {
        let [v0, v1, v2] = self.vertices;
        let edge1 = v0 - v1;
        let edge2 = v2 - v1;
        if !(edge1.length() > 0. && edge2.length() > 0. && (v2 - v0).length() > 0.) {
            return true;
        }
        let cosine = edge1.normalized().dot(&edge2.normalized());
        !(cosine.abs() < 1. - COLLINEARITY_TOLERANCE)
    }

    pub fn translated(&self, offset: V3c<f32>) -> Self {
        Self {
            vertices: self.vertices.map(|v| v + offset),
        }
    }

    pub fn scaled(&self, scale: f32) -> Self {
        Self {
            vertices: self.vertices.map(|v| v * scale),
        }
    }

    pub fn min_corner(&self) -> V3c<f32> {
        let [v0, v1, v2] = self.vertices;
        v0.min(&v1).min(&v2)
    }

    pub fn max_corner(&self) -> V3c<f32> {
        let [v0, v1, v2] = self.vertices;
        v0.max(&v1).max(&v2)
    }
}
