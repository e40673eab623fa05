pub mod math;
pub mod raytracing;
pub mod split;
pub mod triangle;


pub use math::V3c;
pub use triangle::Triangle;

use crate::spatial::math::{hash_region, offset_region, BOUNDARY_TOLERANCE_RATIO};

/// An axis aligned cube, described by its minimum corner and edge length
#[derive(Default, Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Cube {
    pub min_position: V3c<f32>,
    pub size: f32,
}

impl Cube {
    pub fn new(min_position: V3c<f32>, size: f32) -> Self {
        Self { min_position, size }
    }

    pub fn midpoint(&self) -> V3c<f32> {
        V3c::unit(self.size / 2.) + self.min_position
    }

    pub fn max_position(&self) -> V3c<f32> {
        self.min_position + V3c::unit(self.size)
    }

    /// Creates a bounding box within the area of the cube, for the given octant
    pub fn child_bounds_for(&self, octant: usize) -> Cube {
        let child_size = self.size / 2.;
        Cube {
            min_position: self.min_position + offset_region(octant) * child_size,
            size: child_size,
        }
    }

    /// The octant of the cube the given point falls into. Points on a mid-plane
    /// belong to the upper octant.
    pub fn octant_of(&self, point: &V3c<f32>) -> usize {
        hash_region(&(*point - self.min_position), self.size)
    }

    /// Inclusive containment test, with a tolerance relative to the size of the cube
    pub fn contains_point(&self, point: &V3c<f32>) -> bool {
        let edges_epsilon = self.size * BOUNDARY_TOLERANCE_RATIO;
        let max_position = self.max_position();
        (point.x >= self.min_position.x - edges_epsilon)
            && (point.x <= max_position.x + edges_epsilon)
            && (point.y >= self.min_position.y - edges_epsilon)
            && (point.y <= max_position.y + edges_epsilon)
            && (point.z >= self.min_position.z - edges_epsilon)
            && (point.z <= max_position.z + edges_epsilon)
    }

    /// The smallest cube at the minimum corner of the given bounding box that contains all of it
    /// * `min` - minimum corner of the bounding box
    /// * `max` - maximum corner of the bounding box
    pub fn enclosing(min: V3c<f32>, max: V3c<f32>) -> Cube {
        Cube {
            min_position: min,
            size: (max - min).max_component(),
        }
    }
}
