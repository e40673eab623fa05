use crate::octree::{Cube, NodeHandle, V3c};
use std::collections::HashSet;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// An intersection of a ray with a stored triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Ray parameter of the hit, measured from the origin of the ray
    pub distance: f32,
    pub point: V3c<f32>,
    pub normal: V3c<f32>,
    pub triangle: NodeHandle,
    /// The node owning the triangle
    pub node: NodeHandle,
}

/// Outcome of descending the octree with a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Descent {
    /// The point is outside of the root cell
    Outside,

    /// The ray hit a triangle and no other triangle can be closer
    Hit(TriangleHit),

    /// The point is inside an empty cell: the octant of `node` which has no child
    Gap { node: NodeHandle, bounds: Cube },
}

/// Result of advancing a marching cursor by one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayStep {
    /// The new position of the cursor, in world space
    pub position: V3c<f32>,

    /// The confirmed hit, in world space
    pub hit: Option<TriangleHit>,

    /// True if the ray has nothing more to hit inside the octree
    pub missed: bool,
}

/// The state of one ray marching through one octree.
/// Every query owns its own state, so queries can run in parallel on a shared octree.
#[derive(Debug, Clone, Default)]
pub struct MarchState {
    /// Nodes whose triangles were already tested
    pub(crate) checked: HashSet<NodeHandle>,

    /// The nearest hit found so far, not yet confirmed to be the nearest overall
    pub(crate) candidate: Option<TriangleHit>,

    /// Ray parameter the cursor advanced to
    pub(crate) distance: f32,

    pub(crate) steps: u32,
}

impl MarchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checked(&self) -> &HashSet<NodeHandle> {
        &self.checked
    }

    /// How far along the ray the cursor advanced
    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }
}

/// The nearest surface along a ray, across multiple octrees
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct SurfaceHit {
    pub point: V3c<f32>,
    pub normal: V3c<f32>,
    pub distance: f32,
    /// Index of the octree the surface belongs to
    pub octree: usize,
}

///####################################################################################
/// Viewport
///####################################################################################
/// A pinhole camera producing one ray per pixel
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Viewport {
    pub origin: V3c<f32>,
    pub direction: V3c<f32>,
    pub up: V3c<f32>,
    /// Horizontal field of view in radians
    pub fov_horizontal: f32,
    /// Vertical field of view in radians
    pub fov_vertical: f32,
    pub focal_length: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            origin: V3c::unit(1.),
            direction: V3c::unit(-1.).normalized(),
            up: V3c::new(0., 1., 0.),
            fov_horizontal: 60_f32.to_radians(),
            fov_vertical: 60_f32.to_radians(),
            focal_length: 0.1,
        }
    }
}

/// Parameters of rendering a frame of samples
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct StreamConfig {
    pub width: usize,
    pub height: usize,

    /// The frame is processed in `x_divisions * y_divisions` blocks
    pub x_divisions: usize,
    pub y_divisions: usize,

    /// Number of worker threads
    pub threads: usize,

    /// Direction pointing towards the light, used to shade samples
    pub light_direction: V3c<f32>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            x_divisions: 4,
            y_divisions: 4,
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            light_direction: V3c::new(-1., -1., 0.).normalized(),
        }
    }
}

impl StreamConfig {
    pub fn with_resolution(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_divisions(mut self, x_divisions: usize, y_divisions: usize) -> Self {
        self.x_divisions = x_divisions.max(1);
        self.y_divisions = y_divisions.max(1);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_light_direction(mut self, light_direction: V3c<f32>) -> Self {
        self.light_direction = light_direction.normalized();
        self
    }
}

/// The result of one ray of a frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PixelSample {
    pub hit: Option<SurfaceHit>,
    /// Diffuse light intensity at the hit, 0 when nothing was hit
    pub light: f32,
}
