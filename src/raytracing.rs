mod raytracing_on_cpu;
mod router;
mod stream;
pub mod types;
mod worker_pool;

#[cfg(test)]
mod tests;

pub use crate::spatial::raytracing::Ray;
pub use router::fire_ray;
pub use stream::{weave_surface, Frame, FrameStreamer, PublishedFrame, SurfaceMesh};
pub use types::{
    Descent, MarchState, PixelSample, RayStep, StreamConfig, SurfaceHit, TriangleHit, Viewport,
};
pub use worker_pool::WorkerPool;
