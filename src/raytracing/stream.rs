use crate::{
    octree::{Octree, V3c},
    raytracing::{
        router::fire_ray,
        types::{PixelSample, StreamConfig, Viewport},
        worker_pool::WorkerPool,
    },
    spatial::raytracing::Ray,
};
use crossbeam::{channel::unbounded, sync::WaitGroup};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

impl Viewport {
    /// A viewport at `origin`, looking at `target`, with the default field of view
    pub fn looking_at(origin: V3c<f32>, target: V3c<f32>) -> Self {
        Self {
            origin,
            direction: (target - origin).normalized(),
            ..Default::default()
        }
    }

    /// The ray through the given point of the image plane
    /// * `x` - horizontal position on the image, 0 at the left edge, 1 at the right edge
    /// * `y` - vertical position on the image, 0 at the top edge, 1 at the bottom edge
    pub fn ray_for(&self, x: f32, y: f32) -> Ray {
        let forward = self.direction.normalized();
        let right = forward.cross(self.up).normalized();
        let up = right.cross(forward).normalized();
        let center = self.origin + forward * self.focal_length;
        let half_height = self.focal_length * (self.fov_vertical / 2.).tan();
        let half_width = self.focal_length * (self.fov_horizontal / 2.).tan();
        let top_left = center - right * half_width + up * half_height;
        let target = top_left + right * (2. * half_width * x) - up * (2. * half_height * y);
        Ray::towards(self.origin, target)
    }
}

/// A grid of samples, one for each pixel, stored row by row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub samples: Vec<PixelSample>,
}

impl Frame {
    pub fn sample(&self, x: usize, y: usize) -> Option<&PixelSample> {
        if x >= self.width {
            return None;
        }
        self.samples.get(y * self.width + x)
    }
}

/// The last finished frame, handed over from the streamer to its consumer.
/// The consumer polls it, and takes the frame when it is ready for it.
#[derive(Debug, Default)]
pub struct PublishedFrame {
    frame: Mutex<Option<Frame>>,
    available: AtomicBool,
}

impl PublishedFrame {
    /// Replaces the published frame, overwriting one which was not yet taken
    pub fn publish(&self, frame: Frame) {
        let mut published = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
        *published = Some(frame);
        self.available.store(true, Ordering::Release);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Takes the published frame if there is one, clearing the availability flag
    pub fn take(&self) -> Option<Frame> {
        if !self.available.swap(false, Ordering::AcqRel) {
            return None;
        }
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Renders frames of samples from a set of octrees, block by block on a worker pool
pub struct FrameStreamer {
    octrees: Arc<Vec<Octree>>,
    viewport: Viewport,
    config: StreamConfig,
    pool: WorkerPool,
    published: Arc<PublishedFrame>,
}

/// A rectangular part of the frame: `[start_x, end_x) x [start_y, end_y)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    start_x: usize,
    end_x: usize,
    start_y: usize,
    end_y: usize,
}

impl FrameStreamer {
    pub fn new(octrees: Vec<Octree>, viewport: Viewport, config: StreamConfig) -> Self {
        Self {
            octrees: Arc::new(octrees),
            viewport,
            pool: WorkerPool::new(config.threads),
            config,
            published: Arc::new(PublishedFrame::default()),
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn octrees(&self) -> &[Octree] {
        &self.octrees
    }

    /// The hand-over point of finished frames, which can be shared with the consumer
    pub fn published(&self) -> Arc<PublishedFrame> {
        self.published.clone()
    }

    fn blocks(&self) -> Vec<Block> {
        let block_width = self.config.width.div_ceil(self.config.x_divisions.max(1)).max(1);
        let block_height = self.config.height.div_ceil(self.config.y_divisions.max(1)).max(1);
        let mut blocks = Vec::new();
        for start_y in (0..self.config.height).step_by(block_height) {
            for start_x in (0..self.config.width).step_by(block_width) {
                blocks.push(Block {
                    start_x,
                    end_x: (start_x + block_width).min(self.config.width),
                    start_y,
                    end_y: (start_y + block_height).min(self.config.height),
                });
            }
        }
        blocks
    }

    /// Fires a ray for every pixel of the frame, and publishes the result once every block is done.
    /// The published frame is never partially updated.
    pub fn refresh(&self) {
        let (result_sender, result_receiver) = unbounded::<(Block, Vec<PixelSample>)>();
        let wait_group = WaitGroup::new();
        for block in self.blocks() {
            let octrees = self.octrees.clone();
            let viewport = self.viewport;
            let config = self.config;
            let result_sender = result_sender.clone();
            let wait_group = wait_group.clone();
            self.pool.execute(move || {
                let samples = sample_block(&octrees, &viewport, &config, &block);
                // the receiver outlives every job of the frame
                let _ = result_sender.send((block, samples));
                drop(wait_group);
            });
        }
        drop(result_sender);
        wait_group.wait();

        let mut back_buffer = Frame {
            width: self.config.width,
            height: self.config.height,
            samples: vec![PixelSample::default(); self.config.width * self.config.height],
        };
        for (block, samples) in result_receiver.try_iter() {
            let mut samples = samples.into_iter();
            for y in block.start_y..block.end_y {
                for x in block.start_x..block.end_x {
                    if let Some(sample) = samples.next() {
                        back_buffer.samples[y * self.config.width + x] = sample;
                    }
                }
            }
        }
        tracing::debug!(
            "Frame of {}x{} refreshed",
            self.config.width,
            self.config.height
        );
        self.published.publish(back_buffer);
    }
}

/// Samples every pixel of the block, row by row
fn sample_block(
    octrees: &[Octree],
    viewport: &Viewport,
    config: &StreamConfig,
    block: &Block,
) -> Vec<PixelSample> {
    let mut samples = Vec::with_capacity((block.end_x - block.start_x) * (block.end_y - block.start_y));
    for y in block.start_y..block.end_y {
        for x in block.start_x..block.end_x {
            let x_fraction = (x as f32 + 0.5) / config.width as f32;
            let y_fraction = (y as f32 + 0.5) / config.height as f32;
            let hit = fire_ray(octrees, &viewport.ray_for(x_fraction, y_fraction));
            let light = hit
                .map(|hit| hit.normal.dot(&config.light_direction).max(0.))
                .unwrap_or(0.);
            samples.push(PixelSample { hit, light });
        }
    }
    samples
}

/// Triangles woven from the hits of neighbouring pixels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMesh {
    /// Three consecutive positions make up a triangle
    pub positions: Vec<V3c<f32>>,
    pub normals: Vec<V3c<f32>>,
    pub light: Vec<f32>,
}

impl SurfaceMesh {
    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// Converts a frame of samples into a triangle mesh: every quad of neighbouring pixels
/// yields up to two triangles, one for each half whose three corners all hit a surface
pub fn weave_surface(frame: &Frame) -> SurfaceMesh {
    let mut mesh = SurfaceMesh::default();
    if frame.width < 2 || frame.height < 2 {
        return mesh;
    }
    let mut emit = |corners: [(usize, usize); 3]| {
        let samples = corners.map(|(x, y)| frame.sample(x, y).copied().unwrap_or_default());
        if samples.iter().all(|sample| sample.hit.is_some()) {
            for sample in samples.iter() {
                if let Some(hit) = sample.hit {
                    mesh.positions.push(hit.point);
                    mesh.normals.push(hit.normal);
                    mesh.light.push(sample.light);
                }
            }
        }
    };
    for y in 0..frame.height - 1 {
        for x in 0..frame.width - 1 {
            emit([(x, y), (x + 1, y), (x, y + 1)]);
            emit([(x + 1, y), (x + 1, y + 1), (x, y + 1)]);
        }
    }
    mesh
}
