pub mod types;

mod detail;
mod persistence;
mod update;


pub use crate::spatial::{math::V3c, Cube, Triangle};
pub use types::{
    BuildStats, Node, NodeHandle, OctreeConfig, OctreeError, StorePaths, EMPTY_HANDLE, MAX_TRIS,
    ROOT_HANDLE,
};

use crate::record_store::RecordStore;

/// Sparse octree of triangles. Nodes, triangles and normals are kept in three
/// append-only stores, either in memory or in memory mapped files, and refer to
/// each other only through integer handles.
/// Triangles are stored as `scale * vertex`; the world space `offset` is applied
/// when the octree is queried, so several octrees may share the same stores.
pub struct Octree {
    pub(crate) nodes: RecordStore<Node>,
    pub(crate) triangles: RecordStore<Triangle>,
    pub(crate) normals: RecordStore<V3c<f32>>,
    pub(crate) offset: V3c<f32>,
    pub(crate) scale: f32,
    pub(crate) config: OctreeConfig,
    pub(crate) stats: BuildStats,
}

impl std::fmt::Debug for Octree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Octree")
            .field("root_bounds", &self.root_bounds())
            .field("last_node", &self.last_node())
            .field("last_triangle", &self.last_triangle())
            .field("offset", &self.offset)
            .field("scale", &self.scale)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

///####################################################################################
/// Octree
///####################################################################################
impl Octree {
    /// creates an in-memory octree with a single root node
    /// * `loc` - minimum corner of the root cell
    /// * `size` - edge length of the root cell
    pub fn new(loc: V3c<f32>, size: f32, config: OctreeConfig) -> Result<Self, OctreeError> {
        Self::validate_size(size)?;
        let mut octree = Self {
            nodes: RecordStore::in_memory(config.growth_records),
            triangles: RecordStore::in_memory(config.growth_records),
            normals: RecordStore::in_memory(config.growth_records),
            offset: V3c::default(),
            scale: 1.,
            config,
            stats: BuildStats::default(),
        };
        octree.seed(loc, size)?;
        Ok(octree)
    }

    pub(crate) fn validate_size(size: f32) -> Result<(), OctreeError> {
        if !(size.is_finite() && size > 0.) {
            return Err(OctreeError::InvalidSize(size));
        }
        Ok(())
    }

    /// Writes the root node and the reserved triangle and normal records into empty stores
    pub(crate) fn seed(&mut self, loc: V3c<f32>, size: f32) -> Result<(), OctreeError> {
        debug_assert!(0 == self.nodes.len() && 0 == self.triangles.len());
        self.nodes.push(Node::new(loc, size))?;
        self.triangles.push(Triangle::default())?;
        self.normals.push(V3c::default())?;
        Ok(())
    }

    /// Sets the world space offset applied to the octree when it is queried
    pub fn with_offset(mut self, offset: V3c<f32>) -> Self {
        self.offset = offset;
        self
    }

    pub fn set_offset(&mut self, offset: V3c<f32>) {
        self.offset = offset;
    }

    pub fn offset(&self) -> V3c<f32> {
        self.offset
    }

    /// The uniform scale the stored geometry was ingested with
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn config(&self) -> &OctreeConfig {
        &self.config
    }

    pub fn build_stats(&self) -> &BuildStats {
        &self.stats
    }

    pub fn is_read_only(&self) -> bool {
        self.nodes.is_read_only()
    }

    /// Handle of the last allocated node
    pub fn last_node(&self) -> NodeHandle {
        self.nodes.len() as NodeHandle - 1
    }

    /// Handle of the last stored triangle, 0 if there are none
    pub fn last_triangle(&self) -> NodeHandle {
        (self.triangles.len() as NodeHandle - 1).max(0)
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        if handle < 0 {
            return None;
        }
        self.nodes.get(handle as usize)
    }

    /// The triangle under the given handle; handle 0 is reserved and never resolves
    pub fn triangle(&self, handle: NodeHandle) -> Option<&Triangle> {
        if handle <= 0 {
            return None;
        }
        self.triangles.get(handle as usize)
    }

    pub fn normal(&self, handle: NodeHandle) -> Option<&V3c<f32>> {
        if handle <= 0 {
            return None;
        }
        self.normals.get(handle as usize)
    }

    /// The cell of the root node, in the coordinate space of the stored geometry
    pub fn root_bounds(&self) -> Cube {
        self.node(ROOT_HANDLE)
            .map(|root| Cube::new(root.loc, root.size))
            .unwrap_or_default()
    }

    /// The cell of the root node, in world space
    pub fn world_bounds(&self) -> Cube {
        let bounds = self.root_bounds();
        Cube::new(bounds.min_position + self.offset, bounds.size)
    }

    pub(crate) fn node_record(&self, handle: NodeHandle) -> Result<&Node, OctreeError> {
        self.node(handle)
            .ok_or(OctreeError::InvalidHandle(handle as i64))
    }

    pub(crate) fn node_record_mut(&mut self, handle: NodeHandle) -> Result<&mut Node, OctreeError> {
        if handle < 0 {
            return Err(OctreeError::InvalidHandle(handle as i64));
        }
        self.nodes.get_mut(handle as usize)
    }
}
