use crate::spatial::math::V3c;
use bytemuck::{Pod, Zeroable};
use std::path::{Path, PathBuf};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Index of a record inside one of the stores of an octree
pub type NodeHandle = i32;

/// Marks an absent child or an unused triangle slot
pub const EMPTY_HANDLE: NodeHandle = -1;

/// The root is always the first record of the node store
pub const ROOT_HANDLE: NodeHandle = 0;

/// The maximum number of triangles a single node may own
pub const MAX_TRIS: usize = 20;

/// error types during usage or creation of the octree
#[derive(Debug, thiserror::Error)]
pub enum OctreeError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed store at {path}: {reason}")]
    CorruptStore { path: PathBuf, reason: String },
    #[error("The store is opened read-only")]
    ReadOnlyStore,
    #[error("No record under handle {0}")]
    InvalidHandle(i64),
    #[error("Unable to load mesh: {0}")]
    MeshLoad(String),
    #[error("The mesh contains no usable triangles")]
    EmptyMesh,
    #[error("Invalid octree size: {0}")]
    InvalidSize(f32),
    #[error("A model can only be loaded into an empty octree")]
    AlreadyBuilt,
}

impl OctreeError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> OctreeError + '_ {
        move |source| OctreeError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path, reason: impl Into<String>) -> OctreeError {
        OctreeError::CorruptStore {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

///####################################################################################
/// Node
///####################################################################################
/// One cell of the octree, stored as a fixed size record in the node file
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Node {
    /// Edge length of the cell; records with a size of 0 are unused
    pub size: f32,

    /// Minimum corner of the cell
    pub loc: V3c<f32>,

    /// Handles of the child nodes, ordered by octant
    pub children: [NodeHandle; 8],

    /// Handles of the triangles owned by this node, the first `triangle_count` are valid
    pub triangles: [NodeHandle; MAX_TRIS],
    pub triangle_count: u32,
}

impl Node {
    pub(crate) fn new(loc: V3c<f32>, size: f32) -> Self {
        Self {
            size,
            loc,
            children: [EMPTY_HANDLE; 8],
            triangles: [EMPTY_HANDLE; MAX_TRIS],
            triangle_count: 0,
        }
    }

    pub fn child(&self, octant: usize) -> Option<NodeHandle> {
        let child = self.children[octant];
        (child != EMPTY_HANDLE).then_some(child)
    }

    pub fn has_children(&self) -> bool {
        self.children.iter().any(|c| *c != EMPTY_HANDLE)
    }

    /// The valid triangle handles owned by the node
    pub fn triangle_handles(&self) -> &[NodeHandle] {
        &self.triangles[..(self.triangle_count as usize).min(MAX_TRIS)]
    }

    pub fn is_full(&self) -> bool {
        self.triangle_count as usize >= MAX_TRIS
    }
}

///####################################################################################
/// Configuration
///####################################################################################
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct OctreeConfig {
    /// The number of records the backing files grow by when full
    pub growth_records: usize,

    /// No node is created deeper than this
    pub max_depth: u32,

    /// Triangles are not split below this depth, but stored in the node they stopped at
    pub max_split_depth: u32,

    /// Upper bound on the number of marching steps a single ray may take in one octree
    pub max_march_steps: u32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            growth_records: 4096,
            max_depth: 16,
            max_split_depth: 5,
            max_march_steps: 100_000,
        }
    }
}

impl OctreeConfig {
    pub fn with_growth_records(mut self, growth_records: usize) -> Self {
        self.growth_records = growth_records.max(1);
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_split_depth(mut self, max_split_depth: u32) -> Self {
        self.max_split_depth = max_split_depth;
        self
    }

    pub fn with_max_march_steps(mut self, max_march_steps: u32) -> Self {
        self.max_march_steps = max_march_steps;
        self
    }
}

/// Counters collected while inserting triangles
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct BuildStats {
    /// Triangles given to `add_triangle`
    pub inserted: u64,

    /// Triangles (or fragments of them) written into the triangle store
    pub stored: u64,

    /// Fragments produced by splitting
    pub fragments: u64,

    /// Triangles lost because their node was already full
    pub dropped: u64,

    /// Triangles stored without splitting because of the depth bound or lack of progress
    pub stored_unsplit: u64,

    /// Degenerate triangles ignored
    pub degenerate: u64,
}

/// The three sibling files backing a persistent octree
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct StorePaths {
    pub nodes: PathBuf,
    pub triangles: PathBuf,
    pub normals: PathBuf,
}

impl StorePaths {
    pub fn new(
        nodes: impl Into<PathBuf>,
        triangles: impl Into<PathBuf>,
        normals: impl Into<PathBuf>,
    ) -> Self {
        Self {
            nodes: nodes.into(),
            triangles: triangles.into(),
            normals: normals.into(),
        }
    }

    /// `<stem>.nodes`, `<stem>.tris` and `<stem>.norms` inside the given directory
    pub fn in_directory(directory: impl AsRef<Path>, stem: &str) -> Self {
        let directory = directory.as_ref();
        Self {
            nodes: directory.join(format!("{stem}.nodes")),
            triangles: directory.join(format!("{stem}.tris")),
            normals: directory.join(format!("{stem}.norms")),
        }
    }

    pub(crate) fn all(&self) -> [&Path; 3] {
        [&self.nodes, &self.triangles, &self.normals]
    }

    /// Deletes whichever of the three files exist, so no partial store is left behind
    pub(crate) fn remove_files(&self) {
        for path in self.all() {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!("Removed store file {}", path.display()),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => tracing::warn!("Unable to remove {}: {}", path.display(), error),
            }
        }
    }
}
