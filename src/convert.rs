#[cfg(feature = "obj_support")]
mod obj;


#[cfg(feature = "obj_support")]
pub use obj::ObjMesh;

use crate::octree::{
    Cube, Node, Octree, OctreeConfig, OctreeError, StorePaths, Triangle, V3c, ROOT_HANDLE,
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

///####################################################################################
/// Mesh data
///####################################################################################
/// One named polygon mesh, in flat buffers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshShape {
    pub name: String,

    /// Vertex positions as consecutive x, y, z triples
    pub positions: Vec<f32>,

    /// Vertex indices of the faces, face after face
    pub indices: Vec<u32>,

    /// The number of vertices of each face; empty if every face is a triangle
    pub face_arities: Vec<u32>,
}

impl MeshShape {
    fn vertex(&self, index: u32) -> Option<V3c<f32>> {
        let start = index as usize * 3;
        let position = self.positions.get(start..start + 3)?;
        Some(V3c::new(position[0], position[1], position[2]))
    }

    /// Triangulates every face of the shape as a fan around its first vertex.
    /// * `out` - the triangles are appended to it
    /// * Returns with the number of faces skipped because of invalid indices
    fn triangulate_into(&self, out: &mut Vec<Triangle>) -> usize {
        let mut skipped = 0;
        let mut face_start = 0;
        let face_count = if self.face_arities.is_empty() {
            self.indices.len() / 3
        } else {
            self.face_arities.len()
        };
        for face in 0..face_count {
            let arity = self.face_arities.get(face).copied().unwrap_or(3) as usize;
            let face_indices = self.indices.get(face_start..face_start + arity);
            face_start += arity;

            let Some(corners) = face_indices.and_then(|indices| {
                indices
                    .iter()
                    .map(|index| self.vertex(*index))
                    .collect::<Option<Vec<_>>>()
            }) else {
                skipped += 1;
                continue;
            };
            for i in 1..corners.len().saturating_sub(1) {
                out.push(Triangle::new(corners[0], corners[i], corners[i + 1]));
            }
        }
        skipped
    }
}

/// A polygon mesh made of one or more shapes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub shapes: Vec<MeshShape>,
}

impl MeshData {
    /// Every face of every shape, fan-triangulated
    pub fn triangles(&self) -> Vec<Triangle> {
        let mut triangles = Vec::new();
        let skipped: usize = self
            .shapes
            .iter()
            .map(|shape| shape.triangulate_into(&mut triangles))
            .sum();
        if 0 < skipped {
            tracing::warn!("Skipped {} faces referring to missing vertices", skipped);
        }
        triangles
    }

    /// An axis aligned cube made of 6 quads, wound counter-clockwise when seen from outside
    pub fn cube(min_position: V3c<f32>, size: f32) -> Self {
        let mut positions = Vec::with_capacity(24);
        for corner in 0..8 {
            let offset = V3c::new(
                (corner & 1) as f32,
                ((corner >> 1) & 1) as f32,
                ((corner >> 2) & 1) as f32,
            );
            let position = min_position + offset * size;
            positions.extend_from_slice(&[position.x, position.y, position.z]);
        }
        // corner index is x + 2y + 4z
        #[rustfmt::skip]
        let indices = vec![
            0, 4, 6, 2, // -x
            1, 3, 7, 5, // +x
            0, 1, 5, 4, // -y
            2, 6, 7, 3, // +y
            0, 2, 3, 1, // -z
            4, 5, 7, 6, // +z
        ];
        Self {
            shapes: vec![MeshShape {
                name: "cube".to_string(),
                positions,
                indices,
                face_arities: vec![4; 6],
            }],
        }
    }
}

/// Anything a mesh can be loaded from
pub trait MeshSource {
    fn load(&self) -> Result<MeshData, OctreeError>;
}

impl MeshSource for MeshData {
    fn load(&self) -> Result<MeshData, OctreeError> {
        Ok(self.clone())
    }
}

/// Placement of a mesh in world space: stored vertices are `scale * v`,
/// reported hits are `scale * v + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct MeshTransform {
    pub offset: V3c<f32>,
    pub scale: f32,
}

impl Default for MeshTransform {
    fn default() -> Self {
        Self {
            offset: V3c::default(),
            scale: 1.,
        }
    }
}

impl MeshTransform {
    pub fn new(offset: V3c<f32>, scale: f32) -> Self {
        Self { offset, scale }
    }
}

///####################################################################################
/// Octree
///####################################################################################
impl Octree {
    /// Builds an in-memory octree from the given mesh
    pub fn from_mesh(
        mesh: &MeshData,
        transform: &MeshTransform,
        config: OctreeConfig,
    ) -> Result<Self, OctreeError> {
        let mut octree = Self::new(V3c::default(), 1., config)?;
        octree.load_model(mesh, transform)?;
        Ok(octree)
    }

    /// Fills an empty octree with the faces of the mesh. The root cell is replaced
    /// by the bounding cube of the scaled mesh.
    /// * `mesh` - the polygons to insert, faces with more than 3 vertices are fan-triangulated
    /// * `transform` - the scale is applied to the stored vertices, the offset at query time
    pub fn load_model(
        &mut self,
        mesh: &MeshData,
        transform: &MeshTransform,
    ) -> Result<(), OctreeError> {
        Self::validate_size(transform.scale)?;
        if ROOT_HANDLE != self.last_node() || 0 != self.last_triangle() {
            return Err(OctreeError::AlreadyBuilt);
        }

        let triangles: Vec<Triangle> = mesh
            .triangles()
            .iter()
            .map(|triangle| triangle.scaled(transform.scale))
            .collect();
        let Some((min_position, max_position)) = triangles
            .iter()
            .map(|triangle| (triangle.min_corner(), triangle.max_corner()))
            .reduce(|(min_a, max_a), (min_b, max_b)| (min_a.min(&min_b), max_a.max(&max_b)))
        else {
            return Err(OctreeError::EmptyMesh);
        };
        let root_bounds = Cube::enclosing(min_position, max_position);
        if !(root_bounds.size > 0. && root_bounds.min_position.is_finite()) {
            return Err(OctreeError::EmptyMesh);
        }

        tracing::info!(
            "Loading {} triangles into octree at {:?}, size {}",
            triangles.len(),
            root_bounds.min_position,
            root_bounds.size
        );
        *self.node_record_mut(ROOT_HANDLE)? = Node::new(root_bounds.min_position, root_bounds.size);
        self.offset = transform.offset;
        self.scale = transform.scale;
        for triangle in triangles.iter() {
            self.add_triangle(triangle, &triangle.face_normal())?;
        }
        tracing::info!(
            "Loaded model: {} nodes, {} triangles stored from {} inserted",
            self.last_node() + 1,
            self.stats.stored,
            self.stats.inserted
        );
        Ok(())
    }

    /// Opens the octree stored at the given paths, building it from the mesh source first
    /// if the files don't exist yet. A partially existing set of files is rebuilt;
    /// a failed build removes the files it created.
    /// * `source` - only loaded if the octree needs to be built
    /// * `transform` - placement of the mesh; the offset is applied to the opened octree
    pub fn open_or_build(
        paths: &StorePaths,
        source: &impl MeshSource,
        transform: &MeshTransform,
        config: OctreeConfig,
    ) -> Result<Self, OctreeError> {
        if Self::store_exists(paths) {
            let mut octree = Self::open_with_config(paths, config)?;
            octree.offset = transform.offset;
            octree.scale = transform.scale;
            return Ok(octree);
        }
        if paths.all().iter().any(|path| path.exists()) {
            tracing::warn!(
                "Incomplete octree store at {}, rebuilding it",
                paths.nodes.display()
            );
        }

        let mesh = source.load()?;
        Self::create(paths, V3c::default(), 1., config)
            .and_then(|mut octree| {
                octree.load_model(&mesh, transform)?;
                octree.finish_build()?;
                Ok(octree)
            })
            .map_err(|error| {
                tracing::warn!("Building octree at {} failed: {}", paths.nodes.display(), error);
                paths.remove_files();
                error
            })
    }
}
