use crate::{
    convert::{MeshData, MeshShape, MeshSource},
    octree::OctreeError,
};
use std::path::PathBuf;

/// A Wavefront OBJ file on disk. Polygons are kept as they are, and triangulated on ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjMesh {
    pub path: PathBuf,
}

impl ObjMesh {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MeshSource for ObjMesh {
    fn load(&self) -> Result<MeshData, OctreeError> {
        let load_options = tobj::LoadOptions {
            single_index: true,
            triangulate: false,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };
        let (models, _materials) = tobj::load_obj(&self.path, &load_options)
            .map_err(|err| OctreeError::MeshLoad(format!("{}: {}", self.path.display(), err)))?;
        tracing::debug!(
            "Loaded {} shapes from {}",
            models.len(),
            self.path.display()
        );
        Ok(MeshData {
            shapes: models
                .into_iter()
                .map(|model| MeshShape {
                    name: model.name,
                    positions: model.mesh.positions,
                    indices: model.mesh.indices,
                    face_arities: model.mesh.face_arities,
                })
                .collect(),
        })
    }
}
