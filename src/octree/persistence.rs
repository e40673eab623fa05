use crate::octree::{
    types::{BuildStats, NodeHandle, OctreeConfig, OctreeError, StorePaths, EMPTY_HANDLE, MAX_TRIS},
    Octree, V3c,
};
use crate::record_store::RecordStore;

impl Octree {
    /// Creates the three backing files of an octree, overwriting any previous content,
    /// and writes the root node with the given bounds into them
    pub fn create(
        paths: &StorePaths,
        loc: V3c<f32>,
        size: f32,
        config: OctreeConfig,
    ) -> Result<Self, OctreeError> {
        Self::validate_size(size)?;
        let mut octree = Self {
            nodes: RecordStore::create(&paths.nodes, config.growth_records)?,
            triangles: RecordStore::create(&paths.triangles, config.growth_records)?,
            normals: RecordStore::create(&paths.normals, config.growth_records)?,
            offset: V3c::default(),
            scale: 1.,
            config,
            stats: BuildStats::default(),
        };
        octree.seed(loc, size)?;
        Ok(octree)
    }

    /// Opens an already built octree for queries, with the default configuration
    pub fn open(paths: &StorePaths) -> Result<Self, OctreeError> {
        Self::open_with_config(paths, OctreeConfig::default())
    }

    /// Opens an already built octree read-only. The node and triangle counts are recovered
    /// from the stored records, and every link between them is validated.
    pub fn open_with_config(paths: &StorePaths, config: OctreeConfig) -> Result<Self, OctreeError> {
        let mut octree = Self {
            nodes: RecordStore::open_read_only(&paths.nodes)?,
            triangles: RecordStore::open_read_only(&paths.triangles)?,
            normals: RecordStore::open_read_only(&paths.normals)?,
            offset: V3c::default(),
            scale: 1.,
            config,
            stats: BuildStats::default(),
        };
        octree.recover_counts(paths)?;
        octree.validate(paths)?;
        tracing::debug!(
            "Opened octree {} with {} nodes and {} triangles",
            paths.nodes.display(),
            octree.last_node() + 1,
            octree.last_triangle()
        );
        Ok(octree)
    }

    /// True if all three backing files exist
    pub fn store_exists(paths: &StorePaths) -> bool {
        paths.all().iter().all(|path| path.exists())
    }

    /// Flushes every store to disk, truncates the files to the used records,
    /// and turns the octree read-only. Nothing happens for in-memory octrees.
    pub fn finish_build(&mut self) -> Result<(), OctreeError> {
        self.nodes.finish()?;
        self.triangles.finish()?;
        self.normals.finish()?;
        tracing::info!(
            "Finished octree build: {} nodes, {} triangles ({} inserted, {} fragments, {} degenerate)",
            self.last_node() + 1,
            self.last_triangle(),
            self.stats.inserted,
            self.stats.fragments,
            self.stats.degenerate
        );
        if 0 < self.stats.dropped {
            tracing::warn!(
                "{} triangles were dropped because their cells were full; \
                 consider a larger split depth",
                self.stats.dropped
            );
        }
        Ok(())
    }

    /// Flushes every store to disk without finishing the build
    pub fn flush(&self) -> Result<(), OctreeError> {
        self.nodes.flush()?;
        self.triangles.flush()?;
        self.normals.flush()
    }

    /// The live nodes are the leading records with a positive size; the live triangles
    /// are the ones up to the largest handle referenced by a live node
    fn recover_counts(&mut self, paths: &StorePaths) -> Result<(), OctreeError> {
        let node_count = self
            .nodes
            .records()
            .iter()
            .take_while(|node| node.size > 0.)
            .count();
        if 0 == node_count {
            return Err(OctreeError::corrupt(&paths.nodes, "missing root node"));
        }
        self.nodes.limit(node_count);

        let triangle_count = self
            .nodes
            .records()
            .iter()
            .flat_map(|node| node.triangle_handles().iter().copied())
            .max()
            .unwrap_or(0)
            .max(0) as usize
            + 1;
        if self.triangles.len() < triangle_count {
            return Err(OctreeError::corrupt(
                &paths.triangles,
                format!(
                    "{} triangles are referenced but only {} are stored",
                    triangle_count,
                    self.triangles.len()
                ),
            ));
        }
        if self.normals.len() < triangle_count {
            return Err(OctreeError::corrupt(
                &paths.normals,
                format!(
                    "{} normals are referenced but only {} are stored",
                    triangle_count,
                    self.normals.len()
                ),
            ));
        }
        self.triangles.limit(triangle_count);
        self.normals.limit(triangle_count);
        Ok(())
    }

    /// Every child handle must point after its parent, which rules out cycles;
    /// every triangle handle must resolve to a stored triangle
    fn validate(&self, paths: &StorePaths) -> Result<(), OctreeError> {
        let node_count = self.nodes.len();
        let triangle_count = self.triangles.len();
        for (index, node) in self.nodes.records().iter().enumerate() {
            if !node.size.is_finite() || !node.loc.is_finite() {
                return Err(OctreeError::corrupt(
                    &paths.nodes,
                    format!("node {} has invalid bounds", index),
                ));
            }
            for child in node.children.iter().filter(|c| **c != EMPTY_HANDLE) {
                if *child <= index as NodeHandle || *child as usize >= node_count {
                    return Err(OctreeError::corrupt(
                        &paths.nodes,
                        format!("node {} has invalid child {}", index, child),
                    ));
                }
            }
            if node.triangle_count as usize > MAX_TRIS {
                return Err(OctreeError::corrupt(
                    &paths.nodes,
                    format!(
                        "node {} claims {} triangles",
                        index, node.triangle_count
                    ),
                ));
            }
            for triangle in node.triangle_handles() {
                if *triangle < 1 || *triangle as usize >= triangle_count {
                    return Err(OctreeError::corrupt(
                        &paths.nodes,
                        format!("node {} has invalid triangle {}", index, triangle),
                    ));
                }
            }
        }
        Ok(())
    }
}
