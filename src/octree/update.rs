
use crate::octree::{
    detail::child_octant_for,
    types::{Node, NodeHandle, OctreeError, ROOT_HANDLE},
    Cube, Octree, Triangle, V3c,
};
use crate::spatial::split::split_triangle;

impl Octree {
    /// Appends a new node to the node store, with half the size of its parent
    /// * `parent_size` - edge length of the parent cell
    /// * `loc` - minimum corner of the new cell
    /// * Returns with the handle of the new node
    pub fn allocate_node(
        &mut self,
        parent_size: f32,
        loc: V3c<f32>,
    ) -> Result<NodeHandle, OctreeError> {
        if self.nodes.len() >= NodeHandle::MAX as usize {
            return Err(OctreeError::InvalidHandle(self.nodes.len() as i64));
        }
        let handle = self.nodes.push(Node::new(loc, parent_size / 2.))?;
        Ok(handle as NodeHandle)
    }

    /// Inserts the triangle into the octree, starting from the root
    /// * `triangle` - the triangle to insert, in the coordinate space of the octree
    /// * `normal` - the normal stored for the triangle and every fragment of it
    /// * Returns with the handle of the node the insertion stopped at
    pub fn add_triangle(
        &mut self,
        triangle: &Triangle,
        normal: &V3c<f32>,
    ) -> Result<NodeHandle, OctreeError> {
        self.stats.inserted += 1;
        self.insert(triangle, normal, ROOT_HANDLE, 0, None)
    }

    /// Inserts the triangle into the octree, starting from the given node
    /// * `start_node` - the node to start the descent from
    /// * `depth` - the depth of `start_node` inside the octree
    pub fn add_triangle_from(
        &mut self,
        triangle: &Triangle,
        normal: &V3c<f32>,
        start_node: NodeHandle,
        depth: u32,
    ) -> Result<NodeHandle, OctreeError> {
        self.insert(triangle, normal, start_node, depth, None)
    }

    /// Descends with the triangle while it fits into a single child octant, then either
    /// stores it or splits it by the mid-planes of the node it stopped at,
    /// inserting each fragment from that node again. A triangle is only dropped
    /// when its node is full at `max_depth`, or when a fragment can't leave a full node.
    /// * `split_at` - the node the triangle is a fragment of, if any. A fragment which
    ///   can not descend from there is stored without splitting it again.
    fn insert(
        &mut self,
        triangle: &Triangle,
        normal: &V3c<f32>,
        start_node: NodeHandle,
        depth: u32,
        split_at: Option<NodeHandle>,
    ) -> Result<NodeHandle, OctreeError> {
        if triangle.is_degenerate() {
            self.stats.degenerate += 1;
            return Ok(start_node);
        }

        let mut current_node = start_node;
        let mut current_depth = depth;
        while current_depth < self.config.max_depth {
            let node = *self.node_record(current_node)?;
            let bounds = Cube::new(node.loc, node.size);
            let Some(octant) = child_octant_for(&bounds, triangle) else {
                break;
            };
            current_node = match node.child(octant) {
                Some(child) => child,
                None => {
                    let child_bounds = bounds.child_bounds_for(octant);
                    let child = self.allocate_node(node.size, child_bounds.min_position)?;
                    self.node_record_mut(current_node)?.children[octant] = child;
                    child
                }
            };
            current_depth += 1;
        }

        // A full node pushes fragments into its children as long as there are levels left,
        // oversized triangles are only split above `max_split_depth`
        let node = *self.node_record(current_node)?;
        let oversized = triangle.largest_side() > node.size / 2.;
        let split_for_room = node.is_full() && current_depth < self.config.max_depth;
        let split_for_size = oversized && current_depth < self.config.max_split_depth;
        if (split_for_room || split_for_size) && split_at != Some(current_node) {
            let mut fragments = Vec::new();
            split_triangle(triangle, &Cube::new(node.loc, node.size), &mut fragments);
            if fragments.len() > 1 {
                self.stats.fragments += fragments.len() as u64;
                for fragment in fragments.iter() {
                    self.insert(
                        fragment,
                        normal,
                        current_node,
                        current_depth,
                        Some(current_node),
                    )?;
                }
                return Ok(current_node);
            }
        }
        if self.store_triangle(current_node, triangle, normal)? && oversized {
            self.stats.stored_unsplit += 1;
        }
        Ok(current_node)
    }

    /// Appends the triangle and its normal to the stores, and registers it in the given node.
    /// If the node is already full, the triangle is dropped.
    /// * Returns with true if the triangle was stored
    pub(crate) fn store_triangle(
        &mut self,
        node: NodeHandle,
        triangle: &Triangle,
        normal: &V3c<f32>,
    ) -> Result<bool, OctreeError> {
        if self.node_record(node)?.is_full() {
            self.stats.dropped += 1;
            tracing::trace!("Dropped triangle at full node {}", node);
            return Ok(false);
        }
        let triangle_handle = self.triangles.push(*triangle)?;
        let normal_handle = self.normals.push(*normal)?;
        debug_assert_eq!(triangle_handle, normal_handle);

        let node = self.node_record_mut(node)?;
        node.triangles[node.triangle_count as usize] = triangle_handle as NodeHandle;
        node.triangle_count += 1;
        self.stats.stored += 1;
        Ok(true)
    }
}
