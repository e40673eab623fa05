pub mod vector;


pub use vector::V3c;

/// Tolerance used when classifying points against cell boundaries,
/// relative to the size of the cell in question
pub(crate) const BOUNDARY_TOLERANCE_RATIO: f32 = 0.00001;

/// Replacement value for exactly-zero ray direction components in slab tests
pub(crate) const FLOAT_ERROR_TOLERANCE: f32 = 0.00001;

///####################################################################################
/// Octant
///####################################################################################
/// Offset of the given octant inside its parent, in units of the child size.
/// The octant index is bit-packed as `x + 2 * y + 4 * z`
pub fn offset_region(octant: usize) -> V3c<f32> {
    debug_assert!(octant < 8, "Invalid region hash provided for spatial reference!");
    V3c::new(
        (octant & 0b001) as f32,
        ((octant & 0b010) >> 1) as f32,
        ((octant & 0b100) >> 2) as f32,
    )
}

/// Each Node is separated to 8 Octants based on their relative position inside the Nodes occupying space.
/// The hash function assigns an index for each octant, so every child Node can be indexed in a well defined manner
/// * `offset` - position relative to the minimum corner of the cell
/// * `size` - edge length of the cell
pub fn hash_region(offset: &V3c<f32>, size: f32) -> usize {
    let midpoint = V3c::unit(size / 2.);
    (offset.x >= midpoint.x) as usize
        + (offset.y >= midpoint.y) as usize * 2
        + (offset.z >= midpoint.z) as usize * 4
}

/// calculates the distance between the line, and the plane both described by a ray
/// plane: normal, and a point on plane, line: origin and direction
/// return the distance from the line origin to the direction of it, if they have an intersection
pub fn plane_line_intersection_distance(
    plane_point: &V3c<f32>,
    plane_normal: &V3c<f32>,
    line_origin: &V3c<f32>,
    line_direction: &V3c<f32>,
) -> Option<f32> {
    let origins_diff = *plane_point - *line_origin;
    let plane_line_dot_to_plane = origins_diff.dot(plane_normal);
    let directions_dot = line_direction.dot(plane_normal);
    if 0. == directions_dot {
        // line and plane is paralell
        if 0. == plane_line_dot_to_plane {
            // The distance is zero because the origin is already on the plane
            return Some(0.);
        }
        return None;
    }
    Some(plane_line_dot_to_plane / directions_dot)
}
