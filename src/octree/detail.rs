use crate::octree::{Cube, Triangle, V3c};
use crate::spatial::{math::BOUNDARY_TOLERANCE_RATIO, split::PLANE_EPSILON};

///####################################################################################
/// Utility functions
///####################################################################################

/// Distance within which a vertex may be on either side of a boundary or mid-plane of the cell.
/// Never stricter than the splitter, so every fragment it emits fits an octant
fn boundary_tolerance(bounds: &Cube) -> f32 {
    (bounds.size * BOUNDARY_TOLERANCE_RATIO).max(PLANE_EPSILON)
}

/// Returns whether the given bound contains every vertex of the triangle
pub(in crate::octree) fn bound_contains(bounds: &Cube, triangle: &Triangle) -> bool {
    let tolerance = boundary_tolerance(bounds);
    let min_position = bounds.min_position - V3c::unit(tolerance);
    let max_position = bounds.max_position() + V3c::unit(tolerance);
    triangle.vertices.iter().all(|vertex| {
        (0..3).all(|axis| {
            min_position.axis(axis) <= vertex.axis(axis)
                && vertex.axis(axis) <= max_position.axis(axis)
        })
    })
}

/// Returns with the octant of the child which fully contains the given triangle, if there is one.
/// Vertices within tolerance of a mid-plane may belong to either adjacent octant;
/// when both would fit, the lower octant is chosen.
pub(in crate::octree) fn child_octant_for(bounds: &Cube, triangle: &Triangle) -> Option<usize> {
    if !bound_contains(bounds, triangle) {
        return None;
    }
    let midpoint = bounds.midpoint();
    let tolerance = boundary_tolerance(bounds);
    let mut octant = 0;
    for axis in 0..3 {
        let mid = midpoint.axis(axis);
        let fits_low = triangle
            .vertices
            .iter()
            .all(|v| v.axis(axis) <= mid + tolerance);
        let fits_high = triangle
            .vertices
            .iter()
            .all(|v| v.axis(axis) >= mid - tolerance);
        if fits_low {
            continue;
        }
        if !fits_high {
            return None;
        }
        octant |= 1 << axis;
    }
    Some(octant)
}
