use crate::{
    octree::{Octree, V3c},
    raytracing::types::{MarchState, SurfaceHit},
    spatial::raytracing::Ray,
};

/// The marching cursor of one octree
struct Cursor {
    position: V3c<f32>,
    state: MarchState,
    finished: bool,
}

/// Fires the ray through every given octree, and returns with the nearest surface it hits.
/// Always the cursor closest to the origin of the ray is advanced, so triangles are tested
/// in increasing distance across all octrees, without merging their geometry.
/// A hit is accepted once no unfinished cursor is closer to the origin than it.
/// * `octrees` - independently built octrees, possibly overlapping in world space
/// * `ray` - the ray in world space
pub fn fire_ray(octrees: &[Octree], ray: &Ray) -> Option<SurfaceHit> {
    let mut cursors: Vec<Cursor> = octrees
        .iter()
        .map(|_| Cursor {
            position: ray.origin,
            state: MarchState::new(),
            finished: false,
        })
        .collect();
    let mut nearest_hit: Option<SurfaceHit> = None;

    loop {
        let least_progressed = cursors
            .iter()
            .enumerate()
            .filter(|(_, cursor)| !cursor.finished)
            .min_by(|(_, a), (_, b)| a.state.distance().total_cmp(&b.state.distance()))
            .map(|(index, _)| index);
        let Some(index) = least_progressed else {
            break;
        };
        if nearest_hit.is_some_and(|hit| hit.distance <= cursors[index].state.distance()) {
            break;
        }

        let cursor = &mut cursors[index];
        let step = octrees[index].propagate_ray(&cursor.position, ray, &mut cursor.state);
        cursor.position = step.position;
        if let Some(hit) = step.hit {
            cursor.finished = true;
            if nearest_hit.map_or(true, |nearest| hit.distance < nearest.distance) {
                nearest_hit = Some(SurfaceHit {
                    point: hit.point,
                    normal: hit.normal,
                    distance: hit.distance,
                    octree: index,
                });
            }
        } else if step.missed {
            cursor.finished = true;
        }
    }
    nearest_hit
}
