use crate::{
    octree::{Cube, NodeHandle, Octree, V3c, ROOT_HANDLE},
    raytracing::types::{Descent, MarchState, RayStep, TriangleHit},
    spatial::raytracing::{exit_face_normal, intersect_box, CubeHit, Ray},
};

/// Fraction of the cell size the cursor is pushed past a cell boundary
const EXIT_NUDGE_RATIO: f32 = 0.01;

/// The smallest push past a cell boundary
const MIN_EXIT_NUDGE: f32 = 0.0001;

impl Octree {
    /// Tests every triangle of the node against the ray, keeping the nearest
    /// hit in front of the origin as the candidate of the state
    fn test_node_triangles(&self, node_key: NodeHandle, ray: &Ray, state: &mut MarchState) {
        let Some(node) = self.node(node_key) else {
            return;
        };
        for triangle_key in node.triangle_handles() {
            let Some(triangle) = self.triangle(*triangle_key) else {
                continue;
            };
            let Some(distance) = ray.triangle_distance(triangle) else {
                continue;
            };
            if distance <= 0.
                || state
                    .candidate
                    .is_some_and(|candidate| candidate.distance <= distance)
            {
                continue;
            }
            state.candidate = Some(TriangleHit {
                distance,
                point: ray.point_at(distance),
                normal: self.normal(*triangle_key).copied().unwrap_or_default(),
                triangle: *triangle_key,
                node: node_key,
            });
        }
    }

    /// Finds the largest empty cell containing the given point, testing the triangles of
    /// every not yet checked node along the way.
    /// A hit is only reported once the ray reached the exit of the empty cell
    /// beyond it, as only then can no other triangle be closer.
    /// * `point` - the marching cursor, in the coordinate space of the octree
    /// * `ray` - the ray being marched, in the coordinate space of the octree
    /// * `state` - the state of the ray in this octree
    pub fn find_largest_non_container(
        &self,
        point: &V3c<f32>,
        ray: &Ray,
        state: &mut MarchState,
    ) -> Descent {
        let root_bounds = self.root_bounds();
        if !root_bounds.contains_point(point) {
            return Descent::Outside;
        }

        let mut current_node_key = ROOT_HANDLE;
        let mut current_bounds = root_bounds;
        loop {
            let Some(node) = self.node(current_node_key).copied() else {
                return Descent::Outside;
            };
            if 0 < node.triangle_count && state.checked.insert(current_node_key) {
                self.test_node_triangles(current_node_key, ray, state);
            }
            let target_octant = current_bounds.octant_of(point);
            match node.child(target_octant) {
                Some(child_key) => {
                    current_node_key = child_key;
                    current_bounds = current_bounds.child_bounds_for(target_octant);
                }
                None => {
                    let gap_bounds = current_bounds.child_bounds_for(target_octant);
                    if let Some(candidate) = state.candidate {
                        let sanitized = ray.sanitized();
                        let (_, gap_exit) = intersect_box(
                            &sanitized.origin,
                            &sanitized.direction,
                            &gap_bounds.min_position,
                            gap_bounds.size,
                        );
                        if candidate.distance <= gap_exit.max(state.distance) {
                            return Descent::Hit(candidate);
                        }
                    }
                    return Descent::Gap {
                        node: current_node_key,
                        bounds: gap_bounds,
                    };
                }
            }
        }
    }

    /// Advances the marching cursor of the ray by one cell.
    /// * `position` - the marching cursor, in world space
    /// * `ray` - the ray, in world space
    /// * `state` - the state of the ray in this octree
    /// * Returns with the new cursor and a hit, if any; `missed` is set once the
    ///   ray left the octree for good
    pub fn propagate_ray(&self, position: &V3c<f32>, ray: &Ray, state: &mut MarchState) -> RayStep {
        let local_ray = Ray::new(ray.origin - self.offset, ray.direction);
        let local_position = *position - self.offset;
        state.steps += 1;

        let step = if state.steps > self.config.max_march_steps {
            tracing::trace!("Ray exceeded {} steps", self.config.max_march_steps);
            self.conclude(local_position, state)
        } else {
            match self.find_largest_non_container(&local_position, &local_ray, state) {
                Descent::Hit(hit) => RayStep {
                    position: hit.point,
                    hit: Some(hit),
                    missed: false,
                },
                Descent::Outside => self.enter_root(&local_position, &local_ray, state),
                Descent::Gap { node, bounds } => {
                    if ROOT_HANDLE == node
                        && !self.node(ROOT_HANDLE).is_some_and(|root| root.has_children())
                    {
                        // Everything the octree holds is in the root, and it has been tested already
                        self.conclude(local_position, state)
                    } else {
                        Self::exit_gap(&bounds, &local_ray, state)
                    }
                }
            }
        };

        RayStep {
            position: step.position + self.offset,
            hit: step.hit.map(|hit| TriangleHit {
                point: hit.point + self.offset,
                ..hit
            }),
            missed: step.missed,
        }
    }

    /// Reports the pending candidate as the hit if there is one, otherwise a miss
    fn conclude(&self, position: V3c<f32>, state: &MarchState) -> RayStep {
        match state.candidate {
            Some(hit) => RayStep {
                position: hit.point,
                hit: Some(hit),
                missed: false,
            },
            None => RayStep {
                position,
                hit: None,
                missed: true,
            },
        }
    }

    /// Moves a cursor outside of the root cell onto its boundary, if the root is still ahead
    fn enter_root(&self, position: &V3c<f32>, ray: &Ray, state: &mut MarchState) -> RayStep {
        if let Some(CubeHit {
            impact_distance: Some(impact_distance),
            ..
        }) = self.root_bounds().intersect_ray(ray)
        {
            if state.distance < impact_distance {
                state.distance = impact_distance;
                tracing::trace!("Ray entering the root at {}", impact_distance);
                return RayStep {
                    position: ray.point_at(impact_distance),
                    hit: None,
                    missed: false,
                };
            }
        }
        self.conclude(*position, state)
    }

    /// Moves the cursor past the exit face of the given empty cell
    fn exit_gap(gap_bounds: &Cube, ray: &Ray, state: &mut MarchState) -> RayStep {
        let sanitized = ray.sanitized();
        let (t_near, t_far) = intersect_box(
            &sanitized.origin,
            &sanitized.direction,
            &gap_bounds.min_position,
            gap_bounds.size,
        );
        let nudge = (gap_bounds.size * EXIT_NUDGE_RATIO).max(MIN_EXIT_NUDGE);
        let position = if t_near <= t_far && state.distance < t_far {
            // re-anchor the cursor on the ray, pushed through the exit face
            let exit_point = ray.point_at(t_far);
            state.distance = t_far;
            exit_point + exit_face_normal(gap_bounds, &exit_point) * nudge
        } else {
            // the cursor left the line of the ray; continue along the ray itself
            state.distance += nudge;
            ray.point_at(state.distance)
        };
        RayStep {
            position,
            hit: None,
            missed: false,
        }
    }
}
