//! Block targeting along the view ray.
//!
//! Instead of a voxel traversal, every integer plane the ray crosses within
//! reach is collected per axis and the crossings are merged by distance. Each
//! crossing names the voxel just beyond the plane and the face of that voxel
//! the ray enters through.

use cgmath::{InnerSpace, Point3, Vector3};

use super::block::block_side::BlockSide;

/// How far a block can be targeted, in voxels.
pub const REACH_DISTANCE: i32 = 5;

/// One candidate along a ray.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RayHit {
    /// Absolute voxel position
    pub voxel: Point3<i32>,
    /// The voxel's face the ray enters through
    pub side: BlockSide,
}

/// Candidates of one cast, nearest first.
#[derive(Debug)]
pub struct RayCast {
    hits: std::vec::IntoIter<RayHit>,
}

impl Iterator for RayCast {
    type Item = RayHit;

    fn next(&mut self) -> Option<RayHit> {
        self.hits.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.hits.size_hint()
    }
}

impl ExactSizeIterator for RayCast {}

/// The face a ray moving along `axis` enters through.
fn entry_side(axis: usize, positive: bool) -> BlockSide {
    match (axis, positive) {
        (0, true) => BlockSide::LEFT,
        (0, false) => BlockSide::RIGHT,
        (1, true) => BlockSide::UP,
        (1, false) => BlockSide::DOWN,
        (_, true) => BlockSide::FRONT,
        (_, false) => BlockSide::BACK,
    }
}

/// Lists the voxel faces a ray crosses within [`REACH_DISTANCE`].
///
/// Callers consume candidates from the front until one hits a solid voxel.
/// Crossings at equal distance keep axis order `x`, `y`, `z`.
///
/// # Arguments
///
/// * `origin` - The eye position
/// * `direction` - The view direction, not necessarily normalised
pub fn cast_ray(origin: Point3<f32>, direction: Vector3<f32>) -> RayCast {
    let reach_squared = (REACH_DISTANCE * REACH_DISTANCE) as f32;
    let mut contacts: Vec<(f32, RayHit)> = Vec::new();

    for axis in 0..3 {
        let speed = direction[axis];
        if speed == 0.0 || !speed.is_finite() {
            continue;
        }
        let positive = speed > 0.0;
        let (first_plane, step) = if positive {
            (origin[axis].ceil(), 1.0)
        } else {
            (origin[axis].floor(), -1.0)
        };

        for k in 0..=REACH_DISTANCE {
            let plane = first_plane + step * k as f32;
            let travelled = direction * ((plane - origin[axis]) / speed);
            let distance_squared = travelled.magnitude2();
            if distance_squared > reach_squared {
                continue;
            }

            let point = origin + travelled;
            let mut voxel = Point3::new(
                point.x.floor() as i32,
                point.y.floor() as i32,
                point.z.floor() as i32,
            );
            voxel[axis] = plane as i32 - i32::from(!positive);
            contacts.push((
                distance_squared,
                RayHit {
                    voxel,
                    side: entry_side(axis, positive),
                },
            ));
        }
    }

    contacts.sort_by(|a, b| a.0.total_cmp(&b.0));
    let hits: Vec<RayHit> = contacts.into_iter().map(|(_, hit)| hit).collect();
    RayCast {
        hits: hits.into_iter(),
    }
}
