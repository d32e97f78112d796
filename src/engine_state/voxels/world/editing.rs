//! Block placement and removal on the hot chunks.
//!
//! An edit writes one voxel and then patches at most six faces: its own, or
//! the opposing faces of its neighbours. Neighbours and face owners may live
//! in another hot quadrant; [`step`] and [`face_owner`] resolve that in one
//! place so the edit paths only deal with `(quadrant, local position)` pairs.

use cgmath::Point3;
use log::{trace, warn};

use super::{
    edit_log::{BlockEdit, FaceEdit, FaceOperation},
    Quadrant, RegionFaces, World, WorldError,
};
use crate::engine_state::{
    device::GraphicsDevice,
    voxels::{
        block::{block_side::BlockSide, block_type::BlockType},
        chunk::{CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH},
    },
};

/// Worst case number of faces a single edit creates.
const FACES_PER_EDIT: u64 = 6;

/// The voxel next to `local` across `block_side`.
///
/// Crosses into the neighbouring hot quadrant when the step leaves the chunk
/// on `x` or `z`. `None` when the step leaves the hot 2×2 block or the
/// vertical range.
pub(super) fn step(
    quadrant: Quadrant,
    local: Point3<i32>,
    block_side: BlockSide,
) -> Option<(Quadrant, Point3<i32>)> {
    let mut next = local + block_side.normal();
    if !(0..CHUNK_HEIGHT).contains(&next.y) {
        return None;
    }

    let mut quadrant = quadrant;
    if next.x < 0 {
        quadrant.i = quadrant.i.checked_sub(1)?;
        next.x += CHUNK_WIDTH;
    } else if next.x >= CHUNK_WIDTH {
        quadrant.i = (quadrant.i == 0).then_some(1)?;
        next.x -= CHUNK_WIDTH;
    }
    if next.z < 0 {
        quadrant.j = quadrant.j.checked_sub(1)?;
        next.z += CHUNK_DEPTH;
    } else if next.z >= CHUNK_DEPTH {
        quadrant.j = (quadrant.j == 0).then_some(1)?;
        next.z -= CHUNK_DEPTH;
    }
    Some((quadrant, next))
}

/// The quadrant and local position under which a voxel's face is indexed.
///
/// `LEFT` faces on the chunk's `x = 0` plane and `FRONT` faces on its `z = 0`
/// plane belong to the `-x` / `-z` neighbour, stored at `x = CHUNK_WIDTH` /
/// `z = CHUNK_DEPTH`. `None` when that neighbour is not hot.
pub(super) fn face_owner(
    quadrant: Quadrant,
    local: Point3<i32>,
    block_side: BlockSide,
) -> Option<(Quadrant, Point3<i32>)> {
    match block_side {
        BlockSide::LEFT if local.x == 0 => Some((
            Quadrant {
                i: quadrant.i.checked_sub(1)?,
                ..quadrant
            },
            Point3::new(CHUNK_WIDTH, local.y, local.z),
        )),
        BlockSide::FRONT if local.z == 0 => Some((
            Quadrant {
                j: quadrant.j.checked_sub(1)?,
                ..quadrant
            },
            Point3::new(local.x, local.y, CHUNK_DEPTH),
        )),
        _ => Some((quadrant, local)),
    }
}

impl<D: GraphicsDevice> World<D> {
    /// Places a block against a face of an existing block.
    ///
    /// # Arguments
    ///
    /// * `block_type` - Material of the new block
    /// * `block_side` - The clicked face; the new block goes on its outer side
    /// * `position` - Absolute position of the clicked voxel
    ///
    /// # Returns
    ///
    /// `Ok(false)` without any change when the new voxel is outside the
    /// editable margin or already occupied, when the clicked voxel is air,
    /// or when a hot chunk is too full to take the new faces.
    pub fn place_block(
        &mut self,
        block_type: BlockType,
        block_side: BlockSide,
        position: Point3<i32>,
    ) -> Result<bool, WorldError> {
        if block_type.is_air() {
            return Ok(false);
        }
        let target = position + block_side.normal();
        let Some((quadrant, local)) = self.locate_editable(target) else {
            trace!("place at {:?} rejected: outside the editable margin", target);
            return Ok(false);
        };
        if !self.block_at(position).is_some_and(|block| !block.is_air())
            || !self.hot_block(quadrant, local).is_air()
        {
            return Ok(false);
        }
        if !self.has_headroom() {
            return Ok(false);
        }

        self.write_block(quadrant, local, block_type);
        for side in BlockSide::all() {
            match step(quadrant, local, side) {
                Some((neighbour, neighbour_local))
                    if block_type.is_opaque()
                        && self.hot_block(neighbour, neighbour_local).is_opaque() =>
                {
                    self.destroy_face(neighbour, neighbour_local, side.opposite())?;
                }
                _ => self.create_face(quadrant, local, block_type, side)?,
            }
        }

        self.arena.device().get_mut().flush();
        trace!("placed {:?} at {:?}", block_type, target);
        Ok(true)
    }

    /// Removes a block.
    ///
    /// # Arguments
    ///
    /// * `block_side` - The face the block was targeted through
    /// * `position` - Absolute position of the block
    ///
    /// # Returns
    ///
    /// `Ok(false)` without any change when the voxel is outside the editable
    /// margin, air or bedrock, or when a hot chunk is too full to take the
    /// uncovered faces.
    pub fn destroy_block(
        &mut self,
        block_side: BlockSide,
        position: Point3<i32>,
    ) -> Result<bool, WorldError> {
        let Some((quadrant, local)) = self.locate_editable(position) else {
            trace!("destroy at {:?} ({:?}) rejected: outside the editable margin", position, block_side);
            return Ok(false);
        };
        if !self.hot_block(quadrant, local).is_destructible() || !self.has_headroom() {
            return Ok(false);
        }

        self.write_block(quadrant, local, BlockType::AIR);
        for side in BlockSide::all() {
            self.destroy_face(quadrant, local, side)?;
            if let Some((neighbour, neighbour_local)) = step(quadrant, local, side) {
                let neighbour_block = self.hot_block(neighbour, neighbour_local);
                if !neighbour_block.is_air() {
                    self.create_face(neighbour, neighbour_local, neighbour_block, side.opposite())?;
                }
            }
        }

        self.arena.device().get_mut().flush();
        trace!("destroyed block at {:?}", position);
        Ok(true)
    }

    /// [`World::locate`] restricted to voxels off the hot block's outer ring.
    fn locate_editable(&self, position: Point3<i32>) -> Option<(Quadrant, Point3<i32>)> {
        let base = self.hot_base();
        let (x, z) = (position.x - base.x, position.z - base.y);
        let inside = (1..=2 * CHUNK_WIDTH - 2).contains(&x) && (1..=2 * CHUNK_DEPTH - 2).contains(&z);
        if inside {
            self.locate(position)
        } else {
            None
        }
    }

    fn has_headroom(&self) -> bool {
        let full = Quadrant::all().into_iter().find(|&quadrant| {
            let (i, j) = self.quadrant_slot(quadrant);
            let face_count = self.window.slot(i, j).face_count;
            self.hot[quadrant.i][quadrant.j]
                .faces
                .headroom(face_count, self.face_capacity)
                < FACES_PER_EDIT
        });
        if let Some(quadrant) = full {
            warn!(
                "edit rejected: hot chunk {:?} has no room for more faces",
                self.quadrant_coord(quadrant)
            );
        }
        full.is_none()
    }

    fn write_block(&mut self, quadrant: Quadrant, local: Point3<i32>, block_type: BlockType) {
        let coord = self.quadrant_coord(quadrant);
        self.hot[quadrant.i][quadrant.j].voxels.set(local, block_type);
        self.log.record_block(
            coord,
            BlockEdit {
                block_type,
                position: local,
            },
        );
    }

    /// Makes a face visible in its owning chunk and logs it if it changed.
    fn create_face(
        &mut self,
        quadrant: Quadrant,
        local: Point3<i32>,
        block_type: BlockType,
        block_side: BlockSide,
    ) -> Result<(), WorldError> {
        let Some((owner, position)) = face_owner(quadrant, local, block_side) else {
            return Ok(());
        };
        let coord = self.quadrant_coord(owner);
        let (i, j) = self.quadrant_slot(owner);

        let mut store = RegionFaces::new(
            &self.arena,
            self.window.slot_mut(i, j),
            self.face_capacity,
            coord,
        )?;
        let created = self.hot[owner.i][owner.j]
            .faces
            .create_face(&mut store, block_type, block_side, position)
            .map_err(|source| WorldError::ChunkFull { coord, source })?;

        if created {
            self.log.record_face(
                coord,
                FaceEdit {
                    operation: FaceOperation::Place,
                    block_type,
                    block_side,
                    position,
                },
            );
        }
        Ok(())
    }

    /// Hides a face in its owning chunk and logs it if it changed.
    fn destroy_face(
        &mut self,
        quadrant: Quadrant,
        local: Point3<i32>,
        block_side: BlockSide,
    ) -> Result<(), WorldError> {
        let Some((owner, position)) = face_owner(quadrant, local, block_side) else {
            return Ok(());
        };
        let coord = self.quadrant_coord(owner);
        let (i, j) = self.quadrant_slot(owner);

        let mut store = RegionFaces::new(
            &self.arena,
            self.window.slot_mut(i, j),
            self.face_capacity,
            coord,
        )?;
        let destroyed = self.hot[owner.i][owner.j]
            .faces
            .destroy_face(&mut store, block_side, position);

        if destroyed {
            self.log.record_face(
                coord,
                FaceEdit {
                    operation: FaceOperation::Destroy,
                    block_type: BlockType::AIR,
                    block_side,
                    position,
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q00: Quadrant = Quadrant { i: 0, j: 0 };
    const Q10: Quadrant = Quadrant { i: 1, j: 0 };
    const Q11: Quadrant = Quadrant { i: 1, j: 1 };

    #[test]
    fn steps_cross_into_the_neighbouring_quadrant() {
        assert_eq!(
            step(Q00, Point3::new(CHUNK_WIDTH - 1, 10, 5), BlockSide::RIGHT),
            Some((Q10, Point3::new(0, 10, 5)))
        );
        assert_eq!(
            step(Q11, Point3::new(3, 10, 0), BlockSide::FRONT),
            Some((Q10, Point3::new(3, 10, CHUNK_DEPTH - 1)))
        );
        assert_eq!(
            step(Q10, Point3::new(4, 10, 4), BlockSide::UP),
            Some((Q10, Point3::new(4, 9, 4)))
        );
    }

    #[test]
    fn steps_out_of_the_hot_block_or_the_height_range_fail() {
        assert_eq!(step(Q00, Point3::new(0, 10, 5), BlockSide::LEFT), None);
        assert_eq!(step(Q11, Point3::new(5, 10, CHUNK_DEPTH - 1), BlockSide::BACK), None);
        assert_eq!(step(Q00, Point3::new(5, 0, 5), BlockSide::UP), None);
        assert_eq!(step(Q00, Point3::new(5, CHUNK_HEIGHT - 1, 5), BlockSide::DOWN), None);
    }

    #[test]
    fn edge_faces_belong_to_the_lower_neighbour() {
        assert_eq!(
            face_owner(Q10, Point3::new(0, 7, 9), BlockSide::LEFT),
            Some((Q00, Point3::new(CHUNK_WIDTH, 7, 9)))
        );
        assert_eq!(
            face_owner(Q11, Point3::new(2, 7, 0), BlockSide::FRONT),
            Some((Q10, Point3::new(2, 7, CHUNK_DEPTH)))
        );
        assert_eq!(face_owner(Q00, Point3::new(0, 7, 9), BlockSide::LEFT), None);
        assert_eq!(
            face_owner(Q10, Point3::new(0, 7, 9), BlockSide::RIGHT),
            Some((Q10, Point3::new(0, 7, 9)))
        );
    }
}
