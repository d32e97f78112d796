//! Append-only record of every edit, keyed by absolute chunk coordinate.
//!
//! Two logs are kept per chunk. Block edits rebuild the voxel array of a chunk
//! that becomes hot again. Face edits rebuild its geometry, and are kept
//! separately because a chunk can receive faces from an edit made in a
//! neighbour whose voxels it never stored.
//!
//! Only mutations that actually happened are logged, so replaying a chunk's
//! face edits in order against freshly generated geometry reproduces both the
//! visible faces and the slot each one occupies.

use std::collections::HashMap;

use cgmath::{Point3, Vector2};

use crate::engine_state::{
    rendering::meshing::face_table::{FaceStore, FaceTable, StoreFull},
    voxels::{
        block::{block_side::BlockSide, block_type::BlockType},
        chunk::VoxelGrid,
    },
};

/// Packs an absolute chunk coordinate into a log key.
///
/// `x` fills the upper 32 bits and `z` the lower, both as raw two's complement.
pub fn pack_chunk_key(coord: Vector2<i32>) -> u64 {
    ((coord.x as u32 as u64) << 32) | (coord.y as u32 as u64)
}

/// Inverse of [`pack_chunk_key`].
pub fn unpack_chunk_key(key: u64) -> Vector2<i32> {
    Vector2::new((key >> 32) as u32 as i32, key as u32 as i32)
}

/// Kind of a face edit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaceOperation {
    /// A face was made visible
    Place,
    /// A face was hidden
    Destroy,
}

/// One face mutation, in chunk local coordinates of the owning chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaceEdit {
    /// Create or destroy
    pub operation: FaceOperation,
    /// Material of a created face
    pub block_type: BlockType,
    /// Side of the face
    pub block_side: BlockSide,
    /// Voxel the face belongs to
    pub position: Point3<i32>,
}

/// One voxel overwrite, in chunk local coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockEdit {
    /// New material, `AIR` for removals
    pub block_type: BlockType,
    /// Voxel position
    pub position: Point3<i32>,
}

/// Edits of every chunk ever touched.
#[derive(Debug, Default, Clone)]
pub struct EditLog {
    face_edits: HashMap<u64, Vec<FaceEdit>>,
    block_edits: HashMap<u64, Vec<BlockEdit>>,
}

impl EditLog {
    /// Appends a face edit.
    pub fn record_face(&mut self, chunk: Vector2<i32>, edit: FaceEdit) {
        self.face_edits
            .entry(pack_chunk_key(chunk))
            .or_default()
            .push(edit);
    }

    /// Appends a block edit.
    pub fn record_block(&mut self, chunk: Vector2<i32>, edit: BlockEdit) {
        self.block_edits
            .entry(pack_chunk_key(chunk))
            .or_default()
            .push(edit);
    }

    /// Face edits of a chunk in recording order.
    pub fn face_edits(&self, chunk: Vector2<i32>) -> &[FaceEdit] {
        self.face_edits
            .get(&pack_chunk_key(chunk))
            .map_or(&[], Vec::as_slice)
    }

    /// Block edits of a chunk in recording order.
    pub fn block_edits(&self, chunk: Vector2<i32>) -> &[BlockEdit] {
        self.block_edits
            .get(&pack_chunk_key(chunk))
            .map_or(&[], Vec::as_slice)
    }

    /// Whether a chunk's geometry differs from what the generator produces.
    pub fn has_face_edits(&self, chunk: Vector2<i32>) -> bool {
        !self.face_edits(chunk).is_empty()
    }

    /// Coordinates of every chunk with face edits.
    pub fn edited_chunks(&self) -> impl Iterator<Item = Vector2<i32>> + '_ {
        self.face_edits.keys().map(|&key| unpack_chunk_key(key))
    }

    /// Replays a chunk's face edits onto generated geometry and its index.
    pub fn replay_faces(
        &self,
        chunk: Vector2<i32>,
        table: &mut FaceTable,
        store: &mut impl FaceStore,
    ) -> Result<(), StoreFull> {
        for edit in self.face_edits(chunk) {
            match edit.operation {
                FaceOperation::Place => {
                    table.create_face(store, edit.block_type, edit.block_side, edit.position)?;
                }
                FaceOperation::Destroy => {
                    table.destroy_face(store, edit.block_side, edit.position);
                }
            }
        }
        Ok(())
    }

    /// Replays a chunk's block edits onto a generated voxel array.
    pub fn replay_blocks(&self, chunk: Vector2<i32>, voxels: &mut VoxelGrid) {
        for edit in self.block_edits(chunk) {
            voxels.set(edit.position, edit.block_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::meshing::face::Face;

    #[test]
    fn chunk_keys_round_trip_negative_coordinates() {
        for coord in [Vector2::new(0, 0), Vector2::new(-1, 5), Vector2::new(i32::MIN, i32::MAX)] {
            assert_eq!(unpack_chunk_key(pack_chunk_key(coord)), coord);
        }
        assert_ne!(
            pack_chunk_key(Vector2::new(1, 0)),
            pack_chunk_key(Vector2::new(0, 1))
        );
    }

    #[test]
    fn replay_reproduces_faces_and_slots() {
        let chunk = Vector2::new(2, -3);
        let mut log = EditLog::default();
        let mut live_table = FaceTable::default();
        let mut live: Vec<Face> = Vec::new();

        let edits = [
            (FaceOperation::Place, BlockSide::UP, Point3::new(1, 5, 1)),
            (FaceOperation::Place, BlockSide::LEFT, Point3::new(1, 5, 1)),
            (FaceOperation::Destroy, BlockSide::UP, Point3::new(1, 5, 1)),
            (FaceOperation::Place, BlockSide::BACK, Point3::new(2, 5, 1)),
        ];
        for (operation, block_side, position) in edits {
            let changed = match operation {
                FaceOperation::Place => live_table
                    .create_face(&mut live, BlockType::COBBLE, block_side, position)
                    .unwrap(),
                FaceOperation::Destroy => live_table.destroy_face(&mut live, block_side, position),
            };
            assert!(changed);
            log.record_face(
                chunk,
                FaceEdit {
                    operation,
                    block_type: BlockType::COBBLE,
                    block_side,
                    position,
                },
            );
        }

        let mut replay_table = FaceTable::default();
        let mut replayed: Vec<Face> = Vec::new();
        log.replay_faces(chunk, &mut replay_table, &mut replayed).unwrap();
        assert_eq!(replayed, live);
        assert_eq!(replay_table, live_table);
        assert!(log.face_edits(Vector2::new(0, 0)).is_empty());
        assert_eq!(log.edited_chunks().collect::<Vec<_>>(), vec![chunk]);
    }

    #[test]
    fn block_replay_applies_in_order() {
        let chunk = Vector2::new(0, 0);
        let mut log = EditLog::default();
        let position = Point3::new(3, 100, 4);
        log.record_block(chunk, BlockEdit { block_type: BlockType::GLASS, position });
        log.record_block(chunk, BlockEdit { block_type: BlockType::AIR, position });
        log.record_block(chunk, BlockEdit { block_type: BlockType::WOOD, position });

        let mut voxels = VoxelGrid::default();
        log.replay_blocks(chunk, &mut voxels);
        assert_eq!(voxels.get(position), BlockType::WOOD);
        assert_eq!(log.block_edits(chunk).len(), 3);
    }
}
