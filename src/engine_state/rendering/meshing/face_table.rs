//! Slot bookkeeping for editable geometry.
//!
//! A hot chunk's faces live in a fixed-capacity buffer. The [`FaceTable`] maps
//! each visible face to the slot it occupies and keeps a LIFO list of slots
//! vacated by destroyed faces. New faces take the most recently freed slot
//! before the buffer's logical length grows, so the buffer never moves and
//! never needs compacting.
//!
//! The buffer itself is abstracted by [`FaceStore`]: a `Vec<Face>` when
//! replaying edits into freshly generated geometry, a mapped device region
//! when editing live geometry.

use std::collections::HashMap;
use std::fmt;

use cgmath::Point3;
use log::trace;

use super::face::{Face, FaceKey};
use crate::engine_state::voxels::block::{block_side::BlockSide, block_type::BlockType};

/// A sequence of face slots with a logical length and a hard capacity.
pub trait FaceStore {
    /// Slots written so far, destroyed ones included.
    fn face_count(&self) -> u32;

    /// Slots available in total.
    fn face_capacity(&self) -> u32;

    /// Writes `face` into `slot`. `slot == face_count()` appends.
    fn write_face(&mut self, slot: u32, face: &Face);
}

impl FaceStore for Vec<Face> {
    fn face_count(&self) -> u32 {
        self.len() as u32
    }

    fn face_capacity(&self) -> u32 {
        u32::MAX
    }

    fn write_face(&mut self, slot: u32, face: &Face) {
        let slot = slot as usize;
        if slot == self.len() {
            self.push(*face);
        } else {
            self[slot] = *face;
        }
    }
}

/// Raised when a face has nowhere to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreFull {
    /// Capacity of the store that ran out of slots
    pub capacity: u32,
}

impl fmt::Display for StoreFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "geometry buffer is full ({} faces)", self.capacity)
    }
}

impl std::error::Error for StoreFull {}

/// Face key to slot index map plus the free slot list of one hot chunk.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FaceTable {
    index: HashMap<FaceKey, u32>,
    free: Vec<u32>,
}

impl FaceTable {
    /// Records a face written by the mesher.
    pub fn insert_generated(&mut self, key: FaceKey, slot: u32) {
        self.index.insert(key, slot);
    }

    /// The slot holding a face, if the face is visible.
    pub fn slot(&self, block_side: BlockSide, pos: Point3<i32>) -> Option<u32> {
        self.index.get(&FaceKey::new(block_side, pos)).copied()
    }

    /// Number of visible faces.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no face is visible.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Slots waiting for reuse, most recently freed last.
    pub fn free_slots(&self) -> &[u32] {
        &self.free
    }

    /// Iterates over every visible face key.
    pub fn keys(&self) -> impl Iterator<Item = FaceKey> + '_ {
        self.index.keys().copied()
    }

    /// How many more faces fit in a store holding `face_count` of `capacity` slots.
    pub fn headroom(&self, face_count: u32, capacity: u32) -> u64 {
        self.free.len() as u64 + u64::from(capacity.saturating_sub(face_count))
    }

    /// Makes a face visible.
    ///
    /// # Returns
    /// `Ok(true)` if the face was written, `Ok(false)` if it was already visible.
    pub fn create_face(
        &mut self,
        store: &mut impl FaceStore,
        block_type: BlockType,
        block_side: BlockSide,
        pos: Point3<i32>,
    ) -> Result<bool, StoreFull> {
        let key = FaceKey::new(block_side, pos);
        if self.index.contains_key(&key) {
            return Ok(false);
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None if store.face_count() < store.face_capacity() => store.face_count(),
            None => {
                return Err(StoreFull {
                    capacity: store.face_capacity(),
                })
            }
        };

        store.write_face(slot, &Face::new(block_type, block_side, pos));
        self.index.insert(key, slot);
        trace!("created {:?} face at {:?} in slot {}", block_side, pos, slot);
        Ok(true)
    }

    /// Hides a face, zeroing its slot and queueing the slot for reuse.
    ///
    /// # Returns
    /// `true` if the face was visible.
    pub fn destroy_face(
        &mut self,
        store: &mut impl FaceStore,
        block_side: BlockSide,
        pos: Point3<i32>,
    ) -> bool {
        let Some(slot) = self.index.remove(&FaceKey::new(block_side, pos)) else {
            return false;
        };
        store.write_face(slot, &Face::default());
        self.free.push(slot);
        trace!("destroyed {:?} face at {:?} in slot {}", block_side, pos, slot);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bounded {
        faces: Vec<Face>,
        capacity: u32,
    }

    impl FaceStore for Bounded {
        fn face_count(&self) -> u32 {
            self.faces.face_count()
        }
        fn face_capacity(&self) -> u32 {
            self.capacity
        }
        fn write_face(&mut self, slot: u32, face: &Face) {
            self.faces.write_face(slot, face)
        }
    }

    fn p(x: i32, y: i32, z: i32) -> Point3<i32> {
        Point3::new(x, y, z)
    }

    #[test]
    fn freed_slots_are_reused_last_in_first_out() {
        let mut table = FaceTable::default();
        let mut faces = Vec::new();
        for x in 0..4 {
            assert!(table.create_face(&mut faces, BlockType::STONE, BlockSide::UP, p(x, 9, 0)).unwrap());
        }
        let slot_a = table.slot(BlockSide::UP, p(1, 9, 0)).unwrap();
        let slot_b = table.slot(BlockSide::UP, p(2, 9, 0)).unwrap();

        assert!(table.destroy_face(&mut faces, BlockSide::UP, p(1, 9, 0)));
        assert!(table.destroy_face(&mut faces, BlockSide::UP, p(2, 9, 0)));
        assert!(faces[slot_a as usize].is_empty());

        table.create_face(&mut faces, BlockType::DIRT, BlockSide::LEFT, p(5, 5, 5)).unwrap();
        table.create_face(&mut faces, BlockType::DIRT, BlockSide::RIGHT, p(5, 5, 5)).unwrap();
        assert_eq!(table.slot(BlockSide::LEFT, p(5, 5, 5)), Some(slot_b));
        assert_eq!(table.slot(BlockSide::RIGHT, p(5, 5, 5)), Some(slot_a));
        assert_eq!(faces.len(), 4);
    }

    #[test]
    fn duplicate_create_and_missing_destroy_are_no_ops() {
        let mut table = FaceTable::default();
        let mut faces = Vec::new();
        assert!(table.create_face(&mut faces, BlockType::SAND, BlockSide::BACK, p(1, 2, 3)).unwrap());
        assert!(!table.create_face(&mut faces, BlockType::SAND, BlockSide::BACK, p(1, 2, 3)).unwrap());
        assert!(!table.destroy_face(&mut faces, BlockSide::FRONT, p(1, 2, 3)));
        assert_eq!(faces.len(), 1);
        assert!(table.free_slots().is_empty());
    }

    #[test]
    fn full_store_is_reported_and_free_slots_still_work() {
        let mut table = FaceTable::default();
        let mut store = Bounded {
            faces: Vec::new(),
            capacity: 2,
        };
        table.create_face(&mut store, BlockType::STONE, BlockSide::UP, p(0, 0, 0)).unwrap();
        table.create_face(&mut store, BlockType::STONE, BlockSide::UP, p(1, 0, 0)).unwrap();
        assert_eq!(table.headroom(store.face_count(), 2), 0);
        assert_eq!(
            table.create_face(&mut store, BlockType::STONE, BlockSide::UP, p(2, 0, 0)),
            Err(StoreFull { capacity: 2 })
        );

        table.destroy_face(&mut store, BlockSide::UP, p(0, 0, 0));
        assert_eq!(table.headroom(store.face_count(), 2), 1);
        assert!(table.create_face(&mut store, BlockType::STONE, BlockSide::UP, p(2, 0, 0)).unwrap());
    }
}
