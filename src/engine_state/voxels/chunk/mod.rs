//! # Chunk Module
//!
//! Chunk dimensions and the mutable state a hot chunk carries.
//!
//! A chunk is a `CHUNK_WIDTH × CHUNK_DEPTH` patch of terrain columns,
//! `CHUNK_HEIGHT` voxels tall. Cold chunks keep nothing but their geometry.
//! Hot chunks additionally keep a [`VoxelGrid`] and a [`FaceTable`] so single
//! blocks can be edited without re-meshing.
//!
//! ## Memory Layout
//!
//! The voxel grid covers `(CHUNK_WIDTH + 1) × (CHUNK_DEPTH + 1)` columns. The
//! extra row and column duplicate the first columns of the `+x` and `+z`
//! neighbours as they were generated; edits always go to the chunk that owns
//! the column, so the overlap is never written after generation.
//!
//! Columns are stored contiguously, `index = (x * (CHUNK_DEPTH + 1) + z) * CHUNK_HEIGHT + y`,
//! which keeps a column fill a single slice write.

use cgmath::Point3;

use super::block::block_type::BlockType;
use crate::engine_state::rendering::meshing::face_table::FaceTable;

pub mod terrain;

/// Voxels along `x` owned by one chunk.
pub const CHUNK_WIDTH: i32 = 63;
/// Voxels along `z` owned by one chunk.
pub const CHUNK_DEPTH: i32 = 63;
/// Voxels along `y`. Row 0 is the sky, the last rows are bedrock.
pub const CHUNK_HEIGHT: i32 = 255;

/// Rows of surface material at the top of each column.
pub const FIRST_LAYER_HEIGHT: i32 = 1;
/// Rows of sub-surface material below the surface.
pub const SECOND_LAYER_HEIGHT: i32 = 4;
/// Rows of indestructible floor at the bottom of each column.
pub const BEDROCK_LAYER_HEIGHT: i32 = 4;

const GRID_WIDTH: usize = CHUNK_WIDTH as usize + 1;
const GRID_DEPTH: usize = CHUNK_DEPTH as usize + 1;
const GRID_HEIGHT: usize = CHUNK_HEIGHT as usize;

/// The full voxel array of a hot chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelGrid {
    blocks: Vec<BlockType>,
}

impl Default for VoxelGrid {
    fn default() -> Self {
        Self {
            blocks: vec![BlockType::AIR; GRID_WIDTH * GRID_DEPTH * GRID_HEIGHT],
        }
    }
}

impl VoxelGrid {
    fn index(pos: Point3<i32>) -> Option<usize> {
        let in_bounds = (0..GRID_WIDTH as i32).contains(&pos.x)
            && (0..GRID_DEPTH as i32).contains(&pos.z)
            && (0..GRID_HEIGHT as i32).contains(&pos.y);
        in_bounds.then(|| (pos.x as usize * GRID_DEPTH + pos.z as usize) * GRID_HEIGHT + pos.y as usize)
    }

    /// The block at a local position. Anything outside the grid reads as air.
    pub fn get(&self, pos: Point3<i32>) -> BlockType {
        Self::index(pos)
            .map(|index| self.blocks[index])
            .unwrap_or(BlockType::AIR)
    }

    /// Overwrites the block at a local position.
    ///
    /// # Returns
    /// `false` if the position lies outside the grid.
    pub fn set(&mut self, pos: Point3<i32>, block_type: BlockType) -> bool {
        match Self::index(pos) {
            Some(index) => {
                self.blocks[index] = block_type;
                true
            }
            None => false,
        }
    }

    /// Mutable view of one full column, top row first.
    pub fn column_mut(&mut self, x: usize, z: usize) -> &mut [BlockType] {
        let start = (x * GRID_DEPTH + z) * GRID_HEIGHT;
        &mut self.blocks[start..start + GRID_HEIGHT]
    }
}

/// Everything an editable chunk carries besides its geometry.
#[derive(Debug, Default)]
pub struct HotChunk {
    /// The voxel array
    pub voxels: VoxelGrid,
    /// Face key to geometry slot index plus the free slot list
    pub faces: FaceTable,
}
