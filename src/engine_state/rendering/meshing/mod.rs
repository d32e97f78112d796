//! Chunk mesh generation.
//!
//! Turns a chunk's height map into a flat list of [`Face`]s. Terrain is a
//! height field, so a chunk only ever shows the top face of every column plus
//! the vertical strip of side faces where a column stands above a forward
//! (`+x` or `+z`) neighbour.
//!
//! # Edge policy
//! The side faces between two columns always belong to the taller column, and
//! are emitted while visiting whichever of the two columns comes first. A
//! taller forward neighbour therefore emits its `LEFT`/`FRONT` faces at
//! `x + 1`/`z + 1`, which may be the overlap row `x = CHUNK_WIDTH` or
//! `z = CHUNK_DEPTH`. Those faces are stored in this chunk, and the neighbour
//! never emits them itself, so no seam has missing or doubled faces.
//!
//! # Variants
//! - [`build_cold`]: faces only
//! - [`build_hot`]: the same faces in the same order, plus the face index and
//!   the full voxel array needed for editing

use std::ops::Range;

use cgmath::{Point3, Vector2};
use log::trace;
use web_time::Instant;

use crate::engine_state::voxels::{
    block::{block_side::BlockSide, block_type::BlockType},
    chunk::{
        terrain::{ColumnProfile, HeightMap, TerrainGenerator, HEIGHT_MAP_DEPTH, HEIGHT_MAP_WIDTH},
        HotChunk, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH,
    },
};
use face::{Face, FaceKey};

pub mod face;
pub mod face_table;

/// Output of [`build_hot`].
#[derive(Debug)]
pub struct HotBuild {
    /// Generated faces, slot `i` of the geometry buffer is `faces[i]`
    pub faces: Vec<Face>,
    /// Voxel array and face index matching `faces`
    pub chunk: HotChunk,
}

/// Builds the immutable geometry of a chunk.
///
/// # Arguments
/// * `terrain` - The world's height source
/// * `chunk` - Absolute chunk coordinate `(x, z)`
pub fn build_cold(terrain: &TerrainGenerator, chunk: Vector2<i32>) -> Vec<Face> {
    let start = Instant::now();
    let height_map = terrain.generate_height_map(chunk);

    let mut faces = Vec::new();
    emit_chunk(&height_map, |block_type, block_side, pos| {
        faces.push(Face::new(block_type, block_side, pos));
    });

    trace!(
        "cold chunk {:?}: {} faces in {:?}",
        chunk,
        faces.len(),
        start.elapsed()
    );
    faces
}

/// Builds the geometry, face index and voxel array of an editable chunk.
///
/// The faces are identical to [`build_cold`] for the same coordinate.
pub fn build_hot(terrain: &TerrainGenerator, chunk: Vector2<i32>) -> HotBuild {
    let start = Instant::now();
    let height_map = terrain.generate_height_map(chunk);

    let mut hot = HotChunk::default();
    for x in 0..HEIGHT_MAP_WIDTH {
        for z in 0..HEIGHT_MAP_DEPTH {
            let profile = height_map.profile(x, z);
            for (y, block) in hot.voxels.column_mut(x, z).iter_mut().enumerate() {
                *block = profile.material_at(y as i32);
            }
        }
    }

    let mut faces = Vec::new();
    emit_chunk(&height_map, |block_type, block_side, pos| {
        hot.faces
            .insert_generated(FaceKey::new(block_side, pos), faces.len() as u32);
        faces.push(Face::new(block_type, block_side, pos));
    });

    trace!(
        "hot chunk {:?}: {} faces in {:?}",
        chunk,
        faces.len(),
        start.elapsed()
    );
    HotBuild { faces, chunk: hot }
}

/// Visits every visible face of a chunk in geometry order.
fn emit_chunk(height_map: &HeightMap, mut emit: impl FnMut(BlockType, BlockSide, Point3<i32>)) {
    for x in 0..CHUNK_WIDTH as usize {
        for z in 0..CHUNK_DEPTH as usize {
            let column = height_map.profile(x, z);
            let (xi, zi) = (x as i32, z as i32);
            emit(
                column.materials[0],
                BlockSide::UP,
                Point3::new(xi, column.height, zi),
            );

            let back = height_map.profile(x, z + 1);
            if column.height < back.height {
                emit_band(&column, BlockSide::BACK, column.height..back.height, (xi, zi), &mut emit);
            } else {
                emit_band(&back, BlockSide::FRONT, back.height..column.height, (xi, zi + 1), &mut emit);
            }

            let right = height_map.profile(x + 1, z);
            if column.height < right.height {
                emit_band(&column, BlockSide::RIGHT, column.height..right.height, (xi, zi), &mut emit);
            } else {
                emit_band(&right, BlockSide::LEFT, right.height..column.height, (xi + 1, zi), &mut emit);
            }
        }
    }
}

/// Emits the side faces of one column for the given rows.
fn emit_band(
    profile: &ColumnProfile,
    block_side: BlockSide,
    rows: Range<i32>,
    (x, z): (i32, i32),
    emit: &mut impl FnMut(BlockType, BlockSide, Point3<i32>),
) {
    for y in rows.take_while(|&y| y < CHUNK_HEIGHT) {
        emit(profile.material_at(y), block_side, Point3::new(x, y, z));
    }
}
