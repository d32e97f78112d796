//! Face codec.
//!
//! A [`Face`] is one visible quad of a voxel, stored as two triangles of packed
//! [`Vertex`] words. The all-zero face is the sentinel for an empty slot: it
//! collapses to a degenerate triangle pair and is what a destroyed face is
//! overwritten with.
//!
//! A [`FaceKey`] names a (side, voxel) pair inside one chunk so hot chunks can
//! find the slot a face was written to.

use cgmath::Point3;

use crate::engine_state::{
    rendering::vertex::Vertex,
    voxels::block::{block_side::BlockSide, block_type::BlockType},
};

/// Vertices per face: two triangles sharing the diagonal.
pub const VERTICES_PER_FACE: usize = 6;

/// Size of one encoded face in a geometry buffer.
pub const FACE_SIZE: u64 = std::mem::size_of::<Face>() as u64;

/// Texture coordinate offsets of the four quad corners inside an atlas cell.
const UV_OFFSETS: [[u32; 2]; 4] = [[0, 0], [0, 1], [1, 1], [1, 0]];

/// Corner order shared by every side: two triangles `0 1 2` and `2 3 0`.
const TRIANGLE_CORNERS: [usize; VERTICES_PER_FACE] = [0, 1, 2, 2, 3, 0];

/// Represents a single quad face of a voxel in a chunk's geometry buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Face {
    /// The six packed vertices of the two triangles
    pub vertices: [Vertex; VERTICES_PER_FACE],
}

impl Face {
    /// Creates the face of a voxel.
    ///
    /// # Arguments
    /// * `block_type` - Material of the voxel, selects the atlas cell
    /// * `block_side` - Which side of the voxel this face covers
    /// * `pos` - Position of the voxel in chunk space
    ///
    /// # Returns
    /// The encoded face, or the empty face for `AIR`.
    pub fn new(block_type: BlockType, block_side: BlockSide, pos: Point3<i32>) -> Self {
        let Some(cells) = block_type.atlas_cells() else {
            return Face::default();
        };
        let [u, v] = cells.for_side(block_side);
        let corners = Self::corners(block_side);

        let mut vertices = [Vertex::default(); VERTICES_PER_FACE];
        for (vertex, &corner) in vertices.iter_mut().zip(TRIANGLE_CORNERS.iter()) {
            let [dx, dy, dz] = corners[corner];
            let [du, dv] = UV_OFFSETS[corner];
            let corner_pos = Point3::new(
                (pos.x + dx) as u32,
                (pos.y + dy) as u32,
                (pos.z + dz) as u32,
            );
            *vertex = Vertex::pack(corner_pos, u as u32 + du, v as u32 + dv);
        }
        Face { vertices }
    }

    /// Corner offsets of a side's quad, in winding order.
    fn corners(block_side: BlockSide) -> [[i32; 3]; 4] {
        match block_side {
            BlockSide::UP => [[0, 0, 1], [0, 0, 0], [1, 0, 0], [1, 0, 1]],
            BlockSide::DOWN => [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]],
            BlockSide::FRONT => [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]],
            BlockSide::BACK => [[1, 0, 1], [1, 1, 1], [0, 1, 1], [0, 0, 1]],
            BlockSide::LEFT => [[0, 0, 1], [0, 1, 1], [0, 1, 0], [0, 0, 0]],
            BlockSide::RIGHT => [[1, 0, 0], [1, 1, 0], [1, 1, 1], [1, 0, 1]],
        }
    }

    /// Whether this is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        self.vertices.iter().all(|vertex| vertex.0 == 0)
    }

    /// Decodes a face from exactly [`FACE_SIZE`] bytes of geometry.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(bytes)
    }
}

/// Identity of a (side, voxel) pair within one chunk.
///
/// Layout: `(side << 24) | (x << 16) | (y << 8) | z`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceKey(pub u32);

impl FaceKey {
    /// Packs a face key.
    ///
    /// Components must lie in `0..=255`, which holds for every chunk local
    /// position including the one-voxel overlap at `x = W` and `z = D`.
    pub fn new(block_side: BlockSide, pos: Point3<i32>) -> Self {
        FaceKey(
            ((block_side as u32) << 24)
                | ((pos.x as u32 & 0xff) << 16)
                | ((pos.y as u32 & 0xff) << 8)
                | (pos.z as u32 & 0xff),
        )
    }

    /// Splits the key back into its side and position.
    pub fn unpack(self) -> Option<(BlockSide, Point3<i32>)> {
        let side = BlockSide::from_int((self.0 >> 24) as u8)?;
        let pos = Point3::new(
            ((self.0 >> 16) & 0xff) as i32,
            ((self.0 >> 8) & 0xff) as i32,
            (self.0 & 0xff) as i32,
        );
        Some((side, pos))
    }
}
