//! # Block Type Module
//!
//! This module defines the materials a voxel can be made of, together with the
//! texture atlas cells used for each of their faces.

use num_derive::FromPrimitive;
use serde::Deserialize;

use super::{block_side::BlockSide, BlockTypeSize};

/// Enumerates all possible block types in the voxel world.
///
/// The `FromPrimitive` derive allows conversion from the compact
/// `BlockTypeSize` storage format used by the edit log.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    /// Empty space. Never rendered, never edited.
    AIR,

    /// Tree foliage.
    LEAVES,

    /// The only transparent material. Its faces neither hide nor are hidden by neighbours.
    GLASS,

    /// The indestructible floor of every column.
    BEDROCK,

    /// Water surface generated in the lowest terrain.
    WATER,

    /// Beach sand.
    SAND,

    /// Deep rock under every column.
    STONE,

    /// Sub-surface soil.
    DIRT,

    /// A grass block with different textures on top and sides.
    GRASS,

    /// Snow capped soil found on the highest terrain.
    SNOW,

    /// Tree trunk with distinct rings on top and bottom.
    LOG,

    /// Wooden planks.
    WOOD,

    /// Cobblestone.
    COBBLE,
}

/// Texture atlas cells `[u, v]` for the top, bottom and side faces of a material.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AtlasCells {
    /// Cell used by `UP` faces
    pub up: [u8; 2],
    /// Cell used by `DOWN` faces
    pub down: [u8; 2],
    /// Cell used by the four vertical faces
    pub side: [u8; 2],
}

impl AtlasCells {
    const fn uniform(cell: [u8; 2]) -> Self {
        AtlasCells {
            up: cell,
            down: cell,
            side: cell,
        }
    }

    /// Selects the cell for the given face.
    pub fn for_side(&self, side: BlockSide) -> [u8; 2] {
        match side {
            BlockSide::UP => self.up,
            BlockSide::DOWN => self.down,
            _ => self.side,
        }
    }
}

impl BlockType {
    /// Converts a `BlockTypeSize` to a `BlockType`.
    ///
    /// # Arguments
    /// * `btype` - The block type as a `BlockTypeSize`
    ///
    /// # Returns
    /// The corresponding `BlockType`, or `None` for an unknown discriminant.
    pub fn get_block_type_from_int(btype: BlockTypeSize) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(btype)
    }

    /// Whether this block is empty space.
    pub fn is_air(self) -> bool {
        self == BlockType::AIR
    }

    /// Whether faces of neighbouring blocks stay visible through this block.
    pub fn is_transparent(self) -> bool {
        matches!(self, BlockType::AIR | BlockType::GLASS)
    }

    /// A solid block that hides the faces it touches.
    pub fn is_opaque(self) -> bool {
        !self.is_transparent()
    }

    /// Whether the block may be removed by an edit.
    pub fn is_destructible(self) -> bool {
        !matches!(self, BlockType::AIR | BlockType::BEDROCK)
    }

    /// Texture atlas cells for this material, `None` for air.
    pub fn atlas_cells(self) -> Option<AtlasCells> {
        let cells = match self {
            BlockType::AIR => return None,
            BlockType::GLASS => AtlasCells::uniform([1, 3]),
            BlockType::BEDROCK => AtlasCells::uniform([1, 1]),
            BlockType::WATER => AtlasCells::uniform([14, 13]),
            BlockType::SAND => AtlasCells::uniform([2, 1]),
            BlockType::STONE => AtlasCells::uniform([1, 0]),
            BlockType::DIRT => AtlasCells::uniform([2, 0]),
            BlockType::GRASS => AtlasCells {
                up: [0, 0],
                down: [2, 0],
                side: [3, 0],
            },
            BlockType::SNOW => AtlasCells {
                up: [2, 4],
                down: [2, 0],
                side: [4, 4],
            },
            BlockType::LOG => AtlasCells {
                up: [5, 1],
                down: [5, 1],
                side: [4, 1],
            },
            BlockType::LEAVES => AtlasCells::uniform([4, 3]),
            BlockType::WOOD => AtlasCells::uniform([4, 0]),
            BlockType::COBBLE => AtlasCells::uniform([0, 1]),
        };
        Some(cells)
    }
}
