//! # Block Side Module
//!
//! This module defines the six faces of a voxel block and the integer normals
//! used when walking from a voxel to its neighbours.
//!
//! The vertical axis grows downward: `UP` faces look towards `y - 1` and sit on
//! the voxel's own `y` plane, `DOWN` faces look towards `y + 1`.

use cgmath::Vector3;
use num_derive::FromPrimitive;

/// Represents the six possible faces of a voxel block.
///
/// The discriminant is stored in the top byte of a face key, so the order is
/// part of the geometry format: [UP, DOWN, LEFT, RIGHT, FRONT, BACK]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, FromPrimitive)]
pub enum BlockSide {
    /// The top face (facing negative Y, towards the sky)
    UP = 0,

    /// The bottom face (facing positive Y)
    DOWN = 1,

    /// The left face (facing negative X)
    LEFT = 2,

    /// The right face (facing positive X)
    RIGHT = 3,

    /// The front face (facing negative Z)
    FRONT = 4,

    /// The back face (facing positive Z)
    BACK = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in discriminant order.
    ///
    /// # Returns
    /// An array containing all `BlockSide` variants.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::UP,
            BlockSide::DOWN,
            BlockSide::LEFT,
            BlockSide::RIGHT,
            BlockSide::FRONT,
            BlockSide::BACK,
        ]
    }

    /// Converts a raw discriminant back into a side.
    pub fn from_int(value: u8) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(value)
    }

    /// The outward unit normal of this face in voxel space.
    pub fn normal(self) -> Vector3<i32> {
        match self {
            BlockSide::UP => Vector3::new(0, -1, 0),
            BlockSide::DOWN => Vector3::new(0, 1, 0),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
            BlockSide::FRONT => Vector3::new(0, 0, -1),
            BlockSide::BACK => Vector3::new(0, 0, 1),
        }
    }

    /// The face on the other side of the shared boundary.
    ///
    /// # Returns
    /// `RIGHT` for `LEFT`, `DOWN` for `UP` and so on.
    pub fn opposite(self) -> Self {
        match self {
            BlockSide::UP => BlockSide::DOWN,
            BlockSide::DOWN => BlockSide::UP,
            BlockSide::LEFT => BlockSide::RIGHT,
            BlockSide::RIGHT => BlockSide::LEFT,
            BlockSide::FRONT => BlockSide::BACK,
            BlockSide::BACK => BlockSide::FRONT,
        }
    }

    /// Whether this face is the positive side of its axis (`DOWN`, `RIGHT`, `BACK`).
    ///
    /// A ray crossing a grid plane through a positive face ends up in the voxel
    /// just below the plane index.
    pub fn is_positive(self) -> bool {
        matches!(self, BlockSide::DOWN | BlockSide::RIGHT | BlockSide::BACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_an_involution_with_negated_normal() {
        for side in BlockSide::all() {
            assert_eq!(side.opposite().opposite(), side);
            assert_eq!(side.opposite().normal(), -side.normal());
        }
    }

    #[test]
    fn discriminants_round_trip() {
        for side in BlockSide::all() {
            assert_eq!(BlockSide::from_int(side as u8), Some(side));
        }
        assert_eq!(BlockSide::from_int(6), None);
    }
}
