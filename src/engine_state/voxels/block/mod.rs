//! # Block Module
//!
//! Block materials and block faces. Everything the mesher, the editor and the
//! ray picker need to know about a single voxel lives here.

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in memory.
pub type BlockTypeSize = u8;
