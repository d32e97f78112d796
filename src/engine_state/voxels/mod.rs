//! # Voxel Engine Core
//!
//! Voxel data, terrain generation and the streaming world.
//!
//! ## Architecture
//!
//! * **Block**: materials and face sides
//! * **Chunk**: chunk dimensions, the terrain generator and the state a hot
//!   chunk carries
//! * **Ray**: candidate voxels along the view ray for block targeting
//! * **World**: the scrolling window of chunk geometry and its edit log
//!
//! ## Coordinates
//!
//! `x` and `z` are horizontal, `y` grows downward from the sky ceiling at
//! row 0. Chunk coordinates are `Vector2<i32>` with `.y` holding the `z` axis.

pub mod block;
pub mod chunk;
pub mod ray;
pub mod world;
