//! Rendering interface of the streaming engine.
//!
//! The engine does not own a render pipeline. It describes what to draw as a
//! list of [`DrawCall`]s handed to a [`DrawRecorder`]: one non-indexed draw per
//! visible chunk, covering the chunk's logical geometry, with the chunk origin
//! the shader adds to the packed local positions.

use cgmath::Point3;

use crate::engine_state::device::BufferHandle;

pub mod meshing;
pub mod vertex;

/// One chunk draw.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    /// Buffer holding the chunk's geometry
    pub buffer: BufferHandle,
    /// Byte offset of the geometry inside the buffer
    pub byte_offset: u64,
    /// Vertices to draw, destroyed faces included
    pub vertex_count: u32,
    /// World position of the chunk's local origin
    pub chunk_origin: Point3<i32>,
}

/// Receives draw instructions.
pub trait DrawRecorder {
    /// Records the draw of one chunk.
    fn draw_chunk(&mut self, call: DrawCall);
}

impl DrawRecorder for Vec<DrawCall> {
    fn draw_chunk(&mut self, call: DrawCall) {
        self.push(call);
    }
}
