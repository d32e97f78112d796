//! # Engine State Module
//!
//! The session layer around the streaming world.
//!
//! ## Key Components
//!
//! * `EngineState` - Owns the world and the selected material, turns view
//!   positions into scroll steps and view rays into block edits
//! * `buffer_state` - Arena allocation of geometry memory
//! * `device` - The graphics device surface and its backends
//! * `rendering` - Face encoding, meshing and draw recording
//! * `voxels` - Blocks, chunks, terrain, ray picking and the world window
//!
//! ## Architecture
//!
//! The engine has no window and no input handling of its own. A frontend
//! feeds it the viewer's position and view direction each frame and forwards
//! edit requests; `EngineState` does the rest on a single thread.

use cgmath::{Point3, Vector2, Vector3};
use log::debug;

use crate::config::EngineConfig;
use device::{DeviceContext, GraphicsDevice};
use rendering::DrawRecorder;
use voxels::{
    block::block_type::BlockType,
    chunk::{CHUNK_DEPTH, CHUNK_WIDTH},
    ray::{cast_ray, RayHit},
    world::{World, WorldError},
};

pub mod buffer_state;
pub mod device;
pub mod rendering;
pub mod voxels;

/// The chunk coordinate whose corner is nearest to a view position.
///
/// This is what the window centre `offset + side/2` is compared against.
pub fn view_chunk(view_position: Point3<f32>) -> Vector2<i32> {
    Vector2::new(
        (view_position.x / CHUNK_WIDTH as f32).round() as i32,
        (view_position.z / CHUNK_DEPTH as f32).round() as i32,
    )
}

/// The main state container for the engine
///
/// Owns the [`World`] and the material new blocks are made of.
pub struct EngineState<D: GraphicsDevice> {
    world: World<D>,
    selected: BlockType,
}

impl<D: GraphicsDevice> EngineState<D> {
    /// Builds the world on a device.
    ///
    /// # Arguments
    ///
    /// * `device` - Shared handle to the graphics device
    /// * `config` - Engine configuration
    pub fn new(device: DeviceContext<D>, config: &EngineConfig) -> Result<Self, WorldError> {
        let world = World::new(device, &config.world)?;
        Ok(Self {
            world,
            selected: config.selected_material,
        })
    }

    /// Per-frame update.
    ///
    /// Commits a finished transfer and scrolls at most one step towards the
    /// viewer's chunk.
    ///
    /// # Returns
    /// `Ok(true)` if the window moved.
    pub fn update(&mut self, view_position: Point3<f32>) -> Result<bool, WorldError> {
        self.world.poll_transfers();
        self.world.move_towards(view_chunk(view_position))
    }

    /// Removes the nearest removable block along the view ray.
    ///
    /// Candidates are tried front to back until one edit succeeds.
    ///
    /// # Returns
    /// `Ok(true)` if a block was removed.
    pub fn destroy_targeted(
        &mut self,
        view_position: Point3<f32>,
        view_direction: Vector3<f32>,
    ) -> Result<bool, WorldError> {
        for hit in cast_ray(view_position, view_direction) {
            if self.world.destroy_block(hit.side, hit.voxel)? {
                debug!("destroyed {:?} through its {:?} face", hit.voxel, hit.side);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Places the selected material against the nearest block along the view
    /// ray that accepts it.
    ///
    /// # Returns
    /// `Ok(true)` if a block was placed.
    pub fn place_targeted(
        &mut self,
        view_position: Point3<f32>,
        view_direction: Vector3<f32>,
    ) -> Result<bool, WorldError> {
        for hit in cast_ray(view_position, view_direction) {
            if self.world.place_block(self.selected, hit.side, hit.voxel)? {
                debug!("placed {:?} on the {:?} face of {:?}", self.selected, hit.side, hit.voxel);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The nearest ray candidate holding a solid block, for highlighting.
    pub fn target(&self, view_position: Point3<f32>, view_direction: Vector3<f32>) -> Option<RayHit> {
        cast_ray(view_position, view_direction).find(|hit| {
            self.world
                .block_at(hit.voxel)
                .is_some_and(|block| !block.is_air())
        })
    }

    /// Changes the material placed by [`place_targeted`](Self::place_targeted).
    ///
    /// Air cannot be selected.
    ///
    /// # Returns
    /// `true` if the selection changed.
    pub fn select_material(&mut self, block_type: BlockType) -> bool {
        if block_type.is_air() {
            return false;
        }
        self.selected = block_type;
        true
    }

    /// The material placed by [`place_targeted`](Self::place_targeted).
    pub fn selected_material(&self) -> BlockType {
        self.selected
    }

    /// Records the frame's chunk draws.
    pub fn draw(
        &mut self,
        recorder: &mut impl DrawRecorder,
        view_position: Point3<f32>,
        view_direction: Vector3<f32>,
    ) -> usize {
        self.world.draw(recorder, view_position, view_direction)
    }

    /// The world.
    pub fn world(&self) -> &World<D> {
        &self.world
    }

    /// The world, mutably.
    pub fn world_mut(&mut self) -> &mut World<D> {
        &mut self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_chunks_round_to_the_nearest_corner() {
        assert_eq!(view_chunk(Point3::new(0.0, 100.0, 0.0)), Vector2::new(0, 0));
        assert_eq!(view_chunk(Point3::new(31.0, 0.0, 32.0)), Vector2::new(0, 1));
        assert_eq!(view_chunk(Point3::new(-40.0, 0.0, 130.0)), Vector2::new(-1, 2));
    }
}
