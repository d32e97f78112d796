//! Window scrolling, cold chunk staging and hot chunk rebuilds.

use std::mem;

use cgmath::Vector2;
use log::{debug, trace, warn};
use web_time::Instant;

use super::{window::ScrollDirection, Quadrant, RegionFaces, World, WorldError};
use crate::engine_state::{
    buffer_state::Region,
    device::{BufferCopy, GraphicsDevice},
    rendering::meshing::{
        build_cold, build_hot,
        face::Face,
        HotBuild,
    },
};

impl<D: GraphicsDevice> World<D> {
    /// Fills every slot of the window at the current offset.
    ///
    /// Cold chunks go through the first staging region in batches of `side`
    /// chunks, each batch waited on before the staging region is reused.
    pub(super) fn build_initial(&mut self) -> Result<(), WorldError> {
        let cold: Vec<(usize, usize)> = (0..self.side)
            .flat_map(|i| (0..self.side).map(move |j| (i, j)))
            .filter(|&(i, j)| !self.is_hot_slot(i, j))
            .collect();

        let staging = self.staging[0];
        for batch in cold.chunks(self.side) {
            let mut cursor = 0;
            for &(i, j) in batch {
                let coord = self.offset + Vector2::new(i as i32, j as i32);
                let faces = self.regenerate_cold(coord)?;
                cursor = self.stage(staging, cursor, (i, j), coord, &faces)?;
            }
            self.arena.device().get_mut().submit_and_wait()?;
            self.mark_ready();
        }

        for quadrant in Quadrant::all() {
            let build = self.prepare_hot(self.quadrant_coord(quadrant))?;
            self.commit_hot(quadrant, build)?;
        }
        Ok(())
    }

    /// Scrolls one step towards the chunk the viewer stands on.
    ///
    /// Compares `target` with the window centre `offset + side/2`, `x` first.
    ///
    /// # Returns
    /// `Ok(true)` if the window moved.
    pub fn move_towards(&mut self, target: Vector2<i32>) -> Result<bool, WorldError> {
        let half = (self.side / 2) as i32;
        let centre = self.offset + Vector2::new(half, half);
        let direction = if target.x > centre.x {
            ScrollDirection::PositiveX
        } else if target.x < centre.x {
            ScrollDirection::NegativeX
        } else if target.y > centre.y {
            ScrollDirection::PositiveZ
        } else if target.y < centre.y {
            ScrollDirection::NegativeZ
        } else {
            return Ok(false);
        };
        self.scroll(direction)
    }

    /// Moves the window one chunk.
    ///
    /// Generates the entering line and the two chunks becoming hot first,
    /// then rotates the handle table, stages and submits the entering line,
    /// moves the hot chunks that stay hot and writes the new ones in place.
    ///
    /// # Returns
    /// `Ok(false)` without any change when the previous transfer has not
    /// completed within the configured wait.
    ///
    /// # Errors
    /// Generation failures such as [`WorldError::ChunkOverflow`] leave the
    /// window exactly as it was.
    pub fn scroll(&mut self, direction: ScrollDirection) -> Result<bool, WorldError> {
        if !self.await_transfer() {
            warn!("scroll {:?} skipped: previous transfer still in flight", direction);
            return Ok(false);
        }
        let start = Instant::now();

        let offset = self.offset + direction.step();
        let entering = self
            .window
            .entering_line(direction)
            .into_iter()
            .map(|(i, j)| {
                let coord = offset + Vector2::new(i as i32, j as i32);
                Ok(EnteringChunk {
                    grid: (i, j),
                    coord,
                    faces: self.regenerate_cold(coord)?,
                })
            })
            .collect::<Result<Vec<_>, WorldError>>()?;
        let low = self.hot_low() as i32;
        let advancing = advancing_quadrants(direction)
            .into_iter()
            .map(|quadrant| {
                let coord = offset + Vector2::new(low + quadrant.i as i32, low + quadrant.j as i32);
                Ok((quadrant, self.prepare_hot(coord)?))
            })
            .collect::<Result<Vec<_>, WorldError>>()?;

        // past this point only mapping failures remain, and every world region is host visible
        self.offset = offset;
        self.window.shift(direction);
        self.stage_entering_line(&entering)?;
        self.shift_hot(direction);
        for (quadrant, build) in advancing {
            self.commit_hot(quadrant, build)?;
        }

        debug!(
            "scrolled {:?} to offset ({}, {}) in {:?}",
            direction,
            self.offset.x,
            self.offset.y,
            start.elapsed()
        );
        Ok(true)
    }

    /// Commits the in-flight transfer if it has completed.
    ///
    /// # Returns
    /// `true` when no transfer is pending anymore.
    pub fn poll_transfers(&mut self) -> bool {
        let Some(fence) = self.pending else {
            return true;
        };
        if self.arena.device().get_mut().is_complete(fence) {
            self.finish_transfer();
            true
        } else {
            false
        }
    }

    /// Waits a bounded time for the in-flight transfer.
    fn await_transfer(&mut self) -> bool {
        let Some(fence) = self.pending else {
            return true;
        };
        if self
            .arena
            .device()
            .get_mut()
            .wait(fence, Some(self.transfer_wait))
        {
            self.finish_transfer();
            true
        } else {
            false
        }
    }

    fn finish_transfer(&mut self) {
        self.pending = None;
        self.mark_ready();
    }

    fn mark_ready(&mut self) {
        for slot in self.window.slots_mut() {
            slot.ready = true;
        }
    }

    /// Geometry of a chunk entering the window as cold.
    ///
    /// Chunks with logged face edits are generated hot so the edits can be
    /// replayed against the face index, which is dropped afterwards.
    fn regenerate_cold(&self, coord: Vector2<i32>) -> Result<Vec<Face>, WorldError> {
        let faces = if self.log.has_face_edits(coord) {
            let HotBuild { mut faces, mut chunk } = build_hot(&self.terrain, coord);
            self.log
                .replay_faces(coord, &mut chunk.faces, &mut faces)
                .map_err(|source| WorldError::ChunkFull { coord, source })?;
            trace!(
                "replayed {} face edits into cold chunk {:?}",
                self.log.face_edits(coord).len(),
                coord
            );
            faces
        } else {
            build_cold(&self.terrain, coord)
        };

        if faces.len() > self.face_capacity as usize {
            return Err(WorldError::ChunkOverflow {
                coord,
                faces: faces.len(),
                capacity: self.face_capacity,
            });
        }
        Ok(faces)
    }

    /// Writes a chunk's faces into staging at `cursor` and records the copy
    /// into its slot.
    ///
    /// # Returns
    /// The staging cursor after the written faces.
    fn stage(
        &mut self,
        staging: Region,
        cursor: u64,
        (i, j): (usize, usize),
        coord: Vector2<i32>,
        faces: &[Face],
    ) -> Result<u64, WorldError> {
        let bytes: &[u8] = bytemuck::cast_slice(faces);
        let size = bytes.len() as u64;
        let destination = self.window.slot(i, j).region;

        if size > 0 {
            let target = Region {
                offset: staging.offset + cursor,
                size,
                ..staging
            };
            self.arena
                .view(&target)
                .ok_or(WorldError::Unmapped { coord })?
                .copy_from_slice(bytes);
            self.arena.device().get_mut().copy(BufferCopy {
                src: staging.buffer,
                src_offset: target.offset,
                dst: destination.buffer,
                dst_offset: destination.offset,
                size,
            });
        }

        let slot = self.window.slot_mut(i, j);
        slot.face_count = faces.len() as u32;
        slot.ready = false;
        slot.coord = coord;
        Ok(cursor + size)
    }

    /// Stages the chunks of the line that entered with the last shift and
    /// submits them as the new in-flight transfer.
    fn stage_entering_line(&mut self, entering: &[EnteringChunk]) -> Result<(), WorldError> {
        let staging = self.staging[self.next_staging];
        self.next_staging = (self.next_staging + 1) % self.staging.len();

        let mut cursor = 0;
        for chunk in entering {
            cursor = self.stage(staging, cursor, chunk.grid, chunk.coord, &chunk.faces)?;
        }

        self.pending = Some(self.arena.device().get_mut().submit());
        debug!("staged {} bytes for {} entering chunks", cursor, entering.len());
        Ok(())
    }

    /// Moves the hot chunks that stay hot one quadrant against `direction`.
    fn shift_hot(&mut self, direction: ScrollDirection) {
        match direction {
            ScrollDirection::PositiveX | ScrollDirection::NegativeX => {
                let [low, high] = &mut self.hot;
                for j in 0..2 {
                    mem::swap(&mut low[j], &mut high[j]);
                }
            }
            ScrollDirection::PositiveZ | ScrollDirection::NegativeZ => {
                for column in &mut self.hot {
                    column.swap(0, 1);
                }
            }
        }
    }

    /// Generates a hot chunk and replays its log without touching the window.
    ///
    /// Block edits go into the voxel array, face edits into the generated
    /// faces, which must then fit a region.
    fn prepare_hot(&self, coord: Vector2<i32>) -> Result<HotBuild, WorldError> {
        let HotBuild { mut faces, mut chunk } = build_hot(&self.terrain, coord);
        self.log.replay_blocks(coord, &mut chunk.voxels);
        self.log
            .replay_faces(coord, &mut chunk.faces, &mut faces)
            .map_err(|source| WorldError::ChunkFull { coord, source })?;

        if faces.len() > self.face_capacity as usize {
            return Err(WorldError::ChunkOverflow {
                coord,
                faces: faces.len(),
                capacity: self.face_capacity,
            });
        }
        Ok(HotBuild { faces, chunk })
    }

    /// Writes a prepared hot chunk straight into its quadrant's region.
    fn commit_hot(&mut self, quadrant: Quadrant, build: HotBuild) -> Result<(), WorldError> {
        let coord = self.quadrant_coord(quadrant);
        let (i, j) = self.quadrant_slot(quadrant);
        let HotBuild { faces, chunk } = build;

        let capacity = self.face_capacity;
        RegionFaces::new(&self.arena, self.window.slot_mut(i, j), capacity, coord)?
            .replace_all(&faces)
            .map_err(|_| WorldError::ChunkOverflow {
                coord,
                faces: faces.len(),
                capacity,
            })?;

        let slot = self.window.slot_mut(i, j);
        slot.ready = true;
        slot.coord = coord;
        self.hot[quadrant.i][quadrant.j] = chunk;
        self.arena.device().get_mut().flush();
        trace!("hot chunk {:?} written with {} faces", coord, faces.len());
        Ok(())
    }
}

/// A chunk of the entering line, generated before the window moves.
struct EnteringChunk {
    grid: (usize, usize),
    coord: Vector2<i32>,
    faces: Vec<Face>,
}

/// The quadrants that become hot when the window moves in `direction`.
fn advancing_quadrants(direction: ScrollDirection) -> [Quadrant; 2] {
    match direction {
        ScrollDirection::PositiveX => [Quadrant { i: 1, j: 0 }, Quadrant { i: 1, j: 1 }],
        ScrollDirection::NegativeX => [Quadrant { i: 0, j: 0 }, Quadrant { i: 0, j: 1 }],
        ScrollDirection::PositiveZ => [Quadrant { i: 0, j: 1 }, Quadrant { i: 1, j: 1 }],
        ScrollDirection::NegativeZ => [Quadrant { i: 0, j: 0 }, Quadrant { i: 1, j: 0 }],
    }
}
