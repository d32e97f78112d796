//! # World Module
//!
//! The streaming window of terrain around the viewer.
//!
//! ## Architecture
//!
//! The world owns a `side × side` grid of chunk geometry regions carved from
//! the [`ArenaBufferManager`], addressed through a ring handle table
//! ([`window::WindowGrid`]). Logical slot `(i, j)` holds absolute chunk
//! `offset + (i, j)`.
//!
//! The 2×2 block of slots `side/2 - 1` and `side/2` on both axes is hot: each
//! of those chunks additionally keeps its full voxel array and face table so
//! single blocks can be placed or removed by patching face slots in place.
//! Every other chunk is cold and keeps nothing but geometry.
//!
//! Every edit is appended to an [`edit_log::EditLog`] keyed by absolute chunk
//! coordinate. Whenever a chunk is generated again, because it re-enters the
//! window or becomes hot, its log is replayed so edits survive any amount of
//! scrolling.
//!
//! ## Performance Considerations
//!
//! * Scrolling rotates the handle table and regenerates one line of chunks,
//!   never the whole window
//! * Cold regeneration is staged and copied in one batch, gated by a single
//!   in-flight fence
//! * Hot chunks moving within the 2×2 block are moved, not rebuilt
//! * Edits touch at most six face slots and never re-mesh

use std::{fmt, time::Duration};

use cgmath::{InnerSpace, Point3, Vector2, Vector3};
use log::{info, warn};
use web_time::Instant;

use crate::{
    config::WorldConfig,
    engine_state::{
        buffer_state::{ArenaBufferManager, ArenaError, Region},
        device::{BufferUsage, DeviceContext, DeviceError, Fence, GraphicsDevice, MemoryVisibility},
        rendering::{
            meshing::{
                face::{Face, FACE_SIZE},
                face_table::{FaceStore, StoreFull},
            },
            DrawCall, DrawRecorder,
        },
        voxels::{
            block::{block_side::BlockSide, block_type::BlockType},
            chunk::{terrain::TerrainGenerator, HotChunk, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH},
        },
    },
};
use edit_log::EditLog;
use window::{ChunkSlot, WindowGrid};

pub mod edit_log;
mod editing;
mod streaming;
pub mod window;

/// Chunks facing away from the viewer are skipped beyond this squared distance.
pub const CULL_DISTANCE_SQUARED: f32 = 80_000.0;
/// Minimum cosine between the view direction and the direction to a chunk for
/// a distant chunk to be drawn.
pub const CULL_MIN_FACING: f32 = 0.2;

/// Errors raised by the world.
///
/// Rejected edits are not errors, they return `Ok(false)`.
#[derive(Debug)]
pub enum WorldError {
    /// The configuration cannot describe a window
    InvalidConfig(String),
    /// Geometry memory could not be allocated
    Arena(ArenaError),
    /// The device failed a transfer
    Device(DeviceError),
    /// Generated geometry does not fit a chunk region
    ChunkOverflow {
        /// Absolute chunk coordinate
        coord: Vector2<i32>,
        /// Faces generated
        faces: usize,
        /// Faces a region holds
        capacity: u32,
    },
    /// An edit needed a face slot and none was left
    ChunkFull {
        /// Absolute chunk coordinate
        coord: Vector2<i32>,
        /// Store failure
        source: StoreFull,
    },
    /// A region that must be host visible could not be mapped
    Unmapped {
        /// Absolute chunk coordinate
        coord: Vector2<i32>,
    },
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::InvalidConfig(reason) => write!(f, "invalid world configuration: {reason}"),
            WorldError::Arena(err) => write!(f, "geometry allocation failed: {err}"),
            WorldError::Device(err) => write!(f, "transfer failed: {err}"),
            WorldError::ChunkOverflow {
                coord,
                faces,
                capacity,
            } => write!(
                f,
                "chunk ({}, {}) generated {faces} faces, regions hold {capacity}",
                coord.x, coord.y
            ),
            WorldError::ChunkFull { coord, source } => {
                write!(f, "chunk ({}, {}): {source}", coord.x, coord.y)
            }
            WorldError::Unmapped { coord } => {
                write!(f, "geometry of chunk ({}, {}) is not host visible", coord.x, coord.y)
            }
        }
    }
}

impl std::error::Error for WorldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorldError::Arena(err) => Some(err),
            WorldError::Device(err) => Some(err),
            WorldError::ChunkFull { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ArenaError> for WorldError {
    fn from(err: ArenaError) -> Self {
        WorldError::Arena(err)
    }
}

impl From<DeviceError> for WorldError {
    fn from(err: DeviceError) -> Self {
        WorldError::Device(err)
    }
}

/// One of the four hot chunks, `(i, j)` in `{0, 1}²` relative to the hot origin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Quadrant {
    i: usize,
    j: usize,
}

impl Quadrant {
    fn all() -> [Quadrant; 4] {
        [
            Quadrant { i: 0, j: 0 },
            Quadrant { i: 0, j: 1 },
            Quadrant { i: 1, j: 0 },
            Quadrant { i: 1, j: 1 },
        ]
    }
}

/// Which horizontal neighbours of the viewer's cell can be walked into.
///
/// A side is open when both the eye voxel and the voxel below it are air.
/// Cells outside the hot window count as blocked.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenSides {
    /// The `+x` neighbour
    pub positive_x: bool,
    /// The `+z` neighbour
    pub positive_z: bool,
    /// The `-x` neighbour
    pub negative_x: bool,
    /// The `-z` neighbour
    pub negative_z: bool,
}

/// Read-only summary of one window slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkView {
    /// Logical grid position
    pub grid: (usize, usize),
    /// Absolute chunk coordinate
    pub coord: Vector2<i32>,
    /// Logical face count, destroyed faces included
    pub face_count: u32,
    /// Whether the geometry is committed
    pub ready: bool,
    /// Whether the chunk is editable
    pub hot: bool,
}

/// A chunk region seen as a face store.
///
/// Each write maps only the slots it touches, so a flush uploads the edited
/// faces and nothing else. Slot indices are checked against the capacity by
/// the face table.
struct RegionFaces<'a, D: GraphicsDevice> {
    arena: &'a ArenaBufferManager<D>,
    region: Region,
    face_count: &'a mut u32,
    capacity: u32,
}

impl<'a, D: GraphicsDevice> RegionFaces<'a, D> {
    fn new(
        arena: &'a ArenaBufferManager<D>,
        slot: &'a mut ChunkSlot,
        capacity: u32,
        coord: Vector2<i32>,
    ) -> Result<Self, WorldError> {
        if !slot.region.host_visible {
            return Err(WorldError::Unmapped { coord });
        }
        Ok(Self {
            arena,
            region: slot.region,
            face_count: &mut slot.face_count,
            capacity,
        })
    }

    /// The sub-region covering `count` slots from `first`.
    fn slots(&self, first: u32, count: usize) -> Region {
        Region {
            offset: self.region.offset + u64::from(first) * FACE_SIZE,
            size: count as u64 * FACE_SIZE,
            ..self.region
        }
    }

    /// Overwrites the region with freshly generated geometry.
    fn replace_all(&mut self, faces: &[Face]) -> Result<(), StoreFull> {
        if faces.len() > self.capacity as usize {
            return Err(StoreFull {
                capacity: self.capacity,
            });
        }
        if !faces.is_empty() {
            match self.arena.view(&self.slots(0, faces.len())) {
                Some(mut bytes) => bytes.copy_from_slice(bytemuck::cast_slice(faces)),
                None => warn!("{} faces do not fit their region {:?}", faces.len(), self.region),
            }
        }
        *self.face_count = faces.len() as u32;
        Ok(())
    }
}

impl<D: GraphicsDevice> FaceStore for RegionFaces<'_, D> {
    fn face_count(&self) -> u32 {
        *self.face_count
    }

    fn face_capacity(&self) -> u32 {
        self.capacity
    }

    fn write_face(&mut self, slot: u32, face: &Face) {
        match self.arena.view(&self.slots(slot, 1)) {
            Some(mut bytes) => bytes.copy_from_slice(bytemuck::bytes_of(face)),
            None => warn!("face slot {} lies outside its region {:?}", slot, self.region),
        }
        if slot == *self.face_count {
            *self.face_count += 1;
        }
    }
}

/// The streaming window.
pub struct World<D: GraphicsDevice> {
    arena: ArenaBufferManager<D>,
    terrain: TerrainGenerator,
    side: usize,
    face_capacity: u32,
    transfer_wait: Duration,
    offset: Vector2<i32>,
    window: WindowGrid,
    hot: [[HotChunk; 2]; 2],
    log: EditLog,
    staging: [Region; 2],
    next_staging: usize,
    pending: Option<Fence>,
}

impl<D: GraphicsDevice> World<D> {
    /// Allocates every region and builds the initial window at offset `(0, 0)`.
    ///
    /// # Arguments
    ///
    /// * `device` - The device geometry lives on
    /// * `config` - Window size, seed and capacities
    ///
    /// # Errors
    ///
    /// [`WorldError::Arena`] when the device runs out of memory. The world
    /// cannot run with fewer regions, so this is fatal for the caller.
    pub fn new(device: DeviceContext<D>, config: &WorldConfig) -> Result<Self, WorldError> {
        config
            .validate()
            .map_err(|err| WorldError::InvalidConfig(err.to_string()))?;
        let start = Instant::now();

        let side = config.side as usize;
        let seed = config.seed.unwrap_or_else(|| fastrand::u32(..));
        let region_size = u64::from(config.chunk_face_capacity) * FACE_SIZE;
        let mut arena = ArenaBufferManager::new(device, config.arena_block_size);

        let mut slots = Vec::with_capacity(side * side);
        for index in 0..side * side {
            let region = arena.create(
                BufferUsage::Geometry,
                MemoryVisibility::HostVisible,
                region_size,
                None,
            )?;
            slots.push(ChunkSlot {
                region,
                face_count: 0,
                ready: false,
                coord: Vector2::new((index / side) as i32, (index % side) as i32),
            });
        }

        let staging_size = region_size * side as u64;
        let staging = [
            arena.create(BufferUsage::Staging, MemoryVisibility::HostVisible, staging_size, None)?,
            arena.create(BufferUsage::Staging, MemoryVisibility::HostVisible, staging_size, None)?,
        ];

        let mut world = Self {
            arena,
            terrain: TerrainGenerator::new(seed),
            side,
            face_capacity: config.chunk_face_capacity,
            transfer_wait: Duration::from_millis(config.transfer_wait_ms),
            offset: Vector2::new(0, 0),
            window: WindowGrid::new(side, slots),
            hot: Default::default(),
            log: EditLog::default(),
            staging,
            next_staging: 0,
            pending: None,
        };
        world.build_initial()?;

        info!(
            "world of {}x{} chunks (seed {}) built in {:?}",
            side,
            side,
            seed,
            start.elapsed()
        );
        world.arena.log_usage();
        Ok(world)
    }

    /// Absolute chunk coordinate of logical slot `(0, 0)`.
    pub fn offset(&self) -> Vector2<i32> {
        self.offset
    }

    /// Chunks per window axis.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Seed of the terrain.
    pub fn seed(&self) -> u32 {
        self.terrain.seed()
    }

    /// Faces a chunk region holds.
    pub fn face_capacity(&self) -> u32 {
        self.face_capacity
    }

    /// The arena geometry is carved from.
    pub fn arena(&self) -> &ArenaBufferManager<D> {
        &self.arena
    }

    /// Every edit made so far.
    pub fn edit_log(&self) -> &EditLog {
        &self.log
    }

    /// The transfer still in flight, if any.
    pub fn pending_transfer(&self) -> Option<Fence> {
        self.pending
    }

    /// Logical index of the first hot row and column.
    fn hot_low(&self) -> usize {
        self.side / 2 - 1
    }

    /// Absolute chunk coordinate of hot quadrant `(0, 0)`.
    pub fn hot_origin(&self) -> Vector2<i32> {
        let low = self.hot_low() as i32;
        self.offset + Vector2::new(low, low)
    }

    /// Absolute voxel position of the hot block's `(0, _, 0)` corner.
    fn hot_base(&self) -> Vector2<i32> {
        let origin = self.hot_origin();
        Vector2::new(origin.x * CHUNK_WIDTH, origin.y * CHUNK_DEPTH)
    }

    fn quadrant_slot(&self, quadrant: Quadrant) -> (usize, usize) {
        let low = self.hot_low();
        (low + quadrant.i, low + quadrant.j)
    }

    fn quadrant_coord(&self, quadrant: Quadrant) -> Vector2<i32> {
        self.hot_origin() + Vector2::new(quadrant.i as i32, quadrant.j as i32)
    }

    fn is_hot_slot(&self, i: usize, j: usize) -> bool {
        let low = self.hot_low();
        (low..=low + 1).contains(&i) && (low..=low + 1).contains(&j)
    }

    /// Whether an absolute chunk coordinate is one of the four hot chunks.
    pub fn is_hot(&self, coord: Vector2<i32>) -> bool {
        let relative = coord - self.hot_origin();
        (0..2).contains(&relative.x) && (0..2).contains(&relative.y)
    }

    /// Maps an absolute voxel position into a hot quadrant and its local position.
    fn locate(&self, position: Point3<i32>) -> Option<(Quadrant, Point3<i32>)> {
        let base = self.hot_base();
        let (x, z) = (position.x - base.x, position.z - base.y);
        let inside = (0..2 * CHUNK_WIDTH).contains(&x)
            && (0..2 * CHUNK_DEPTH).contains(&z)
            && (0..CHUNK_HEIGHT).contains(&position.y);
        inside.then(|| {
            (
                Quadrant {
                    i: (x / CHUNK_WIDTH) as usize,
                    j: (z / CHUNK_DEPTH) as usize,
                },
                Point3::new(x % CHUNK_WIDTH, position.y, z % CHUNK_DEPTH),
            )
        })
    }

    fn hot_block(&self, quadrant: Quadrant, local: Point3<i32>) -> BlockType {
        self.hot[quadrant.i][quadrant.j].voxels.get(local)
    }

    /// The block at an absolute position, if it lies in the hot window.
    pub fn block_at(&self, position: Point3<i32>) -> Option<BlockType> {
        self.locate(position)
            .map(|(quadrant, local)| self.hot_block(quadrant, local))
    }

    /// Topmost solid row of the column at absolute `(x, z)`, if it is hot.
    pub fn surface_height(&self, x: i32, z: i32) -> Option<i32> {
        (0..CHUNK_HEIGHT).find(|&y| {
            self.block_at(Point3::new(x, y, z))
                .is_some_and(|block| !block.is_air())
        })
    }

    /// The hot chunk state of an absolute chunk coordinate.
    pub fn hot_chunk(&self, coord: Vector2<i32>) -> Option<&HotChunk> {
        Quadrant::all()
            .into_iter()
            .find(|&quadrant| self.quadrant_coord(quadrant) == coord)
            .map(|quadrant| &self.hot[quadrant.i][quadrant.j])
    }

    /// Summaries of every window slot, row-major by logical position.
    pub fn chunks(&self) -> Vec<ChunkView> {
        self.window
            .iter()
            .map(|(grid, slot)| ChunkView {
                grid,
                coord: slot.coord,
                face_count: slot.face_count,
                ready: slot.ready,
                hot: self.is_hot_slot(grid.0, grid.1),
            })
            .collect()
    }

    /// Logical geometry of a chunk in the window, destroyed slots included.
    pub fn chunk_faces(&self, coord: Vector2<i32>) -> Option<Vec<Face>> {
        let (_, slot) = self.window.iter().find(|(_, slot)| slot.coord == coord)?;
        let used = Region {
            size: u64::from(slot.face_count) * FACE_SIZE,
            ..slot.region
        };
        if used.size == 0 {
            return Some(Vec::new());
        }
        let bytes = self.arena.read(&used)?;
        Some(
            bytes
                .chunks_exact(FACE_SIZE as usize)
                .map(Face::from_bytes)
                .collect(),
        )
    }

    /// The stored face of a hot voxel's side, if that face is visible.
    pub fn face_at(&self, block_side: BlockSide, position: Point3<i32>) -> Option<Face> {
        let (quadrant, local) = self.locate(position)?;
        let (owner, owner_local) = editing::face_owner(quadrant, local, block_side)?;
        let slot_index = self.hot[owner.i][owner.j].faces.slot(block_side, owner_local)?;
        let (i, j) = self.quadrant_slot(owner);
        let slot = self.window.slot(i, j);
        let face_region = Region {
            offset: slot.region.offset + u64::from(slot_index) * FACE_SIZE,
            size: FACE_SIZE,
            ..slot.region
        };
        let bytes = self.arena.read(&face_region)?;
        Some(Face::from_bytes(&bytes))
    }

    /// Checks the four horizontal neighbours of the viewer's cell.
    pub fn open_sides(&self, position: Point3<f32>) -> OpenSides {
        let cell = Point3::new(
            position.x.floor() as i32,
            position.y.floor() as i32,
            position.z.floor() as i32,
        );
        let open = |dx: i32, dz: i32| {
            let eye = cell + Vector3::new(dx, 0, dz);
            let body = eye + Vector3::new(0, 1, 0);
            self.block_at(eye) == Some(BlockType::AIR) && self.block_at(body) == Some(BlockType::AIR)
        };
        OpenSides {
            positive_x: open(1, 0),
            positive_z: open(0, 1),
            negative_x: open(-1, 0),
            negative_z: open(0, -1),
        }
    }

    /// Corrected eye height when the viewer's feet are inside terrain.
    ///
    /// The feet sit 1.75 below the eye. If that voxel is solid, walks up to
    /// the first air voxel and returns the eye height standing on top of the
    /// solid run, otherwise `None`.
    pub fn resolve_ground(&self, position: Point3<f32>) -> Option<f32> {
        let (x, z) = (position.x.floor() as i32, position.z.floor() as i32);
        let is_solid = |y: i32| {
            self.block_at(Point3::new(x, y, z))
                .is_some_and(|block| !block.is_air())
        };

        let mut y = (position.y + 1.75).floor() as i32;
        if !is_solid(y) {
            return None;
        }
        while y >= 0 && is_solid(y) {
            y -= 1;
        }
        Some(y as f32 - 0.75)
    }

    /// Records one draw per committed, non-empty chunk.
    ///
    /// Chunks behind the viewer are skipped once their origin is farther than
    /// [`CULL_DISTANCE_SQUARED`] on the horizontal plane.
    ///
    /// # Returns
    /// The number of chunks drawn.
    pub fn draw(
        &mut self,
        recorder: &mut impl DrawRecorder,
        view_position: Point3<f32>,
        view_direction: Vector3<f32>,
    ) -> usize {
        self.poll_transfers();

        let viewer = Vector2::new(view_position.x, view_position.z);
        let front = Vector2::new(view_direction.x, view_direction.z);
        let mut drawn = 0;
        for (_, slot) in self.window.iter() {
            if !slot.ready || slot.face_count == 0 {
                continue;
            }
            let origin = Vector2::new(slot.coord.x * CHUNK_WIDTH, slot.coord.y * CHUNK_DEPTH);
            let origin_f = Vector2::new(origin.x as f32, origin.y as f32);
            let centre = origin_f
                + Vector2::new(CHUNK_WIDTH as f32 / 2.0, CHUNK_DEPTH as f32 / 2.0);
            let to_centre = centre - viewer;
            let facing = if to_centre.magnitude2() > 0.0 {
                to_centre.normalize().dot(front)
            } else {
                1.0
            };
            if facing < CULL_MIN_FACING && (origin_f - viewer).magnitude2() > CULL_DISTANCE_SQUARED
            {
                continue;
            }

            recorder.draw_chunk(DrawCall {
                buffer: slot.region.buffer,
                byte_offset: slot.region.offset,
                vertex_count: slot.face_count * 6,
                chunk_origin: Point3::new(origin.x, 0, origin.y),
            });
            drawn += 1;
        }
        drawn
    }
}
