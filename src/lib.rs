#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Stream
//!
//! A streaming voxel terrain engine: an effectively infinite height-field
//! world kept as a bounded window of chunk geometry around a moving viewer,
//! with single-block edits applied in place and remembered across scrolling.
//!
//! ## Key Modules
//!
//! * `config` - JSON configuration with defaults for every field
//! * `engine_state` - The world window, meshing, geometry arena and the
//!   graphics device surface
//!
//! ## Architecture
//!
//! * Terrain is generated per chunk from fractal noise and meshed into packed
//!   faces; chunks near the viewer keep voxels and a face index for editing
//! * Geometry lives in regions of large device blocks handed out by an arena
//! * The device is reached through the `GraphicsDevice` trait, backed by
//!   process memory or by wgpu
//!
//! ## Usage
//!
//! ```ignore
//! fn main() {
//!     voxel_stream::init_logging();
//!     voxel_stream::run().unwrap();
//! }
//! ```
//!
//! ## Performance Considerations
//!
//! * Scrolling regenerates one line of chunks and rotates a handle table
//! * Regenerated geometry is staged and copied in one batch per step
//! * Edits patch at most six face slots and never re-mesh

use std::fmt;

use cgmath::{InnerSpace, Point3, Vector3};
use log::{debug, info};
use web_time::Instant;

use config::{Backend, ConfigError, EngineConfig};
use engine_state::{
    device::{
        host_device::HostDevice, wgpu_device::WgpuDevice, DeviceContext, DeviceError,
        GraphicsDevice,
    },
    rendering::DrawCall,
    voxels::world::WorldError,
    EngineState,
};

pub mod config;
pub mod engine_state;

/// Frames between two scripted edits of the demo.
const DEMO_EDIT_INTERVAL: u32 = 60;

/// Errors that end a session.
#[derive(Debug)]
pub enum EngineError {
    /// The configuration could not be loaded
    Config(ConfigError),
    /// The graphics device could not be created
    Device(DeviceError),
    /// The world failed
    World(WorldError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Config(err) => write!(f, "{err}"),
            EngineError::Device(err) => write!(f, "{err}"),
            EngineError::World(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Config(err) => Some(err),
            EngineError::Device(err) => Some(err),
            EngineError::World(err) => Some(err),
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::Config(err)
    }
}

impl From<DeviceError> for EngineError {
    fn from(err: DeviceError) -> Self {
        EngineError::Device(err)
    }
}

impl From<WorldError> for EngineError {
    fn from(err: WorldError) -> Self {
        EngineError::World(err)
    }
}

/// What a demo session did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DemoStats {
    /// Frames run
    pub frames: u32,
    /// Scroll steps taken
    pub scrolls: u32,
    /// Blocks placed
    pub placed: u32,
    /// Blocks removed
    pub destroyed: u32,
    /// Chunk draws recorded over all frames
    pub draws: u64,
}

/// Initialises `env_logger` from `RUST_LOG`, writing to stdout.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();
    info!("Logger initialized");
}

/// Loads the configuration and runs the headless demo on the configured backend.
pub fn run() -> Result<DemoStats, EngineError> {
    let config = EngineConfig::load()?;
    let stats = match config.backend {
        Backend::Host => {
            let mut device = HostDevice::new(config.host_alignment);
            if let Some(limit) = config.host_memory_limit {
                device = device.with_memory_limit(limit);
            }
            run_demo(DeviceContext::new(device), &config)?
        }
        Backend::Wgpu => {
            let device = WgpuDevice::request_headless()?;
            run_demo(DeviceContext::new(device), &config)?
        }
    };
    info!("{:?}", stats);
    Ok(stats)
}

/// Walks a viewer along `+x` across the terrain for `demo_frames` frames.
///
/// The viewer follows the ground, and every [`DEMO_EDIT_INTERVAL`] frames
/// digs out the block ahead of it and puts the selected material back on the
/// next solid block.
pub fn run_demo<D: GraphicsDevice>(
    device: DeviceContext<D>,
    config: &EngineConfig,
) -> Result<DemoStats, EngineError> {
    let start = Instant::now();
    let mut engine = EngineState::new(device, config)?;
    let mut stats = DemoStats::default();

    let origin = engine.world().hot_origin();
    let mut position = Point3::new(
        ((origin.x + 1) * engine_state::voxels::chunk::CHUNK_WIDTH) as f32 + 0.5,
        0.0,
        ((origin.y + 1) * engine_state::voxels::chunk::CHUNK_DEPTH) as f32 + 0.5,
    );
    let look = Vector3::new(1.0, 0.6, 0.0).normalize();
    let mut draws: Vec<DrawCall> = Vec::new();

    for frame in 0..config.demo_frames {
        position.x += config.demo_speed;
        let world = engine.world();
        if let Some(eye) = world.resolve_ground(position) {
            position.y = eye;
        } else if let Some(surface) =
            world.surface_height(position.x.floor() as i32, position.z.floor() as i32)
        {
            position.y = surface as f32 - 1.75;
        }
        if !world.open_sides(position).positive_x {
            debug!("frame {}: walking into a wall at {:?}", frame, position);
        }

        if engine.update(position)? {
            stats.scrolls += 1;
        }
        if frame % DEMO_EDIT_INTERVAL == 0 && engine.destroy_targeted(position, look)? {
            stats.destroyed += 1;
        }
        if frame % DEMO_EDIT_INTERVAL == DEMO_EDIT_INTERVAL / 2 && engine.place_targeted(position, look)? {
            stats.placed += 1;
        }

        draws.clear();
        stats.draws += engine.draw(&mut draws, position, look) as u64;
        stats.frames += 1;
    }

    engine.world().arena().log_usage();
    info!(
        "demo finished in {:?}, {} edits logged across {} chunks",
        start.elapsed(),
        stats.placed + stats.destroyed,
        engine.world().edit_log().edited_chunks().count()
    );
    Ok(stats)
}
