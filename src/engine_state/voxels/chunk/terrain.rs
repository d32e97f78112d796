//! # Terrain Module
//!
//! Height maps and column classification.
//!
//! Heights come from two dimensional fractal Perlin noise sampled at absolute
//! column coordinates, so two chunks that share an edge sample identical values
//! along it. A chunk's height map is `(CHUNK_WIDTH + 1) × (CHUNK_DEPTH + 1)`:
//! the extra row and column belong to the `+x` and `+z` neighbours and let the
//! mesher compare each column against its forward neighbours without looking
//! outside the chunk.

use cgmath::Vector2;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use super::{
    BEDROCK_LAYER_HEIGHT, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, FIRST_LAYER_HEIGHT,
    SECOND_LAYER_HEIGHT,
};
use crate::engine_state::voxels::block::block_type::BlockType;

/// Scaling factor applied to absolute column coordinates when sampling noise.
pub const NOISE_FREQUENCY: f64 = 0.005;
/// Octaves of the fractal noise.
pub const NOISE_OCTAVES: usize = 3;

/// Noise values are clamped to this range before being turned into heights.
const HEIGHT_NOISE_RANGE: (f32, f32) = (-0.7, 0.1);
/// Terrain rows per unit of clamped noise.
const HEIGHT_SCALE: f32 = 150.0;
/// Row of a column whose noise sample is zero.
const HEIGHT_BASE: i32 = 185;

/// Samples per height map row (`x`).
pub const HEIGHT_MAP_WIDTH: usize = CHUNK_WIDTH as usize + 1;
/// Samples per height map column (`z`).
pub const HEIGHT_MAP_DEPTH: usize = CHUNK_DEPTH as usize + 1;

/// Raw noise samples for one chunk, indexed by local `(x, z)`.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightMap {
    samples: Vec<f32>,
}

impl HeightMap {
    /// The noise sample of local column `(x, z)`, both in `0..=extent`.
    pub fn get(&self, x: usize, z: usize) -> f32 {
        self.samples[x * HEIGHT_MAP_DEPTH + z]
    }

    /// Classified profile of local column `(x, z)`.
    pub fn profile(&self, x: usize, z: usize) -> ColumnProfile {
        classify(self.get(x, z))
    }
}

/// Materials and surface row of one terrain column.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColumnProfile {
    /// Surface, sub-surface and deep materials
    pub materials: [BlockType; 3],
    /// Row of the surface voxel. Everything above (smaller `y`) is air.
    pub height: i32,
}

impl ColumnProfile {
    /// The material of row `y` in this column, bedrock included.
    pub fn material_at(&self, y: i32) -> BlockType {
        let depth = y - self.height;
        if depth < 0 {
            BlockType::AIR
        } else if y >= CHUNK_HEIGHT - BEDROCK_LAYER_HEIGHT {
            BlockType::BEDROCK
        } else if depth < FIRST_LAYER_HEIGHT {
            self.materials[0]
        } else if depth < FIRST_LAYER_HEIGHT + SECOND_LAYER_HEIGHT {
            self.materials[1]
        } else {
            self.materials[2]
        }
    }
}

/// Maps a noise sample to banded materials and a surface row.
///
/// Total over every `f32`, NaN included: a NaN sample clamps to the lower bound.
pub fn classify(sample: f32) -> ColumnProfile {
    let (low, high) = HEIGHT_NOISE_RANGE;
    let clamped = if sample.is_nan() { low } else { sample.clamp(low, high) };
    let height = (clamped * HEIGHT_SCALE) as i32 + HEIGHT_BASE;

    let materials = if height >= 200 {
        [BlockType::WATER, BlockType::WATER, BlockType::WATER]
    } else if height >= 194 {
        [BlockType::SAND, BlockType::SAND, BlockType::STONE]
    } else if height >= 144 {
        [BlockType::GRASS, BlockType::DIRT, BlockType::STONE]
    } else {
        [BlockType::SNOW, BlockType::DIRT, BlockType::STONE]
    };

    ColumnProfile { materials, height }
}

/// Deterministic height source shared by every chunk of a world.
#[derive(Clone, Debug)]
pub struct TerrainGenerator {
    seed: u32,
    noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    /// Creates a generator. The seed is fixed for the generator's lifetime.
    pub fn new(seed: u32) -> Self {
        let noise = Fbm::<Perlin>::new(seed)
            .set_octaves(NOISE_OCTAVES)
            .set_frequency(NOISE_FREQUENCY);
        Self { seed, noise }
    }

    /// The seed this generator was created with.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Samples the height map of a chunk.
    ///
    /// # Arguments
    /// * `chunk` - Absolute chunk coordinate `(x, z)`
    pub fn generate_height_map(&self, chunk: Vector2<i32>) -> HeightMap {
        let origin_x = chunk.x as f64 * CHUNK_WIDTH as f64;
        let origin_z = chunk.y as f64 * CHUNK_DEPTH as f64;

        let mut samples = Vec::with_capacity(HEIGHT_MAP_WIDTH * HEIGHT_MAP_DEPTH);
        for x in 0..HEIGHT_MAP_WIDTH {
            for z in 0..HEIGHT_MAP_DEPTH {
                let point = [origin_x + x as f64, origin_z + z as f64];
                samples.push(self.noise.get(point) as f32);
            }
        }
        HeightMap { samples }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_total_and_banded() {
        let mut sample = -2.0f32;
        while sample <= 2.0 {
            let profile = classify(sample);
            assert!((80..=200).contains(&profile.height));
            assert!(profile.height + FIRST_LAYER_HEIGHT + SECOND_LAYER_HEIGHT
                < CHUNK_HEIGHT - BEDROCK_LAYER_HEIGHT);
            sample += 0.01;
        }
        assert_eq!(classify(f32::NAN).height, 80);
        assert_eq!(classify(f32::INFINITY).materials[0], BlockType::WATER);
        assert_eq!(classify(f32::NEG_INFINITY).materials[0], BlockType::SNOW);
    }

    #[test]
    fn thresholds_pick_expected_materials() {
        assert_eq!(classify(0.1).materials, [BlockType::WATER; 3]);
        assert_eq!(classify(0.07).materials[0], BlockType::SAND);
        assert_eq!(classify(-0.2).materials[0], BlockType::GRASS);
        assert_eq!(classify(-0.5).materials[0], BlockType::SNOW);
    }

    #[test]
    fn column_banding_follows_depth() {
        let profile = classify(-0.2);
        let h = profile.height;
        assert_eq!(profile.material_at(h - 1), BlockType::AIR);
        assert_eq!(profile.material_at(h), BlockType::GRASS);
        assert_eq!(profile.material_at(h + 1), BlockType::DIRT);
        assert_eq!(profile.material_at(h + 4), BlockType::DIRT);
        assert_eq!(profile.material_at(h + 5), BlockType::STONE);
        assert_eq!(profile.material_at(CHUNK_HEIGHT - 1), BlockType::BEDROCK);
        assert_eq!(profile.material_at(CHUNK_HEIGHT - 4), BlockType::BEDROCK);
        assert_eq!(profile.material_at(CHUNK_HEIGHT - 5), BlockType::STONE);
    }

    #[test]
    fn height_maps_are_reproducible_and_seamless() {
        let terrain = TerrainGenerator::new(7);
        let a = terrain.generate_height_map(Vector2::new(3, -2));
        assert_eq!(a, terrain.generate_height_map(Vector2::new(3, -2)));

        let right = terrain.generate_height_map(Vector2::new(4, -2));
        let back = terrain.generate_height_map(Vector2::new(3, -1));
        for k in 0..HEIGHT_MAP_DEPTH {
            assert_eq!(a.get(HEIGHT_MAP_WIDTH - 1, k), right.get(0, k));
        }
        for k in 0..HEIGHT_MAP_WIDTH {
            assert_eq!(a.get(k, HEIGHT_MAP_DEPTH - 1), back.get(k, 0));
        }
    }
}
