//! Default structure generators.
//!
//! Placement decisions are pure functions of the world seed, absolute voxel
//! coordinates, and the neighborhood's terrain, so a structure straddling a
//! chunk seam is decided identically no matter which side is decorated first.

mod lamps;
mod plants;
mod trees;

pub use lamps::Lamps;
pub use plants::Plants;
pub use trees::Trees;

use noise::{NoiseFn, Perlin};

use strata_common::BlockId;

use crate::blocks::BlockRegistry;
use crate::builder::Neighborhood;

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Random generator seeded by the world seed, a column, and a per-use salt.
pub(crate) fn column_rng(seed: u32, vx: i32, vz: i32, salt: u64) -> fastrand::Rng {
    let column = (u64::from(vx as u32) << 32) | u64::from(vz as u32);
    fastrand::Rng::with_seed(splitmix64(column ^ splitmix64(u64::from(seed) ^ salt)))
}

/// Octave-summed Perlin noise in `[-1, 1]`.
pub(crate) fn fractal(noise: &Perlin, point: [f64; 3], frequency: f64, octaves: u32) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut norm = 0.0;
    let mut freq = frequency;
    for _ in 0..octaves.max(1) {
        total += noise.get([point[0] * freq, point[1] * freq, point[2] * freq]) * amplitude;
        norm += amplitude;
        amplitude *= 0.5;
        freq *= 2.0;
    }
    total / norm
}

/// Sparse 2D placement field: a column is selected when its noise value
/// exceeds a threshold and every adjacent column's value.
#[derive(Debug, Clone)]
pub(crate) struct PeakField {
    noise: Perlin,
    frequency: f64,
    threshold: f64,
}

impl PeakField {
    pub(crate) fn new(seed: u32, frequency: f64, threshold: f64) -> Self {
        Self {
            noise: Perlin::new(seed),
            frequency,
            threshold,
        }
    }

    fn sample(&self, vx: i32, vz: i32) -> f64 {
        self.noise.get([
            f64::from(vx) * self.frequency,
            f64::from(vz) * self.frequency,
        ])
    }

    pub(crate) fn is_peak(&self, vx: i32, vz: i32) -> bool {
        let value = self.sample(vx, vz);
        value > self.threshold
            && strata_common::NEIGHBOR_OFFSETS
                .iter()
                .all(|&(dx, dz)| self.sample(vx + dx, vz + dz) < value)
    }
}

/// Blocks that plants and trees may stand on.
pub(crate) fn plantable_blocks(registry: &BlockRegistry) -> Vec<BlockId> {
    registry
        .iter()
        .filter(|(_, block)| block.is_plantable)
        .map(|(id, _)| id)
        .collect()
}

/// Surface columns of the center chunk as `(vx, top, vz)`.
pub(crate) fn surface(neighborhood: &Neighborhood<'_>) -> Vec<(i32, i32, i32)> {
    let min = neighborhood.min();
    let max = neighborhood.max();
    let mut columns = Vec::new();
    for vx in min.x..max.x {
        for vz in min.z..max.z {
            if let Some(top) = neighborhood.column_top(vx, vz) {
                columns.push((vx, top, vz));
            }
        }
    }
    columns
}
