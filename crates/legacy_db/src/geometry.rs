//! World coordinates and chunk keys.
//!
//! A chunk is a 16x16 column of blocks. Settlements claim land by chunk and
//! store each claim as a packed 64-bit key: the chunk X coordinate in the low
//! 32 bits, the chunk Z coordinate in the high 32 bits.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Packed `(chunk x, chunk z)` pair.
pub type ChunkKey = i64;

/// Number of bits to shift a block coordinate to get its chunk coordinate.
pub const CHUNK_SHIFT: u32 = 4;

pub const fn chunk_key(chunk_x: i32, chunk_z: i32) -> ChunkKey {
    (chunk_x as u32 as i64) | ((chunk_z as u32 as i64) << 32)
}

pub const fn chunk_key_x(key: ChunkKey) -> i32 {
    key as i32
}

pub const fn chunk_key_z(key: ChunkKey) -> i32 {
    (key >> 32) as i32
}

pub const fn block_to_chunk(block: i32) -> i32 {
    block >> CHUNK_SHIFT
}

/// Key of the chunk containing block `(x, z)`.
pub const fn chunk_key_at(block_x: i32, block_z: i32) -> ChunkKey {
    chunk_key(block_to_chunk(block_x), block_to_chunk(block_z))
}

/// An integer block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3i {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise minimum and maximum of two corners.
    pub fn bounds(a: Self, b: Self) -> (Self, Self) {
        (
            Self::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            Self::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        )
    }

    pub fn distance_squared(&self, other: &Self) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        let dz = i64::from(self.z) - i64::from(other.z);
        dx * dx + dy * dy + dz * dz
    }
}

impl fmt::Display for Vec3i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// A block position inside a named world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub world: CompactString,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Location {
    pub fn new(world: impl Into<CompactString>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    pub fn block(&self) -> Vec3i {
        Vec3i::new(self.x, self.y, self.z)
    }

    pub fn chunk_key(&self) -> ChunkKey {
        chunk_key_at(self.x, self.z)
    }
}

/// Squared horizontal distance between two points, ignoring height.
pub fn distance_squared_xz(ax: i32, az: i32, bx: i32, bz: i32) -> i64 {
    let dx = i64::from(ax) - i64::from(bx);
    let dz = i64::from(az) - i64::from(bz);
    dx * dx + dz * dz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_keys_round_trip_negative_coordinates() {
        for (x, z) in [(0, 0), (1, 0), (-1, 5), (i32::MIN, i32::MAX), (-30, -2)] {
            let key = chunk_key(x, z);
            assert_eq!((chunk_key_x(key), chunk_key_z(key)), (x, z));
        }
        assert_ne!(chunk_key(1, 0), chunk_key(0, 1));
    }

    #[test]
    fn blocks_map_to_their_chunk() {
        assert_eq!(chunk_key_at(0, 0), chunk_key(0, 0));
        assert_eq!(chunk_key_at(15, 15), chunk_key(0, 0));
        assert_eq!(chunk_key_at(16, 0), chunk_key(1, 0));
        assert_eq!(chunk_key_at(-1, -16), chunk_key(-1, -1));
        assert_eq!(chunk_key_at(-17, 0), chunk_key(-2, 0));
    }

    #[test]
    fn bounds_normalise_corners() {
        let (min, max) = Vec3i::bounds(Vec3i::new(5, 0, -2), Vec3i::new(1, 9, 3));
        assert_eq!(min, Vec3i::new(1, 0, -2));
        assert_eq!(max, Vec3i::new(5, 9, 3));
    }
}
