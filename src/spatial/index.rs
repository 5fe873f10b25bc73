use macroquad::prelude::*;
use std::collections::HashMap;

/// Chunks are this many tiles wide; a tile is filed under the chunk holding its centre.
pub const CHUNK_TILES: f32 = 16.0;

pub const FLIP_H: u32 = 0x8000_0000; // bit 31
pub const FLIP_V: u32 = 0x4000_0000; // bit 30
pub const FLIP_D: u32 = 0x2000_0000; // bit 29
pub const GID_MASK: u32 = 0x1FFF_FFFF; // keep lower 29 bits (bit 28 is free)

/// A raw layer GID, flip flags included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId(pub u32);

impl TileId {
    #[inline] pub fn raw(self) -> u32 { self.0 }
    #[inline] pub fn clean(self) -> u32 { self.0 & GID_MASK }
    #[inline] pub fn flip_h(self) -> bool { (self.0 & FLIP_H) != 0 }
    #[inline] pub fn flip_v(self) -> bool { (self.0 & FLIP_V) != 0 }
    #[inline] pub fn flip_d(self) -> bool { (self.0 & FLIP_D) != 0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy)]
struct TileRec {
    tile: usize,
    center: Vec2,
    half: Vec2,
}

/// World-space buckets of placed tiles, for point and box queries.
pub struct TileIndex {
    chunk_size: f32,
    buckets: HashMap<ChunkCoord, Vec<TileRec>>,
    largest_half: Vec2,
}

impl TileIndex {
    /// `cell` is the world size of one map tile.
    pub fn new(cell: Vec2) -> Self {
        let side = cell.x.max(cell.y).max(f32::EPSILON) * CHUNK_TILES;
        TileIndex {
            chunk_size: side,
            buckets: HashMap::new(),
            largest_half: Vec2::ZERO,
        }
    }

    #[inline]
    fn chunk_of(&self, p: Vec2) -> ChunkCoord {
        ChunkCoord {
            x: (p.x / self.chunk_size).floor() as i32,
            y: (p.y / self.chunk_size).floor() as i32,
        }
    }

    pub fn insert(&mut self, tile: usize, center: Vec2, size: Vec2) {
        let half = size * 0.5;
        self.largest_half = self.largest_half.max(half);
        let cc = self.chunk_of(center);
        self.buckets
            .entry(cc)
            .or_default()
            .push(TileRec { tile, center, half });
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.largest_half = Vec2::ZERO;
    }

    /// Tiles whose rectangle overlaps `[min, max]`, ascending by tile index.
    pub fn query_rect(&self, min: Vec2, max: Vec2) -> Vec<usize> {
        let (min, max) = (min.min(max), min.max(max));
        // a tile may stick out of the chunk holding its centre
        let lo = self.chunk_of(min - self.largest_half);
        let hi = self.chunk_of(max + self.largest_half);

        let mut hits = Vec::new();
        for cy in lo.y..=hi.y {
            for cx in lo.x..=hi.x {
                let Some(bucket) = self.buckets.get(&ChunkCoord { x: cx, y: cy }) else {
                    continue;
                };
                for rec in bucket {
                    let t_min = rec.center - rec.half;
                    let t_max = rec.center + rec.half;
                    if t_min.x <= max.x && t_max.x >= min.x && t_min.y <= max.y && t_max.y >= min.y {
                        hits.push(rec.tile);
                    }
                }
            }
        }
        hits.sort_unstable();
        hits
    }

    pub fn query_point(&self, p: Vec2) -> Vec<usize> {
        self.query_rect(p, p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_bits_are_stripped() {
        let id = TileId(5 | FLIP_H | FLIP_D);
        assert_eq!(id.clean(), 5);
        assert!(id.flip_h());
        assert!(!id.flip_v());
        assert!(id.flip_d());
    }

    #[test]
    fn point_query_finds_the_covering_tile() {
        let mut index = TileIndex::new(vec2(1.0, 1.0));
        for i in 0..40 {
            index.insert(i, vec2(i as f32 + 0.5, 0.5), Vec2::ONE);
        }
        assert_eq!(index.query_point(vec2(17.2, 0.3)), vec![17]);
        assert!(index.query_point(vec2(17.2, 3.0)).is_empty());
    }

    #[test]
    fn rect_query_crosses_chunk_borders() {
        let mut index = TileIndex::new(vec2(1.0, 1.0));
        for i in 0..40 {
            index.insert(i, vec2(i as f32 - 19.5, -0.5), Vec2::ONE);
        }
        // spans the chunk boundary at x = 0 and x = -16
        let hits = index.query_rect(vec2(-16.5, -0.9), vec2(0.2, -0.1));
        assert_eq!(hits.first(), Some(&3));
        assert_eq!(hits.last(), Some(&20));
        assert_eq!(hits.len(), 18);
    }
}
