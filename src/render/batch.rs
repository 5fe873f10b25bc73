//! CPU-side vertex batches for the 2D view. Nothing here touches the GPU, so
//! the geometry can be checked without a window.

use crate::atlas::{AtlasId, UvRect};
use crate::map::TileInstance;
use crate::sheet::SheetRegistry;
use crate::sprite::Sprite;
use crate::maze::Maze;
use macroquad::prelude::*;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKey {
    Atlas(AtlasId),
    /// The renderer's 1×1 white texture, for solid colours.
    White,
}

/// Indices `first..first + count` drawn with one texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub texture: TextureKey,
    pub first: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct QuadBatch {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub calls: Vec<DrawCall>,
}

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
pub const MARKER_COLOR: [f32; 4] = [1.0, 0.85, 0.1, 1.0];

impl QuadBatch {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.calls.clear();
    }

    fn extend_call(&mut self, texture: TextureKey, first: u32, count: u32) {
        match self.calls.last_mut() {
            Some(c) if c.texture == texture && c.first + c.count == first => c.count += count,
            _ => self.calls.push(DrawCall { texture, first, count }),
        }
    }

    /// A `size` quad centred on `center`, rotated by `angle` radians.
    pub fn push_quad(&mut self, texture: TextureKey, center: Vec2, size: Vec2, angle: f32, uv: UvRect, color: [f32; 4]) {
        let h = size * 0.5;
        let rot = Vec2::from_angle(angle);
        // world Y is up, texture V grows downwards
        let corners = [
            (vec2(-h.x, -h.y), [uv.u0, uv.v1]),
            (vec2(h.x, -h.y), [uv.u1, uv.v1]),
            (vec2(h.x, h.y), [uv.u1, uv.v0]),
            (vec2(-h.x, h.y), [uv.u0, uv.v0]),
        ];
        let base = self.vertices.len() as u32;
        for (offset, uv) in corners {
            let p = center + rot.rotate(offset);
            self.vertices.push(Vertex {
                pos: p.to_array(),
                uv,
                color,
            });
        }
        let first = self.indices.len() as u32;
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        self.extend_call(texture, first, 6);
    }

    pub fn push_triangle(&mut self, texture: TextureKey, points: [Vec2; 3], color: [f32; 4]) {
        let base = self.vertices.len() as u32;
        for p in points {
            self.vertices.push(Vertex {
                pos: p.to_array(),
                uv: [0.5, 0.5],
                color,
            });
        }
        let first = self.indices.len() as u32;
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);
        self.extend_call(texture, first, 3);
    }
}

/// Every drawable tile in placement order (layer order is draw order).
pub fn tile_batch(tiles: &[TileInstance]) -> QuadBatch {
    let mut batch = QuadBatch::default();
    for t in tiles.iter().filter(|t| t.visible) {
        if let Some(atlas) = t.atlas {
            batch.push_quad(TextureKey::Atlas(atlas), t.center, t.size, 0.0, t.uv, WHITE);
        }
    }
    batch
}

/// Visible sprites in id order.
pub fn sprite_batch<'a>(batch: &mut QuadBatch, sprites: impl Iterator<Item = &'a Sprite>) {
    for s in sprites.filter(|s| s.visible) {
        if let Some(atlas) = s.atlas {
            batch.push_quad(TextureKey::Atlas(atlas), s.position, s.size, s.angle, s.uv, WHITE);
        }
    }
}

/// The player arrow and item icons drawn over the 2D map.
pub fn maze_overlay(batch: &mut QuadBatch, maze: &Maze, sheets: &SheetRegistry) {
    let icon = maze.cell * 0.4;
    for (_, item) in maze.items.iter().filter(|(_, i)| i.visible) {
        let Some(sheet) = sheets.get(item.sheet) else { continue };
        let Some(frame) = sheet.frame(item.frame) else { continue };
        let pos = maze.to_world(item.position);
        batch.push_quad(TextureKey::Atlas(sheet.atlas), pos, icon, 0.0, frame.uv, WHITE);
    }

    let len = maze.cell.x.min(maze.cell.y) * 0.35;
    let fwd = maze.map_forward();
    let side = fwd.perp();
    let p = maze.camera_world();
    batch.push_triangle(
        TextureKey::White,
        [p + fwd * len, p - fwd * len * 0.6 - side * len * 0.6, p - fwd * len * 0.6 + side * len * 0.6],
        MARKER_COLOR,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(atlas: Option<AtlasId>, visible: bool, x: f32) -> TileInstance {
        TileInstance {
            name: String::new(),
            gid: 1,
            layer: 0,
            grid: (0, 0),
            center: vec2(x, 0.0),
            size: vec2(1.0, 1.0),
            uv: UvRect::FULL,
            atlas,
            visible,
            is_collision: false,
            has_body: false,
        }
    }

    #[test]
    fn tiles_of_one_atlas_share_a_call() {
        let tiles = [
            tile(Some(0), true, 0.0),
            tile(Some(0), true, 1.0),
            tile(Some(1), true, 2.0),
            tile(Some(0), false, 3.0),
            tile(None, true, 4.0),
            tile(Some(0), true, 5.0),
        ];
        let batch = tile_batch(&tiles);
        assert_eq!(batch.vertices.len(), 16);
        let calls: Vec<_> = batch.calls.iter().map(|c| (c.texture, c.count)).collect();
        assert_eq!(
            calls,
            vec![
                (TextureKey::Atlas(0), 12),
                (TextureKey::Atlas(1), 6),
                (TextureKey::Atlas(0), 6),
            ]
        );
    }

    #[test]
    fn quad_corners_follow_rotation() {
        let mut batch = QuadBatch::default();
        batch.push_quad(
            TextureKey::White,
            vec2(1.0, 1.0),
            vec2(2.0, 1.0),
            std::f32::consts::FRAC_PI_2,
            UvRect::FULL,
            WHITE,
        );
        // bottom-left corner (-1, -0.5) rotated a quarter turn is (0.5, -1)
        let p = Vec2::from(batch.vertices[0].pos);
        assert!((p - vec2(1.5, 0.0)).length() < 1e-5);
        assert_eq!(batch.vertices[0].uv, [0.0, 1.0]);
        assert_eq!(batch.vertices[3].uv, [0.0, 0.0]);
    }

    #[test]
    fn triangles_and_quads_split_by_texture() {
        let mut batch = QuadBatch::default();
        batch.push_quad(TextureKey::Atlas(2), Vec2::ZERO, Vec2::ONE, 0.0, UvRect::FULL, WHITE);
        batch.push_triangle(TextureKey::White, [Vec2::ZERO, Vec2::X, Vec2::Y], MARKER_COLOR);
        assert_eq!(batch.indices.len(), 9);
        assert_eq!(batch.calls[1], DrawCall { texture: TextureKey::White, first: 6, count: 3 });
    }
}
