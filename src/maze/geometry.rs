//! CPU-side meshes for the first-person view: walls/floor/ceiling from the
//! grid, and camera-facing quads for items.

use super::MazeGrid;
use crate::atlas::{AtlasId, UvRect};
use macroquad::prelude::*;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MazeVertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Wall = 0,
    Floor = 1,
    Ceiling = 2,
}

/// A contiguous index range drawn with one texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshRange<T> {
    pub key: T,
    pub first: u32,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct Mesh<T> {
    pub vertices: Vec<MazeVertex>,
    pub indices: Vec<u32>,
    pub ranges: Vec<MeshRange<T>>,
}

impl<T> Default for Mesh<T> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            ranges: Vec::new(),
        }
    }
}

impl<T: Copy + PartialEq> Mesh<T> {
    /// `corners` in counter-clockwise order seen from the `normal` side.
    fn push_quad(&mut self, key: T, corners: [Vec3; 4], uv: UvRect, normal: Vec3) {
        let base = self.vertices.len() as u32;
        let uvs = [[uv.u0, uv.v1], [uv.u1, uv.v1], [uv.u1, uv.v0], [uv.u0, uv.v0]];
        for (p, t) in corners.iter().zip(uvs) {
            self.vertices.push(MazeVertex {
                pos: p.to_array(),
                uv: t,
                normal: normal.to_array(),
            });
        }
        let first = self.indices.len() as u32;
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        match self.ranges.last_mut() {
            Some(r) if r.key == key => r.count += 6,
            _ => self.ranges.push(MeshRange { key, first, count: 6 }),
        }
    }

    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }
}

pub type MazeMesh = Mesh<Surface>;

pub struct MeshStyle {
    pub wall_height: f32,
    pub uvs: [UvRect; 3],
    pub floor: bool,
    pub ceiling: bool,
}

/// Walls face only empty neighbours; floor and ceiling cover empty cells.
/// Ranges come out grouped: walls, then floor, then ceiling.
pub fn build_mesh(grid: &MazeGrid, cell: Vec2, style: &MeshStyle) -> MazeMesh {
    let mut mesh = MazeMesh::default();
    let h = style.wall_height;
    let cells = || (0..grid.height as i32).flat_map(|gy| (0..grid.width as i32).map(move |gx| (gx, gy)));

    let wall_uv = style.uvs[Surface::Wall as usize];
    for (gx, gy) in cells().filter(|&(x, y)| grid.is_wall(x, y)) {
        let (x0, z0) = (gx as f32 * cell.x, gy as f32 * cell.y);
        let (x1, z1) = (x0 + cell.x, z0 + cell.y);
        if !grid.is_wall(gx, gy - 1) {
            let quad = [vec3(x1, 0.0, z0), vec3(x0, 0.0, z0), vec3(x0, h, z0), vec3(x1, h, z0)];
            mesh.push_quad(Surface::Wall, quad, wall_uv, Vec3::NEG_Z);
        }
        if !grid.is_wall(gx, gy + 1) {
            let quad = [vec3(x0, 0.0, z1), vec3(x1, 0.0, z1), vec3(x1, h, z1), vec3(x0, h, z1)];
            mesh.push_quad(Surface::Wall, quad, wall_uv, Vec3::Z);
        }
        if !grid.is_wall(gx - 1, gy) {
            let quad = [vec3(x0, 0.0, z0), vec3(x0, 0.0, z1), vec3(x0, h, z1), vec3(x0, h, z0)];
            mesh.push_quad(Surface::Wall, quad, wall_uv, Vec3::NEG_X);
        }
        if !grid.is_wall(gx + 1, gy) {
            let quad = [vec3(x1, 0.0, z1), vec3(x1, 0.0, z0), vec3(x1, h, z0), vec3(x1, h, z1)];
            mesh.push_quad(Surface::Wall, quad, wall_uv, Vec3::X);
        }
    }

    for (surface, enabled) in [(Surface::Floor, style.floor), (Surface::Ceiling, style.ceiling)] {
        if !enabled {
            continue;
        }
        let uv = style.uvs[surface as usize];
        for (gx, gy) in cells().filter(|&(x, y)| !grid.is_wall(x, y)) {
            let (x0, z0) = (gx as f32 * cell.x, gy as f32 * cell.y);
            let (x1, z1) = (x0 + cell.x, z0 + cell.y);
            match surface {
                Surface::Floor => mesh.push_quad(
                    surface,
                    [vec3(x0, 0.0, z1), vec3(x1, 0.0, z1), vec3(x1, 0.0, z0), vec3(x0, 0.0, z0)],
                    uv,
                    Vec3::Y,
                ),
                _ => mesh.push_quad(
                    surface,
                    [vec3(x0, h, z0), vec3(x1, h, z0), vec3(x1, h, z1), vec3(x0, h, z1)],
                    uv,
                    Vec3::NEG_Y,
                ),
            }
        }
    }
    mesh
}

/// One item quad: centre in maze space, size, texture.
pub struct Billboard {
    pub center: Vec3,
    pub size: Vec2,
    pub atlas: AtlasId,
    pub uv: UvRect,
    /// Extra rotation of the quad about the vertical axis.
    pub spin: f32,
}

/// Camera-facing quads; `right`/`up` come from the view matrix rows.
pub fn build_billboards(items: &[Billboard], right: Vec3, up: Vec3) -> Mesh<AtlasId> {
    let mut mesh = Mesh::default();
    let normal = right.cross(up).normalize_or_zero();
    for b in items {
        let r = if b.spin != 0.0 {
            Quat::from_rotation_y(b.spin) * right
        } else {
            right
        } * (b.size.x * 0.5);
        let u = up * (b.size.y * 0.5);
        let c = b.center;
        mesh.push_quad(b.atlas, [c - r - u, c + r - u, c + r + u, c - r + u], b.uv, normal);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> MeshStyle {
        MeshStyle {
            wall_height: 1.0,
            uvs: [UvRect::FULL; 3],
            floor: true,
            ceiling: true,
        }
    }

    fn quad_normal_and_winding(mesh: &MazeMesh, q: usize) -> (Vec3, Vec3) {
        let v = |i: usize| Vec3::from(mesh.vertices[mesh.indices[q * 6 + i] as usize].pos);
        let winding = (v(1) - v(0)).cross(v(2) - v(0));
        let normal = Vec3::from(mesh.vertices[mesh.indices[q * 6] as usize].normal);
        (normal, winding)
    }

    #[test]
    fn top_and_bottom_rows_face_the_corridor() {
        // 4x4 with walls on the first and last rows
        let mut grid = MazeGrid::new(4, 4);
        for gx in 0..4 {
            grid.set_wall(gx, 0, true);
            grid.set_wall(gx, 3, true);
        }
        let mesh = build_mesh(&grid, Vec2::ONE, &style());
        let walls: Vec<_> = mesh.ranges.iter().filter(|r| r.key == Surface::Wall).collect();
        assert_eq!(walls.len(), 1);
        assert_eq!(walls[0].count / 6, 8);

        let mut plus_z = 0;
        let mut minus_z = 0;
        for q in 0..8 {
            let (n, _) = quad_normal_and_winding(&mesh, q);
            if n == Vec3::Z {
                plus_z += 1;
            } else if n == Vec3::NEG_Z {
                minus_z += 1;
            } else {
                panic!("unexpected wall normal {n:?}");
            }
        }
        assert_eq!((plus_z, minus_z), (4, 4));
        // 8 empty cells, floor + ceiling each
        assert_eq!(mesh.quad_count(), 8 + 16);
    }

    #[test]
    fn every_quad_winds_towards_its_normal() {
        let mut grid = MazeGrid::new(3, 3);
        grid.set_wall(1, 1, true);
        let mesh = build_mesh(&grid, vec2(2.0, 2.0), &style());
        for q in 0..mesh.quad_count() {
            let (n, w) = quad_normal_and_winding(&mesh, q);
            assert!(w.normalize().dot(n) > 0.99, "quad {q}");
        }
    }

    #[test]
    fn disabled_floor_and_ceiling_emit_nothing() {
        let grid = MazeGrid::new(2, 2);
        let mesh = build_mesh(
            &grid,
            Vec2::ONE,
            &MeshStyle {
                floor: false,
                ceiling: false,
                ..style()
            },
        );
        assert_eq!(mesh.quad_count(), 0);
    }

    #[test]
    fn billboards_face_the_camera() {
        let mesh = build_billboards(
            &[Billboard {
                center: vec3(1.0, 0.5, 1.0),
                size: vec2(0.5, 0.5),
                atlas: 3,
                uv: UvRect::FULL,
                spin: 0.0,
            }],
            Vec3::X,
            Vec3::Y,
        );
        assert_eq!(mesh.ranges, vec![MeshRange { key: 3, first: 0, count: 6 }]);
        assert_eq!(mesh.vertices[0].pos, [0.75, 0.25, 1.0]);
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
    }
}
