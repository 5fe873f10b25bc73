use crate::error::WorldError;
use image::RgbaImage;
use std::path::{Path, PathBuf};

pub const MAX_ATLASES: usize = 32;

pub type AtlasId = usize;

/// Texture-space rectangle; `v` grows downwards like the image rows.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvRect {
    pub const FULL: UvRect = UvRect {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };

    pub fn from_pixels(x: f32, y: f32, w: f32, h: f32, tex_w: f32, tex_h: f32) -> Self {
        UvRect {
            u0: x / tex_w,
            v0: y / tex_h,
            u1: (x + w) / tex_w,
            v1: (y + h) / tex_h,
        }
    }

    pub fn flipped(self, horizontal: bool, vertical: bool) -> Self {
        let mut uv = self;
        if horizontal {
            std::mem::swap(&mut uv.u0, &mut uv.u1);
        }
        if vertical {
            std::mem::swap(&mut uv.v0, &mut uv.v1);
        }
        uv
    }
}

/// A loaded texture plus its grid description.
///
/// Packed atlases (sprite sheets) have `tile_w == 0`; their UVs come from
/// per-frame rectangles instead of the grid.
pub struct Atlas {
    pub filename: PathBuf,
    pub width: u32,
    pub height: u32,
    pub tile_w: u32,
    pub tile_h: u32,
    pub cols: u32,
    pub rows: u32,
    pub margin: u32,
    pub spacing: u32,
    /// Per-tile UV extent.
    pub du: f32,
    pub dv: f32,
    /// First GID for tileset lookup; 0 for atlases outside any TMX.
    pub first_gid: u32,
    pub tilecount: u32,
    /// Decoded pixels waiting for upload on the first draw.
    pub pixels: RgbaImage,
}

impl Atlas {
    pub fn is_grid(&self) -> bool {
        self.tile_w > 0 && self.tile_h > 0
    }

    /// UVs of grid tile `local` (GID minus first GID).
    pub fn tile_uv(&self, local: u32) -> Option<UvRect> {
        if !self.is_grid() || self.cols == 0 {
            return None;
        }
        let col = local % self.cols;
        let row = local / self.cols;
        if row >= self.rows.max(1) {
            return None;
        }
        let sx = self.margin + col * (self.tile_w + self.spacing);
        let sy = self.margin + row * (self.tile_h + self.spacing);
        Some(UvRect::from_pixels(
            sx as f32,
            sy as f32,
            self.tile_w as f32,
            self.tile_h as f32,
            self.width as f32,
            self.height as f32,
        ))
    }
}

pub(crate) fn load_rgba(path: &Path) -> Result<RgbaImage, WorldError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| WorldError::Image {
            path: path.to_path_buf(),
            source,
        })
}

#[derive(Default)]
pub struct AtlasManager {
    atlases: Vec<Atlas>,
}

/// Grid description for [`AtlasManager::register_grid`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSpec {
    pub tile_w: u32,
    pub tile_h: u32,
    pub first_gid: u32,
    pub tilecount: u32,
    pub columns: u32,
    pub margin: u32,
    pub spacing: u32,
}

impl AtlasManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.atlases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atlases.is_empty()
    }

    pub fn get(&self, id: AtlasId) -> Option<&Atlas> {
        self.atlases.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AtlasId, &Atlas)> {
        self.atlases.iter().enumerate()
    }

    /// Loads `path` and registers it as a grid atlas.
    pub fn register_grid(&mut self, path: &Path, grid: GridSpec) -> Result<AtlasId, WorldError> {
        self.check_capacity()?;
        let pixels = load_rgba(path)?;
        Ok(self.insert_grid(path.to_path_buf(), pixels, grid))
    }

    /// Loads `path` and registers it as a packed atlas (no grid).
    pub fn register_packed(&mut self, path: &Path) -> Result<AtlasId, WorldError> {
        self.check_capacity()?;
        let pixels = load_rgba(path)?;
        Ok(self.insert_grid(path.to_path_buf(), pixels, GridSpec::default()))
    }

    fn check_capacity(&self) -> Result<(), WorldError> {
        if self.atlases.len() >= MAX_ATLASES {
            return Err(WorldError::Capacity {
                what: "atlases",
                max: MAX_ATLASES,
            });
        }
        Ok(())
    }

    pub(crate) fn insert_grid(&mut self, filename: PathBuf, pixels: RgbaImage, grid: GridSpec) -> AtlasId {
        let (width, height) = pixels.dimensions();
        let (cols, rows) = if grid.tile_w > 0 && grid.tile_h > 0 {
            let cols = if grid.columns > 0 {
                grid.columns
            } else {
                (width.saturating_sub(2 * grid.margin) + grid.spacing) / (grid.tile_w + grid.spacing)
            };
            let rows =
                (height.saturating_sub(2 * grid.margin) + grid.spacing) / (grid.tile_h + grid.spacing);
            (cols, rows)
        } else {
            (0, 0)
        };
        let tilecount = if grid.tilecount > 0 { grid.tilecount } else { cols * rows };

        tracing::debug!(file = %filename.display(), width, height, cols, rows, "atlas registered");

        self.atlases.push(Atlas {
            filename,
            width,
            height,
            tile_w: grid.tile_w,
            tile_h: grid.tile_h,
            cols,
            rows,
            margin: grid.margin,
            spacing: grid.spacing,
            du: if width > 0 { grid.tile_w as f32 / width as f32 } else { 0.0 },
            dv: if height > 0 { grid.tile_h as f32 / height as f32 } else { 0.0 },
            first_gid: grid.first_gid,
            tilecount,
            pixels,
        });
        self.atlases.len() - 1
    }

    /// Grid atlas owning `gid`: the largest first GID not above it.
    #[inline]
    pub fn atlas_for_gid(&self, gid: u32) -> Option<(AtlasId, u32)> {
        self.atlases
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_grid() && a.first_gid > 0 && a.first_gid <= gid)
            .max_by_key(|(_, a)| a.first_gid)
            .map(|(id, a)| (id, gid - a.first_gid))
    }

    pub fn uv_for_gid(&self, gid: u32) -> Option<(AtlasId, UvRect)> {
        let (id, local) = self.atlas_for_gid(gid)?;
        let uv = self.atlases[id].tile_uv(local)?;
        Some((id, uv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(first_gid: u32) -> GridSpec {
        GridSpec {
            tile_w: 16,
            tile_h: 16,
            first_gid,
            ..Default::default()
        }
    }

    #[test]
    fn gid_lookup_picks_largest_first_gid_below() {
        let mut atlases = AtlasManager::new();
        let a = atlases.insert_grid("a.png".into(), RgbaImage::new(64, 32), grid(1));
        let b = atlases.insert_grid("b.png".into(), RgbaImage::new(32, 32), grid(9));

        assert_eq!(atlases.atlas_for_gid(1), Some((a, 0)));
        assert_eq!(atlases.atlas_for_gid(8), Some((a, 7)));
        assert_eq!(atlases.atlas_for_gid(9), Some((b, 0)));
        assert_eq!(atlases.atlas_for_gid(0), None);
    }

    #[test]
    fn grid_uvs_follow_row_major_layout() {
        let mut atlases = AtlasManager::new();
        atlases.insert_grid("a.png".into(), RgbaImage::new(64, 32), grid(1));
        // gid 6 -> local 5 -> col 1, row 1 in a 4x2 grid
        let (_, uv) = atlases.uv_for_gid(6).unwrap();
        assert_eq!(uv, UvRect { u0: 0.25, v0: 0.5, u1: 0.5, v1: 1.0 });
    }

    #[test]
    fn margin_and_spacing_shift_tiles() {
        let mut atlases = AtlasManager::new();
        let spec = GridSpec {
            margin: 1,
            spacing: 2,
            ..grid(1)
        };
        // 1 + 16 + 2 + 16 + 1 = 36
        atlases.insert_grid("m.png".into(), RgbaImage::new(36, 18), spec);
        let atlas = atlases.get(0).unwrap();
        assert_eq!(atlas.cols, 2);
        let uv = atlas.tile_uv(1).unwrap();
        assert!((uv.u0 - 19.0 / 36.0).abs() < 1e-6);
    }
}
