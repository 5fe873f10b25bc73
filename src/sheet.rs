//! Sprite sheets: named frames of one atlas, animations and per-frame colliders.

use crate::atlas::{AtlasId, UvRect};
use crate::error::WorldError;
use crate::shape::CollisionShape;
use macroquad::prelude::*;
use std::collections::HashMap;

pub const MAX_SPRITE_SHEETS: usize = 64;

pub type SheetId = usize;

#[derive(Debug, Clone)]
pub struct Frame {
    pub name: String,
    /// Pixel rect inside the atlas.
    pub rect: Rect,
    pub uv: UvRect,
    pub shapes: Vec<CollisionShape>,
    pub duration_ms: f32,
}

/// Playback direction of an animation. Only used to build the frame list;
/// the runtime animation state only ever walks an explicit list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
    #[serde(alias = "ping-pong", alias = "pingpong_reverse")]
    PingPong,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
            Direction::PingPong => "pingpong",
        }
    }

    /// Expands an ordered frame range into the list actually played.
    /// Ping-pong does not repeat the boundary frames.
    pub fn realize(self, frames: &[u32]) -> Vec<u32> {
        match self {
            Direction::Forward => frames.to_vec(),
            Direction::Reverse => frames.iter().rev().copied().collect(),
            Direction::PingPong => {
                let mut out = frames.to_vec();
                if frames.len() > 2 {
                    out.extend(frames[1..frames.len() - 1].iter().rev());
                }
                out
            }
        }
    }
}

/// The Aseprite `hitbox` slice relative to the canonical canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hitbox {
    /// Pixels from the frame's top-left.
    pub rect: Rect,
    /// Hitbox size over canvas size.
    pub ratio: Vec2,
    /// Hitbox centre minus canvas centre, in canvas units, Y down.
    pub offset: Vec2,
}

impl Hitbox {
    pub fn new(rect: Rect, canvas: Vec2) -> Self {
        let cw = canvas.x.max(1.0);
        let ch = canvas.y.max(1.0);
        Hitbox {
            rect,
            ratio: vec2(rect.w / cw, rect.h / ch),
            offset: vec2(
                (rect.x + rect.w * 0.5) / cw - 0.5,
                (rect.y + rect.h * 0.5) / ch - 0.5,
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "x": self.rect.x, "y": self.rect.y, "w": self.rect.w, "h": self.rect.h,
            "ratio_w": self.ratio.x, "ratio_h": self.ratio.y,
            "offset_x": self.offset.x, "offset_y": self.offset.y,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Animation {
    pub name: String,
    /// Frame indices in play order.
    pub frames: Vec<u32>,
    pub fps: f32,
    pub direction: Direction,
    pub hitbox: Option<Hitbox>,
}

impl Animation {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "frames": self.frames,
            "fps": self.fps,
            "direction": self.direction.as_str(),
            "hitbox": self.hitbox.map(|h| h.to_json()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SpriteSheet {
    pub name: String,
    /// 0 for sheets registered outside a TMX.
    pub first_gid: u32,
    pub atlas: AtlasId,
    /// Rendering size in pixels for every frame.
    pub canonical: Vec2,
    pub frames: Vec<Frame>,
    frame_index: HashMap<String, usize>,
    pub animations: Vec<Animation>,
    pub hitbox: Option<Hitbox>,
}

impl SpriteSheet {
    pub fn new(name: String, first_gid: u32, atlas: AtlasId, canonical: Vec2) -> Self {
        SpriteSheet {
            name,
            first_gid,
            atlas,
            canonical,
            frames: Vec::new(),
            frame_index: HashMap::new(),
            animations: Vec::new(),
            hitbox: None,
        }
    }

    pub fn push_frame(&mut self, frame: Frame) -> usize {
        let idx = self.frames.len();
        self.frame_index.insert(frame.name.clone(), idx);
        self.frames.push(frame);
        idx
    }

    pub fn frame_by_name(&self, name: &str) -> Option<usize> {
        self.frame_index.get(name).copied()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }

    /// Average FPS of `frames`, ignoring hold frames (>= 1 s).
    pub fn average_fps(&self, frames: &[u32], fallback: f32) -> f32 {
        let durations: Vec<f32> = frames
            .iter()
            .filter_map(|&i| self.frames.get(i as usize))
            .map(|f| f.duration_ms)
            .filter(|&d| d > 0.0 && d < 1000.0)
            .collect();
        if durations.is_empty() {
            return fallback;
        }
        let avg = durations.iter().sum::<f32>() / durations.len() as f32;
        1000.0 / avg
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "first_gid": self.first_gid,
            "atlas": self.atlas,
            "frame_count": self.frames.len(),
            "canonical_w": self.canonical.x,
            "canonical_h": self.canonical.y,
            "animations": self.animations.iter().map(|a| a.name.clone()).collect::<Vec<_>>(),
            "hitbox": self.hitbox.map(|h| h.to_json()),
        })
    }
}

#[derive(Default)]
pub struct SheetRegistry {
    sheets: Vec<SpriteSheet>,
}

impl SheetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sheet: SpriteSheet) -> Result<SheetId, WorldError> {
        if self.find_by_name(&sheet.name).is_some() {
            return Err(WorldError::invalid(format!(
                "sprite sheet `{}` already exists",
                sheet.name
            )));
        }
        if self.sheets.len() >= MAX_SPRITE_SHEETS {
            return Err(WorldError::Capacity {
                what: "sprite sheets",
                max: MAX_SPRITE_SHEETS,
            });
        }
        tracing::debug!(
            name = %sheet.name,
            frames = sheet.frames.len(),
            animations = sheet.animations.len(),
            "sprite sheet registered"
        );
        self.sheets.push(sheet);
        Ok(self.sheets.len() - 1)
    }

    pub fn get(&self, id: SheetId) -> Option<&SpriteSheet> {
        self.sheets.get(id)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SheetId, &SpriteSheet)> {
        self.sheets.iter().enumerate()
    }

    pub fn find_by_name(&self, name: &str) -> Option<SheetId> {
        self.sheets.iter().position(|s| s.name == name)
    }

    pub fn require(&self, name: &str) -> Result<SheetId, WorldError> {
        self.find_by_name(name)
            .ok_or_else(|| WorldError::not_found("sprite sheet", name))
    }

    /// Sheet containing `gid`: the largest first GID not above it.
    pub fn find_by_gid(&self, gid: u32) -> Option<SheetId> {
        self.sheets
            .iter()
            .enumerate()
            .filter(|(_, s)| s.first_gid > 0 && s.first_gid <= gid)
            .max_by_key(|(_, s)| s.first_gid)
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_shape_the_frame_list() {
        let frames = [0, 1, 2, 3];
        assert_eq!(Direction::Forward.realize(&frames), vec![0, 1, 2, 3]);
        assert_eq!(Direction::Reverse.realize(&frames), vec![3, 2, 1, 0]);
        assert_eq!(Direction::PingPong.realize(&frames), vec![0, 1, 2, 3, 2, 1]);
        assert_eq!(Direction::PingPong.realize(&[5, 6]), vec![5, 6]);
    }

    #[test]
    fn full_frame_hitbox_has_no_offset() {
        let hb = Hitbox::new(Rect::new(0.0, 0.0, 32.0, 32.0), vec2(32.0, 32.0));
        assert_eq!(hb.offset, Vec2::ZERO);
        assert_eq!(hb.ratio, Vec2::ONE);
    }

    #[test]
    fn lower_hitbox_offsets_downwards() {
        let hb = Hitbox::new(Rect::new(8.0, 16.0, 16.0, 16.0), vec2(32.0, 32.0));
        assert_eq!(hb.ratio, vec2(0.5, 0.5));
        assert_eq!(hb.offset, vec2(0.0, 0.25));
    }

    #[test]
    fn hold_frames_do_not_drag_fps_down() {
        let mut sheet = SpriteSheet::new("s".into(), 0, 0, vec2(8.0, 8.0));
        for (i, d) in [100.0, 100.0, 2000.0].into_iter().enumerate() {
            sheet.push_frame(Frame {
                name: format!("f{i}"),
                rect: Rect::new(0.0, 0.0, 8.0, 8.0),
                uv: UvRect::FULL,
                shapes: Vec::new(),
                duration_ms: d,
            });
        }
        assert!((sheet.average_fps(&[0, 1, 2], 12.0) - 10.0).abs() < 1e-4);
        assert_eq!(sheet.average_fps(&[2], 12.0), 12.0);
    }

    #[test]
    fn gid_lookup_uses_largest_first_gid() {
        let mut reg = SheetRegistry::new();
        reg.add(SpriteSheet::new("a".into(), 1, 0, Vec2::ONE)).unwrap();
        reg.add(SpriteSheet::new("b".into(), 50, 1, Vec2::ONE)).unwrap();
        reg.add(SpriteSheet::new("loose".into(), 0, 2, Vec2::ONE)).unwrap();
        assert_eq!(reg.find_by_gid(49), Some(0));
        assert_eq!(reg.find_by_gid(50), Some(1));
        assert_eq!(reg.find_by_gid(0), None);
        assert!(reg.add(SpriteSheet::new("a".into(), 0, 0, Vec2::ONE)).is_err());
    }
}
