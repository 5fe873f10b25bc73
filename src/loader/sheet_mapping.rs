// src/loader/sheet_mapping.rs
//! Sprite sheets handed over by the host as a nested mapping:
//! `{frame_name: {frame_rect, fixtures}, ..., "_metadata": {...}}`.

use crate::atlas::{AtlasManager, UvRect};
use crate::error::WorldError;
use crate::shape::{clamp_polygon, CollisionShape, MAX_SHAPES_PER_TILE};
use crate::sheet::{Animation, Direction, Frame, SpriteSheet};
use macroquad::prelude::*;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

const METADATA_KEY: &str = "_metadata";

#[derive(Deserialize, Clone, Copy)]
struct PixelRect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

#[derive(Deserialize, Clone, Copy)]
struct CanvasSize {
    w: f32,
    h: f32,
}

#[derive(Deserialize)]
struct AnimationSpec {
    frames: Vec<u32>,
    #[serde(default = "default_fps")]
    fps: f32,
    #[serde(default)]
    direction: Direction,
}

fn default_fps() -> f32 {
    10.0
}

#[derive(Deserialize)]
struct SheetMetadata {
    image: String,
    #[serde(default)]
    texture_width: Option<u32>,
    #[serde(default)]
    texture_height: Option<u32>,
    #[serde(default)]
    canonical_canvas: Option<CanvasSize>,
    #[serde(default)]
    animations: serde_json::Map<String, JsonValue>,
}

/// Fixture coordinates are pixels relative to the frame's top-left corner.
#[derive(Deserialize)]
#[serde(tag = "shape", content = "data", rename_all = "lowercase")]
enum FixtureSpec {
    Box { x: f32, y: f32, w: f32, h: f32 },
    Polygon { points: Vec<[f32; 2]> },
    Circle { cx: f32, cy: f32, r: f32 },
}

#[derive(Deserialize)]
struct FrameSpec {
    frame_rect: PixelRect,
    #[serde(default)]
    fixtures: Vec<FixtureSpec>,
    #[serde(default)]
    duration: f32,
}

impl FixtureSpec {
    fn normalize(&self, w: f32, h: f32) -> Option<CollisionShape> {
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        match self {
            FixtureSpec::Box { x, y, w: bw, h: bh } => Some(CollisionShape::Box {
                x: x / w,
                y: y / h,
                w: bw / w,
                h: bh / h,
            }),
            FixtureSpec::Polygon { points } => {
                clamp_polygon(points.iter().map(|[px, py]| vec2(px / w, py / h)).collect())
                    .map(CollisionShape::Polygon)
            }
            FixtureSpec::Circle { cx, cy, r } => Some(CollisionShape::Circle {
                cx: cx / w,
                cy: cy / h,
                r: r / w,
            }),
        }
    }
}

fn json_err(name: &str) -> impl FnOnce(serde_json::Error) -> WorldError + '_ {
    move |source| WorldError::Json {
        path: PathBuf::from(name),
        source,
    }
}

/// Registers the sheet's image as a packed atlas and builds the sheet.
///
/// Frame indices follow the mapping's key order, `_metadata` excluded.
pub fn sheet_from_mapping(
    name: &str,
    mapping: &JsonValue,
    base_dir: Option<&Path>,
    atlases: &mut AtlasManager,
) -> Result<SpriteSheet, WorldError> {
    let entries = mapping
        .as_object()
        .ok_or_else(|| WorldError::invalid(format!("sprite sheet `{name}` must be a mapping")))?;
    let meta_value = entries
        .get(METADATA_KEY)
        .ok_or_else(|| WorldError::invalid(format!("sprite sheet `{name}` has no {METADATA_KEY}")))?;
    let meta: SheetMetadata =
        serde_json::from_value(meta_value.clone()).map_err(json_err(name))?;

    let mut frames = Vec::new();
    for (frame_name, value) in entries.iter().filter(|(k, _)| k.as_str() != METADATA_KEY) {
        let spec: FrameSpec = serde_json::from_value(value.clone()).map_err(json_err(name))?;
        frames.push((frame_name.clone(), spec));
    }

    let image_path = match base_dir {
        Some(dir) => dir.join(&meta.image),
        None => PathBuf::from(&meta.image),
    };
    let atlas_id = atlases.register_packed(&image_path)?;
    let (tex_w, tex_h) = match atlases.get(atlas_id) {
        Some(a) => (
            meta.texture_width.unwrap_or(a.width) as f32,
            meta.texture_height.unwrap_or(a.height) as f32,
        ),
        None => return Err(WorldError::not_found("atlas", atlas_id.to_string())),
    };

    let canonical = match (meta.canonical_canvas, frames.first()) {
        (Some(c), _) => vec2(c.w, c.h),
        (None, Some((_, f))) => vec2(f.frame_rect.w, f.frame_rect.h),
        (None, None) => Vec2::ONE,
    };

    let mut sheet = SpriteSheet::new(name.to_owned(), 0, atlas_id, canonical);
    for (frame_name, spec) in frames {
        let r = spec.frame_rect;
        let mut shapes: Vec<CollisionShape> = spec
            .fixtures
            .iter()
            .filter_map(|f| f.normalize(r.w, r.h))
            .collect();
        if shapes.len() > MAX_SHAPES_PER_TILE {
            tracing::warn!(frame = %frame_name, "too many fixtures, keeping {MAX_SHAPES_PER_TILE}");
            shapes.truncate(MAX_SHAPES_PER_TILE);
        }
        sheet.push_frame(Frame {
            name: frame_name,
            rect: Rect::new(r.x, r.y, r.w, r.h),
            uv: UvRect::from_pixels(r.x, r.y, r.w, r.h, tex_w, tex_h),
            shapes,
            duration_ms: spec.duration,
        });
    }

    let frame_count = sheet.frames.len() as u32;
    for (anim_name, value) in &meta.animations {
        let spec: AnimationSpec = serde_json::from_value(value.clone()).map_err(json_err(name))?;
        if let Some(bad) = spec.frames.iter().find(|&&f| f >= frame_count) {
            return Err(WorldError::invalid(format!(
                "animation `{anim_name}` references frame {bad}, sheet has {frame_count}"
            )));
        }
        sheet.animations.push(Animation {
            name: anim_name.clone(),
            frames: spec.direction.realize(&spec.frames),
            fps: spec.fps,
            direction: spec.direction,
            hitbox: None,
        });
    }

    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fixtures_are_normalised_per_frame() {
        let small = FixtureSpec::Box { x: 0.0, y: 8.0, w: 16.0, h: 8.0 };
        assert_eq!(
            small.normalize(16.0, 16.0),
            Some(CollisionShape::Box { x: 0.0, y: 0.5, w: 1.0, h: 0.5 })
        );
        // same box in a frame twice as wide covers half the width
        assert_eq!(
            small.normalize(32.0, 16.0),
            Some(CollisionShape::Box { x: 0.0, y: 0.5, w: 0.5, h: 0.5 })
        );
    }

    #[test]
    fn fixture_tags_deserialize() {
        let f: FixtureSpec = serde_json::from_value(json!({
            "shape": "polygon", "data": {"points": [[0, 0], [8, 0], [8, 8]]}
        }))
        .unwrap();
        assert!(matches!(f.normalize(8.0, 8.0), Some(CollisionShape::Polygon(p)) if p.len() == 3));

        let degenerate: FixtureSpec = serde_json::from_value(json!({
            "shape": "polygon", "data": {"points": [[0, 0], [8, 0]]}
        }))
        .unwrap();
        assert!(degenerate.normalize(8.0, 8.0).is_none());
    }

    #[test]
    fn missing_metadata_is_rejected() {
        let mut atlases = AtlasManager::new();
        let err = sheet_from_mapping("s", &json!({"f": {}}), None, &mut atlases).unwrap_err();
        assert!(matches!(err, WorldError::InvalidArgument(_)));
    }
}
