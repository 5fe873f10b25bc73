// src/loader/aseprite.rs
//! Aseprite JSON export (the subset we need: frames, frame tags, the `hitbox` slice).

use crate::atlas::{AtlasId, UvRect};
use crate::error::WorldError;
use crate::sheet::{Animation, Direction, Frame, Hitbox, SpriteSheet};
use macroquad::prelude::*;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::Path;

const DEFAULT_FPS: f32 = 10.0;

#[derive(Deserialize, Clone, Copy)]
struct AseRect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

#[derive(Deserialize, Clone, Copy)]
struct AseSize {
    w: f32,
    h: f32,
}

#[derive(Deserialize)]
struct AseFrame {
    #[serde(default)]
    filename: Option<String>,
    frame: AseRect,
    #[serde(default)]
    duration: f32,
    #[serde(default, rename = "sourceSize")]
    source_size: Option<AseSize>,
}

#[derive(Deserialize)]
struct AseTag {
    name: String,
    from: u32,
    to: u32,
    #[serde(default)]
    direction: Option<String>,
}

#[derive(Deserialize)]
struct AseSliceKey {
    #[serde(default)]
    frame: u32,
    bounds: AseRect,
}

#[derive(Deserialize)]
struct AseSlice {
    name: String,
    #[serde(default)]
    keys: Vec<AseSliceKey>,
}

#[derive(Deserialize, Default)]
struct AseMeta {
    #[serde(default, rename = "frameTags")]
    frame_tags: Vec<AseTag>,
    #[serde(default)]
    slices: Vec<AseSlice>,
}

#[derive(Deserialize)]
struct AseDoc {
    frames: JsonValue,
    #[serde(default)]
    meta: AseMeta,
}

fn json_err(path: &Path) -> impl FnOnce(serde_json::Error) -> WorldError + '_ {
    move |source| WorldError::Json {
        path: path.to_path_buf(),
        source,
    }
}

/// Frames come either as a `{name: frame}` hash (document order) or as an array.
fn frames_in_order(frames: JsonValue, path: &Path) -> Result<Vec<(String, AseFrame)>, WorldError> {
    match frames {
        JsonValue::Object(map) => map
            .into_iter()
            .map(|(name, v)| {
                let f: AseFrame = serde_json::from_value(v).map_err(json_err(path))?;
                Ok((name, f))
            })
            .collect(),
        JsonValue::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                let f: AseFrame = serde_json::from_value(v).map_err(json_err(path))?;
                let name = f.filename.clone().unwrap_or_else(|| i.to_string());
                Ok((name, f))
            })
            .collect(),
        _ => Err(WorldError::InvalidMap(format!(
            "{}: `frames` must be an object or an array",
            path.display()
        ))),
    }
}

fn parse_direction(dir: Option<&str>) -> Direction {
    match dir {
        Some("reverse") => Direction::Reverse,
        Some("pingpong") | Some("pingpong_reverse") => Direction::PingPong,
        _ => Direction::Forward,
    }
}

/// Builds a sheet over an already registered atlas of `tex_w` x `tex_h` pixels.
pub fn sheet_from_aseprite_str(
    json: &str,
    path: &Path,
    name: &str,
    first_gid: u32,
    atlas: AtlasId,
    tex_w: f32,
    tex_h: f32,
) -> Result<SpriteSheet, WorldError> {
    let doc: AseDoc = serde_json::from_str(json).map_err(json_err(path))?;
    let frames = frames_in_order(doc.frames, path)?;

    let canonical = frames
        .first()
        .map(|(_, f)| match f.source_size {
            Some(s) => vec2(s.w, s.h),
            None => vec2(f.frame.w, f.frame.h),
        })
        .unwrap_or(Vec2::ONE);

    let mut sheet = SpriteSheet::new(name.to_owned(), first_gid, atlas, canonical);
    for (frame_name, f) in frames {
        let r = f.frame;
        sheet.push_frame(Frame {
            name: frame_name,
            rect: Rect::new(r.x, r.y, r.w, r.h),
            uv: UvRect::from_pixels(r.x, r.y, r.w, r.h, tex_w, tex_h),
            shapes: Vec::new(),
            duration_ms: f.duration,
        });
    }

    // keys sorted by frame; a key applies from its frame onwards
    let mut hitbox_keys: Vec<(u32, Hitbox)> = doc
        .meta
        .slices
        .iter()
        .filter(|s| s.name == "hitbox")
        .flat_map(|s| s.keys.iter())
        .map(|k| {
            let b = k.bounds;
            (k.frame, Hitbox::new(Rect::new(b.x, b.y, b.w, b.h), canonical))
        })
        .collect();
    hitbox_keys.sort_by_key(|(frame, _)| *frame);
    sheet.hitbox = hitbox_keys.first().map(|(_, hb)| *hb);

    let hitbox_at = |frame: u32| {
        hitbox_keys
            .iter()
            .rev()
            .find(|(f, _)| *f <= frame)
            .or(hitbox_keys.first())
            .map(|(_, hb)| *hb)
    };

    let frame_count = sheet.frames.len() as u32;
    for tag in &doc.meta.frame_tags {
        if tag.from > tag.to || tag.to >= frame_count {
            tracing::warn!(tag = %tag.name, "frame tag out of range, skipped");
            continue;
        }
        let range: Vec<u32> = (tag.from..=tag.to).collect();
        let direction = parse_direction(tag.direction.as_deref());
        let fps = sheet.average_fps(&range, DEFAULT_FPS);
        sheet.animations.push(Animation {
            name: tag.name.clone(),
            frames: direction.realize(&range),
            fps,
            direction,
            hitbox: hitbox_at(tag.from),
        });
    }

    Ok(sheet)
}

pub fn sheet_from_aseprite_file(
    path: &Path,
    name: &str,
    first_gid: u32,
    atlas: AtlasId,
    tex_w: f32,
    tex_h: f32,
) -> Result<SpriteSheet, WorldError> {
    let txt = std::fs::read_to_string(path).map_err(|source| WorldError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    sheet_from_aseprite_str(&txt, path, name, first_gid, atlas, tex_w, tex_h)
}
