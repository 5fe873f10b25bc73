//! Fixture files written into a temporary directory.

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};

/// A solid `w` x `h` PNG.
pub fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(w, h, Rgba([200, 120, 40, 255]))
        .save(&path)
        .expect("write png");
    path
}

/// A `w` x `h` map of 32 px tiles over a two-tile tileset (`tiles.png`).
/// `collision` is the CSV of the `Collision` layer; `extra` is spliced in
/// after it (object groups, more layers). GID 2 carries `tile2_shapes`.
pub fn write_tmx(dir: &Path, name: &str, w: u32, h: u32, collision: &[u32], tile2_shapes: &str, extra: &str) -> PathBuf {
    write_png(dir, "tiles.png", 64, 32);
    let csv = collision
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let tile2 = if tile2_shapes.is_empty() {
        String::new()
    } else {
        format!(r#"<tile id="1"><objectgroup draworder="index">{tile2_shapes}</objectgroup></tile>"#)
    };
    let tmx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="{w}" height="{h}" tilewidth="32" tileheight="32">
 <properties><property name="title" value="fixture"/></properties>
 <tileset firstgid="1" name="blocks" tilewidth="32" tileheight="32" tilecount="2" columns="2">
  <image source="tiles.png" width="64" height="32"/>
  {tile2}
 </tileset>
 <layer name="Collision" width="{w}" height="{h}">
  <data encoding="csv">{csv}</data>
 </layer>
 {extra}
</map>
"#
    );
    let path = dir.join(name);
    fs::write(&path, tmx).expect("write tmx");
    path
}

/// Scenario map: 4x4, top and bottom rows solid.
pub const FRAME_ROWS: [u32; 16] = [1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1];

pub fn frame_map(dir: &Path) -> PathBuf {
    write_tmx(
        dir,
        "frame.tmx",
        4,
        4,
        &FRAME_ROWS,
        "",
        r#"<objectgroup name="Markers">
  <object id="1" name="spawn" type="start" x="48" y="80"><point/></object>
  <object id="2" name="door" x="64" y="32" width="32" height="32"/>
 </objectgroup>"#,
    )
}

/// A 32x32 Aseprite export with a `hitbox` slice at (8, 16, 16, 16).
pub fn write_aseprite(dir: &Path) -> (PathBuf, PathBuf) {
    let image = write_png(dir, "hero.png", 64, 32);
    let json = dir.join("hero.json");
    fs::write(
        &json,
        r#"{
  "frames": {
    "hero 0.aseprite": {"frame": {"x":0,"y":0,"w":32,"h":32}, "duration": 100, "sourceSize": {"w":32,"h":32}},
    "hero 1.aseprite": {"frame": {"x":32,"y":0,"w":32,"h":32}, "duration": 100, "sourceSize": {"w":32,"h":32}}
  },
  "meta": {
    "frameTags": [{"name": "walk", "from": 0, "to": 1}],
    "slices": [{"name": "hitbox", "keys": [{"frame": 0, "bounds": {"x":8,"y":16,"w":16,"h":16}}]}]
  }
}"#,
    )
    .expect("write aseprite json");
    (json, image)
}
