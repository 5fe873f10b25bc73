//! Walks a TMX maze in first person.
//!
//! `cargo run --example maze_walk -- path/to/map.tmx` loads a map whose
//! `Collision` layer holds the walls. Without an argument a small maze and
//! its tileset are generated into a temporary directory.
//!
//! WASD / arrows move and turn, Tab toggles the top-down view.

use anyhow::Context;
use image::{Rgba, RgbaImage};
use macroquad::prelude::*;
use macroquad_tiled_world::{
    GraphicsObject, Host, MazeConfig, MazeItemConfig, TmxLoadOptions, World, WorldConfig,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const MAZE: [&str; 9] = [
    "###########",
    "#....#....#",
    "#.##.#.##.#",
    "#.#.....#.#",
    "#.#.###.#.#",
    "#...#.....#",
    "###.#.###.#",
    "#.........#",
    "###########",
];

fn window_conf() -> Conf {
    Conf {
        window_title: "Maze Walk".into(),
        window_width: 1280,
        window_height: 720,
        ..Default::default()
    }
}

/// The window, plus a score kept by the pickup callback.
struct DemoHost {
    score: u32,
}

impl Host for DemoHost {
    fn frame_duration_ms(&self) -> f32 {
        get_frame_time() * 1000.0
    }

    fn projection(&self) -> Mat4 {
        // 2D view: 12 world units tall
        let half_h = 6.0;
        let half_w = half_h * self.aspect();
        Mat4::orthographic_rh_gl(-half_w, half_w, -half_h, half_h, -1.0, 1.0)
    }

    fn aspect(&self) -> f32 {
        screen_width() / screen_height().max(1.0)
    }

    fn invoke(&mut self, world: &mut World, callback: &str, args: &[Value]) -> anyhow::Result<()> {
        match callback {
            "on_pickup" => {
                self.score += 1;
                tracing::info!(item = %args[1], score = self.score, "picked up");
                if let Some(id) = args[0].as_u64() {
                    world.maze_item_remove(id as usize)?;
                }
            }
            "on_contact" => tracing::trace!(?args, "contact"),
            other => anyhow::bail!("no such callback `{other}`"),
        }
        Ok(())
    }
}

/// Writes a 2-tile tileset (wall, floor) and a TMX built from [`MAZE`].
fn generate_maze(dir: &Path) -> anyhow::Result<PathBuf> {
    let mut tiles = RgbaImage::new(64, 32);
    for (x, y, px) in tiles.enumerate_pixels_mut() {
        let edge = x % 32 == 0 || y % 32 == 0;
        *px = match (x < 32, edge) {
            (true, true) => Rgba([60, 40, 30, 255]),
            (true, false) => Rgba([150, 90, 60, 255]),
            (false, _) => Rgba([90, 90, 100, 255]),
        };
    }
    tiles.save(dir.join("maze_tiles.png")).context("writing tileset")?;

    let mut coin = RgbaImage::new(32, 32);
    for (x, y, px) in coin.enumerate_pixels_mut() {
        let d = (x as f32 - 15.5).hypot(y as f32 - 15.5);
        *px = if d < 12.0 { Rgba([240, 200, 40, 255]) } else { Rgba([0, 0, 0, 0]) };
    }
    coin.save(dir.join("coin.png")).context("writing coin")?;

    let (w, h) = (MAZE[0].len(), MAZE.len());
    let walls: Vec<String> = MAZE
        .iter()
        .map(|row| row.chars().map(|c| if c == '#' { "1" } else { "0" }).collect::<Vec<_>>().join(","))
        .collect();
    let floor = vec![vec!["2"; w].join(","); h];
    let tmx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="{w}" height="{h}" tilewidth="32" tileheight="32">
 <tileset firstgid="1" name="maze" tilewidth="32" tileheight="32" tilecount="2" columns="2">
  <image source="maze_tiles.png" width="64" height="32"/>
 </tileset>
 <layer name="Floor" width="{w}" height="{h}">
  <data encoding="csv">{floor}</data>
 </layer>
 <layer name="Collision" width="{w}" height="{h}">
  <data encoding="csv">{walls}</data>
 </layer>
 <objectgroup name="Spawns">
  <object id="1" name="start" x="48" y="48"><point/><properties><property name="yaw" type="float" value="90"/></properties></object>
 </objectgroup>
</map>
"#,
        floor = floor.join(",\n"),
        walls = walls.join(",\n"),
    );
    let path = dir.join("maze.tmx");
    std::fs::write(&path, tmx).context("writing TMX")?;
    Ok(path)
}

fn build_world(map: &Path, assets: &Path) -> anyhow::Result<World> {
    let mut world = World::new(WorldConfig {
        gravity: [0.0, 0.0],
        collision_callback: Some("on_contact".into()),
        ..Default::default()
    });
    world.load_tmx(map, &TmxLoadOptions::default())?;
    world.maze_enable(true)?;
    world.maze_configure(&MazeConfig {
        floor_gid: Some(2),
        ceiling_gid: Some(1),
        fog_end: Some(6.0),
        ..Default::default()
    })?;
    if world.object_by_name("start").is_ok() {
        world.maze_place_at_object("start")?;
    }

    let coin = assets.join("coin.png");
    if coin.exists() {
        let mapping = json!({
            "coin": {"frame_rect": {"x": 0, "y": 0, "w": 32, "h": 32}},
            "_metadata": {"image": "coin.png"},
        });
        world.add_sprite_sheet("coin", &mapping, Some(assets))?;
        world.maze_item_callback(Some("on_pickup".into()))?;
        for (gx, gy) in [(3, 3), (9, 1), (5, 7), (1, 7)] {
            let cell = world.maze().map(|m| m.cell).unwrap_or(Vec2::ONE);
            let cfg = MazeItemConfig {
                bob_amplitude: Some(0.05),
                spin_speed: Some(2.0),
                ..Default::default()
            };
            world.maze_item_add("coin", (gx as f32 + 0.5) * cell.x, (gy as f32 + 0.5) * cell.y, &cfg)?;
        }
    }
    Ok(world)
}

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!("{e:#}");
    }
}

async fn run() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let map = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => generate_maze(scratch.path())?,
    };
    let assets = map.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut world = build_world(&map, &assets)?;
    let mut host = DemoHost { score: 0 };
    let mut first_person = true;

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }
        if is_key_pressed(KeyCode::Tab) {
            first_person = !first_person;
            world.maze_enable(first_person)?;
        }

        let dt = get_frame_time();
        let axis = |pos: &[KeyCode], neg: &[KeyCode]| {
            let on = |keys: &[KeyCode]| keys.iter().any(|k| is_key_down(*k));
            on(pos) as i32 as f32 - on(neg) as i32 as f32
        };
        let forward = axis(&[KeyCode::W, KeyCode::Up], &[KeyCode::S, KeyCode::Down]);
        let turn = axis(&[KeyCode::D, KeyCode::Right], &[KeyCode::A, KeyCode::Left]);
        let strafe = axis(&[KeyCode::E], &[KeyCode::Q]);
        world.maze_rotate(turn, 0.0, Some(dt))?;
        world.maze_move(forward, strafe, dt)?;

        let fog = world.maze().map(|m| m.params.fog_color).unwrap_or(Vec3::ZERO);
        clear_background(if first_person {
            Color::new(fog.x, fog.y, fog.z, 1.0)
        } else {
            BLACK
        });

        world.update(&mut host)?;
        GraphicsObject::draw(&mut world, &host)?;

        draw_text(&format!("FPS: {}  coins: {}", get_fps(), host.score), 20.0, 40.0, 30.0, WHITE);
        next_frame().await;
    }
    Ok(())
}
