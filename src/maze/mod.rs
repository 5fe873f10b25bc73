//! The first-person view of a loaded map. The collision layer becomes a wall
//! grid; the camera walks it with grid collision while a circle body mirrors
//! it in the physics world so sensors still see the player.

pub mod camera;
pub mod geometry;
pub mod items;

use crate::atlas::{AtlasId, UvRect};
use crate::config::{MazeConfig, MazeItemConfig};
use crate::error::{Result, WorldError};
use crate::map::{MapTransform, TileInstance};
use crate::physics::BodyHandle;
use crate::World;
use camera::FpsCamera;
use geometry::{MazeMesh, MeshStyle, Surface};
use items::{ItemId, ItemTable, MazeItem};
use macroquad::prelude::*;

/// Wall occupancy, row 0 being the top row of the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MazeGrid {
    pub width: u32,
    pub height: u32,
    cells: Vec<bool>,
}

impl MazeGrid {
    pub fn new(width: u32, height: u32) -> Self {
        MazeGrid {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    fn index(&self, gx: i32, gy: i32) -> Option<usize> {
        if gx < 0 || gy < 0 || gx >= self.width as i32 || gy >= self.height as i32 {
            return None;
        }
        Some(gy as usize * self.width as usize + gx as usize)
    }

    /// Cells outside the grid count as walls.
    pub fn is_wall(&self, gx: i32, gy: i32) -> bool {
        self.index(gx, gy).map_or(true, |i| self.cells[i])
    }

    pub fn set_wall(&mut self, gx: i32, gy: i32, wall: bool) {
        if let Some(i) = self.index(gx, gy) {
            self.cells[i] = wall;
        }
    }

    pub fn wall_count(&self) -> usize {
        self.cells.iter().filter(|w| **w).count()
    }

    /// A cell is a wall iff some collision tile's cell centre maps into it.
    pub fn from_tiles(tiles: &[TileInstance], t: &MapTransform, width: u32, height: u32) -> Self {
        let mut grid = MazeGrid::new(width, height);
        let cell = t.cell();
        let map_h = height as f32 * cell.y;
        for tile in tiles.iter().filter(|t| t.is_collision) {
            let c = tile.center - tile.size * 0.5 + cell * 0.5;
            let gx = ((c.x - t.origin.x) / cell.x).floor() as i32;
            let gy = ((map_h - (c.y - t.origin.y)) / cell.y).floor() as i32;
            grid.set_wall(gx, gy, true);
        }
        grid
    }

    pub fn first_empty(&self) -> Option<(i32, i32)> {
        (0..self.height as i32)
            .flat_map(|gy| (0..self.width as i32).map(move |gx| (gx, gy)))
            .find(|&(gx, gy)| !self.is_wall(gx, gy))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MazeParams {
    pub wall_height: f32,
    pub eye_height: f32,
    pub move_speed: f32,
    pub turn_speed: f32,
    /// Vertical field of view, radians.
    pub fov: f32,
    pub radius: f32,
    pub fog_start: f32,
    pub fog_end: f32,
    pub fog_color: Vec3,
    pub ambient: f32,
    pub light_dir: Vec3,
    pub draw_floor: bool,
    pub draw_ceiling: bool,
}

impl MazeParams {
    /// Defaults scaled to one map cell.
    pub fn for_cell(cell: Vec2) -> Self {
        let c = cell.x.min(cell.y);
        MazeParams {
            wall_height: c,
            eye_height: c * 0.5,
            move_speed: c * 2.0,
            turn_speed: 2.0,
            fov: 60f32.to_radians(),
            radius: c * 0.2,
            fog_start: c * 2.0,
            fog_end: c * 8.0,
            fog_color: vec3(0.05, 0.05, 0.08),
            ambient: 0.3,
            light_dir: vec3(0.4, 1.0, 0.25).normalize(),
            draw_floor: true,
            draw_ceiling: true,
        }
    }
}

pub struct Maze {
    pub grid: MazeGrid,
    pub cell: Vec2,
    /// World position of the map's bottom-left corner.
    pub origin: Vec2,
    pub params: MazeParams,
    pub camera: FpsCamera,
    pub body: Option<BodyHandle>,
    pub items: ItemTable,
    pub pickup_callback: Option<String>,
    /// True while the first-person view is shown.
    pub active: bool,
    /// Geometry must be rebuilt before the next draw.
    pub dirty: bool,
    /// Wall, floor, ceiling; `None` draws flat white.
    pub surfaces: [Option<(AtlasId, UvRect)>; 3],
}

impl Maze {
    /// Maze `(x, z)` to world `(x, y)`.
    pub fn to_world(&self, p: Vec2) -> Vec2 {
        vec2(
            p.x + self.origin.x,
            self.grid.height as f32 * self.cell.y - p.y + self.origin.y,
        )
    }

    pub fn from_world(&self, w: Vec2) -> Vec2 {
        vec2(
            w.x - self.origin.x,
            self.grid.height as f32 * self.cell.y - (w.y - self.origin.y),
        )
    }

    /// Facing on the 2D map (world space, Y up).
    pub fn map_forward(&self) -> Vec2 {
        let f = self.camera.forward();
        vec2(f.x, -f.y)
    }

    pub fn camera_world(&self) -> Vec2 {
        self.to_world(self.camera.position)
    }

    pub fn mesh(&self) -> MazeMesh {
        let uv = |s: Surface| self.surfaces[s as usize].map_or(UvRect::FULL, |(_, uv)| uv);
        geometry::build_mesh(
            &self.grid,
            self.cell,
            &MeshStyle {
                wall_height: self.params.wall_height,
                uvs: [uv(Surface::Wall), uv(Surface::Floor), uv(Surface::Ceiling)],
                floor: self.params.draw_floor,
                ceiling: self.params.draw_ceiling,
            },
        )
    }

    pub fn view(&self) -> Mat4 {
        self.camera.view(self.params.eye_height)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        let near = self.cell.x.min(self.cell.y) * 0.02;
        let far = (self.params.fog_end * 1.5)
            .max(self.grid.width.max(self.grid.height) as f32 * self.cell.x.max(self.cell.y));
        Mat4::perspective_rh_gl(self.params.fov, aspect.max(1e-3), near, far)
    }

    fn info(&self) -> serde_json::Value {
        let p = &self.params;
        serde_json::json!({
            "active": self.active,
            "grid_w": self.grid.width,
            "grid_h": self.grid.height,
            "walls": self.grid.wall_count(),
            "cell_w": self.cell.x,
            "cell_h": self.cell.y,
            "wall_height": p.wall_height,
            "eye_height": p.eye_height,
            "move_speed": p.move_speed,
            "turn_speed": p.turn_speed,
            "fov": p.fov.to_degrees(),
            "radius": p.radius,
            "fog_start": p.fog_start,
            "fog_end": p.fog_end,
            "fog_color": p.fog_color.to_array(),
            "ambient": p.ambient,
            "draw_floor": p.draw_floor,
            "draw_ceiling": p.draw_ceiling,
            "items": self.items.len(),
            "pickup_callback": self.pickup_callback,
        })
    }
}

fn require_finite(what: &str, values: &[f32]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(WorldError::invalid(format!("{what} must be finite")))
    }
}

impl World {
    fn build_maze(&self) -> Result<Maze> {
        let map = self
            .map
            .as_ref()
            .ok_or_else(|| WorldError::invalid("no map loaded"))?;
        let t = map.transform;
        let grid = MazeGrid::from_tiles(&self.tiles, &t, map.width, map.height);
        let cell = t.cell();
        let wall = self
            .tiles
            .iter()
            .find(|tile| tile.is_collision)
            .and_then(|tile| self.atlases.uv_for_gid(tile.gid));
        let (gx, gy) = grid.first_empty().unwrap_or((0, 0));
        tracing::debug!(w = grid.width, h = grid.height, walls = grid.wall_count(), "maze grid extracted");
        Ok(Maze {
            camera: FpsCamera {
                position: vec2((gx as f32 + 0.5) * cell.x, (gy as f32 + 0.5) * cell.y),
                ..Default::default()
            },
            grid,
            cell,
            origin: t.origin,
            params: MazeParams::for_cell(cell),
            body: None,
            items: ItemTable::default(),
            pickup_callback: None,
            active: false,
            dirty: true,
            surfaces: [wall, None, None],
        })
    }

    pub(crate) fn maze_ref(&self) -> Result<&Maze> {
        self.maze
            .as_ref()
            .ok_or_else(|| WorldError::invalid("maze view has not been enabled"))
    }

    pub(crate) fn maze_mut(&mut self) -> Result<&mut Maze> {
        self.maze
            .as_mut()
            .ok_or_else(|| WorldError::invalid("maze view has not been enabled"))
    }

    pub fn maze(&self) -> Option<&Maze> {
        self.maze.as_ref()
    }

    /// Shows or hides the first-person view. The first enable extracts the
    /// grid from the loaded map and spawns the camera body.
    pub fn maze_enable(&mut self, enabled: bool) -> Result<()> {
        if self.maze.is_none() {
            if !enabled {
                return Ok(());
            }
            let mut maze = self.build_maze()?;
            let handle = self
                .physics
                .add_maze_camera(maze.camera_world(), maze.params.radius);
            self.physics.bind_name(MAZE_CAMERA_NAME, handle);
            maze.body = Some(handle);
            self.maze = Some(maze);
        }
        let maze = self.maze_mut()?;
        maze.active = enabled;
        tracing::info!(enabled, "maze view toggled");
        self.maze_project_camera();
        Ok(())
    }

    /// Teleports the body to the camera's grid-resolved position.
    fn maze_snap_body(&mut self) {
        let Some(maze) = &self.maze else { return };
        if let Some(body) = maze.body {
            self.physics.teleport(body, maze.camera_world());
        }
    }

    pub fn maze_camera(&self) -> Result<serde_json::Value> {
        let maze = self.maze_ref()?;
        let w = maze.camera_world();
        let (gx, gy) = camera::cell_of(maze.cell, maze.camera.position);
        Ok(serde_json::json!({
            "x": maze.camera.position.x,
            "z": maze.camera.position.y,
            "yaw": maze.camera.yaw,
            "pitch": maze.camera.pitch,
            "world_x": w.x,
            "world_y": w.y,
            "cell_x": gx,
            "cell_y": gy,
        }))
    }

    /// Places the camera without collision checks.
    pub fn maze_set_camera(&mut self, x: f32, z: f32, yaw: Option<f32>, pitch: Option<f32>) -> Result<()> {
        require_finite("camera position", &[x, z, yaw.unwrap_or(0.0), pitch.unwrap_or(0.0)])?;
        let maze = self.maze_mut()?;
        maze.camera.position = vec2(x, z);
        if let Some(yaw) = yaw {
            maze.camera.yaw = yaw.rem_euclid(std::f32::consts::TAU);
        }
        if let Some(pitch) = pitch {
            maze.camera.set_pitch(pitch);
        }
        self.maze_snap_body();
        self.maze_project_camera();
        Ok(())
    }

    /// Walks the camera; `forward` and `strafe` are clamped to `[-1, 1]`.
    /// Returns true if a wall stopped part of the move.
    pub fn maze_move(&mut self, forward: f32, strafe: f32, dt: f32) -> Result<bool> {
        require_finite("move input", &[forward, strafe, dt])?;
        let maze = self.maze_mut()?;
        let dir = maze.camera.forward() * forward.clamp(-1.0, 1.0)
            + maze.camera.right() * strafe.clamp(-1.0, 1.0);
        let delta = dir * maze.params.move_speed * dt.max(0.0);
        let (grid, cell, radius) = (&maze.grid, maze.cell, maze.params.radius);
        let hit = maze.camera.try_move(grid, cell, radius, delta);
        self.maze_snap_body();
        self.maze_project_camera();
        Ok(hit)
    }

    /// With `dt`, the deltas are turn inputs scaled by `turn_speed · dt`;
    /// without, they are radians.
    pub fn maze_rotate(&mut self, dyaw: f32, dpitch: f32, dt: Option<f32>) -> Result<()> {
        require_finite("rotation", &[dyaw, dpitch, dt.unwrap_or(0.0)])?;
        let maze = self.maze_mut()?;
        let k = dt.map_or(1.0, |dt| maze.params.turn_speed * dt);
        maze.camera.rotate(dyaw * k, dpitch * k);
        Ok(())
    }

    pub fn maze_configure(&mut self, cfg: &MazeConfig) -> Result<()> {
        let resolve = |gid: Option<u32>| -> Result<Option<(AtlasId, UvRect)>> {
            gid.map(|g| {
                self.atlases
                    .uv_for_gid(g)
                    .ok_or_else(|| WorldError::not_found("tile GID", g.to_string()))
            })
            .transpose()
        };
        let (wall, floor, ceiling) = (
            resolve(cfg.wall_gid)?,
            resolve(cfg.floor_gid)?,
            resolve(cfg.ceiling_gid)?,
        );
        for (what, v) in [
            ("wall_height", cfg.wall_height),
            ("eye_height", cfg.eye_height),
            ("radius", cfg.radius),
            ("fog_end", cfg.fog_end),
        ] {
            if v.is_some_and(|v| !v.is_finite() || v <= 0.0) {
                return Err(WorldError::invalid(format!("{what} must be positive")));
            }
        }

        let maze = self.maze_mut()?;
        let p = &mut maze.params;
        let mut geometry = false;
        if let Some(v) = cfg.wall_height {
            p.wall_height = v;
            geometry = true;
        }
        if let Some(v) = cfg.eye_height {
            p.eye_height = v;
        }
        if let Some(v) = cfg.move_speed {
            p.move_speed = v;
        }
        if let Some(v) = cfg.turn_speed {
            p.turn_speed = v;
        }
        if let Some(v) = cfg.fov {
            p.fov = v.clamp(1.0, 179.0).to_radians();
        }
        if let Some(v) = cfg.fog_start {
            p.fog_start = v;
        }
        if let Some(v) = cfg.fog_end {
            p.fog_end = v;
        }
        if let Some(v) = cfg.fog_color {
            p.fog_color = Vec3::from(v);
        }
        if let Some(v) = cfg.ambient {
            p.ambient = v.clamp(0.0, 1.0);
        }
        if let Some(v) = cfg.draw_floor {
            p.draw_floor = v;
            geometry = true;
        }
        if let Some(v) = cfg.draw_ceiling {
            p.draw_ceiling = v;
            geometry = true;
        }
        for (slot, value) in [(Surface::Wall, wall), (Surface::Floor, floor), (Surface::Ceiling, ceiling)] {
            if value.is_some() {
                maze.surfaces[slot as usize] = value;
                geometry = true;
            }
        }
        maze.dirty |= geometry;

        let new_radius = cfg.radius.filter(|r| *r != maze.params.radius);
        if let Some(r) = new_radius {
            maze.params.radius = r;
            let (center, old) = (maze.camera_world(), maze.body.take());
            if let Some(old) = old {
                self.physics.remove_body(old);
            }
            let handle = self.physics.add_maze_camera(center, r);
            self.physics.bind_name(MAZE_CAMERA_NAME, handle);
            self.maze_mut()?.body = Some(handle);
        }
        Ok(())
    }

    pub fn maze_info(&self) -> Result<serde_json::Value> {
        Ok(self.maze_ref()?.info())
    }

    /// Moves the camera to a map object's centre. A numeric `yaw` property
    /// (degrees) sets the facing.
    pub fn maze_place_at_object(&mut self, name: &str) -> Result<()> {
        let (center, yaw) = {
            let obj = self.object_by_name(name)?;
            (obj.center(), obj.properties.get_f32("yaw"))
        };
        let p = self.maze_ref()?.from_world(center);
        self.maze_set_camera(p.x, p.y, yaw.map(f32::to_radians), None)
    }

    /// Re-extracts the grid from the current tiles.
    pub fn maze_rebuild(&mut self) -> Result<()> {
        let map = self
            .map
            .as_ref()
            .ok_or_else(|| WorldError::invalid("no map loaded"))?;
        let t = map.transform;
        let grid = MazeGrid::from_tiles(&self.tiles, &t, map.width, map.height);
        let maze = self.maze_mut()?;
        maze.grid = grid;
        maze.cell = t.cell();
        maze.origin = t.origin;
        maze.dirty = true;
        Ok(())
    }

    pub fn maze_cell(&self, gx: i32, gy: i32) -> Result<bool> {
        let grid = &self.maze_ref()?.grid;
        if gx < 0 || gy < 0 || gx >= grid.width as i32 || gy >= grid.height as i32 {
            return Err(WorldError::invalid(format!(
                "cell ({gx}, {gy}) outside {}x{} grid",
                grid.width, grid.height
            )));
        }
        Ok(grid.is_wall(gx, gy))
    }

    /// Places a billboard of `sheet`'s frames at maze `(x, z)`.
    pub fn maze_item_add(&mut self, sheet: &str, x: f32, z: f32, cfg: &MazeItemConfig) -> Result<ItemId> {
        require_finite("item position", &[x, z])?;
        let sheet_id = self.sheets.require(sheet)?;
        let frames = self.sheets.get(sheet_id).map_or(0, |s| s.frames.len());
        let frame = cfg.frame.unwrap_or(0);
        if frame >= frames.max(1) {
            return Err(WorldError::invalid(format!("frame index {frame} out of range")));
        }
        let maze = self.maze_mut()?;
        let size = maze.cell * 0.5;
        let mut item = MazeItem::new(String::new(), sheet_id, vec2(x, z), size);
        item.frame = frame;
        item.apply(cfg);
        let id = maze.items.insert(item)?;
        let item = maze.items.get_mut(id)?;
        if item.name.is_empty() {
            item.name = format!("item_{id}");
        }
        Ok(id)
    }

    pub fn maze_item_show(&mut self, id: ItemId, visible: bool) -> Result<()> {
        self.maze_mut()?.items.get_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn maze_item_remove(&mut self, id: ItemId) -> Result<()> {
        self.maze_mut()?.items.remove(id)?;
        Ok(())
    }

    pub fn maze_item_position(&mut self, id: ItemId, x: f32, z: f32) -> Result<()> {
        require_finite("item position", &[x, z])?;
        self.maze_mut()?.items.get_mut(id)?.position = vec2(x, z);
        Ok(())
    }

    pub fn maze_item_configure(&mut self, id: ItemId, cfg: &MazeItemConfig) -> Result<()> {
        if let Some(frame) = cfg.frame {
            let sheet = self.maze_ref()?.items.get(id)?.sheet;
            if self.sheets.get(sheet).and_then(|s| s.frame(frame)).is_none() {
                return Err(WorldError::invalid(format!("frame index {frame} out of range")));
            }
        }
        let item = self.maze_mut()?.items.get_mut(id)?;
        item.apply(cfg);
        if let Some(frame) = cfg.frame {
            item.frame = frame;
        }
        Ok(())
    }

    pub fn maze_item_set_animation(&mut self, id: ItemId, frames: Vec<u32>, fps: f32, looping: bool) -> Result<()> {
        if frames.is_empty() {
            return Err(WorldError::invalid("animation needs at least one frame"));
        }
        if fps <= 0.0 {
            return Err(WorldError::invalid("fps must be positive"));
        }
        let sheet = self.maze_ref()?.items.get(id)?.sheet;
        let count = self.sheets.get(sheet).map_or(0, |s| s.frames.len());
        if let Some(bad) = frames.iter().find(|f| **f as usize >= count) {
            return Err(WorldError::invalid(format!("frame index {bad} out of range")));
        }
        let item = self.maze_mut()?.items.get_mut(id)?;
        item.frame = frames[0] as usize;
        item.anim = crate::sprite::AnimationState::new(frames, fps, looping);
        Ok(())
    }

    pub fn maze_item_play_animation(&mut self, id: ItemId, name: &str, looping: bool) -> Result<()> {
        let sheet = self.maze_ref()?.items.get(id)?.sheet;
        let (frames, fps) = self
            .sheets
            .get(sheet)
            .and_then(|s| s.animation(name))
            .map(|a| (a.frames.clone(), a.fps))
            .ok_or_else(|| WorldError::not_found("animation", name))?;
        self.maze_item_set_animation(id, frames, fps, looping)
    }

    /// Host callback run with `(item_id, name)` on pickup.
    pub fn maze_item_callback(&mut self, callback: Option<String>) -> Result<()> {
        self.maze_mut()?.pickup_callback = callback.filter(|c| !c.is_empty());
        Ok(())
    }

    pub fn maze_item_list(&self) -> Result<Vec<serde_json::Value>> {
        let t = self.clock;
        Ok(self
            .maze_ref()?
            .items
            .iter()
            .map(|(id, item)| item.to_json(id, t))
            .collect())
    }

    pub fn maze_item_info(&self, id: ItemId) -> Result<serde_json::Value> {
        Ok(self.maze_ref()?.items.get(id)?.to_json(id, self.clock))
    }

    /// Keeps the 2D camera on the player while the first-person view is up.
    pub(crate) fn maze_project_camera(&mut self) {
        if let Some(maze) = self.maze.as_ref().filter(|m| m.active) {
            let p = maze.camera_world();
            self.camera.set_position(p);
        }
    }

    /// Physics never moves the camera; undo whatever the step did.
    pub(crate) fn maze_resnap_body(&mut self) {
        self.maze_snap_body();
    }

    /// Returns the items picked up this frame.
    pub(crate) fn maze_advance_items(&mut self, dt: f32) -> Vec<(ItemId, String)> {
        let Some(maze) = self.maze.as_mut().filter(|m| m.active) else {
            return Vec::new();
        };
        let eye = maze.camera.position;
        let (frames, picked) = maze.items.advance(dt, eye);
        for (id, frame) in frames {
            if let Ok(item) = maze.items.get_mut(id) {
                item.frame = frame as usize;
            }
        }
        picked
    }
}

/// Body-table name of the maze camera.
pub const MAZE_CAMERA_NAME: &str = "maze_camera";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TmxLoadOptions;
    use crate::ir_map::IrMap;

    fn transform(w: u32, h: u32) -> MapTransform {
        let ir = IrMap {
            width: w,
            height: h,
            tile_w: 32,
            tile_h: 32,
            properties: Default::default(),
            tilesets: Vec::new(),
            layers: Vec::new(),
        };
        MapTransform::new(&ir, &TmxLoadOptions::default(), true).expect("transform")
    }

    fn tile(t: &MapTransform, tx: u32, ty: u32, size: Vec2) -> TileInstance {
        let cell = t.cell();
        TileInstance {
            name: format!("tile_{tx}_{ty}"),
            gid: 1,
            layer: 0,
            grid: (tx, ty),
            center: t.tile_center(tx, ty) - cell * 0.5 + size * 0.5,
            size,
            uv: UvRect::FULL,
            atlas: None,
            visible: true,
            is_collision: true,
            has_body: tx == 0,
        }
    }

    #[test]
    fn grid_uses_every_collision_tile_not_just_bodies() {
        let t = transform(4, 4);
        let tiles: Vec<_> = (0..4)
            .flat_map(|tx| [tile(&t, tx, 0, Vec2::ONE), tile(&t, tx, 3, Vec2::ONE)])
            .collect();
        let grid = MazeGrid::from_tiles(&tiles, &t, 4, 4);
        for gx in 0..4 {
            assert!(grid.is_wall(gx, 0));
            assert!(grid.is_wall(gx, 3));
            assert!(!grid.is_wall(gx, 1));
            assert!(!grid.is_wall(gx, 2));
        }
        assert_eq!(grid.wall_count(), 8);
        assert_eq!(grid.first_empty(), Some((0, 1)));
    }

    #[test]
    fn oversized_tiles_map_to_their_anchor_cell() {
        let t = transform(4, 4);
        let grid = MazeGrid::from_tiles(&[tile(&t, 2, 1, vec2(2.0, 3.0))], &t, 4, 4);
        assert!(grid.is_wall(2, 1));
        assert_eq!(grid.wall_count(), 1);
    }

    #[test]
    fn maze_and_world_coordinates_round_trip() {
        let t = transform(4, 4);
        let maze = Maze {
            grid: MazeGrid::new(4, 4),
            cell: t.cell(),
            origin: t.origin,
            params: MazeParams::for_cell(t.cell()),
            camera: FpsCamera::default(),
            body: None,
            items: ItemTable::default(),
            pickup_callback: None,
            active: false,
            dirty: true,
            surfaces: [None; 3],
        };
        // centre of cell (0, 0) is the map's top-left tile
        assert_eq!(maze.to_world(vec2(0.5, 0.5)), t.tile_center(0, 0));
        let w = vec2(0.7, -1.2);
        assert!((maze.to_world(maze.from_world(w)) - w).length() < 1e-6);
        assert_eq!(maze.map_forward(), vec2(0.0, 1.0));
    }
}
