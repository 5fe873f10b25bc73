//! The host-facing command surface: a registry of worlds and a string
//! dispatcher validating positional arguments one by one.
//!
//! Every command but `world_create` takes the world handle first. Results
//! are JSON values (ids, dicts, lists of dicts, or `null`); failures come
//! back as [`WorldError`], whose `Display` is the host-visible message.

use crate::camera::CameraMode;
use crate::config::{BodyOptions, MazeConfig, MazeItemConfig, TmxLoadOptions, WorldConfig};
use crate::error::{Result, WorldError};
use crate::world::{World, WorldEvent};
use macroquad::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

pub type WorldId = u32;

/// All worlds created through commands.
#[derive(Default)]
pub struct Worlds {
    worlds: BTreeMap<WorldId, World>,
    next: WorldId,
}

/// Positional arguments of one command.
struct Args<'a> {
    cmd: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    fn bad(&self, msg: impl std::fmt::Display) -> WorldError {
        WorldError::invalid(format!("{}: {msg}", self.cmd))
    }

    fn arity(&self, min: usize, max: usize) -> Result<()> {
        let n = self.values.len();
        if n < min || n > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min}..={max}")
            };
            return Err(self.bad(format!("expected {expected} arguments, got {n}")));
        }
        Ok(())
    }

    fn get(&self, i: usize) -> Result<&'a Value> {
        self.values
            .get(i)
            .ok_or_else(|| self.bad(format!("missing argument {}", i + 1)))
    }

    fn has(&self, i: usize) -> bool {
        self.values.get(i).is_some_and(|v| !v.is_null())
    }

    fn f32(&self, i: usize) -> Result<f32> {
        let v = self.get(i)?;
        v.as_f64()
            .map(|f| f as f32)
            .filter(|f| f.is_finite())
            .ok_or_else(|| self.bad(format!("argument {} must be a number, got {v}", i + 1)))
    }

    fn opt_f32(&self, i: usize) -> Result<Option<f32>> {
        if self.has(i) {
            self.f32(i).map(Some)
        } else {
            Ok(None)
        }
    }

    fn u64(&self, i: usize) -> Result<u64> {
        let v = self.get(i)?;
        v.as_u64()
            .ok_or_else(|| self.bad(format!("argument {} must be a non-negative integer, got {v}", i + 1)))
    }

    fn u32(&self, i: usize) -> Result<u32> {
        let n = self.u64(i)?;
        u32::try_from(n).map_err(|_| self.bad(format!("argument {} out of range: {n}", i + 1)))
    }

    fn usize(&self, i: usize) -> Result<usize> {
        Ok(self.u64(i)? as usize)
    }

    fn i32(&self, i: usize) -> Result<i32> {
        let v = self.get(i)?;
        v.as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| self.bad(format!("argument {} must be an integer, got {v}", i + 1)))
    }

    fn bool(&self, i: usize) -> Result<bool> {
        let v = self.get(i)?;
        match v {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) if n.as_i64().is_some() => Ok(n.as_i64() != Some(0)),
            _ => Err(self.bad(format!("argument {} must be a boolean, got {v}", i + 1))),
        }
    }

    fn opt_bool(&self, i: usize, default: bool) -> Result<bool> {
        if self.has(i) {
            self.bool(i)
        } else {
            Ok(default)
        }
    }

    fn str(&self, i: usize) -> Result<&'a str> {
        let v = self.get(i)?;
        v.as_str()
            .ok_or_else(|| self.bad(format!("argument {} must be a string, got {v}", i + 1)))
    }

    /// A string, or `null`/`""` to clear.
    fn opt_name(&self, i: usize) -> Result<Option<String>> {
        if self.has(i) {
            Ok(Some(self.str(i)?.to_owned()).filter(|s| !s.is_empty()))
        } else {
            Ok(None)
        }
    }

    fn vec2(&self, i: usize) -> Result<Vec2> {
        Ok(vec2(self.f32(i)?, self.f32(i + 1)?))
    }

    fn dict<T: DeserializeOwned>(&self, i: usize) -> Result<T> {
        let v = self.get(i)?;
        if !v.is_object() {
            return Err(self.bad(format!("argument {} must be a dict, got {v}", i + 1)));
        }
        serde_json::from_value(v.clone()).map_err(|e| self.bad(format!("argument {}: {e}", i + 1)))
    }

    fn opt_dict<T: DeserializeOwned>(&self, i: usize) -> Result<Option<T>> {
        if self.has(i) {
            self.dict(i).map(Some)
        } else {
            Ok(None)
        }
    }

    fn u32_list(&self, i: usize) -> Result<Vec<u32>> {
        let v = self.get(i)?;
        let items = v
            .as_array()
            .ok_or_else(|| self.bad(format!("argument {} must be a list, got {v}", i + 1)))?;
        items
            .iter()
            .map(|x| {
                x.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| self.bad(format!("list item {x} is not a frame number")))
            })
            .collect()
    }
}

fn event_json(e: &WorldEvent) -> Value {
    match e {
        WorldEvent::Contact { a, b, sensor } => json!({"kind": "contact", "a": a, "b": b, "sensor": sensor}),
        WorldEvent::Pickup { item, name } => json!({"kind": "pickup", "item": item, "name": name}),
    }
}

impl Worlds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, config: WorldConfig) -> WorldId {
        let id = self.next;
        self.next += 1;
        self.worlds.insert(id, World::new(config));
        tracing::debug!(id, "world created");
        id
    }

    pub fn destroy(&mut self, id: WorldId) -> Result<()> {
        self.worlds
            .remove(&id)
            .map(drop)
            .ok_or_else(|| WorldError::not_found("world", id.to_string()))
    }

    pub fn get(&self, id: WorldId) -> Result<&World> {
        self.worlds
            .get(&id)
            .ok_or_else(|| WorldError::not_found("world", id.to_string()))
    }

    pub fn get_mut(&mut self, id: WorldId) -> Result<&mut World> {
        self.worlds
            .get_mut(&id)
            .ok_or_else(|| WorldError::not_found("world", id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// Runs `cmd` with positional `args`.
    pub fn execute(&mut self, cmd: &str, args: &[Value]) -> Result<Value> {
        let a = Args { cmd, values: args };
        if cmd == "world_create" {
            a.arity(0, 1)?;
            let config = a.opt_dict::<WorldConfig>(0)?.unwrap_or_default();
            return Ok(json!(self.create(config)));
        }
        if cmd == "world_destroy" {
            a.arity(1, 1)?;
            self.destroy(a.u32(0)?)?;
            return Ok(Value::Null);
        }

        let id = a.u32(0)?;
        let w = self.get_mut(id)?;
        let null = |_: ()| Value::Null;

        match cmd {
            "world_set_gravity" => {
                a.arity(3, 3)?;
                w.set_gravity(a.vec2(1)?);
                Ok(Value::Null)
            }
            "world_set_auto_center" => {
                a.arity(2, 2)?;
                w.set_auto_center(a.bool(1)?);
                Ok(Value::Null)
            }
            "world_set_collision_callback" => {
                a.arity(1, 2)?;
                w.set_collision_callback(a.opt_name(1)?);
                Ok(Value::Null)
            }
            "world_step" => {
                a.arity(2, 2)?;
                let events = w.step(a.f32(1)?)?;
                Ok(Value::Array(events.iter().map(event_json).collect()))
            }
            "world_reset" => {
                a.arity(1, 1)?;
                w.reset();
                Ok(Value::Null)
            }

            "tmx_load" => {
                a.arity(2, 3)?;
                let opts = a.opt_dict::<TmxLoadOptions>(2)?.unwrap_or_default();
                Ok(w.load_tmx(a.str(1)?, &opts)?.to_json())
            }

            "sheet_add" => {
                a.arity(3, 4)?;
                let base = if a.has(3) { Some(Path::new(a.str(3)?)) } else { None };
                let mapping = a.get(2)?;
                if !mapping.is_object() {
                    return Err(a.bad("argument 3 must be a dict"));
                }
                Ok(json!(w.add_sprite_sheet(a.str(1)?, mapping, base)?))
            }
            "sheet_add_aseprite" => {
                a.arity(4, 4)?;
                let id = w.add_aseprite_sheet(a.str(1)?, Path::new(a.str(2)?), Path::new(a.str(3)?))?;
                Ok(json!(id))
            }
            "sheet_list" => {
                a.arity(1, 1)?;
                Ok(Value::Array(w.sheet_list()))
            }
            "sheet_animations" => {
                a.arity(2, 2)?;
                Ok(Value::Array(w.sheet_animations(a.str(1)?)?))
            }

            "sprite_create" => {
                a.arity(7, 8)?;
                let body = a.opt_dict::<BodyOptions>(7)?;
                let id = w.create_sprite(a.str(1)?, a.u32(2)?, a.vec2(3)?, a.vec2(5)?, body.as_ref())?;
                Ok(json!(id))
            }
            "sprite_create_from_sheet" => {
                a.arity(7, 8)?;
                let body = a.opt_dict::<BodyOptions>(7)?;
                let id = w.create_sprite_from_sheet(a.str(1)?, a.str(2)?, a.vec2(3)?, a.vec2(5)?, body.as_ref())?;
                Ok(json!(id))
            }
            "sprite_add_body" => {
                a.arity(2, 3)?;
                let opts = a.opt_dict::<BodyOptions>(2)?.unwrap_or_default();
                w.add_sprite_body(a.u32(1)?, &opts).map(null)
            }
            "sprite_set_frame" => {
                a.arity(3, 3)?;
                let sprite = a.u32(1)?;
                match a.get(2)? {
                    Value::String(name) => w.set_sprite_frame_by_name(sprite, name),
                    _ => w.set_sprite_frame(sprite, a.usize(2)?),
                }
                .map(null)
            }
            "sprite_remove" => {
                a.arity(2, 2)?;
                w.remove_sprite(a.u32(1)?).map(null)
            }
            "sprite_info" => {
                a.arity(2, 2)?;
                Ok(w.sprite_info(a.u32(1)?)?.to_json())
            }
            "sprite_by_name" => {
                a.arity(2, 2)?;
                let name = a.str(1)?;
                w.sprite_by_name(name)
                    .map(|id| json!(id))
                    .ok_or_else(|| WorldError::not_found("sprite", name))
            }
            "sprite_count" => {
                a.arity(1, 1)?;
                Ok(json!(w.sprite_count()))
            }
            "sprite_set_position" => {
                a.arity(4, 4)?;
                w.set_sprite_position(a.u32(1)?, a.vec2(2)?).map(null)
            }
            "sprite_set_rotation" => {
                a.arity(3, 3)?;
                w.set_sprite_rotation(a.u32(1)?, a.f32(2)?).map(null)
            }
            "sprite_set_visible" => {
                a.arity(3, 3)?;
                w.set_sprite_visible(a.u32(1)?, a.bool(2)?).map(null)
            }
            "sprite_set_tile" => {
                a.arity(3, 3)?;
                w.set_sprite_tile(a.u32(1)?, a.u32(2)?).map(null)
            }
            "sprite_apply_impulse" => {
                a.arity(4, 4)?;
                w.apply_sprite_impulse(a.u32(1)?, a.vec2(2)?).map(null)
            }
            "sprite_set_velocity" => {
                a.arity(4, 4)?;
                w.set_sprite_velocity(a.u32(1)?, a.vec2(2)?).map(null)
            }
            "sprite_apply_force" => {
                a.arity(4, 4)?;
                w.apply_sprite_force(a.u32(1)?, a.vec2(2)?).map(null)
            }
            "sprite_set_animation" => {
                a.arity(4, 5)?;
                let looping = a.opt_bool(4, true)?;
                w.set_sprite_animation(a.u32(1)?, a.u32_list(2)?, a.f32(3)?, looping)
                    .map(null)
            }
            "sprite_play_animation" => {
                a.arity(3, 4)?;
                let looping = a.opt_bool(3, true)?;
                w.play_sprite_animation(a.u32(1)?, a.str(2)?, looping).map(null)
            }
            "sprite_set_playing" => {
                a.arity(3, 3)?;
                w.set_sprite_playing(a.u32(1)?, a.bool(2)?).map(null)
            }

            "objects" => {
                a.arity(1, 1)?;
                Ok(Value::Array(w.objects().iter().map(|o| o.to_json()).collect()))
            }
            "map_info" => {
                a.arity(1, 1)?;
                w.map_info()
                    .map(|m| m.to_json())
                    .ok_or_else(|| WorldError::invalid("no map loaded"))
            }
            "set_offset" => {
                a.arity(3, 3)?;
                w.set_offset(a.vec2(1)?);
                Ok(Value::Null)
            }
            "query_point" => {
                a.arity(3, 3)?;
                Ok(w.query_point(a.vec2(1)?).to_json())
            }
            "query_aabb" => {
                a.arity(5, 5)?;
                Ok(w.query_aabb(a.vec2(1)?, a.vec2(3)?).to_json())
            }
            "tile_collision" => {
                a.arity(2, 2)?;
                let shapes = w.tile_collision(a.u32(1)?)?;
                Ok(Value::Array(shapes.iter().map(|s| s.to_json()).collect()))
            }

            "camera_set_mode" => {
                a.arity(2, 2)?;
                let mode = match a.get(1)? {
                    Value::String(s) if s == "locked" => CameraMode::Locked,
                    _ => a.dict::<CameraMode>(1)?,
                };
                w.set_camera_mode(mode).map(null)
            }
            "camera_set_smoothing" => {
                a.arity(2, 2)?;
                w.set_camera_smoothing(a.f32(1)?).map(null)
            }
            "camera_set_bounds" => {
                a.arity(5, 5)?;
                w.set_camera_bounds(a.vec2(1)?, a.vec2(3)?);
                Ok(Value::Null)
            }
            "camera_clear_bounds" => {
                a.arity(1, 1)?;
                w.clear_camera_bounds();
                Ok(Value::Null)
            }
            "camera_set_position" => {
                a.arity(3, 3)?;
                w.set_camera_position(a.vec2(1)?);
                Ok(Value::Null)
            }
            "camera_info" => {
                a.arity(1, 1)?;
                Ok(w.camera_info())
            }

            "maze_enable" => {
                a.arity(1, 2)?;
                w.maze_enable(a.opt_bool(1, true)?).map(null)
            }
            "maze_camera" => {
                a.arity(1, 1)?;
                w.maze_camera()
            }
            "maze_set_camera" => {
                a.arity(3, 5)?;
                w.maze_set_camera(a.f32(1)?, a.f32(2)?, a.opt_f32(3)?, a.opt_f32(4)?)
                    .map(null)
            }
            "maze_move" => {
                a.arity(4, 4)?;
                Ok(json!(w.maze_move(a.f32(1)?, a.f32(2)?, a.f32(3)?)?))
            }
            "maze_rotate" => {
                a.arity(3, 4)?;
                w.maze_rotate(a.f32(1)?, a.f32(2)?, a.opt_f32(3)?).map(null)
            }
            "maze_configure" => {
                a.arity(2, 2)?;
                w.maze_configure(&a.dict::<MazeConfig>(1)?).map(null)
            }
            "maze_info" => {
                a.arity(1, 1)?;
                w.maze_info()
            }
            "maze_place_at_object" => {
                a.arity(2, 2)?;
                w.maze_place_at_object(a.str(1)?).map(null)
            }
            "maze_rebuild" => {
                a.arity(1, 1)?;
                w.maze_rebuild().map(null)
            }
            "maze_cell" => {
                a.arity(3, 3)?;
                Ok(json!(w.maze_cell(a.i32(1)?, a.i32(2)?)?))
            }

            "maze_item_add" => {
                a.arity(4, 5)?;
                let cfg = a.opt_dict::<MazeItemConfig>(4)?.unwrap_or_default();
                Ok(json!(w.maze_item_add(a.str(1)?, a.f32(2)?, a.f32(3)?, &cfg)?))
            }
            "maze_item_show" => {
                a.arity(3, 3)?;
                w.maze_item_show(a.usize(1)?, a.bool(2)?).map(null)
            }
            "maze_item_remove" => {
                a.arity(2, 2)?;
                w.maze_item_remove(a.usize(1)?).map(null)
            }
            "maze_item_position" => {
                a.arity(4, 4)?;
                w.maze_item_position(a.usize(1)?, a.f32(2)?, a.f32(3)?).map(null)
            }
            "maze_item_configure" => {
                a.arity(3, 3)?;
                w.maze_item_configure(a.usize(1)?, &a.dict::<MazeItemConfig>(2)?)
                    .map(null)
            }
            // by animation name: (id, name, [loop]); by frames: (id, [frames], fps, [loop])
            "maze_item_animate" => {
                a.arity(3, 5)?;
                let item = a.usize(1)?;
                match a.get(2)? {
                    Value::String(name) => {
                        a.arity(3, 4)?;
                        w.maze_item_play_animation(item, name, a.opt_bool(3, true)?)
                    }
                    _ => {
                        a.arity(4, 5)?;
                        w.maze_item_set_animation(item, a.u32_list(2)?, a.f32(3)?, a.opt_bool(4, true)?)
                    }
                }
                .map(null)
            }
            "maze_item_callback" => {
                a.arity(1, 2)?;
                w.maze_item_callback(a.opt_name(1)?).map(null)
            }
            "maze_item_list" => {
                a.arity(1, 1)?;
                Ok(Value::Array(w.maze_item_list()?))
            }
            "maze_item_info" => {
                a.arity(2, 2)?;
                w.maze_item_info(a.usize(1)?)
            }

            _ => Err(WorldError::invalid(format!("unknown command `{cmd}`"))),
        }
    }
}
