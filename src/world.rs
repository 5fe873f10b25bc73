//! The World: every table the subsystem owns, and the per-frame pipeline
//! that ties them together.

use crate::atlas::AtlasManager;
use crate::camera::{Followed, WorldCamera};
use crate::config::WorldConfig;
use crate::error::{Result, WorldError};
use crate::host::{GraphicsObject, Host};
use crate::loader::aseprite::sheet_from_aseprite_file;
use crate::loader::sheet_mapping::sheet_from_mapping;
use crate::map::{MapInfo, TileInstance, TmxObject};
use crate::maze::geometry::{build_billboards, Billboard};
use crate::maze::items::ItemId;
use crate::maze::{Maze, MAZE_CAMERA_NAME};
use crate::physics::{BodyHandle, BodyTag, ContactBegin, PhysicsWorld};
use crate::render::batch::{maze_overlay, sprite_batch, tile_batch, QuadBatch};
use crate::render::shaders::MazeUniforms;
use crate::render::WorldRenderer;
use crate::shape::CollisionShape;
use crate::sheet::{SheetId, SheetRegistry};
use crate::spatial::TileIndex;
use crate::sprite::{Sprite, SpriteId};
use macroquad::miniquad::RenderingBackend;
use macroquad::prelude::*;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Something the host hears about after a step.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// Two colliders started touching. Names are tile names, sprite names
    /// or `maze_camera`.
    Contact { a: String, b: String, sensor: bool },
    /// The maze camera walked into an item.
    Pickup { item: ItemId, name: String },
}

/// Names hit by a point or box query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryHits {
    /// Tiles of any layer, in placement order.
    pub tiles: Vec<String>,
    pub bodies: Vec<String>,
}

impl QueryHits {
    pub fn to_json(&self) -> Value {
        serde_json::json!({ "tiles": self.tiles, "bodies": self.bodies })
    }
}

pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) atlases: AtlasManager,
    pub(crate) sheets: SheetRegistry,
    pub(crate) tiles: Vec<TileInstance>,
    pub(crate) tile_index: TileIndex,
    /// Normalised shapes by clean GID.
    pub(crate) tile_shapes: HashMap<u32, Vec<CollisionShape>>,
    pub(crate) objects: Vec<TmxObject>,
    pub(crate) map: Option<MapInfo>,
    pub(crate) physics: PhysicsWorld,
    pub(crate) sprites: BTreeMap<SpriteId, Sprite>,
    pub(crate) next_sprite: SpriteId,
    pub(crate) camera: WorldCamera,
    pub(crate) maze: Option<Maze>,
    /// Draw-time translation of the 2D view.
    pub(crate) offset: Vec2,
    /// Seconds simulated so far.
    pub(crate) clock: f32,
    pub(crate) dispatching: bool,
    pub(crate) deferred_removals: Vec<SpriteId>,
    pub(crate) tiles_dirty: bool,
    renderer: Option<WorldRenderer>,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        let physics = PhysicsWorld::new(Vec2::from(config.gravity), config.substeps);
        World {
            config,
            atlases: AtlasManager::new(),
            sheets: SheetRegistry::new(),
            tiles: Vec::new(),
            tile_index: TileIndex::new(Vec2::ONE),
            tile_shapes: HashMap::new(),
            objects: Vec::new(),
            map: None,
            physics,
            sprites: BTreeMap::new(),
            next_sprite: 0,
            camera: WorldCamera::default(),
            maze: None,
            offset: Vec2::ZERO,
            clock: 0.0,
            dispatching: false,
            deferred_removals: Vec::new(),
            tiles_dirty: true,
            renderer: None,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn gravity(&self) -> Vec2 {
        self.physics.gravity()
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity.to_array();
        self.physics.set_gravity(gravity);
    }

    /// Applies to maps loaded afterwards.
    pub fn set_auto_center(&mut self, enabled: bool) {
        self.config.auto_center = enabled;
    }

    pub fn set_collision_callback(&mut self, callback: Option<String>) {
        self.config.collision_callback = callback.filter(|c| !c.is_empty());
    }

    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn atlases(&self) -> &AtlasManager {
        &self.atlases
    }

    pub fn sheets(&self) -> &SheetRegistry {
        &self.sheets
    }

    /// Registers a sheet described by a host mapping (see
    /// [`sheet_from_mapping`]); relative image paths resolve against `base_dir`.
    pub fn add_sprite_sheet(&mut self, name: &str, mapping: &Value, base_dir: Option<&Path>) -> Result<SheetId> {
        if self.sheets.find_by_name(name).is_some() {
            return Err(WorldError::invalid(format!("sprite sheet `{name}` already exists")));
        }
        let sheet = sheet_from_mapping(name, mapping, base_dir, &mut self.atlases)?;
        self.sheets.add(sheet)
    }

    /// Registers an Aseprite export: the JSON sidecar and its packed image.
    pub fn add_aseprite_sheet(&mut self, name: &str, json: &Path, image: &Path) -> Result<SheetId> {
        if self.sheets.find_by_name(name).is_some() {
            return Err(WorldError::invalid(format!("sprite sheet `{name}` already exists")));
        }
        let atlas = self.atlases.register_packed(image)?;
        let (w, h) = self
            .atlases
            .get(atlas)
            .map(|a| (a.width as f32, a.height as f32))
            .ok_or_else(|| WorldError::not_found("atlas", atlas.to_string()))?;
        let sheet = sheet_from_aseprite_file(json, name, 0, atlas, w, h)?;
        self.sheets.add(sheet)
    }

    pub fn sheet_list(&self) -> Vec<Value> {
        self.sheets.iter().map(|(_, s)| s.to_json()).collect()
    }

    pub fn sheet_animations(&self, name: &str) -> Result<Vec<Value>> {
        let id = self.sheets.require(name)?;
        Ok(self
            .sheets
            .get(id)
            .map(|s| s.animations.iter().map(|a| a.to_json()).collect())
            .unwrap_or_default())
    }

    fn body_names(&self, bodies: Vec<BodyHandle>) -> Vec<String> {
        bodies
            .into_iter()
            .filter_map(|b| self.body_name(b))
            .collect()
    }

    /// Tiles and bodies under world point `p`.
    pub fn query_point(&self, p: Vec2) -> QueryHits {
        QueryHits {
            tiles: self
                .tile_index
                .query_point(p)
                .into_iter()
                .filter_map(|i| self.tiles.get(i).map(|t| t.name.clone()))
                .collect(),
            bodies: self.body_names(self.physics.bodies_at_point(p)),
        }
    }

    pub fn query_aabb(&self, a: Vec2, b: Vec2) -> QueryHits {
        let (min, max) = (a.min(b), a.max(b));
        QueryHits {
            tiles: self
                .tile_index
                .query_rect(min, max)
                .into_iter()
                .filter_map(|i| self.tiles.get(i).map(|t| t.name.clone()))
                .collect(),
            bodies: self.body_names(self.physics.bodies_in_aabb(min, max)),
        }
    }

    fn tag_name(&self, tag: BodyTag) -> Option<String> {
        match tag {
            BodyTag::Tile(i) => self.tiles.get(i as usize).map(|t| t.name.clone()),
            BodyTag::Sprite(id) => self.sprites.get(&id).map(|s| s.name.clone()),
            BodyTag::MazeCamera => Some(MAZE_CAMERA_NAME.to_owned()),
        }
    }

    /// Sprites first, then the name table.
    fn body_name(&self, body: BodyHandle) -> Option<String> {
        if let Some(name) = self.physics.body_tag(body).and_then(|t| self.tag_name(t)) {
            return Some(name);
        }
        if let Some(s) = self.sprites.values().find(|s| s.body == Some(body)) {
            return Some(s.name.clone());
        }
        self.physics.name_of_body(body).map(str::to_owned)
    }

    fn contact_event(&self, c: ContactBegin) -> Option<WorldEvent> {
        let name = |h| {
            self.physics
                .collider_tag(h)
                .and_then(|t| self.tag_name(t))
                .or_else(|| self.physics.collider_body(h).and_then(|b| self.body_name(b)))
        };
        match (name(c.a), name(c.b)) {
            (Some(a), Some(b)) => Some(WorldEvent::Contact { a, b, sensor: c.sensor }),
            _ => {
                tracing::debug!(?c, "contact between unnamed colliders dropped");
                None
            }
        }
    }

    fn followed(&self) -> Option<Followed> {
        let sprite = self.sprites.get(&self.camera.mode.followed()?)?;
        let velocity = sprite
            .body
            .and_then(|b| self.physics.linvel(b))
            .unwrap_or(Vec2::ZERO);
        Some(Followed {
            position: sprite.position,
            velocity,
        })
    }

    /// One simulation frame: camera, physics, body sync, animations, maze
    /// items. Returns what happened, for [`World::dispatch`].
    pub fn step(&mut self, dt: f32) -> Result<Vec<WorldEvent>> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(WorldError::invalid(format!("bad frame time {dt}")));
        }
        self.clock += dt;

        if self.maze.as_ref().is_some_and(|m| m.active) {
            self.maze_project_camera();
        } else {
            let followed = self.followed();
            self.camera.update(dt, followed);
        }

        let contacts = self.physics.step(dt);
        self.maze_resnap_body();
        self.sync_sprites_from_bodies();
        self.advance_animations(dt);
        let picked = self.maze_advance_items(dt);

        let mut events: Vec<WorldEvent> = contacts
            .into_iter()
            .filter_map(|c| self.contact_event(c))
            .collect();
        events.extend(
            picked
                .into_iter()
                .map(|(item, name)| WorldEvent::Pickup { item, name }),
        );
        Ok(events)
    }

    /// Runs the host callbacks for `events`. Sprites removed by a callback
    /// stay in place until every event has been delivered.
    pub fn dispatch(&mut self, events: Vec<WorldEvent>, host: &mut dyn Host) {
        self.dispatching = true;
        for event in events {
            let (callback, args) = match event {
                WorldEvent::Contact { a, b, .. } => {
                    (self.config.collision_callback.clone(), vec![Value::from(a), Value::from(b)])
                }
                WorldEvent::Pickup { item, name } => (
                    self.maze.as_ref().and_then(|m| m.pickup_callback.clone()),
                    vec![Value::from(item), Value::from(name)],
                ),
            };
            let Some(callback) = callback else { continue };
            if let Err(e) = host.invoke(self, &callback, &args) {
                tracing::warn!(%callback, error = %e, "host callback failed");
            }
        }
        self.dispatching = false;
        self.sweep_removals();
    }

    fn render(&mut self, ctx: &mut dyn RenderingBackend, r: &mut WorldRenderer, host: &dyn Host) {
        r.sync_atlases(ctx, &self.atlases);

        if let Some(maze) = self.maze.as_mut().filter(|m| m.active) {
            if maze.dirty {
                r.set_maze_mesh(ctx, &maze.mesh());
                maze.dirty = false;
            }
            let view = maze.view();
            let proj = maze.projection(host.aspect());
            let right = vec3(view.x_axis.x, view.y_axis.x, view.z_axis.x);
            let up = vec3(view.x_axis.y, view.y_axis.y, view.z_axis.y);
            let t = self.clock;
            let items: Vec<Billboard> = maze
                .items
                .iter()
                .filter(|(_, i)| i.visible)
                .filter_map(|(_, item)| {
                    let sheet = self.sheets.get(item.sheet)?;
                    let frame = sheet.frame(item.frame)?;
                    Some(Billboard {
                        center: item.center(t),
                        size: item.size,
                        atlas: sheet.atlas,
                        uv: frame.uv,
                        spin: item.spin,
                    })
                })
                .collect();
            let billboards = build_billboards(&items, right, up);
            let p = &maze.params;
            let uniforms = MazeUniforms {
                mvp: (proj * view).to_cols_array(),
                view: view.to_cols_array(),
                fog_color: p.fog_color.extend(1.0).to_array(),
                fog: [p.fog_start, p.fog_end, p.ambient, 0.0],
                light_dir: p.light_dir.extend(0.0).to_array(),
            };
            let surfaces = maze.surfaces.map(|s| s.map(|(atlas, _)| atlas));
            r.draw_maze(ctx, &uniforms, surfaces, &billboards);
            return;
        }

        if self.tiles_dirty {
            r.set_tiles(ctx, &tile_batch(&self.tiles));
            self.tiles_dirty = false;
        }
        let mut dynamic = QuadBatch::default();
        sprite_batch(&mut dynamic, self.sprites.values());
        if let Some(maze) = &self.maze {
            maze_overlay(&mut dynamic, maze, &self.sheets);
        }
        let shift = self.offset - self.camera.position;
        let model = Mat4::from_translation(shift.extend(0.0));
        let mvp = host.projection() * host.model_view() * model;
        r.draw_2d(ctx, mvp.to_cols_array(), &dynamic);
    }

    /// Draws the 2D view, or the first-person view while it is enabled.
    /// GPU resources are created on the first call.
    pub fn draw(&mut self, host: &dyn Host) -> Result<()> {
        with_quad_context(|ctx| -> Result<()> {
            let mut renderer = match self.renderer.take() {
                Some(r) => r,
                None => WorldRenderer::new(ctx)?,
            };
            self.render(ctx, &mut renderer, host);
            self.renderer = Some(renderer);
            Ok(())
        })
    }

    /// Rewinds animations, re-shows maze items and snaps the camera.
    pub fn reset(&mut self) {
        let firsts: Vec<(SpriteId, u32)> = self
            .sprites
            .iter_mut()
            .filter_map(|(id, s)| {
                s.anim.rewind();
                if !s.anim.frames.is_empty() {
                    s.anim.playing = true;
                }
                s.anim.frame().map(|f| (*id, f))
            })
            .collect();
        for (id, frame) in firsts {
            self.apply_sprite_frame(id, frame);
        }
        if let Some(maze) = self.maze.as_mut() {
            maze.items.reset();
        }
        let target = self.camera.target;
        self.camera.set_position(target);
        tracing::debug!("world reset");
    }
}

impl GraphicsObject for World {
    fn update(&mut self, host: &mut dyn Host) -> Result<()> {
        let dt = host.frame_duration_ms() / 1000.0;
        let events = self.step(dt)?;
        self.dispatch(events, host);
        Ok(())
    }

    fn draw(&mut self, host: &dyn Host) -> Result<()> {
        World::draw(self, host)
    }

    fn reset(&mut self) {
        World::reset(self)
    }
}

impl Drop for World {
    fn drop(&mut self) {
        // no renderer means no GL work was ever done
        if let Some(renderer) = self.renderer.take() {
            with_quad_context(|ctx| renderer.release(ctx));
        }
    }
}

/// Runs `f` on macroquad's miniquad context after flushing its queued draws.
fn with_quad_context<R>(f: impl FnOnce(&mut dyn RenderingBackend) -> R) -> R {
    // SAFETY: draw and drop run on the macroquad main thread, and no other
    // InternalGlContext is alive while `f` runs.
    let mut gl = unsafe { get_internal_gl() };
    gl.flush();
    f(gl.quad_context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessHost;

    #[test]
    fn negative_or_nan_dt_is_rejected() {
        let mut world = World::new(WorldConfig::default());
        assert!(world.step(-0.1).is_err());
        assert!(world.step(f32::NAN).is_err());
        assert!(world.step(0.0).expect("zero dt").is_empty());
    }

    #[test]
    fn update_advances_the_clock_by_the_host_frame() {
        let mut world = World::new(WorldConfig::default());
        let mut host = HeadlessHost::new(20.0);
        GraphicsObject::update(&mut world, &mut host).expect("update");
        GraphicsObject::update(&mut world, &mut host).expect("update");
        assert!((world.clock() - 0.04).abs() < 1e-6);
        assert!(host.calls.is_empty());
    }

    #[test]
    fn callbacks_can_be_cleared_with_an_empty_name() {
        let mut world = World::new(WorldConfig::default());
        world.set_collision_callback(Some("on_hit".into()));
        assert_eq!(world.config().collision_callback.as_deref(), Some("on_hit"));
        world.set_collision_callback(Some(String::new()));
        assert!(world.config().collision_callback.is_none());
    }
}
