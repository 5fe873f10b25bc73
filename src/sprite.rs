//! Sprites: positioned quads backed by a tile GID or a sprite-sheet frame,
//! optionally driven by a physics body.

use crate::atlas::{AtlasId, UvRect};
use crate::camera::CameraMode;
use crate::config::BodyOptions;
use crate::error::{Result, WorldError};
use crate::physics::{BodyHandle, BodyTag};
use crate::sheet::{Hitbox, SheetId};
use crate::shape::LocalShape;
use crate::World;
use macroquad::prelude::*;

pub const MAX_SPRITES: usize = 1024;

pub type SpriteId = u32;

/// Frame-list animation. Values are GIDs for tile sprites and frame
/// indices for sheet sprites; playback direction is already baked into the list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationState {
    pub frames: Vec<u32>,
    pub current: usize,
    pub fps: f32,
    /// Time spent in the current frame, always in `[0, 1/fps)`.
    pub elapsed: f32,
    pub looping: bool,
    pub playing: bool,
}

impl AnimationState {
    pub fn new(frames: Vec<u32>, fps: f32, looping: bool) -> Self {
        AnimationState {
            frames,
            current: 0,
            fps,
            elapsed: 0.0,
            looping,
            playing: true,
        }
    }

    pub fn frame(&self) -> Option<u32> {
        self.frames.get(self.current).copied()
    }

    /// Returns the new frame value if the frame changed.
    pub fn advance(&mut self, dt: f32) -> Option<u32> {
        if !self.playing || self.frames.is_empty() || self.fps <= 0.0 {
            return None;
        }
        let period = 1.0 / self.fps;
        self.elapsed += dt;
        let mut changed = false;
        while self.elapsed >= period {
            self.elapsed -= period;
            if self.current + 1 < self.frames.len() {
                self.current += 1;
                changed = true;
            } else if self.looping {
                self.current = 0;
                changed = true;
            } else {
                self.playing = false;
                self.elapsed = 0.0;
                break;
            }
        }
        if changed { self.frame() } else { None }
    }

    pub fn rewind(&mut self) {
        self.current = 0;
        self.elapsed = 0.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpriteSource {
    Tile { gid: u32 },
    Sheet { sheet: SheetId, frame: usize },
}

#[derive(Debug, Clone)]
pub struct Sprite {
    pub name: String,
    pub position: Vec2,
    pub angle: f32,
    pub size: Vec2,
    pub source: SpriteSource,
    pub atlas: Option<AtlasId>,
    pub uv: UvRect,
    pub visible: bool,
    pub body: Option<BodyHandle>,
    /// Body centre minus sprite centre.
    pub body_offset: Vec2,
    pub hitbox: Option<Hitbox>,
    pub anim: AnimationState,
}

/// Sprite size and body offset for a sheet sprite whose hitbox should
/// cover `requested`. Hitbox offsets are in canvas units, Y down.
pub fn hitbox_fit(requested: Vec2, hitbox: Option<&Hitbox>) -> (Vec2, Vec2) {
    match hitbox {
        Some(hb) if hb.ratio.x > 0.0 && hb.ratio.y > 0.0 => (
            requested / hb.ratio,
            vec2(hb.offset.x * requested.x, -hb.offset.y * requested.y),
        ),
        _ => (requested, Vec2::ZERO),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteInfo {
    pub id: SpriteId,
    pub name: String,
    pub position: Vec2,
    pub size: Vec2,
    pub angle: f32,
    pub visible: bool,
    pub has_body: bool,
    pub velocity: Vec2,
    pub tile: Option<u32>,
    pub frame: Option<usize>,
    pub playing: bool,
}

impl SpriteInfo {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "x": self.position.x,
            "y": self.position.y,
            "w": self.size.x,
            "h": self.size.y,
            "angle": self.angle,
            "visible": self.visible,
            "has_body": self.has_body,
            "vx": self.velocity.x,
            "vy": self.velocity.y,
            "tile": self.tile,
            "frame": self.frame,
            "playing": self.playing,
        })
    }
}

impl World {
    fn insert_sprite(&mut self, sprite: Sprite) -> Result<SpriteId> {
        if self.sprites.len() >= MAX_SPRITES {
            return Err(WorldError::Capacity {
                what: "sprites",
                max: MAX_SPRITES,
            });
        }
        let id = self.next_sprite;
        self.next_sprite += 1;
        tracing::debug!(id, name = %sprite.name, "sprite created");
        self.sprites.insert(id, sprite);
        Ok(id)
    }

    pub(crate) fn sprite_ref(&self, id: SpriteId) -> Result<&Sprite> {
        self.sprites
            .get(&id)
            .ok_or_else(|| WorldError::not_found("sprite", id.to_string()))
    }

    pub(crate) fn sprite_mut(&mut self, id: SpriteId) -> Result<&mut Sprite> {
        self.sprites
            .get_mut(&id)
            .ok_or_else(|| WorldError::not_found("sprite", id.to_string()))
    }

    /// A sprite drawing tile `gid` from its tileset atlas.
    pub fn create_sprite(
        &mut self,
        name: &str,
        gid: u32,
        position: Vec2,
        size: Vec2,
        body: Option<&BodyOptions>,
    ) -> Result<SpriteId> {
        let (atlas, uv) = match self.atlases.uv_for_gid(gid) {
            Some((a, uv)) => (a, uv),
            None => return Err(WorldError::not_found("tile GID", gid.to_string())),
        };
        let id = self.insert_sprite(Sprite {
            name: name.to_owned(),
            position,
            angle: 0.0,
            size,
            source: SpriteSource::Tile { gid },
            atlas: Some(atlas),
            uv,
            visible: true,
            body: None,
            body_offset: Vec2::ZERO,
            hitbox: None,
            anim: AnimationState::default(),
        })?;
        if let Some(opts) = body {
            self.add_sprite_body(id, opts)?;
        }
        Ok(id)
    }

    /// A sprite showing frame 0 of `sheet`. With a hitbox slice, `size` is the
    /// size of the hitbox and the artwork is scaled around it.
    pub fn create_sprite_from_sheet(
        &mut self,
        name: &str,
        sheet: &str,
        position: Vec2,
        size: Vec2,
        body: Option<&BodyOptions>,
    ) -> Result<SpriteId> {
        let sheet_id = self.sheets.require(sheet)?;
        let (atlas, uv, hitbox) = match self.sheets.get(sheet_id) {
            Some(s) => (
                s.atlas,
                s.frames.first().map(|f| f.uv).unwrap_or_default(),
                s.hitbox,
            ),
            None => return Err(WorldError::not_found("sprite sheet", sheet)),
        };
        let (sprite_size, body_offset) = hitbox_fit(size, hitbox.as_ref());
        let id = self.insert_sprite(Sprite {
            name: name.to_owned(),
            position,
            angle: 0.0,
            size: sprite_size,
            source: SpriteSource::Sheet {
                sheet: sheet_id,
                frame: 0,
            },
            atlas: Some(atlas),
            uv,
            visible: true,
            body: None,
            body_offset,
            hitbox,
            anim: AnimationState::default(),
        })?;
        if let Some(opts) = body {
            self.add_sprite_body(id, opts)?;
        }
        Ok(id)
    }

    /// Attaches a body, replacing any existing one. Custom shapes of the
    /// current tile/frame win over the default box.
    pub fn add_sprite_body(&mut self, id: SpriteId, opts: &BodyOptions) -> Result<()> {
        let sprite = self.sprite_ref(id)?;
        let custom = match sprite.source {
            SpriteSource::Tile { gid } => self.tile_shapes.get(&gid).cloned().unwrap_or_default(),
            SpriteSource::Sheet { sheet, frame } => self
                .sheets
                .get(sheet)
                .and_then(|s| s.frame(frame))
                .map(|f| f.shapes.clone())
                .unwrap_or_default(),
        };
        let shapes: Vec<LocalShape> = if custom.is_empty() {
            let body_size = match &sprite.hitbox {
                Some(hb) => sprite.size * hb.ratio,
                None => sprite.size,
            };
            vec![LocalShape::Cuboid {
                center: Vec2::ZERO,
                half: body_size * 0.5,
            }]
        } else {
            custom
                .iter()
                .map(|s| s.materialize(sprite.size, sprite.body_offset))
                .collect()
        };
        let center = sprite.position + sprite.body_offset;
        let (angle, name, old) = (sprite.angle, sprite.name.clone(), sprite.body);

        if let Some(old) = old {
            self.physics.remove_body(old);
        }
        let handle = self
            .physics
            .add_body(center, angle, &shapes, opts, BodyTag::Sprite(id));
        self.physics.bind_name(&name, handle);
        self.sprite_mut(id)?.body = Some(handle);
        Ok(())
    }

    /// Removes a sprite and its body. Inside a callback the removal waits
    /// until every event of the frame has been dispatched.
    pub fn remove_sprite(&mut self, id: SpriteId) -> Result<()> {
        self.sprite_ref(id)?;
        if self.dispatching {
            if !self.deferred_removals.contains(&id) {
                self.deferred_removals.push(id);
            }
            return Ok(());
        }
        if let Some(sprite) = self.sprites.remove(&id) {
            if let Some(body) = sprite.body {
                self.physics.remove_body(body);
            }
            if self.camera.mode.followed() == Some(id) {
                self.camera.mode = CameraMode::Locked;
            }
            tracing::debug!(id, name = %sprite.name, "sprite removed");
        }
        Ok(())
    }

    pub(crate) fn sweep_removals(&mut self) {
        for id in std::mem::take(&mut self.deferred_removals) {
            if let Err(e) = self.remove_sprite(id) {
                tracing::warn!(id, error = %e, "deferred removal");
            }
        }
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    pub fn sprite_by_name(&self, name: &str) -> Option<SpriteId> {
        self.sprites
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| *id)
    }

    pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(&id)
    }

    pub fn sprites(&self) -> impl Iterator<Item = (SpriteId, &Sprite)> {
        self.sprites.iter().map(|(id, s)| (*id, s))
    }

    pub fn sprite_info(&self, id: SpriteId) -> Result<SpriteInfo> {
        let s = self.sprite_ref(id)?;
        let velocity = s
            .body
            .and_then(|b| self.physics.linvel(b))
            .unwrap_or(Vec2::ZERO);
        let (tile, frame) = match s.source {
            SpriteSource::Tile { gid } => (Some(gid), None),
            SpriteSource::Sheet { frame, .. } => (None, Some(frame)),
        };
        Ok(SpriteInfo {
            id,
            name: s.name.clone(),
            position: s.position,
            size: s.size,
            angle: s.angle,
            visible: s.visible,
            has_body: s.body.is_some_and(|b| self.physics.contains(b)),
            velocity,
            tile,
            frame,
            playing: s.anim.playing,
        })
    }

    pub fn set_sprite_position(&mut self, id: SpriteId, position: Vec2) -> Result<()> {
        let sprite = self.sprite_mut(id)?;
        sprite.position = position;
        let (body, offset) = (sprite.body, sprite.body_offset);
        if let Some(b) = body {
            self.physics.set_translation(b, position + offset);
        }
        Ok(())
    }

    pub fn set_sprite_rotation(&mut self, id: SpriteId, angle: f32) -> Result<()> {
        let sprite = self.sprite_mut(id)?;
        sprite.angle = angle;
        if let Some(b) = sprite.body {
            self.physics.set_rotation(b, angle);
        }
        Ok(())
    }

    pub fn set_sprite_visible(&mut self, id: SpriteId, visible: bool) -> Result<()> {
        self.sprite_mut(id)?.visible = visible;
        Ok(())
    }

    /// Switches a tile sprite to another GID.
    pub fn set_sprite_tile(&mut self, id: SpriteId, gid: u32) -> Result<()> {
        let (atlas, uv) = self
            .atlases
            .uv_for_gid(gid)
            .ok_or_else(|| WorldError::not_found("tile GID", gid.to_string()))?;
        let sprite = self.sprite_mut(id)?;
        match sprite.source {
            SpriteSource::Tile { .. } => {
                sprite.source = SpriteSource::Tile { gid };
                sprite.atlas = Some(atlas);
                sprite.uv = uv;
                Ok(())
            }
            SpriteSource::Sheet { .. } => Err(WorldError::invalid(format!(
                "sprite {id} is sheet-backed; set its frame instead"
            ))),
        }
    }

    /// Switches a sheet sprite to frame `index`.
    pub fn set_sprite_frame(&mut self, id: SpriteId, index: usize) -> Result<()> {
        let sheet_id = match self.sprite_ref(id)?.source {
            SpriteSource::Sheet { sheet, .. } => sheet,
            SpriteSource::Tile { .. } => {
                return Err(WorldError::invalid(format!("sprite {id} is not sheet-backed")))
            }
        };
        let uv = self
            .sheets
            .get(sheet_id)
            .and_then(|s| s.frame(index))
            .map(|f| f.uv)
            .ok_or_else(|| WorldError::invalid(format!("frame index {index} out of range")))?;
        let sprite = self.sprite_mut(id)?;
        sprite.source = SpriteSource::Sheet {
            sheet: sheet_id,
            frame: index,
        };
        sprite.uv = uv;
        Ok(())
    }

    pub fn set_sprite_frame_by_name(&mut self, id: SpriteId, frame: &str) -> Result<()> {
        let sheet_id = match self.sprite_ref(id)?.source {
            SpriteSource::Sheet { sheet, .. } => sheet,
            SpriteSource::Tile { .. } => {
                return Err(WorldError::invalid(format!("sprite {id} is not sheet-backed")))
            }
        };
        let index = self
            .sheets
            .get(sheet_id)
            .and_then(|s| s.frame_by_name(frame))
            .ok_or_else(|| WorldError::not_found("frame", frame))?;
        self.set_sprite_frame(id, index)
    }

    fn sprite_body(&self, id: SpriteId) -> Result<Option<BodyHandle>> {
        Ok(self.sprite_ref(id)?.body)
    }

    pub fn apply_sprite_impulse(&mut self, id: SpriteId, impulse: Vec2) -> Result<()> {
        if let Some(b) = self.sprite_body(id)? {
            self.physics.apply_impulse(b, impulse);
        }
        Ok(())
    }

    pub fn set_sprite_velocity(&mut self, id: SpriteId, velocity: Vec2) -> Result<()> {
        if let Some(b) = self.sprite_body(id)? {
            self.physics.set_linvel(b, velocity);
        }
        Ok(())
    }

    pub fn apply_sprite_force(&mut self, id: SpriteId, force: Vec2) -> Result<()> {
        if let Some(b) = self.sprite_body(id)? {
            self.physics.add_force(b, force);
        }
        Ok(())
    }

    /// Replaces the frame list and starts playing it from the first frame.
    pub fn set_sprite_animation(&mut self, id: SpriteId, frames: Vec<u32>, fps: f32, looping: bool) -> Result<()> {
        if frames.is_empty() {
            return Err(WorldError::invalid("animation needs at least one frame"));
        }
        if fps <= 0.0 {
            return Err(WorldError::invalid("fps must be positive"));
        }
        let first = frames[0];
        self.sprite_mut(id)?.anim = AnimationState::new(frames, fps, looping);
        self.apply_sprite_frame(id, first);
        Ok(())
    }

    /// Plays a named animation of the sprite's sheet.
    pub fn play_sprite_animation(&mut self, id: SpriteId, name: &str, looping: bool) -> Result<()> {
        let sheet_id = match self.sprite_ref(id)?.source {
            SpriteSource::Sheet { sheet, .. } => sheet,
            SpriteSource::Tile { .. } => {
                return Err(WorldError::invalid(format!("sprite {id} is not sheet-backed")))
            }
        };
        let (frames, fps) = self
            .sheets
            .get(sheet_id)
            .and_then(|s| s.animation(name))
            .map(|a| (a.frames.clone(), a.fps))
            .ok_or_else(|| WorldError::not_found("animation", name))?;
        self.set_sprite_animation(id, frames, fps, looping)
    }

    pub fn set_sprite_playing(&mut self, id: SpriteId, playing: bool) -> Result<()> {
        self.sprite_mut(id)?.anim.playing = playing;
        Ok(())
    }

    /// Shows animation value `value` (a GID or a frame index).
    pub(crate) fn apply_sprite_frame(&mut self, id: SpriteId, value: u32) {
        let Some(sprite) = self.sprites.get_mut(&id) else { return };
        match sprite.source {
            SpriteSource::Tile { .. } => {
                if let Some((atlas, uv)) = self.atlases.uv_for_gid(value) {
                    sprite.source = SpriteSource::Tile { gid: value };
                    sprite.atlas = Some(atlas);
                    sprite.uv = uv;
                }
            }
            SpriteSource::Sheet { sheet, .. } => {
                if let Some(f) = self.sheets.get(sheet).and_then(|s| s.frame(value as usize)) {
                    sprite.source = SpriteSource::Sheet {
                        sheet,
                        frame: value as usize,
                    };
                    sprite.uv = f.uv;
                }
            }
        }
    }

    /// Copies body poses back onto their sprites.
    pub(crate) fn sync_sprites_from_bodies(&mut self) {
        for sprite in self.sprites.values_mut() {
            let Some(body) = sprite.body else { continue };
            match (self.physics.position(body), self.physics.angle(body)) {
                (Some(p), Some(a)) => {
                    sprite.position = p - sprite.body_offset;
                    sprite.angle = a;
                }
                _ => {
                    tracing::warn!(name = %sprite.name, "sprite body vanished, detaching");
                    sprite.body = None;
                }
            }
        }
    }

    pub(crate) fn advance_animations(&mut self, dt: f32) {
        let changed: Vec<(SpriteId, u32)> = self
            .sprites
            .iter_mut()
            .filter_map(|(id, s)| s.anim.advance(dt).map(|v| (*id, v)))
            .collect();
        for (id, value) in changed {
            self.apply_sprite_frame(id, value);
        }
    }
}
