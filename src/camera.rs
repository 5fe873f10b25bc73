//! The 2D camera. Modes only decide the target; every mode then shares the
//! bounds clamp and the exponential blend towards the target.

use crate::error::{Result, WorldError};
use crate::sprite::SpriteId;
use crate::World;
use macroquad::prelude::*;
use serde::Deserialize;

/// Velocities inside this band count as standing still for lookahead.
pub const LOOKAHEAD_DEADBAND: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CameraMode {
    Locked,
    #[serde(alias = "fixed")]
    FixedScroll {
        #[serde(default)]
        vx: f32,
        #[serde(default)]
        vy: f32,
    },
    Follow {
        sprite: SpriteId,
    },
    #[serde(alias = "follow_deadzone")]
    Deadzone {
        sprite: SpriteId,
        #[serde(default)]
        deadzone_w: f32,
        #[serde(default)]
        deadzone_h: f32,
    },
    #[serde(alias = "follow_lookahead")]
    Lookahead {
        sprite: SpriteId,
        #[serde(default)]
        lookahead_x: f32,
        #[serde(default)]
        lookahead_y: f32,
    },
}

impl CameraMode {
    pub fn name(&self) -> &'static str {
        match self {
            CameraMode::Locked => "locked",
            CameraMode::FixedScroll { .. } => "fixed_scroll",
            CameraMode::Follow { .. } => "follow",
            CameraMode::Deadzone { .. } => "deadzone",
            CameraMode::Lookahead { .. } => "lookahead",
        }
    }

    pub fn followed(&self) -> Option<SpriteId> {
        match *self {
            CameraMode::Follow { sprite }
            | CameraMode::Deadzone { sprite, .. }
            | CameraMode::Lookahead { sprite, .. } => Some(sprite),
            _ => None,
        }
    }
}

/// Position and velocity of the followed sprite this frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Followed {
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug, Clone)]
pub struct WorldCamera {
    pub position: Vec2,
    pub target: Vec2,
    /// Blend rate per second; `<= 0` snaps.
    pub smooth_speed: f32,
    pub mode: CameraMode,
    pub bounds: Option<(Vec2, Vec2)>,
}

impl Default for WorldCamera {
    fn default() -> Self {
        WorldCamera {
            position: Vec2::ZERO,
            target: Vec2::ZERO,
            smooth_speed: 0.0,
            mode: CameraMode::Locked,
            bounds: None,
        }
    }
}

/// Slides `target` along one axis until `pos` is back inside.
fn deadzone_axis(target: f32, pos: f32, size: f32) -> f32 {
    let d = pos - target;
    if d.abs() <= size {
        return target;
    }
    // crossing the edge recentres halfway in one frame, so the target jumps
    // by up to size/2; the sprite ends up size/2 from the new target
    pos - d.signum() * size * 0.5
}

fn lookahead_axis(vel: f32, dist: f32) -> f32 {
    if vel > LOOKAHEAD_DEADBAND {
        dist
    } else if vel < -LOOKAHEAD_DEADBAND {
        -dist
    } else {
        0.0
    }
}

impl WorldCamera {
    /// Sets both position and target, so the next update does not blend.
    pub fn set_position(&mut self, p: Vec2) {
        self.position = p;
        self.target = p;
    }

    pub fn set_bounds(&mut self, a: Vec2, b: Vec2) {
        self.bounds = Some((a.min(b), a.max(b)));
    }

    pub fn clear_bounds(&mut self) {
        self.bounds = None;
    }

    pub fn update(&mut self, dt: f32, followed: Option<Followed>) {
        match (self.mode, followed) {
            (CameraMode::Locked, _) => {}
            (CameraMode::FixedScroll { vx, vy }, _) => self.target += vec2(vx, vy) * dt,
            (CameraMode::Follow { .. }, Some(f)) => self.target = f.position,
            (CameraMode::Deadzone { deadzone_w, deadzone_h, .. }, Some(f)) => {
                self.target = vec2(
                    deadzone_axis(self.target.x, f.position.x, deadzone_w.max(0.0)),
                    deadzone_axis(self.target.y, f.position.y, deadzone_h.max(0.0)),
                );
            }
            (CameraMode::Lookahead { lookahead_x, lookahead_y, .. }, Some(f)) => {
                self.target = f.position
                    + vec2(
                        lookahead_axis(f.velocity.x, lookahead_x),
                        lookahead_axis(f.velocity.y, lookahead_y),
                    );
            }
            // followed sprite is gone: hold the last target
            (_, None) => {}
        }

        if let Some((min, max)) = self.bounds {
            self.target = self.target.clamp(min, max);
        }

        if self.smooth_speed <= 0.0 {
            self.position = self.target;
        } else {
            let k = 1.0 - (-self.smooth_speed * dt).exp();
            self.position += (self.target - self.position) * k;
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut info = serde_json::json!({
            "x": self.position.x,
            "y": self.position.y,
            "target_x": self.target.x,
            "target_y": self.target.y,
            "smooth_speed": self.smooth_speed,
            "mode": self.mode.name(),
            "sprite": self.mode.followed(),
            "bounds": self.bounds.map(|(a, b)| [a.x, a.y, b.x, b.y]),
        });
        match self.mode {
            CameraMode::FixedScroll { vx, vy } => {
                info["vx"] = vx.into();
                info["vy"] = vy.into();
            }
            CameraMode::Deadzone { deadzone_w, deadzone_h, .. } => {
                info["deadzone_w"] = deadzone_w.into();
                info["deadzone_h"] = deadzone_h.into();
            }
            CameraMode::Lookahead { lookahead_x, lookahead_y, .. } => {
                info["lookahead_x"] = lookahead_x.into();
                info["lookahead_y"] = lookahead_y.into();
            }
            _ => {}
        }
        info
    }
}

impl World {
    pub fn camera(&self) -> &WorldCamera {
        &self.camera
    }

    /// Follow modes need a live sprite.
    pub fn set_camera_mode(&mut self, mode: CameraMode) -> Result<()> {
        if let Some(id) = mode.followed() {
            self.sprite_ref(id)?;
        }
        if let CameraMode::Deadzone { deadzone_w, deadzone_h, .. } = mode {
            if deadzone_w < 0.0 || deadzone_h < 0.0 {
                return Err(WorldError::invalid("deadzone size must not be negative"));
            }
        }
        tracing::debug!(mode = mode.name(), "camera mode");
        self.camera.mode = mode;
        Ok(())
    }

    pub fn set_camera_smoothing(&mut self, speed: f32) -> Result<()> {
        if !speed.is_finite() {
            return Err(WorldError::invalid("smooth speed must be finite"));
        }
        self.camera.smooth_speed = speed;
        Ok(())
    }

    pub fn set_camera_bounds(&mut self, a: Vec2, b: Vec2) {
        self.camera.set_bounds(a, b);
    }

    pub fn clear_camera_bounds(&mut self) {
        self.camera.clear_bounds();
    }

    pub fn set_camera_position(&mut self, p: Vec2) {
        self.camera.set_position(p);
    }

    pub fn camera_info(&self) -> serde_json::Value {
        self.camera.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32, y: f32) -> Option<Followed> {
        Some(Followed {
            position: vec2(x, y),
            velocity: Vec2::ZERO,
        })
    }

    #[test]
    fn locked_camera_lands_exactly_on_set_position() {
        let mut cam = WorldCamera {
            smooth_speed: 5.0,
            ..Default::default()
        };
        cam.set_position(vec2(3.0, -2.0));
        cam.update(1.0 / 60.0, None);
        assert_eq!(cam.position, vec2(3.0, -2.0));
    }

    #[test]
    fn deadzone_holds_then_slides() {
        let mut cam = WorldCamera {
            mode: CameraMode::Deadzone { sprite: 0, deadzone_w: 4.0, deadzone_h: 2.0 },
            ..Default::default()
        };
        cam.update(0.016, at(0.0, 0.0));
        assert_eq!(cam.target, vec2(0.0, 0.0));
        cam.update(0.016, at(3.0, 0.0));
        assert_eq!(cam.target, vec2(0.0, 0.0));
        cam.update(0.016, at(5.0, 0.0));
        assert_eq!(cam.target, vec2(3.0, 0.0));
    }

    #[test]
    fn deadzone_edge_is_inclusive_then_jumps() {
        let mut cam = WorldCamera {
            mode: CameraMode::Deadzone { sprite: 0, deadzone_w: 4.0, deadzone_h: 2.0 },
            ..Default::default()
        };
        cam.update(0.016, at(4.0, 0.0));
        assert_eq!(cam.target.x, 0.0);
        // one frame past the edge: recentred to half the width behind
        cam.update(0.016, at(4.5, 0.0));
        assert_eq!(cam.target.x, 2.5);
    }

    #[test]
    fn zero_width_deadzone_snaps() {
        let mut cam = WorldCamera {
            mode: CameraMode::Deadzone { sprite: 0, deadzone_w: 0.0, deadzone_h: 0.0 },
            ..Default::default()
        };
        cam.update(0.016, at(0.25, 0.0));
        assert_eq!(cam.target.x, 0.25);
        cam.update(0.016, at(-1.5, 0.0));
        assert_eq!(cam.target.x, -1.5);
    }

    #[test]
    fn smoothing_is_framerate_independent() {
        let mk = || WorldCamera {
            smooth_speed: 3.0,
            mode: CameraMode::FixedScroll { vx: 0.0, vy: 0.0 },
            target: vec2(10.0, 4.0),
            ..Default::default()
        };
        let mut one = mk();
        one.update(0.2, None);
        let mut two = mk();
        two.update(0.1, None);
        two.update(0.1, None);
        assert!((one.position - two.position).length() < 1e-4);
        assert!(one.position.x > 0.0 && one.position.x < 10.0);
    }

    #[test]
    fn lookahead_uses_velocity_sign_with_deadband() {
        let mut cam = WorldCamera {
            mode: CameraMode::Lookahead { sprite: 0, lookahead_x: 2.0, lookahead_y: 1.0 },
            ..Default::default()
        };
        cam.update(0.016, Some(Followed { position: vec2(1.0, 1.0), velocity: vec2(3.0, 0.4) }));
        assert_eq!(cam.target, vec2(3.0, 1.0));
        cam.update(0.016, Some(Followed { position: vec2(1.0, 1.0), velocity: vec2(-0.6, -9.0) }));
        assert_eq!(cam.target, vec2(-1.0, 0.0));
    }

    #[test]
    fn bounds_clamp_the_target() {
        let mut cam = WorldCamera {
            mode: CameraMode::Follow { sprite: 0 },
            ..Default::default()
        };
        cam.set_bounds(vec2(5.0, 5.0), vec2(-5.0, -5.0));
        cam.update(0.016, at(20.0, -7.0));
        assert_eq!(cam.position, vec2(5.0, -5.0));
    }

    #[test]
    fn modes_deserialize_from_tagged_dicts() {
        let mode: CameraMode = serde_json::from_value(serde_json::json!({
            "mode": "deadzone", "sprite": 2, "deadzone_w": 4.0
        }))
        .unwrap();
        assert_eq!(mode, CameraMode::Deadzone { sprite: 2, deadzone_w: 4.0, deadzone_h: 0.0 });
        let fixed: CameraMode =
            serde_json::from_value(serde_json::json!({"mode": "fixed", "vx": 1.0})).unwrap();
        assert_eq!(fixed.name(), "fixed_scroll");
    }
}
