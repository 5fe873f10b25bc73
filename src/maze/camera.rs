use super::MazeGrid;
use macroquad::prelude::*;

/// Pitch is clamped to about ±80°.
pub const PITCH_LIMIT: f32 = 1.4;

/// First-person camera in maze space: X right, Z towards the bottom row of
/// the map, Y up. Yaw 0 looks down −Z.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FpsCamera {
    /// Maze-space `(x, z)`.
    pub position: Vec2,
    pub yaw: f32,
    pub pitch: f32,
}

impl FpsCamera {
    /// Unit step on the floor plane, as `(x, z)`.
    pub fn forward(&self) -> Vec2 {
        vec2(self.yaw.sin(), -self.yaw.cos())
    }

    pub fn right(&self) -> Vec2 {
        vec2(self.yaw.cos(), self.yaw.sin())
    }

    pub fn rotate(&mut self, dyaw: f32, dpitch: f32) {
        self.yaw = (self.yaw + dyaw).rem_euclid(std::f32::consts::TAU);
        self.pitch = (self.pitch + dpitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn eye(&self, eye_height: f32) -> Vec3 {
        vec3(self.position.x, eye_height, self.position.y)
    }

    pub fn look_dir(&self) -> Vec3 {
        let (sp, cp) = self.pitch.sin_cos();
        vec3(self.yaw.sin() * cp, sp, -self.yaw.cos() * cp)
    }

    pub fn view(&self, eye_height: f32) -> Mat4 {
        let eye = self.eye(eye_height);
        Mat4::look_at_rh(eye, eye + self.look_dir(), Vec3::Y)
    }

    /// Moves by `delta` one axis at a time so walls slide the camera along
    /// them. Each axis advances in steps no longer than `radius` and stops at
    /// its first blocked step, so a long move cannot skip over a wall.
    /// Returns true if any axis was blocked.
    pub fn try_move(&mut self, grid: &MazeGrid, cell: Vec2, radius: f32, delta: Vec2) -> bool {
        let step = radius.max(1e-3);
        let mut hit = false;
        for axis in [Vec2::X, Vec2::Y] {
            let along = delta.dot(axis);
            if along == 0.0 {
                continue;
            }
            let start = self.position;
            let steps = (along.abs() / step).ceil().max(1.0) as u32;
            for i in 1..=steps {
                let next = if i == steps {
                    start + axis * along
                } else {
                    start + axis * (along * i as f32 / steps as f32)
                };
                if blocked(grid, cell, next, radius) {
                    hit = true;
                    break;
                }
                self.position = next;
            }
        }
        hit
    }
}

/// Grid cell holding maze point `p`.
pub fn cell_of(cell: Vec2, p: Vec2) -> (i32, i32) {
    ((p.x / cell.x).floor() as i32, (p.y / cell.y).floor() as i32)
}

/// True if the square around a circle of `radius` at `p` touches a wall.
pub fn blocked(grid: &MazeGrid, cell: Vec2, p: Vec2, radius: f32) -> bool {
    [vec2(-1.0, -1.0), vec2(1.0, -1.0), vec2(-1.0, 1.0), vec2(1.0, 1.0)]
        .into_iter()
        .any(|corner| {
            let (gx, gy) = cell_of(cell, p + corner * radius);
            grid.is_wall(gx, gy)
        })
}
