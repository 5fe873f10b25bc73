//! Option sets accepted from the host, all deserialisable from the host's
//! dictionary values with per-field defaults.

use serde::Deserialize;

fn default_true() -> bool {
    true
}
fn one() -> f32 {
    1.0
}
fn default_gravity() -> [f32; 2] {
    [0.0, -9.8]
}
fn default_substeps() -> u32 {
    4
}
fn default_ppm() -> f32 {
    32.0
}
fn default_collision_layer() -> String {
    "Collision".to_owned()
}

/// World-level settings fixed at creation (gravity and callback may change later).
#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    #[serde(default = "default_gravity")]
    pub gravity: [f32; 2],
    #[serde(default = "default_substeps")]
    pub substeps: u32,
    #[serde(default = "default_true")]
    pub auto_center: bool,
    #[serde(default)]
    pub collision_callback: Option<String>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            substeps: default_substeps(),
            auto_center: true,
            collision_callback: None,
        }
    }
}

/// Options for a single TMX load.
#[derive(Debug, Clone, Deserialize)]
pub struct TmxLoadOptions {
    #[serde(default = "default_ppm")]
    pub pixels_per_meter: f32,
    #[serde(default = "default_collision_layer")]
    pub collision_layer: String,
    /// Center the map on the origin and scale it so its width equals `scale`.
    #[serde(default)]
    pub normalize: bool,
    #[serde(default = "one")]
    pub scale: f32,
}

impl Default for TmxLoadOptions {
    fn default() -> Self {
        Self {
            pixels_per_meter: default_ppm(),
            collision_layer: default_collision_layer(),
            normalize: false,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Static,
    #[default]
    Dynamic,
    Kinematic,
}

/// Physics options for a sprite body.
#[derive(Debug, Clone, Deserialize)]
pub struct BodyOptions {
    #[serde(default, rename = "type")]
    pub kind: BodyKind,
    #[serde(default = "one")]
    pub density: f32,
    #[serde(default = "default_friction")]
    pub friction: f32,
    #[serde(default)]
    pub restitution: f32,
    #[serde(default, alias = "fixedRotation")]
    pub fixed_rotation: bool,
    #[serde(default)]
    pub bullet: bool,
    #[serde(default)]
    pub sensor: bool,
    #[serde(default = "one", alias = "gravityScale")]
    pub gravity_scale: f32,
}

fn default_friction() -> f32 {
    0.6
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            kind: BodyKind::Dynamic,
            density: 1.0,
            friction: default_friction(),
            restitution: 0.0,
            fixed_rotation: false,
            bullet: false,
            sensor: false,
            gravity_scale: 1.0,
        }
    }
}

/// Partial update of the first-person maze settings; absent fields keep
/// their current value. Lengths are world units, angles degrees.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MazeConfig {
    pub wall_height: Option<f32>,
    pub eye_height: Option<f32>,
    pub move_speed: Option<f32>,
    /// Radians per second at full turn input.
    pub turn_speed: Option<f32>,
    pub fov: Option<f32>,
    pub radius: Option<f32>,
    pub fog_start: Option<f32>,
    pub fog_end: Option<f32>,
    pub fog_color: Option<[f32; 3]>,
    pub ambient: Option<f32>,
    pub wall_gid: Option<u32>,
    pub floor_gid: Option<u32>,
    pub ceiling_gid: Option<u32>,
    pub draw_floor: Option<bool>,
    pub draw_ceiling: Option<bool>,
}

/// Partial update of a billboarded maze item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MazeItemConfig {
    pub name: Option<String>,
    pub y_offset: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub pickup_radius: Option<f32>,
    pub bob_amplitude: Option<f32>,
    /// Bob cycles per second.
    pub bob_speed: Option<f32>,
    pub bob_phase: Option<f32>,
    /// Radians per second about the vertical axis; 0 keeps the item camera-facing.
    pub spin_speed: Option<f32>,
    pub frame: Option<usize>,
}
