//! Tiled (TMX) worlds for Macroquad hosts: tile layers with merged static
//! collision, sprite sheets, rapier2d bodies with contact callbacks, a
//! follow camera, and a first-person maze view built from the collision layer.

mod atlas;
mod camera;
mod commands;
mod config;
mod error;
mod host;
mod ir_map;
mod loader {
    pub mod aseprite;
    pub mod sheet_mapping;
    pub mod tmx_loader;
}
mod map;
pub mod maze;
mod physics;
mod render;
mod shape;
mod sheet;
mod spatial {
    mod index;
    pub use index::*;
}
mod sprite;
mod world;

pub use atlas::{AtlasId, AtlasManager, UvRect};
pub use camera::{CameraMode, WorldCamera};
pub use commands::{WorldId, Worlds};
pub use config::{BodyKind, BodyOptions, MazeConfig, MazeItemConfig, TmxLoadOptions, WorldConfig};
pub use error::{Result, WorldError};
pub use host::{GraphicsObject, HeadlessHost, Host};
pub use ir_map::{IrObject, IrObjectShape, Properties, PropertyValue};
pub use map::{LoadSummary, MapInfo, TileInstance, TmxObject};
pub use physics::PhysicsWorld;
pub use shape::CollisionShape;
pub use sheet::{Animation, Frame, SheetId, SheetRegistry, SpriteSheet};
pub use sprite::{AnimationState, Sprite, SpriteId, SpriteInfo};
pub use world::{QueryHits, World, WorldEvent};
