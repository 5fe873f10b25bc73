// src/ir_map.rs
use macroquad::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;

/// Canonical, format-agnostic map as decoded from a TMX document.
///
/// Everything is still in Tiled pixel space (Y down); placement into world
/// space happens when the map is applied to a [`crate::World`].
#[derive(Debug, Clone)]
pub struct IrMap {
    pub width: u32,
    pub height: u32,
    pub tile_w: u32,
    pub tile_h: u32,
    pub properties: Properties,
    pub tilesets: Vec<IrTileset>, // sorted by first_gid
    pub layers: Vec<IrLayer>,     // draw order: document order
}

/// One `<tileset>`, with external TSX files already resolved.
#[derive(Debug, Clone)]
pub struct IrTileset {
    pub first_gid: u32,
    pub name: String,
    pub tile_w: u32,
    pub tile_h: u32,
    pub tilecount: u32,
    pub columns: u32,
    pub spacing: u32, // 0 if not used
    pub margin: u32,  // 0 if not used
    pub image: Option<IrImage>,
    pub properties: Properties,
    pub tiles: Vec<IrTileMetadata>,
    /// Directory the tileset's relative paths resolve against.
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct IrImage {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Per-tile data from `<tile id>` children of a tileset.
#[derive(Debug, Clone)]
pub struct IrTileMetadata {
    pub id: u32,
    pub properties: Properties,
    /// Collision objects, in tile pixel space.
    pub objects: Vec<IrObject>,
}

#[derive(Debug, Clone)]
pub enum IrLayerKind {
    Tiles {
        width: usize,
        height: usize,
        data: Vec<u32>, // raw GIDs (flip flags kept)
    },
    Objects {
        objects: Vec<IrObject>,
    },
    /// Layer whose data could not be decoded (e.g. compressed base64).
    Skipped {
        reason: String,
    },
    Unsupported,
}

#[derive(Debug, Clone)]
pub struct IrLayer {
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub offset: Vec2, // pixel offset for this layer
    pub properties: Properties,
    pub kind: IrLayerKind,
}

#[derive(Debug, Clone)]
pub enum IrObjectShape {
    Rectangle,
    Point,
    Ellipse,
    Polygon(Vec<Vec2>),
    Polyline(Vec<Vec2>),
    Tile { gid: u32 },
}

#[derive(Debug, Clone)]
pub struct IrObject {
    pub id: u32,
    pub name: String,
    /// `type` (Tiled < 1.9) or `class` (Tiled >= 1.9)
    pub class_name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
    pub visible: bool,
    pub shape: IrObjectShape,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    I64(i64),
    F32(f32),
    String(String),
}

/// Typed custom properties, kept in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, PropertyValue)>,
    index: HashMap<String, usize>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, value: PropertyValue) {
        if let Some(&i) = self.index.get(&name) {
            self.entries[i].1 = value;
        } else {
            self.index.insert(name.clone(), self.entries.len());
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(PropertyValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(PropertyValue::I64(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get_i64(name).and_then(|v| i32::try_from(v).ok())
    }

    pub fn get_f32(&self, name: &str) -> Option<f32> {
        match self.get(name) {
            Some(PropertyValue::F32(v)) => Some(*v),
            Some(PropertyValue::I64(v)) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(PropertyValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Host-facing dictionary, values surfaced verbatim.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (k, v) in self.iter() {
            let value = match v {
                PropertyValue::Bool(b) => serde_json::Value::from(*b),
                PropertyValue::I64(i) => serde_json::Value::from(*i),
                PropertyValue::F32(f) => serde_json::Value::from(*f as f64),
                PropertyValue::String(s) => serde_json::Value::from(s.clone()),
            };
            map.insert(k.to_owned(), value);
        }
        serde_json::Value::Object(map)
    }
}
