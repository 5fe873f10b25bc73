use crate::atlas::{AtlasId, GridSpec, UvRect};
use crate::config::TmxLoadOptions;
use crate::error::{Result, WorldError};
use crate::ir_map::*;
use crate::loader::aseprite::sheet_from_aseprite_file;
use crate::loader::tmx_loader::decode_map_file_to_ir;
use crate::physics::BodyTag;
use crate::shape::{CollisionShape, MAX_SHAPES_PER_TILE};
use crate::spatial::{TileId, TileIndex};
use crate::World;
use macroquad::prelude::*;
use std::path::Path;

pub const MAX_TILES: usize = 65536;

/// A placed map tile. Immutable once the map is loaded.
#[derive(Debug, Clone)]
pub struct TileInstance {
    /// `tile_<tx>_<ty>`
    pub name: String,
    pub gid: u32,
    pub layer: usize,
    pub grid: (u32, u32),
    pub center: Vec2,
    pub size: Vec2,
    pub uv: UvRect,
    pub atlas: Option<AtlasId>,
    pub visible: bool,
    /// Set for every tile of the collision layer.
    pub is_collision: bool,
    /// Set only where a body starts (first tile of a run, or a custom-shape tile).
    pub has_body: bool,
}

/// Tiled pixel space (Y down) to world space (Y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapTransform {
    /// World units per pixel.
    pub units: f32,
    /// World position of pixel `(0, map_height_px)`, the map's bottom-left corner.
    pub origin: Vec2,
    pub map_px: Vec2,
    pub tile_px: Vec2,
}

impl MapTransform {
    pub fn new(ir: &IrMap, opts: &TmxLoadOptions, auto_center: bool) -> Result<Self> {
        if opts.pixels_per_meter <= 0.0 {
            return Err(WorldError::invalid("pixels_per_meter must be positive"));
        }
        let tile_px = vec2(ir.tile_w as f32, ir.tile_h as f32);
        let map_px = vec2(ir.width as f32, ir.height as f32) * tile_px;
        let mut units = 1.0 / opts.pixels_per_meter;
        if opts.normalize {
            if opts.scale <= 0.0 {
                return Err(WorldError::invalid("scale must be positive"));
            }
            units = opts.scale / map_px.x;
        }
        let origin = if opts.normalize || auto_center {
            -map_px * units * 0.5
        } else {
            Vec2::ZERO
        };
        Ok(MapTransform {
            units,
            origin,
            map_px,
            tile_px,
        })
    }

    #[inline]
    pub fn to_world(&self, px: Vec2) -> Vec2 {
        vec2(
            self.origin.x + px.x * self.units,
            self.origin.y + (self.map_px.y - px.y) * self.units,
        )
    }

    /// Pixel offset (Y down) to world displacement (Y up).
    #[inline]
    pub fn offset_to_world(&self, px: Vec2) -> Vec2 {
        vec2(px.x * self.units, -px.y * self.units)
    }

    /// World size of one map cell.
    #[inline]
    pub fn cell(&self) -> Vec2 {
        self.tile_px * self.units
    }

    pub fn tile_center(&self, tx: u32, ty: u32) -> Vec2 {
        self.to_world(vec2(
            (tx as f32 + 0.5) * self.tile_px.x,
            (ty as f32 + 0.5) * self.tile_px.y,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct MapInfo {
    pub width: u32,
    pub height: u32,
    pub tile_w: u32,
    pub tile_h: u32,
    pub transform: MapTransform,
    pub collision_layer: String,
    pub properties: Properties,
}

impl MapInfo {
    pub fn to_json(&self) -> serde_json::Value {
        let cell = self.transform.cell();
        let min = self.transform.origin;
        let max = min + self.transform.map_px * self.transform.units;
        serde_json::json!({
            "width": self.width,
            "height": self.height,
            "tile_width": self.tile_w,
            "tile_height": self.tile_h,
            "cell_w": cell.x,
            "cell_h": cell.y,
            "min_x": min.x,
            "min_y": min.y,
            "max_x": max.x,
            "max_y": max.y,
            "collision_layer": self.collision_layer,
            "properties": self.properties.to_json(),
        })
    }
}

/// A non-tile object from an object layer, in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct TmxObject {
    pub id: u32,
    pub name: String,
    /// Tiled `type`/`class`.
    pub kind: String,
    pub layer: String,
    /// Bottom-left corner of the object's rectangle.
    pub min: Vec2,
    pub size: Vec2,
    pub rotation: f32,
    pub point: bool,
    pub ellipse: bool,
    pub visible: bool,
    pub polygon: Vec<Vec2>,
    pub polyline: Vec<Vec2>,
    pub gid: Option<u32>,
    pub properties: Properties,
}

impl TmxObject {
    fn from_ir(obj: &IrObject, layer: &str, t: &MapTransform, layer_offset: Vec2) -> Self {
        let anchor = t.to_world(vec2(obj.x, obj.y)) + layer_offset;
        let size = vec2(obj.width, obj.height) * t.units;
        let to_world = |pts: &[Vec2]| -> Vec<Vec2> {
            pts.iter()
                .map(|p| t.to_world(vec2(obj.x + p.x, obj.y + p.y)) + layer_offset)
                .collect()
        };
        // tile objects hang from their bottom-left corner, everything else from the top-left
        let (min, gid) = match obj.shape {
            IrObjectShape::Tile { gid } => (anchor, Some(gid)),
            _ => (anchor - vec2(0.0, size.y), None),
        };
        TmxObject {
            id: obj.id,
            name: obj.name.clone(),
            kind: obj.class_name.clone(),
            layer: layer.to_owned(),
            min,
            size,
            rotation: obj.rotation,
            point: matches!(obj.shape, IrObjectShape::Point),
            ellipse: matches!(obj.shape, IrObjectShape::Ellipse),
            visible: obj.visible,
            polygon: match &obj.shape {
                IrObjectShape::Polygon(p) => to_world(p),
                _ => Vec::new(),
            },
            polyline: match &obj.shape {
                IrObjectShape::Polyline(p) => to_world(p),
                _ => Vec::new(),
            },
            gid,
            properties: obj.properties.clone(),
        }
    }

    pub fn center(&self) -> Vec2 {
        self.min + self.size * 0.5
    }

    pub fn to_json(&self) -> serde_json::Value {
        let c = self.center();
        let pts = |v: &[Vec2]| v.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>();
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "type": self.kind,
            "layer": self.layer,
            "x": self.min.x,
            "y": self.min.y,
            "width": self.size.x,
            "height": self.size.y,
            "center_x": c.x,
            "center_y": c.y,
            "rotation": self.rotation,
            "point": self.point,
            "ellipse": self.ellipse,
            "visible": self.visible,
            "polygon": pts(&self.polygon),
            "polyline": pts(&self.polyline),
            "gid": self.gid,
            "properties": self.properties.to_json(),
        })
    }
}

/// Returned by a TMX load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSummary {
    pub tiles: usize,
    pub bodies: usize,
    pub objects: usize,
    pub atlases: usize,
    pub sheets: usize,
    /// Layers that could not be decoded, with the reason.
    pub skipped_layers: Vec<(String, String)>,
}

impl LoadSummary {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "tiles": self.tiles,
            "bodies": self.bodies,
            "objects": self.objects,
            "atlases": self.atlases,
            "sheets": self.sheets,
            "skipped_layers": self
                .skipped_layers
                .iter()
                .map(|(name, reason)| serde_json::json!({"name": name, "reason": reason}))
                .collect::<Vec<_>>(),
        })
    }
}

/// A stretch of plain collision tiles in one row waiting for its body.
struct Run {
    first_tile: usize,
    first_center: Vec2,
    last_center: Vec2,
    len: u32,
}

impl World {
    /// Loads a TMX file into this world. On error, whatever was placed
    /// before the failure stays in the world.
    pub fn load_tmx(&mut self, path: impl AsRef<Path>, opts: &TmxLoadOptions) -> Result<LoadSummary> {
        let path = path.as_ref();
        let (ir, _map_dir) = decode_map_file_to_ir(path)?;
        let summary = self.apply_map(&ir, opts)?;
        tracing::info!(
            map = %path.display(),
            tiles = summary.tiles,
            bodies = summary.bodies,
            objects = summary.objects,
            atlases = summary.atlases,
            "TMX loaded"
        );
        Ok(summary)
    }

    /// Places a decoded map: atlases, sheets, tiles, bodies and objects.
    pub fn apply_map(&mut self, ir: &IrMap, opts: &TmxLoadOptions) -> Result<LoadSummary> {
        let transform = MapTransform::new(ir, opts, self.config.auto_center)?;
        let mut summary = LoadSummary::default();

        for ts in &ir.tilesets {
            self.apply_tileset(ts, &mut summary)?;
        }

        self.map = Some(MapInfo {
            width: ir.width,
            height: ir.height,
            tile_w: ir.tile_w,
            tile_h: ir.tile_h,
            transform,
            collision_layer: opts.collision_layer.clone(),
            properties: ir.properties.clone(),
        });
        self.tile_index = TileIndex::new(transform.cell());
        for (i, t) in self.tiles.iter().enumerate() {
            self.tile_index.insert(i, t.center, t.size);
        }

        for (layer_idx, layer) in ir.layers.iter().enumerate() {
            let offset = transform.offset_to_world(layer.offset);
            match &layer.kind {
                IrLayerKind::Tiles { width, data, .. } => {
                    let collision = layer.name == opts.collision_layer;
                    self.place_tile_layer(layer_idx, layer, *width, data, collision, offset, &mut summary)?;
                }
                IrLayerKind::Objects { objects } => {
                    for obj in objects {
                        self.objects
                            .push(TmxObject::from_ir(obj, &layer.name, &transform, offset));
                        summary.objects += 1;
                    }
                }
                IrLayerKind::Skipped { reason } => {
                    tracing::warn!(layer = %layer.name, %reason, "layer skipped");
                    summary.skipped_layers.push((layer.name.clone(), reason.clone()));
                }
                IrLayerKind::Unsupported => {
                    tracing::debug!(layer = %layer.name, "unsupported layer kind ignored");
                }
            }
        }

        self.tiles_dirty = true;
        Ok(summary)
    }

    fn apply_tileset(&mut self, ts: &IrTileset, summary: &mut LoadSummary) -> Result<()> {
        let mut shapes_by_id = Vec::new();
        for tile in &ts.tiles {
            let mut shapes: Vec<CollisionShape> = tile
                .objects
                .iter()
                .filter_map(|o| CollisionShape::from_tiled_object(o, ts.tile_w as f32, ts.tile_h as f32))
                .collect();
            if shapes.is_empty() {
                continue;
            }
            if shapes.len() > MAX_SHAPES_PER_TILE {
                tracing::warn!(tileset = %ts.name, tile = tile.id, "too many collision shapes, keeping {MAX_SHAPES_PER_TILE}");
                shapes.truncate(MAX_SHAPES_PER_TILE);
            }
            self.tile_shapes.insert(ts.first_gid + tile.id, shapes.clone());
            shapes_by_id.push((tile.id, shapes));
        }

        let Some(image) = &ts.image else {
            tracing::warn!(tileset = %ts.name, "tileset without a single image skipped");
            return Ok(());
        };
        let atlas = self.atlases.register_grid(
            &image.source,
            GridSpec {
                tile_w: ts.tile_w,
                tile_h: ts.tile_h,
                first_gid: ts.first_gid,
                tilecount: ts.tilecount,
                columns: ts.columns,
                margin: ts.margin,
                spacing: ts.spacing,
            },
        )?;
        summary.atlases += 1;

        if let (false, Some(json)) = (ts.name.is_empty(), ts.properties.get_string("aseprite_json")) {
            let (tex_w, tex_h) = match self.atlases.get(atlas) {
                Some(a) => (a.width as f32, a.height as f32),
                None => return Err(WorldError::not_found("atlas", atlas.to_string())),
            };
            let mut sheet = sheet_from_aseprite_file(
                &ts.base_dir.join(json),
                &ts.name,
                ts.first_gid,
                atlas,
                tex_w,
                tex_h,
            )?;
            for (id, shapes) in shapes_by_id {
                if let Some(frame) = sheet.frames.get_mut(id as usize) {
                    frame.shapes = shapes;
                }
            }
            self.sheets.add(sheet)?;
            summary.sheets += 1;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn place_tile_layer(
        &mut self,
        layer_idx: usize,
        layer: &IrLayer,
        width: usize,
        data: &[u32],
        collision: bool,
        offset: Vec2,
        summary: &mut LoadSummary,
    ) -> Result<()> {
        let Some(transform) = self.map.as_ref().map(|m| m.transform) else {
            return Ok(());
        };
        let cell = transform.cell();
        let mut run: Option<Run> = None;

        for (idx, &raw) in data.iter().enumerate() {
            let tx = (idx % width) as u32;
            let ty = (idx / width) as u32;
            if tx == 0 {
                // runs never wrap rows
                summary.bodies += self.flush_run(run.take(), cell);
            }

            let id = TileId(raw);
            let gid = id.clean();
            if gid == 0 {
                summary.bodies += self.flush_run(run.take(), cell);
                continue;
            }
            if self.tiles.len() >= MAX_TILES {
                return Err(WorldError::Capacity {
                    what: "tiles",
                    max: MAX_TILES,
                });
            }

            let cell_center = transform.tile_center(tx, ty) + offset;
            let (atlas, uv, size) = match self.atlases.atlas_for_gid(gid) {
                Some((atlas_id, local)) => {
                    let a = self.atlases.get(atlas_id);
                    let uv = a.and_then(|a| a.tile_uv(local));
                    let size = a
                        .map(|a| vec2(a.tile_w as f32, a.tile_h as f32) * transform.units)
                        .unwrap_or(cell);
                    (uv.map(|_| atlas_id), uv.unwrap_or_default(), size)
                }
                None => {
                    tracing::warn!(gid, layer = %layer.name, "GID has no tileset");
                    (None, UvRect::default(), cell)
                }
            };
            // oversized tiles grow up and right from the cell's bottom-left corner
            let center = cell_center - cell * 0.5 + size * 0.5;

            let tile_index = self.tiles.len();
            let name = format!("tile_{tx}_{ty}");
            self.tiles.push(TileInstance {
                name: name.clone(),
                gid,
                layer: layer_idx,
                grid: (tx, ty),
                center,
                size,
                uv: uv.flipped(id.flip_h(), id.flip_v()),
                atlas,
                visible: layer.visible,
                is_collision: collision,
                has_body: false,
            });
            self.tile_index.insert(tile_index, center, size);
            summary.tiles += 1;

            if !collision {
                continue;
            }

            let custom = self.tile_shapes.get(&gid).filter(|s| !s.is_empty()).cloned();
            match custom {
                Some(shapes) => {
                    summary.bodies += self.flush_run(run.take(), cell);
                    // shapes follow the tile image, which may be larger than the cell
                    let local: Vec<_> = shapes.iter().map(|s| s.materialize(size, Vec2::ZERO)).collect();
                    let handle = self
                        .physics
                        .add_static_shapes(center, &local, BodyTag::Tile(tile_index as u32));
                    self.physics.bind_name(&name, handle);
                    self.tiles[tile_index].has_body = true;
                    summary.bodies += 1;
                }
                None => match run.as_mut() {
                    Some(r) => {
                        r.last_center = cell_center;
                        r.len += 1;
                    }
                    None => {
                        run = Some(Run {
                            first_tile: tile_index,
                            first_center: cell_center,
                            last_center: cell_center,
                            len: 1,
                        });
                    }
                },
            }
        }
        summary.bodies += self.flush_run(run, cell);
        Ok(())
    }

    /// One static box for the whole run; returns the number of bodies created.
    fn flush_run(&mut self, run: Option<Run>, cell: Vec2) -> usize {
        let Some(run) = run else { return 0 };
        let center = (run.first_center + run.last_center) * 0.5;
        let half = vec2(run.len as f32 * cell.x * 0.5, cell.y * 0.5);
        let handle = self
            .physics
            .add_static_box(center, half, BodyTag::Tile(run.first_tile as u32));
        let tile = &mut self.tiles[run.first_tile];
        tile.has_body = true;
        self.physics.bind_name(&tile.name, handle);
        1
    }

    pub fn tiles(&self) -> &[TileInstance] {
        &self.tiles
    }

    pub fn objects(&self) -> &[TmxObject] {
        &self.objects
    }

    pub fn object_by_name(&self, name: &str) -> Result<&TmxObject> {
        self.objects
            .iter()
            .find(|o| o.name == name)
            .ok_or_else(|| WorldError::not_found("object", name))
    }

    pub fn map_info(&self) -> Option<&MapInfo> {
        self.map.as_ref()
    }

    /// Normalised collision shapes attached to `gid` in its tileset.
    pub fn tile_collision(&self, gid: u32) -> Result<&[CollisionShape]> {
        self.tile_shapes
            .get(&(gid & crate::spatial::GID_MASK))
            .map(Vec::as_slice)
            .ok_or_else(|| WorldError::not_found("tile collision for GID", gid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ir(w: u32, h: u32) -> IrMap {
        IrMap {
            width: w,
            height: h,
            tile_w: 32,
            tile_h: 32,
            properties: Properties::new(),
            tilesets: Vec::new(),
            layers: Vec::new(),
        }
    }

    #[test]
    fn tile_centres_are_y_flipped_and_centred() {
        let t = MapTransform::new(&ir(4, 4), &TmxLoadOptions::default(), true).unwrap();
        assert_eq!(t.tile_center(0, 0), vec2(-1.5, 1.5));
        assert_eq!(t.tile_center(3, 3), vec2(1.5, -1.5));
        assert_eq!(t.cell(), vec2(1.0, 1.0));
    }

    #[test]
    fn without_centering_origin_is_bottom_left() {
        let t = MapTransform::new(&ir(4, 2), &TmxLoadOptions::default(), false).unwrap();
        assert_eq!(t.tile_center(0, 0), vec2(0.5, 1.5));
        assert_eq!(t.tile_center(0, 1), vec2(0.5, 0.5));
    }

    #[test]
    fn normalize_scales_width_to_scale() {
        let opts = TmxLoadOptions {
            normalize: true,
            scale: 2.0,
            ..Default::default()
        };
        // 8x4 tiles of 32 px: 256 px wide -> 2 units
        let t = MapTransform::new(&ir(8, 4), &opts, false).unwrap();
        assert_eq!(t.cell(), vec2(0.25, 0.25));
        assert_eq!(t.to_world(vec2(0.0, 128.0)), vec2(-1.0, -0.5));
        assert_eq!(t.to_world(vec2(256.0, 0.0)), vec2(1.0, 0.5));
    }

    #[test]
    fn rectangle_object_reports_bottom_left_and_centre() {
        let t = MapTransform::new(&ir(4, 4), &TmxLoadOptions::default(), true).unwrap();
        let obj = IrObject {
            id: 3,
            name: "door".into(),
            class_name: "trigger".into(),
            x: 32.0,
            y: 32.0,
            width: 64.0,
            height: 32.0,
            rotation: 0.0,
            visible: true,
            shape: IrObjectShape::Rectangle,
            properties: Properties::new(),
        };
        let o = TmxObject::from_ir(&obj, "Objects", &t, Vec2::ZERO);
        assert_eq!(o.min, vec2(-1.0, 0.0));
        assert_eq!(o.size, vec2(2.0, 1.0));
        assert_eq!(o.center(), vec2(0.0, 0.5));
        assert_eq!(o.kind, "trigger");
    }
}
