// src/loader/tmx_loader.rs
use crate::error::WorldError;
use crate::ir_map::*;
use base64::Engine as _;
use macroquad::prelude::*;
use roxmltree::{Document, Node};
use std::path::{Path, PathBuf};
use std::str::FromStr;

type Result<T> = std::result::Result<T, WorldError>;

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| WorldError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_doc<'a>(text: &'a str, path: &Path) -> Result<Document<'a>> {
    Document::parse(text).map_err(|source| WorldError::Xml {
        path: path.to_path_buf(),
        source,
    })
}

fn attr<T: FromStr>(node: Node, name: &str) -> Option<T> {
    node.attribute(name).and_then(|v| v.trim().parse().ok())
}

fn attr_or<T: FromStr>(node: Node, name: &str, default: T) -> T {
    attr(node, name).unwrap_or(default)
}

fn required<T: FromStr>(node: Node, name: &str) -> Result<T> {
    attr(node, name).ok_or_else(|| {
        WorldError::InvalidMap(format!(
            "<{}> is missing a valid `{}` attribute",
            node.tag_name().name(),
            name
        ))
    })
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

fn property_to_ir(prop: Node) -> Result<Option<(String, PropertyValue)>> {
    let name = prop.attribute("name").unwrap_or_default().to_owned();
    // multi-line string properties keep their value in the element text
    let raw = prop
        .attribute("value")
        .or_else(|| prop.text())
        .unwrap_or_default()
        .to_owned();

    let parsed = match prop.attribute("type").unwrap_or("string") {
        "bool" => raw.parse::<bool>().ok().map(PropertyValue::Bool),
        "int" | "object" => raw.parse::<i64>().ok().map(PropertyValue::I64),
        "float" => raw.parse::<f32>().ok().map(PropertyValue::F32),
        "string" | "file" | "color" => Some(PropertyValue::String(raw)),
        other => {
            return Err(WorldError::UnsupportedPropertyType {
                name,
                kind: other.to_owned(),
            });
        }
    };

    Ok(parsed.map(|value| (name, value)))
}

fn properties_of(node: Node) -> Result<Properties> {
    let mut out = Properties::new();
    if let Some(props) = child(node, "properties") {
        for p in props.children().filter(|n| n.has_tag_name("property")) {
            if let Some((name, value)) = property_to_ir(p)? {
                out.insert(name, value);
            }
        }
    }
    Ok(out)
}

/// Parses `"x1,y1 x2,y2 ..."`.
fn parse_points(points: &str) -> Result<Vec<Vec2>> {
    points
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| WorldError::InvalidMap(format!("bad point `{pair}`")))?;
            match (x.parse::<f32>(), y.parse::<f32>()) {
                (Ok(x), Ok(y)) => Ok(vec2(x, y)),
                _ => Err(WorldError::InvalidMap(format!("bad point `{pair}`"))),
            }
        })
        .collect()
}

fn object_to_ir(obj: Node) -> Result<IrObject> {
    let shape = if let Some(gid) = attr::<u32>(obj, "gid") {
        IrObjectShape::Tile { gid }
    } else if child(obj, "point").is_some() {
        IrObjectShape::Point
    } else if child(obj, "ellipse").is_some() {
        IrObjectShape::Ellipse
    } else if let Some(poly) = child(obj, "polygon") {
        IrObjectShape::Polygon(parse_points(poly.attribute("points").unwrap_or_default())?)
    } else if let Some(line) = child(obj, "polyline") {
        IrObjectShape::Polyline(parse_points(line.attribute("points").unwrap_or_default())?)
    } else {
        IrObjectShape::Rectangle
    };

    let class_name = obj
        .attribute("class")
        .or_else(|| obj.attribute("type"))
        .unwrap_or_default()
        .to_owned();

    Ok(IrObject {
        id: attr_or(obj, "id", 0),
        name: obj.attribute("name").unwrap_or_default().to_owned(),
        class_name,
        x: attr_or(obj, "x", 0.0),
        y: attr_or(obj, "y", 0.0),
        width: attr_or(obj, "width", 0.0),
        height: attr_or(obj, "height", 0.0),
        rotation: attr_or(obj, "rotation", 0.0),
        visible: attr_or::<u8>(obj, "visible", 1) != 0,
        shape,
        properties: properties_of(obj)?,
    })
}

fn tileset_from_node(
    ts: Node,
    first_gid: u32,
    name_override: Option<&str>,
    base_dir: &Path,
) -> Result<IrTileset> {
    let tile_w: u32 = required(ts, "tilewidth")?;
    let tile_h: u32 = required(ts, "tileheight")?;
    let spacing = attr_or(ts, "spacing", 0);
    let margin = attr_or(ts, "margin", 0);

    let image = child(ts, "image").map(|img| IrImage {
        source: base_dir.join(img.attribute("source").unwrap_or_default()),
        width: attr_or(img, "width", 0),
        height: attr_or(img, "height", 0),
    });

    let columns = attr(ts, "columns").unwrap_or_else(|| match &image {
        Some(img) if tile_w + spacing > 0 => {
            (img.width.saturating_sub(2 * margin) + spacing) / (tile_w + spacing)
        }
        _ => 0,
    });

    let mut tiles = Vec::new();
    for tile in ts.children().filter(|n| n.has_tag_name("tile")) {
        let objects = match child(tile, "objectgroup") {
            Some(group) => group
                .children()
                .filter(|n| n.has_tag_name("object"))
                .map(object_to_ir)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        tiles.push(IrTileMetadata {
            id: required(tile, "id")?,
            properties: properties_of(tile)?,
            objects,
        });
    }

    Ok(IrTileset {
        first_gid,
        name: name_override
            .or_else(|| ts.attribute("name"))
            .unwrap_or_default()
            .to_owned(),
        tile_w,
        tile_h,
        tilecount: attr_or(ts, "tilecount", 0),
        columns,
        spacing,
        margin,
        image,
        properties: properties_of(ts)?,
        tiles,
        base_dir: base_dir.to_path_buf(),
    })
}

fn tileset_to_ir(ts: Node, map_dir: &Path) -> Result<IrTileset> {
    let first_gid: u32 = required(ts, "firstgid")?;

    match ts.attribute("source") {
        Some(source) => {
            let tsx_path = map_dir.join(source);
            let txt = read_file(&tsx_path)?;
            let doc = parse_doc(&txt, &tsx_path)?;
            let root = doc.root_element();
            if !root.has_tag_name("tileset") {
                return Err(WorldError::InvalidMap(format!(
                    "external tileset {} has no <tileset> root",
                    tsx_path.display()
                )));
            }
            let tsx_dir = tsx_path.parent().unwrap_or(map_dir).to_path_buf();
            tileset_from_node(root, first_gid, ts.attribute("name"), &tsx_dir)
        }
        None => tileset_from_node(ts, first_gid, None, map_dir),
    }
}

enum LayerData {
    Gids(Vec<u32>),
    Skip(String),
}

fn decode_layer_data(data: Node) -> Result<LayerData> {
    let encoding = data.attribute("encoding");
    let compression = data.attribute("compression");

    match (encoding, compression) {
        (Some("csv"), _) => {
            let text = data.text().unwrap_or_default();
            let gids = text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u32>()
                        .map_err(|_| WorldError::InvalidMap(format!("bad CSV gid `{s}`")))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(LayerData::Gids(gids))
        }
        (Some("base64"), None) => {
            let text: String = data
                .text()
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(text.as_bytes())
                .map_err(|e| WorldError::InvalidMap(format!("bad base64 layer data: {e}")))?;
            if bytes.len() % 4 != 0 {
                return Err(WorldError::InvalidMap(
                    "base64 layer data is not a whole number of GIDs".into(),
                ));
            }
            Ok(LayerData::Gids(
                bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ))
        }
        (Some("base64"), Some(comp)) => Ok(LayerData::Skip(format!(
            "base64 data with {comp} compression is not supported"
        ))),
        (None, _) => Ok(LayerData::Gids(
            data.children()
                .filter(|n| n.has_tag_name("tile"))
                .map(|t| attr_or(t, "gid", 0u32))
                .collect(),
        )),
        (Some(other), _) => Ok(LayerData::Skip(format!("unknown encoding `{other}`"))),
    }
}

fn layer_common(layer: Node, kind: IrLayerKind) -> Result<IrLayer> {
    Ok(IrLayer {
        name: layer.attribute("name").unwrap_or_default().to_owned(),
        visible: attr_or::<u8>(layer, "visible", 1) != 0,
        opacity: attr_or(layer, "opacity", 1.0),
        offset: vec2(attr_or(layer, "offsetx", 0.0), attr_or(layer, "offsety", 0.0)),
        properties: properties_of(layer)?,
        kind,
    })
}

fn tile_layer_to_ir(layer: Node, map_w: u32, map_h: u32) -> Result<IrLayer> {
    let width = attr_or(layer, "width", map_w) as usize;
    let height = attr_or(layer, "height", map_h) as usize;
    let name = layer.attribute("name").unwrap_or_default();

    let kind = match child(layer, "data") {
        None => IrLayerKind::Skipped {
            reason: "layer has no <data>".into(),
        },
        Some(data) => match decode_layer_data(data)? {
            LayerData::Gids(gids) => {
                if gids.len() != width * height {
                    return Err(WorldError::InvalidMap(format!(
                        "layer '{name}' has {} tiles, expected {}x{}",
                        gids.len(),
                        width,
                        height
                    )));
                }
                IrLayerKind::Tiles {
                    width,
                    height,
                    data: gids,
                }
            }
            LayerData::Skip(reason) => IrLayerKind::Skipped { reason },
        },
    };

    layer_common(layer, kind)
}

/// Parses a TMX document from memory. `map_dir` resolves external tilesets and images.
pub fn decode_map_str_to_ir(text: &str, path: &Path, map_dir: &Path) -> Result<IrMap> {
    let doc = parse_doc(text, path)?;
    let map = doc.root_element();
    if !map.has_tag_name("map") {
        return Err(WorldError::InvalidMap(format!(
            "{} has no <map> element",
            path.display()
        )));
    }

    let width: u32 = required(map, "width")?;
    let height: u32 = required(map, "height")?;
    let tile_w: u32 = required(map, "tilewidth")?;
    let tile_h: u32 = required(map, "tileheight")?;
    if width == 0 || height == 0 || tile_w == 0 || tile_h == 0 {
        return Err(WorldError::InvalidMap("map dimensions must be non-zero".into()));
    }

    let mut tilesets = map
        .children()
        .filter(|n| n.has_tag_name("tileset"))
        .map(|ts| tileset_to_ir(ts, map_dir))
        .collect::<Result<Vec<_>>>()?;
    // Sort by first_gid to make GID lookups a binary search
    tilesets.sort_by_key(|t| t.first_gid);

    let mut layers = Vec::new();
    collect_layers(map, width, height, &mut layers)?;

    Ok(IrMap {
        width,
        height,
        tile_w,
        tile_h,
        properties: properties_of(map)?,
        tilesets,
        layers,
    })
}

/// Appends the layers under `parent` in document order. Group layers are
/// flattened: children inherit the group's offset, visibility and opacity.
fn collect_layers(parent: Node, width: u32, height: u32, out: &mut Vec<IrLayer>) -> Result<()> {
    for node in parent.children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "layer" => out.push(tile_layer_to_ir(node, width, height)?),
            "objectgroup" => {
                let objects = node
                    .children()
                    .filter(|n| n.has_tag_name("object"))
                    .map(object_to_ir)
                    .collect::<Result<Vec<_>>>()?;
                out.push(layer_common(node, IrLayerKind::Objects { objects })?);
            }
            "group" => {
                let group = layer_common(node, IrLayerKind::Unsupported)?;
                let first = out.len();
                collect_layers(node, width, height, out)?;
                tracing::debug!(group = %group.name, layers = out.len() - first, "group flattened");
                for layer in &mut out[first..] {
                    layer.offset += group.offset;
                    layer.visible &= group.visible;
                    layer.opacity *= group.opacity;
                }
            }
            "imagelayer" => out.push(layer_common(node, IrLayerKind::Unsupported)?),
            _ => {}
        }
    }
    Ok(())
}

pub fn decode_map_file_to_ir(path: &Path) -> Result<(IrMap, PathBuf)> {
    let txt = read_file(path)?;
    let map_dir = path
        .parent()
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./"));
    let ir = decode_map_str_to_ir(&txt, path, &map_dir)?;
    Ok((ir, map_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(tmx: &str) -> Result<IrMap> {
        decode_map_str_to_ir(tmx, Path::new("inline.tmx"), Path::new("."))
    }

    #[test]
    fn parses_csv_layer_and_properties() {
        let ir = decode(
            r#"<map width="2" height="2" tilewidth="16" tileheight="16">
                 <properties>
                   <property name="is_night" type="bool" value="true"/>
                   <property name="gravity" type="float" value="9.8"/>
                   <property name="theme" value="forest"/>
                 </properties>
                 <tileset firstgid="1" name="t" tilewidth="16" tileheight="16" tilecount="4" columns="2">
                   <image source="tiles.png" width="32" height="32"/>
                 </tileset>
                 <layer name="ground" width="2" height="2">
                   <properties><property name="difficulty" type="int" value="3"/></properties>
                   <data encoding="csv">1,0,
                   0,2</data>
                 </layer>
               </map>"#,
        )
        .expect("decode");

        assert_eq!(ir.properties.get_bool("is_night"), Some(true));
        assert_eq!(ir.properties.get_f32("gravity"), Some(9.8));
        assert_eq!(ir.properties.get_string("theme"), Some("forest"));
        assert_eq!(ir.layers[0].properties.get_i32("difficulty"), Some(3));
        match &ir.layers[0].kind {
            IrLayerKind::Tiles { data, .. } => assert_eq!(data, &vec![1, 0, 0, 2]),
            _ => panic!("expected tile layer"),
        }
        assert_eq!(ir.tilesets[0].columns, 2);
    }

    #[test]
    fn decodes_uncompressed_base64() {
        // 1, 0, 7, 0 as little-endian u32
        let ir = decode(
            r#"<map width="2" height="2" tilewidth="8" tileheight="8">
                 <layer name="l" width="2" height="2">
                   <data encoding="base64">AQAAAAAAAAAHAAAAAAAAAA==</data>
                 </layer>
               </map>"#,
        )
        .expect("decode");
        match &ir.layers[0].kind {
            IrLayerKind::Tiles { data, .. } => assert_eq!(data, &vec![1, 0, 7, 0]),
            _ => panic!("expected tile layer"),
        }
    }

    #[test]
    fn compressed_base64_layer_is_skipped() {
        let ir = decode(
            r#"<map width="1" height="1" tilewidth="8" tileheight="8">
                 <layer name="packed" width="1" height="1">
                   <data encoding="base64" compression="zlib">eJxjZGBgAAAACAAC</data>
                 </layer>
               </map>"#,
        )
        .expect("decode");
        assert!(matches!(ir.layers[0].kind, IrLayerKind::Skipped { .. }));
    }

    #[test]
    fn missing_map_element_is_an_error() {
        let err = decode(r#"<tileset firstgid="1"/>"#).unwrap_err();
        assert!(matches!(err, WorldError::InvalidMap(_)));
    }

    #[test]
    fn malformed_xml_is_a_typed_error() {
        let err = decode("<map width=").unwrap_err();
        assert!(matches!(err, WorldError::Xml { .. }));
    }

    #[test]
    fn layer_size_mismatch_is_rejected() {
        let err = decode(
            r#"<map width="2" height="2" tilewidth="8" tileheight="8">
                 <layer name="oops" width="2" height="2"><data encoding="csv">1,2,3</data></layer>
               </map>"#,
        )
        .unwrap_err();
        assert!(matches!(err, WorldError::InvalidMap(msg) if msg.contains("oops")));
    }

    #[test]
    fn objects_keep_shape_type_and_properties() {
        let ir = decode(
            r#"<map width="1" height="1" tilewidth="8" tileheight="8">
                 <objectgroup name="spawns">
                   <object id="3" name="start" type="spawn" x="4" y="6"><point/></object>
                   <object id="4" name="lake" class="water" x="0" y="0" width="8" height="4"><ellipse/></object>
                   <object id="5" name="ramp" x="1" y="1">
                     <properties><property name="kind" value="player"/></properties>
                     <polygon points="0,0 4,0 4,4"/>
                   </object>
                 </objectgroup>
               </map>"#,
        )
        .expect("decode");
        let IrLayerKind::Objects { objects } = &ir.layers[0].kind else {
            panic!("expected object layer");
        };
        assert!(matches!(objects[0].shape, IrObjectShape::Point));
        assert_eq!(objects[0].class_name, "spawn");
        assert!(matches!(objects[1].shape, IrObjectShape::Ellipse));
        assert_eq!(objects[1].class_name, "water");
        match &objects[2].shape {
            IrObjectShape::Polygon(pts) => assert_eq!(pts.len(), 3),
            _ => panic!("expected polygon"),
        }
        assert_eq!(objects[2].properties.get_string("kind"), Some("player"));
    }

    #[test]
    fn unknown_property_type_is_rejected() {
        let err = decode(
            r#"<map width="1" height="1" tilewidth="8" tileheight="8">
                 <properties><property name="mystery" type="not_supported" value="x"/></properties>
               </map>"#,
        )
        .unwrap_err();
        assert!(matches!(err, WorldError::UnsupportedPropertyType { .. }));
    }

    #[test]
    fn group_children_are_flattened() {
        let ir = decode(
            r#"<map width="2" height="1" tilewidth="8" tileheight="8">
                 <layer name="Ground" width="2" height="1"><data encoding="csv">1,1</data></layer>
                 <group name="Level" offsetx="4" offsety="2" opacity="0.5">
                   <layer name="Collision" width="2" height="1" offsetx="1"><data encoding="csv">0,1</data></layer>
                   <group name="Inner" visible="0">
                     <objectgroup name="Marks"><object id="1" x="0" y="0"><point/></object></objectgroup>
                   </group>
                 </group>
               </map>"#,
        )
        .expect("decode");
        let names: Vec<_> = ir.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Ground", "Collision", "Marks"]);
        let collision = &ir.layers[1];
        assert!(matches!(collision.kind, IrLayerKind::Tiles { .. }));
        assert_eq!(collision.offset, vec2(5.0, 2.0));
        assert_eq!(collision.opacity, 0.5);
        assert!(collision.visible);
        assert!(!ir.layers[2].visible);
        assert_eq!(ir.layers[2].offset, vec2(4.0, 2.0));
    }
}
