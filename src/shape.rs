//! Collision shapes attached to tiles and sprite-sheet frames.
//!
//! Shapes are stored normalised to their tile/frame: `(0, 0)` is the
//! top-left corner, `(1, 1)` the bottom-right. They are turned into
//! body-local geometry (Y up, centred on the tile) only when a body is built.

use crate::ir_map::{IrObject, IrObjectShape};
use macroquad::prelude::*;

pub const MAX_SHAPES_PER_TILE: usize = 8;
pub const MAX_POLYGON_VERTS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum CollisionShape {
    Box { x: f32, y: f32, w: f32, h: f32 },
    Polygon(Vec<Vec2>),
    /// Radius is normalised against the tile/frame width.
    Circle { cx: f32, cy: f32, r: f32 },
}

/// Shape in body-local world units, ready for the physics backend.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalShape {
    Cuboid { center: Vec2, half: Vec2 },
    Hull(Vec<Vec2>),
    Ball { center: Vec2, radius: f32 },
}

/// Keeps at most [`MAX_POLYGON_VERTS`] vertices; anything under three is dropped.
pub fn clamp_polygon(mut points: Vec<Vec2>) -> Option<Vec<Vec2>> {
    if points.len() < 3 {
        return None;
    }
    if points.len() > MAX_POLYGON_VERTS {
        tracing::warn!(
            verts = points.len(),
            "polygon truncated to {MAX_POLYGON_VERTS} vertices"
        );
        points.truncate(MAX_POLYGON_VERTS);
    }
    Some(points)
}

#[inline]
fn unnormalize(p: Vec2, size: Vec2) -> Vec2 {
    vec2((p.x - 0.5) * size.x, (0.5 - p.y) * size.y)
}

impl CollisionShape {
    /// Converts a Tiled collision object given in pixels of a `px_w` x `px_h` tile.
    pub fn from_tiled_object(obj: &IrObject, px_w: f32, px_h: f32) -> Option<Self> {
        if px_w <= 0.0 || px_h <= 0.0 {
            return None;
        }
        match &obj.shape {
            IrObjectShape::Rectangle | IrObjectShape::Tile { .. } => {
                if obj.width <= 0.0 || obj.height <= 0.0 {
                    return None;
                }
                Some(CollisionShape::Box {
                    x: obj.x / px_w,
                    y: obj.y / px_h,
                    w: obj.width / px_w,
                    h: obj.height / px_h,
                })
            }
            IrObjectShape::Ellipse => {
                let r = 0.25 * (obj.width + obj.height);
                if r <= 0.0 {
                    return None;
                }
                Some(CollisionShape::Circle {
                    cx: (obj.x + obj.width * 0.5) / px_w,
                    cy: (obj.y + obj.height * 0.5) / px_h,
                    r: r / px_w,
                })
            }
            IrObjectShape::Polygon(points) => {
                let pts = points
                    .iter()
                    .map(|p| vec2((obj.x + p.x) / px_w, (obj.y + p.y) / px_h))
                    .collect();
                clamp_polygon(pts).map(CollisionShape::Polygon)
            }
            IrObjectShape::Point | IrObjectShape::Polyline(_) => None,
        }
    }

    /// Body-local geometry for a tile/frame rendered at `size`, shifted by `-shift`
    /// (used when the body sits at a hitbox centroid instead of the visual centre).
    pub fn materialize(&self, size: Vec2, shift: Vec2) -> LocalShape {
        match self {
            CollisionShape::Box { x, y, w, h } => LocalShape::Cuboid {
                center: unnormalize(vec2(x + w * 0.5, y + h * 0.5), size) - shift,
                half: vec2(w * size.x * 0.5, h * size.y * 0.5),
            },
            CollisionShape::Polygon(points) => {
                LocalShape::Hull(points.iter().map(|p| unnormalize(*p, size) - shift).collect())
            }
            CollisionShape::Circle { cx, cy, r } => LocalShape::Ball {
                center: unnormalize(vec2(*cx, *cy), size) - shift,
                radius: r * size.x,
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CollisionShape::Box { x, y, w, h } => serde_json::json!({
                "shape": "box", "x": x, "y": y, "w": w, "h": h
            }),
            CollisionShape::Polygon(points) => serde_json::json!({
                "shape": "polygon",
                "points": points.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>(),
            }),
            CollisionShape::Circle { cx, cy, r } => serde_json::json!({
                "shape": "circle", "cx": cx, "cy": cy, "r": r
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir_map::Properties;

    fn obj(shape: IrObjectShape, x: f32, y: f32, w: f32, h: f32) -> IrObject {
        IrObject {
            id: 1,
            name: String::new(),
            class_name: String::new(),
            x,
            y,
            width: w,
            height: h,
            rotation: 0.0,
            visible: true,
            shape,
            properties: Properties::new(),
        }
    }

    #[test]
    fn box_is_normalised_and_recentred() {
        // bottom half of a 32x32 tile
        let shape = CollisionShape::from_tiled_object(
            &obj(IrObjectShape::Rectangle, 0.0, 16.0, 32.0, 16.0),
            32.0,
            32.0,
        )
        .unwrap();
        assert_eq!(shape, CollisionShape::Box { x: 0.0, y: 0.5, w: 1.0, h: 0.5 });

        match shape.materialize(vec2(2.0, 2.0), Vec2::ZERO) {
            LocalShape::Cuboid { center, half } => {
                assert_eq!(center, vec2(0.0, -0.5));
                assert_eq!(half, vec2(1.0, 0.5));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn polygon_points_are_y_flipped() {
        let shape = CollisionShape::Polygon(vec![vec2(0.0, 0.0), vec2(1.0, 0.0), vec2(1.0, 1.0)]);
        let LocalShape::Hull(points) = shape.materialize(vec2(1.0, 1.0), Vec2::ZERO) else {
            panic!("expected hull");
        };
        assert_eq!(points, vec![vec2(-0.5, 0.5), vec2(0.5, 0.5), vec2(0.5, -0.5)]);
    }

    #[test]
    fn eight_vertices_accepted_nine_truncated() {
        let ring = |n: usize| -> Vec<Vec2> {
            (0..n)
                .map(|i| {
                    let a = i as f32 / n as f32 * std::f32::consts::TAU;
                    vec2(0.5 + 0.4 * a.cos(), 0.5 + 0.4 * a.sin())
                })
                .collect()
        };
        assert_eq!(clamp_polygon(ring(8)).unwrap().len(), 8);
        assert_eq!(clamp_polygon(ring(9)).unwrap().len(), 8);
        assert!(clamp_polygon(ring(2)).is_none());
    }

    #[test]
    fn ellipse_becomes_circle() {
        let shape = CollisionShape::from_tiled_object(
            &obj(IrObjectShape::Ellipse, 8.0, 8.0, 16.0, 16.0),
            32.0,
            32.0,
        )
        .unwrap();
        assert_eq!(shape, CollisionShape::Circle { cx: 0.5, cy: 0.5, r: 0.25 });
    }
}
