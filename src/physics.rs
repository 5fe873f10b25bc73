//! The rigid-body world owned by a [`crate::World`], plus the name table
//! host scripts use to find bodies.

use crate::config::{BodyKind, BodyOptions};
use crate::shape::LocalShape;
use macroquad::prelude::{vec2, Vec2};
use rapier2d::crossbeam::channel::{unbounded, Receiver};
use rapier2d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier2d::parry::query::PointQuery;
use rapier2d::prelude::*;
use std::collections::HashMap;

pub type BodyHandle = RigidBodyHandle;

/// What a body (and each of its colliders) belongs to. Stored in `user_data`
/// and resolved through the World's tables when an event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyTag {
    /// Index of the first tile of the body's run.
    Tile(u32),
    Sprite(u32),
    MazeCamera,
}

const TAG_SHIFT: u32 = 64;

impl BodyTag {
    pub fn encode(self) -> u128 {
        match self {
            BodyTag::Tile(i) => (1u128 << TAG_SHIFT) | i as u128,
            BodyTag::Sprite(i) => (2u128 << TAG_SHIFT) | i as u128,
            BodyTag::MazeCamera => 3u128 << TAG_SHIFT,
        }
    }

    pub fn decode(data: u128) -> Option<Self> {
        let index = (data & u64::MAX as u128) as u32;
        match data >> TAG_SHIFT {
            1 => Some(BodyTag::Tile(index)),
            2 => Some(BodyTag::Sprite(index)),
            3 => Some(BodyTag::MazeCamera),
            _ => None,
        }
    }
}

/// A begin-contact between two colliders, sensor or solid.
#[derive(Debug, Clone, Copy)]
pub struct ContactBegin {
    pub a: ColliderHandle,
    pub b: ColliderHandle,
    pub sensor: bool,
}

#[inline]
fn to_na(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

#[inline]
fn from_na(v: &Vector<Real>) -> Vec2 {
    vec2(v.x, v.y)
}

pub struct PhysicsWorld {
    gravity: Vector<Real>,
    substeps: u32,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    events: ChannelEventCollector,
    collision_recv: Receiver<CollisionEvent>,
    contact_force_recv: Receiver<ContactForceEvent>,
    names: HashMap<String, BodyHandle>,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec2, substeps: u32) -> Self {
        let (collision_send, collision_recv) = unbounded();
        let (contact_force_send, contact_force_recv) = unbounded();
        PhysicsWorld {
            gravity: to_na(gravity),
            substeps: substeps.max(1),
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            events: ChannelEventCollector::new(collision_send, contact_force_send),
            collision_recv,
            contact_force_recv,
            names: HashMap::new(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        from_na(&self.gravity)
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = to_na(gravity);
    }

    pub fn substeps(&self) -> u32 {
        self.substeps
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Advances by `dt` in `substeps` equal slices and returns the contacts that began.
    pub fn step(&mut self, dt: f32) -> Vec<ContactBegin> {
        if dt > 0.0 {
            self.params.dt = dt / self.substeps as f32;
            for _ in 0..self.substeps {
                self.pipeline.step(
                    &self.gravity,
                    &self.params,
                    &mut self.islands,
                    &mut self.broad_phase,
                    &mut self.narrow_phase,
                    &mut self.bodies,
                    &mut self.colliders,
                    &mut self.impulse_joints,
                    &mut self.multibody_joints,
                    &mut self.ccd,
                    None,
                    &(),
                    &self.events,
                );
            }
        }

        // contact forces are never enabled; keep the channel empty anyway
        while self.contact_force_recv.try_recv().is_ok() {}

        self.collision_recv
            .try_iter()
            .filter(|ev| ev.started())
            .map(|ev| ContactBegin {
                a: ev.collider1(),
                b: ev.collider2(),
                sensor: ev.sensor(),
            })
            .collect()
    }

    fn attach(&mut self, body: BodyHandle, builder: ColliderBuilder, tag: BodyTag, opts: Option<&BodyOptions>) {
        let mut builder = builder
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(tag.encode());
        if let Some(o) = opts {
            builder = builder
                .density(o.density)
                .friction(o.friction)
                .restitution(o.restitution)
                .sensor(o.sensor);
            if o.sensor {
                // kinematic sprites crossing a fixed sensor (or the reverse) report too
                builder = builder
                    .active_collision_types(ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_FIXED);
            }
        }
        self.colliders
            .insert_with_parent(builder.build(), body, &mut self.bodies);
    }

    fn collider_builder(shape: &LocalShape) -> Option<ColliderBuilder> {
        match shape {
            LocalShape::Cuboid { center, half } => Some(
                ColliderBuilder::cuboid(half.x.max(1e-4), half.y.max(1e-4)).translation(to_na(*center)),
            ),
            LocalShape::Ball { center, radius } => {
                Some(ColliderBuilder::ball(radius.max(1e-4)).translation(to_na(*center)))
            }
            LocalShape::Hull(points) => {
                let pts: Vec<Point<Real>> = points.iter().map(|p| point![p.x, p.y]).collect();
                let hull = ColliderBuilder::convex_hull(&pts);
                if hull.is_none() {
                    tracing::warn!(verts = pts.len(), "degenerate polygon skipped");
                }
                hull
            }
        }
    }

    /// A static body carrying one box, used for merged tile runs.
    pub fn add_static_box(&mut self, center: Vec2, half: Vec2, tag: BodyTag) -> BodyHandle {
        self.add_static_shapes(
            center,
            &[LocalShape::Cuboid {
                center: Vec2::ZERO,
                half,
            }],
            tag,
        )
    }

    pub fn add_static_shapes(&mut self, center: Vec2, shapes: &[LocalShape], tag: BodyTag) -> BodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(to_na(center))
            .user_data(tag.encode())
            .build();
        let handle = self.bodies.insert(body);
        for shape in shapes {
            if let Some(builder) = Self::collider_builder(shape) {
                self.attach(handle, builder, tag, None);
            }
        }
        handle
    }

    pub fn add_body(
        &mut self,
        center: Vec2,
        angle: f32,
        shapes: &[LocalShape],
        opts: &BodyOptions,
        tag: BodyTag,
    ) -> BodyHandle {
        let mut builder = match opts.kind {
            BodyKind::Static => RigidBodyBuilder::fixed(),
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
            BodyKind::Kinematic => RigidBodyBuilder::kinematic_position_based(),
        }
        .translation(to_na(center))
        .rotation(angle)
        .gravity_scale(opts.gravity_scale)
        .ccd_enabled(opts.bullet)
        .user_data(tag.encode());
        if opts.fixed_rotation {
            builder = builder.lock_rotations();
        }
        let handle = self.bodies.insert(builder.build());
        for shape in shapes {
            if let Some(collider) = Self::collider_builder(shape) {
                self.attach(handle, collider, tag, Some(opts));
            }
        }
        handle
    }

    /// The first-person maze camera: a rotation-locked, gravity-free CCD circle.
    pub fn add_maze_camera(&mut self, center: Vec2, radius: f32) -> BodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(to_na(center))
            .lock_rotations()
            .gravity_scale(0.0)
            .ccd_enabled(true)
            .user_data(BodyTag::MazeCamera.encode())
            .build();
        let handle = self.bodies.insert(body);
        let opts = BodyOptions {
            density: 1.0,
            friction: 0.0,
            ..BodyOptions::default()
        };
        self.attach(
            handle,
            ColliderBuilder::ball(radius.max(1e-4)),
            BodyTag::MazeCamera,
            Some(&opts),
        );
        handle
    }

    pub fn remove_body(&mut self, handle: BodyHandle) {
        if self
            .bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_none()
        {
            tracing::warn!(?handle, "remove: stale body handle");
        }
        self.names.retain(|_, h| *h != handle);
    }

    pub fn bind_name(&mut self, name: &str, handle: BodyHandle) {
        self.names.insert(name.to_owned(), handle);
    }

    pub fn body_by_name(&self, name: &str) -> Option<BodyHandle> {
        self.names.get(name).copied()
    }

    pub fn name_of_body(&self, handle: BodyHandle) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(n, _)| n.as_str())
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle)
    }

    pub fn collider_tag(&self, collider: ColliderHandle) -> Option<BodyTag> {
        self.colliders
            .get(collider)
            .and_then(|c| BodyTag::decode(c.user_data))
    }

    pub fn collider_body(&self, collider: ColliderHandle) -> Option<BodyHandle> {
        self.colliders.get(collider).and_then(|c| c.parent())
    }

    pub fn body_tag(&self, handle: BodyHandle) -> Option<BodyTag> {
        self.bodies
            .get(handle)
            .and_then(|b| BodyTag::decode(b.user_data))
    }

    pub fn position(&self, handle: BodyHandle) -> Option<Vec2> {
        self.bodies.get(handle).map(|b| from_na(b.translation()))
    }

    pub fn angle(&self, handle: BodyHandle) -> Option<f32> {
        self.bodies.get(handle).map(|b| b.rotation().angle())
    }

    pub fn linvel(&self, handle: BodyHandle) -> Option<Vec2> {
        self.bodies.get(handle).map(|b| from_na(b.linvel()))
    }

    fn body_mut(&mut self, handle: BodyHandle, op: &str) -> Option<&mut RigidBody> {
        let body = self.bodies.get_mut(handle);
        if body.is_none() {
            tracing::warn!(?handle, "{op}: stale body handle");
        }
        body
    }

    pub fn set_translation(&mut self, handle: BodyHandle, pos: Vec2) {
        if let Some(b) = self.body_mut(handle, "set_translation") {
            b.set_translation(to_na(pos), true);
        }
    }

    pub fn set_rotation(&mut self, handle: BodyHandle, angle: f32) {
        if let Some(b) = self.body_mut(handle, "set_rotation") {
            b.set_rotation(Rotation::new(angle), true);
        }
    }

    pub fn set_linvel(&mut self, handle: BodyHandle, vel: Vec2) {
        if let Some(b) = self.body_mut(handle, "set_linvel") {
            b.set_linvel(to_na(vel), true);
        }
    }

    pub fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec2) {
        if let Some(b) = self.body_mut(handle, "apply_impulse") {
            b.apply_impulse(to_na(impulse), true);
        }
    }

    pub fn add_force(&mut self, handle: BodyHandle, force: Vec2) {
        if let Some(b) = self.body_mut(handle, "add_force") {
            b.add_force(to_na(force), true);
        }
    }

    /// Moves a body without simulating the move and drops its velocity.
    pub fn teleport(&mut self, handle: BodyHandle, pos: Vec2) {
        if let Some(b) = self.body_mut(handle, "teleport") {
            b.set_translation(to_na(pos), true);
            b.set_linvel(vector![0.0, 0.0], true);
        }
    }

    /// Collider pose from its parent's current pose, so queries see
    /// transforms set since the last step.
    fn collider_pose(&self, c: &Collider) -> Isometry<Real> {
        match (c.parent().and_then(|h| self.bodies.get(h)), c.position_wrt_parent()) {
            (Some(body), Some(rel)) => body.position() * rel,
            _ => *c.position(),
        }
    }

    fn collider_aabb(&self, c: &Collider) -> Aabb {
        c.shape().compute_aabb(&self.collider_pose(c))
    }

    /// Union of the body's collider boxes.
    pub fn body_aabb(&self, handle: BodyHandle) -> Option<(Vec2, Vec2)> {
        let body = self.bodies.get(handle)?;
        let mut merged: Option<Aabb> = None;
        for ch in body.colliders() {
            if let Some(c) = self.colliders.get(*ch) {
                let aabb = self.collider_aabb(c);
                merged = Some(match merged {
                    Some(m) => m.merged(&aabb),
                    None => aabb,
                });
            }
        }
        merged.map(|a| (vec2(a.mins.x, a.mins.y), vec2(a.maxs.x, a.maxs.y)))
    }

    fn push_unique(out: &mut Vec<BodyHandle>, h: BodyHandle) {
        if !out.contains(&h) {
            out.push(h);
        }
    }

    pub fn bodies_at_point(&self, p: Vec2) -> Vec<BodyHandle> {
        let pt = point![p.x, p.y];
        let mut out = Vec::new();
        for (_, c) in self.colliders.iter() {
            let Some(parent) = c.parent() else { continue };
            if c.shape().contains_point(&self.collider_pose(c), &pt) {
                Self::push_unique(&mut out, parent);
            }
        }
        out
    }

    pub fn bodies_in_aabb(&self, min: Vec2, max: Vec2) -> Vec<BodyHandle> {
        let query = Aabb::new(
            point![min.x.min(max.x), min.y.min(max.y)],
            point![min.x.max(max.x), min.y.max(max.y)],
        );
        let mut out = Vec::new();
        for (_, c) in self.colliders.iter() {
            let Some(parent) = c.parent() else { continue };
            if self.collider_aabb(c).intersects(&query) {
                Self::push_unique(&mut out, parent);
            }
        }
        out
    }
}
