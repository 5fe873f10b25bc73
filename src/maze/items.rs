use crate::config::MazeItemConfig;
use crate::error::{Result, WorldError};
use crate::sheet::SheetId;
use crate::sprite::AnimationState;
use macroquad::prelude::*;

pub const MAX_MAZE_ITEMS: usize = 256;

/// Slot index in the item table.
pub type ItemId = usize;

/// A billboarded sheet frame standing in the maze.
#[derive(Debug, Clone)]
pub struct MazeItem {
    pub name: String,
    pub sheet: SheetId,
    pub frame: usize,
    /// Maze-space `(x, z)`.
    pub position: Vec2,
    /// Height of the quad's centre above the floor, before bobbing.
    pub y_offset: f32,
    pub size: Vec2,
    pub pickup_radius: f32,
    pub bob_amplitude: f32,
    pub bob_speed: f32,
    pub bob_phase: f32,
    pub spin_speed: f32,
    /// Accumulated spin about Y.
    pub spin: f32,
    pub visible: bool,
    pub anim: AnimationState,
}

impl MazeItem {
    pub fn new(name: String, sheet: SheetId, position: Vec2, size: Vec2) -> Self {
        MazeItem {
            name,
            sheet,
            frame: 0,
            position,
            y_offset: size.y * 0.5,
            size,
            pickup_radius: size.x.max(size.y) * 0.5,
            bob_amplitude: 0.0,
            bob_speed: 0.0,
            bob_phase: 0.0,
            spin_speed: 0.0,
            spin: 0.0,
            visible: true,
            anim: AnimationState::default(),
        }
    }

    pub fn bob(&self, t: f32) -> f32 {
        self.bob_amplitude * (t * self.bob_speed * std::f32::consts::TAU + self.bob_phase).sin()
    }

    /// Maze-space centre at clock `t`.
    pub fn center(&self, t: f32) -> Vec3 {
        vec3(self.position.x, self.y_offset + self.bob(t), self.position.y)
    }

    pub fn apply(&mut self, cfg: &MazeItemConfig) {
        if let Some(name) = &cfg.name {
            self.name = name.clone();
        }
        if let Some(v) = cfg.y_offset {
            self.y_offset = v;
        }
        if let Some(v) = cfg.width {
            self.size.x = v.max(0.0);
        }
        if let Some(v) = cfg.height {
            self.size.y = v.max(0.0);
        }
        if let Some(v) = cfg.pickup_radius {
            self.pickup_radius = v.max(0.0);
        }
        if let Some(v) = cfg.bob_amplitude {
            self.bob_amplitude = v;
        }
        if let Some(v) = cfg.bob_speed {
            self.bob_speed = v;
        }
        if let Some(v) = cfg.bob_phase {
            self.bob_phase = v;
        }
        if let Some(v) = cfg.spin_speed {
            self.spin_speed = v;
            if v == 0.0 {
                self.spin = 0.0;
            }
        }
    }

    pub fn to_json(&self, id: ItemId, t: f32) -> serde_json::Value {
        let c = self.center(t);
        serde_json::json!({
            "id": id,
            "name": self.name,
            "x": self.position.x,
            "z": self.position.y,
            "y": c.y,
            "y_offset": self.y_offset,
            "width": self.size.x,
            "height": self.size.y,
            "frame": self.frame,
            "visible": self.visible,
            "pickup_radius": self.pickup_radius,
            "bob_amplitude": self.bob_amplitude,
            "bob_speed": self.bob_speed,
            "bob_phase": self.bob_phase,
            "spin_speed": self.spin_speed,
            "playing": self.anim.playing,
        })
    }
}

/// Fixed-capacity slots; removal frees a slot for reuse.
#[derive(Debug, Clone, Default)]
pub struct ItemTable {
    slots: Vec<Option<MazeItem>>,
}

impl ItemTable {
    pub fn insert(&mut self, item: MazeItem) -> Result<ItemId> {
        if let Some(free) = self.slots.iter().position(Option::is_none) {
            self.slots[free] = Some(item);
            return Ok(free);
        }
        if self.slots.len() >= MAX_MAZE_ITEMS {
            return Err(WorldError::Capacity {
                what: "maze items",
                max: MAX_MAZE_ITEMS,
            });
        }
        self.slots.push(Some(item));
        Ok(self.slots.len() - 1)
    }

    pub fn remove(&mut self, id: ItemId) -> Result<MazeItem> {
        self.slots
            .get_mut(id)
            .and_then(Option::take)
            .ok_or_else(|| WorldError::not_found("maze item", id.to_string()))
    }

    pub fn get(&self, id: ItemId) -> Result<&MazeItem> {
        self.slots
            .get(id)
            .and_then(Option::as_ref)
            .ok_or_else(|| WorldError::not_found("maze item", id.to_string()))
    }

    pub fn get_mut(&mut self, id: ItemId) -> Result<&mut MazeItem> {
        self.slots
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or_else(|| WorldError::not_found("maze item", id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &MazeItem)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, s)| s.as_ref().map(|item| (id, item)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ItemId, &mut MazeItem)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(id, s)| s.as_mut().map(|item| (id, item)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spins, animates and checks pickups against the camera at `eye`
    /// (maze `(x, z)`). Returns `(item, frame)` changes and the picked items.
    pub fn advance(&mut self, dt: f32, eye: Vec2) -> (Vec<(ItemId, u32)>, Vec<(ItemId, String)>) {
        let mut frames = Vec::new();
        let mut picked = Vec::new();
        for (id, item) in self.iter_mut() {
            if !item.visible {
                continue;
            }
            item.spin = (item.spin + item.spin_speed * dt).rem_euclid(std::f32::consts::TAU);
            if let Some(frame) = item.anim.advance(dt) {
                frames.push((id, frame));
            }
            let r = item.pickup_radius;
            if r > 0.0 && item.position.distance_squared(eye) <= r * r {
                item.visible = false;
                tracing::debug!(id, name = %item.name, "maze item picked up");
                picked.push((id, item.name.clone()));
            }
        }
        (frames, picked)
    }

    /// Re-shows every item and rewinds its animation.
    pub fn reset(&mut self) {
        for (_, item) in self.iter_mut() {
            item.visible = true;
            item.spin = 0.0;
            item.anim.rewind();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(x: f32, z: f32) -> MazeItem {
        MazeItem::new("coin".into(), 0, vec2(x, z), vec2(0.5, 0.5))
    }

    #[test]
    fn slots_are_reused_after_removal() {
        let mut table = ItemTable::default();
        let a = table.insert(coin(0.0, 0.0)).expect("insert");
        let b = table.insert(coin(1.0, 0.0)).expect("insert");
        assert_eq!((a, b), (0, 1));
        table.remove(a).expect("remove");
        assert!(table.get(a).is_err());
        assert_eq!(table.insert(coin(2.0, 0.0)).expect("insert"), 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn table_is_capped() {
        let mut table = ItemTable::default();
        for _ in 0..MAX_MAZE_ITEMS {
            table.insert(coin(0.0, 0.0)).expect("insert");
        }
        assert!(matches!(
            table.insert(coin(0.0, 0.0)),
            Err(WorldError::Capacity { max: MAX_MAZE_ITEMS, .. })
        ));
    }

    #[test]
    fn pickup_hides_the_item_once() {
        let mut table = ItemTable::default();
        let near = table.insert(coin(1.0, 1.0)).expect("insert");
        table.insert(coin(5.0, 5.0)).expect("insert");
        let (_, picked) = table.advance(0.016, vec2(1.1, 1.2));
        assert_eq!(picked, vec![(near, "coin".to_owned())]);
        assert!(!table.get(near).expect("item").visible);
        let (_, again) = table.advance(0.016, vec2(1.1, 1.2));
        assert!(again.is_empty());
        table.reset();
        assert!(table.get(near).expect("item").visible);
    }

    #[test]
    fn bob_follows_a_sine() {
        let mut item = coin(0.0, 0.0);
        item.apply(&MazeItemConfig {
            bob_amplitude: Some(0.1),
            bob_speed: Some(1.0),
            y_offset: Some(0.5),
            ..Default::default()
        });
        assert!((item.center(0.25).y - 0.6).abs() < 1e-5);
        assert!((item.center(0.75).y - 0.4).abs() < 1e-5);
    }
}
