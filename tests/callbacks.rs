mod common;

use common::frame_map;
use macroquad::prelude::*;
use macroquad_tiled_world::{
    BodyOptions, GraphicsObject, HeadlessHost, Host, MazeItemConfig, TmxLoadOptions, World,
    WorldConfig, WorldEvent,
};
use serde_json::{json, Value};

fn loaded(config: WorldConfig) -> (tempfile::TempDir, World) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut w = World::new(config);
    w.load_tmx(frame_map(dir.path()), &TmxLoadOptions::default())
        .expect("load");
    (dir, w)
}

fn drop_ball(w: &mut World) -> u32 {
    w.create_sprite(
        "ball",
        1,
        vec2(0.0, 0.0),
        vec2(0.5, 0.5),
        Some(&BodyOptions::default()),
    )
    .expect("ball")
}

#[test]
fn falling_sprite_reports_contact_with_floor() {
    let (_dir, mut w) = loaded(WorldConfig {
        collision_callback: Some("on_hit".into()),
        ..Default::default()
    });
    drop_ball(&mut w);

    let mut host = HeadlessHost::new(1000.0 / 60.0);
    for _ in 0..120 {
        w.update(&mut host).expect("update");
    }

    let hit = host
        .calls
        .iter()
        .find(|(cb, _)| cb == "on_hit")
        .expect("a contact callback");
    let names: Vec<&str> = hit.1.iter().filter_map(Value::as_str).collect();
    assert!(names.contains(&"ball"), "{names:?}");
    assert!(names.contains(&"tile_0_3"), "{names:?}");

    let ball = w.sprite_by_name("ball").expect("ball");
    let info = w.sprite_info(ball).expect("info");
    // resting on the floor's top edge at y = -1
    assert!((info.position.y + 0.75).abs() < 0.05, "y = {}", info.position.y);
}

#[test]
fn cleared_callback_delivers_nothing() {
    let (_dir, mut w) = loaded(WorldConfig::default());
    drop_ball(&mut w);
    let mut host = HeadlessHost::new(1000.0 / 60.0);
    for _ in 0..120 {
        w.update(&mut host).expect("update");
    }
    assert!(host.calls.is_empty());
}

/// Removes whatever touched the floor and checks the removal waits.
struct Sweeper {
    counts_during: Vec<usize>,
}

impl Host for Sweeper {
    fn frame_duration_ms(&self) -> f32 {
        1000.0 / 60.0
    }

    fn projection(&self) -> Mat4 {
        Mat4::IDENTITY
    }

    fn aspect(&self) -> f32 {
        1.0
    }

    fn invoke(&mut self, world: &mut World, _callback: &str, args: &[Value]) -> anyhow::Result<()> {
        for name in args.iter().filter_map(Value::as_str) {
            if let Some(id) = world.sprite_by_name(name) {
                world.remove_sprite(id)?;
                // a second removal of the same sprite is harmless
                world.remove_sprite(id)?;
            }
        }
        self.counts_during.push(world.sprite_count());
        Ok(())
    }
}

#[test]
fn removal_inside_a_callback_waits_for_the_sweep() {
    let (_dir, mut w) = loaded(WorldConfig {
        collision_callback: Some("on_hit".into()),
        ..Default::default()
    });
    drop_ball(&mut w);
    let mut host = Sweeper {
        counts_during: Vec::new(),
    };
    for _ in 0..120 {
        w.update(&mut host).expect("update");
        if !host.counts_during.is_empty() {
            break;
        }
    }
    assert_eq!(host.counts_during.first(), Some(&1));
    assert_eq!(w.sprite_count(), 0);
    assert!(w.sprite_by_name("ball").is_none());
}

#[test]
fn walking_onto_an_item_picks_it_up() {
    let (dir, mut w) = loaded(WorldConfig {
        gravity: [0.0, 0.0],
        ..Default::default()
    });
    let mapping = json!({
        "key": {"frame_rect": {"x": 0, "y": 0, "w": 32, "h": 32}},
        "_metadata": {"image": "tiles.png"},
    });
    w.add_sprite_sheet("loot", &mapping, Some(dir.path()))
        .expect("sheet");
    w.maze_enable(true).expect("maze");
    w.maze_item_callback(Some("on_pickup".into())).expect("callback");

    // first empty cell is (0, 1); put the key two cells east of it
    let far = w
        .maze_item_add("loot", 2.5, 1.5, &MazeItemConfig::default())
        .expect("item");
    assert_eq!(w.maze_item_info(far).expect("info")["name"], json!("item_0"));

    let events = w.step(1.0 / 60.0).expect("step");
    assert!(!events.iter().any(|e| matches!(e, WorldEvent::Pickup { .. })));

    w.maze_set_camera(2.4, 1.5, None, None).expect("teleport");
    let events = w.step(1.0 / 60.0).expect("step");
    assert!(events.contains(&WorldEvent::Pickup {
        item: far,
        name: "item_0".into()
    }));

    let mut host = HeadlessHost::new(16.0);
    w.dispatch(events, &mut host);
    assert_eq!(host.calls, vec![("on_pickup".to_string(), vec![json!(far), json!("item_0")])]);
    assert_eq!(w.maze_item_info(far).expect("info")["visible"], json!(false));

    // a hidden item is not picked up again; reset shows it
    let again = w.step(1.0 / 60.0).expect("step");
    assert!(!again.iter().any(|e| matches!(e, WorldEvent::Pickup { .. })));
    w.reset();
    assert_eq!(w.maze_item_info(far).expect("info")["visible"], json!(true));
}
